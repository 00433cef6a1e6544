use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    str::FromStr,
};

use super::sanitize;
use crate::error::{Error, ErrorKind};

/// Kind of content a playlist entry (or a local media file) represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "String", into = "String"))]
pub enum Category {
    Movie,
    TvShow,
    Documentary,
    /// Catch-up/replay streams; never turned into pointer files.
    Replay,
    Unknown,
}
impl Category {
    pub const ALL: [Category; 5] = [Self::Movie, Self::TvShow, Self::Documentary, Self::Replay, Self::Unknown];

    /// Stable textual form, as persisted in the cache.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Movie => "MOVIE",
            Category::TvShow => "TVSHOW",
            Category::Documentary => "DOCUMENTARY",
            Category::Replay => "REPLAY",
            Category::Unknown => "UNKNOWN",
        }
    }

    /// Whether entries of this category are materialised as pointer files.
    pub fn has_pointer_layout(&self) -> bool {
        matches!(self, Self::Movie | Self::TvShow | Self::Documentary)
    }
}
impl TryFrom<String> for Category {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}
impl From<Category> for String {
    fn from(value: Category) -> Self {
        value.as_str().to_string()
    }
}
impl FromStr for Category {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "movie" | "movies" | "film" | "films" => Self::Movie,
            "tv" | "tvshow" | "tvshows" | "tvepisode" | "episode" | "series" => Self::TvShow,
            "doc" | "docs" | "documentary" | "documentaries" => Self::Documentary,
            "replay" | "replays" => Self::Replay,
            "unknown" => Self::Unknown,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "category",
                value: format!("unknown category: {}", s)
            }),
        })
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}
