use derive_more::Display;
use std::str::FromStr;

/// How chatty a run is.
///
/// - `Quiet`: only the final summary.
/// - `Normal`: phase start/complete lines plus the summary.
/// - `Verbose`/`Debug`: additionally lower the default log level.
#[derive(Debug, Display, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Verbosity {
    #[display("quiet")]
    Quiet,
    #[default]
    #[display("normal")]
    Normal,
    #[display("verbose")]
    Verbose,
    #[display("debug")]
    Debug,
}
impl Verbosity {
    /// Whether phase transitions are logged at `info`.
    pub fn shows_phases(self) -> bool {
        self >= Self::Normal
    }
}

#[derive(Debug, Display, derive_more::Error)]
#[display("unknown verbosity level: {_0}")]
pub struct UnknownVerbosity(#[error(not(source))] pub String);

impl FromStr for Verbosity {
    type Err = UnknownVerbosity;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "quiet" => Ok(Self::Quiet),
            "normal" => Ok(Self::Normal),
            "verbose" => Ok(Self::Verbose),
            "debug" => Ok(Self::Debug),
            _ => Err(UnknownVerbosity(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_order() {
        assert_eq!(" Verbose ".parse::<Verbosity>().unwrap(), Verbosity::Verbose);
        assert!("loud".parse::<Verbosity>().is_err());
        assert!(!Verbosity::Quiet.shows_phases());
        assert!(Verbosity::Debug.shows_phases());
    }
}
