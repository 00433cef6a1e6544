use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use strm_playlist::Keywords;
use strm_progress::Verbosity;

pub const MAX_WORKERS: u64 = 256;

/// Classification worker count: `"auto"` or a fixed number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WorkersRepr", into = "WorkersRepr")]
pub enum Workers {
    #[default]
    Auto,
    Fixed(u64),
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WorkersRepr {
    Count(u64),
    Text(String),
}
impl TryFrom<WorkersRepr> for Workers {
    type Error = String;
    fn try_from(value: WorkersRepr) -> Result<Self, Self::Error> {
        match value {
            WorkersRepr::Count(n) => Ok(Self::Fixed(n)),
            WorkersRepr::Text(s) if s.trim().eq_ignore_ascii_case("auto") => Ok(Self::Auto),
            WorkersRepr::Text(s) => s.trim().parse().map(Self::Fixed).map_err(|_| format!("expected \"auto\" or a number, got {s:?}")),
        }
    }
}
impl From<Workers> for WorkersRepr {
    fn from(value: Workers) -> Self {
        match value {
            Workers::Auto => Self::Text("auto".to_string()),
            Workers::Fixed(n) => Self::Count(n),
        }
    }
}

/// Kind of disk the output tree lives on; only used to size `auto` workers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Ssd,
    Hdd,
    #[default]
    Auto,
}
impl StorageKind {
    /// Worker count for `max_workers = "auto"`. Unknown storage is treated
    /// like an SSD.
    pub fn auto_workers(self, cpus: u64) -> u64 {
        let cpus = cpus.max(1);
        match self {
            Self::Ssd | Self::Auto => (cpus * 4).min(32),
            Self::Hdd => (cpus * 2).min(16),
        }
    }
}
impl Display for StorageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Ssd => "ssd",
            Self::Hdd => "hdd",
            Self::Auto => "auto",
        })
    }
}

/// Path templates per category, rendered without the `.strm` extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub movie: String,
    pub tv: String,
    pub documentary: String,
}
impl Default for Templates {
    fn default() -> Self {
        Self {
            movie: "Movies/{{ title|safe }}{% if year %} ({{ year }}){% endif %}/{{ title|safe }}{% if year %} ({{ year }}){% endif %}".to_string(),
            tv: "TV Shows/{{ title|safe }}/Season {{ season }}/{{ title|safe }} S{{ season }}E{{ episode }}".to_string(),
            documentary: "Documentaries/{{ title|safe }}{% if year %} ({{ year }}){% endif %}/{{ title|safe }}{% if year %} ({{ year }}){% endif %}".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgressSettings {
    pub observer_capacity: u64,
}
impl Default for ProgressSettings {
    fn default() -> Self {
        Self { observer_capacity: 64 }
    }
}

/// Configuration exactly as read from defaults, file and environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct RawConfig {
    pub playlist: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub cache_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub existing_media_dirs: Vec<PathBuf>,
    /// Older single-directory form, folded into `existing_media_dirs`.
    pub existing_media_dir: Option<PathBuf>,
    pub dry_run: bool,
    pub max_workers: Workers,
    pub storage: StorageKind,
    pub batch_size: u64,
    pub write_excluded_report: bool,
    pub excluded_report: PathBuf,
    pub verbosity: Verbosity,
    pub keywords: Keywords,
    pub templates: Templates,
    pub progress: ProgressSettings,
}
impl Default for RawConfig {
    fn default() -> Self {
        Self {
            playlist: None,
            output_dir: None,
            cache_file: None,
            log_file: None,
            existing_media_dirs: Vec::new(),
            existing_media_dir: None,
            dry_run: false,
            max_workers: Workers::Auto,
            storage: StorageKind::Auto,
            batch_size: 50,
            write_excluded_report: true,
            excluded_report: PathBuf::from("excluded_entries.txt"),
            verbosity: Verbosity::Normal,
            keywords: Keywords::default(),
            templates: Templates::default(),
            progress: ProgressSettings::default(),
        }
    }
}

/// Validated configuration for one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub playlist: PathBuf,
    /// Always absolute.
    pub output_dir: PathBuf,
    pub cache_file: PathBuf,
    pub log_file: Option<PathBuf>,
    /// Only directories that exist; missing ones are dropped with a warning.
    pub existing_media_dirs: Vec<PathBuf>,
    pub dry_run: bool,
    pub max_workers: usize,
    pub batch_size: usize,
    /// `None` when the report is disabled; otherwise absolute.
    pub excluded_report: Option<PathBuf>,
    pub verbosity: Verbosity,
    pub keywords: Keywords,
    pub templates: Templates,
    pub observer_capacity: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(StorageKind::Ssd, 2, 8)]
    #[case(StorageKind::Ssd, 16, 32)]
    #[case(StorageKind::Hdd, 2, 4)]
    #[case(StorageKind::Hdd, 12, 16)]
    #[case(StorageKind::Auto, 0, 4)]
    fn test_auto_workers(#[case] kind: StorageKind, #[case] cpus: u64, #[case] expected: u64) {
        assert_eq!(kind.auto_workers(cpus), expected);
    }

    #[test]
    fn test_workers_repr() {
        assert_eq!(Workers::try_from(WorkersRepr::Text("AUTO".into())).unwrap(), Workers::Auto);
        assert_eq!(Workers::try_from(WorkersRepr::Text("12".into())).unwrap(), Workers::Fixed(12));
        assert_eq!(Workers::try_from(WorkersRepr::Count(3)).unwrap(), Workers::Fixed(3));
        assert!(Workers::try_from(WorkersRepr::Text("lots".into())).is_err());
    }
}
