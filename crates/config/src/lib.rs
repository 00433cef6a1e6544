//! Configuration loading and validation.
//!
//! Sources, in increasing precedence:
//! 1. built-in defaults,
//! 2. a TOML, YAML or JSON file (format picked by extension),
//! 3. `STRMSYNC_*` environment variables, with `__` separating nested keys
//!    (`STRMSYNC_KEYWORDS__TV='[series]'`).
//!
//! The result is validated into a [`Config`] before anything else runs.

pub mod error;
mod models;

pub use crate::models::{Config, MAX_WORKERS, ProgressSettings, StorageKind, Templates, Workers};
use crate::error::{ErrorKind, Result};
use crate::models::RawConfig;
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "STRMSYNC_";
const DEFAULT_CONFIG_FILE: &str = "config.toml";
const DEFAULT_CACHE_FILE: &str = "cache.db";

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "strmsync")
}

/// Where the config file is looked for when none is given.
pub fn default_config_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(DEFAULT_CONFIG_FILE))
}

fn default_cache_path() -> PathBuf {
    match project_dirs() {
        Some(dirs) => dirs.data_dir().join(DEFAULT_CACHE_FILE),
        None => PathBuf::from(DEFAULT_CACHE_FILE),
    }
}

fn figment(file: Option<&Path>) -> Result<Figment> {
    let mut figment = Figment::from(Serialized::defaults(RawConfig::default()));
    if let Some(file) = file {
        figment = match file.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase).as_deref() {
            Some("toml") => figment.merge(Toml::file_exact(file)),
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(file)),
            Some("json") => figment.merge(Json::file_exact(file)),
            _ => exn::bail!(ErrorKind::invalid("config", format!("unsupported config format: {}", file.display()))),
        };
    }
    Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
}

impl Config {
    /// Load from an explicit file (which must exist), or from the default
    /// location if a file is there, then validate.
    #[tracing::instrument(skip_all)]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let file = match file {
            Some(file) => {
                if !file.is_file() {
                    exn::bail!(ErrorKind::invalid("config", format!("file not found: {}", file.display())));
                }
                Some(file.to_path_buf())
            },
            None => default_config_path().filter(|path| path.is_file()),
        };
        match &file {
            Some(path) => tracing::debug!(path = %path.display(), "Loading configuration file"),
            None => tracing::debug!("No configuration file, using defaults and environment"),
        }
        let raw: RawConfig = figment(file.as_deref())?.extract().or_raise(|| ErrorKind::Load)?;
        raw.validate()
    }
}

fn absolute(field: &'static str, path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path);
    }
    let cwd = std::env::current_dir().or_raise(|| ErrorKind::invalid(field, "cannot resolve relative path"))?;
    Ok(cwd.join(path))
}

fn bounded(field: &'static str, value: u64, max: u64) -> Result<usize> {
    if value == 0 || value > max {
        exn::bail!(ErrorKind::invalid(field, format!("must be between 1 and {max}, got {value}")));
    }
    usize::try_from(value).or_raise(|| ErrorKind::invalid(field, "too large"))
}

impl RawConfig {
    pub(crate) fn validate(self) -> Result<Config> {
        let playlist = self.playlist.ok_or_raise(|| ErrorKind::MissingField("playlist"))?;
        if !playlist.is_file() {
            exn::bail!(ErrorKind::invalid("playlist", format!("file not found: {}", playlist.display())));
        }
        let output_dir = absolute("output_dir", self.output_dir.ok_or_raise(|| ErrorKind::MissingField("output_dir"))?)?;
        if output_dir.exists() && !output_dir.is_dir() {
            exn::bail!(ErrorKind::invalid("output_dir", format!("not a directory: {}", output_dir.display())));
        }

        let mut existing_media_dirs = Vec::new();
        for dir in self.existing_media_dir.into_iter().chain(self.existing_media_dirs) {
            if !dir.exists() {
                tracing::warn!(path = %dir.display(), "Existing media directory not found, skipping");
                continue;
            }
            if !dir.is_dir() {
                exn::bail!(ErrorKind::invalid("existing_media_dirs", format!("not a directory: {}", dir.display())));
            }
            if !existing_media_dirs.contains(&dir) {
                existing_media_dirs.push(dir);
            }
        }

        let max_workers = match self.max_workers {
            Workers::Fixed(n) => bounded("max_workers", n, MAX_WORKERS)?,
            Workers::Auto => {
                let cpus = std::thread::available_parallelism().map(|n| n.get() as u64).unwrap_or(1);
                let workers = self.storage.auto_workers(cpus);
                tracing::debug!(storage = %self.storage, cpus, workers, "Sized classification workers");
                bounded("max_workers", workers, MAX_WORKERS)?
            },
        };

        let excluded_report = match self.write_excluded_report {
            true if self.excluded_report.is_absolute() => Some(self.excluded_report),
            true => Some(output_dir.join(self.excluded_report)),
            false => None,
        };

        for (field, template) in [
            ("templates.movie", &self.templates.movie),
            ("templates.tv", &self.templates.tv),
            ("templates.documentary", &self.templates.documentary),
        ] {
            if template.trim().is_empty() {
                exn::bail!(ErrorKind::invalid(field, "template is empty"));
            }
        }

        Ok(Config {
            playlist,
            output_dir,
            cache_file: self.cache_file.unwrap_or_else(default_cache_path),
            log_file: self.log_file,
            existing_media_dirs,
            dry_run: self.dry_run,
            max_workers,
            batch_size: bounded("batch_size", self.batch_size, u64::from(u32::MAX))?,
            excluded_report,
            verbosity: self.verbosity,
            keywords: self.keywords,
            templates: self.templates,
            observer_capacity: bounded("progress.observer_capacity", self.progress.observer_capacity, 1 << 16)?,
        })
    }
}
