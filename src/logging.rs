//! Subscriber setup.
//!
//! `RUST_LOG` always wins over the level derived from the configured
//! verbosity. Log files are appended to and never colored.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use strm_progress::Verbosity;
use tracing::Subscriber;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

fn directives(verbosity: Verbosity) -> &'static str {
    match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info,sqlx=warn",
        Verbosity::Verbose => "debug,sqlx=warn",
        Verbosity::Debug => "trace,sqlx=info",
    }
}

fn filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(verbosity)))
}

/// Minimal stderr subscriber used while the configuration (and with it the
/// real log settings) is still being loaded.
pub fn bootstrap() -> impl Subscriber + Send + Sync {
    fmt().with_writer(std::io::stderr).with_env_filter(filter(Verbosity::Quiet)).finish()
}

/// Install the global subscriber.
pub fn init(verbosity: Verbosity, log_file: Option<&Path>) -> Result<()> {
    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Logging)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path).or_raise(|| ErrorKind::Logging)?;
            Some(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        },
        None => None,
    };
    tracing_subscriber::registry()
        .with(filter(verbosity))
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(file)
        .try_init()
        .or_raise(|| ErrorKind::Logging)
}
