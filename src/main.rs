//! `strmsync`: reconcile a playlist into `.strm` pointer files.
//!
//! Exit codes: `0` when the run finished (per-entry errors included), `1` on
//! a fatal error, `130` when interrupted.

mod display;
mod error;
mod logging;

use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use strm_cache::Database;
use strm_config::Config;
use strm_library::{AllowAll, Context, PointerLayout, pipeline, scan};
use strm_progress::{ProgressTracker, RunReport};
use strm_storage::BackendHandle;

const EXIT_CANCELLED: u8 = 130;

#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Configuration file (TOML, YAML or JSON). Defaults to the per-user
    /// config directory.
    #[arg(short, long, env = "STRMSYNC_CONFIG")]
    config: Option<PathBuf>,
    /// Rewrite every pointer file, even when the cache says it's unchanged.
    #[arg(long)]
    force_regenerate: bool,
    /// Log writes, deletes and cache updates without performing them.
    #[arg(long)]
    dry_run: bool,
    /// Don't draw progress on stderr.
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match tracing::subscriber::with_default(logging::bootstrap(), || Config::load(args.config.as_deref())) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Error: {err:?}");
            return ExitCode::FAILURE;
        },
    };
    if let Err(err) = logging::init(config.verbosity, config.log_file.as_deref()) {
        eprintln!("Error: {err:?}");
        return ExitCode::FAILURE;
    }

    let tracker = Arc::new(ProgressTracker::new(config.verbosity));
    let signals = tokio::spawn({
        let tracker = Arc::clone(&tracker);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracker.shutdown();
            }
        }
    });
    let progress =
        (!args.no_progress).then(|| display::ProgressDisplay::spawn(tracker.subscribe(config.observer_capacity)));

    let result = sync(&args, &config, &tracker).await;
    signals.abort();
    if let Some(progress) = progress {
        progress.finish();
    }

    match result {
        Ok(report) => {
            println!("{report}");
            match report.is_cancelled() {
                true => ExitCode::from(EXIT_CANCELLED),
                false => ExitCode::SUCCESS,
            }
        },
        Err(err) => {
            tracing::error!(error = %err, "Run aborted");
            eprintln!("Error: {err:?}");
            eprintln!("{}", tracker.summary());
            ExitCode::FAILURE
        },
    }
}

async fn sync(args: &Args, config: &Config, tracker: &ProgressTracker) -> Result<RunReport> {
    let dry_run = args.dry_run || config.dry_run;
    if dry_run {
        tracing::info!("Dry run: nothing will be written");
    }
    let templates = &config.templates;
    let layout =
        PointerLayout::new(&templates.movie, &templates.tv, &templates.documentary).or_raise(|| ErrorKind::Config)?;
    let output = strm_library::output_backend(&config.output_dir, dry_run).or_raise(|| ErrorKind::Output)?;
    let media: Vec<BackendHandle> = config
        .existing_media_dirs
        .iter()
        .filter_map(|dir| match scan::media_backend(dir) {
            Ok(backend) => Some(backend),
            Err(err) => {
                tracing::warn!(path = %dir.display(), error = ?err, "Skipping existing media directory");
                None
            },
        })
        .collect();
    let text = tokio::fs::read_to_string(&config.playlist)
        .await
        .or_raise(|| ErrorKind::Playlist(config.playlist.clone()))?;

    let mut ctx = Context::new(output, layout);
    ctx.batch_size = config.batch_size;
    ctx.max_workers = config.max_workers;
    ctx.force_regenerate = args.force_regenerate;
    ctx.excluded_report = config.excluded_report.clone();
    ctx.dry_run = dry_run;

    let db = Database::connect(&config.cache_file).await.or_raise(|| ErrorKind::Cache)?;
    let repo = db.repository(dry_run);
    let entries = strm_playlist::parse(&text, &config.keywords);
    let result = pipeline::run(&ctx, &repo, &media, entries, &AllowAll, tracker).await.or_raise(|| ErrorKind::Sync);
    db.close().await;
    result
}
