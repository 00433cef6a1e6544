//! Binary Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

/// What the binary was doing when it gave up. Every variant maps to exit
/// code 1.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("invalid configuration")]
    Config,
    #[display("could not set up logging")]
    Logging,
    #[display("could not open the cache")]
    Cache,
    #[display("could not prepare the output directory")]
    Output,
    #[display("could not read playlist {}", _0.display())]
    Playlist(#[error(not(source))] PathBuf),
    #[display("synchronization failed")]
    Sync,
}
