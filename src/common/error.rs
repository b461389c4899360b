//! Error types shared by every stage of the counting pipeline.

use std::{io, path::PathBuf};

use thiserror::Error;

/// Result type alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Everything that can stop a run. All of these are fatal: a lane that reports
/// one produces no tally, and the run is cancelled.
#[derive(Error, Debug)]
pub enum Error {
    #[error("couldn't open {}: {source}", path.display())]
    Open { path: PathBuf, source: io::Error },

    #[error("error reading {}: {source}", path.display())]
    Read { path: PathBuf, source: io::Error },

    #[error("corrupt compressed data in {}: {source}", path.display())]
    Decompress { path: PathBuf, source: io::Error },

    #[error("{}: expected {expected} clusters, found {found}", path.display())]
    ClusterCountMismatch { path: PathBuf, expected: u64, found: u64 },

    #[error("{}: tile {tile} should inflate to {expected} bytes, found {found}", path.display())]
    TileSizeMismatch { path: PathBuf, tile: u32, expected: u64, found: u64 },

    #[error("{}: unsupported CBCL format: {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// The index cycles of one lane did not deliver matching chunks
    #[error("index cycles out of step in round {round}: {reason}")]
    CyclesOutOfStep { round: u64, reason: String },

    #[error("invalid parameter '{parameter}': {reason}")]
    InvalidParameter { parameter: String, reason: String },

    #[error("invalid mask '{mask}': {reason}")]
    InvalidMask { mask: String, reason: String },

    #[error("error parsing RunInfo: {0}")]
    RunInfo(#[from] serde_xml_rs::Error),

    #[error(transparent)]
    Glob(#[from] glob::PatternError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("error writing report: {0}")]
    Report(#[from] serde_json::Error),

    #[error("error writing report: {0}")]
    Csv(#[from] csv::Error),

    #[error("pipeline stage {stage} panicked")]
    StagePanicked { stage: String },

    /// Another stage failed first and the run is being torn down
    #[error("run cancelled")]
    Cancelled,

    /// The consumer of this stage's output went away
    #[error("downstream stage hung up")]
    Hangup,
}

impl Error {
    /// Classify an error from a (possibly gzip-wrapped) reader. flate2 reports
    /// bad streams as `InvalidInput`/`InvalidData`, and truncated ones as `UnexpectedEof`.
    pub(crate) fn reading(path: &std::path::Path, source: io::Error, compressed: bool) -> Self {
        let path = path.to_path_buf();
        match source.kind() {
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => {
                Error::Decompress { path, source }
            }
            io::ErrorKind::UnexpectedEof if compressed => Error::Decompress { path, source },
            _ => Error::Read { path, source },
        }
    }

    /// True for errors that only report the consequence of another stage's failure
    pub fn is_secondary(&self) -> bool {
        matches!(self, Error::Cancelled | Error::Hangup)
    }
}
