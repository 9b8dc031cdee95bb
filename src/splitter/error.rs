use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SplitError {
    #[error("Invalid target chunk count: {0} (must be at least 1)")]
    InvalidChunkCount(usize),

    #[error("Failed to create output directory {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read input file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write chunk file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl SplitError {
    /// True for failures caused by the run configuration rather than file I/O
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SplitError::InvalidChunkCount(_) | SplitError::OutputDir { .. }
        )
    }
}
