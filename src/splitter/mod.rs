mod counter;
mod error;
mod writer;


pub use counter::{count_data_rows, count_lines};
pub use error::SplitError;
pub use writer::{chunk_file_name, rows_per_chunk, write_chunks};

use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default number of chunk files to aim for
pub const DEFAULT_TARGET_CHUNKS: usize = 40;

/// Where to read from, where to write to, and how many chunks to aim for
#[derive(Debug, Clone)]
pub struct SplitConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Upper bound on the number of chunk files produced
    pub target_chunk_count: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("311_Service_Requests.csv"),
            output_dir: PathBuf::from("parts_csv"),
            target_chunk_count: DEFAULT_TARGET_CHUNKS,
        }
    }
}

impl SplitConfig {
    pub fn new(
        input_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        target_chunk_count: usize,
    ) -> Self {
        Self {
            input_path: input_path.into(),
            output_dir: output_dir.into(),
            target_chunk_count,
        }
    }

    pub fn validate(&self) -> Result<(), SplitError> {
        if self.target_chunk_count == 0 {
            return Err(SplitError::InvalidChunkCount(self.target_chunk_count));
        }
        Ok(())
    }
}

/// One chunk file written by a split
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkFile {
    /// 1-based position in the output sequence
    pub index: usize,
    pub path: PathBuf,
    /// Data rows in this chunk, header excluded
    pub rows: u64,
}

/// Outcome of a split run
#[derive(Debug, Clone, Default)]
pub struct SplitSummary {
    pub data_rows: u64,
    pub rows_per_chunk: u64,
    pub chunks: Vec<ChunkFile>,
}

impl SplitSummary {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Create the output directory if it does not exist yet
pub fn ensure_output_dir(path: &Path) -> Result<(), SplitError> {
    fs::create_dir_all(path).map_err(|source| SplitError::OutputDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Split `config.input_path` into at most `config.target_chunk_count` files.
///
/// Two passes over the input: the first counts data rows, the second writes
/// them out. An input with no data rows creates no chunk files.
pub fn split_csv(config: &SplitConfig) -> Result<SplitSummary, SplitError> {
    config.validate()?;
    ensure_output_dir(&config.output_dir)?;

    info!(input = %config.input_path.display(), "Counting data rows");
    let data_rows = count_data_rows(&config.input_path)?;
    if data_rows == 0 {
        info!("No data rows found (only header or empty file), nothing to split");
        return Ok(SplitSummary::default());
    }

    let per_chunk = rows_per_chunk(data_rows, config.target_chunk_count);
    info!(
        data_rows,
        target_chunks = config.target_chunk_count,
        rows_per_chunk = per_chunk,
        "Splitting input"
    );

    let chunks = write_chunks(config, data_rows)?;

    info!(
        chunks = chunks.len(),
        output_dir = %config.output_dir.display(),
        "CSV splitting completed"
    );

    Ok(SplitSummary {
        data_rows,
        rows_per_chunk: per_chunk,
        chunks,
    })
}
