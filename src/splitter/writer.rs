use super::{ChunkFile, SplitConfig, SplitError};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// File name for the chunk at a 1-based index: `part_01.csv`, `part_100.csv`
pub fn chunk_file_name(index: usize) -> String {
    format!("part_{:02}.csv", index)
}

/// Rows each chunk holds before a new one is started
pub fn rows_per_chunk(data_rows: u64, target_chunk_count: usize) -> u64 {
    data_rows.div_ceil(target_chunk_count.max(1) as u64)
}

/// The chunk currently receiving rows
struct OpenChunk {
    index: usize,
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl OpenChunk {
    fn create(output_dir: &Path, index: usize, header: &[u8]) -> Result<Self, SplitError> {
        let path = output_dir.join(chunk_file_name(index));
        let file = File::create(&path).map_err(|source| SplitError::Write {
            path: path.clone(),
            source,
        })?;

        let mut chunk = Self {
            index,
            path,
            writer: BufWriter::new(file),
            rows: 0,
        };
        chunk.write_bytes(header)?;
        Ok(chunk)
    }

    fn write_row(&mut self, line: &[u8]) -> Result<(), SplitError> {
        self.write_bytes(line)?;
        self.rows += 1;
        Ok(())
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<(), SplitError> {
        self.writer
            .write_all(bytes)
            .map_err(|source| SplitError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Flush and close the file
    fn finish(mut self) -> Result<ChunkFile, SplitError> {
        self.writer.flush().map_err(|source| SplitError::Write {
            path: self.path.clone(),
            source,
        })?;

        Ok(ChunkFile {
            index: self.index,
            path: self.path,
            rows: self.rows,
        })
    }
}

/// Second pass: stream the input and distribute data rows over chunk files.
///
/// `data_rows` comes from the counting pass. Each chunk is opened only when
/// a row is about to be written to it, so no chunk is ever empty. Files
/// already written stay on disk if a later write fails.
pub fn write_chunks(config: &SplitConfig, data_rows: u64) -> Result<Vec<ChunkFile>, SplitError> {
    if data_rows == 0 {
        return Ok(Vec::new());
    }

    let per_chunk = rows_per_chunk(data_rows, config.target_chunk_count);
    let read_err = |source: io::Error| SplitError::Read {
        path: config.input_path.clone(),
        source,
    };

    let input = File::open(&config.input_path).map_err(read_err)?;
    let mut reader = BufReader::new(input);

    let mut header = Vec::new();
    reader.read_until(b'\n', &mut header).map_err(read_err)?;

    let mut chunks = Vec::new();
    let mut current: Option<OpenChunk> = None;
    let mut next_index = 1usize;
    let mut rows_in_current = 0u64;
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line).map_err(read_err)? == 0 {
            break;
        }

        if rows_in_current == 0 {
            if let Some(done) = current.take() {
                chunks.push(done.finish()?);
            }

            let chunk = OpenChunk::create(&config.output_dir, next_index, &header)?;
            info!(chunk = %chunk.path.display(), "Started new chunk");
            current = Some(chunk);
            next_index += 1;
        }

        if let Some(ref mut chunk) = current {
            chunk.write_row(&line)?;
        }

        rows_in_current += 1;
        if rows_in_current >= per_chunk {
            rows_in_current = 0;
        }
    }

    if let Some(done) = current.take() {
        chunks.push(done.finish()?);
    }

    Ok(chunks)
}
