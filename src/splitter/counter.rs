use super::SplitError;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

/// Count lines in a byte stream.
///
/// A line ends at `\n`; trailing bytes after the last newline count as one
/// more line. Content is never decoded.
pub fn count_lines<R: BufRead>(mut reader: R) -> io::Result<u64> {
    let mut lines = 0u64;
    let mut unterminated = false;

    loop {
        let buf = reader.fill_buf()?;
        if buf.is_empty() {
            break;
        }

        let len = buf.len();
        lines += buf.iter().filter(|&&b| b == b'\n').count() as u64;
        unterminated = buf[len - 1] != b'\n';
        reader.consume(len);
    }

    if unterminated {
        lines += 1;
    }

    Ok(lines)
}

/// Count data rows (every line after the header) in the file at `path`.
///
/// Empty and header-only files both yield 0.
pub fn count_data_rows(path: &Path) -> Result<u64, SplitError> {
    let read_err = |source: io::Error| SplitError::Read {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(read_err)?;
    let total_lines = count_lines(BufReader::new(file)).map_err(read_err)?;

    Ok(total_lines.saturating_sub(1))
}
