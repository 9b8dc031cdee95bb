use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::landing::{LandingRow, LandingTable};

/// Default interval for "rows so far" progress logs
pub const DEFAULT_PROGRESS_EVERY: u64 = 10_000;

/// Rows loaded from one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLoad {
    pub file_name: String,
    pub rows: u64,
}

#[derive(Debug, Clone, Default)]
pub struct LoadSummary {
    pub files: Vec<FileLoad>,
    pub total_rows: u64,
}

/// List `.csv` files directly inside `dir`, sorted by name
pub fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.context(format!("Failed to read directory entry in {}", dir.display()))?;
        let path = entry.path();

        if !entry.file_type().is_file() {
            continue;
        }

        let is_csv = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);

        if is_csv {
            files.push(path.to_path_buf());
        }
    }

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

/// Key under which fields beyond the header are kept
pub const OVERFLOW_KEY: &str = "null";

/// Map a CSV record onto its header as a JSON object.
///
/// Keys follow header order and every value stays a string. Missing
/// trailing fields become `null`; fields beyond the header are kept as an
/// array of strings under [`OVERFLOW_KEY`].
pub fn record_to_json(headers: &StringRecord, record: &StringRecord) -> Value {
    let mut object = Map::with_capacity(headers.len() + 1);

    for (i, key) in headers.iter().enumerate() {
        let value = match record.get(i) {
            Some(field) => Value::String(field.to_string()),
            None => Value::Null,
        };
        object.insert(key.to_string(), value);
    }

    if record.len() > headers.len() {
        let overflow = record
            .iter()
            .skip(headers.len())
            .map(|field| Value::String(field.to_string()))
            .collect();
        object.insert(OVERFLOW_KEY.to_string(), Value::Array(overflow));
    }

    Value::Object(object)
}

/// Load every CSV chunk in `dir` into the landing table.
///
/// Each record becomes one row holding a JSON object. Row numbers restart
/// at 1 for every file. An empty directory is not an error.
pub fn load_csv_chunks(
    dir: &Path,
    table: &LandingTable,
    load_date: NaiveDate,
    progress_every: u64,
) -> Result<LoadSummary> {
    if !dir.is_dir() {
        bail!("Directory does not exist: {}", dir.display());
    }

    let files = list_csv_files(dir)?;
    if files.is_empty() {
        info!(dir = %dir.display(), "No CSV files found");
        return Ok(LoadSummary::default());
    }

    info!(count = files.len(), dir = %dir.display(), "Found CSV files");

    let mut summary = LoadSummary::default();
    for path in &files {
        let file_load = load_csv_file(path, table, load_date, progress_every, &mut summary.total_rows)
            .context(format!("Failed to load {}", path.display()))?;
        summary.files.push(file_load);
    }

    info!(total_rows = summary.total_rows, "All CSV chunks loaded");
    Ok(summary)
}

fn load_csv_file(
    path: &Path,
    table: &LandingTable,
    load_date: NaiveDate,
    progress_every: u64,
    total_rows: &mut u64,
) -> Result<FileLoad> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    info!(file = %file_name, "Processing file");

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context("Failed to open CSV file")?;
    let headers = reader.headers().context("Failed to read CSV header")?.clone();

    // One transaction per file: a failure rolls back only this file's rows
    let row_number = table.with_transaction(|table| {
        let mut row_number = 0u64;
        for result in reader.records() {
            let record =
                result.context(format!("Failed to read record after row {}", row_number))?;
            row_number += 1;

            if record.len() > headers.len() {
                debug!(file = %file_name, row = row_number, "Row has fields beyond header");
            }

            let payload = record_to_json(&headers, &record);
            table.insert_row(&LandingRow {
                load_date,
                file_name: file_name.clone(),
                row_number_in_file: row_number,
                raw_payload: serde_json::to_string(&payload).context("Failed to serialize row")?,
            })?;

            *total_rows += 1;
            if progress_every > 0 && *total_rows % progress_every == 0 {
                info!(rows = *total_rows, "Inserted rows so far");
            }
        }
        Ok(row_number)
    })?;

    info!(file = %file_name, rows = row_number, "Finished file");
    Ok(FileLoad {
        file_name,
        rows: row_number,
    })
}

/// Insert already-parsed JSON records, numbering them from 1
pub fn load_records(
    records: &[Value],
    file_name: &str,
    load_date: NaiveDate,
    table: &LandingTable,
) -> Result<u64> {
    let row_number = table.with_transaction(|table| {
        let mut row_number = 0u64;
        for record in records {
            row_number += 1;
            let raw = serde_json::to_string(record)
                .context(format!("Failed to serialize record {}", row_number))?;
            table.insert(load_date, file_name, row_number, &raw)?;
        }
        Ok(row_number)
    })?;

    info!(rows = row_number, file = file_name, %load_date, "Inserted records into landing table");
    Ok(row_number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 23).unwrap()
    }

    #[test]
    fn test_list_csv_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("part_02.csv"), "a\n").unwrap();
        fs::write(dir.path().join("part_01.CSV"), "a\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "x").unwrap();
        fs::create_dir(dir.path().join("nested.csv")).unwrap();
        fs::write(dir.path().join("nested.csv").join("deep.csv"), "a\n").unwrap();

        let files = list_csv_files(dir.path()).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(names, vec!["part_01.CSV", "part_02.csv"]);
    }

    #[test]
    fn test_record_to_json_keeps_header_order() {
        let headers = StringRecord::from(vec!["unique_key", "agency", "borough"]);
        let record = StringRecord::from(vec!["42", "NYPD", "BRONX"]);

        let value = record_to_json(&headers, &record);

        assert_eq!(
            serde_json::to_string(&value).unwrap(),
            r#"{"unique_key":"42","agency":"NYPD","borough":"BRONX"}"#
        );
    }

    #[test]
    fn test_record_to_json_short_and_long_rows() {
        let headers = StringRecord::from(vec!["a", "b"]);

        let short = record_to_json(&headers, &StringRecord::from(vec!["1"]));
        assert_eq!(short, json!({"a": "1", "b": null}));

        let long = record_to_json(&headers, &StringRecord::from(vec!["1", "2", "3", "4"]));
        assert_eq!(long, json!({"a": "1", "b": "2", "null": ["3", "4"]}));
    }

    #[test]
    fn test_load_keeps_fields_beyond_header() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("part_01.csv"), "a,b\n1,2,3\n").unwrap();

        let table = LandingTable::new_in_memory().unwrap();
        load_csv_chunks(dir.path(), &table, date(), 0).unwrap();

        let rows = table.rows().unwrap();
        assert_eq!(rows[0].raw_payload, r#"{"a":"1","b":"2","null":["3"]}"#);
    }

    #[test]
    fn test_load_strips_utf8_bom_from_header() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("part_01.csv"), "\u{feff}a,b\n1,2\n").unwrap();

        let table = LandingTable::new_in_memory().unwrap();
        load_csv_chunks(dir.path(), &table, date(), 0).unwrap();

        let rows = table.rows().unwrap();
        assert_eq!(rows[0].raw_payload, r#"{"a":"1","b":"2"}"#);
    }

    #[test]
    fn test_failed_file_rolls_back_only_that_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("part_01.csv"), "a\n1\n2\n").unwrap();
        // Invalid UTF-8 fails the StringRecord read partway through
        fs::write(dir.path().join("part_02.csv"), b"a\n3\n\xff\xfe\n").unwrap();

        let table = LandingTable::new_in_memory().unwrap();
        let result = load_csv_chunks(dir.path(), &table, date(), 0);

        assert!(result.is_err());
        assert_eq!(table.count_for_file("part_01.csv").unwrap(), 2);
        assert_eq!(table.count_for_file("part_02.csv").unwrap(), 0);
    }

    #[test]
    fn test_load_csv_chunks() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("part_01.csv"),
            "unique_key,descriptor\n1,Loud Music\n2,\"Banging, Pounding\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("part_02.csv"), "unique_key,descriptor\n3,Blocked\n").unwrap();

        let table = LandingTable::new_in_memory().unwrap();
        let summary = load_csv_chunks(dir.path(), &table, date(), 2).unwrap();

        assert_eq!(summary.total_rows, 3);
        assert_eq!(
            summary.files,
            vec![
                FileLoad { file_name: "part_01.csv".to_string(), rows: 2 },
                FileLoad { file_name: "part_02.csv".to_string(), rows: 1 },
            ]
        );

        let rows = table.rows().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].row_number_in_file, 2);
        assert_eq!(
            rows[1].raw_payload,
            r#"{"unique_key":"2","descriptor":"Banging, Pounding"}"#
        );
        assert_eq!(rows[2].file_name, "part_02.csv");
        assert_eq!(rows[2].row_number_in_file, 1);
        assert_eq!(rows[2].load_date, date());
    }

    #[test]
    fn test_load_csv_chunks_empty_dir() {
        let dir = TempDir::new().unwrap();
        let table = LandingTable::new_in_memory().unwrap();

        let summary = load_csv_chunks(dir.path(), &table, date(), 10).unwrap();

        assert_eq!(summary.total_rows, 0);
        assert!(summary.files.is_empty());
    }

    #[test]
    fn test_load_csv_chunks_missing_dir() {
        let dir = TempDir::new().unwrap();
        let table = LandingTable::new_in_memory().unwrap();

        let result = load_csv_chunks(&dir.path().join("nope"), &table, date(), 10);

        assert!(result.is_err());
    }

    #[test]
    fn test_load_records_numbers_rows() {
        let table = LandingTable::new_in_memory().unwrap();
        let records = vec![json!({"unique_key": "1"}), json!({"unique_key": "2", "n": 5})];

        let inserted = load_records(&records, "API_20251122.json", date(), &table).unwrap();

        assert_eq!(inserted, 2);
        let rows = table.rows().unwrap();
        assert_eq!(rows[0].row_number_in_file, 1);
        assert_eq!(rows[1].row_number_in_file, 2);
        assert_eq!(rows[1].raw_payload, r#"{"unique_key":"2","n":5}"#);
    }
}
