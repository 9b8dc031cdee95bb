use anyhow::{Context, Result};
use chrono::NaiveDate;
use rusqlite::{params, Connection};

/// One row of the raw 311 landing table
#[derive(Debug, Clone, PartialEq)]
pub struct LandingRow {
    pub load_date: NaiveDate,
    pub file_name: String,
    /// 1-based position of the record in its source file
    pub row_number_in_file: u64,
    /// JSON text, stored as-is after SQLite has parsed it
    pub raw_payload: String,
}

/// Landing zone for raw 311 payloads, one record per row
pub struct LandingTable {
    conn: Connection,
}

impl LandingTable {
    /// Create a new in-memory database
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .context("Failed to create in-memory database")?;
        let table = Self { conn };
        table.init_schema()?;
        Ok(table)
    }

    /// Open (or create) a database file
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .context(format!("Failed to open database at {}", path))?;
        let table = Self { conn };
        table.init_schema()?;
        Ok(table)
    }

    /// Run `f` inside one transaction: commit when it returns `Ok`, roll
    /// back when it fails. Rows are still inserted one statement at a time.
    pub fn with_transaction<T>(&self, f: impl FnOnce(&Self) -> Result<T>) -> Result<T> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let out = f(self)?;
        tx.commit().context("Failed to commit transaction")?;
        Ok(out)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn
            .execute_batch(
                r#"
                CREATE TABLE IF NOT EXISTS raw_311_requests (
                    load_date TEXT NOT NULL,
                    file_name TEXT NOT NULL,
                    row_number_in_file INTEGER NOT NULL,
                    raw_payload TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_raw_311_file
                    ON raw_311_requests(file_name, row_number_in_file);
                "#,
            )
            .context("Failed to initialize landing schema")?;
        Ok(())
    }

    /// Insert a single payload.
    ///
    /// The payload goes through SQLite `json()`, so text that is not valid
    /// JSON is rejected here.
    pub fn insert(
        &self,
        load_date: NaiveDate,
        file_name: &str,
        row_number_in_file: u64,
        raw_payload: &str,
    ) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO raw_311_requests (load_date, file_name, row_number_in_file, raw_payload) \
                 SELECT ?1, ?2, ?3, json(?4)",
                params![
                    load_date.format("%Y-%m-%d").to_string(),
                    file_name,
                    row_number_in_file as i64,
                    raw_payload
                ],
            )
            .context(format!(
                "Failed to insert row {} of {}",
                row_number_in_file, file_name
            ))?;
        Ok(())
    }

    pub fn insert_row(&self, row: &LandingRow) -> Result<()> {
        self.insert(
            row.load_date,
            &row.file_name,
            row.row_number_in_file,
            &row.raw_payload,
        )
    }

    /// Total rows in the landing table
    pub fn count(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM raw_311_requests", [], |row| row.get(0))
            .context("Failed to count landing rows")?;
        Ok(count as u64)
    }

    /// Rows loaded from one source file
    pub fn count_for_file(&self, file_name: &str) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM raw_311_requests WHERE file_name = ?1",
                params![file_name],
                |row| row.get(0),
            )
            .context(format!("Failed to count rows for {}", file_name))?;
        Ok(count as u64)
    }

    /// All rows in insertion order
    pub fn rows(&self) -> Result<Vec<LandingRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT load_date, file_name, row_number_in_file, raw_payload \
                 FROM raw_311_requests ORDER BY rowid",
            )
            .context("Failed to prepare statement")?;

        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })
            .context("Failed to query landing rows")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect landing rows")?;

        raw.into_iter()
            .map(|(load_date, file_name, row_number, raw_payload)| -> Result<LandingRow> {
                let load_date = NaiveDate::parse_from_str(&load_date, "%Y-%m-%d")
                    .context(format!("Invalid load_date in landing table: {}", load_date))?;
                Ok(LandingRow {
                    load_date,
                    file_name,
                    row_number_in_file: row_number as u64,
                    raw_payload,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 22).unwrap()
    }

    #[test]
    fn test_insert_and_read_back() {
        let table = LandingTable::new_in_memory().unwrap();
        table
            .insert(date(), "part_01.csv", 1, r#"{"unique_key":"1"}"#)
            .unwrap();
        table
            .insert(date(), "part_01.csv", 2, r#"{"unique_key":"2"}"#)
            .unwrap();

        assert_eq!(table.count().unwrap(), 2);
        assert_eq!(table.count_for_file("part_01.csv").unwrap(), 2);
        assert_eq!(table.count_for_file("part_02.csv").unwrap(), 0);

        let rows = table.rows().unwrap();
        assert_eq!(rows[0].load_date, date());
        assert_eq!(rows[0].row_number_in_file, 1);
        assert_eq!(rows[1].raw_payload, r#"{"unique_key":"2"}"#);
    }

    #[test]
    fn test_payload_is_minified_by_json() {
        let table = LandingTable::new_in_memory().unwrap();
        table.insert(date(), "f.json", 1, "{ \"a\" : 1 }").unwrap();

        let rows = table.rows().unwrap();
        assert_eq!(rows[0].raw_payload, r#"{"a":1}"#);
    }

    #[test]
    fn test_invalid_json_rejected() {
        let table = LandingTable::new_in_memory().unwrap();
        let result = table.insert(date(), "f.json", 1, "{not json");

        assert!(result.is_err());
        assert_eq!(table.count().unwrap(), 0);
    }

    #[test]
    fn test_insert_row_struct() {
        let table = LandingTable::new_in_memory().unwrap();
        let row = LandingRow {
            load_date: date(),
            file_name: "API_20251122.json".to_string(),
            row_number_in_file: 7,
            raw_payload: r#"[1,2]"#.to_string(),
        };
        table.insert_row(&row).unwrap();

        assert_eq!(table.rows().unwrap(), vec![row]);
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("raw.db");
        let path = path.to_str().unwrap();

        {
            let table = LandingTable::open(path).unwrap();
            table.insert(date(), "a.csv", 1, "{}").unwrap();
        }

        let reopened = LandingTable::open(path).unwrap();
        assert_eq!(reopened.count().unwrap(), 1);
    }

    #[test]
    fn test_transaction_commits() {
        let table = LandingTable::new_in_memory().unwrap();
        let inserted = table
            .with_transaction(|t| {
                t.insert(date(), "a.csv", 1, "{}")?;
                t.insert(date(), "a.csv", 2, "{}")?;
                Ok(2)
            })
            .unwrap();

        assert_eq!(inserted, 2);
        assert_eq!(table.count_for_file("a.csv").unwrap(), 2);
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let table = LandingTable::new_in_memory().unwrap();
        let result = table.with_transaction(|t| {
            t.insert(date(), "a.csv", 1, "{}")?;
            t.insert(date(), "a.csv", 2, "{broken")?;
            Ok(())
        });

        assert!(result.is_err());
        assert_eq!(table.count().unwrap(), 0);
    }
}
