use chrono::{Days, Local, NaiveDate, NaiveDateTime, NaiveTime};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Half-open `[start, end)` window covering one calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl DateWindow {
    pub fn for_day(date: NaiveDate) -> Self {
        let start = date.and_time(NaiveTime::MIN);
        let end = start + Days::new(1);
        Self { start, end }
    }

    pub fn start_iso(&self) -> String {
        self.start.format(TIMESTAMP_FORMAT).to_string()
    }

    pub fn end_iso(&self) -> String {
        self.end.format(TIMESTAMP_FORMAT).to_string()
    }

    /// SoQL `$where` filter on `created_date`
    pub fn where_clause(&self) -> String {
        format!(
            "created_date >= '{}' AND created_date < '{}'",
            self.start_iso(),
            self.end_iso()
        )
    }
}

/// Landing-table file name for records fetched for `date`
pub fn api_file_name(date: NaiveDate) -> String {
    format!("API_{}.json", date.format("%Y%m%d"))
}

/// The day before today, local time
pub fn yesterday() -> NaiveDate {
    let today = Local::now().date_naive();
    today.pred_opt().unwrap_or(today)
}
