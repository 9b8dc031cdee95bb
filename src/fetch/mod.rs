mod client;
mod query;


pub use client::{parse_records, FetchConfig, ServiceRequestClient};
pub use query::{api_file_name, yesterday, DateWindow};

/// NYC Open Data 311 Service Requests endpoint
pub const DEFAULT_BASE_URL: &str = "https://data.cityofnewyork.us/resource/erm2-nwe9.json";

/// Row cap sent as `$limit`
pub const DEFAULT_LIMIT: u32 = 50_000;

/// Per-request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
