use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use reqwest::blocking::{Client, Request};
use serde_json::Value;
use std::time::Duration;
use tracing::info;

use super::{DateWindow, DEFAULT_BASE_URL, DEFAULT_LIMIT, DEFAULT_TIMEOUT_SECS};

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub base_url: String,
    pub limit: u32,
    pub timeout: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            limit: DEFAULT_LIMIT,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Blocking client for the 311 service-request dataset
pub struct ServiceRequestClient {
    http: Client,
    config: FetchConfig,
}

impl ServiceRequestClient {
    pub fn new(config: FetchConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    /// Build the GET request for one day of records, ordered by creation time
    pub fn build_request(&self, date: NaiveDate) -> Result<Request> {
        let window = DateWindow::for_day(date);
        let where_clause = window.where_clause();
        let limit = self.config.limit.to_string();

        self.http
            .get(&self.config.base_url)
            .query(&[
                ("$where", where_clause.as_str()),
                ("$limit", limit.as_str()),
                ("$order", "created_date"),
            ])
            .build()
            .context(format!("Failed to build request for {}", self.config.base_url))
    }

    /// Fetch all records created on `date`.
    ///
    /// At most `limit` records come back; the API truncates silently.
    pub fn fetch_for_date(&self, date: NaiveDate) -> Result<Vec<Value>> {
        let request = self.build_request(date)?;
        info!(%date, url = %request.url(), "Requesting 311 data from API");

        let response = self
            .http
            .execute(request)
            .context("HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            bail!(
                "HTTP {}: {}",
                status,
                status.canonical_reason().unwrap_or("Unknown")
            );
        }

        let body: Value = response
            .json()
            .context("Failed to decode response body as JSON")?;
        let records = parse_records(body)?;

        info!(count = records.len(), "Fetched records from API");
        Ok(records)
    }
}

/// Unwrap a response body that must be a JSON array of records
pub fn parse_records(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Array(records) => Ok(records),
        other => bail!(
            "Expected a list of JSON objects from 311 API, got {}",
            json_kind(&other)
        ),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
