use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use nyc311_etl::fetch::{self, api_file_name, FetchConfig, ServiceRequestClient};
use nyc311_etl::loader::{self, DEFAULT_PROGRESS_EVERY};
use nyc311_etl::splitter::{self, SplitConfig, DEFAULT_TARGET_CHUNKS};
use nyc311_etl::LandingTable;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nyc311-etl")]
#[command(about = "Fetch, split and land NYC 311 service-request data", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a large CSV into header-prefixed part_NN.csv chunks
    Split {
        /// CSV file to split
        #[arg(long, env = "SPLIT_INPUT", default_value = "311_Service_Requests.csv")]
        input: PathBuf,

        /// Directory the chunk files are written to
        #[arg(long, env = "SPLIT_OUTPUT_DIR", default_value = "parts_csv")]
        output_dir: PathBuf,

        /// Desired number of chunk files (an upper bound)
        #[arg(long, env = "SPLIT_CHUNKS", default_value_t = DEFAULT_TARGET_CHUNKS)]
        chunks: usize,
    },

    /// Load every CSV chunk in a directory into the landing table
    LoadChunks {
        #[arg(long, env = "CHUNKS_DIR", default_value = "parts_csv")]
        chunks_dir: PathBuf,

        /// SQLite database holding raw_311_requests
        #[arg(long, env = "LANDING_DB", default_value = "nyc311_raw.db")]
        db: String,

        /// Log progress every N inserted rows (0 disables)
        #[arg(long, env = "PROGRESS_EVERY", default_value_t = DEFAULT_PROGRESS_EVERY)]
        progress_every: u64,
    },

    /// Fetch one day of 311 requests from the API and land them
    Fetch {
        /// Day to fetch as YYYY-MM-DD (default: yesterday)
        #[arg(long, env = "FETCH_DATE")]
        date: Option<NaiveDate>,

        #[arg(long, env = "LANDING_DB", default_value = "nyc311_raw.db")]
        db: String,

        #[arg(long, env = "NYC311_BASE_URL", default_value = fetch::DEFAULT_BASE_URL)]
        base_url: String,

        #[arg(long, env = "NYC311_LIMIT", default_value_t = fetch::DEFAULT_LIMIT)]
        limit: u32,

        /// Request timeout in seconds
        #[arg(long, default_value_t = fetch::DEFAULT_TIMEOUT_SECS)]
        timeout: u64,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let start_time = Instant::now();

    match cli.command {
        Commands::Split {
            input,
            output_dir,
            chunks,
        } => {
            let config = SplitConfig::new(input, output_dir, chunks);
            let summary = splitter::split_csv(&config).map_err(|e| {
                let context = if e.is_config() {
                    "Invalid split configuration".to_string()
                } else {
                    format!("Failed to split {}", config.input_path.display())
                };
                anyhow::Error::new(e).context(context)
            })?;

            println!(
                "Split {} data rows into {} chunk(s) of up to {} rows in {}",
                summary.data_rows,
                summary.chunk_count(),
                summary.rows_per_chunk,
                config.output_dir.display()
            );
        }

        Commands::LoadChunks {
            chunks_dir,
            db,
            progress_every,
        } => {
            let table = LandingTable::open(&db)?;
            let load_date = Local::now().date_naive();
            let summary = loader::load_csv_chunks(&chunks_dir, &table, load_date, progress_every)?;

            for file in &summary.files {
                println!(
                    "  {}: {} rows loaded ({} in table)",
                    file.file_name,
                    file.rows,
                    table.count_for_file(&file.file_name)?
                );
            }

            println!(
                "Loaded {} rows from {} file(s) into {}",
                summary.total_rows,
                summary.files.len(),
                db
            );
        }

        Commands::Fetch {
            date,
            db,
            base_url,
            limit,
            timeout,
        } => {
            let target_date = date.unwrap_or_else(fetch::yesterday);
            info!(%target_date, "Loading 311 data");

            let client = ServiceRequestClient::new(FetchConfig {
                base_url,
                limit,
                timeout: Duration::from_secs(timeout),
            })?;
            let records = client.fetch_for_date(target_date)?;

            if records.is_empty() {
                println!("No records for {}, nothing to load", target_date);
            } else {
                let table = LandingTable::open(&db)?;
                let file_name = api_file_name(target_date);
                let inserted = loader::load_records(&records, &file_name, target_date, &table)?;
                println!("Inserted {} rows for {} into {}", inserted, target_date, db);
            }
        }
    }

    info!(elapsed = ?start_time.elapsed(), "Done");
    Ok(())
}
