// Public API exports
pub mod fetch;
pub mod landing;
pub mod loader;
pub mod splitter;

// Re-export main types for convenience
pub use splitter::{split_csv, ChunkFile, SplitConfig, SplitError, SplitSummary};

pub use landing::{LandingRow, LandingTable};

pub use loader::{load_csv_chunks, load_records, LoadSummary};

pub use fetch::{FetchConfig, ServiceRequestClient};
