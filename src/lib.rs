// Regional Stats - Core Library
// Census + real-estate acquisition, normalization and cache pipeline.
// Exposes all modules for use in the CLI, API server, and tests.

pub mod records;
pub mod error;
pub mod encoding;       // Raw bytes → lines, encoding detection
pub mod classifier;     // Heuristic row classifier + census CSV driver
pub mod area;           // Region code → prefecture / municipality
pub mod deduplication;  // First occurrence per code wins
pub mod cache;          // Snapshot store (file / memory)
pub mod config;         // Settings, secrets, fallback policies
pub mod sources;        // Live sources + synthetic generator
pub mod orchestrator;   // Cache → primary → secondary → synthetic
pub mod aggregation;    // Time series + summaries
pub mod validation;     // Request guard
pub mod service;        // Request surface

// Re-export commonly used types
pub use records::{
    Dataset, Scope, RegionRecord, TransactionRecord, Snapshot,
    TimeSeries, TimeSeriesPoint, SummaryStatistic, MunicipalityEntry,
};
pub use error::{StatsError, InvalidRequest, SourceError, CacheError, StatsResult};
pub use encoding::{LineNormalizer, DecodedText, EncodingConfidence, decode_lines};
pub use classifier::{CellTag, ClassifiedRow, ParseReport, classify_cell, classify_row, parse_census_text};
pub use area::{AreaCode, resolve, municipality_name, split_area_name, prefecture_name};
pub use deduplication::{dedup_first_by, dedup_regions};
pub use cache::{CacheKey, CacheStore, FileCacheStore, MemoryCacheStore};
pub use config::{Settings, SyntheticMode, PersistPolicy, CensusTable};
pub use sources::{
    DataSource, FetchRequest, RawPayload, SourceStatus, LiveSources,
    EStatApiSource, CensusCsvSource, ReinfolibSource, SyntheticGenerator,
};
pub use orchestrator::{FallbackOrchestrator, Resolution, Origin, Step, SourceTier};
pub use validation::RequestGuard;
pub use service::StatsService;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default log filter for the binaries
pub const DEFAULT_LOG_FILTER: &str = "regional_stats=info";

/// Install the tracing subscriber (RUST_LOG overrides the default filter)
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
