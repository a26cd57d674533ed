// 🚨 Error Taxonomy
// Which failures stay inside the fallback chain and which reach the caller.

use crate::records::Dataset;
use thiserror::Error;

/// Caller-facing error of the request surface
#[derive(Debug, Error)]
pub enum StatsError {
    /// Parameters violate preconditions; nothing was fetched
    #[error("invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("no data for region code {code} in any of the years {searched_years:?}")]
    RegionNotFound { code: String, searched_years: Vec<i32> },

    /// Every step of the fallback chain failed (only possible with synthetic data disabled)
    #[error("no source could provide {dataset} data for {year}: {reason}")]
    SourceUnavailable {
        dataset: Dataset,
        year: i32,
        reason: String,
    },

    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

/// Precondition violations, each carrying enough context to self-correct
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("year {year} is not available; available years: {available:?}")]
    YearUnavailable { year: i32, available: Vec<i32> },

    #[error("year {year} is outside the supported range {min}-{max}")]
    YearOutOfRange { year: i32, min: i32, max: i32 },

    #[error("region code '{code}' must be exactly {expected} digits")]
    InvalidCodeLength { code: String, expected: usize },

    #[error("prefecture code '{code}' must be two digits between 01 and 47")]
    InvalidPrefectureCode { code: String },

    #[error("at least one region code is required")]
    NoCodes,

    #[error("{count} region codes requested; at most {max} per request")]
    TooManyCodes { count: usize, max: usize },

    #[error("start year {start} is after end year {end}")]
    EmptyYearRange { start: i32, end: i32 },
}

/// Failure of a single live source; absorbed by the orchestrator
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source is not configured: {0}")]
    NotConfigured(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("upstream returned HTTP {0}")]
    Status(u16),

    #[error("could not decode payload: {0}")]
    Decode(String),

    #[error("source returned no records")]
    Empty,
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

/// Cache store failure
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt snapshot {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot shape does not match dataset {0}")]
    ShapeMismatch(Dataset),

    #[error("cache task failed: {0}")]
    Task(String),
}

pub type StatsResult<T> = std::result::Result<T, StatsError>;
