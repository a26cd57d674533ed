// 📦 Record Model - uniform per-region, per-year records
// Everything a source produces ends up as one of these two shapes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// DATASET
// ============================================================================

/// Dataset - which family of statistics a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dataset {
    /// Census population per municipality (scoped by year only)
    Population,
    /// Real-estate transactions (scoped by year + prefecture + optional city)
    RealEstate,
}

impl Dataset {
    /// Prefix used in cache keys and file names
    pub fn key_prefix(&self) -> &'static str {
        match self {
            Dataset::Population => "population",
            Dataset::RealEstate => "realestate",
        }
    }

    /// Human-readable name for logs and CLI output
    pub fn name(&self) -> &'static str {
        match self {
            Dataset::Population => "Population (census)",
            Dataset::RealEstate => "Real-estate transactions",
        }
    }

    /// Parse the key prefix back into a dataset
    pub fn from_prefix(prefix: &str) -> Option<Dataset> {
        match prefix {
            "population" => Some(Dataset::Population),
            "realestate" => Some(Dataset::RealEstate),
            _ => None,
        }
    }

    /// Population snapshots are scoped by year only
    pub fn is_region_partitioned(&self) -> bool {
        matches!(self, Dataset::RealEstate)
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key_prefix())
    }
}

// ============================================================================
// SCOPE
// ============================================================================

/// Scope - partitioning beyond (dataset, year)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Scope {
    /// 2-digit prefecture code
    pub prefecture: Option<String>,
    /// 5-digit region (city) code
    pub region: Option<String>,
}

impl Scope {
    /// No partitioning (population)
    pub fn none() -> Self {
        Scope::default()
    }

    pub fn prefecture(pref_code: &str) -> Self {
        Scope {
            prefecture: Some(pref_code.to_string()),
            region: None,
        }
    }

    pub fn region(pref_code: &str, region_code: &str) -> Self {
        Scope {
            prefecture: Some(pref_code.to_string()),
            region: Some(region_code.to_string()),
        }
    }

    /// Scope for a single 5-digit region code: prefecture derived from its first two digits
    pub fn for_region_code(code: &str) -> Self {
        let pref = code.get(0..2).unwrap_or(code);
        Scope::region(pref, code)
    }

    pub fn is_empty(&self) -> bool {
        self.prefecture.is_none() && self.region.is_none()
    }
}

// ============================================================================
// REGION RECORD
// ============================================================================

/// RegionRecord - one value for one region in one year
///
/// `prefecture` always equals the static table entry for `code[0..2]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionRecord {
    pub code: String,
    pub prefecture: String,
    pub municipality: String,

    /// Older snapshots carry no year; filled in from the cache key on read
    #[serde(default)]
    pub year: i32,

    /// Population, or a derived real-estate metric
    #[serde(alias = "population")]
    pub value: i64,
}

impl RegionRecord {
    pub fn new(code: &str, prefecture: &str, municipality: &str, year: i32, value: i64) -> Self {
        RegionRecord {
            code: code.to_string(),
            prefecture: prefecture.to_string(),
            municipality: municipality.to_string(),
            year,
            value,
        }
    }
}

// ============================================================================
// TRANSACTION RECORD
// ============================================================================

/// TransactionRecord - one real-estate trade
///
/// Only `prefecture` and `municipality` are guaranteed. `unit_price` is derived
/// from `trade_price / area` at parse time when the source omits it, and that
/// derived value is what gets persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(default)]
    pub trade_price: Option<i64>,

    /// Yen per square metre
    #[serde(default)]
    pub unit_price: Option<i64>,

    /// Square metres
    #[serde(default)]
    pub area: Option<f64>,

    pub prefecture: String,
    pub municipality: String,

    #[serde(default)]
    pub district: Option<String>,

    #[serde(default, alias = "trade_date")]
    pub trade_period: Option<String>,

    #[serde(default)]
    pub building_year: Option<String>,

    #[serde(default)]
    pub structure: Option<String>,

    #[serde(default, rename = "use")]
    pub use_type: Option<String>,

    /// Zoning
    #[serde(default)]
    pub city_planning: Option<String>,

    #[serde(default)]
    pub price_classification: Option<String>,
}

impl TransactionRecord {
    /// Create a record with only the mandatory location fields
    pub fn new(prefecture: &str, municipality: &str) -> Self {
        TransactionRecord {
            trade_price: None,
            unit_price: None,
            area: None,
            prefecture: prefecture.to_string(),
            municipality: municipality.to_string(),
            district: None,
            trade_period: None,
            building_year: None,
            structure: None,
            use_type: None,
            city_planning: None,
            price_classification: None,
        }
    }

    /// Builder pattern: prices and area, deriving the unit price when missing
    pub fn with_prices(
        mut self,
        trade_price: Option<i64>,
        unit_price: Option<i64>,
        area: Option<f64>,
    ) -> Self {
        self.trade_price = trade_price;
        self.area = area;
        self.unit_price = unit_price.or_else(|| derive_unit_price(trade_price, area));
        self
    }

    /// Builder pattern: district name
    pub fn with_district(mut self, district: Option<String>) -> Self {
        self.district = district;
        self
    }

    /// Builder pattern: trade period ("2020年第1四半期")
    pub fn with_trade_period(mut self, period: Option<String>) -> Self {
        self.trade_period = period;
        self
    }
}

/// unit price = trade_price / area, truncated. None unless both are present and area > 0.
pub fn derive_unit_price(trade_price: Option<i64>, area: Option<f64>) -> Option<i64> {
    match (trade_price, area) {
        (Some(price), Some(area)) if area > 0.0 => Some((price as f64 / area) as i64),
        _ => None,
    }
}

// ============================================================================
// SNAPSHOT
// ============================================================================

/// Snapshot - the full, immutable contents of one cache entry
///
/// Serialized as a bare JSON array; the dataset in the cache key decides which
/// variant is read back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Snapshot {
    Regions(Vec<RegionRecord>),
    Transactions(Vec<TransactionRecord>),
}

impl Snapshot {
    pub fn len(&self) -> usize {
        match self {
            Snapshot::Regions(records) => records.len(),
            Snapshot::Transactions(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn regions(&self) -> Option<&[RegionRecord]> {
        match self {
            Snapshot::Regions(records) => Some(records),
            Snapshot::Transactions(_) => None,
        }
    }

    pub fn transactions(&self) -> Option<&[TransactionRecord]> {
        match self {
            Snapshot::Transactions(records) => Some(records),
            Snapshot::Regions(_) => None,
        }
    }

    /// Consume into region records (empty for a transaction snapshot)
    pub fn into_regions(self) -> Vec<RegionRecord> {
        match self {
            Snapshot::Regions(records) => records,
            Snapshot::Transactions(_) => Vec::new(),
        }
    }

    /// Consume into transaction records (empty for a region snapshot)
    pub fn into_transactions(self) -> Vec<TransactionRecord> {
        match self {
            Snapshot::Transactions(records) => records,
            Snapshot::Regions(_) => Vec::new(),
        }
    }
}

// ============================================================================
// AGGREGATES
// ============================================================================

/// TimeSeriesPoint - value for one year where the region had a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    pub year: i32,
    pub value: i64,
}

/// TimeSeries - per-region history assembled across years
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub code: String,
    pub prefecture: String,
    pub municipality: String,
    pub points: Vec<TimeSeriesPoint>,

    /// True when at least one point came from synthetic placeholder data
    pub contains_synthetic: bool,
}

/// SummaryStatistic - unit-price aggregate for one region in one year
///
/// `count`/`avg`/`min`/`max` cover priced transactions only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistic {
    pub code: String,
    pub prefecture: String,
    pub municipality: String,
    pub year: i32,
    pub count: usize,
    pub avg: i64,
    pub min: i64,
    pub max: i64,

    /// Every transaction in the batch, priced or not
    pub transaction_count: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg_trade_price: Option<i64>,
}

/// MunicipalityEntry - directory listing of known regions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MunicipalityEntry {
    pub code: String,
    pub prefecture: String,
    pub municipality: String,
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_prefix_roundtrip() {
        assert_eq!(Dataset::from_prefix("population"), Some(Dataset::Population));
        assert_eq!(Dataset::from_prefix("realestate"), Some(Dataset::RealEstate));
        assert_eq!(Dataset::from_prefix("weather"), None);
        assert!(!Dataset::Population.is_region_partitioned());
        assert!(Dataset::RealEstate.is_region_partitioned());
        assert_eq!(Dataset::RealEstate.name(), "Real-estate transactions");
    }

    #[test]
    fn test_scope_for_region_code() {
        let scope = Scope::for_region_code("13101");
        assert_eq!(scope.prefecture.as_deref(), Some("13"));
        assert_eq!(scope.region.as_deref(), Some("13101"));
        assert!(Scope::none().is_empty());
    }

    #[test]
    fn test_unit_price_derived_when_missing() {
        let tx = TransactionRecord::new("東京都", "千代田区").with_prices(
            Some(50_000_000),
            None,
            Some(65.0),
        );
        assert_eq!(tx.unit_price, Some(769_230));
    }

    #[test]
    fn test_unit_price_kept_when_present() {
        let tx = TransactionRecord::new("東京都", "千代田区").with_prices(
            Some(50_000_000),
            Some(700_000),
            Some(65.0),
        );
        assert_eq!(tx.unit_price, Some(700_000));
    }

    #[test]
    fn test_unit_price_not_derived_for_zero_area() {
        assert_eq!(derive_unit_price(Some(1_000), Some(0.0)), None);
        assert_eq!(derive_unit_price(None, Some(10.0)), None);
    }

    #[test]
    fn test_region_record_accepts_legacy_population_key() {
        let json = r#"{"code":"13101","prefecture":"東京都","municipality":"千代田区","population":66680}"#;
        let record: RegionRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.value, 66680);
        assert_eq!(record.year, 0);
    }

    #[test]
    fn test_transaction_serializes_use_field() {
        let mut tx = TransactionRecord::new("大阪府", "大阪市");
        tx.use_type = Some("住宅".to_string());
        let json = serde_json::to_string(&tx).unwrap();
        assert!(json.contains("\"use\":\"住宅\""));
        assert!(json.contains("大阪府"));
    }
}
