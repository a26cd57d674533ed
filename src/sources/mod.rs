// 🌐 Live Sources - narrow contract for anything that can produce a snapshot
// "given (dataset, year, scope), return raw bytes or structured JSON", then parse

pub mod census_csv;
pub mod estat;
pub mod reinfolib;
pub mod synthetic;

pub use census_csv::CensusCsvSource;
pub use estat::EStatApiSource;
pub use reinfolib::ReinfolibSource;
pub use synthetic::SyntheticGenerator;

use crate::cache::CacheKey;
use crate::config::Settings;
use crate::error::SourceError;
use crate::records::{Dataset, Scope, Snapshot};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// CORE TYPES
// ============================================================================

/// FetchRequest - one (dataset, year, scope) lookup
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FetchRequest {
    pub dataset: Dataset,
    pub year: i32,
    pub scope: Scope,

    /// Real-estate only: "01" transaction prices, "02" contract prices
    pub price_classification: Option<String>,
}

impl FetchRequest {
    /// Population requests are never scoped
    pub fn new(dataset: Dataset, year: i32, scope: Scope) -> Self {
        let scope = if dataset.is_region_partitioned() {
            scope
        } else {
            Scope::none()
        };
        FetchRequest {
            dataset,
            year,
            scope,
            price_classification: None,
        }
    }

    pub fn population(year: i32) -> Self {
        FetchRequest::new(Dataset::Population, year, Scope::none())
    }

    pub fn realestate(year: i32, pref_code: &str, region_code: Option<&str>) -> Self {
        let scope = match region_code {
            Some(region) => Scope::region(pref_code, region),
            None => Scope::prefecture(pref_code),
        };
        FetchRequest::new(Dataset::RealEstate, year, scope)
    }

    /// Builder pattern: price classification filter (blank means none)
    pub fn with_price_classification(mut self, classification: Option<String>) -> Self {
        self.price_classification = self.cache_key_for(classification.as_deref()).price_classification;
        self
    }

    /// The filter is part of the key: a filtered batch never answers an unfiltered request
    pub fn cache_key(&self) -> CacheKey {
        self.cache_key_for(self.price_classification.as_deref())
    }

    fn cache_key_for(&self, classification: Option<&str>) -> CacheKey {
        CacheKey::new(self.dataset, self.year, self.scope.clone())
            .with_price_classification(classification)
    }

    /// Stable text form of every parameter, used to seed synthetic generation
    pub fn fingerprint(&self) -> String {
        let mut fingerprint = format!(
            "{}|{}|{}|{}",
            self.dataset.key_prefix(),
            self.year,
            self.scope.prefecture.as_deref().unwrap_or(""),
            self.scope.region.as_deref().unwrap_or("")
        );
        if let Some(classification) = &self.price_classification {
            fingerprint.push_str("|pc");
            fingerprint.push_str(classification);
        }
        fingerprint
    }
}

/// RawPayload - what a source hands back before parsing
#[derive(Debug, Clone, PartialEq)]
pub enum RawPayload {
    Bytes(Vec<u8>),
    Json(Value),
}

impl RawPayload {
    pub fn into_json(self) -> Result<Value, SourceError> {
        match self {
            RawPayload::Json(value) => Ok(value),
            RawPayload::Bytes(bytes) => Ok(serde_json::from_slice(&bytes)?),
        }
    }

    pub fn into_bytes(self) -> Result<Vec<u8>, SourceError> {
        match self {
            RawPayload::Bytes(bytes) => Ok(bytes),
            RawPayload::Json(value) => Ok(serde_json::to_vec(&value)?),
        }
    }
}

// ============================================================================
// SOURCE TRAIT
// ============================================================================

/// DataSource - core trait every live source implements
///
/// Implementations never retry; the orchestrator decides what happens on failure.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short name for logs and status output
    fn name(&self) -> &str;

    /// Which dataset this source produces
    fn dataset(&self) -> Dataset;

    /// Whether the source can serve this request at all (credentials, table entry...)
    fn is_configured(&self, request: &FetchRequest) -> bool;

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, SourceError>;

    fn parse(&self, request: &FetchRequest, raw: RawPayload) -> Result<Snapshot, SourceError>;

    /// Configuration check → fetch → parse. An empty result is an error.
    async fn fetch(&self, request: &FetchRequest) -> Result<Snapshot, SourceError> {
        if !self.is_configured(request) {
            return Err(SourceError::NotConfigured(format!(
                "{} cannot serve {} {}",
                self.name(),
                request.dataset,
                request.year
            )));
        }

        let raw = self.fetch_raw(request).await?;
        let snapshot = self.parse(request, raw)?;

        if snapshot.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(snapshot)
    }
}

/// SourceStatus - one line of the status report
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SourceStatus {
    pub name: String,
    pub dataset: Dataset,
    pub configured: bool,
}

// ============================================================================
// FACTORY
// ============================================================================

/// LiveSources - the concrete sources built from Settings
pub struct LiveSources {
    pub population_primary: Arc<dyn DataSource>,
    pub population_secondary: Arc<dyn DataSource>,
    pub realestate_primary: Arc<dyn DataSource>,
}

impl LiveSources {
    /// Build every live source, each with its own HTTP client
    pub fn from_settings(settings: &Settings) -> Result<LiveSources, SourceError> {
        let population_client = http_client(settings.population_timeout_secs)?;
        let realestate_client = http_client(settings.realestate_timeout_secs)?;

        Ok(LiveSources {
            population_primary: Arc::new(EStatApiSource::new(
                population_client.clone(),
                settings.estat_app_id.clone(),
                settings.census_tables.clone(),
            )),
            population_secondary: Arc::new(CensusCsvSource::new(
                population_client,
                settings.census_tables.clone(),
            )),
            realestate_primary: Arc::new(ReinfolibSource::new(
                realestate_client,
                settings.reinfolib_api_key.clone(),
            )),
        })
    }
}

/// HTTP client with a whole-request timeout
pub fn http_client(timeout_secs: u64) -> Result<reqwest::Client, SourceError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!("regional-stats/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Map a non-2xx response to SourceError::Status
pub(crate) fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(SourceError::Status(status.as_u16()))
    }
}

// ============================================================================
// JSON HELPERS (shared by the API parsers)
// ============================================================================

/// Array → its items, single object → one item, anything else → nothing
pub(crate) fn as_list(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(obj @ Value::Object(_)) => vec![obj],
        _ => Vec::new(),
    }
}

/// First non-null field among alternative names (English / Japanese label)
pub(crate) fn pick<'a>(item: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| item.get(*name))
        .find(|v| !v.is_null())
}

/// Integer from a JSON number or a "1,234" string
pub(crate) fn value_i64(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Float from a JSON number or a "1,234.5" string
pub(crate) fn value_f64(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Text; numbers are rendered, empty strings are None
pub(crate) fn value_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_keys() {
        let req = FetchRequest::realestate(2020, "13", Some("13101"));
        assert_eq!(req.cache_key().stem(), "realestate_2020_13_13101");
        assert_eq!(req.fingerprint(), "realestate|2020|13|13101");

        let req = FetchRequest::new(Dataset::Population, 2015, Scope::for_region_code("13101"));
        assert!(req.scope.is_empty());
        assert_eq!(req.cache_key().stem(), "population_2015");
    }

    #[test]
    fn test_price_classification_is_part_of_key_and_seed() {
        let plain = FetchRequest::realestate(2020, "13", Some("13101"));
        let filtered = plain.clone().with_price_classification(Some("02".to_string()));

        assert_eq!(filtered.cache_key().stem(), "realestate_2020_13_13101_pc02");
        assert_ne!(filtered.cache_key(), plain.cache_key());
        assert_eq!(filtered.fingerprint(), "realestate|2020|13|13101|pc02");

        let blank = plain.clone().with_price_classification(Some("  ".to_string()));
        assert_eq!(blank.price_classification, None);
        assert_eq!(blank.cache_key(), plain.cache_key());

        let population = FetchRequest::population(2020).with_price_classification(Some("01".to_string()));
        assert_eq!(population.price_classification, None);
        assert_eq!(population.cache_key().stem(), "population_2020");
    }

    #[test]
    fn test_payload_conversion() {
        let raw = RawPayload::Bytes(br#"{"data":[]}"#.to_vec());
        assert_eq!(raw.into_json().unwrap(), json!({"data": []}));

        let raw = RawPayload::Bytes(b"not json".to_vec());
        assert!(matches!(raw.into_json(), Err(SourceError::Decode(_))));
    }

    #[test]
    fn test_as_list_wraps_single_object() {
        let value = json!({"a": 1});
        assert_eq!(as_list(Some(&value)).len(), 1);
        let value = json!([1, 2, 3]);
        assert_eq!(as_list(Some(&value)).len(), 3);
        assert!(as_list(None).is_empty());
        assert!(as_list(Some(&json!("x"))).is_empty());
    }

    #[test]
    fn test_pick_prefers_first_present_name() {
        let item = json!({"取引価格": "1,000", "TradePrice": null});
        assert_eq!(value_i64(pick(&item, &["TradePrice", "取引価格"])), Some(1000));

        let item = json!({"TradePrice": 2000, "取引価格": "1,000"});
        assert_eq!(value_i64(pick(&item, &["TradePrice", "取引価格"])), Some(2000));
    }

    #[test]
    fn test_value_parsing() {
        assert_eq!(value_i64(Some(&json!("12,345"))), Some(12345));
        assert_eq!(value_i64(Some(&json!("abc"))), None);
        assert_eq!(value_f64(Some(&json!("1,234.5"))), Some(1234.5));
        assert_eq!(value_f64(Some(&json!(70))), Some(70.0));
        assert_eq!(value_string(Some(&json!(1998))), Some("1998".to_string()));
        assert_eq!(value_string(Some(&json!(" "))), None);
    }
}
