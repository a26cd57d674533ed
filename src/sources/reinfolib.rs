// 🏠 Real Estate Information Library source - XIT001 transaction prices (primary)
// Field names arrive in English or Japanese; both are accepted per field.

use super::{as_list, check_status, pick, value_f64, value_i64, value_string, DataSource, FetchRequest, RawPayload};
use crate::area;
use crate::error::SourceError;
use crate::records::{Dataset, Snapshot, TransactionRecord};
use async_trait::async_trait;
use serde_json::Value;

pub const REINFOLIB_API_BASE: &str = "https://www.reinfolib.mlit.go.jp/ex-api/external";
pub const SUBSCRIPTION_HEADER: &str = "Ocp-Apim-Subscription-Key";

// (English, Japanese) label pairs
const TRADE_PRICE: &[&str] = &["TradePrice", "取引価格"];
const AREA: &[&str] = &["Area", "面積"];
const UNIT_PRICE: &[&str] = &["UnitPrice", "単価"];
const PREFECTURE: &[&str] = &["Prefecture", "都道府県名"];
const MUNICIPALITY: &[&str] = &["Municipality", "市区町村名"];
const DISTRICT: &[&str] = &["DistrictName", "地区名"];
const PERIOD: &[&str] = &["Period", "取引時期"];
const BUILDING_YEAR: &[&str] = &["BuildingYear", "建築年"];
const STRUCTURE: &[&str] = &["Structure", "構造"];
const USE: &[&str] = &["Use", "用途"];
const CITY_PLANNING: &[&str] = &["CityPlanning", "都市計画"];
const PRICE_CLASSIFICATION: &[&str] = &["PriceClassification", "価格区分"];

pub struct ReinfolibSource {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
}

impl ReinfolibSource {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        ReinfolibSource {
            client,
            api_key,
            base_url: REINFOLIB_API_BASE.to_string(),
        }
    }

    /// Builder pattern: alternate endpoint
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl DataSource for ReinfolibSource {
    fn name(&self) -> &str {
        "Real Estate Information Library"
    }

    fn dataset(&self) -> Dataset {
        Dataset::RealEstate
    }

    fn is_configured(&self, request: &FetchRequest) -> bool {
        self.api_key.is_some() && request.scope.prefecture.is_some()
    }

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, SourceError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("reinfolib API key is not set".to_string()))?;
        let pref_code = request
            .scope
            .prefecture
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("prefecture scope is required".to_string()))?;

        let year = request.year.to_string();
        let mut params: Vec<(&str, &str)> = vec![("year", year.as_str()), ("area", pref_code)];
        if let Some(city) = request.scope.region.as_deref() {
            params.push(("city", city));
        }
        if let Some(classification) = request.price_classification.as_deref() {
            params.push(("priceClassification", classification));
        }

        tracing::info!(year = request.year, area = pref_code, city = ?request.scope.region, "Fetching transactions from reinfolib");

        // gzip bodies are decoded by the client
        let response = self
            .client
            .get(format!("{}/XIT001", self.base_url))
            .query(&params)
            .header(SUBSCRIPTION_HEADER, api_key)
            .send()
            .await?;

        let bytes = check_status(response)?.bytes().await?;
        Ok(RawPayload::Bytes(bytes.to_vec()))
    }

    fn parse(&self, request: &FetchRequest, raw: RawPayload) -> Result<Snapshot, SourceError> {
        let payload = raw.into_json()?;
        let fallback_prefecture = request
            .scope
            .prefecture
            .as_deref()
            .and_then(area::prefecture_name)
            .unwrap_or("");
        Ok(Snapshot::Transactions(parse_transactions(&payload, fallback_prefecture)))
    }
}

/// Parse an XIT001 payload. `data` or `Data` may be a list or a single object.
///
/// Items that are not objects are skipped.
pub fn parse_transactions(payload: &Value, fallback_prefecture: &str) -> Vec<TransactionRecord> {
    let items = as_list(payload.get("data").or_else(|| payload.get("Data")));

    items
        .into_iter()
        .filter(|item| item.is_object())
        .map(|item| parse_item(item, fallback_prefecture))
        .collect()
}

fn parse_item(item: &Value, fallback_prefecture: &str) -> TransactionRecord {
    let text = |names: &[&str]| value_string(pick(item, names));

    let prefecture = text(PREFECTURE).unwrap_or_else(|| fallback_prefecture.to_string());
    let municipality = text(MUNICIPALITY).unwrap_or_default();

    let mut record = TransactionRecord::new(&prefecture, &municipality)
        .with_prices(
            value_i64(pick(item, TRADE_PRICE)),
            value_i64(pick(item, UNIT_PRICE)),
            value_f64(pick(item, AREA)),
        )
        .with_district(text(DISTRICT))
        .with_trade_period(text(PERIOD));

    record.building_year = text(BUILDING_YEAR);
    record.structure = text(STRUCTURE);
    record.use_type = text(USE);
    record.city_planning = text(CITY_PLANNING);
    record.price_classification = text(PRICE_CLASSIFICATION);
    record
}

// ============================================================================
// TESTS
// ============================================================================
