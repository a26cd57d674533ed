// 📊 e-Stat API source - census population via getStatsData (primary)

use super::{as_list, check_status, value_i64, DataSource, FetchRequest, RawPayload};
use crate::area;
use crate::config::CensusTable;
use crate::deduplication::dedup_regions;
use crate::error::SourceError;
use crate::records::{Dataset, RegionRecord, Snapshot};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

pub const ESTAT_API_BASE: &str = "https://api.e-stat.go.jp/rest/3.0/app/json";

pub struct EStatApiSource {
    client: reqwest::Client,
    app_id: Option<String>,
    tables: Vec<CensusTable>,
    base_url: String,
}

impl EStatApiSource {
    pub fn new(client: reqwest::Client, app_id: Option<String>, tables: Vec<CensusTable>) -> Self {
        EStatApiSource {
            client,
            app_id,
            tables,
            base_url: ESTAT_API_BASE.to_string(),
        }
    }

    /// Builder pattern: alternate endpoint (mirrors, local fixtures)
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    fn table(&self, year: i32) -> Option<&CensusTable> {
        self.tables.iter().find(|t| t.year == year)
    }
}

#[async_trait]
impl DataSource for EStatApiSource {
    fn name(&self) -> &str {
        "e-Stat API"
    }

    fn dataset(&self) -> Dataset {
        Dataset::Population
    }

    fn is_configured(&self, request: &FetchRequest) -> bool {
        self.app_id.is_some() && self.table(request.year).is_some()
    }

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, SourceError> {
        let app_id = self
            .app_id
            .as_deref()
            .ok_or_else(|| SourceError::NotConfigured("e-Stat app id is not set".to_string()))?;
        let table = self.table(request.year).ok_or_else(|| {
            SourceError::NotConfigured(format!("no census table for {}", request.year))
        })?;

        tracing::info!(year = request.year, stats_data_id = %table.stats_data_id, "Fetching census data from e-Stat");

        let response = self
            .client
            .get(format!("{}/getStatsData", self.base_url))
            .query(&[
                ("appId", app_id),
                ("statsDataId", table.stats_data_id.as_str()),
                ("metaGetFlg", "Y"),
                ("cntGetFlg", "N"),
                ("sectionHeaderFlg", "1"),
            ])
            .send()
            .await?;

        let body: Value = check_status(response)?.json().await?;
        Ok(RawPayload::Json(body))
    }

    fn parse(&self, request: &FetchRequest, raw: RawPayload) -> Result<Snapshot, SourceError> {
        let payload = raw.into_json()?;
        let records = parse_stats_data(&payload, request.year)?;
        Ok(Snapshot::Regions(records))
    }
}

// ============================================================================
// PAYLOAD PARSING
// ============================================================================

/// Area code → label, plus the code of the "total population" category if present
#[derive(Debug, Default)]
struct ClassInfo {
    area_names: HashMap<String, String>,
    total_category: Option<String>,
}

/// Parse a getStatsData (or dashboard getData) payload into region records
///
/// Only municipal area codes are kept (national and prefecture totals are dropped);
/// the first value per area wins.
pub fn parse_stats_data(payload: &Value, year: i32) -> Result<Vec<RegionRecord>, SourceError> {
    let root = payload
        .get("GET_STATS_DATA")
        .or_else(|| payload.get("GET_STATS"))
        .ok_or_else(|| SourceError::Decode("missing GET_STATS_DATA".to_string()))?;

    check_result(root)?;

    let statistical = root.get("STATISTICAL_DATA").unwrap_or(&Value::Null);
    let class_info = class_info(payload, statistical);

    let values = as_list(statistical.get("DATA_INF").and_then(|d| d.get("VALUE")));

    let mut records = Vec::new();
    for item in values {
        let Some(code) = item.get("@area").and_then(Value::as_str) else {
            continue;
        };
        if !area::is_municipal_code(code) {
            continue;
        }

        // Prefer the total-population category when the table has several
        if let (Some(total), Some(cat)) = (
            class_info.total_category.as_deref(),
            item.get("@cat01").and_then(Value::as_str),
        ) {
            if cat != total {
                continue;
            }
        }

        let Some(value) = value_i64(item.get("$")) else {
            continue;
        };

        let label = class_info.area_names.get(code).map(String::as_str).unwrap_or("");
        let (prefecture, municipality) = area::split_area_name(code, label);
        records.push(RegionRecord {
            code: code.to_string(),
            prefecture,
            municipality,
            year,
            value,
        });
    }

    let (records, _) = dedup_regions(records);
    tracing::debug!(year, records = records.len(), "Parsed e-Stat payload");
    Ok(records)
}

/// RESULT.STATUS is 0 on success; anything else carries ERROR_MSG
fn check_result(root: &Value) -> Result<(), SourceError> {
    let Some(result) = root.get("RESULT") else {
        return Ok(());
    };
    let status = value_i64(result.get("STATUS")).unwrap_or(0);
    if status == 0 {
        return Ok(());
    }
    let message = result
        .get("ERROR_MSG")
        .and_then(Value::as_str)
        .unwrap_or("unknown error");
    Err(SourceError::Decode(format!("e-Stat status {}: {}", status, message)))
}

fn class_info(payload: &Value, statistical: &Value) -> ClassInfo {
    let class_objs = statistical
        .get("CLASS_INF")
        .and_then(|c| c.get("CLASS_OBJ"))
        .or_else(|| {
            payload
                .get("GET_META_INFO")
                .and_then(|m| m.get("METADATA_INF"))
                .and_then(|m| m.get("CLASS_INF"))
                .and_then(|c| c.get("CLASS_OBJ"))
        });

    let mut info = ClassInfo::default();
    for class_obj in as_list(class_objs) {
        let id = class_obj
            .get("@id")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_lowercase();
        let classes = as_list(class_obj.get("CLASS"));

        if id.contains("area") {
            for class in &classes {
                let code = class.get("@code").and_then(Value::as_str).unwrap_or("");
                let name = class.get("@name").and_then(Value::as_str).unwrap_or("");
                if code.len() == 5 && code.chars().all(|c| c.is_ascii_digit()) {
                    info.area_names.insert(code.to_string(), name.to_string());
                }
            }
        } else if id == "cat01" && info.total_category.is_none() {
            info.total_category = classes
                .iter()
                .find(|class| {
                    let name = class.get("@name").and_then(Value::as_str).unwrap_or("");
                    name.contains("人口総数") || name == "総数"
                })
                .and_then(|class| class.get("@code").and_then(Value::as_str))
                .map(|code| code.to_string());
        }
    }
    info
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_census_tables;
    use serde_json::json;

    fn payload() -> Value {
        json!({
            "GET_STATS_DATA": {
                "RESULT": {"STATUS": 0, "ERROR_MSG": "正常に終了しました。"},
                "STATISTICAL_DATA": {
                    "CLASS_INF": {
                        "CLASS_OBJ": [
                            {
                                "@id": "cat01",
                                "CLASS": [
                                    {"@code": "100", "@name": "人口総数"},
                                    {"@code": "110", "@name": "男"}
                                ]
                            },
                            {
                                "@id": "area",
                                "CLASS": [
                                    {"@code": "00000", "@name": "全国"},
                                    {"@code": "13000", "@name": "東京都"},
                                    {"@code": "13101", "@name": "東京都千代田区"},
                                    {"@code": "13102", "@name": "東京都中央区"}
                                ]
                            }
                        ]
                    },
                    "DATA_INF": {
                        "VALUE": [
                            {"@area": "00000", "@cat01": "100", "$": "126146099"},
                            {"@area": "13", "@cat01": "100", "$": "14047594"},
                            {"@area": "13000", "@cat01": "100", "$": "14047594"},
                            {"@area": "13101", "@cat01": "110", "$": "34000"},
                            {"@area": "13101", "@cat01": "100", "$": "66680"},
                            {"@area": "13102", "@cat01": "100", "$": "169,179"},
                            {"@area": "13101", "@cat01": "100", "$": "1"},
                            {"@area": "13103", "@cat01": "100", "$": "-"}
                        ]
                    }
                }
            }
        })
    }

    #[test]
    fn test_parse_stats_data() {
        let records = parse_stats_data(&payload(), 2020).unwrap();
        assert_eq!(
            records,
            vec![
                RegionRecord::new("13101", "東京都", "千代田区", 2020, 66680),
                RegionRecord::new("13102", "東京都", "中央区", 2020, 169179),
            ]
        );
    }

    #[test]
    fn test_single_value_object_is_accepted() {
        let payload = json!({
            "GET_STATS_DATA": {
                "STATISTICAL_DATA": {
                    "CLASS_INF": {"CLASS_OBJ": {"@id": "area", "CLASS": {"@code": "27100", "@name": "大阪府大阪市"}}},
                    "DATA_INF": {"VALUE": {"@area": "27100", "$": "2752412"}}
                }
            }
        });
        let records = parse_stats_data(&payload, 2020).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].municipality, "大阪市");
        assert_eq!(records[0].prefecture, "大阪府");
    }

    #[test]
    fn test_missing_labels_still_resolve_prefecture() {
        let payload = json!({
            "GET_STATS": {"STATISTICAL_DATA": {"DATA_INF": {"VALUE": [{"@area": "01100", "$": 1973395}]}}}
        });
        let records = parse_stats_data(&payload, 2020).unwrap();
        assert_eq!(records[0].prefecture, "北海道");
        assert_eq!(records[0].municipality, "");
    }

    #[test]
    fn test_error_status_is_decode_error() {
        let payload = json!({
            "GET_STATS_DATA": {"RESULT": {"STATUS": 100, "ERROR_MSG": "認証に失敗しました。"}}
        });
        let err = parse_stats_data(&payload, 2020).unwrap_err();
        assert!(err.to_string().contains("認証"));
    }

    #[test]
    fn test_unexpected_shape_is_decode_error() {
        assert!(matches!(
            parse_stats_data(&json!({"foo": 1}), 2020),
            Err(SourceError::Decode(_))
        ));
    }

    #[test]
    fn test_not_configured_without_app_id() {
        let source = EStatApiSource::new(reqwest::Client::new(), None, default_census_tables());
        assert!(!source.is_configured(&FetchRequest::population(2020)));

        let source = EStatApiSource::new(
            reqwest::Client::new(),
            Some("id".to_string()),
            default_census_tables(),
        );
        assert!(source.is_configured(&FetchRequest::population(2020)));
        assert!(!source.is_configured(&FetchRequest::population(1995)));
    }

    #[tokio::test]
    async fn test_fetch_without_app_id_fails_fast() {
        let source = EStatApiSource::new(reqwest::Client::new(), None, default_census_tables());
        let err = source.fetch(&FetchRequest::population(2020)).await.unwrap_err();
        assert!(matches!(err, SourceError::NotConfigured(_)));
    }
}
