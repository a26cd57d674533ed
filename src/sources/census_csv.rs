// 📄 Census CSV source - published per-year export files (secondary)
// Download → encoding normalizer → row classifier

use super::{check_status, DataSource, FetchRequest, RawPayload};
use crate::classifier::parse_census_text;
use crate::config::CensusTable;
use crate::error::SourceError;
use crate::records::{Dataset, Snapshot};
use async_trait::async_trait;

pub struct CensusCsvSource {
    client: reqwest::Client,
    tables: Vec<CensusTable>,
}

impl CensusCsvSource {
    pub fn new(client: reqwest::Client, tables: Vec<CensusTable>) -> Self {
        CensusCsvSource { client, tables }
    }

    fn csv_url(&self, year: i32) -> Option<&str> {
        self.tables
            .iter()
            .find(|t| t.year == year)
            .and_then(|t| t.csv_url.as_deref())
    }
}

#[async_trait]
impl DataSource for CensusCsvSource {
    fn name(&self) -> &str {
        "census CSV download"
    }

    fn dataset(&self) -> Dataset {
        Dataset::Population
    }

    fn is_configured(&self, request: &FetchRequest) -> bool {
        self.csv_url(request.year).is_some()
    }

    async fn fetch_raw(&self, request: &FetchRequest) -> Result<RawPayload, SourceError> {
        let url = self.csv_url(request.year).ok_or_else(|| {
            SourceError::NotConfigured(format!("no census CSV published for {}", request.year))
        })?;

        tracing::info!(year = request.year, url, "Downloading census CSV");
        let response = self.client.get(url).send().await?;
        let bytes = check_status(response)?.bytes().await?;
        Ok(RawPayload::Bytes(bytes.to_vec()))
    }

    fn parse(&self, request: &FetchRequest, raw: RawPayload) -> Result<Snapshot, SourceError> {
        let bytes = raw.into_bytes()?;
        let (records, report) = parse_census_text(&bytes, request.year);
        tracing::info!(year = request.year, records = records.len(), "Census CSV: {}", report.summary());
        Ok(Snapshot::Regions(records))
    }
}
