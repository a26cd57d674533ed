// 🧭 StatsService - request surface over validation, orchestrator and aggregation
// Built once from Settings and shared by reference (Arc) between handlers.

use crate::aggregation;
use crate::cache::{CacheKey, CacheStore, FileCacheStore};
use crate::classifier::{parse_census_text, ParseReport};
use crate::config::Settings;
use crate::error::{InvalidRequest, SourceError, StatsError, StatsResult};
use crate::orchestrator::{FallbackOrchestrator, Resolution, SourceTier};
use crate::records::{
    Dataset, MunicipalityEntry, Scope, Snapshot, SummaryStatistic, TimeSeries,
};
use crate::sources::{FetchRequest, LiveSources, SourceStatus, SyntheticGenerator};
use crate::validation::RequestGuard;
use anyhow::{Context, Result};
use chrono::Datelike;
use std::path::Path;
use std::sync::Arc;

/// Default year span of real-estate series requests
pub const DEFAULT_SERIES_START: i32 = 2015;
pub const DEFAULT_SERIES_END: i32 = 2023;

pub struct StatsService {
    settings: Settings,
    guard: RequestGuard,
    orchestrator: FallbackOrchestrator,
}

impl StatsService {
    /// Wire the file cache and every live source from settings
    pub fn from_settings(settings: Settings) -> Result<StatsService, SourceError> {
        let cache: Arc<dyn CacheStore> = Arc::new(FileCacheStore::new(&settings.cache_dir));
        let live = LiveSources::from_settings(&settings)?;

        let orchestrator = FallbackOrchestrator::new(cache)
            .with_source(SourceTier::Primary, live.population_primary)
            .with_source(SourceTier::Secondary, live.population_secondary)
            .with_source(SourceTier::Primary, live.realestate_primary)
            .with_synthetic_mode(settings.synthetic_mode)
            .with_persist_policy(settings.persist_policy);

        Ok(StatsService::new(settings, orchestrator))
    }

    /// Use a pre-built orchestrator (tests, alternate stores)
    pub fn new(settings: Settings, orchestrator: FallbackOrchestrator) -> Self {
        StatsService {
            guard: RequestGuard::from_settings(&settings),
            settings,
            orchestrator,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn guard(&self) -> &RequestGuard {
        &self.guard
    }

    fn cache(&self) -> &Arc<dyn CacheStore> {
        self.orchestrator.cache()
    }

    // ========================================================================
    // REQUEST SURFACE
    // ========================================================================

    /// Years that can be requested, newest first
    ///
    /// Population: census years ∪ years with a cached snapshot.
    /// Real estate: the configured range, capped at the current year.
    pub fn available_years(&self, dataset: Dataset) -> StatsResult<Vec<i32>> {
        let mut years = match dataset {
            Dataset::Population => {
                let mut years = self.settings.census_years();
                years.extend(self.cache().list_keys(dataset)?.into_iter().map(|k| k.year));
                years
            }
            Dataset::RealEstate => {
                let range = self.settings.realestate_years;
                let max = range.max.min(chrono::Local::now().year());
                (range.min..=max).collect()
            }
        };

        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        Ok(years)
    }

    /// Full batch for (dataset, year, scope), with its origin
    pub async fn region_batch(
        &self,
        dataset: Dataset,
        year: i32,
        scope: Scope,
    ) -> StatsResult<Resolution> {
        let request = match dataset {
            Dataset::Population => {
                let available = self.available_years(dataset)?;
                self.guard.population_year(year, &available)?;
                FetchRequest::population(year)
            }
            Dataset::RealEstate => {
                self.guard.realestate_year(year)?;
                let scope = self.realestate_scope(scope)?;
                FetchRequest::new(dataset, year, scope)
            }
        };

        self.orchestrator.resolve(&request).await
    }

    /// Transactions for a prefecture (and optional city), with price-class filter
    pub async fn transactions(
        &self,
        year: i32,
        scope: Scope,
        price_classification: Option<String>,
    ) -> StatsResult<Resolution> {
        self.guard.realestate_year(year)?;
        let scope = self.realestate_scope(scope)?;
        let request = FetchRequest::new(Dataset::RealEstate, year, scope)
            .with_price_classification(price_classification);
        self.orchestrator.resolve(&request).await
    }

    /// Per-year history of one region over every available year
    pub async fn time_series(&self, dataset: Dataset, code: &str) -> StatsResult<TimeSeries> {
        self.guard.region_code(code)?;
        let years = self.available_years(dataset)?;
        aggregation::time_series(&self.orchestrator, dataset, code, &years).await
    }

    /// Summary for up to 50 codes; validated before anything is fetched
    pub async fn summary<S: AsRef<str>>(
        &self,
        dataset: Dataset,
        year: i32,
        codes: &[S],
    ) -> StatsResult<Vec<SummaryStatistic>> {
        self.guard.region_codes(codes)?;
        match dataset {
            Dataset::Population => {
                let available = self.available_years(dataset)?;
                self.guard.population_year(year, &available)?;
            }
            Dataset::RealEstate => self.guard.realestate_year(year)?,
        }

        Ok(aggregation::summary(&self.orchestrator, dataset, year, codes).await)
    }

    /// Real-estate summary per year for one code (default 2015-2023)
    pub async fn transaction_series(
        &self,
        code: &str,
        start: Option<i32>,
        end: Option<i32>,
    ) -> StatsResult<Vec<SummaryStatistic>> {
        let start = start.unwrap_or(DEFAULT_SERIES_START);
        let end = end.unwrap_or(DEFAULT_SERIES_END);
        self.guard.region_code(code)?;
        self.guard.realestate_years(start, end)?;
        aggregation::transaction_series(&self.orchestrator, code, start, end).await
    }

    /// Municipalities of the most recent population year
    pub async fn municipality_list(&self) -> StatsResult<Vec<MunicipalityEntry>> {
        let Some(&latest) = self.available_years(Dataset::Population)?.first() else {
            return Ok(Vec::new());
        };

        let resolution = self.orchestrator.resolve(&FetchRequest::population(latest)).await?;
        Ok(resolution
            .snapshot
            .into_regions()
            .into_iter()
            .map(|r| MunicipalityEntry {
                code: r.code,
                prefecture: r.prefecture,
                municipality: r.municipality,
            })
            .collect())
    }

    pub fn source_status(&self) -> Vec<SourceStatus> {
        self.orchestrator.source_status()
    }

    fn realestate_scope(&self, scope: Scope) -> Result<Scope, InvalidRequest> {
        if let Some(region) = scope.region.as_deref() {
            self.guard.region_code(region)?;
        }
        let prefecture = match (scope.prefecture.as_deref(), scope.region.as_deref()) {
            (Some(pref), _) => pref.to_string(),
            (None, Some(region)) => region[..2].to_string(),
            (None, None) => {
                return Err(InvalidRequest::InvalidPrefectureCode {
                    code: String::new(),
                })
            }
        };
        self.guard.prefecture_code(&prefecture)?;

        Ok(Scope {
            prefecture: Some(prefecture),
            region: scope.region,
        })
    }

    // ========================================================================
    // OFFLINE INGEST
    // ========================================================================

    /// Parse a local census export and store it as the population snapshot for `year`
    pub fn import_census_file(&self, path: &Path, year: i32) -> Result<ParseReport> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read census file {}", path.display()))?;

        let (records, report) = parse_census_text(&bytes, year);
        if records.is_empty() {
            anyhow::bail!(
                "No region rows recognised in {} ({})",
                path.display(),
                report.summary()
            );
        }

        self.cache()
            .put(&CacheKey::population(year), &Snapshot::Regions(records))
            .with_context(|| format!("Failed to cache population {}", year))?;
        Ok(report)
    }

    /// Explicitly write synthetic population data for a year (never done implicitly)
    pub fn write_synthetic_population(&self, year: i32) -> StatsResult<usize> {
        let snapshot = SyntheticGenerator::new().generate(&FetchRequest::population(year));
        self.cache().put(&CacheKey::population(year), &snapshot)?;
        Ok(snapshot.len())
    }
}

// ============================================================================
// TESTS
// ============================================================================
