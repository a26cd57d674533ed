// 🔀 Source Fallback Orchestrator
// CACHE → PRIMARY → SECONDARY → SYNTHETIC, first success wins

use crate::cache::CacheStore;
use crate::config::{PersistPolicy, SyntheticMode};
use crate::error::{CacheError, StatsError, StatsResult};
use crate::records::{Dataset, Snapshot};
use crate::sources::{DataSource, FetchRequest, SourceStatus, SyntheticGenerator};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// CORE TYPES
// ============================================================================

/// Where a resolved snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Cache,
    Primary,
    Secondary,
    Synthetic,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Origin::Cache => "cache",
            Origin::Primary => "primary",
            Origin::Secondary => "secondary",
            Origin::Synthetic => "synthetic",
        };
        f.write_str(name)
    }
}

/// Live source tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceTier {
    Primary,
    Secondary,
}

impl SourceTier {
    fn origin(&self) -> Origin {
        match self {
            SourceTier::Primary => Origin::Primary,
            SourceTier::Secondary => Origin::Secondary,
        }
    }
}

/// One step of the fallback chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Cache,
    Live(SourceTier),
    Synthetic,
}

/// Resolution - the snapshot plus how it was obtained
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub snapshot: Snapshot,
    pub origin: Origin,
    /// True when this call wrote the snapshot to the cache
    pub persisted: bool,
}

enum StepOutcome {
    Resolved(Resolution),
    FallThrough(String),
}

/// Live sources registered for one dataset
#[derive(Default, Clone)]
struct SourceChain {
    primary: Option<Arc<dyn DataSource>>,
    secondary: Option<Arc<dyn DataSource>>,
}

impl SourceChain {
    fn get(&self, tier: SourceTier) -> Option<&Arc<dyn DataSource>> {
        match tier {
            SourceTier::Primary => self.primary.as_ref(),
            SourceTier::Secondary => self.secondary.as_ref(),
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// FallbackOrchestrator - owns the cache handle and the per-dataset source chains
pub struct FallbackOrchestrator {
    cache: Arc<dyn CacheStore>,
    chains: HashMap<Dataset, SourceChain>,
    synthetic: SyntheticGenerator,
    synthetic_mode: SyntheticMode,
    persist_policy: PersistPolicy,
}

impl FallbackOrchestrator {
    pub fn new(cache: Arc<dyn CacheStore>) -> Self {
        FallbackOrchestrator {
            cache,
            chains: HashMap::new(),
            synthetic: SyntheticGenerator::new(),
            synthetic_mode: SyntheticMode::default(),
            persist_policy: PersistPolicy::default(),
        }
    }

    /// Builder pattern: register a live source for its dataset at a tier
    pub fn with_source(mut self, tier: SourceTier, source: Arc<dyn DataSource>) -> Self {
        let chain = self.chains.entry(source.dataset()).or_default();
        match tier {
            SourceTier::Primary => chain.primary = Some(source),
            SourceTier::Secondary => chain.secondary = Some(source),
        }
        self
    }

    /// Builder pattern: synthetic mode
    pub fn with_synthetic_mode(mut self, mode: SyntheticMode) -> Self {
        self.synthetic_mode = mode;
        self
    }

    /// Builder pattern: persist policy
    pub fn with_persist_policy(mut self, policy: PersistPolicy) -> Self {
        self.persist_policy = policy;
        self
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn synthetic_mode(&self) -> SyntheticMode {
        self.synthetic_mode
    }

    /// The ordered chain walked for a dataset
    pub fn steps(&self, dataset: Dataset) -> Vec<Step> {
        let mut steps = vec![Step::Cache];
        if let Some(chain) = self.chains.get(&dataset) {
            if chain.primary.is_some() {
                steps.push(Step::Live(SourceTier::Primary));
            }
            if chain.secondary.is_some() {
                steps.push(Step::Live(SourceTier::Secondary));
            }
        }
        if self.synthetic_mode == SyntheticMode::Fallback {
            steps.push(Step::Synthetic);
        }
        steps
    }

    /// Walk the chain for one request, stopping at the first step that resolves
    pub async fn resolve(&self, request: &FetchRequest) -> StatsResult<Resolution> {
        let mut reasons = Vec::new();

        for step in self.steps(request.dataset) {
            match self.run_step(step, request).await {
                StepOutcome::Resolved(resolution) => {
                    tracing::debug!(
                        dataset = %request.dataset,
                        year = request.year,
                        origin = %resolution.origin,
                        records = resolution.snapshot.len(),
                        "Request resolved"
                    );
                    return Ok(resolution);
                }
                StepOutcome::FallThrough(reason) => reasons.push(reason),
            }
        }

        Err(StatsError::SourceUnavailable {
            dataset: request.dataset,
            year: request.year,
            reason: reasons.join("; "),
        })
    }

    async fn run_step(&self, step: Step, request: &FetchRequest) -> StepOutcome {
        match step {
            Step::Cache => self.lookup_cache(request).await,
            Step::Live(tier) => self.fetch_live(tier, request).await,
            Step::Synthetic => {
                tracing::info!(
                    dataset = %request.dataset,
                    year = request.year,
                    "No live source available; using synthetic data"
                );
                StepOutcome::Resolved(Resolution {
                    snapshot: self.synthetic.generate(request),
                    origin: Origin::Synthetic,
                    persisted: false,
                })
            }
        }
    }

    /// Run a store call on the blocking pool; file stores do synchronous disk I/O
    async fn with_cache<T, F>(&self, op: F) -> Result<T, CacheError>
    where
        T: Send + 'static,
        F: FnOnce(&dyn CacheStore) -> Result<T, CacheError> + Send + 'static,
    {
        tokio::task::spawn_blocking({
            let cache = Arc::clone(&self.cache);
            move || op(cache.as_ref())
        })
        .await
        .map_err(|e| CacheError::Task(format!("Task join error: {}", e)))?
    }

    async fn lookup_cache(&self, request: &FetchRequest) -> StepOutcome {
        let key = request.cache_key();
        let lookup = {
            let key = key.clone();
            self.with_cache(move |cache| cache.get(&key)).await
        };
        match lookup {
            Ok(Some(snapshot)) if !snapshot.is_empty() => StepOutcome::Resolved(Resolution {
                snapshot,
                origin: Origin::Cache,
                persisted: false,
            }),
            Ok(_) => StepOutcome::FallThrough(format!("cache miss for {}", key)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Unreadable cache entry treated as a miss");
                StepOutcome::FallThrough(format!("cache: {}", e))
            }
        }
    }

    async fn fetch_live(&self, tier: SourceTier, request: &FetchRequest) -> StepOutcome {
        let Some(source) = self.chains.get(&request.dataset).and_then(|c| c.get(tier)) else {
            return StepOutcome::FallThrough(format!("no {:?} source", tier));
        };

        let snapshot = match source.fetch(request).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(
                    source = source.name(),
                    dataset = %request.dataset,
                    year = request.year,
                    error = %e,
                    "Live source failed"
                );
                return StepOutcome::FallThrough(format!("{}: {}", source.name(), e));
            }
        };

        let persisted = if self.should_persist(tier) {
            self.persist(request, &snapshot).await
        } else {
            false
        };

        StepOutcome::Resolved(Resolution {
            snapshot,
            origin: tier.origin(),
            persisted,
        })
    }

    fn should_persist(&self, tier: SourceTier) -> bool {
        match self.persist_policy {
            PersistPolicy::AllLive => true,
            PersistPolicy::PrimaryOnly => tier == SourceTier::Primary,
        }
    }

    /// A failed write is logged; the fetched data is still returned
    async fn persist(&self, request: &FetchRequest, snapshot: &Snapshot) -> bool {
        let key = request.cache_key();
        let written = {
            let (key, snapshot) = (key.clone(), snapshot.clone());
            self.with_cache(move |cache| cache.put(&key, &snapshot)).await
        };
        match written {
            Ok(()) => {
                tracing::info!(key = %key, records = snapshot.len(), "Cached live snapshot");
                true
            }
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Failed to cache live snapshot");
                false
            }
        }
    }

    /// Configuration status of every registered live source for a sample request
    pub fn source_status(&self) -> Vec<SourceStatus> {
        let mut datasets: Vec<&Dataset> = self.chains.keys().collect();
        datasets.sort();

        let mut status = Vec::new();
        for dataset in datasets {
            let probe = match dataset {
                Dataset::Population => FetchRequest::population(2020),
                Dataset::RealEstate => FetchRequest::realestate(2020, "13", None),
            };
            let chain = &self.chains[dataset];
            for source in [chain.primary.as_ref(), chain.secondary.as_ref()].into_iter().flatten() {
                status.push(SourceStatus {
                    name: source.name().to_string(),
                    dataset: *dataset,
                    configured: source.is_configured(&probe),
                });
            }
        }
        status
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::cache::{CacheKey, MemoryCacheStore};
    use crate::error::SourceError;
    use crate::records::{RegionRecord, TransactionRecord};
    use crate::sources::RawPayload;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-test source returning a fixed snapshot, or failing
    pub(crate) struct FakeSource {
        pub dataset: Dataset,
        pub snapshot: Option<Snapshot>,
        pub calls: AtomicUsize,
    }

    impl FakeSource {
        pub fn ok(snapshot: Snapshot) -> Arc<FakeSource> {
            let dataset = match snapshot {
                Snapshot::Regions(_) => Dataset::Population,
                Snapshot::Transactions(_) => Dataset::RealEstate,
            };
            Arc::new(FakeSource {
                dataset,
                snapshot: Some(snapshot),
                calls: AtomicUsize::new(0),
            })
        }

        pub fn failing(dataset: Dataset) -> Arc<FakeSource> {
            Arc::new(FakeSource {
                dataset,
                snapshot: None,
                calls: AtomicUsize::new(0),
            })
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl DataSource for FakeSource {
        fn name(&self) -> &str {
            "fake"
        }

        fn dataset(&self) -> Dataset {
            self.dataset
        }

        fn is_configured(&self, _request: &FetchRequest) -> bool {
            true
        }

        async fn fetch_raw(&self, _request: &FetchRequest) -> Result<RawPayload, SourceError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.snapshot {
                Some(snapshot) => Ok(RawPayload::Json(serde_json::to_value(snapshot)?)),
                None => Err(SourceError::Status(503)),
            }
        }

        fn parse(&self, _request: &FetchRequest, _raw: RawPayload) -> Result<Snapshot, SourceError> {
            self.snapshot.clone().ok_or(SourceError::Empty)
        }
    }

    fn regions(value: i64) -> Snapshot {
        Snapshot::Regions(vec![RegionRecord::new("13101", "東京都", "千代田区", 2020, value)])
    }

    fn memory() -> Arc<MemoryCacheStore> {
        Arc::new(MemoryCacheStore::new())
    }

    #[tokio::test]
    async fn test_cache_hit_skips_sources() {
        let cache = memory();
        cache.put(&CacheKey::population(2020), &regions(1)).unwrap();
        let primary = FakeSource::ok(regions(2));

        let orchestrator = FallbackOrchestrator::new(cache.clone())
            .with_source(SourceTier::Primary, primary.clone());
        let resolution = orchestrator.resolve(&FetchRequest::population(2020)).await.unwrap();

        assert_eq!(resolution.origin, Origin::Cache);
        assert_eq!(resolution.snapshot, regions(1));
        assert_eq!(primary.calls(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_file_store_round_trip_through_resolve() {
        let dir = tempfile::TempDir::new().unwrap();
        let cache: Arc<dyn CacheStore> = Arc::new(crate::cache::FileCacheStore::new(dir.path()));
        let primary = FakeSource::ok(regions(5));
        let orchestrator = Arc::new(
            FallbackOrchestrator::new(cache).with_source(SourceTier::Primary, primary.clone()),
        );

        let first = orchestrator.resolve(&FetchRequest::population(2020)).await.unwrap();
        assert_eq!(first.origin, Origin::Primary);
        assert!(first.persisted);
        assert!(dir.path().join("population_2020.json").exists());

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let orchestrator = Arc::clone(&orchestrator);
                tokio::spawn(async move { orchestrator.resolve(&FetchRequest::population(2020)).await })
            })
            .collect();
        for reader in readers {
            let resolution = reader.await.unwrap().unwrap();
            assert_eq!(resolution.origin, Origin::Cache);
            assert_eq!(resolution.snapshot, regions(5));
        }
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_primary_result_is_persisted() {
        let cache = memory();
        let orchestrator = FallbackOrchestrator::new(cache.clone())
            .with_source(SourceTier::Primary, FakeSource::ok(regions(2)));

        let resolution = orchestrator.resolve(&FetchRequest::population(2020)).await.unwrap();
        assert_eq!(resolution.origin, Origin::Primary);
        assert!(resolution.persisted);
        assert_eq!(cache.get(&CacheKey::population(2020)).unwrap(), Some(regions(2)));
    }

    #[tokio::test]
    async fn test_secondary_after_primary_failure() {
        let cache = memory();
        let primary = FakeSource::failing(Dataset::Population);
        let orchestrator = FallbackOrchestrator::new(cache.clone())
            .with_source(SourceTier::Primary, primary.clone())
            .with_source(SourceTier::Secondary, FakeSource::ok(regions(3)));

        let resolution = orchestrator.resolve(&FetchRequest::population(2020)).await.unwrap();
        assert_eq!(resolution.origin, Origin::Secondary);
        assert!(resolution.persisted);
        assert_eq!(primary.calls(), 1);
    }

    #[tokio::test]
    async fn test_primary_only_policy_does_not_cache_secondary() {
        let cache = memory();
        let orchestrator = FallbackOrchestrator::new(cache.clone())
            .with_source(SourceTier::Primary, FakeSource::failing(Dataset::Population))
            .with_source(SourceTier::Secondary, FakeSource::ok(regions(3)))
            .with_persist_policy(PersistPolicy::PrimaryOnly);

        let resolution = orchestrator.resolve(&FetchRequest::population(2020)).await.unwrap();
        assert_eq!(resolution.origin, Origin::Secondary);
        assert!(!resolution.persisted);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_empty_primary_falls_through() {
        let cache = memory();
        let orchestrator = FallbackOrchestrator::new(cache.clone())
            .with_source(SourceTier::Primary, FakeSource::ok(Snapshot::Regions(vec![])))
            .with_source(SourceTier::Secondary, FakeSource::ok(regions(4)));

        let resolution = orchestrator.resolve(&FetchRequest::population(2020)).await.unwrap();
        assert_eq!(resolution.origin, Origin::Secondary);
    }

    #[tokio::test]
    async fn test_empty_cache_entry_is_a_miss() {
        let cache = memory();
        cache
            .put(&CacheKey::population(2020), &Snapshot::Regions(vec![]))
            .unwrap();
        let orchestrator = FallbackOrchestrator::new(cache.clone())
            .with_source(SourceTier::Primary, FakeSource::ok(regions(5)));

        let resolution = orchestrator.resolve(&FetchRequest::population(2020)).await.unwrap();
        assert_eq!(resolution.origin, Origin::Primary);
    }

    #[tokio::test]
    async fn test_synthetic_is_deterministic_and_not_persisted() {
        let cache = memory();
        let orchestrator = FallbackOrchestrator::new(cache.clone())
            .with_source(SourceTier::Primary, FakeSource::failing(Dataset::RealEstate));
        let request = FetchRequest::realestate(2020, "13", Some("13101"));

        let first = orchestrator.resolve(&request).await.unwrap();
        let second = orchestrator.resolve(&request).await.unwrap();

        assert_eq!(first.origin, Origin::Synthetic);
        assert!(!first.persisted);
        assert_eq!(first.snapshot, second.snapshot);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_disabled_synthetic_surfaces_source_unavailable() {
        let orchestrator = FallbackOrchestrator::new(memory())
            .with_source(SourceTier::Primary, FakeSource::failing(Dataset::Population))
            .with_synthetic_mode(SyntheticMode::Disabled);

        let err = orchestrator
            .resolve(&FetchRequest::population(2010))
            .await
            .unwrap_err();
        match err {
            StatsError::SourceUnavailable { dataset, year, reason } => {
                assert_eq!(dataset, Dataset::Population);
                assert_eq!(year, 2010);
                assert!(reason.contains("503"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_steps_order() {
        let orchestrator = FallbackOrchestrator::new(memory())
            .with_source(SourceTier::Secondary, FakeSource::failing(Dataset::Population))
            .with_source(SourceTier::Primary, FakeSource::failing(Dataset::Population));

        assert_eq!(
            orchestrator.steps(Dataset::Population),
            vec![
                Step::Cache,
                Step::Live(SourceTier::Primary),
                Step::Live(SourceTier::Secondary),
                Step::Synthetic
            ]
        );
        assert_eq!(
            orchestrator.steps(Dataset::RealEstate),
            vec![Step::Cache, Step::Synthetic]
        );
    }

    #[test]
    fn test_sources_register_under_their_dataset() {
        let tx = Snapshot::Transactions(vec![TransactionRecord::new("東京都", "港区")]);
        let orchestrator = FallbackOrchestrator::new(memory())
            .with_source(SourceTier::Primary, FakeSource::ok(tx));

        let status = orchestrator.source_status();
        assert_eq!(status.len(), 1);
        assert_eq!(status[0].dataset, Dataset::RealEstate);
        assert!(status[0].configured);
    }
}
