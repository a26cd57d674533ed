// 💾 Cache Store - immutable snapshots keyed by (dataset, year, scope)
// Snapshots are replaced wholesale; a reader never sees a half-written file.

use crate::error::CacheError;
use crate::records::{Dataset, RegionRecord, Scope, Snapshot, TransactionRecord};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use uuid::Uuid;

// ============================================================================
// CACHE KEY
// ============================================================================

/// Stem tag in front of a price-classification filter
const PRICE_CLASS_TAG: &str = "pc";

/// CacheKey - composite key of one snapshot
///
/// Encodes as `<dataset>_<year>[_<prefecture>[_<region>]][_pc<classification>]`.
/// A filtered fetch is a different snapshot from the unfiltered one, so the
/// filter is part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub dataset: Dataset,
    pub year: i32,
    pub scope: Scope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_classification: Option<String>,
}

impl CacheKey {
    /// Population keys carry the year only; any scope passed for them is dropped
    pub fn new(dataset: Dataset, year: i32, scope: Scope) -> Self {
        let scope = if dataset.is_region_partitioned() {
            scope
        } else {
            Scope::none()
        };
        CacheKey {
            dataset,
            year,
            scope,
            price_classification: None,
        }
    }

    /// Builder pattern: price-classification filter (real estate only; blank means none)
    pub fn with_price_classification(mut self, classification: Option<&str>) -> Self {
        let partitioned = self.dataset.is_region_partitioned();
        self.price_classification = classification
            .map(str::trim)
            .filter(|c| partitioned && !c.is_empty())
            .map(str::to_string);
        self
    }

    pub fn population(year: i32) -> Self {
        CacheKey::new(Dataset::Population, year, Scope::none())
    }

    pub fn realestate(year: i32, pref_code: &str, region_code: Option<&str>) -> Self {
        let scope = match region_code {
            Some(region) => Scope::region(pref_code, region),
            None => Scope::prefecture(pref_code),
        };
        CacheKey::new(Dataset::RealEstate, year, scope)
    }

    /// File stem, e.g. "realestate_2020_13_13101"
    pub fn stem(&self) -> String {
        let mut stem = format!("{}_{}", self.dataset.key_prefix(), self.year);
        if let Some(pref) = &self.scope.prefecture {
            stem.push('_');
            stem.push_str(pref);
            if let Some(region) = &self.scope.region {
                stem.push('_');
                stem.push_str(region);
            }
        }
        if let Some(classification) = &self.price_classification {
            stem.push('_');
            stem.push_str(PRICE_CLASS_TAG);
            stem.push_str(classification);
        }
        stem
    }

    /// Parse a file stem back into a key
    pub fn parse(stem: &str) -> Option<CacheKey> {
        let mut parts: Vec<&str> = stem.split('_').collect();
        let price_classification = match parts.last() {
            Some(last) if parts.len() > 2 && last.starts_with(PRICE_CLASS_TAG) => {
                let classification = &last[PRICE_CLASS_TAG.len()..];
                if classification.is_empty() {
                    return None;
                }
                let classification = classification.to_string();
                parts.pop();
                Some(classification)
            }
            _ => None,
        };

        let mut parts = parts.into_iter();
        let dataset = Dataset::from_prefix(parts.next()?)?;
        let year: i32 = parts.next()?.parse().ok()?;
        let prefecture = parts.next().map(|p| p.to_string());
        let region = parts.next().map(|r| r.to_string());

        if parts.next().is_some() {
            return None;
        }
        let scoped = prefecture.is_some() || price_classification.is_some();
        if !dataset.is_region_partitioned() && scoped {
            return None;
        }

        Some(CacheKey {
            dataset,
            year,
            scope: Scope { prefecture, region },
            price_classification,
        })
    }

    /// Path relative to the cache root
    pub fn relative_path(&self) -> PathBuf {
        let file = format!("{}.json", self.stem());
        match self.dataset {
            Dataset::Population => PathBuf::from(file),
            Dataset::RealEstate => Path::new(self.dataset.key_prefix()).join(file),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.stem())
    }
}

// ============================================================================
// STORE TRAIT
// ============================================================================

/// Storage interface behind the orchestrator
pub trait CacheStore: Send + Sync {
    /// Ok(None) when nothing is stored under the key
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot>, CacheError>;

    /// Replace the snapshot under `key` atomically
    fn put(&self, key: &CacheKey, snapshot: &Snapshot) -> Result<(), CacheError>;

    /// Every stored key of a dataset, sorted
    fn list_keys(&self, dataset: Dataset) -> Result<Vec<CacheKey>, CacheError>;
}

fn check_shape(key: &CacheKey, snapshot: &Snapshot) -> Result<(), CacheError> {
    let matches = match key.dataset {
        Dataset::Population => snapshot.regions().is_some(),
        Dataset::RealEstate => snapshot.transactions().is_some(),
    };
    if matches {
        Ok(())
    } else {
        Err(CacheError::ShapeMismatch(key.dataset))
    }
}

// ============================================================================
// FILE STORE
// ============================================================================

/// FileCacheStore - one pretty-printed UTF-8 JSON array per key
///
/// Layout: `<root>/population_<year>.json`, `<root>/realestate/realestate_<year>_<pref>[_<region>].json`
pub struct FileCacheStore {
    root: PathBuf,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileCacheStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.relative_path())
    }

    fn io_error(path: &Path, source: io::Error) -> CacheError {
        CacheError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    fn decode(key: &CacheKey, path: &Path, bytes: &[u8]) -> Result<Snapshot, CacheError> {
        let corrupt = |source| CacheError::Corrupt {
            path: path.display().to_string(),
            source,
        };

        match key.dataset {
            Dataset::Population => {
                let mut records: Vec<RegionRecord> =
                    serde_json::from_slice(bytes).map_err(corrupt)?;
                for record in records.iter_mut().filter(|r| r.year == 0) {
                    record.year = key.year;
                }
                Ok(Snapshot::Regions(records))
            }
            Dataset::RealEstate => {
                let records: Vec<TransactionRecord> =
                    serde_json::from_slice(bytes).map_err(corrupt)?;
                Ok(Snapshot::Transactions(records))
            }
        }
    }

    /// Write to a uniquely named sibling temp file, fsync, then rename over the target
    fn write_atomic(path: &Path, payload: &[u8]) -> Result<(), CacheError> {
        let dir = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir).map_err(|e| Self::io_error(dir, e))?;

        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let tmp = dir.join(format!(".{}.{}.tmp", stem, Uuid::new_v4()));

        let result = (|| -> io::Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(payload)?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(Self::io_error(path, e));
        }
        Ok(())
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot>, CacheError> {
        let path = self.path_for(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Self::io_error(&path, e)),
        };

        Self::decode(key, &path, &bytes).map(Some)
    }

    fn put(&self, key: &CacheKey, snapshot: &Snapshot) -> Result<(), CacheError> {
        check_shape(key, snapshot)?;

        let path = self.path_for(key);
        let payload = serde_json::to_vec_pretty(snapshot).map_err(|source| CacheError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;

        Self::write_atomic(&path, &payload)?;
        tracing::debug!(key = %key, records = snapshot.len(), "Snapshot written");
        Ok(())
    }

    fn list_keys(&self, dataset: Dataset) -> Result<Vec<CacheKey>, CacheError> {
        let dir = match dataset {
            Dataset::Population => self.root.clone(),
            Dataset::RealEstate => self.root.join(dataset.key_prefix()),
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Self::io_error(&dir, e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| Self::io_error(&dir, e))?;
            let name = entry.file_name().to_string_lossy().to_string();

            // Temp files are dot-prefixed
            if name.starts_with('.') {
                continue;
            }
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            if let Some(key) = CacheKey::parse(stem).filter(|k| k.dataset == dataset) {
                keys.push(key);
            }
        }

        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// MEMORY STORE
// ============================================================================

/// MemoryCacheStore - in-process store, mainly for tests and dry runs
#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, Snapshot>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> Result<Option<Snapshot>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &CacheKey, snapshot: &Snapshot) -> Result<(), CacheError> {
        check_shape(key, snapshot)?;
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.clone(), snapshot.clone());
        Ok(())
    }

    fn list_keys(&self, dataset: Dataset) -> Result<Vec<CacheKey>, CacheError> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<CacheKey> = entries
            .keys()
            .filter(|k| k.dataset == dataset)
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// ============================================================================
// TESTS
// ============================================================================
