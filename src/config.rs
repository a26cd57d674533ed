// ⚙️ Settings - credentials, cache location, census tables, fallback policies
// Resolution order: secrets.json → environment (.env loaded first) → defaults

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub const DEFAULT_SECRETS_FILE: &str = "secrets.json";
pub const DEFAULT_CACHE_DIR: &str = "data/cache";

pub const ENV_ESTAT_APP_ID: &str = "ESTAT_APP_ID";
pub const ENV_REINFOLIB_API_KEY: &str = "REINFOLIB_API_KEY";
pub const ENV_CACHE_DIR: &str = "REGIONAL_STATS_CACHE_DIR";
pub const ENV_SYNTHETIC: &str = "REGIONAL_STATS_SYNTHETIC";
pub const ENV_PERSIST: &str = "REGIONAL_STATS_PERSIST";

// ============================================================================
// POLICIES
// ============================================================================

/// What to do once every live source has failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticMode {
    /// Return deterministic placeholder data (never persisted)
    #[default]
    Fallback,
    /// Surface SourceUnavailable instead
    Disabled,
}

impl FromStr for SyntheticMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fallback" | "on" | "true" | "1" => Ok(SyntheticMode::Fallback),
            "disabled" | "off" | "false" | "0" => Ok(SyntheticMode::Disabled),
            other => Err(format!("unknown synthetic mode '{}'", other)),
        }
    }
}

/// Which live results get written to the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistPolicy {
    /// Primary and secondary results are both cached
    #[default]
    AllLive,
    /// Only the primary source's results are cached
    PrimaryOnly,
}

impl FromStr for PersistPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "all_live" | "all" => Ok(PersistPolicy::AllLive),
            "primary_only" | "primary" => Ok(PersistPolicy::PrimaryOnly),
            other => Err(format!("unknown persist policy '{}'", other)),
        }
    }
}

// ============================================================================
// CENSUS TABLES & YEAR RANGES
// ============================================================================

/// CensusTable - where one census year can be fetched from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CensusTable {
    pub year: i32,
    /// e-Stat statsDataId
    pub stats_data_id: String,
    /// Direct CSV download, when one is published
    #[serde(default)]
    pub csv_url: Option<String>,
    pub description: String,
}

impl CensusTable {
    fn new(year: i32, stats_data_id: &str, csv_url: Option<&str>, description: &str) -> Self {
        CensusTable {
            year,
            stats_data_id: stats_data_id.to_string(),
            csv_url: csv_url.map(|u| u.to_string()),
            description: description.to_string(),
        }
    }
}

/// Census years shipped by default, newest first
pub fn default_census_tables() -> Vec<CensusTable> {
    vec![
        CensusTable::new(
            2020,
            "0003448237",
            Some("https://www.e-stat.go.jp/stat-search/file-download?statInfId=000032143614&fileKind=1"),
            "令和2年国勢調査",
        ),
        CensusTable::new(
            2015,
            "0003149105",
            Some("https://www.e-stat.go.jp/stat-search/file-download?statInfId=000031524010&fileKind=1"),
            "平成27年国勢調査",
        ),
        CensusTable::new(2010, "0003037985", None, "平成22年国勢調査"),
        CensusTable::new(2005, "0003004051", None, "平成17年国勢調査"),
        CensusTable::new(2000, "0003004005", None, "平成12年国勢調査"),
    ]
}

/// Inclusive year bounds accepted by the request guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: i32,
    pub max: i32,
}

impl YearRange {
    pub fn new(min: i32, max: i32) -> Self {
        YearRange { min, max }
    }

    pub fn contains(&self, year: i32) -> bool {
        (self.min..=self.max).contains(&year)
    }
}

// ============================================================================
// SECRETS FILE
// ============================================================================

/// Contents of secrets.json. Unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Secrets {
    #[serde(default)]
    pub estat_app_id: Option<String>,
    #[serde(default)]
    pub reinfolib_api_key: Option<String>,
}

impl Secrets {
    /// Read a secrets file. Missing file → empty; unreadable file → warning + empty.
    pub fn load(path: &Path) -> Secrets {
        if !path.exists() {
            return Secrets::default();
        }

        let parsed = fs::read_to_string(path)
            .map_err(|e| e.to_string())
            .and_then(|text| serde_json::from_str::<Secrets>(&text).map_err(|e| e.to_string()));

        match parsed {
            Ok(secrets) => secrets,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read secrets file");
                Secrets::default()
            }
        }
    }
}

// ============================================================================
// SETTINGS
// ============================================================================

/// Settings - everything a StatsService is built from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(skip_serializing)]
    pub estat_app_id: Option<String>,
    #[serde(skip_serializing)]
    pub reinfolib_api_key: Option<String>,

    pub cache_dir: PathBuf,
    pub census_tables: Vec<CensusTable>,

    pub population_timeout_secs: u64,
    pub realestate_timeout_secs: u64,

    /// Bounds for population requests (also limited to the census years)
    pub population_years: YearRange,
    pub realestate_years: YearRange,

    pub synthetic_mode: SyntheticMode,
    pub persist_policy: PersistPolicy,

    /// Where secrets were read from (reported by log_status)
    pub secrets_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            estat_app_id: None,
            reinfolib_api_key: None,
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            census_tables: default_census_tables(),
            population_timeout_secs: 60,
            realestate_timeout_secs: 120,
            population_years: YearRange::new(2000, 2025),
            realestate_years: YearRange::new(2005, 2025),
            synthetic_mode: SyntheticMode::default(),
            persist_policy: PersistPolicy::default(),
            secrets_path: PathBuf::from(DEFAULT_SECRETS_FILE),
        }
    }
}

impl Settings {
    /// Load from ./secrets.json and the process environment
    pub fn load() -> Settings {
        Settings::load_from(Path::new(DEFAULT_SECRETS_FILE))
    }

    /// Load using an explicit secrets file
    pub fn load_from(secrets_path: &Path) -> Settings {
        // .env only fills variables that are not already set
        let _ = dotenvy::dotenv();

        let secrets = Secrets::load(secrets_path);
        let mut settings = Settings::resolve(secrets, |name| std::env::var(name).ok());
        settings.secrets_path = secrets_path.to_path_buf();
        settings
    }

    /// Merge secrets and an environment lookup over the defaults
    pub fn resolve<F>(secrets: Secrets, env: F) -> Settings
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_value = |name: &str| env(name).filter(|v| !v.trim().is_empty());
        let mut settings = Settings::default();

        settings.estat_app_id = non_empty(secrets.estat_app_id).or_else(|| env_value(ENV_ESTAT_APP_ID));
        settings.reinfolib_api_key =
            non_empty(secrets.reinfolib_api_key).or_else(|| env_value(ENV_REINFOLIB_API_KEY));

        if let Some(dir) = env_value(ENV_CACHE_DIR) {
            settings.cache_dir = PathBuf::from(dir);
        }

        if let Some(raw) = env_value(ENV_SYNTHETIC) {
            match raw.parse() {
                Ok(mode) => settings.synthetic_mode = mode,
                Err(e) => tracing::warn!("{}: {}; keeping default", ENV_SYNTHETIC, e),
            }
        }

        if let Some(raw) = env_value(ENV_PERSIST) {
            match raw.parse() {
                Ok(policy) => settings.persist_policy = policy,
                Err(e) => tracing::warn!("{}: {}; keeping default", ENV_PERSIST, e),
            }
        }

        settings
    }

    /// Builder pattern: cache directory
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
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

    pub fn is_estat_configured(&self) -> bool {
        self.estat_app_id.is_some()
    }

    pub fn is_reinfolib_configured(&self) -> bool {
        self.reinfolib_api_key.is_some()
    }

    /// Census years, newest first
    pub fn census_years(&self) -> Vec<i32> {
        let mut years: Vec<i32> = self.census_tables.iter().map(|t| t.year).collect();
        years.sort_unstable_by(|a, b| b.cmp(a));
        years.dedup();
        years
    }

    pub fn census_table(&self, year: i32) -> Option<&CensusTable> {
        self.census_tables.iter().find(|t| t.year == year)
    }

    /// Log which sources are usable
    pub fn log_status(&self) {
        tracing::info!(
            estat = if self.is_estat_configured() { "configured" } else { "not configured" },
            reinfolib = if self.is_reinfolib_configured() { "configured" } else { "not configured" },
            synthetic = ?self.synthetic_mode,
            persist = ?self.persist_policy,
            cache_dir = %self.cache_dir.display(),
            secrets = %self.secrets_path.display(),
            "API settings"
        );
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::resolve(Secrets::default(), env_of(&[]));
        assert!(!settings.is_estat_configured());
        assert!(!settings.is_reinfolib_configured());
        assert_eq!(settings.cache_dir, PathBuf::from("data/cache"));
        assert_eq!(settings.census_years(), vec![2020, 2015, 2010, 2005, 2000]);
        assert_eq!(settings.population_timeout_secs, 60);
        assert_eq!(settings.realestate_timeout_secs, 120);
        assert_eq!(settings.synthetic_mode, SyntheticMode::Fallback);
        assert_eq!(settings.persist_policy, PersistPolicy::AllLive);
    }

    #[test]
    fn test_secrets_win_over_env() {
        let secrets = Secrets {
            estat_app_id: Some("from-file".to_string()),
            reinfolib_api_key: None,
        };
        let settings = Settings::resolve(
            secrets,
            env_of(&[
                (ENV_ESTAT_APP_ID, "from-env"),
                (ENV_REINFOLIB_API_KEY, "key-env"),
            ]),
        );
        assert_eq!(settings.estat_app_id.as_deref(), Some("from-file"));
        assert_eq!(settings.reinfolib_api_key.as_deref(), Some("key-env"));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let secrets = Secrets {
            estat_app_id: Some("  ".to_string()),
            reinfolib_api_key: None,
        };
        let settings = Settings::resolve(secrets, env_of(&[(ENV_REINFOLIB_API_KEY, "")]));
        assert!(!settings.is_estat_configured());
        assert!(!settings.is_reinfolib_configured());
    }

    #[test]
    fn test_env_policies() {
        let settings = Settings::resolve(
            Secrets::default(),
            env_of(&[
                (ENV_SYNTHETIC, "disabled"),
                (ENV_PERSIST, "primary-only"),
                (ENV_CACHE_DIR, "/tmp/stats"),
            ]),
        );
        assert_eq!(settings.synthetic_mode, SyntheticMode::Disabled);
        assert_eq!(settings.persist_policy, PersistPolicy::PrimaryOnly);
        assert_eq!(settings.cache_dir, PathBuf::from("/tmp/stats"));
    }

    #[test]
    fn test_bad_policy_keeps_default() {
        let settings = Settings::resolve(Secrets::default(), env_of(&[(ENV_SYNTHETIC, "maybe")]));
        assert_eq!(settings.synthetic_mode, SyntheticMode::Fallback);
    }

    #[test]
    fn test_secrets_file_parsing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(&path, r#"{"estat_app_id":"abc","google_maps_api_key":"ignored"}"#).unwrap();
        let secrets = Secrets::load(&path);
        assert_eq!(secrets.estat_app_id.as_deref(), Some("abc"));

        fs::write(&path, "{not json").unwrap();
        assert!(Secrets::load(&path).estat_app_id.is_none());

        assert!(Secrets::load(&dir.path().join("missing.json")).estat_app_id.is_none());
    }

    #[test]
    fn test_census_table_lookup() {
        let settings = Settings::default();
        assert_eq!(settings.census_table(2010).unwrap().stats_data_id, "0003037985");
        assert!(settings.census_table(2020).unwrap().csv_url.is_some());
        assert!(settings.census_table(2005).unwrap().csv_url.is_none());
        assert!(settings.census_table(1995).is_none());
    }

    #[test]
    fn test_year_range() {
        let range = YearRange::new(2005, 2025);
        assert!(range.contains(2005));
        assert!(range.contains(2025));
        assert!(!range.contains(2004));
    }
}
