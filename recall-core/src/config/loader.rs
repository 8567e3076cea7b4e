//! # Configuration Loader
//!
//! Loads and merges configuration from multiple sources:
//! 1. Default values (lowest priority)
//! 2. Configuration file (middle priority)
//! 3. Environment variables (highest priority)

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::RecallConfig;
use crate::error::{RecallError, Result};

/// Configuration loader with support for file and environment variable overrides
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Path to configuration file
    config_path: PathBuf,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
        }
    }
}

impl ConfigLoader {
    /// Create a new config loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config loader with a specific config file path
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: path.into(),
        }
    }

    /// Get the default configuration file path
    fn default_config_path() -> PathBuf {
        if let Ok(config_path) = env::var("RECALL_CONFIG") {
            return PathBuf::from(config_path);
        }

        let local = PathBuf::from("recall.toml");
        if local.exists() {
            return local;
        }

        dirs::config_dir()
            .map(|d| d.join("recall").join("config.toml"))
            .filter(|p| p.exists())
            .unwrap_or(local)
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load configuration with full hierarchy and validate it
    pub fn load(&self) -> Result<RecallConfig> {
        let config = self.load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration without checking credentials or ranges
    pub fn load_unvalidated(&self) -> Result<RecallConfig> {
        let mut config = if self.config_path.exists() {
            self.load_from_file()?
        } else {
            tracing::debug!(
                "Config file '{}' not found, using defaults",
                self.config_path.display()
            );
            RecallConfig::default()
        };

        apply_env(&mut config, |name| env::var(name).ok())?;
        Ok(config)
    }

    /// Load configuration from file
    fn load_from_file(&self) -> Result<RecallConfig> {
        let content = std::fs::read_to_string(&self.config_path).map_err(|e| {
            RecallError::configuration(format!(
                "Failed to read config file '{}': {}",
                self.config_path.display(),
                e
            ))
        })?;

        RecallConfig::from_toml(&content).map_err(|e| {
            RecallError::configuration(format!(
                "Failed to parse config file '{}': {}",
                self.config_path.display(),
                e
            ))
        })
    }

    /// Render a configuration template with default values
    pub fn create_template(&self) -> Result<String> {
        RecallConfig::default().to_toml()
    }
}

/// Apply environment overrides using the given lookup
///
/// Empty values are ignored.
pub(crate) fn apply_env<F>(config: &mut RecallConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("CACHE_ENABLED") {
        config.cache.enabled = parse_bool(&v, "CACHE_ENABLED")?;
    }
    if let Some(v) = get("CACHE_SIZE") {
        config.cache.max_entries = parse_usize(&v, "CACHE_SIZE")?;
    }
    if let Some(v) = get("CACHE_TTL") {
        config.cache.default_ttl = Duration::from_secs(parse_u64(&v, "CACHE_TTL")?);
    }
    if let Some(v) = get("PERF_MONITOR_ENABLED") {
        config.performance.enabled = parse_bool(&v, "PERF_MONITOR_ENABLED")?;
    }
    if let Some(v) = get("PERF_THRESHOLD_MS") {
        config.performance.default_threshold_ms = parse_u64(&v, "PERF_THRESHOLD_MS")?;
    }

    if let Some(v) = get("OPENAI_API_KEY") {
        config.llm.api_key = Some(v);
    }
    if let Some(v) = get("OPENAI_BASE_URL") {
        config.llm.base_url = v;
    }
    if let Some(v) = get("MODEL_CHOICE") {
        config.llm.model = v;
    }

    if let Some(v) = get("MEMORY_API_URL") {
        config.memory_api.url = Some(v);
    }
    if let Some(v) = get("MEMORY_API_KEY") {
        config.memory_api.api_key = Some(v);
    }
    if let Some(v) = get("MEMORY_COLLECTION_PREFIX") {
        config.memory_api.collection_prefix = v;
    }

    if let Some(v) = get("SUPABASE_URL") {
        config.prompt.supabase_url = Some(v);
    }
    if let Some(v) = get("SUPABASE_KEY") {
        config.prompt.supabase_key = Some(v);
    }

    Ok(())
}

fn parse_u64(s: &str, name: &str) -> Result<u64> {
    s.trim()
        .parse()
        .map_err(|_| RecallError::configuration(format!("Invalid {}: '{}'", name, s)))
}

fn parse_usize(s: &str, name: &str) -> Result<usize> {
    s.trim()
        .parse()
        .map_err(|_| RecallError::configuration(format!("Invalid {}: '{}'", name, s)))
}

fn parse_bool(s: &str, name: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(RecallError::configuration(format!(
            "Invalid {}: '{}' (expected true/false)",
            name, s
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env_of(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_config_loader_with_path() {
        let loader = ConfigLoader::with_path("/tmp/recall-test.toml");
        assert_eq!(loader.config_path(), Path::new("/tmp/recall-test.toml"));
    }

    #[test]
    fn test_load_from_file_success() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[cache]
max_entries = 42
default_ttl = 60

[llm]
model = "gpt-4o"
"#
        )
        .unwrap();

        let loader = ConfigLoader::with_path(file.path());
        let config = loader.load_from_file().unwrap();
        assert_eq!(config.cache.max_entries, 42);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(60));
        assert_eq!(config.llm.model, "gpt-4o");
    }

    #[test]
    fn test_load_from_invalid_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[cache\nmax_entries = ").unwrap();

        let err = ConfigLoader::with_path(file.path())
            .load_from_file()
            .unwrap_err();
        assert!(matches!(err, RecallError::Configuration(_)));
    }

    #[test]
    fn test_env_overrides() {
        let vars = env_of(&[
            ("CACHE_ENABLED", "false"),
            ("CACHE_SIZE", "7"),
            ("CACHE_TTL", "30"),
            ("PERF_MONITOR_ENABLED", "0"),
            ("PERF_THRESHOLD_MS", "250"),
            ("OPENAI_API_KEY", "sk-env"),
            ("MODEL_CHOICE", "gpt-4o"),
            ("MEMORY_API_URL", "http://mem:8000"),
            ("MEMORY_COLLECTION_PREFIX", "voxy"),
            ("SUPABASE_URL", "https://x.supabase.co"),
            ("SUPABASE_KEY", "anon"),
        ]);

        let mut config = RecallConfig::default();
        apply_env(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert!(!config.cache.enabled);
        assert_eq!(config.cache.max_entries, 7);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(30));
        assert!(!config.performance.enabled);
        assert_eq!(config.performance.default_threshold_ms, 250);
        assert_eq!(config.llm.api_key.as_deref(), Some("sk-env"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.memory_api.url.as_deref(), Some("http://mem:8000"));
        assert_eq!(config.memory_api.collection_prefix, "voxy");
        assert!(config.prompt.has_supabase());
    }

    #[test]
    fn test_env_priority_over_file() {
        let mut config = RecallConfig::from_toml("[cache]\nmax_entries = 42\n").unwrap();
        let vars = env_of(&[("CACHE_SIZE", "9"), ("OPENAI_BASE_URL", "")]);

        apply_env(&mut config, |k| vars.get(k).cloned()).unwrap();

        assert_eq!(config.cache.max_entries, 9);
        assert_eq!(config.llm.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn test_invalid_env_value() {
        let vars = env_of(&[("CACHE_SIZE", "lots")]);
        let mut config = RecallConfig::default();

        let err = apply_env(&mut config, |k| vars.get(k).cloned()).unwrap_err();
        assert!(err.to_string().contains("CACHE_SIZE"));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE", "x").unwrap());
        assert!(parse_bool("yes", "x").unwrap());
        assert!(!parse_bool("off", "x").unwrap());
        assert!(parse_bool("maybe", "x").is_err());
    }

    #[test]
    fn test_create_template() {
        let template = ConfigLoader::with_path("unused.toml").create_template().unwrap();
        assert!(template.contains("[cache]"));
        assert!(template.contains("[memory]"));
        assert!(RecallConfig::from_toml(&template).is_ok());
    }
}
