//! Application configuration loading for CLI defaults.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use crawler_core::CrawlerConfig;
use serde::Deserialize;

/// TOML-backed file configuration. Every key is optional; unknown keys are rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    /// Site root to crawl.
    pub base_url: Option<String>,
    /// Default output folder.
    pub output_dir: Option<PathBuf>,
    /// Concurrent download workers.
    pub workers: Option<usize>,
    /// Journals processed at once.
    pub journal_concurrency: Option<usize>,
    /// Minimum delay between downloads in milliseconds.
    pub politeness_ms: Option<u64>,
    /// Maximum attempts per PDF.
    pub max_retries: Option<u32>,
    /// Journal list freshness window in seconds.
    pub journal_cache_ttl_secs: Option<u64>,
    /// Listing page freshness window in seconds.
    pub article_cache_ttl_secs: Option<u64>,
    /// Listing pages fetched per journal at most.
    pub max_pages: Option<usize>,
    /// HTTP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,
    /// HTTP whole-request timeout in seconds.
    pub read_timeout_secs: Option<u64>,
    /// Extra challenge page body signatures.
    pub challenge_signatures: Option<Vec<String>>,
    /// Discovery cache file.
    pub cache_path: Option<PathBuf>,
}

impl FileConfig {
    /// Validates config values against runtime and CLI constraints.
    pub fn validate(&self) -> Result<()> {
        if let Some(base_url) = &self.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            bail!("Invalid config value for `base_url`: {base_url}. Expected an http(s) URL");
        }
        validate_range("workers", self.workers.map(|v| v as u64), 1, 32)?;
        validate_range(
            "journal_concurrency",
            self.journal_concurrency.map(|v| v as u64),
            1,
            8,
        )?;
        validate_range("politeness_ms", self.politeness_ms, 0, 60_000)?;
        validate_range("max_retries", self.max_retries.map(u64::from), 1, 10)?;
        validate_range("max_pages", self.max_pages.map(|v| v as u64), 1, 500)?;
        validate_range("connect_timeout_secs", self.connect_timeout_secs, 1, 3600)?;
        validate_range("read_timeout_secs", self.read_timeout_secs, 1, 3600)?;
        Ok(())
    }

    /// Overlays the values present in the file onto `config`.
    pub fn apply(&self, config: &mut CrawlerConfig) {
        if let Some(base_url) = &self.base_url {
            config.base_url.clone_from(base_url);
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(journal_concurrency) = self.journal_concurrency {
            config.journal_concurrency = journal_concurrency;
        }
        if let Some(ms) = self.politeness_ms {
            config.politeness = Duration::from_millis(ms);
        }
        if let Some(max_retries) = self.max_retries {
            config.max_retries = max_retries;
        }
        if let Some(secs) = self.journal_cache_ttl_secs {
            config.journal_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = self.article_cache_ttl_secs {
            config.article_cache_ttl = Duration::from_secs(secs);
        }
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(secs) = self.connect_timeout_secs {
            config.connect_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = self.read_timeout_secs {
            config.read_timeout = Duration::from_secs(secs);
        }
        if let Some(signatures) = &self.challenge_signatures {
            config.challenge_signatures.clone_from(signatures);
        }
        if let Some(path) = &self.cache_path {
            config.cache_path = Some(path.clone());
        }
    }
}

fn validate_range(field: &str, value: Option<u64>, min: u64, max: u64) -> Result<()> {
    let Some(value) = value else {
        return Ok(());
    };
    if !(min..=max).contains(&value) {
        bail!("Invalid config value for `{field}`: {value}. Expected range: {min}..={max}");
    }
    Ok(())
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Parsed file config when a config file exists and was valid.
    pub config: Option<FileConfig>,
}

/// Resolves default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/papers-crawler/config.toml`
/// 2. `$HOME/.config/papers-crawler/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("papers-crawler")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("papers-crawler")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads `explicit` when given (it must exist), else the default path if present.
pub fn load_file_config(explicit: Option<&Path>) -> Result<LoadedConfig> {
    if let Some(path) = explicit {
        let config = read_file_config(path)?;
        return Ok(LoadedConfig {
            path: Some(path.to_path_buf()),
            config: Some(config),
        });
    }

    let path = resolve_default_config_path();
    let config = match path.as_deref() {
        Some(path_ref) if path_ref.exists() => Some(read_file_config(path_ref)?),
        _ => None,
    };
    Ok(LoadedConfig { path, config })
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
    parse_config_str(&raw)
        .with_context(|| format!("Failed to parse config file '{}'", path.display()))
}

fn parse_config_str(raw: &str) -> Result<FileConfig> {
    let config: FileConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config_full_file() {
        let cfg = parse_config_str(
            r#"
            base_url = "https://www.cell.com"
            output_dir = "/tmp/papers"
            workers = 4
            journal_concurrency = 2
            politeness_ms = 1500
            max_retries = 5
            journal_cache_ttl_secs = 86400
            article_cache_ttl_secs = 600
            max_pages = 3
            connect_timeout_secs = 5
            read_timeout_secs = 60
            challenge_signatures = ["please verify you are human"]
            cache_path = "/tmp/cache.json"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.workers, Some(4));
        assert_eq!(cfg.output_dir, Some(PathBuf::from("/tmp/papers")));
        assert_eq!(
            cfg.challenge_signatures,
            Some(vec!["please verify you are human".to_string()])
        );
    }

    #[test]
    fn test_parse_config_empty_file_is_default() {
        let cfg = parse_config_str("# nothing here\n").unwrap();
        assert_eq!(cfg, FileConfig::default());
    }

    #[test]
    fn test_parse_config_unknown_key_rejected() {
        let err = parse_config_str("concurrency = 3\n").unwrap_err();
        assert!(err.to_string().contains("concurrency"));
    }

    #[test]
    fn test_parse_config_out_of_range_rejected() {
        let err = parse_config_str("workers = 64\n").unwrap_err();
        assert!(
            err.to_string()
                .contains("Invalid config value for `workers`: 64. Expected range: 1..=32")
        );

        let err = parse_config_str("politeness_ms = 60001\n").unwrap_err();
        assert!(err.to_string().contains("politeness_ms"));
    }

    #[test]
    fn test_parse_config_bad_base_url_rejected() {
        let err = parse_config_str("base_url = \"ftp://example.com\"\n").unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_apply_overlays_only_present_values() {
        let cfg = parse_config_str("workers = 6\npoliteness_ms = 0\n").unwrap();
        let mut config = CrawlerConfig::default();
        cfg.apply(&mut config);

        assert_eq!(config.workers, 6);
        assert_eq!(config.politeness, Duration::ZERO);
        assert_eq!(config.max_retries, CrawlerConfig::default().max_retries);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let err = load_file_config(Some(&missing)).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "max_pages = 2\n").unwrap();

        let loaded = load_file_config(Some(&path)).unwrap();
        assert_eq!(loaded.path.as_deref(), Some(path.as_path()));
        assert_eq!(loaded.config.unwrap().max_pages, Some(2));
    }
}
