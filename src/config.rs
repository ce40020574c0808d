use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use crate::cli::CliArgs;
use crate::model::{DEFAULT_PAGE_SIZE, FETCH_ALL_THRESHOLD, NamespaceScope};

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";
const DEFAULT_UPLOAD_PATH: &str = "/upload_yaml";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct CacheSettings {
    /// Hard expiry of a cached page.
    pub ttl: Duration,
    /// Age after which the UI warns that data may be outdated.
    pub stale_after: Duration,
    pub check_interval: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(5 * 60),
            stale_after: Duration::from_secs(2 * 60),
            check_interval: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub server: String,
    pub base_path: String,
    pub namespace: NamespaceScope,
    pub page_size: u32,
    pub request_timeout: Duration,
    pub cache: CacheSettings,
    pub upload_path: String,
    pub log_dir: Option<PathBuf>,
    pub source: Option<String>,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            base_path: String::new(),
            namespace: NamespaceScope::All,
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            cache: CacheSettings::default(),
            upload_path: DEFAULT_UPLOAD_PATH.to_string(),
            log_dir: None,
            source: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
struct ConfigFile {
    #[serde(default, alias = "url")]
    server: Option<String>,
    #[serde(default, alias = "prefix")]
    base_path: Option<String>,
    #[serde(default)]
    namespace: Option<String>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default, alias = "timeout_secs")]
    request_timeout_secs: Option<u64>,
    #[serde(default)]
    cache_ttl_secs: Option<u64>,
    #[serde(default)]
    stale_after_secs: Option<u64>,
    #[serde(default)]
    staleness_check_secs: Option<u64>,
    #[serde(default)]
    upload_path: Option<String>,
    #[serde(default)]
    log_dir: Option<PathBuf>,
}

impl DashboardConfig {
    /// File values first, command-line values on top.
    fn resolve(file: &ConfigFile, source: Option<String>, args: &CliArgs) -> Self {
        let defaults = Self::default();

        let namespace = if args.all_namespaces {
            NamespaceScope::All
        } else if let Some(namespace) = args.namespace.as_deref() {
            NamespaceScope::from_label(namespace)
        } else {
            file.namespace
                .as_deref()
                .map(NamespaceScope::from_label)
                .unwrap_or(defaults.namespace)
        };

        let page_size = args
            .page_size
            .or(file.page_size)
            .unwrap_or(defaults.page_size)
            .clamp(1, FETCH_ALL_THRESHOLD);

        let check_interval = args
            .refresh_secs
            .or(file.staleness_check_secs)
            .map(|secs| Duration::from_secs(secs.max(1)))
            .unwrap_or(defaults.cache.check_interval);

        Self {
            server: args
                .server
                .clone()
                .or_else(|| file.server.clone())
                .unwrap_or(defaults.server),
            base_path: args
                .base_path
                .clone()
                .or_else(|| file.base_path.clone())
                .unwrap_or(defaults.base_path),
            namespace,
            page_size,
            request_timeout: file
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            cache: CacheSettings {
                ttl: file
                    .cache_ttl_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.ttl),
                stale_after: file
                    .stale_after_secs
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.cache.stale_after),
                check_interval,
            },
            upload_path: file
                .upload_path
                .clone()
                .unwrap_or(defaults.upload_path),
            log_dir: args.log_dir.clone().or_else(|| file.log_dir.clone()),
            source,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigWatcher {
    path: Option<PathBuf>,
    modified: Option<SystemTime>,
    args: CliArgs,
}

impl ConfigWatcher {
    pub fn discover(args: CliArgs) -> Self {
        Self {
            path: discover_config_path(),
            modified: None,
            args,
        }
    }

    pub fn load_current(&mut self) -> Result<DashboardConfig> {
        let Some(path) = self.path.clone() else {
            return Ok(DashboardConfig::resolve(
                &ConfigFile::default(),
                None,
                &self.args,
            ));
        };

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let parsed = parse_config_file(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        self.modified = fs::metadata(&path)
            .ok()
            .and_then(|meta| meta.modified().ok());

        Ok(DashboardConfig::resolve(
            &parsed,
            Some(path.display().to_string()),
            &self.args,
        ))
    }

    pub fn reload_if_changed(&mut self) -> Result<Option<DashboardConfig>> {
        let Some(current_path) = self.path.clone() else {
            self.path = discover_config_path();
            if self.path.is_some() {
                return self.load_current().map(Some);
            }
            return Ok(None);
        };

        if !current_path.exists() {
            self.path = discover_config_path();
            self.modified = None;
            return self.load_current().map(Some);
        }

        let modified = fs::metadata(&current_path)
            .ok()
            .and_then(|meta| meta.modified().ok());
        if modified != self.modified {
            return self.load_current().map(Some);
        }

        Ok(None)
    }
}

fn parse_config_file(raw: &str) -> Result<ConfigFile> {
    if raw.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    serde_yaml::from_str(raw).context("invalid YAML")
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("KUBEDECK_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("kubedeck.yaml"),
        PathBuf::from("kubedeck.yml"),
        PathBuf::from(".kubedeck.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/kubedeck/config.yaml"),
            PathBuf::from(&home).join(".config/kubedeck/config.yml"),
            PathBuf::from(&home).join(".kubedeck.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{ConfigFile, DashboardConfig, parse_config_file};
    use crate::cli::CliArgs;
    use crate::model::{FETCH_ALL_THRESHOLD, NamespaceScope};
    use std::time::Duration;

    #[test]
    fn cli_values_override_file_values() {
        let file = parse_config_file(
            "server: http://backend:8080\nbase_path: /dash\nnamespace: team-a\npage_size: 25\n",
        )
        .unwrap();
        let args = CliArgs {
            server: Some("http://override:9000".to_string()),
            page_size: Some(75),
            ..CliArgs::default()
        };

        let config = DashboardConfig::resolve(&file, None, &args);
        assert_eq!(config.server, "http://override:9000");
        assert_eq!(config.base_path, "/dash");
        assert_eq!(config.namespace, NamespaceScope::Named("team-a".to_string()));
        assert_eq!(config.page_size, 75);
    }

    #[test]
    fn all_namespaces_flag_wins_over_file_namespace() {
        let file = parse_config_file("namespace: team-a\n").unwrap();
        let args = CliArgs {
            all_namespaces: true,
            ..CliArgs::default()
        };
        let config = DashboardConfig::resolve(&file, None, &args);
        assert_eq!(config.namespace, NamespaceScope::All);
    }

    #[test]
    fn page_size_is_clamped_below_fetch_all_threshold() {
        let file = parse_config_file("page_size: 5000\n").unwrap();
        let config = DashboardConfig::resolve(&file, None, &CliArgs::default());
        assert_eq!(config.page_size, FETCH_ALL_THRESHOLD);
    }

    #[test]
    fn cache_timings_default_to_five_and_two_minutes() {
        let config = DashboardConfig::resolve(&ConfigFile::default(), None, &CliArgs::default());
        assert_eq!(config.cache.ttl, Duration::from_secs(300));
        assert_eq!(config.cache.stale_after, Duration::from_secs(120));
        assert_eq!(config.cache.check_interval, Duration::from_secs(30));
        assert_eq!(config.upload_path, "/upload_yaml");
    }

    #[test]
    fn empty_file_parses_to_defaults() {
        assert_eq!(parse_config_file("  \n").unwrap(), ConfigFile::default());
    }
}
