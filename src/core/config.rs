//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.config/redis-viewer/redis-viewer.yaml` unless `--config`
//! points elsewhere. If the default file is missing on first run, a
//! commented-out default is generated so users can discover all options.
//! Files ending in `.toml` are parsed as TOML, everything else as YAML.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

// ============================================================================
// Config Structs (all fields Option<T> for sparse files)
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Standalone,
    Sentinel,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ViewerConfig {
    pub mode: Option<Mode>,
    pub addr: Option<String>,
    pub sentinel_addrs: Option<Vec<String>>,
    pub master_name: Option<String>,
    pub password: Option<String>,
    pub db: Option<i64>,
    /// Keys fetched per page of the key list.
    pub limit: Option<usize>,
    /// Items fetched per page of a collection value.
    pub value_limit: Option<usize>,
    /// `COUNT` hint passed to `SCAN`.
    pub scan_count: Option<usize>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_ADDR: &str = "127.0.0.1:6379";
pub const DEFAULT_MASTER_NAME: &str = "mymaster";
pub const DEFAULT_KEY_PAGE_SIZE: usize = 50;
pub const DEFAULT_VALUE_PAGE_SIZE: usize = 100;
pub const DEFAULT_SCAN_COUNT: usize = 100;

// ============================================================================
// Resolved Config (concrete values, no Options)
// ============================================================================

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub mode: Mode,
    pub addr: String,
    pub sentinel_addrs: Vec<String>,
    pub master_name: String,
    pub password: Option<String>,
    pub db: i64,
    pub key_page_size: usize,
    pub value_page_size: usize,
    pub scan_count: usize,
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        resolve(&ViewerConfig::default(), &CliOverrides::default())
    }
}

/// Values given on the command line. `None` = not specified.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub addr: Option<String>,
    pub db: Option<i64>,
    pub limit: Option<usize>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Yaml(serde_yaml::Error),
    Toml(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, e) => write!(f, "config I/O error ({}): {e}", path.display()),
            ConfigError::Yaml(e) => write!(f, "config parse error: {e}"),
            ConfigError::Toml(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.config/redis-viewer/redis-viewer.yaml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| {
        h.join(".config")
            .join("redis-viewer")
            .join("redis-viewer.yaml")
    })
}

/// Load config from an explicit path, or from the default location.
///
/// An explicit path must exist and parse. The default path is optional: if it
/// doesn't exist a commented default is generated and `ViewerConfig::default()`
/// is returned.
pub fn load_config(explicit: Option<&Path>) -> Result<ViewerConfig, ConfigError> {
    if let Some(path) = explicit {
        return read_config(path);
    }

    let path = match default_config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ViewerConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ViewerConfig::default());
    }

    read_config(&path)
}

fn read_config(path: &Path) -> Result<ViewerConfig, ConfigError> {
    let contents =
        fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
    let config = parse_config(path, &contents)?;
    info!("Loaded config from {}", path.display());
    debug!("Config: {:?}", redacted(&config));
    Ok(config)
}

/// Parse `contents` as TOML or YAML depending on the extension of `path`.
pub fn parse_config(path: &Path, contents: &str) -> Result<ViewerConfig, ConfigError> {
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    if is_toml {
        toml::from_str(contents).map_err(ConfigError::Toml)
    } else if contents.lines().all(|l| {
        let l = l.trim();
        l.is_empty() || l.starts_with('#')
    }) {
        // serde_yaml rejects an empty document; a fully commented file is valid config.
        Ok(ViewerConfig::default())
    } else {
        serde_yaml::from_str(contents).map_err(ConfigError::Yaml)
    }
}

/// Copy of the config safe to log.
fn redacted(config: &ViewerConfig) -> ViewerConfig {
    ViewerConfig {
        mode: config.mode,
        addr: config.addr.clone(),
        sentinel_addrs: config.sentinel_addrs.clone(),
        master_name: config.master_name.clone(),
        password: config.password.as_ref().map(|_| "***".to_string()),
        db: config.db,
        limit: config.limit,
        value_limit: config.value_limit,
        scan_count: config.scan_count,
    }
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &Path) {
    let default_content = r#"# redis-viewer configuration
# All settings are optional; defaults are used for anything not specified.
# Override hierarchy: defaults -> this file -> env vars -> CLI flags.

# mode: standalone            # "standalone" or "sentinel"
# addr: 127.0.0.1:6379        # standalone only (REDIS_VIEWER_ADDR)
# sentinel_addrs:             # sentinel only
#   - 127.0.0.1:26379
# master_name: mymaster       # sentinel only
# password: ""                # or set REDIS_VIEWER_PASSWORD
# db: 0                       # REDIS_VIEWER_DB

# limit: 50                   # keys per page
# value_limit: 100            # collection items per page
# scan_count: 100             # SCAN COUNT hint
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Resolve the final config by collapsing: defaults → config file → env vars → CLI.
pub fn resolve(config: &ViewerConfig, cli: &CliOverrides) -> ResolvedConfig {
    // Address: CLI → env → config → default
    let addr = cli
        .addr
        .clone()
        .or_else(|| env_var("REDIS_VIEWER_ADDR"))
        .or_else(|| config.addr.clone())
        .unwrap_or_else(|| DEFAULT_ADDR.to_string());

    // Password: env → config. An empty password means "no AUTH".
    let password = env_var("REDIS_VIEWER_PASSWORD")
        .or_else(|| config.password.clone())
        .filter(|p| !p.is_empty());

    // Database: CLI → env → config → 0
    let db = cli
        .db
        .or_else(|| env_var("REDIS_VIEWER_DB").and_then(|v| v.parse().ok()))
        .or(config.db)
        .unwrap_or(0);

    ResolvedConfig {
        mode: config.mode.unwrap_or_default(),
        addr,
        sentinel_addrs: config.sentinel_addrs.clone().unwrap_or_default(),
        master_name: config
            .master_name
            .clone()
            .unwrap_or_else(|| DEFAULT_MASTER_NAME.to_string()),
        password,
        db,
        key_page_size: cli
            .limit
            .or(config.limit)
            .unwrap_or(DEFAULT_KEY_PAGE_SIZE)
            .max(1),
        value_page_size: config.value_limit.unwrap_or(DEFAULT_VALUE_PAGE_SIZE).max(1),
        scan_count: config.scan_count.unwrap_or(DEFAULT_SCAN_COUNT).max(1),
    }
}
