//! Cache configuration management with precedence and validation
use serde::{Deserialize, Serialize};
use shmcache_core::{
    CacheIdentity, Error, Result, DEFAULT_LOCK_TIMEOUT, DEFAULT_MAX_PAYLOAD_SIZE,
    DEFAULT_PERMISSIONS, DEFAULT_POLL_INTERVAL, SHMCACHE_CONFIG_VAR, SHMCACHE_LOCK_TIMEOUT_VAR,
    SHMCACHE_MAX_PAYLOAD_VAR, SHMCACHE_PERMISSIONS_VAR, SHMCACHE_POLL_INTERVAL_VAR,
    SHMCACHE_SCOPE_VAR,
};
use shmcache_ipc::WaitPolicy;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compression applied to encoded values by the typed frontend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
    Zstd,
}

impl From<String> for Compression {
    fn from(s: String) -> Self {
        match s.to_lowercase().as_str() {
            "gzip" | "gz" => Compression::Gzip,
            "zstd" => Compression::Zstd,
            _ => Compression::None,
        }
    }
}

/// Everything a backend needs to bind to one cache instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShmCacheConfig {
    /// Installation scope; independent deployments use different scopes
    pub scope: String,
    /// Logical cache inside the scope
    pub namespace: String,
    /// Permission bits for newly created semaphore sets and segments
    pub permissions: u32,
    /// Upper bound on each lock wait; `None` blocks forever
    pub lock_timeout: Option<Duration>,
    /// First back-off step while polling a contended semaphore
    pub poll_interval: Duration,
    /// Largest payload accepted by `set`, before the host limit applies
    pub max_payload_size: usize,
    pub compression: Compression,
}

impl ShmCacheConfig {
    pub fn new(scope: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            namespace: namespace.into(),
            permissions: DEFAULT_PERMISSIONS,
            lock_timeout: Some(DEFAULT_LOCK_TIMEOUT),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            compression: Compression::None,
        }
    }

    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_payload_size(mut self, size: usize) -> Self {
        self.max_payload_size = size;
        self
    }

    pub fn with_compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Check the configuration for values the backend cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.scope.is_empty() {
            return Err(Error::configuration("scope must not be empty"));
        }
        if self.namespace.is_empty() {
            return Err(Error::configuration("namespace must not be empty"));
        }
        if self.permissions > 0o777 {
            return Err(Error::configuration(format!(
                "permissions {:#o} exceed 0o777",
                self.permissions
            )));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::configuration("poll interval must be greater than zero"));
        }
        if self.max_payload_size == 0 {
            return Err(Error::configuration("max payload size must be greater than zero"));
        }
        Ok(())
    }

    pub fn identity(&self) -> Result<CacheIdentity> {
        CacheIdentity::new(self.scope.clone(), self.namespace.clone())
    }

    pub fn wait_policy(&self) -> WaitPolicy {
        let defaults = WaitPolicy::default();
        WaitPolicy {
            timeout: self.lock_timeout,
            poll_interval: self.poll_interval,
            max_poll_interval: defaults.max_poll_interval.max(self.poll_interval),
        }
    }
}

/// Source of configuration for debugging and precedence tracking
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigSource {
    /// Default configuration
    Default,
    /// Configuration file
    ConfigFile(PathBuf),
    /// Environment variable
    EnvironmentVariable(String),
    /// Command line argument
    CommandLine,
}

/// A resolved configuration and the last source that contributed to it
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: ShmCacheConfig,
    pub source: ConfigSource,
}

/// Partial settings read from one source
#[derive(Debug, Default)]
struct Overrides {
    scope: Option<String>,
    namespace: Option<String>,
    permissions: Option<u32>,
    lock_timeout: Option<Option<Duration>>,
    poll_interval: Option<Duration>,
    max_payload_size: Option<usize>,
    compression: Option<Compression>,
}

impl Overrides {
    fn is_empty(&self) -> bool {
        self.scope.is_none()
            && self.namespace.is_none()
            && self.permissions.is_none()
            && self.lock_timeout.is_none()
            && self.poll_interval.is_none()
            && self.max_payload_size.is_none()
            && self.compression.is_none()
    }

    fn apply(self, config: &mut ShmCacheConfig) {
        if let Some(scope) = self.scope {
            config.scope = scope;
        }
        if let Some(namespace) = self.namespace {
            config.namespace = namespace;
        }
        if let Some(permissions) = self.permissions {
            config.permissions = permissions;
        }
        if let Some(timeout) = self.lock_timeout {
            config.lock_timeout = timeout;
        }
        if let Some(interval) = self.poll_interval {
            config.poll_interval = interval;
        }
        if let Some(size) = self.max_payload_size {
            config.max_payload_size = size;
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
    }
}

/// Configuration loader that handles precedence:
/// defaults, then the JSON config file, then `SHMCACHE_*` variables.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for `namespace` with full precedence handling
    pub fn load(namespace: &str) -> Result<LoadedConfig> {
        let path = std::env::var_os(SHMCACHE_CONFIG_VAR).map(PathBuf::from);
        Self::load_from(path.as_deref(), namespace)
    }

    /// Like [`ConfigLoader::load`] with an explicit config file path
    pub fn load_from(path: Option<&Path>, namespace: &str) -> Result<LoadedConfig> {
        let mut loaded = Self::load_defaults(namespace)?;

        if let Some(path) = path {
            let file = Self::load_from_config_file(path)?;
            file.apply(&mut loaded.config);
            loaded.source = ConfigSource::ConfigFile(path.to_path_buf());
        }

        let env = Self::load_from_env()?;
        if !env.is_empty() {
            env.apply(&mut loaded.config);
            loaded.source = ConfigSource::EnvironmentVariable("SHMCACHE_*".to_string());
        }

        loaded.config.validate()?;
        Ok(loaded)
    }

    /// Apply command line arguments (highest precedence)
    pub fn apply_cli_args(
        mut loaded: LoadedConfig,
        scope: Option<String>,
        namespace: Option<String>,
        lock_timeout_ms: Option<u64>,
    ) -> Result<LoadedConfig> {
        if scope.is_none() && namespace.is_none() && lock_timeout_ms.is_none() {
            return Ok(loaded);
        }
        if let Some(scope) = scope {
            loaded.config.scope = scope;
        }
        if let Some(namespace) = namespace {
            loaded.config.namespace = namespace;
        }
        if let Some(ms) = lock_timeout_ms {
            loaded.config.lock_timeout = timeout_from_millis(ms);
        }
        loaded.source = ConfigSource::CommandLine;
        loaded.config.validate()?;
        Ok(loaded)
    }

    /// The working directory stands in for the installation scope
    fn load_defaults(namespace: &str) -> Result<LoadedConfig> {
        let scope = std::env::current_dir()
            .map_err(|e| Error::file_system(".", "resolve current directory", e))?;
        Ok(LoadedConfig {
            config: ShmCacheConfig::new(scope.display().to_string(), namespace),
            source: ConfigSource::Default,
        })
    }

    fn load_from_config_file(path: &Path) -> Result<Overrides> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::file_system(path, "read config file", e))?;
        let file_config: serde_json::Value = serde_json::from_str(&content)?;

        let Some(obj) = file_config.as_object() else {
            return Err(Error::configuration(format!(
                "config file {} must contain a JSON object",
                path.display()
            )));
        };

        let mut overrides = Overrides::default();

        if let Some(scope) = obj.get("scope").and_then(|v| v.as_str()) {
            overrides.scope = Some(scope.to_string());
        }

        if let Some(namespace) = obj.get("namespace").and_then(|v| v.as_str()) {
            overrides.namespace = Some(namespace.to_string());
        }

        // Either a number or an octal string such as "0660"
        if let Some(value) = obj.get("permissions") {
            overrides.permissions = Some(match value {
                serde_json::Value::String(s) => parse_permissions(s)?,
                other => other
                    .as_u64()
                    .and_then(|n| u32::try_from(n).ok())
                    .ok_or_else(|| Error::configuration("permissions must be a number"))?,
            });
        }

        if let Some(value) = obj.get("lock_timeout_ms") {
            overrides.lock_timeout = Some(match value {
                serde_json::Value::Null => None,
                other => timeout_from_millis(
                    other
                        .as_u64()
                        .ok_or_else(|| Error::configuration("lock_timeout_ms must be a number"))?,
                ),
            });
        }

        if let Some(ms) = obj.get("poll_interval_ms").and_then(|v| v.as_u64()) {
            overrides.poll_interval = Some(Duration::from_millis(ms));
        }

        if let Some(size) = obj.get("max_payload_size").and_then(|v| v.as_u64()) {
            overrides.max_payload_size = Some(usize::try_from(size).unwrap_or(usize::MAX));
        }

        if let Some(compression) = obj.get("compression").and_then(|v| v.as_str()) {
            overrides.compression = Some(Compression::from(compression.to_string()));
        }

        Ok(overrides)
    }

    fn load_from_env() -> Result<Overrides> {
        let mut overrides = Overrides::default();

        if let Ok(scope) = std::env::var(SHMCACHE_SCOPE_VAR) {
            overrides.scope = Some(scope);
        }

        if let Ok(raw) = std::env::var(SHMCACHE_LOCK_TIMEOUT_VAR) {
            let ms = parse_number::<u64>(SHMCACHE_LOCK_TIMEOUT_VAR, &raw)?;
            overrides.lock_timeout = Some(timeout_from_millis(ms));
        }

        if let Ok(raw) = std::env::var(SHMCACHE_POLL_INTERVAL_VAR) {
            let ms = parse_number::<u64>(SHMCACHE_POLL_INTERVAL_VAR, &raw)?;
            overrides.poll_interval = Some(Duration::from_millis(ms));
        }

        if let Ok(raw) = std::env::var(SHMCACHE_MAX_PAYLOAD_VAR) {
            overrides.max_payload_size = Some(parse_number::<usize>(SHMCACHE_MAX_PAYLOAD_VAR, &raw)?);
        }

        if let Ok(raw) = std::env::var(SHMCACHE_PERMISSIONS_VAR) {
            overrides.permissions = Some(parse_permissions(&raw)?);
        }

        Ok(overrides)
    }
}

/// Zero means "wait forever"
fn timeout_from_millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

fn parse_number<T: std::str::FromStr>(var: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse::<T>()
        .map_err(|_| Error::configuration(format!("{var} must be a non-negative integer, got '{raw}'")))
}

fn parse_permissions(raw: &str) -> Result<u32> {
    let digits = raw.trim().trim_start_matches("0o");
    u32::from_str_radix(digits, 8)
        .map_err(|_| Error::configuration(format!("invalid octal permissions '{raw}'")))
}
