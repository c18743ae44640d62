/// Constants used throughout the shmcache workspace
use std::time::Duration;

// Environment variable names
pub const SHMCACHE_CONFIG_VAR: &str = "SHMCACHE_CONFIG";
pub const SHMCACHE_SCOPE_VAR: &str = "SHMCACHE_SCOPE";
pub const SHMCACHE_LOCK_TIMEOUT_VAR: &str = "SHMCACHE_LOCK_TIMEOUT_MS";
pub const SHMCACHE_POLL_INTERVAL_VAR: &str = "SHMCACHE_POLL_INTERVAL_MS";
pub const SHMCACHE_MAX_PAYLOAD_VAR: &str = "SHMCACHE_MAX_PAYLOAD";
pub const SHMCACHE_PERMISSIONS_VAR: &str = "SHMCACHE_PERMISSIONS";
pub const SHMCACHE_LOG_VAR: &str = "SHMCACHE_LOG";

// Key derivation
pub const KEY_SEPARATOR: &str = "::";
pub const MUTEX_SUFFIX: &str = "mutex";
pub const GATE_SUFFIX: &str = "gate";

// Defaults
pub const DEFAULT_PERMISSIONS: u32 = 0o666;
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(1);
pub const MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);
pub const DEFAULT_MAX_PAYLOAD_SIZE: usize = 16 * 1024 * 1024;

// Segment format: "SHMC"
pub const SEGMENT_MAGIC: u32 = 0x5348_4d43;
pub const SEGMENT_FORMAT_VERSION: u16 = 1;

/// Identifier used in errors and logs for the registry segment
pub const REGISTRY_LABEL: &str = "<registry>";
