//! Engine configuration
//!
//! All tunables live here, grouped by subsystem. The configuration is
//! immutable after bootstrap; the engine holds it behind `Arc`.
//!
//! Sources, in precedence order:
//! 1. Environment overrides (`ATLAS_STORE_DIR`, `ATLAS_BACKUP_DIR`,
//!    `ATLAS_LOG_DIR`, `ATLAS_LOG_LEVEL`)
//! 2. A JSON config file, if supplied
//! 3. Built-in defaults

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub store: StoreConfig,
    pub pool: PoolConfig,
    pub cache: CacheConfig,
    pub backup: BackupConfig,
    pub transaction: TransactionConfig,
    pub log: LogConfig,
    pub limits: LimitsConfig,
    pub events: EventsConfig,
    pub query: QueryConfig,
}

/// Durable store locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Filesystem root holding `store/snapshot.bin` and `store/wal.log`
    pub store_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            store_dir: PathBuf::from("data"),
        }
    }
}

/// Connection pool tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    /// Acquire wait deadline in milliseconds
    pub acquire_timeout_ms: u64,
    /// Idle handles beyond this age are closed down to `min_size`
    pub idle_timeout_ms: u64,
    /// Waiters past this count fail immediately with POOL_EXHAUSTED
    pub max_waiting_clients: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: 2,
            max_size: 8,
            acquire_timeout_ms: 5_000,
            idle_timeout_ms: 60_000,
            max_waiting_clients: 16,
        }
    }
}

/// Hot-entry cache tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub max_bytes: usize,
    /// Entry time-to-live in milliseconds
    pub ttl_ms: u64,
    /// Background cleanup cadence in milliseconds
    pub cleanup_interval_ms: u64,
    /// heap_used / heap_total fraction that starts scaling memory pressure
    pub memory_high_water: f64,
    /// cache_size / max_entries fraction that starts scaling cache pressure
    pub pressure_high_water: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1_000,
            max_bytes: 64 * 1024 * 1024,
            ttl_ms: 300_000,
            cleanup_interval_ms: 30_000,
            memory_high_water: 0.7,
            pressure_high_water: 0.6,
        }
    }
}

/// Backup/export orchestrator tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub backup_dir: PathBuf,
    /// Quiet-period for the auto-export debounce, in milliseconds
    pub debounce_ms: u64,
    /// Write count that forces an export before the debounce elapses
    pub change_threshold: u64,
    /// Newest backups kept by the retention sweep
    pub max_files: usize,
    /// Health check cadence in milliseconds
    pub health_interval_ms: u64,
    /// A backup older than this is considered stale by the health check
    pub max_age_ms: u64,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            backup_dir: PathBuf::from("backups"),
            debounce_ms: 5_000,
            change_threshold: 50,
            max_files: 10,
            health_interval_ms: 60 * 60 * 1000,
            max_age_ms: 24 * 60 * 60 * 1000,
        }
    }
}

/// Transaction coordinator and rollback tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    pub retry_attempts: u32,
    /// Base for the exponential retry delay: base * 2^attempt
    pub retry_base_delay_ms: u64,
    /// Compensate indexes in parallel during rollback
    pub parallel_rollback: bool,
    /// Re-read touched keys after rollback and compare with the
    /// pre-transaction capture
    pub validate_after_rollback: bool,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_base_delay_ms: 1_000,
            parallel_rollback: true,
            validate_after_rollback: true,
        }
    }
}

/// Logging sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub log_dir: PathBuf,
    /// Minimum severity emitted: trace|info|warn|error|fatal
    pub log_level: String,
    /// Rotate the active file once it exceeds this many bytes
    pub max_size: u64,
    /// Rotated files kept, newest first
    pub max_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_level: "info".to_string(),
            max_size: 4 * 1024 * 1024,
            max_files: 5,
        }
    }
}

/// Structural limits on the task model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum path depth (segments)
    pub max_path_depth: usize,
    /// Maximum total path length in bytes
    pub max_path_bytes: usize,
    /// Maximum children per container task
    pub max_children: usize,
    /// Maximum notes per category
    pub max_notes_per_category: usize,
    /// Maximum bytes per note
    pub max_note_bytes: usize,
    /// Maximum dependency chain depth walked by the validator
    pub max_dependency_depth: usize,
    /// Maximum bytes for the free-form annex on any entity
    pub max_annex_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_path_depth: 7,
            max_path_bytes: 255,
            max_children: 100,
            max_notes_per_category: 25,
            max_note_bytes: 8 * 1024,
            max_dependency_depth: 50,
            max_annex_bytes: 32 * 1024,
        }
    }
}

/// Event bus configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    /// Registration beyond this count is refused
    pub max_event_listeners: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            max_event_listeners: 64,
        }
    }
}

/// Query executor and result cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryConfig {
    /// Result cache entry time-to-live in milliseconds
    pub cache_ttl_ms: u64,
    /// Result cache capacity; oldest-by-insertion evicted beyond this
    pub cache_max_entries: usize,
    /// Queries slower than this emit a structured warning
    pub slow_query_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: 30_000,
            cache_max_entries: 256,
            slow_query_ms: 250,
        }
    }
}

impl Config {
    /// Load configuration from an optional JSON file, then apply
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => {
                let raw = fs::read_to_string(p)
                    .map_err(|e| ConfigError::Io(p.to_path_buf(), e.to_string()))?;
                serde_json::from_str(&raw)
                    .map_err(|e| ConfigError::Parse(p.to_path_buf(), e.to_string()))?
            }
            None => Config::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(dir) = env::var("ATLAS_STORE_DIR") {
            self.store.store_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("ATLAS_BACKUP_DIR") {
            self.backup.backup_dir = PathBuf::from(dir);
        }
        if let Ok(dir) = env::var("ATLAS_LOG_DIR") {
            self.log.log_dir = PathBuf::from(dir);
        }
        if let Ok(level) = env::var("ATLAS_LOG_LEVEL") {
            self.log.log_level = level;
        }
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pool.min_size > self.pool.max_size {
            return Err(ConfigError::Invalid(
                "pool.min_size exceeds pool.max_size".to_string(),
            ));
        }
        if self.pool.max_size == 0 {
            return Err(ConfigError::Invalid("pool.max_size is zero".to_string()));
        }
        if self.cache.max_entries == 0 {
            return Err(ConfigError::Invalid("cache.max_entries is zero".to_string()));
        }
        if !(0.0..=1.0).contains(&self.cache.memory_high_water)
            || !(0.0..=1.0).contains(&self.cache.pressure_high_water)
        {
            return Err(ConfigError::Invalid(
                "cache high-water fractions must be in [0, 1]".to_string(),
            ));
        }
        if self.limits.max_path_depth == 0 {
            return Err(ConfigError::Invalid(
                "limits.max_path_depth is zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Io(PathBuf, String),
    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_contract() {
        let config = Config::default();
        assert_eq!(config.backup.debounce_ms, 5_000);
        assert_eq!(config.backup.change_threshold, 50);
        assert_eq!(config.backup.max_files, 10);
        assert_eq!(config.transaction.retry_attempts, 3);
        assert_eq!(config.transaction.retry_base_delay_ms, 1_000);
        assert!(config.transaction.parallel_rollback);
        assert!(config.transaction.validate_after_rollback);
        assert_eq!(config.limits.max_path_depth, 7);
        assert_eq!(config.limits.max_path_bytes, 255);
        assert_eq!(config.limits.max_children, 100);
        assert!((config.cache.memory_high_water - 0.7).abs() < f64::EPSILON);
        assert!((config.cache.pressure_high_water - 0.6).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_inverted_pool_bounds() {
        let mut config = Config::default();
        config.pool.min_size = 10;
        config.pool.max_size = 2;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: Config = serde_json::from_str(r#"{"pool": {"max_size": 4}}"#).unwrap();
        assert_eq!(config.pool.max_size, 4);
        assert_eq!(config.pool.min_size, 2);
        assert_eq!(config.cache.max_entries, 1_000);
    }
}
