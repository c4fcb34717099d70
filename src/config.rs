use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::BottleneckConfig;
use crate::{Error, Result};

/// Default number of audit attempts per task (first run plus retries).
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Default timeout for a single delegation request (5 minutes).
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 300_000;

/// Default timeout for a single audit stage (30 seconds).
pub const DEFAULT_STAGE_TIMEOUT_MS: u64 = 30_000;

/// Default number of tasks delegated concurrently within a phase.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub partition: PartitionConfig,
}

/// Scheduling and failure-handling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Audit attempts per task; independent of the number of audit stages.
    pub max_retry_attempts: u32,
    /// Stop scheduling new work once any task fails.
    pub halt_on_failure: bool,
    /// Tasks delegated at once within a phase; 0 means the whole phase.
    pub max_concurrency: usize,
    /// Timeout for one delegation request, in milliseconds.
    pub request_timeout_ms: u64,
    /// Cancel tasks whose dependencies did not pass instead of delegating them.
    pub cascade_failures: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
            halt_on_failure: false,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            cascade_failures: true,
        }
    }
}

impl OrchestratorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Timeout for one audit stage, in milliseconds.
    pub stage_timeout_ms: u64,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            stage_timeout_ms: DEFAULT_STAGE_TIMEOUT_MS,
        }
    }
}

impl AuditConfig {
    pub fn stage_timeout(&self) -> Duration {
        Duration::from_millis(self.stage_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PartitionConfig {
    pub bottleneck_min_degree: usize,
    pub bottleneck_percentile: f64,
}

impl Default for PartitionConfig {
    fn default() -> Self {
        let defaults = BottleneckConfig::default();
        Self {
            bottleneck_min_degree: defaults.min_degree,
            bottleneck_percentile: defaults.percentile,
        }
    }
}

impl PartitionConfig {
    pub fn bottleneck(&self) -> BottleneckConfig {
        BottleneckConfig {
            min_degree: self.bottleneck_min_degree,
            percentile: self.bottleneck_percentile,
        }
    }
}

impl Config {
    pub fn hive_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".hive"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::hive_dir()?.join("hive.toml"))
    }

    /// Load `~/.hive/hive.toml`, falling back to defaults when it is missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "loading config");
        if !path.exists() {
            tracing::debug!("config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        tracing::debug!(
            max_retry_attempts = config.orchestrator.max_retry_attempts,
            halt_on_failure = config.orchestrator.halt_on_failure,
            max_concurrency = config.orchestrator.max_concurrency,
            "config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                tracing::debug!(dir = %dir.display(), "creating config directory");
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        tracing::debug!(path = %path.display(), "config saved");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.max_retry_attempts == 0 {
            return Err(Error::Config(
                "max_retry_attempts must be at least 1".to_string(),
            ));
        }
        if self.orchestrator.request_timeout_ms == 0 {
            return Err(Error::Config(
                "request_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if self.audit.stage_timeout_ms == 0 {
            return Err(Error::Config(
                "stage_timeout_ms must be greater than 0".to_string(),
            ));
        }
        self.partition.bottleneck().validate()
    }
}
