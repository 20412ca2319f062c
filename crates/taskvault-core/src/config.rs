use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;

/// Bounds for the periodic producer interval, in seconds.
pub const PRODUCER_INTERVAL_MIN_SECS: u64 = 30;
pub const PRODUCER_INTERVAL_MAX_SECS: u64 = 120;

/// Top-level configuration for the orchestrator.
///
/// Loaded from a TOML file, then overridden by environment variables. Each
/// section corresponds to one loop or component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub stability: StabilityConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    #[serde(default)]
    pub producer: ProducerConfig,
    #[serde(default)]
    pub approval: ApprovalConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub shutdown: ShutdownConfig,
}

impl OrchestratorConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: OrchestratorConfig = toml::from_str(&content)?;
        config.producer.clamp();
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup. Values that fail to parse are
    /// logged and ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("VAULT_PATH") {
            self.general.vault_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.general.log_level = v;
        }
        override_parsed(&lookup, "STABILITY_POLL_INTERVAL_MS", &mut self.stability.poll_interval_ms);
        override_parsed(&lookup, "STABILITY_CONFIRM_DELAY_MS", &mut self.stability.confirm_delay_ms);
        override_parsed(&lookup, "WATCHER_SCAN_INTERVAL_MS", &mut self.watcher.scan_interval_ms);
        override_parsed(&lookup, "PRODUCER_POLL_INTERVAL", &mut self.producer.poll_interval_secs);
        override_parsed(&lookup, "APPROVAL_TIMEOUT_SECS", &mut self.approval.timeout_secs);
        override_parsed(&lookup, "EXECUTOR_SCAN_INTERVAL", &mut self.executor.scan_interval_secs);
        self.producer.clamp();
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = %raw, "Ignoring unparsable environment override"),
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Root of the vault directory tree.
    pub vault_path: PathBuf,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            vault_path: PathBuf::from("./vault"),
            log_level: "info".to_string(),
        }
    }
}

/// Stability detector timings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    pub poll_interval_ms: u64,
    pub confirm_delay_ms: u64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            confirm_delay_ms: 2000,
        }
    }
}

impl StabilityConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn confirm_delay(&self) -> Duration {
        Duration::from_millis(self.confirm_delay_ms)
    }
}

/// Directory watcher settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// How often watched directories are rescanned.
    pub scan_interval_ms: u64,
    /// Pause before the stability check of a new file.
    pub grace_ms: u64,
    /// Capacity of the bounded event channel.
    pub channel_capacity: usize,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 500,
            grace_ms: 1000,
            channel_capacity: 64,
        }
    }
}

/// Periodic producer loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Seconds between passes over `Needs_Action`, clamped to [30, 120].
    pub poll_interval_secs: u64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 60,
        }
    }
}

impl ProducerConfig {
    fn clamp(&mut self) {
        let clamped = self
            .poll_interval_secs
            .clamp(PRODUCER_INTERVAL_MIN_SECS, PRODUCER_INTERVAL_MAX_SECS);
        if clamped != self.poll_interval_secs {
            warn!(
                requested = self.poll_interval_secs,
                used = clamped,
                "Producer poll interval out of bounds"
            );
            self.poll_interval_secs = clamped;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Approval wait settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApprovalConfig {
    pub timeout_secs: u64,
    pub poll_interval_secs: u64,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 3600,
            poll_interval_secs: 5,
        }
    }
}

impl ApprovalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Action executor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Seconds between scans of `Approved`.
    pub scan_interval_secs: u64,
    /// Bound on each call over the primary transport channel.
    pub primary_timeout_secs: u64,
    /// Tool name used for record-create actions.
    pub record_tool: String,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 10,
            primary_timeout_secs: 5,
            record_tool: "records".to_string(),
        }
    }
}

impl ExecutorConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn primary_timeout(&self) -> Duration {
        Duration::from_secs(self.primary_timeout_secs)
    }
}

/// Audit log bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub max_entries: usize,
    pub summary_chars: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: 1000,
            summary_chars: 500,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// How long shutdown waits for loops to exit.
    pub grace_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self { grace_secs: 5 }
    }
}

impl ShutdownConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}
