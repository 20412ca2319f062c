//! CLI argument definitions for the taskvault binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

use taskvault_core::OrchestratorConfig;

/// taskvault: moves dropped files through a vault of stage directories,
/// from intake to plan to human approval to execution.
#[derive(Parser, Debug)]
#[command(name = "taskvault", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// Vault root directory.
    #[arg(short = 'v', long = "vault")]
    pub vault: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Run one producer pass and one executor pass, then exit.
    #[arg(long = "once")]
    pub once: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TASKVAULT_CONFIG env var > ./taskvault.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TASKVAULT_CONFIG") {
            return PathBuf::from(p);
        }
        PathBuf::from("taskvault.toml")
    }

    /// Load the config file, then layer env vars and flags on top.
    pub fn resolve_config(&self) -> OrchestratorConfig {
        let mut config = OrchestratorConfig::load_or_default(&self.resolve_config_path());
        config.apply_env_overrides();
        self.apply_to(&mut config);
        config
    }

    /// Apply flag values over whatever the config already holds.
    pub fn apply_to(&self, config: &mut OrchestratorConfig) {
        if let Some(ref vault) = self.vault {
            config.general.vault_path = vault.clone();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let args = CliArgs::try_parse_from(["taskvault", "--vault", "/srv/vault", "-l", "debug"]).unwrap();
        let mut config = OrchestratorConfig::default();
        config.general.log_level = "warn".into();
        args.apply_to(&mut config);
        assert_eq!(config.general.vault_path, PathBuf::from("/srv/vault"));
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_absent_flags_keep_config() {
        let args = CliArgs::try_parse_from(["taskvault"]).unwrap();
        let mut config = OrchestratorConfig::default();
        config.general.vault_path = PathBuf::from("from-file");
        args.apply_to(&mut config);
        assert_eq!(config.general.vault_path, PathBuf::from("from-file"));
        assert!(!args.once);
    }

    #[test]
    fn test_explicit_config_path() {
        let args = CliArgs::try_parse_from(["taskvault", "-c", "/etc/taskvault.toml", "--once"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/taskvault.toml"));
        assert!(args.once);
    }
}
