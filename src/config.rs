// src/config.rs
// Ledger configuration: JSON file, environment overrides and validation

use crate::hashing::HasherKind;
use crate::relayer::{ExcessStakePolicy, RatingBounds};
use crate::stake::StakeSchedule;
use anyhow::{bail, Context, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Path of the JSON config file
pub const CONFIG_PATH_ENV: &str = "OURO_CHANNELS_CONFIG";
pub const EXCESS_STAKE_POLICY_ENV: &str = "OURO_EXCESS_STAKE_POLICY";
pub const RATING_MIN_ENV: &str = "OURO_RATING_MIN";
pub const RATING_MAX_ENV: &str = "OURO_RATING_MAX";
pub const DOMAIN_HASHER_ENV: &str = "OURO_DOMAIN_HASHER";
pub const DB_PATH_ENV: &str = "OURO_CHANNELS_DB";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct LedgerConfig {
    pub stake: StakeSchedule,
    pub rating: RatingBounds,
    pub excess_stake_policy: ExcessStakePolicy,
    pub hasher: HasherKind,
    /// RocksDB directory for snapshots; in-memory only when unset
    pub db_path: Option<PathBuf>,
}

impl LedgerConfig {
    /// Defaults, then `OURO_CHANNELS_CONFIG` (if set), then env overrides.
    ///
    /// Fails when the resulting configuration does not validate.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => {
                info!("{} not set, using default ledger configuration", CONFIG_PATH_ENV);
                Self::default()
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.ensure_valid()?;
        Ok(config)
    }

    /// Log the validation summary and fail on any error
    pub fn ensure_valid(&self) -> Result<()> {
        let validation = self.validate();
        validation.print_summary();
        if !validation.valid {
            bail!(
                "Invalid ledger configuration: {}",
                validation.errors.join("; ")
            );
        }
        Ok(())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: LedgerConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        info!("Loaded ledger configuration from {}", path.display());
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)
            .with_context(|| format!("Failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Apply overrides looked up by variable name
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup(EXCESS_STAKE_POLICY_ENV) {
            self.excess_stake_policy = policy
                .trim()
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", EXCESS_STAKE_POLICY_ENV))?;
        }
        if let Some(min) = lookup(RATING_MIN_ENV) {
            self.rating.min = min
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", RATING_MIN_ENV, min))?;
        }
        if let Some(max) = lookup(RATING_MAX_ENV) {
            self.rating.max = max
                .trim()
                .parse()
                .with_context(|| format!("Invalid {}: {}", RATING_MAX_ENV, max))?;
        }
        if let Some(hasher) = lookup(DOMAIN_HASHER_ENV) {
            self.hasher = hasher
                .trim()
                .parse()
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("Invalid {}", DOMAIN_HASHER_ENV))?;
        }
        if let Some(path) = lookup(DB_PATH_ENV) {
            self.db_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::new();

        if let Err(e) = self.stake.validate() {
            validation.add_error(format!("Stake schedule: {}", e));
        }
        if self.stake.relayer_base_stake == 0 {
            validation.add_warning("relayer_base_stake is 0; relayers can register for free".into());
        }

        if self.rating.min > self.rating.max {
            validation.add_error(format!(
                "Rating bounds inverted: min {} > max {}",
                self.rating.min, self.rating.max
            ));
        } else if !self.rating.contains(0) {
            validation.add_warning(format!(
                "Rating bounds [{}, {}] exclude the initial rating 0",
                self.rating.min, self.rating.max
            ));
        }

        if self.hasher != HasherKind::Keccak256 {
            validation.add_warning(
                "Non-keccak domain hasher: relayer keys differ from EVM deployments".into(),
            );
        }

        validation
    }
}

/// Validation result for configuration checks
pub struct ConfigValidation {
    pub valid: bool,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    fn new() -> Self {
        Self {
            valid: true,
            warnings: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn add_warning(&mut self, msg: String) {
        self.warnings.push(msg);
    }

    fn add_error(&mut self, msg: String) {
        self.errors.push(msg);
        self.valid = false;
    }

    pub fn print_summary(&self) {
        if !self.warnings.is_empty() {
            warn!("Ledger configuration warnings:");
            for w in &self.warnings {
                warn!(" - {}", w);
            }
        }

        if !self.errors.is_empty() {
            error!("Ledger configuration errors:");
            for e in &self.errors {
                error!(" - {}", e);
            }
        }

        if self.valid && self.warnings.is_empty() {
            info!("Ledger configuration validation passed");
        }
    }
}
