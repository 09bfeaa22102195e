//! # Protocol Configuration & Constants
//!
//! Every delay and bound in Warden lives here. The constants are the
//! defaults; [`CoreConfig`] is what a deployment actually runs with, loaded
//! from JSON and validated before any module sees it.
//!
//! The periods interlock. A recovery must not outlive the lock it places on
//! the wallet, and the guardian that triggered a recovery must not be able to
//! finish it faster than the owner could complete a guardian change:
//!
//! ```text
//! lock_period >= recovery_period >= security_period + security_window
//! ```

use anyhow::Context;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Replay Domains
// ---------------------------------------------------------------------------

/// Mainnet relay domain. Mixed into every relay sign hash so a signature
/// collected for one deployment is useless on another.
pub const RELAY_DOMAIN_MAINNET: u32 = 0x5752_444E; // "WRDN"

pub const RELAY_DOMAIN_TESTNET: u32 = 0x5752_4454; // "WRDT"

pub const RELAY_DOMAIN_DEVNET: u32 = 0x5752_4444; // "WRDD"

pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Security Periods
// ---------------------------------------------------------------------------

/// Delay before a pending guardian addition or revocation can be confirmed.
pub const DEFAULT_SECURITY_PERIOD_SECS: u64 = 24 * 60 * 60;

/// How long a pending guardian change stays confirmable once the security
/// period has elapsed.
pub const DEFAULT_SECURITY_WINDOW_SECS: u64 = 12 * 60 * 60;

/// How long a guardian lock (or a recovery lock) lasts.
pub const DEFAULT_LOCK_PERIOD_SECS: u64 = 5 * 24 * 60 * 60;

/// Delay between executing a recovery and being able to finalize it.
pub const DEFAULT_RECOVERY_PERIOD_SECS: u64 = 36 * 60 * 60;

// ---------------------------------------------------------------------------
// Limits
// ---------------------------------------------------------------------------

/// Registry names mirror a fixed 32-byte name slot.
pub const MAX_MODULE_NAME_LENGTH: usize = 32;

/// Upper bound on signatures attached to a single relayed call.
pub const MAX_RELAY_SIGNATURES: usize = 32;

// ---------------------------------------------------------------------------
// Relay Gas Estimation
// ---------------------------------------------------------------------------

/// Fixed overhead charged for every relayed call.
pub const RELAY_BASE_GAS: u64 = 21_000;

/// Charged per signature checked.
pub const RELAY_GAS_PER_SIGNATURE: u64 = 6_000;

/// Charged per byte of call data.
pub const RELAY_GAS_PER_DATA_BYTE: u64 = 16;

// ---------------------------------------------------------------------------
// Runtime Configuration
// ---------------------------------------------------------------------------

/// Reasons a configuration is rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A period that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroPeriod(&'static str),

    /// The periods do not satisfy `lock >= recovery >= security + window`.
    #[error("insecure security periods: lock {lock}s, recovery {recovery}s, security {security}s + window {window}s")]
    InsecurePeriods {
        lock: u64,
        recovery: u64,
        security: u64,
        window: u64,
    },
}

/// Deployment parameters shared by every core module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub security_period_secs: u64,
    pub security_window_secs: u64,
    pub lock_period_secs: u64,
    pub recovery_period_secs: u64,
    /// Replay domain mixed into relay sign hashes.
    pub relay_domain: u32,
    pub relay_base_gas: u64,
    pub relay_gas_per_signature: u64,
    pub relay_gas_per_data_byte: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            security_period_secs: DEFAULT_SECURITY_PERIOD_SECS,
            security_window_secs: DEFAULT_SECURITY_WINDOW_SECS,
            lock_period_secs: DEFAULT_LOCK_PERIOD_SECS,
            recovery_period_secs: DEFAULT_RECOVERY_PERIOD_SECS,
            relay_domain: RELAY_DOMAIN_DEVNET,
            relay_base_gas: RELAY_BASE_GAS,
            relay_gas_per_signature: RELAY_GAS_PER_SIGNATURE,
            relay_gas_per_data_byte: RELAY_GAS_PER_DATA_BYTE,
        }
    }
}

impl CoreConfig {
    /// Check the period invariants.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroPeriod`] or [`ConfigError::InsecurePeriods`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("security_period_secs", self.security_period_secs),
            ("security_window_secs", self.security_window_secs),
            ("lock_period_secs", self.lock_period_secs),
            ("recovery_period_secs", self.recovery_period_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroPeriod(name));
            }
        }

        let change_span = self
            .security_period_secs
            .saturating_add(self.security_window_secs);
        if self.lock_period_secs < self.recovery_period_secs
            || self.recovery_period_secs < change_span
        {
            return Err(ConfigError::InsecurePeriods {
                lock: self.lock_period_secs,
                recovery: self.recovery_period_secs,
                security: self.security_period_secs,
                window: self.security_window_secs,
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration. Missing fields take their
    /// defaults.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        let config: Self = serde_json::from_str(json).context("malformed configuration JSON")?;
        config.validate().context("configuration rejected")?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn security_period(&self) -> Duration {
        secs(self.security_period_secs)
    }

    pub fn security_window(&self) -> Duration {
        secs(self.security_window_secs)
    }

    pub fn lock_period(&self) -> Duration {
        secs(self.lock_period_secs)
    }

    pub fn recovery_period(&self) -> Duration {
        secs(self.recovery_period_secs)
    }
}

fn secs(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX))
}

/// Friendly name for a relay domain, mainly for logging.
pub fn domain_name(domain: u32) -> String {
    match domain {
        RELAY_DOMAIN_MAINNET => "mainnet".to_string(),
        RELAY_DOMAIN_TESTNET => "testnet".to_string(),
        RELAY_DOMAIN_DEVNET => "devnet".to_string(),
        other => format!("unknown(0x{:08X})", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(CoreConfig::default().validate(), Ok(()));
    }

    #[test]
    fn relay_domains_are_distinct() {
        assert_ne!(RELAY_DOMAIN_MAINNET, RELAY_DOMAIN_TESTNET);
        assert_ne!(RELAY_DOMAIN_MAINNET, RELAY_DOMAIN_DEVNET);
        assert_ne!(RELAY_DOMAIN_TESTNET, RELAY_DOMAIN_DEVNET);
        assert_eq!(domain_name(RELAY_DOMAIN_DEVNET), "devnet");
        assert_eq!(domain_name(7), "unknown(0x00000007)");
    }

    #[test]
    fn zero_period_rejected() {
        let config = CoreConfig {
            lock_period_secs: 0,
            ..CoreConfig::default()
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::ZeroPeriod("lock_period_secs"))
        );
    }

    #[test]
    fn recovery_longer_than_lock_rejected() {
        let config = CoreConfig {
            recovery_period_secs: DEFAULT_LOCK_PERIOD_SECS + 1,
            ..CoreConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InsecurePeriods { .. })
        ));
    }

    #[test]
    fn recovery_shorter_than_guardian_change_rejected() {
        let config = CoreConfig {
            recovery_period_secs: DEFAULT_SECURITY_PERIOD_SECS,
            ..CoreConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_json_takes_defaults() {
        let config = CoreConfig::from_json_str(r#"{ "lock_period_secs": 864000 }"#).unwrap();
        assert_eq!(config.lock_period_secs, 864_000);
        assert_eq!(config.security_period_secs, DEFAULT_SECURITY_PERIOD_SECS);
        assert_eq!(config.lock_period(), Duration::days(10));
    }

    #[test]
    fn load_reports_path_on_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ \"lock_period_secs\": 1 }}").unwrap();
        let err = CoreConfig::load(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("insecure security periods"));
        assert!(err.to_string().contains("invalid config file"));
    }

    #[test]
    fn load_valid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", serde_json::to_string(&CoreConfig::default()).unwrap()).unwrap();
        assert_eq!(CoreConfig::load(file.path()).unwrap(), CoreConfig::default());
    }
}
