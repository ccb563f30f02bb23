//! Watchdog configuration
//!
//! All durations are in seconds. Missing JSON fields fall back to the
//! defaults below; unknown fields are rejected.

use reserve_types::time::{DAY, HOUR};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// Upper bound on attestations combined into one consensus round
pub const MAX_ATTESTERS_PER_ROUND: usize = 10;

/// Longest accepted duration for any timer or window (10 years)
pub const MAX_DURATION_SECS: i64 = 10 * 365 * DAY;

/// Watchdog configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchdogConfig {
    /// Fresh attestations required before consensus is computed
    pub consensus_threshold: usize,
    /// Attestations older than this are discarded
    pub attestation_window_secs: i64,
    /// Consensus older than this is reported stale
    pub max_staleness_secs: i64,
    /// Self-pause duration before automatic escalation to review
    pub escalation_delay_secs: i64,
    /// Pause credit renews this long after its last use
    pub pause_credit_renewal_secs: i64,
    /// Rolling window in which defaults accumulate
    pub default_window_secs: i64,
    /// Quiet period since the last default before backlog clearance
    pub backlog_cooldown_secs: i64,
    /// Minimum reserves as a percent of minted supply
    pub min_collateral_ratio_percent: Decimal,
    /// Sustained critical violation duration before hard pause
    pub hard_pause_delay_secs: i64,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            consensus_threshold: 3,
            attestation_window_secs: 6 * HOUR,
            max_staleness_secs: 24 * HOUR,
            escalation_delay_secs: 48 * HOUR,
            pause_credit_renewal_secs: 90 * DAY,
            default_window_secs: 30 * DAY,
            backlog_cooldown_secs: 90 * DAY,
            min_collateral_ratio_percent: Decimal::ONE_HUNDRED,
            hard_pause_delay_secs: 24 * HOUR,
        }
    }
}

impl WatchdogConfig {
    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: WatchdogConfig =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is within its allowed range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.consensus_threshold == 0 || self.consensus_threshold > MAX_ATTESTERS_PER_ROUND {
            return Err(ConfigError::Invalid {
                field: "consensus_threshold",
                reason: format!("must be within 1..={}", MAX_ATTESTERS_PER_ROUND),
            });
        }
        let positive = [
            ("attestation_window_secs", self.attestation_window_secs),
            ("max_staleness_secs", self.max_staleness_secs),
            ("escalation_delay_secs", self.escalation_delay_secs),
            ("pause_credit_renewal_secs", self.pause_credit_renewal_secs),
            ("default_window_secs", self.default_window_secs),
            ("backlog_cooldown_secs", self.backlog_cooldown_secs),
            ("hard_pause_delay_secs", self.hard_pause_delay_secs),
        ];
        for (field, value) in positive {
            if value <= 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must be positive, got {}", value),
                });
            }
            if value > MAX_DURATION_SECS {
                return Err(ConfigError::Invalid {
                    field,
                    reason: format!("must not exceed {} seconds, got {}", MAX_DURATION_SECS, value),
                });
            }
        }
        if self.max_staleness_secs < self.attestation_window_secs {
            return Err(ConfigError::Invalid {
                field: "max_staleness_secs",
                reason: "must not be shorter than the attestation window".to_string(),
            });
        }
        if self.min_collateral_ratio_percent <= Decimal::ZERO {
            return Err(ConfigError::Invalid {
                field: "min_collateral_ratio_percent",
                reason: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
