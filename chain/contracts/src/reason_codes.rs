//! Reason code registry
//!
//! Static catalog of the reason identifiers attached to every status change.
//! Objective codes name violations that can be proven mechanically from
//! oracle and issuance data; only those may be enforced permissionlessly.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::EnforcementError;

/// Machine-checkable reason identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    /// Consensus reserves fall below the minimum collateral ratio
    InsufficientReserves,
    /// Consensus is older than the staleness bound
    StaleAttestations,
    /// Consensus reports zero reserves while issuance is outstanding
    ZeroReserves,
    /// Custodian paused its own issuance
    SelfPauseMinting,
    /// Custodian paused issuance and fulfillment
    SelfPauseFull,
    /// Custodian widened an existing minting pause to a full pause
    SelfPauseEscalated,
    /// Custodian resumed before its escalation deadline
    SelfResume,
    /// A self-pause outlived its escalation deadline
    EscalationTimeout,
    /// External settlement reported a missed obligation
    RedemptionDefault,
    /// Arbiter cleared the backlog after the cooldown
    BacklogCleared,
    /// Discretionary arbiter decision
    ArbiterDecision,
}

impl ReasonCode {
    /// The full catalog
    pub const ALL: [ReasonCode; 11] = [
        ReasonCode::InsufficientReserves,
        ReasonCode::StaleAttestations,
        ReasonCode::ZeroReserves,
        ReasonCode::SelfPauseMinting,
        ReasonCode::SelfPauseFull,
        ReasonCode::SelfPauseEscalated,
        ReasonCode::SelfResume,
        ReasonCode::EscalationTimeout,
        ReasonCode::RedemptionDefault,
        ReasonCode::BacklogCleared,
        ReasonCode::ArbiterDecision,
    ];

    /// Codes the enforcement engine may act on
    pub const OBJECTIVE: [ReasonCode; 3] = [
        ReasonCode::InsufficientReserves,
        ReasonCode::StaleAttestations,
        ReasonCode::ZeroReserves,
    ];

    /// Stable string identifier
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::InsufficientReserves => "INSUFFICIENT_RESERVES",
            ReasonCode::StaleAttestations => "STALE_ATTESTATIONS",
            ReasonCode::ZeroReserves => "ZERO_RESERVES",
            ReasonCode::SelfPauseMinting => "SELF_PAUSE_MINTING",
            ReasonCode::SelfPauseFull => "SELF_PAUSE_FULL",
            ReasonCode::SelfPauseEscalated => "SELF_PAUSE_ESCALATED",
            ReasonCode::SelfResume => "SELF_RESUME",
            ReasonCode::EscalationTimeout => "ESCALATION_TIMEOUT",
            ReasonCode::RedemptionDefault => "REDEMPTION_DEFAULT",
            ReasonCode::BacklogCleared => "BACKLOG_CLEARED",
            ReasonCode::ArbiterDecision => "ARBITER_DECISION",
        }
    }

    /// Mechanically verifiable from oracle and issuance data
    pub fn is_objective(&self) -> bool {
        Self::OBJECTIVE.contains(self)
    }

    /// Sustained violations of these arm the hard-pause countdown
    pub fn is_critical(&self) -> bool {
        matches!(self, ReasonCode::InsufficientReserves | ReasonCode::ZeroReserves)
    }

    /// Narrow to the objective catalog, failing otherwise
    pub fn require_objective(self) -> Result<Self, EnforcementError> {
        if self.is_objective() {
            Ok(self)
        } else {
            Err(EnforcementError::NotObjective { code: self })
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = EnforcementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ReasonCode::ALL
            .iter()
            .copied()
            .find(|code| code.as_str() == s)
            .ok_or_else(|| EnforcementError::UnknownReasonCode {
                code: s.to_string(),
            })
    }
}
