//! Custodian lifecycle types
//!
//! Status, self-pause level, and the closed set of caller classes that
//! may drive a status transition.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Custodian status
///
/// Variant order follows the penalty ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CustodianStatus {
    /// State 0: fully operational
    Active,
    /// State 1: new issuance blocked, fulfillment continues
    MintingPaused,
    /// State 2: issuance and fulfillment blocked
    Paused,
    /// State 3: escalated for review, awaiting arbiter decision
    UnderReview,
    /// State 4: permanently removed (terminal)
    Revoked,
}

impl CustodianStatus {
    /// Every status, from healthiest to terminal
    pub const ALL: [CustodianStatus; 5] = [
        CustodianStatus::Active,
        CustodianStatus::MintingPaused,
        CustodianStatus::Paused,
        CustodianStatus::UnderReview,
        CustodianStatus::Revoked,
    ];

    /// Check if status is terminal (no further transitions possible)
    pub fn is_terminal(&self) -> bool {
        matches!(self, CustodianStatus::Revoked)
    }

    /// Whether the custodian is in one of the self-pause states
    pub fn is_paused(&self) -> bool {
        matches!(self, CustodianStatus::MintingPaused | CustodianStatus::Paused)
    }

    /// Whether new issuance is permitted
    pub fn permits_minting(&self) -> bool {
        matches!(self, CustodianStatus::Active)
    }

    /// Whether outstanding obligations may still be fulfilled
    pub fn permits_fulfillment(&self) -> bool {
        matches!(
            self,
            CustodianStatus::Active | CustodianStatus::MintingPaused | CustodianStatus::UnderReview
        )
    }

    /// Position on the graduated penalty ladder
    ///
    /// Active = 0, paused = 1, under review = 2, revoked = 3.
    pub fn severity(&self) -> u8 {
        match self {
            CustodianStatus::Active => 0,
            CustodianStatus::MintingPaused | CustodianStatus::Paused => 1,
            CustodianStatus::UnderReview => 2,
            CustodianStatus::Revoked => 3,
        }
    }
}

impl fmt::Display for CustodianStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CustodianStatus::Active => "ACTIVE",
            CustodianStatus::MintingPaused => "MINTING_PAUSED",
            CustodianStatus::Paused => "PAUSED",
            CustodianStatus::UnderReview => "UNDER_REVIEW",
            CustodianStatus::Revoked => "REVOKED",
        };
        f.write_str(s)
    }
}

/// Level requested by a custodian pausing itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SelfPauseLevel {
    /// Block new issuance only
    MintingOnly,
    /// Block issuance and fulfillment
    Full,
}

impl SelfPauseLevel {
    /// Status a custodian lands in for this level
    pub fn target_status(&self) -> CustodianStatus {
        match self {
            SelfPauseLevel::MintingOnly => CustodianStatus::MintingPaused,
            SelfPauseLevel::Full => CustodianStatus::Paused,
        }
    }
}

/// Class of actor driving a status transition
///
/// Closed set: the transition table is checked exhaustively against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CallerClass {
    /// The custodian acting on itself (self-pause, resume)
    Custodian,
    /// The violation enforcement engine
    Enforcement,
    /// Full-authority arbiter
    Arbiter,
    /// Lazy escalation of an expired self-pause timer
    EscalationTimeout,
    /// Graduated consequence of an external default signal
    DefaultPenalty,
}

impl fmt::Display for CallerClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CallerClass::Custodian => "CUSTODIAN",
            CallerClass::Enforcement => "ENFORCEMENT",
            CallerClass::Arbiter => "ARBITER",
            CallerClass::EscalationTimeout => "ESCALATION_TIMEOUT",
            CallerClass::DefaultPenalty => "DEFAULT_PENALTY",
        };
        f.write_str(s)
    }
}
