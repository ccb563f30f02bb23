//! Watchdog events
//!
//! Events are immutable records emitted by successful operations and consumed
//! by external audit and monitoring collaborators. Failed operations emit
//! nothing.

use reserve_types::ids::{AttesterId, CustodianId};
use reserve_types::status::{CallerClass, CustodianStatus};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::reason_codes::ReasonCode;

/// Custodian added to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustodianRegistered {
    pub custodian_id: CustodianId,
    pub operator: String,
    pub registered_at: i64,
}

/// Emitted on every successful status transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChanged {
    pub event_id: Uuid,
    pub custodian_id: CustodianId,
    pub old_status: CustodianStatus,
    pub new_status: CustodianStatus,
    pub reason: ReasonCode,
    pub caller_class: CallerClass,
    pub timestamp: i64,
}

/// Attester observation accepted into the rolling buffer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationSubmitted {
    pub custodian_id: CustodianId,
    pub attester: AttesterId,
    pub value: Decimal,
    pub timestamp: i64,
}

/// New consensus record stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusUpdated {
    pub custodian_id: CustodianId,
    pub value: Decimal,
    pub attestation_count: usize,
    pub computed_at: i64,
    pub degraded: bool,
}

/// Consensus forced below threshold by the recovery authority
///
/// Weakens the byzantine tolerance of the resulting record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradedConsensusForced {
    pub custodian_id: CustodianId,
    pub authority: String,
    pub value: Decimal,
    pub attestation_count: usize,
    pub required: usize,
    pub computed_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseCreditGranted {
    pub custodian_id: CustodianId,
    pub granted_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseCreditConsumed {
    pub custodian_id: CustodianId,
    pub used_at: i64,
    pub renews_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseCreditRenewed {
    pub custodian_id: CustodianId,
    pub renewed_at: i64,
}

/// External default signal counted against the custodian
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultRecorded {
    pub custodian_id: CustodianId,
    pub count_in_window: u32,
    pub window_start: i64,
    pub recorded_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BacklogCleared {
    pub custodian_id: CustodianId,
    pub arbiter: String,
    pub cleared_at: i64,
}

/// Critical violation observed; hard pause follows at `deadline` unless resolved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardPauseCountdownStarted {
    pub custodian_id: CustodianId,
    pub code: ReasonCode,
    pub deadline: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardPauseCountdownCleared {
    pub custodian_id: CustodianId,
    pub code: ReasonCode,
    pub cleared_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardPauseApplied {
    pub custodian_id: CustodianId,
    pub code: ReasonCode,
    pub applied_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardPauseLifted {
    pub custodian_id: CustodianId,
    pub arbiter: String,
    pub lifted_at: i64,
}

/// Enum wrapper for all watchdog events, enabling uniform handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WatchdogEvent {
    CustodianRegistered(CustodianRegistered),
    StatusChanged(StatusChanged),
    AttestationSubmitted(AttestationSubmitted),
    ConsensusUpdated(ConsensusUpdated),
    DegradedConsensusForced(DegradedConsensusForced),
    PauseCreditGranted(PauseCreditGranted),
    PauseCreditConsumed(PauseCreditConsumed),
    PauseCreditRenewed(PauseCreditRenewed),
    DefaultRecorded(DefaultRecorded),
    BacklogCleared(BacklogCleared),
    HardPauseCountdownStarted(HardPauseCountdownStarted),
    HardPauseCountdownCleared(HardPauseCountdownCleared),
    HardPauseApplied(HardPauseApplied),
    HardPauseLifted(HardPauseLifted),
}

impl WatchdogEvent {
    /// Custodian the event concerns
    pub fn custodian_id(&self) -> CustodianId {
        match self {
            WatchdogEvent::CustodianRegistered(e) => e.custodian_id,
            WatchdogEvent::StatusChanged(e) => e.custodian_id,
            WatchdogEvent::AttestationSubmitted(e) => e.custodian_id,
            WatchdogEvent::ConsensusUpdated(e) => e.custodian_id,
            WatchdogEvent::DegradedConsensusForced(e) => e.custodian_id,
            WatchdogEvent::PauseCreditGranted(e) => e.custodian_id,
            WatchdogEvent::PauseCreditConsumed(e) => e.custodian_id,
            WatchdogEvent::PauseCreditRenewed(e) => e.custodian_id,
            WatchdogEvent::DefaultRecorded(e) => e.custodian_id,
            WatchdogEvent::BacklogCleared(e) => e.custodian_id,
            WatchdogEvent::HardPauseCountdownStarted(e) => e.custodian_id,
            WatchdogEvent::HardPauseCountdownCleared(e) => e.custodian_id,
            WatchdogEvent::HardPauseApplied(e) => e.custodian_id,
            WatchdogEvent::HardPauseLifted(e) => e.custodian_id,
        }
    }

    /// The status change carried by this event, if any
    pub fn as_status_change(&self) -> Option<&StatusChanged> {
        match self {
            WatchdogEvent::StatusChanged(e) => Some(e),
            _ => None,
        }
    }
}
