//! Watchdog error types
//!
//! One error enum per component plus the umbrella `WatchdogError` returned by
//! the facade. Every failure is synchronous and typed; nothing is retried
//! internally.

use reserve_types::ids::CustodianId;
use reserve_types::numeric::NumericError;
use reserve_types::status::{CallerClass, CustodianStatus};
use thiserror::Error;

use crate::reason_codes::ReasonCode;

/// Reserve consensus oracle errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("Unauthorized: {caller} lacks the {required} role")]
    Unauthorized { caller: String, required: String },

    #[error("Unknown custodian: {custodian_id}")]
    UnknownCustodian { custodian_id: CustodianId },

    #[error("Consensus not ready for {custodian_id}: {fresh} fresh attestations, {required} required")]
    ConsensusNotReady {
        custodian_id: CustodianId,
        fresh: usize,
        required: usize,
    },

    #[error("Invalid reserve value: {value}")]
    InvalidValue { value: String },
}

/// Pause credit ledger errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PauseCreditError {
    #[error("No pause credit was ever granted to {custodian_id}")]
    NotGranted { custodian_id: CustodianId },

    #[error("Initial pause credit already granted to {custodian_id}")]
    AlreadyGranted { custodian_id: CustodianId },

    #[error("Pause credit unavailable for {custodian_id}: renews at {renews_at}")]
    CreditUnavailable {
        custodian_id: CustodianId,
        renews_at: i64,
    },

    #[error("Renewal time for {custodian_id} overflows at {now}")]
    RenewalOverflow { custodian_id: CustodianId, now: i64 },
}

/// Lifecycle state machine errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LifecycleError {
    #[error("Unauthorized: caller {caller} may not {action}")]
    Unauthorized {
        caller: String,
        action: &'static str,
    },

    #[error("Capability denied: {caller_class} may not move {from} -> {to}")]
    CapabilityDenied {
        caller_class: CallerClass,
        from: CustodianStatus,
        to: CustodianStatus,
    },

    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: CustodianStatus,
        to: CustodianStatus,
    },

    #[error("Unknown custodian: {custodian_id}")]
    UnknownCustodian { custodian_id: CustodianId },

    #[error("Stale state for {custodian_id}: expected {expected}, found {actual}")]
    StaleStateConflict {
        custodian_id: CustodianId,
        expected: CustodianStatus,
        actual: CustodianStatus,
    },

    #[error("Pause credit error: {0}")]
    PauseCredit(#[from] PauseCreditError),

    #[error("Custodian {custodian_id} is not in a self-initiated pause")]
    NotSelfPaused { custodian_id: CustodianId },

    #[error("Custodian {custodian_id} still has unfulfilled obligations")]
    ObligationsOutstanding { custodian_id: CustodianId },

    #[error("Backlog cooldown not elapsed: available at {available_at}")]
    CooldownNotElapsed { available_at: i64 },

    #[error("Custodian {custodian_id} is hard-paused")]
    HardPaused { custodian_id: CustodianId },

    #[error("Minting not permitted while {status}")]
    MintingNotPermitted { status: CustodianStatus },

    #[error("Fulfillment not permitted while {status}")]
    FulfillmentNotPermitted { status: CustodianStatus },

    #[error("Amount must be positive")]
    InvalidAmount,

    #[error("Burn of {requested} exceeds minted amount {minted}")]
    InsufficientMinted { requested: String, minted: String },

    #[error("Arithmetic overflow in minted amount")]
    Overflow,

    #[error("Deadline overflow: {now} + {delay_secs}s")]
    DeadlineOverflow { now: i64, delay_secs: i64 },
}

/// Violation enforcement errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EnforcementError {
    #[error("Unknown reason code: {code}")]
    UnknownReasonCode { code: String },

    #[error("Reason code {code} is not an objective violation")]
    NotObjective { code: ReasonCode },

    #[error("Violation not found: {code} on {custodian_id} ({detail})")]
    ViolationNotFound {
        custodian_id: CustodianId,
        code: ReasonCode,
        detail: String,
    },

    #[error("Unauthorized: caller {caller} is not an arbiter")]
    Unauthorized { caller: String },

    #[error("Numeric error: {0}")]
    Numeric(#[from] NumericError),

    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),
}

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid config field {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Config parse error: {0}")]
    Parse(String),
}

/// Umbrella error returned by the `Watchdog` facade
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WatchdogError {
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    #[error("Lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    #[error("Enforcement error: {0}")]
    Enforcement(#[from] EnforcementError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unauthorized: {caller} lacks the {required} role")]
    Unauthorized { caller: String, required: String },
}

impl From<PauseCreditError> for WatchdogError {
    fn from(err: PauseCreditError) -> Self {
        WatchdogError::Lifecycle(LifecycleError::PauseCredit(err))
    }
}
