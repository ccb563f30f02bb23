//! Custodian Solvency Consensus & Lifecycle Enforcement Engine
//!
//! Tracks the health of custodians that back token issuance with off-chain
//! reserves. Attesters report reserve values, a Byzantine-tolerant median
//! turns them into consensus, and a strict state machine moves custodians
//! between operational states in response to self-initiated pauses,
//! redemption defaults, and objective violations.
//!
//! # Modules
//! - `reason_codes`: Closed catalog of transition reasons
//! - `oracle`: Attestation buffering and median consensus
//! - `pause_credit`: Self-pause entitlement with lazy renewal
//! - `lifecycle`: Custodian registry and the single transition validator
//! - `enforcement`: Permissionless violation enforcement and hard pause
//! - `watchdog`: Facade owning every component
//! - `security`: Role-based access control
//! - `config`: Runtime configuration
//! - `events`: Emitted notifications
//! - `errors`: Error types

pub mod config;
pub mod enforcement;
pub mod errors;
pub mod events;
pub mod lifecycle;
pub mod oracle;
pub mod pause_credit;
pub mod reason_codes;
pub mod security;
pub mod watchdog;

pub use config::WatchdogConfig;
pub use errors::WatchdogError;
pub use events::WatchdogEvent;
pub use reason_codes::ReasonCode;
pub use watchdog::Watchdog;

/// Event and error schema version
pub const CONTRACT_ABI_VERSION: &str = "1.0.0";
