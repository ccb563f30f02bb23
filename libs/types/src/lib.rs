//! Types library for the custodian reserve watchdog
//!
//! This library provides the core type definitions shared by the watchdog
//! components, keeping identifiers, status values, and collateral arithmetic
//! identical across every consumer.
//!
//! # Modules
//! - `ids`: Unique identifiers (CustodianId, AttesterId)
//! - `status`: Custodian status, self-pause level, caller class
//! - `numeric`: Fixed-point collateral arithmetic
//! - `time`: Unix-second timestamp conventions

pub mod ids;
pub mod status;
pub mod numeric;
pub mod time;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::status::*;
    pub use crate::numeric::*;
    pub use crate::time::*;
}
