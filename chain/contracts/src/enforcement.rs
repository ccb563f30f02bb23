//! Violation Enforcement Engine
//!
//! Turns objective, machine-checkable violations into `UnderReview`
//! transitions. Enforcement is permissionless: anyone may call it, and the
//! predicate is always re-evaluated against current consensus and minted
//! supply at call time.
//!
//! Critical violations additionally arm a hard-pause countdown. If the
//! violation is still present when the countdown expires, the custodian is
//! hard-paused and every issuance operation is blocked until an arbiter lifts
//! it.

use reserve_types::ids::CustodianId;
use reserve_types::numeric::{collateral_ratio_percent, is_undercollateralized};
use reserve_types::status::{CallerClass, CustodianStatus};
use reserve_types::time::{deadline_after, is_due};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::WatchdogConfig;
use crate::errors::{EnforcementError, LifecycleError, OracleError};
use crate::events::{
    HardPauseApplied, HardPauseCountdownCleared, HardPauseCountdownStarted, HardPauseLifted,
    StatusChanged, WatchdogEvent,
};
use crate::lifecycle::{CustodianRegistry, TransitionRequest};
use crate::oracle::{ConsensusView, ReserveOracle};
use crate::reason_codes::ReasonCode;
use crate::security::{AccessControl, Role};

/// Result of evaluating one violation predicate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationCheck {
    pub custodian_id: CustodianId,
    pub code: ReasonCode,
    pub violated: bool,
    /// Human-readable explanation of the evaluation
    pub detail: String,
}

/// Outcome of an enforcement call that found a violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnforcementOutcome {
    /// Custodian moved `Active -> UnderReview`
    Enforced(StatusChanged),
    /// Custodian was not `Active`; nothing changed
    AlreadyEscalated { status: CustodianStatus },
}

/// Armed hard-pause countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HardPauseCountdown {
    pub code: ReasonCode,
    pub armed_at: i64,
    pub deadline: i64,
}

/// Outcome of a hard-pause check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardPauseOutcome {
    NotArmed,
    /// Violation persists; deadline not reached
    Pending { deadline: i64 },
    /// Violation persisted past the deadline
    Applied { code: ReasonCode },
    /// Violation gone; countdown disarmed
    Resolved { code: ReasonCode },
    AlreadyApplied,
}

/// Violation enforcement engine.
#[derive(Debug)]
pub struct EnforcementEngine {
    countdowns: HashMap<CustodianId, HardPauseCountdown>,
    min_collateral_ratio_percent: Decimal,
    hard_pause_delay_secs: i64,
    events: Vec<WatchdogEvent>,
}

impl EnforcementEngine {
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            countdowns: HashMap::new(),
            min_collateral_ratio_percent: config.min_collateral_ratio_percent,
            hard_pause_delay_secs: config.hard_pause_delay_secs,
            events: Vec::new(),
        }
    }

    /// Armed countdowns keep their deadline.
    pub fn apply_config(&mut self, config: &WatchdogConfig) {
        self.min_collateral_ratio_percent = config.min_collateral_ratio_percent;
        self.hard_pause_delay_secs = config.hard_pause_delay_secs;
    }

    pub fn countdown(&self, custodian_id: &CustodianId) -> Option<&HardPauseCountdown> {
        self.countdowns.get(custodian_id)
    }

    // ───────────────────────── Predicates ─────────────────────────

    /// Evaluate an objective predicate. Read-only.
    pub fn check_violation(
        &self,
        oracle: &ReserveOracle,
        registry: &CustodianRegistry,
        custodian_id: &CustodianId,
        code: ReasonCode,
        now: i64,
    ) -> Result<ViolationCheck, EnforcementError> {
        let code = code.require_objective()?;
        let custodian = registry
            .custodian(custodian_id)
            .ok_or(LifecycleError::UnknownCustodian {
                custodian_id: *custodian_id,
            })?;
        let minted = custodian.minted_amount;
        let consensus = match oracle.get_consensus(custodian_id, now) {
            Ok(view) => Some(view),
            Err(OracleError::ConsensusNotReady { .. }) => None,
            Err(err) => return Err(err.into()),
        };

        let (violated, detail) = match code {
            ReasonCode::InsufficientReserves => {
                self.insufficient_reserves(consensus.as_ref(), minted)?
            }
            ReasonCode::StaleAttestations => stale_attestations(consensus.as_ref(), minted),
            ReasonCode::ZeroReserves => zero_reserves(consensus.as_ref(), minted),
            other => return Err(EnforcementError::NotObjective { code: other }),
        };

        Ok(ViolationCheck {
            custodian_id: *custodian_id,
            code,
            violated,
            detail,
        })
    }

    /// Evaluate one predicate across many custodians. Read-only.
    ///
    /// Unknown custodians yield a non-violated entry instead of failing the
    /// batch.
    pub fn batch_check_violations(
        &self,
        oracle: &ReserveOracle,
        registry: &CustodianRegistry,
        custodian_ids: &[CustodianId],
        code: ReasonCode,
        now: i64,
    ) -> Result<Vec<ViolationCheck>, EnforcementError> {
        let code = code.require_objective()?;
        custodian_ids
            .iter()
            .map(|id| {
                if registry.contains(id) {
                    self.check_violation(oracle, registry, id, code, now)
                } else {
                    Ok(ViolationCheck {
                        custodian_id: *id,
                        code,
                        violated: false,
                        detail: "unknown custodian".to_string(),
                    })
                }
            })
            .collect()
    }

    // ───────────────────────── Enforcement ─────────────────────────

    /// Enforce an objective violation.
    ///
    /// Fails with `ViolationNotFound` when the predicate does not hold. A
    /// custodian that is no longer `Active` is left untouched.
    pub fn enforce_objective_violation(
        &mut self,
        oracle: &ReserveOracle,
        registry: &mut CustodianRegistry,
        custodian_id: CustodianId,
        code: ReasonCode,
        now: i64,
    ) -> Result<EnforcementOutcome, EnforcementError> {
        let check = self.check_violation(oracle, registry, &custodian_id, code, now)?;
        if !check.violated {
            debug!(custodian = %custodian_id, %code, detail = %check.detail, "no violation");
            return Err(EnforcementError::ViolationNotFound {
                custodian_id,
                code,
                detail: check.detail,
            });
        }

        let status = registry.get_status(&custodian_id)?;
        if code.is_critical() && !status.is_terminal() {
            self.arm_countdown(registry, custodian_id, code, now)?;
        }

        if status != CustodianStatus::Active {
            debug!(custodian = %custodian_id, %code, %status, "violation already escalated");
            return Ok(EnforcementOutcome::AlreadyEscalated { status });
        }

        warn!(custodian = %custodian_id, %code, detail = %check.detail, "enforcing violation");
        let event = registry.transition(TransitionRequest {
            custodian_id,
            expected: CustodianStatus::Active,
            to: CustodianStatus::UnderReview,
            caller_class: CallerClass::Enforcement,
            reason: code,
            now,
        })?;
        Ok(EnforcementOutcome::Enforced(event))
    }

    // ───────────────────────── Hard Pause ─────────────────────────

    /// Re-evaluate an armed countdown. Permissionless.
    ///
    /// A resolved violation disarms the countdown at any time; a persisting
    /// one hard-pauses the custodian once the deadline is reached.
    pub fn check_hard_pause(
        &mut self,
        oracle: &ReserveOracle,
        registry: &mut CustodianRegistry,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<HardPauseOutcome, EnforcementError> {
        let custodian = registry
            .custodian(&custodian_id)
            .ok_or(LifecycleError::UnknownCustodian { custodian_id })?;
        if custodian.hard_paused {
            return Ok(HardPauseOutcome::AlreadyApplied);
        }
        let countdown = match self.countdowns.get(&custodian_id) {
            Some(countdown) => *countdown,
            None => return Ok(HardPauseOutcome::NotArmed),
        };

        let check = self.check_violation(oracle, registry, &custodian_id, countdown.code, now)?;
        if !check.violated {
            self.countdowns.remove(&custodian_id);
            info!(custodian = %custodian_id, code = %countdown.code, "hard pause countdown cleared");
            self.events
                .push(WatchdogEvent::HardPauseCountdownCleared(HardPauseCountdownCleared {
                    custodian_id,
                    code: countdown.code,
                    cleared_at: now,
                }));
            return Ok(HardPauseOutcome::Resolved {
                code: countdown.code,
            });
        }
        if !is_due(now, countdown.deadline) {
            return Ok(HardPauseOutcome::Pending {
                deadline: countdown.deadline,
            });
        }

        registry.set_hard_pause(&custodian_id, true)?;
        self.countdowns.remove(&custodian_id);
        warn!(
            custodian = %custodian_id,
            code = %countdown.code,
            detail = %check.detail,
            "HARD PAUSE applied"
        );
        self.events.push(WatchdogEvent::HardPauseApplied(HardPauseApplied {
            custodian_id,
            code: countdown.code,
            applied_at: now,
        }));
        Ok(HardPauseOutcome::Applied {
            code: countdown.code,
        })
    }

    /// Clear the hard-pause flag and any countdown. Arbiter-only.
    pub fn lift_hard_pause(
        &mut self,
        access: &AccessControl,
        registry: &mut CustodianRegistry,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<(), EnforcementError> {
        if !access.has_role(caller, Role::Arbiter) {
            return Err(EnforcementError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        registry.set_hard_pause(&custodian_id, false)?;
        self.countdowns.remove(&custodian_id);
        info!(custodian = %custodian_id, arbiter = caller, "hard pause lifted");
        self.events.push(WatchdogEvent::HardPauseLifted(HardPauseLifted {
            custodian_id,
            arbiter: caller.to_string(),
            lifted_at: now,
        }));
        Ok(())
    }

    // ───────────────────────── Events ─────────────────────────

    /// Get all emitted events.
    pub fn events(&self) -> &[WatchdogEvent] {
        &self.events
    }

    /// Drain all events (consume and clear).
    pub fn drain_events(&mut self) -> Vec<WatchdogEvent> {
        std::mem::take(&mut self.events)
    }

    // ───────────────────────── Internal ─────────────────────────

    fn arm_countdown(
        &mut self,
        registry: &CustodianRegistry,
        custodian_id: CustodianId,
        code: ReasonCode,
        now: i64,
    ) -> Result<(), EnforcementError> {
        let already_paused = registry
            .custodian(&custodian_id)
            .map_or(false, |c| c.hard_paused);
        if already_paused || self.countdowns.contains_key(&custodian_id) {
            return Ok(());
        }
        let deadline = deadline_after(now, self.hard_pause_delay_secs).ok_or(
            LifecycleError::DeadlineOverflow {
                now,
                delay_secs: self.hard_pause_delay_secs,
            },
        )?;
        self.countdowns.insert(
            custodian_id,
            HardPauseCountdown {
                code,
                armed_at: now,
                deadline,
            },
        );
        warn!(custodian = %custodian_id, %code, deadline, "hard pause countdown started");
        self.events
            .push(WatchdogEvent::HardPauseCountdownStarted(HardPauseCountdownStarted {
                custodian_id,
                code,
                deadline,
            }));
        Ok(())
    }

    fn insufficient_reserves(
        &self,
        consensus: Option<&ConsensusView>,
        minted: Decimal,
    ) -> Result<(bool, String), EnforcementError> {
        let view = match consensus {
            Some(view) => view,
            None => return Ok((false, "no consensus available".to_string())),
        };
        let violated = is_undercollateralized(view.value, minted, self.min_collateral_ratio_percent)?;
        let ratio = collateral_ratio_percent(view.value, minted)
            .map_or_else(|| "n/a".to_string(), |r| format!("{}%", r.round_dp(2)));
        Ok((
            violated,
            format!(
                "reserves {} against minted {} (ratio {}, minimum {}%)",
                view.value, minted, ratio, self.min_collateral_ratio_percent
            ),
        ))
    }
}

fn stale_attestations(consensus: Option<&ConsensusView>, minted: Decimal) -> (bool, String) {
    match consensus {
        Some(view) => (
            view.is_stale,
            format!("consensus computed at {}", view.computed_at),
        ),
        None => (
            minted > Decimal::ZERO,
            format!("no consensus with {} minted", minted),
        ),
    }
}

fn zero_reserves(consensus: Option<&ConsensusView>, minted: Decimal) -> (bool, String) {
    match consensus {
        Some(view) => (
            view.value.is_zero() && minted > Decimal::ZERO,
            format!("reserves {} against minted {}", view.value, minted),
        ),
        None => (false, "no consensus available".to_string()),
    }
}
