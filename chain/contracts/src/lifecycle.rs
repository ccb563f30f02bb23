//! Lifecycle state machine: custodian status, escalation timers, defaults
//!
//! `CustodianRegistry` is the only owner of custodian records. Every status
//! change goes through one validator that checks, in order:
//! 1. the custodian exists
//! 2. the status still equals the caller's expected status (optimistic check)
//! 3. the edge exists in `TRANSITIONS`
//! 4. the caller class is authorized for that edge
//!
//! and then writes status, reason and version together and emits
//! `StatusChanged`.
//!
//! ```text
//! Active ──▶ MintingPaused ──▶ Paused
//!   │  ▲          │    │         │
//!   │  └──────────┴────┼─────────┘ (resume)
//!   │                  ▼
//!   ├─────────────▶ UnderReview ──▶ Revoked (terminal)
//!   │                  │
//!   └──────────────────┴──────────▶ Revoked
//! ```
//!
//! Timers are lazy: escalation deadlines are stored and only acted on when
//! someone calls `check_escalation`.

use reserve_types::ids::CustodianId;
use reserve_types::status::{CallerClass, CustodianStatus, SelfPauseLevel};
use reserve_types::time::{deadline_after, is_due};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::WatchdogConfig;
use crate::errors::LifecycleError;
use crate::events::{
    BacklogCleared, CustodianRegistered, DefaultRecorded, StatusChanged, WatchdogEvent,
};
use crate::pause_credit::PauseCreditLedger;
use crate::reason_codes::ReasonCode;
use crate::security::{AccessControl, Role};

use CallerClass::{Arbiter, Custodian as SelfService, DefaultPenalty, Enforcement, EscalationTimeout};
use CustodianStatus::{Active, MintingPaused, Paused, Revoked, UnderReview};

/// Every valid edge and the caller classes allowed to take it.
///
/// Arbiter authority is unconditional on every edge.
pub const TRANSITIONS: &[(CustodianStatus, CustodianStatus, &[CallerClass])] = &[
    (Active, MintingPaused, &[SelfService, DefaultPenalty, Arbiter]),
    (Active, Paused, &[SelfService, Arbiter]),
    (Active, UnderReview, &[Enforcement, Arbiter]),
    (Active, Revoked, &[Arbiter]),
    (MintingPaused, Active, &[SelfService, Arbiter]),
    (MintingPaused, Paused, &[SelfService, Arbiter]),
    (MintingPaused, UnderReview, &[Enforcement, EscalationTimeout, DefaultPenalty, Arbiter]),
    (Paused, Active, &[SelfService, Arbiter]),
    (Paused, UnderReview, &[Enforcement, EscalationTimeout, DefaultPenalty, Arbiter]),
    (UnderReview, Active, &[Arbiter]),
    (UnderReview, Revoked, &[Arbiter, DefaultPenalty]),
];

/// Caller classes allowed on `from -> to`, `None` if the edge does not exist.
pub fn allowed_callers(
    from: CustodianStatus,
    to: CustodianStatus,
) -> Option<&'static [CallerClass]> {
    TRANSITIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, callers)| *callers)
}

/// Whether `from -> to` is an edge of the transition table.
pub fn is_valid_transition(from: CustodianStatus, to: CustodianStatus) -> bool {
    allowed_callers(from, to).is_some()
}

/// Who put the custodian into its current pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PauseOrigin {
    /// The custodian spent its pause credit
    SelfInitiated,
    /// First default in the window
    DefaultPenalty,
    /// Arbiter decision
    Arbiter,
}

impl PauseOrigin {
    fn for_caller(class: CallerClass) -> Option<Self> {
        match class {
            CallerClass::Custodian => Some(PauseOrigin::SelfInitiated),
            CallerClass::DefaultPenalty => Some(PauseOrigin::DefaultPenalty),
            CallerClass::Arbiter => Some(PauseOrigin::Arbiter),
            CallerClass::Enforcement | CallerClass::EscalationTimeout => None,
        }
    }
}

/// A registered custodian.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Custodian {
    pub id: CustodianId,
    /// Caller identity allowed to act as this custodian
    pub operator: String,
    pub status: CustodianStatus,
    pub minted_amount: Decimal,
    pub registered_at: i64,
    pub status_changed_at: i64,
    pub last_reason: Option<ReasonCode>,
    /// Incremented on every transition
    pub version: u64,
    pub escalation_deadline: Option<i64>,
    pub pause_origin: Option<PauseOrigin>,
    pub default_count: u32,
    pub default_window_start: Option<i64>,
    pub last_default_at: Option<i64>,
    /// Safety-net pause blocking all operations, independent of status
    pub hard_paused: bool,
}

impl Custodian {
    pub fn can_mint(&self) -> bool {
        !self.hard_paused && self.status.permits_minting()
    }

    pub fn can_fulfill(&self) -> bool {
        !self.hard_paused && self.status.permits_fulfillment()
    }
}

/// A status change request handed to the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionRequest {
    pub custodian_id: CustodianId,
    pub expected: CustodianStatus,
    pub to: CustodianStatus,
    pub caller_class: CallerClass,
    pub reason: ReasonCode,
    pub now: i64,
}

/// Settlement-side view of outstanding obligations.
pub trait ObligationTracker {
    fn has_unfulfilled_obligations(&self, custodian_id: &CustodianId) -> bool;
}

impl<F> ObligationTracker for F
where
    F: Fn(&CustodianId) -> bool,
{
    fn has_unfulfilled_obligations(&self, custodian_id: &CustodianId) -> bool {
        self(custodian_id)
    }
}

/// Result of a lazy escalation check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationOutcome {
    /// No live timer
    NoTimer,
    /// Timer live but not yet due
    NotDue { deadline: i64 },
    /// Timer fired: custodian moved to review
    Escalated(StatusChanged),
}

/// Result of an external default signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultOutcome {
    /// Custodian already revoked; nothing recorded
    Ignored,
    /// Default counted, with the penalty transition if one applied
    Recorded {
        count_in_window: u32,
        transition: Option<StatusChanged>,
    },
}

/// Owner of all custodian records and their pause credits.
#[derive(Debug)]
pub struct CustodianRegistry {
    custodians: HashMap<CustodianId, Custodian>,
    credits: PauseCreditLedger,
    escalation_delay_secs: i64,
    default_window_secs: i64,
    backlog_cooldown_secs: i64,
    events: Vec<WatchdogEvent>,
}

impl CustodianRegistry {
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            custodians: HashMap::new(),
            credits: PauseCreditLedger::new(config),
            escalation_delay_secs: config.escalation_delay_secs,
            default_window_secs: config.default_window_secs,
            backlog_cooldown_secs: config.backlog_cooldown_secs,
            events: Vec::new(),
        }
    }

    /// Swap in new timing parameters. Live deadlines keep their old value.
    pub fn apply_config(&mut self, config: &WatchdogConfig) {
        self.credits.apply_config(config);
        self.escalation_delay_secs = config.escalation_delay_secs;
        self.default_window_secs = config.default_window_secs;
        self.backlog_cooldown_secs = config.backlog_cooldown_secs;
    }

    // ───────────────────────── Registration ─────────────────────────

    /// Register a custodian as `Active`. Admin-only.
    ///
    /// No pause credit is granted here.
    pub fn register_custodian(
        &mut self,
        access: &AccessControl,
        caller: &str,
        operator: impl Into<String>,
        now: i64,
    ) -> Result<CustodianId, LifecycleError> {
        if !access.is_admin(caller) {
            return Err(LifecycleError::Unauthorized {
                caller: caller.to_string(),
                action: "register custodians",
            });
        }
        let id = CustodianId::new();
        let operator = operator.into();
        self.custodians.insert(
            id,
            Custodian {
                id,
                operator: operator.clone(),
                status: Active,
                minted_amount: Decimal::ZERO,
                registered_at: now,
                status_changed_at: now,
                last_reason: None,
                version: 0,
                escalation_deadline: None,
                pause_origin: None,
                default_count: 0,
                default_window_start: None,
                last_default_at: None,
                hard_paused: false,
            },
        );
        info!(custodian = %id, operator = %operator, "custodian registered");
        self.events
            .push(WatchdogEvent::CustodianRegistered(CustodianRegistered {
                custodian_id: id,
                operator,
                registered_at: now,
            }));
        Ok(id)
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn contains(&self, custodian_id: &CustodianId) -> bool {
        self.custodians.contains_key(custodian_id)
    }

    pub fn custodian(&self, custodian_id: &CustodianId) -> Option<&Custodian> {
        self.custodians.get(custodian_id)
    }

    pub fn get_status(&self, custodian_id: &CustodianId) -> Result<CustodianStatus, LifecycleError> {
        self.get(custodian_id).map(|c| c.status)
    }

    /// Registered custodian ids, sorted.
    pub fn custodian_ids(&self) -> Vec<CustodianId> {
        let mut ids: Vec<CustodianId> = self.custodians.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn can_mint(&self, custodian_id: &CustodianId) -> Result<bool, LifecycleError> {
        self.get(custodian_id).map(Custodian::can_mint)
    }

    pub fn can_fulfill(&self, custodian_id: &CustodianId) -> Result<bool, LifecycleError> {
        self.get(custodian_id).map(Custodian::can_fulfill)
    }

    // ───────────────────────── Pause Credits ─────────────────────────

    /// Grant the initial pause credit. Admin-only, once per custodian.
    pub fn grant_initial_credit(
        &mut self,
        access: &AccessControl,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<(), LifecycleError> {
        if !access.is_admin(caller) {
            return Err(LifecycleError::Unauthorized {
                caller: caller.to_string(),
                action: "grant pause credits",
            });
        }
        self.get(&custodian_id)?;
        let event = self.credits.grant_initial_credit(custodian_id, now)?;
        self.events.push(event);
        Ok(())
    }

    /// Whether the custodian's pause credit is available at `now`.
    pub fn can_self_pause(&self, custodian_id: &CustodianId, now: i64) -> Result<bool, LifecycleError> {
        self.get(custodian_id)?;
        Ok(self.credits.can_self_pause(custodian_id, now))
    }

    /// Record a due credit renewal. Callable by anyone.
    pub fn renew_pause_credit(
        &mut self,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<(), LifecycleError> {
        self.get(&custodian_id)?;
        if let Some(event) = self.credits.renew(custodian_id, now)? {
            self.events.push(event);
        }
        Ok(())
    }

    pub fn pause_credits(&self) -> &PauseCreditLedger {
        &self.credits
    }

    // ───────────────────────── Self-Service ─────────────────────────

    /// Pause as the custodian itself.
    ///
    /// From `Active` this spends the pause credit and starts the escalation
    /// timer. From a self-initiated `MintingPaused`, level `Full` widens the
    /// pause to `Paused` with a fresh timer and no extra credit. Any other
    /// request is checked against the credit first, then the table.
    pub fn self_pause(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        level: SelfPauseLevel,
        now: i64,
    ) -> Result<StatusChanged, LifecycleError> {
        let custodian = self.require_operator(caller, &custodian_id)?;
        let from = custodian.status;
        let origin = custodian.pause_origin;
        let deadline = deadline_after(now, self.escalation_delay_secs).ok_or(
            LifecycleError::DeadlineOverflow {
                now,
                delay_secs: self.escalation_delay_secs,
            },
        )?;

        let event = if from == MintingPaused && level == SelfPauseLevel::Full {
            if origin != Some(PauseOrigin::SelfInitiated) {
                return Err(LifecycleError::NotSelfPaused { custodian_id });
            }
            self.transition(TransitionRequest {
                custodian_id,
                expected: from,
                to: Paused,
                caller_class: CallerClass::Custodian,
                reason: ReasonCode::SelfPauseEscalated,
                now,
            })?
        } else {
            let request = TransitionRequest {
                custodian_id,
                expected: from,
                to: level.target_status(),
                caller_class: CallerClass::Custodian,
                reason: match level {
                    SelfPauseLevel::MintingOnly => ReasonCode::SelfPauseMinting,
                    SelfPauseLevel::Full => ReasonCode::SelfPauseFull,
                },
                now,
            };
            self.credits
                .check_available(&custodian_id, now)
                .map_err(|err| {
                    debug!(custodian = %custodian_id, error = %err, "self-pause without credit");
                    LifecycleError::from(err)
                })?;
            self.check_transition(&request)?;
            let credit_events = self.credits.consume(custodian_id, now)?;
            self.events.extend(credit_events);
            self.commit_transition(&request)
        };

        if let Some(custodian) = self.custodians.get_mut(&custodian_id) {
            custodian.escalation_deadline = Some(deadline);
        }
        info!(custodian = %custodian_id, deadline, "escalation timer started");
        Ok(event)
    }

    /// End a self-initiated pause early. The credit is not refunded.
    pub fn resume_self_pause(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<StatusChanged, LifecycleError> {
        let custodian = self.require_operator(caller, &custodian_id)?;
        let from = custodian.status;
        if from.is_paused() && custodian.pause_origin != Some(PauseOrigin::SelfInitiated) {
            return Err(LifecycleError::NotSelfPaused { custodian_id });
        }
        self.transition(TransitionRequest {
            custodian_id,
            expected: from,
            to: Active,
            caller_class: CallerClass::Custodian,
            reason: ReasonCode::SelfResume,
            now,
        })
    }

    // ───────────────────────── Escalation ─────────────────────────

    /// Escalate an expired self-pause to `UnderReview`. Callable by anyone.
    ///
    /// Idempotent: without a due timer this is a no-op.
    pub fn check_escalation(
        &mut self,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<EscalationOutcome, LifecycleError> {
        let custodian = self.get(&custodian_id)?;
        let status = custodian.status;
        let deadline = match (status.is_paused(), custodian.escalation_deadline) {
            (true, Some(deadline)) => deadline,
            _ => {
                debug!(custodian = %custodian_id, %status, "no escalation timer");
                return Ok(EscalationOutcome::NoTimer);
            }
        };
        if !is_due(now, deadline) {
            debug!(custodian = %custodian_id, deadline, now, "escalation not due");
            return Ok(EscalationOutcome::NotDue { deadline });
        }

        let event = self.transition(TransitionRequest {
            custodian_id,
            expected: status,
            to: UnderReview,
            caller_class: CallerClass::EscalationTimeout,
            reason: ReasonCode::EscalationTimeout,
            now,
        })?;
        Ok(EscalationOutcome::Escalated(event))
    }

    // ───────────────────────── Defaults ─────────────────────────

    /// Count an external default and apply the graduated penalty.
    ///
    /// Within the rolling window the counter increments; outside it restarts
    /// at 1. The n-th default targets severity `min(n, 3)`; a custodian below
    /// that severity moves one step up the ladder.
    pub fn handle_default(
        &mut self,
        access: &AccessControl,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<DefaultOutcome, LifecycleError> {
        if !access.has_role(caller, Role::SettlementReporter) {
            return Err(LifecycleError::Unauthorized {
                caller: caller.to_string(),
                action: "report defaults",
            });
        }
        let custodian = self.get(&custodian_id)?;
        let status = custodian.status;
        if status.is_terminal() {
            debug!(custodian = %custodian_id, "default on revoked custodian ignored");
            return Ok(DefaultOutcome::Ignored);
        }

        let (count, window_start) = match custodian.default_window_start {
            Some(start) if now.saturating_sub(start) <= self.default_window_secs => {
                (custodian.default_count.saturating_add(1), start)
            }
            _ => (1, now),
        };

        let target_severity = count.min(3) as u8;
        let penalty = if status.severity() < target_severity {
            let to = match status {
                Active => MintingPaused,
                MintingPaused | Paused => UnderReview,
                _ => Revoked,
            };
            let request = TransitionRequest {
                custodian_id,
                expected: status,
                to,
                caller_class: CallerClass::DefaultPenalty,
                reason: ReasonCode::RedemptionDefault,
                now,
            };
            self.check_transition(&request)?;
            Some(request)
        } else {
            None
        };

        if let Some(custodian) = self.custodians.get_mut(&custodian_id) {
            custodian.default_count = count;
            custodian.default_window_start = Some(window_start);
            custodian.last_default_at = Some(now);
        }
        info!(custodian = %custodian_id, count, window_start, "default recorded");
        self.events.push(WatchdogEvent::DefaultRecorded(DefaultRecorded {
            custodian_id,
            count_in_window: count,
            window_start,
            recorded_at: now,
        }));

        let transition = penalty.map(|request| self.commit_transition(&request));
        Ok(DefaultOutcome::Recorded {
            count_in_window: count,
            transition,
        })
    }

    // ───────────────────────── Arbiter ─────────────────────────

    /// Return an `UnderReview` custodian to `Active`. Arbiter-only.
    ///
    /// Requires no unfulfilled obligations and a full cooldown since the
    /// last default. Resets the default counter.
    pub fn clear_backlog(
        &mut self,
        access: &AccessControl,
        caller: &str,
        custodian_id: CustodianId,
        obligations: &dyn ObligationTracker,
        now: i64,
    ) -> Result<StatusChanged, LifecycleError> {
        require_arbiter(access, caller, "clear backlogs")?;
        let custodian = self.get(&custodian_id)?;
        if custodian.status != UnderReview {
            return Err(LifecycleError::InvalidTransition {
                from: custodian.status,
                to: Active,
            });
        }
        if obligations.has_unfulfilled_obligations(&custodian_id) {
            return Err(LifecycleError::ObligationsOutstanding { custodian_id });
        }
        if let Some(last_default) = custodian.last_default_at {
            let available_at = last_default.saturating_add(self.backlog_cooldown_secs);
            if now < available_at {
                return Err(LifecycleError::CooldownNotElapsed { available_at });
            }
        }

        let event = self.transition(TransitionRequest {
            custodian_id,
            expected: UnderReview,
            to: Active,
            caller_class: CallerClass::Arbiter,
            reason: ReasonCode::BacklogCleared,
            now,
        })?;
        if let Some(custodian) = self.custodians.get_mut(&custodian_id) {
            custodian.default_count = 0;
            custodian.default_window_start = None;
        }
        self.events.push(WatchdogEvent::BacklogCleared(BacklogCleared {
            custodian_id,
            arbiter: caller.to_string(),
            cleared_at: now,
        }));
        Ok(event)
    }

    /// Take any table edge as arbiter.
    #[allow(clippy::too_many_arguments)]
    pub fn set_status(
        &mut self,
        access: &AccessControl,
        caller: &str,
        custodian_id: CustodianId,
        expected: CustodianStatus,
        to: CustodianStatus,
        reason: ReasonCode,
        now: i64,
    ) -> Result<StatusChanged, LifecycleError> {
        require_arbiter(access, caller, "set custodian status")?;
        self.transition(TransitionRequest {
            custodian_id,
            expected,
            to,
            caller_class: CallerClass::Arbiter,
            reason,
            now,
        })
    }

    // ───────────────────────── Issuance Bookkeeping ─────────────────────────

    /// Record newly minted supply. Only while minting is permitted.
    pub fn record_mint(
        &mut self,
        access: &AccessControl,
        caller: &str,
        custodian_id: CustodianId,
        amount: Decimal,
    ) -> Result<Decimal, LifecycleError> {
        require_minter(access, caller)?;
        if amount <= Decimal::ZERO {
            return Err(LifecycleError::InvalidAmount);
        }
        let custodian = self.get_mut(&custodian_id)?;
        if custodian.hard_paused {
            return Err(LifecycleError::HardPaused { custodian_id });
        }
        if !custodian.status.permits_minting() {
            return Err(LifecycleError::MintingNotPermitted {
                status: custodian.status,
            });
        }
        custodian.minted_amount = custodian
            .minted_amount
            .checked_add(amount)
            .ok_or(LifecycleError::Overflow)?;
        Ok(custodian.minted_amount)
    }

    /// Record supply retired by fulfilling an obligation.
    pub fn record_burn(
        &mut self,
        access: &AccessControl,
        caller: &str,
        custodian_id: CustodianId,
        amount: Decimal,
    ) -> Result<Decimal, LifecycleError> {
        require_minter(access, caller)?;
        if amount <= Decimal::ZERO {
            return Err(LifecycleError::InvalidAmount);
        }
        let custodian = self.get_mut(&custodian_id)?;
        if custodian.hard_paused {
            return Err(LifecycleError::HardPaused { custodian_id });
        }
        if !custodian.status.permits_fulfillment() {
            return Err(LifecycleError::FulfillmentNotPermitted {
                status: custodian.status,
            });
        }
        if amount > custodian.minted_amount {
            return Err(LifecycleError::InsufficientMinted {
                requested: amount.to_string(),
                minted: custodian.minted_amount.to_string(),
            });
        }
        custodian.minted_amount -= amount;
        Ok(custodian.minted_amount)
    }

    // ───────────────────────── Transition Validator ─────────────────────────

    /// Validate and apply a transition.
    pub(crate) fn transition(
        &mut self,
        request: TransitionRequest,
    ) -> Result<StatusChanged, LifecycleError> {
        self.check_transition(&request)?;
        Ok(self.commit_transition(&request))
    }

    /// Validation half of the transition routine. Mutates nothing.
    pub(crate) fn check_transition(&self, request: &TransitionRequest) -> Result<(), LifecycleError> {
        let custodian = self.get(&request.custodian_id)?;
        let from = custodian.status;

        if from != request.expected {
            warn!(
                custodian = %request.custodian_id,
                expected = %request.expected,
                actual = %from,
                "stale state conflict"
            );
            return Err(LifecycleError::StaleStateConflict {
                custodian_id: request.custodian_id,
                expected: request.expected,
                actual: from,
            });
        }

        let callers = allowed_callers(from, request.to).ok_or(LifecycleError::InvalidTransition {
            from,
            to: request.to,
        })?;

        if !callers.contains(&request.caller_class) {
            warn!(
                custodian = %request.custodian_id,
                caller_class = %request.caller_class,
                %from,
                to = %request.to,
                "capability denied"
            );
            return Err(LifecycleError::CapabilityDenied {
                caller_class: request.caller_class,
                from,
                to: request.to,
            });
        }
        Ok(())
    }

    /// Write half of the transition routine. Call only after `check_transition`.
    fn commit_transition(&mut self, request: &TransitionRequest) -> StatusChanged {
        let mut old_status = request.expected;
        if let Some(custodian) = self.custodians.get_mut(&request.custodian_id) {
            old_status = custodian.status;
            custodian.status = request.to;
            custodian.last_reason = Some(request.reason);
            custodian.status_changed_at = request.now;
            custodian.version += 1;
            // Only self_pause re-arms the timer, after this returns
            custodian.escalation_deadline = None;
            custodian.pause_origin = if request.to.is_paused() {
                PauseOrigin::for_caller(request.caller_class)
            } else {
                None
            };
        }

        let event = StatusChanged {
            event_id: Uuid::now_v7(),
            custodian_id: request.custodian_id,
            old_status,
            new_status: request.to,
            reason: request.reason,
            caller_class: request.caller_class,
            timestamp: request.now,
        };
        info!(
            custodian = %request.custodian_id,
            from = %old_status,
            to = %request.to,
            reason = %request.reason,
            caller_class = %request.caller_class,
            "status changed"
        );
        self.events.push(WatchdogEvent::StatusChanged(event.clone()));
        event
    }

    // ───────────────────────── Hard Pause ─────────────────────────

    /// Set or clear the hard-pause flag. Driven by the enforcement engine.
    pub(crate) fn set_hard_pause(
        &mut self,
        custodian_id: &CustodianId,
        paused: bool,
    ) -> Result<(), LifecycleError> {
        self.get_mut(custodian_id)?.hard_paused = paused;
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

    fn get(&self, custodian_id: &CustodianId) -> Result<&Custodian, LifecycleError> {
        self.custodians
            .get(custodian_id)
            .ok_or(LifecycleError::UnknownCustodian {
                custodian_id: *custodian_id,
            })
    }

    fn get_mut(&mut self, custodian_id: &CustodianId) -> Result<&mut Custodian, LifecycleError> {
        self.custodians
            .get_mut(custodian_id)
            .ok_or(LifecycleError::UnknownCustodian {
                custodian_id: *custodian_id,
            })
    }

    fn require_operator(
        &self,
        caller: &str,
        custodian_id: &CustodianId,
    ) -> Result<&Custodian, LifecycleError> {
        let custodian = self.get(custodian_id)?;
        if custodian.operator != caller {
            warn!(custodian = %custodian_id, caller, "caller is not the custodian operator");
            return Err(LifecycleError::Unauthorized {
                caller: caller.to_string(),
                action: "act as this custodian",
            });
        }
        Ok(custodian)
    }
}

fn require_arbiter(
    access: &AccessControl,
    caller: &str,
    action: &'static str,
) -> Result<(), LifecycleError> {
    if access.has_role(caller, Role::Arbiter) {
        Ok(())
    } else {
        Err(LifecycleError::Unauthorized {
            caller: caller.to_string(),
            action,
        })
    }
}

fn require_minter(access: &AccessControl, caller: &str) -> Result<(), LifecycleError> {
    if access.has_role(caller, Role::Minter) {
        Ok(())
    } else {
        Err(LifecycleError::Unauthorized {
            caller: caller.to_string(),
            action: "record issuance",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::PauseCreditError;
    use reserve_types::time::{DAY, HOUR};

    const ESCALATION: i64 = 48 * HOUR;

    struct Fixture {
        access: AccessControl,
        registry: CustodianRegistry,
        id: CustodianId,
    }

    fn setup() -> Fixture {
        let mut access = AccessControl::new("admin");
        access.grant_role("admin", "arbiter", Role::Arbiter);
        access.grant_role("admin", "settlement", Role::SettlementReporter);
        access.grant_role("admin", "minter", Role::Minter);
        let mut registry = CustodianRegistry::new(&WatchdogConfig::default());
        let id = registry
            .register_custodian(&access, "admin", "operator", 0)
            .unwrap();
        registry.grant_initial_credit(&access, "admin", id, 0).unwrap();
        Fixture {
            access,
            registry,
            id,
        }
    }

    fn no_obligations(_: &CustodianId) -> bool {
        false
    }

    // ─── Transition table ───

    #[test]
    fn test_table_has_eleven_edges() {
        assert_eq!(TRANSITIONS.len(), 11);
    }

    #[test]
    fn test_revoked_has_no_outgoing_edges() {
        for to in CustodianStatus::ALL {
            assert!(!is_valid_transition(Revoked, to));
        }
    }

    #[test]
    fn test_arbiter_on_every_edge() {
        for (_, _, callers) in TRANSITIONS {
            assert!(callers.contains(&Arbiter));
        }
    }

    #[test]
    fn test_no_self_loops() {
        for status in CustodianStatus::ALL {
            assert!(!is_valid_transition(status, status));
        }
    }

    // ─── Registration ───

    #[test]
    fn test_register_starts_active_without_credit() {
        let access = AccessControl::new("admin");
        let mut registry = CustodianRegistry::new(&WatchdogConfig::default());
        let id = registry
            .register_custodian(&access, "admin", "operator", 0)
            .unwrap();
        assert_eq!(registry.get_status(&id), Ok(Active));
        assert_eq!(registry.can_self_pause(&id, 0), Ok(false));
    }

    #[test]
    fn test_register_requires_admin() {
        let access = AccessControl::new("admin");
        let mut registry = CustodianRegistry::new(&WatchdogConfig::default());
        assert!(matches!(
            registry.register_custodian(&access, "eve", "operator", 0),
            Err(LifecycleError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_unknown_custodian() {
        let f = setup();
        let unknown = CustodianId::new();
        assert_eq!(
            f.registry.get_status(&unknown),
            Err(LifecycleError::UnknownCustodian {
                custodian_id: unknown
            })
        );
    }

    // ─── Validator ───

    #[test]
    fn test_stale_state_conflict() {
        let mut f = setup();
        let result = f.registry.set_status(
            &f.access,
            "arbiter",
            f.id,
            UnderReview,
            Revoked,
            ReasonCode::ArbiterDecision,
            10,
        );
        assert_eq!(
            result,
            Err(LifecycleError::StaleStateConflict {
                custodian_id: f.id,
                expected: UnderReview,
                actual: Active
            })
        );
    }

    #[test]
    fn test_capability_denied_for_enforcement_revoke() {
        let mut f = setup();
        let result = f.registry.transition(TransitionRequest {
            custodian_id: f.id,
            expected: Active,
            to: Revoked,
            caller_class: Enforcement,
            reason: ReasonCode::InsufficientReserves,
            now: 0,
        });
        assert_eq!(
            result,
            Err(LifecycleError::CapabilityDenied {
                caller_class: Enforcement,
                from: Active,
                to: Revoked
            })
        );
        assert_eq!(f.registry.get_status(&f.id), Ok(Active));
    }

    #[test]
    fn test_transition_bumps_version_and_emits_event() {
        let mut f = setup();
        f.registry.drain_events();
        let event = f
            .registry
            .set_status(
                &f.access,
                "arbiter",
                f.id,
                Active,
                UnderReview,
                ReasonCode::ArbiterDecision,
                5,
            )
            .unwrap();
        let custodian = f.registry.custodian(&f.id).unwrap();
        assert_eq!(custodian.version, 1);
        assert_eq!(custodian.last_reason, Some(ReasonCode::ArbiterDecision));
        assert_eq!(event.old_status, Active);
        assert_eq!(event.new_status, UnderReview);
        assert_eq!(event.caller_class, Arbiter);
        assert_eq!(f.registry.events().len(), 1);
    }

    #[test]
    fn test_revoked_is_terminal() {
        let mut f = setup();
        f.registry
            .set_status(&f.access, "arbiter", f.id, Active, Revoked, ReasonCode::ArbiterDecision, 0)
            .unwrap();
        for to in CustodianStatus::ALL {
            let result = f.registry.set_status(
                &f.access,
                "arbiter",
                f.id,
                Revoked,
                to,
                ReasonCode::ArbiterDecision,
                1,
            );
            assert_eq!(result, Err(LifecycleError::InvalidTransition { from: Revoked, to }));
        }
    }

    #[test]
    fn test_set_status_requires_arbiter() {
        let mut f = setup();
        let result = f.registry.set_status(
            &f.access,
            "operator",
            f.id,
            Active,
            Revoked,
            ReasonCode::ArbiterDecision,
            0,
        );
        assert!(matches!(result, Err(LifecycleError::Unauthorized { .. })));
    }

    // ─── Self-pause ───

    #[test]
    fn test_self_pause_consumes_credit_and_starts_timer() {
        let mut f = setup();
        let event = f
            .registry
            .self_pause("operator", f.id, SelfPauseLevel::MintingOnly, 100)
            .unwrap();
        assert_eq!(event.new_status, MintingPaused);
        assert_eq!(event.reason, ReasonCode::SelfPauseMinting);
        let custodian = f.registry.custodian(&f.id).unwrap();
        assert_eq!(custodian.escalation_deadline, Some(100 + ESCALATION));
        assert_eq!(custodian.pause_origin, Some(PauseOrigin::SelfInitiated));
        assert_eq!(f.registry.can_self_pause(&f.id, 100), Ok(false));
    }

    #[test]
    fn test_self_pause_requires_operator() {
        let mut f = setup();
        let result = f
            .registry
            .self_pause("eve", f.id, SelfPauseLevel::Full, 0);
        assert!(matches!(result, Err(LifecycleError::Unauthorized { .. })));
    }

    #[test]
    fn test_second_self_pause_fails_without_credit() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::MintingOnly, 0)
            .unwrap();
        f.registry.resume_self_pause("operator", f.id, HOUR).unwrap();
        let result = f
            .registry
            .self_pause("operator", f.id, SelfPauseLevel::MintingOnly, 2 * HOUR);
        assert!(matches!(
            result,
            Err(LifecycleError::PauseCredit(PauseCreditError::CreditUnavailable { .. }))
        ));
        assert_eq!(f.registry.get_status(&f.id), Ok(Active));
    }

    #[test]
    fn test_failed_self_pause_does_not_consume_credit() {
        let mut f = setup();
        f.registry
            .set_status(&f.access, "arbiter", f.id, Active, UnderReview, ReasonCode::ArbiterDecision, 0)
            .unwrap();
        let result = f
            .registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 1);
        assert!(matches!(result, Err(LifecycleError::InvalidTransition { .. })));
        assert_eq!(f.registry.can_self_pause(&f.id, 1), Ok(true));
    }

    #[test]
    fn test_widen_minting_pause_to_full() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::MintingOnly, 0)
            .unwrap();
        let event = f
            .registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 10 * HOUR)
            .unwrap();
        assert_eq!(event.new_status, Paused);
        assert_eq!(event.reason, ReasonCode::SelfPauseEscalated);
        assert_eq!(
            f.registry.custodian(&f.id).unwrap().escalation_deadline,
            Some(10 * HOUR + ESCALATION)
        );
    }

    #[test]
    fn test_self_pause_deadline_overflow_leaves_state() {
        let mut f = setup();
        let config = WatchdogConfig {
            escalation_delay_secs: i64::MAX,
            ..WatchdogConfig::default()
        };
        f.registry.apply_config(&config);

        assert_eq!(
            f.registry
                .self_pause("operator", f.id, SelfPauseLevel::Full, 1_700_000_000),
            Err(LifecycleError::DeadlineOverflow {
                now: 1_700_000_000,
                delay_secs: i64::MAX
            })
        );
        assert_eq!(f.registry.get_status(&f.id), Ok(Active));
        assert_eq!(f.registry.can_self_pause(&f.id, 1_700_000_000), Ok(true));
        assert!(f.registry.drain_events().iter().all(|e| e.as_status_change().is_none()));
    }

    #[test]
    fn test_arbiter_widening_drops_self_pause_timer() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::MintingOnly, 0)
            .unwrap();
        f.registry
            .set_status(
                &f.access,
                "arbiter",
                f.id,
                MintingPaused,
                Paused,
                ReasonCode::ArbiterDecision,
                HOUR,
            )
            .unwrap();

        let custodian = f.registry.custodian(&f.id).unwrap();
        assert_eq!(custodian.escalation_deadline, None);
        assert_eq!(custodian.pause_origin, Some(PauseOrigin::Arbiter));
        assert_eq!(
            f.registry.check_escalation(f.id, ESCALATION + HOUR),
            Ok(EscalationOutcome::NoTimer)
        );
        assert_eq!(
            f.registry.resume_self_pause("operator", f.id, ESCALATION + HOUR),
            Err(LifecycleError::NotSelfPaused { custodian_id: f.id })
        );
    }

    #[test]
    fn test_resume_clears_timer_without_refund() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 0)
            .unwrap();
        let event = f.registry.resume_self_pause("operator", f.id, HOUR).unwrap();
        assert_eq!(event.new_status, Active);
        let custodian = f.registry.custodian(&f.id).unwrap();
        assert_eq!(custodian.escalation_deadline, None);
        assert_eq!(f.registry.can_self_pause(&f.id, HOUR), Ok(false));
    }

    #[test]
    fn test_resume_rejected_for_penalty_pause() {
        let mut f = setup();
        f.registry
            .handle_default(&f.access, "settlement", f.id, 0)
            .unwrap();
        assert_eq!(
            f.registry.resume_self_pause("operator", f.id, 1),
            Err(LifecycleError::NotSelfPaused { custodian_id: f.id })
        );
    }

    // ─── Escalation ───

    #[test]
    fn test_escalation_not_before_deadline() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::MintingOnly, 0)
            .unwrap();
        assert_eq!(
            f.registry.check_escalation(f.id, ESCALATION - 1),
            Ok(EscalationOutcome::NotDue {
                deadline: ESCALATION
            })
        );
        assert_eq!(f.registry.get_status(&f.id), Ok(MintingPaused));
    }

    #[test]
    fn test_escalation_at_deadline() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 0)
            .unwrap();
        let outcome = f.registry.check_escalation(f.id, ESCALATION).unwrap();
        match outcome {
            EscalationOutcome::Escalated(event) => {
                assert_eq!(event.old_status, Paused);
                assert_eq!(event.new_status, UnderReview);
                assert_eq!(event.caller_class, EscalationTimeout);
            }
            other => panic!("expected escalation, got {:?}", other),
        }
        assert_eq!(f.registry.custodian(&f.id).unwrap().escalation_deadline, None);
    }

    #[test]
    fn test_escalation_idempotent() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 0)
            .unwrap();
        f.registry.check_escalation(f.id, ESCALATION).unwrap();
        assert_eq!(
            f.registry.check_escalation(f.id, ESCALATION + 1),
            Ok(EscalationOutcome::NoTimer)
        );
    }

    #[test]
    fn test_escalation_after_resume_is_noop() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 0)
            .unwrap();
        f.registry.resume_self_pause("operator", f.id, HOUR).unwrap();
        assert_eq!(
            f.registry.check_escalation(f.id, 10 * ESCALATION),
            Ok(EscalationOutcome::NoTimer)
        );
        assert_eq!(f.registry.get_status(&f.id), Ok(Active));
    }

    // ─── Defaults ───

    #[test]
    fn test_three_defaults_walk_the_ladder() {
        let mut f = setup();
        let mut statuses = Vec::new();
        for day in 0..3 {
            f.registry
                .handle_default(&f.access, "settlement", f.id, day * DAY)
                .unwrap();
            statuses.push(f.registry.get_status(&f.id).unwrap());
        }
        assert_eq!(statuses, vec![MintingPaused, UnderReview, Revoked]);

        let fourth = f
            .registry
            .handle_default(&f.access, "settlement", f.id, 3 * DAY)
            .unwrap();
        assert_eq!(fourth, DefaultOutcome::Ignored);
    }

    #[test]
    fn test_default_outside_window_resets_to_one() {
        let mut f = setup();
        f.registry
            .handle_default(&f.access, "settlement", f.id, 0)
            .unwrap();
        let outcome = f
            .registry
            .handle_default(&f.access, "settlement", f.id, 31 * DAY)
            .unwrap();
        match outcome {
            DefaultOutcome::Recorded {
                count_in_window,
                transition,
            } => {
                assert_eq!(count_in_window, 1);
                assert!(transition.is_none(), "already at severity 1");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        let custodian = f.registry.custodian(&f.id).unwrap();
        assert_eq!(custodian.default_window_start, Some(31 * DAY));
        assert_eq!(custodian.status, MintingPaused);
    }

    #[test]
    fn test_default_requires_settlement_role() {
        let mut f = setup();
        assert!(matches!(
            f.registry.handle_default(&f.access, "operator", f.id, 0),
            Err(LifecycleError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_default_during_self_pause_escalates_to_review_on_second() {
        let mut f = setup();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 0)
            .unwrap();
        // First default: target severity 1, already paused
        f.registry
            .handle_default(&f.access, "settlement", f.id, HOUR)
            .unwrap();
        assert_eq!(f.registry.get_status(&f.id), Ok(Paused));
        f.registry
            .handle_default(&f.access, "settlement", f.id, 2 * HOUR)
            .unwrap();
        assert_eq!(f.registry.get_status(&f.id), Ok(UnderReview));
    }

    // ─── Backlog clearance ───

    fn under_review_after_defaults(f: &mut Fixture) {
        f.registry
            .handle_default(&f.access, "settlement", f.id, 0)
            .unwrap();
        f.registry
            .handle_default(&f.access, "settlement", f.id, DAY)
            .unwrap();
        assert_eq!(f.registry.get_status(&f.id), Ok(UnderReview));
    }

    #[test]
    fn test_clear_backlog_after_cooldown() {
        let mut f = setup();
        under_review_after_defaults(&mut f);
        let event = f
            .registry
            .clear_backlog(&f.access, "arbiter", f.id, &no_obligations, 91 * DAY)
            .unwrap();
        assert_eq!(event.new_status, Active);
        assert_eq!(f.registry.custodian(&f.id).unwrap().default_count, 0);
    }

    #[test]
    fn test_clear_backlog_before_cooldown() {
        let mut f = setup();
        under_review_after_defaults(&mut f);
        assert_eq!(
            f.registry
                .clear_backlog(&f.access, "arbiter", f.id, &no_obligations, 30 * DAY),
            Err(LifecycleError::CooldownNotElapsed {
                available_at: 91 * DAY
            })
        );
    }

    #[test]
    fn test_clear_backlog_with_outstanding_obligations() {
        let mut f = setup();
        under_review_after_defaults(&mut f);
        let outstanding = |_: &CustodianId| true;
        assert_eq!(
            f.registry
                .clear_backlog(&f.access, "arbiter", f.id, &outstanding, 200 * DAY),
            Err(LifecycleError::ObligationsOutstanding { custodian_id: f.id })
        );
    }

    #[test]
    fn test_clear_backlog_requires_under_review() {
        let mut f = setup();
        assert_eq!(
            f.registry
                .clear_backlog(&f.access, "arbiter", f.id, &no_obligations, 0),
            Err(LifecycleError::InvalidTransition {
                from: Active,
                to: Active
            })
        );
    }

    // ─── Issuance bookkeeping ───

    #[test]
    fn test_mint_only_while_active() {
        let mut f = setup();
        f.registry
            .record_mint(&f.access, "minter", f.id, Decimal::from(5))
            .unwrap();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::MintingOnly, 0)
            .unwrap();
        assert_eq!(
            f.registry
                .record_mint(&f.access, "minter", f.id, Decimal::from(1)),
            Err(LifecycleError::MintingNotPermitted {
                status: MintingPaused
            })
        );
        // Fulfillment continues during a minting pause
        assert_eq!(
            f.registry
                .record_burn(&f.access, "minter", f.id, Decimal::from(2)),
            Ok(Decimal::from(3))
        );
    }

    #[test]
    fn test_full_pause_blocks_burn() {
        let mut f = setup();
        f.registry
            .record_mint(&f.access, "minter", f.id, Decimal::from(5))
            .unwrap();
        f.registry
            .self_pause("operator", f.id, SelfPauseLevel::Full, 0)
            .unwrap();
        assert_eq!(
            f.registry
                .record_burn(&f.access, "minter", f.id, Decimal::from(1)),
            Err(LifecycleError::FulfillmentNotPermitted { status: Paused })
        );
    }

    #[test]
    fn test_burn_cannot_exceed_minted() {
        let mut f = setup();
        f.registry
            .record_mint(&f.access, "minter", f.id, Decimal::from(1))
            .unwrap();
        assert!(matches!(
            f.registry
                .record_burn(&f.access, "minter", f.id, Decimal::from(2)),
            Err(LifecycleError::InsufficientMinted { .. })
        ));
    }

    #[test]
    fn test_hard_pause_blocks_issuance() {
        let mut f = setup();
        f.registry.set_hard_pause(&f.id, true).unwrap();
        assert_eq!(f.registry.can_mint(&f.id), Ok(false));
        assert_eq!(f.registry.can_fulfill(&f.id), Ok(false));
        assert_eq!(
            f.registry
                .record_mint(&f.access, "minter", f.id, Decimal::from(1)),
            Err(LifecycleError::HardPaused { custodian_id: f.id })
        );
    }
}
