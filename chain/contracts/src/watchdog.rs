//! Watchdog facade
//!
//! Single owner of every component. External callers (attesters, custodian
//! operators, arbiters, the settlement subsystem, keepers) go through this
//! type; it resolves caller identities, threads the shared registry into the
//! oracle and enforcement engine, and collects all component events into one
//! ordered log.

use reserve_types::ids::{AttesterId, CustodianId};
use reserve_types::status::{CustodianStatus, SelfPauseLevel};
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, info, warn};

use crate::config::WatchdogConfig;
use crate::enforcement::{EnforcementEngine, EnforcementOutcome, HardPauseOutcome, ViolationCheck};
use crate::errors::{OracleError, WatchdogError};
use crate::events::{StatusChanged, WatchdogEvent};
use crate::lifecycle::{
    Custodian, CustodianRegistry, DefaultOutcome, EscalationOutcome, ObligationTracker,
};
use crate::oracle::{ConsensusRecord, ConsensusView, ReserveOracle, SubmissionOutcome};
use crate::reason_codes::ReasonCode;
use crate::security::{AccessControl, Role};

/// Status changes retained per custodian; the oldest are dropped first.
pub const MAX_STATUS_HISTORY: usize = 256;

/// Custodian solvency watchdog.
#[derive(Debug)]
pub struct Watchdog {
    config: WatchdogConfig,
    access: AccessControl,
    registry: CustodianRegistry,
    oracle: ReserveOracle,
    enforcement: EnforcementEngine,
    events: Vec<WatchdogEvent>,
    /// Survives `drain_events`
    history: HashMap<CustodianId, VecDeque<StatusChanged>>,
}

impl Watchdog {
    /// Create a watchdog administered by `admin`.
    pub fn new(admin: impl Into<String>, config: WatchdogConfig) -> Result<Self, WatchdogError> {
        config.validate()?;
        let admin = admin.into();
        info!(admin = %admin, threshold = config.consensus_threshold, "watchdog initialized");
        Ok(Self {
            access: AccessControl::new(admin),
            registry: CustodianRegistry::new(&config),
            oracle: ReserveOracle::new(&config),
            enforcement: EnforcementEngine::new(&config),
            config,
            events: Vec::new(),
            history: HashMap::new(),
        })
    }

    pub fn config(&self) -> &WatchdogConfig {
        &self.config
    }

    pub fn access(&self) -> &AccessControl {
        &self.access
    }

    pub fn registry(&self) -> &CustodianRegistry {
        &self.registry
    }

    pub fn oracle(&self) -> &ReserveOracle {
        &self.oracle
    }

    pub fn enforcement(&self) -> &EnforcementEngine {
        &self.enforcement
    }

    // ───────────────────────── Administration ─────────────────────────

    /// Replace the configuration. Admin-only; validated before the swap.
    ///
    /// Live deadlines, countdowns and pending attestations are kept.
    pub fn update_config(&mut self, caller: &str, config: WatchdogConfig) -> Result<(), WatchdogError> {
        self.require_role(caller, Role::Admin)?;
        config.validate()?;
        self.registry.apply_config(&config);
        self.oracle.apply_config(&config);
        self.enforcement.apply_config(&config);
        let attesters = self.access.count_with_role(Role::Attester);
        if attesters < config.consensus_threshold {
            warn!(
                attesters,
                threshold = config.consensus_threshold,
                "fewer attesters than the consensus threshold"
            );
        }
        info!(caller, threshold = config.consensus_threshold, "configuration updated");
        self.config = config;
        Ok(())
    }

    pub fn grant_role(&mut self, caller: &str, target: &str, role: Role) -> Result<(), WatchdogError> {
        if !self.access.grant_role(caller, target, role) {
            warn!(caller, target, %role, "role grant rejected");
            return Err(WatchdogError::Unauthorized {
                caller: caller.to_string(),
                required: Role::Admin.to_string(),
            });
        }
        info!(caller, target, %role, "role granted");
        Ok(())
    }

    pub fn revoke_role(&mut self, caller: &str, target: &str, role: Role) -> Result<(), WatchdogError> {
        if !self.access.revoke_role(caller, target, role) {
            warn!(caller, target, %role, "role revocation rejected");
            return Err(WatchdogError::Unauthorized {
                caller: caller.to_string(),
                required: Role::Admin.to_string(),
            });
        }
        info!(caller, target, %role, "role revoked");
        Ok(())
    }

    pub fn register_custodian(
        &mut self,
        caller: &str,
        operator: &str,
        now: i64,
    ) -> Result<CustodianId, WatchdogError> {
        let result = self
            .registry
            .register_custodian(&self.access, caller, operator, now);
        self.collect_events();
        Ok(result?)
    }

    pub fn grant_initial_credit(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<(), WatchdogError> {
        let result = self
            .registry
            .grant_initial_credit(&self.access, caller, custodian_id, now);
        self.collect_events();
        Ok(result?)
    }

    // ───────────────────────── Queries ─────────────────────────

    pub fn get_status(&self, custodian_id: &CustodianId) -> Result<CustodianStatus, WatchdogError> {
        Ok(self.registry.get_status(custodian_id)?)
    }

    pub fn custodian(&self, custodian_id: &CustodianId) -> Option<&Custodian> {
        self.registry.custodian(custodian_id)
    }

    pub fn get_consensus(
        &self,
        custodian_id: &CustodianId,
        now: i64,
    ) -> Result<ConsensusView, WatchdogError> {
        if !self.registry.contains(custodian_id) {
            return Err(OracleError::UnknownCustodian {
                custodian_id: *custodian_id,
            }
            .into());
        }
        Ok(self.oracle.get_consensus(custodian_id, now)?)
    }

    pub fn can_self_pause(&self, custodian_id: &CustodianId, now: i64) -> Result<bool, WatchdogError> {
        Ok(self.registry.can_self_pause(custodian_id, now)?)
    }

    pub fn can_mint(&self, custodian_id: &CustodianId) -> Result<bool, WatchdogError> {
        Ok(self.registry.can_mint(custodian_id)?)
    }

    pub fn can_fulfill(&self, custodian_id: &CustodianId) -> Result<bool, WatchdogError> {
        Ok(self.registry.can_fulfill(custodian_id)?)
    }

    /// Evaluate an objective predicate without acting on it.
    pub fn check_violation(
        &self,
        custodian_id: &CustodianId,
        code: ReasonCode,
        now: i64,
    ) -> Result<ViolationCheck, WatchdogError> {
        Ok(self
            .enforcement
            .check_violation(&self.oracle, &self.registry, custodian_id, code, now)?)
    }

    pub fn batch_check_violations(
        &self,
        custodian_ids: &[CustodianId],
        code: ReasonCode,
        now: i64,
    ) -> Result<Vec<ViolationCheck>, WatchdogError> {
        Ok(self.enforcement.batch_check_violations(
            &self.oracle,
            &self.registry,
            custodian_ids,
            code,
            now,
        )?)
    }

    // ───────────────────────── Oracle Commands ─────────────────────────

    pub fn submit_attestation(
        &mut self,
        attester: &AttesterId,
        custodian_id: CustodianId,
        value: Decimal,
        now: i64,
    ) -> Result<SubmissionOutcome, WatchdogError> {
        let result = self.oracle.submit_attestation(
            &self.access,
            &self.registry,
            attester,
            custodian_id,
            value,
            now,
        );
        self.collect_events();
        Ok(result?)
    }

    /// Degraded-mode consensus below threshold. Requires `ConsensusAuthority`.
    pub fn force_consensus(
        &mut self,
        authority: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<ConsensusRecord, WatchdogError> {
        let result = self
            .oracle
            .force_consensus(&self.access, &self.registry, authority, custodian_id, now);
        self.collect_events();
        Ok(result?)
    }

    // ───────────────────────── Lifecycle Commands ─────────────────────────

    pub fn self_pause(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        level: SelfPauseLevel,
        now: i64,
    ) -> Result<StatusChanged, WatchdogError> {
        let result = self.registry.self_pause(caller, custodian_id, level, now);
        self.collect_events();
        Ok(result?)
    }

    pub fn resume_self_pause(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<StatusChanged, WatchdogError> {
        let result = self.registry.resume_self_pause(caller, custodian_id, now);
        self.collect_events();
        Ok(result?)
    }

    pub fn renew_pause_credit(&mut self, custodian_id: CustodianId, now: i64) -> Result<(), WatchdogError> {
        let result = self.registry.renew_pause_credit(custodian_id, now);
        self.collect_events();
        Ok(result?)
    }

    pub fn check_escalation(
        &mut self,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<EscalationOutcome, WatchdogError> {
        let result = self.registry.check_escalation(custodian_id, now);
        self.collect_events();
        Ok(result?)
    }

    /// Run `check_escalation` for every custodian with a due timer.
    ///
    /// Failures on one custodian are logged and do not stop the sweep.
    pub fn sweep_escalations(&mut self, now: i64) -> Vec<StatusChanged> {
        let mut escalated = Vec::new();
        for custodian_id in self.registry.custodian_ids() {
            match self.registry.check_escalation(custodian_id, now) {
                Ok(EscalationOutcome::Escalated(event)) => escalated.push(event),
                Ok(_) => {}
                Err(err) => {
                    warn!(custodian = %custodian_id, error = %err, "escalation check failed")
                }
            }
        }
        debug!(count = escalated.len(), now, "escalation sweep finished");
        self.collect_events();
        escalated
    }

    pub fn handle_default(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<DefaultOutcome, WatchdogError> {
        let result = self
            .registry
            .handle_default(&self.access, caller, custodian_id, now);
        self.collect_events();
        Ok(result?)
    }

    pub fn clear_backlog(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        obligations: &dyn ObligationTracker,
        now: i64,
    ) -> Result<StatusChanged, WatchdogError> {
        let result = self
            .registry
            .clear_backlog(&self.access, caller, custodian_id, obligations, now);
        self.collect_events();
        Ok(result?)
    }

    /// Arbiter override along any table edge.
    pub fn set_status(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        expected: CustodianStatus,
        to: CustodianStatus,
        reason: ReasonCode,
        now: i64,
    ) -> Result<StatusChanged, WatchdogError> {
        let result = self.registry.set_status(
            &self.access,
            caller,
            custodian_id,
            expected,
            to,
            reason,
            now,
        );
        self.collect_events();
        Ok(result?)
    }

    pub fn record_mint(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        amount: Decimal,
    ) -> Result<Decimal, WatchdogError> {
        Ok(self
            .registry
            .record_mint(&self.access, caller, custodian_id, amount)?)
    }

    pub fn record_burn(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        amount: Decimal,
    ) -> Result<Decimal, WatchdogError> {
        Ok(self
            .registry
            .record_burn(&self.access, caller, custodian_id, amount)?)
    }

    // ───────────────────────── Enforcement Commands ─────────────────────────

    /// Permissionless enforcement of an objective violation.
    pub fn enforce_objective_violation(
        &mut self,
        custodian_id: CustodianId,
        code: ReasonCode,
        now: i64,
    ) -> Result<EnforcementOutcome, WatchdogError> {
        let result = self.enforcement.enforce_objective_violation(
            &self.oracle,
            &mut self.registry,
            custodian_id,
            code,
            now,
        );
        self.collect_events();
        Ok(result?)
    }

    pub fn check_hard_pause(
        &mut self,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<HardPauseOutcome, WatchdogError> {
        let result = self
            .enforcement
            .check_hard_pause(&self.oracle, &mut self.registry, custodian_id, now);
        self.collect_events();
        Ok(result?)
    }

    pub fn lift_hard_pause(
        &mut self,
        caller: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<(), WatchdogError> {
        let result = self.enforcement.lift_hard_pause(
            &self.access,
            &mut self.registry,
            caller,
            custodian_id,
            now,
        );
        self.collect_events();
        Ok(result?)
    }

    // ───────────────────────── Events ─────────────────────────

    /// Get all emitted events.
    pub fn events(&self) -> &[WatchdogEvent] {
        &self.events
    }

    /// Drain all events (consume and clear). Status history is kept.
    pub fn drain_events(&mut self) -> Vec<WatchdogEvent> {
        std::mem::take(&mut self.events)
    }

    /// The last `MAX_STATUS_HISTORY` status changes of one custodian, oldest first.
    pub fn status_history(&self, custodian_id: &CustodianId) -> Vec<&StatusChanged> {
        self.history
            .get(custodian_id)
            .map(|changes| changes.iter().collect())
            .unwrap_or_default()
    }

    // ───────────────────────── Internal ─────────────────────────

    fn require_role(&self, caller: &str, role: Role) -> Result<(), WatchdogError> {
        if self.access.has_role(caller, role) {
            Ok(())
        } else {
            Err(WatchdogError::Unauthorized {
                caller: caller.to_string(),
                required: role.to_string(),
            })
        }
    }

    /// Move component events into the facade log and record status changes.
    fn collect_events(&mut self) {
        let mut collected = self.oracle.drain_events();
        collected.extend(self.enforcement.drain_events());
        collected.extend(self.registry.drain_events());

        for change in collected.iter().filter_map(WatchdogEvent::as_status_change) {
            let changes = self.history.entry(change.custodian_id).or_default();
            if changes.len() == MAX_STATUS_HISTORY {
                changes.pop_front();
            }
            changes.push_back(change.clone());
        }
        self.events.extend(collected);
    }
}
