//! Reserve consensus oracle: attestations, median consensus, staleness
//!
//! Attesters report the reserves they observe for a custodian. Each custodian
//! has a rolling buffer holding at most one pending attestation per attester.
//! Once `threshold` fresh attestations exist, consensus is the median of the
//! freshest `threshold` values and those attestations leave the buffer.
//!
//! The median tolerates up to `floor((threshold - 1) / 2)` arbitrary-valued
//! contributors. Even counts resolve to the lower-middle value.

use reserve_types::ids::{AttesterId, CustodianId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::config::WatchdogConfig;
use crate::errors::OracleError;
use crate::events::{
    AttestationSubmitted, ConsensusUpdated, DegradedConsensusForced, WatchdogEvent,
};
use crate::lifecycle::CustodianRegistry;
use crate::security::{AccessControl, Role};

/// A single reserve observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    pub attester: AttesterId,
    pub custodian_id: CustodianId,
    pub value: Decimal,
    pub timestamp: i64,
    /// Submission order, breaks timestamp ties
    pub sequence: u64,
}

/// The agreed reserve value for a custodian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub custodian_id: CustodianId,
    pub value: Decimal,
    pub computed_at: i64,
    pub attestation_count: usize,
    /// Forced below threshold through the recovery path
    pub degraded: bool,
}

/// Consensus as seen by a reader at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsensusView {
    pub value: Decimal,
    pub is_stale: bool,
    pub computed_at: i64,
    pub degraded: bool,
}

/// Result of submitting an attestation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Buffered; not enough fresh attestations yet
    Pending { fresh: usize, required: usize },
    /// This submission completed a consensus round
    ConsensusReached(ConsensusRecord),
}

/// Median of a small value set, lower-middle for even counts.
///
/// Sorts in place with `sort_unstable` (O(n log n)).
pub fn lower_median(values: &mut [Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable();
    Some(values[(values.len() - 1) / 2])
}

/// Reserve consensus oracle.
#[derive(Debug)]
pub struct ReserveOracle {
    /// Pending attestations per custodian
    buffers: HashMap<CustodianId, Vec<Attestation>>,
    /// Latest consensus per custodian
    records: HashMap<CustodianId, ConsensusRecord>,
    threshold: usize,
    attestation_window_secs: i64,
    max_staleness_secs: i64,
    next_sequence: u64,
    events: Vec<WatchdogEvent>,
}

impl ReserveOracle {
    /// Create an oracle with the consensus parameters from `config`.
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            buffers: HashMap::new(),
            records: HashMap::new(),
            threshold: config.consensus_threshold,
            attestation_window_secs: config.attestation_window_secs,
            max_staleness_secs: config.max_staleness_secs,
            next_sequence: 0,
            events: Vec::new(),
        }
    }

    /// Swap in new consensus parameters. Pending attestations are kept.
    pub fn apply_config(&mut self, config: &WatchdogConfig) {
        self.threshold = config.consensus_threshold;
        self.attestation_window_secs = config.attestation_window_secs;
        self.max_staleness_secs = config.max_staleness_secs;
    }

    /// Attestations required for a normal consensus round.
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    // ───────────────────────── Submission ─────────────────────────

    /// Submit a reserve observation.
    ///
    /// Requires the `Attester` role and a registered custodian. Zero is a
    /// valid value; negative values are rejected. A repeat submission from
    /// the same attester replaces its earlier pending value.
    pub fn submit_attestation(
        &mut self,
        access: &AccessControl,
        registry: &CustodianRegistry,
        attester: &AttesterId,
        custodian_id: CustodianId,
        value: Decimal,
        now: i64,
    ) -> Result<SubmissionOutcome, OracleError> {
        if !access.has_role(attester.as_str(), Role::Attester) {
            warn!(attester = %attester, "attestation rejected: missing attester role");
            return Err(OracleError::Unauthorized {
                caller: attester.to_string(),
                required: Role::Attester.to_string(),
            });
        }
        if !registry.contains(&custodian_id) {
            return Err(OracleError::UnknownCustodian { custodian_id });
        }
        if value < Decimal::ZERO {
            return Err(OracleError::InvalidValue {
                value: value.to_string(),
            });
        }

        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let buffer = self.buffers.entry(custodian_id).or_default();
        buffer.retain(|a| &a.attester != attester);
        buffer.push(Attestation {
            attester: attester.clone(),
            custodian_id,
            value,
            timestamp: now,
            sequence,
        });

        self.events
            .push(WatchdogEvent::AttestationSubmitted(AttestationSubmitted {
                custodian_id,
                attester: attester.clone(),
                value,
                timestamp: now,
            }));

        self.prune(custodian_id, now);
        let fresh = self.pending_count(&custodian_id);
        if fresh < self.threshold {
            debug!(
                custodian = %custodian_id,
                fresh,
                required = self.threshold,
                "attestation buffered"
            );
            return Ok(SubmissionOutcome::Pending {
                fresh,
                required: self.threshold,
            });
        }

        let record = self.compute_consensus(custodian_id, self.threshold, false, now);
        Ok(SubmissionOutcome::ConsensusReached(record))
    }

    // ───────────────────────── Degraded Recovery ─────────────────────────

    /// Force a consensus from fewer than `threshold` fresh attestations.
    ///
    /// Deadlock breaker for attester outages. Needs at least one fresh
    /// attestation and the `ConsensusAuthority` role. The resulting record is
    /// marked degraded. With a full threshold available the normal round runs
    /// instead.
    pub fn force_consensus(
        &mut self,
        access: &AccessControl,
        registry: &CustodianRegistry,
        authority: &str,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<ConsensusRecord, OracleError> {
        if !access.has_role(authority, Role::ConsensusAuthority) {
            warn!(authority, "forced consensus rejected: missing authority role");
            return Err(OracleError::Unauthorized {
                caller: authority.to_string(),
                required: Role::ConsensusAuthority.to_string(),
            });
        }
        if !registry.contains(&custodian_id) {
            return Err(OracleError::UnknownCustodian { custodian_id });
        }

        self.prune(custodian_id, now);
        let fresh = self.pending_count(&custodian_id);
        if fresh == 0 {
            return Err(OracleError::ConsensusNotReady {
                custodian_id,
                fresh,
                required: 1,
            });
        }
        if fresh >= self.threshold {
            return Ok(self.compute_consensus(custodian_id, self.threshold, false, now));
        }

        let record = self.compute_consensus(custodian_id, fresh, true, now);
        warn!(
            custodian = %custodian_id,
            authority,
            value = %record.value,
            attestations = fresh,
            required = self.threshold,
            "DEGRADED consensus forced below threshold"
        );
        self.events
            .push(WatchdogEvent::DegradedConsensusForced(DegradedConsensusForced {
                custodian_id,
                authority: authority.to_string(),
                value: record.value,
                attestation_count: fresh,
                required: self.threshold,
                computed_at: now,
            }));
        Ok(record)
    }

    // ───────────────────────── Queries ─────────────────────────

    /// Latest consensus and whether it is stale at `now`.
    ///
    /// Fewer than threshold fresh attestations never clear or zero the prior
    /// value; only a custodian with no consensus at all is not ready.
    pub fn get_consensus(
        &self,
        custodian_id: &CustodianId,
        now: i64,
    ) -> Result<ConsensusView, OracleError> {
        let record = self
            .records
            .get(custodian_id)
            .ok_or_else(|| OracleError::ConsensusNotReady {
                custodian_id: *custodian_id,
                fresh: self.fresh_attestation_count(custodian_id, now),
                required: self.threshold,
            })?;

        Ok(ConsensusView {
            value: record.value,
            is_stale: now.saturating_sub(record.computed_at) > self.max_staleness_secs,
            computed_at: record.computed_at,
            degraded: record.degraded,
        })
    }

    /// Raw consensus record, if one was ever computed.
    pub fn consensus_record(&self, custodian_id: &CustodianId) -> Option<&ConsensusRecord> {
        self.records.get(custodian_id)
    }

    /// Pending attestations still inside the freshness window at `now`.
    pub fn fresh_attestation_count(&self, custodian_id: &CustodianId, now: i64) -> usize {
        self.buffers.get(custodian_id).map_or(0, |buffer| {
            buffer
                .iter()
                .filter(|a| self.is_fresh(a, now))
                .count()
        })
    }

    /// Pending attestations, including ones not yet pruned.
    pub fn pending_attestations(&self, custodian_id: &CustodianId) -> &[Attestation] {
        self.buffers
            .get(custodian_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
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

    fn is_fresh(&self, attestation: &Attestation, now: i64) -> bool {
        now.saturating_sub(attestation.timestamp) <= self.attestation_window_secs
    }

    fn pending_count(&self, custodian_id: &CustodianId) -> usize {
        self.buffers.get(custodian_id).map_or(0, Vec::len)
    }

    /// Drop attestations that left the freshness window.
    fn prune(&mut self, custodian_id: CustodianId, now: i64) {
        let window = self.attestation_window_secs;
        if let Some(buffer) = self.buffers.get_mut(&custodian_id) {
            let before = buffer.len();
            buffer.retain(|a| now.saturating_sub(a.timestamp) <= window);
            let dropped = before - buffer.len();
            if dropped > 0 {
                debug!(custodian = %custodian_id, dropped, "stale attestations pruned");
            }
        }
    }

    /// Median of the `take` freshest pending attestations.
    ///
    /// The buffer must be pruned and hold at least `take` entries. Consumed
    /// attestations are removed and the record replaces the previous one.
    fn compute_consensus(
        &mut self,
        custodian_id: CustodianId,
        take: usize,
        degraded: bool,
        now: i64,
    ) -> ConsensusRecord {
        let buffer = self.buffers.entry(custodian_id).or_default();
        // Freshest first: latest timestamp, then latest submission
        buffer.sort_unstable_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.sequence.cmp(&a.sequence))
        });
        let count = take.min(buffer.len());
        let selected: Vec<Attestation> = buffer.drain(..count).collect();

        let mut values: Vec<Decimal> = selected.iter().map(|a| a.value).collect();
        let value = lower_median(&mut values).unwrap_or(Decimal::ZERO);

        let record = ConsensusRecord {
            custodian_id,
            value,
            computed_at: now,
            attestation_count: selected.len(),
            degraded,
        };
        self.records.insert(custodian_id, record.clone());

        info!(
            custodian = %custodian_id,
            value = %value,
            attestations = record.attestation_count,
            degraded,
            "consensus updated"
        );
        self.events
            .push(WatchdogEvent::ConsensusUpdated(ConsensusUpdated {
                custodian_id,
                value,
                attestation_count: record.attestation_count,
                computed_at: now,
                degraded,
            }));

        record
    }
}
