//! Pause credit ledger: one self-service pause entitlement per custodian
//!
//! A credit is granted explicitly, never at registration. Using it starts a
//! renewal period measured from the use; an early resume does not refund it.
//! Renewal is lazy: a due credit counts as available before anyone calls
//! `renew`, and `renew` only records what is already true.

use reserve_types::ids::CustodianId;
use reserve_types::time::deadline_after;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

use crate::config::WatchdogConfig;
use crate::errors::PauseCreditError;
use crate::events::{PauseCreditConsumed, PauseCreditGranted, PauseCreditRenewed, WatchdogEvent};

/// Pause credit state for one custodian.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseCredit {
    pub custodian_id: CustodianId,
    /// Credit held and not yet used since the last grant or renewal
    pub available: bool,
    pub granted_at: i64,
    pub last_used_at: Option<i64>,
}

impl PauseCredit {
    /// When a consumed credit comes back, `None` while available.
    pub fn renews_at(&self, renewal_secs: i64) -> Option<i64> {
        if self.available {
            return None;
        }
        // Saturates: a renewal past the i64 range never arrives
        self.last_used_at.map(|used| used.saturating_add(renewal_secs))
    }

    /// Available at `now`, counting a due but unrecorded renewal.
    pub fn is_available(&self, renewal_secs: i64, now: i64) -> bool {
        self.available || self.renews_at(renewal_secs).map_or(false, |at| now >= at)
    }
}

/// Ledger of pause credits.
#[derive(Debug)]
pub struct PauseCreditLedger {
    credits: HashMap<CustodianId, PauseCredit>,
    renewal_secs: i64,
}

impl PauseCreditLedger {
    pub fn new(config: &WatchdogConfig) -> Self {
        Self {
            credits: HashMap::new(),
            renewal_secs: config.pause_credit_renewal_secs,
        }
    }

    pub fn apply_config(&mut self, config: &WatchdogConfig) {
        self.renewal_secs = config.pause_credit_renewal_secs;
    }

    /// Grant the single initial credit. Repeat grants are rejected.
    pub fn grant_initial_credit(
        &mut self,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<WatchdogEvent, PauseCreditError> {
        if self.credits.contains_key(&custodian_id) {
            return Err(PauseCreditError::AlreadyGranted { custodian_id });
        }
        self.credits.insert(
            custodian_id,
            PauseCredit {
                custodian_id,
                available: true,
                granted_at: now,
                last_used_at: None,
            },
        );
        info!(custodian = %custodian_id, "initial pause credit granted");
        Ok(WatchdogEvent::PauseCreditGranted(PauseCreditGranted {
            custodian_id,
            granted_at: now,
        }))
    }

    /// Whether the custodian could self-pause at `now`.
    pub fn can_self_pause(&self, custodian_id: &CustodianId, now: i64) -> bool {
        self.credits
            .get(custodian_id)
            .map_or(false, |credit| credit.is_available(self.renewal_secs, now))
    }

    /// Same as `can_self_pause`, with the reason when unavailable.
    pub fn check_available(
        &self,
        custodian_id: &CustodianId,
        now: i64,
    ) -> Result<(), PauseCreditError> {
        let credit = self
            .credits
            .get(custodian_id)
            .ok_or(PauseCreditError::NotGranted {
                custodian_id: *custodian_id,
            })?;
        if credit.is_available(self.renewal_secs, now) {
            return Ok(());
        }
        Err(PauseCreditError::CreditUnavailable {
            custodian_id: *custodian_id,
            renews_at: credit
                .renews_at(self.renewal_secs)
                .unwrap_or(credit.granted_at),
        })
    }

    /// When a consumed credit renews, `None` if available or never granted.
    pub fn renews_at(&self, custodian_id: &CustodianId) -> Option<i64> {
        self.credits
            .get(custodian_id)
            .and_then(|credit| credit.renews_at(self.renewal_secs))
    }

    pub fn credit(&self, custodian_id: &CustodianId) -> Option<&PauseCredit> {
        self.credits.get(custodian_id)
    }

    /// Record a due renewal.
    ///
    /// Returns `None` when the credit is already available.
    pub fn renew(
        &mut self,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<Option<WatchdogEvent>, PauseCreditError> {
        let renewal_secs = self.renewal_secs;
        let credit = self
            .credits
            .get_mut(&custodian_id)
            .ok_or(PauseCreditError::NotGranted { custodian_id })?;

        if credit.available {
            debug!(custodian = %custodian_id, "pause credit already available");
            return Ok(None);
        }
        match credit.renews_at(renewal_secs) {
            Some(at) if now >= at => {
                credit.available = true;
                info!(custodian = %custodian_id, "pause credit renewed");
                Ok(Some(WatchdogEvent::PauseCreditRenewed(PauseCreditRenewed {
                    custodian_id,
                    renewed_at: now,
                })))
            }
            Some(at) => Err(PauseCreditError::CreditUnavailable {
                custodian_id,
                renews_at: at,
            }),
            None => Err(PauseCreditError::NotGranted { custodian_id }),
        }
    }

    /// Use the credit for a self-pause.
    ///
    /// A due renewal is applied first. Returns the events to emit, renewal
    /// (if any) before consumption.
    pub(crate) fn consume(
        &mut self,
        custodian_id: CustodianId,
        now: i64,
    ) -> Result<Vec<WatchdogEvent>, PauseCreditError> {
        let renews_at = deadline_after(now, self.renewal_secs)
            .ok_or(PauseCreditError::RenewalOverflow { custodian_id, now })?;
        let mut emitted = Vec::new();
        if let Some(renewed) = self.renew(custodian_id, now)? {
            emitted.push(renewed);
        }

        let credit = self
            .credits
            .get_mut(&custodian_id)
            .ok_or(PauseCreditError::NotGranted { custodian_id })?;
        credit.available = false;
        credit.last_used_at = Some(now);

        info!(custodian = %custodian_id, renews_at, "pause credit consumed");
        emitted.push(WatchdogEvent::PauseCreditConsumed(PauseCreditConsumed {
            custodian_id,
            used_at: now,
            renews_at,
        }));
        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reserve_types::time::DAY;

    const RENEWAL: i64 = 90 * DAY;

    fn ledger_with_credit() -> (PauseCreditLedger, CustodianId) {
        let mut ledger = PauseCreditLedger::new(&WatchdogConfig::default());
        let id = CustodianId::new();
        ledger.grant_initial_credit(id, 0).unwrap();
        (ledger, id)
    }

    #[test]
    fn test_no_credit_before_grant() {
        let ledger = PauseCreditLedger::new(&WatchdogConfig::default());
        assert!(!ledger.can_self_pause(&CustodianId::new(), 0));
    }

    #[test]
    fn test_grant_makes_credit_available() {
        let (ledger, id) = ledger_with_credit();
        assert!(ledger.can_self_pause(&id, 0));
        assert_eq!(ledger.renews_at(&id), None);
    }

    #[test]
    fn test_double_grant_rejected() {
        let (mut ledger, id) = ledger_with_credit();
        assert_eq!(
            ledger.grant_initial_credit(id, 10),
            Err(PauseCreditError::AlreadyGranted { custodian_id: id })
        );
    }

    #[test]
    fn test_consume_then_unavailable_until_renewal() {
        let (mut ledger, id) = ledger_with_credit();
        let used_at = 5 * DAY;
        ledger.consume(id, used_at).unwrap();

        assert!(!ledger.can_self_pause(&id, used_at));
        assert!(!ledger.can_self_pause(&id, used_at + RENEWAL - 1));
        assert!(ledger.can_self_pause(&id, used_at + RENEWAL));
        assert_eq!(ledger.renews_at(&id), Some(used_at + RENEWAL));
    }

    #[test]
    fn test_consume_without_credit_fails() {
        let (mut ledger, id) = ledger_with_credit();
        ledger.consume(id, 0).unwrap();
        assert_eq!(
            ledger.consume(id, DAY),
            Err(PauseCreditError::CreditUnavailable {
                custodian_id: id,
                renews_at: RENEWAL
            })
        );
    }

    #[test]
    fn test_consume_never_granted() {
        let mut ledger = PauseCreditLedger::new(&WatchdogConfig::default());
        let id = CustodianId::new();
        assert_eq!(
            ledger.consume(id, 0),
            Err(PauseCreditError::NotGranted { custodian_id: id })
        );
    }

    #[test]
    fn test_renewal_measured_from_use_not_grant() {
        let mut ledger = PauseCreditLedger::new(&WatchdogConfig::default());
        let id = CustodianId::new();
        ledger.grant_initial_credit(id, 0).unwrap();
        // Used long after the grant
        ledger.consume(id, 200 * DAY).unwrap();
        assert!(!ledger.can_self_pause(&id, 200 * DAY + RENEWAL - 1));
        assert!(ledger.can_self_pause(&id, 200 * DAY + RENEWAL));
    }

    #[test]
    fn test_check_available_reports_renewal() {
        let (mut ledger, id) = ledger_with_credit();
        assert_eq!(ledger.check_available(&id, 0), Ok(()));
        ledger.consume(id, DAY).unwrap();
        assert_eq!(
            ledger.check_available(&id, 2 * DAY),
            Err(PauseCreditError::CreditUnavailable {
                custodian_id: id,
                renews_at: DAY + RENEWAL
            })
        );
    }

    #[test]
    fn test_renew_before_due_fails() {
        let (mut ledger, id) = ledger_with_credit();
        ledger.consume(id, 0).unwrap();
        assert!(matches!(
            ledger.renew(id, DAY),
            Err(PauseCreditError::CreditUnavailable { .. })
        ));
    }

    #[test]
    fn test_renew_when_due() {
        let (mut ledger, id) = ledger_with_credit();
        ledger.consume(id, 0).unwrap();
        let event = ledger.renew(id, RENEWAL).unwrap();
        assert!(matches!(event, Some(WatchdogEvent::PauseCreditRenewed(_))));
        assert!(ledger.credit(&id).unwrap().available);
    }

    #[test]
    fn test_renew_when_available_is_noop() {
        let (mut ledger, id) = ledger_with_credit();
        assert_eq!(ledger.renew(id, 0), Ok(None));
    }

    #[test]
    fn test_consume_applies_due_renewal() {
        let (mut ledger, id) = ledger_with_credit();
        ledger.consume(id, 0).unwrap();
        let events = ledger.consume(id, RENEWAL).unwrap();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], WatchdogEvent::PauseCreditRenewed(_)));
        assert!(matches!(events[1], WatchdogEvent::PauseCreditConsumed(_)));
    }

    #[test]
    fn test_consume_rejects_overflowing_renewal() {
        let config = WatchdogConfig {
            pause_credit_renewal_secs: i64::MAX,
            ..WatchdogConfig::default()
        };
        let mut ledger = PauseCreditLedger::new(&config);
        let id = CustodianId::new();
        ledger.grant_initial_credit(id, 0).unwrap();

        assert_eq!(
            ledger.consume(id, 1_700_000_000),
            Err(PauseCreditError::RenewalOverflow {
                custodian_id: id,
                now: 1_700_000_000
            })
        );
        // Nothing was spent
        assert!(ledger.can_self_pause(&id, 1_700_000_000));
        assert_eq!(ledger.credit(&id).unwrap().last_used_at, None);
    }

    #[test]
    fn test_renews_at_saturates() {
        let credit = PauseCredit {
            custodian_id: CustodianId::new(),
            available: false,
            granted_at: 0,
            last_used_at: Some(i64::MAX - 5),
        };
        assert_eq!(credit.renews_at(RENEWAL), Some(i64::MAX));
        assert!(!credit.is_available(RENEWAL, i64::MAX - 1));
    }
}
