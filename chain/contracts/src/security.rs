//! Role-based access control
//!
//! Maps caller identities to the roles that let them claim a caller class
//! or feed data into the watchdog. A caller may hold several roles.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Roles a caller identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Registers custodians, grants roles, grants initial pause credits
    Admin,
    /// Full authority over any table edge, backlog clearance, hard-pause lift
    Arbiter,
    /// Submits reserve observations
    Attester,
    /// May force a degraded consensus below threshold
    ConsensusAuthority,
    /// Settlement subsystem reporting defaults
    SettlementReporter,
    /// Issuance subsystem recording mints and burns
    Minter,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Admin => "ADMIN",
            Role::Arbiter => "ARBITER",
            Role::Attester => "ATTESTER",
            Role::ConsensusAuthority => "CONSENSUS_AUTHORITY",
            Role::SettlementReporter => "SETTLEMENT_REPORTER",
            Role::Minter => "MINTER",
        };
        f.write_str(s)
    }
}

/// Caller identity to role-set map.
///
/// The primary admin cannot lose `Admin` through `revoke_role`; it can only
/// hand it over with `transfer_admin`.
#[derive(Debug, Clone)]
pub struct AccessControl {
    roles: HashMap<String, HashSet<Role>>,
    admin: String,
}

impl AccessControl {
    pub fn new(admin: impl Into<String>) -> Self {
        let admin = admin.into();
        let roles = HashMap::from([(admin.clone(), HashSet::from([Role::Admin]))]);
        Self { roles, admin }
    }

    pub fn has_role(&self, caller: &str, role: Role) -> bool {
        self.roles
            .get(caller)
            .map_or(false, |held| held.contains(&role))
    }

    pub fn is_admin(&self, caller: &str) -> bool {
        self.has_role(caller, Role::Admin)
    }

    /// Returns `false` when `admin_caller` is not an admin.
    pub fn grant_role(&mut self, admin_caller: &str, target: impl Into<String>, role: Role) -> bool {
        if !self.is_admin(admin_caller) {
            return false;
        }
        self.roles.entry(target.into()).or_default().insert(role);
        true
    }

    /// Remove one role from a caller. Only admin can revoke.
    pub fn revoke_role(&mut self, admin_caller: &str, target: &str, role: Role) -> bool {
        if !self.is_admin(admin_caller) {
            return false;
        }
        // Cannot strip the primary admin of Admin
        if target == self.admin && role == Role::Admin {
            return false;
        }
        if let Some(held) = self.roles.get_mut(target) {
            held.remove(&role);
            if held.is_empty() {
                self.roles.remove(target);
            }
        }
        true
    }

    /// Hand the primary admin seat to another identity.
    pub fn transfer_admin(&mut self, current_admin: &str, new_admin: impl Into<String>) -> bool {
        if current_admin != self.admin || !self.is_admin(current_admin) {
            return false;
        }
        let successor = new_admin.into();
        if let Some(held) = self.roles.get_mut(current_admin) {
            held.remove(&Role::Admin);
            if held.is_empty() {
                self.roles.remove(current_admin);
            }
        }
        self.roles
            .entry(successor.clone())
            .or_default()
            .insert(Role::Admin);
        self.admin = successor;
        true
    }

    pub fn admin(&self) -> &str {
        &self.admin
    }

    /// Number of callers currently holding a role.
    pub fn count_with_role(&self, role: Role) -> usize {
        self.roles.values().filter(|held| held.contains(&role)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_admin_holds_admin_only() {
        let access = AccessControl::new("governance");
        assert!(access.is_admin("governance"));
        assert!(!access.has_role("governance", Role::Arbiter));
        assert!(!access.is_admin("watcher"));
    }

    #[test]
    fn test_grant_attester() {
        let mut access = AccessControl::new("governance");
        assert!(access.grant_role("governance", "auditor-1", Role::Attester));
        assert!(access.has_role("auditor-1", Role::Attester));
        assert!(!access.has_role("auditor-1", Role::ConsensusAuthority));
    }

    #[test]
    fn test_caller_can_hold_several_roles() {
        let mut access = AccessControl::new("governance");
        access.grant_role("governance", "settlement", Role::SettlementReporter);
        access.grant_role("governance", "settlement", Role::Minter);
        assert!(access.has_role("settlement", Role::SettlementReporter));
        assert!(access.has_role("settlement", Role::Minter));
    }

    #[test]
    fn test_only_admin_grants() {
        let mut access = AccessControl::new("governance");
        access.grant_role("governance", "arbiter", Role::Arbiter);
        // Arbiter authority does not extend to role management
        assert!(!access.grant_role("arbiter", "auditor-1", Role::Attester));
        assert!(!access.has_role("auditor-1", Role::Attester));
    }

    #[test]
    fn test_revoke_keeps_other_roles() {
        let mut access = AccessControl::new("governance");
        access.grant_role("governance", "settlement", Role::SettlementReporter);
        access.grant_role("governance", "settlement", Role::Minter);
        assert!(access.revoke_role("governance", "settlement", Role::Minter));
        assert!(!access.has_role("settlement", Role::Minter));
        assert!(access.has_role("settlement", Role::SettlementReporter));
    }

    #[test]
    fn test_primary_admin_not_revocable() {
        let mut access = AccessControl::new("governance");
        assert!(!access.revoke_role("governance", "governance", Role::Admin));
        assert!(access.is_admin("governance"));
    }

    #[test]
    fn test_admin_handover() {
        let mut access = AccessControl::new("governance");
        access.grant_role("governance", "governance", Role::Arbiter);
        assert!(access.transfer_admin("governance", "council"));
        assert_eq!(access.admin(), "council");
        assert!(!access.is_admin("governance"));
        // Non-admin roles survive the handover
        assert!(access.has_role("governance", Role::Arbiter));
    }

    #[test]
    fn test_count_attesters() {
        let mut access = AccessControl::new("governance");
        for attester in ["a1", "a2", "a3"] {
            access.grant_role("governance", attester, Role::Attester);
        }
        assert_eq!(access.count_with_role(Role::Attester), 3);
        access.revoke_role("governance", "a2", Role::Attester);
        assert_eq!(access.count_with_role(Role::Attester), 2);
    }
}
