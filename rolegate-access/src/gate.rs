//! Access Gate
//!
//! Consulted before a protected view renders. Always produces a definite
//! decision: denial is an ordinary outcome, not an error.

use crate::roles::{has_required_role, normalize_role, normalize_threshold, Role};
use rolegate_core::{GateConfig, SessionUser};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// What a view declares it needs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRequirement {
    /// Single hierarchical threshold
    pub role: Option<String>,
    /// Hierarchical thresholds; meeting any one of them is enough
    pub roles: Vec<String>,
    /// Strict allow-list; the user's canonical role must be listed
    pub exact_roles: Vec<String>,
}

impl AccessRequirement {
    /// A requirement satisfied by any signed-in session
    pub fn authenticated() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_exact_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exact_roles.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Whether any role constraint is present beyond "signed in"
    pub fn is_role_restricted(&self) -> bool {
        self.role.is_some() || !self.roles.is_empty() || !self.exact_roles.is_empty()
    }
}

/// Why a navigation was denied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenyReason {
    /// No session, or a user record without a token
    Unauthenticated,
    /// The canonical role is not in the exact allow-list
    NotInAllowList { role: Role },
    /// The role's level is below every threshold
    InsufficientRole { role: Role },
}

impl std::fmt::Display for DenyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DenyReason::Unauthenticated => write!(f, "not signed in"),
            DenyReason::NotInAllowList { role } => {
                write!(f, "role '{}' is not in the allow-list", role)
            }
            DenyReason::InsufficientRole { role } => {
                write!(f, "role '{}' is below the required level", role)
            }
        }
    }
}

/// Result of a gate check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    /// Render the protected view
    Allow,
    /// Send the user to the unauthenticated entry point
    Redirect { to: String, reason: DenyReason },
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }

    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GateDecision::Allow => None,
            GateDecision::Redirect { to, .. } => Some(to),
        }
    }
}

/// Role gate for protected views
#[derive(Debug, Clone)]
pub struct AccessGate {
    login_path: String,
}

impl Default for AccessGate {
    fn default() -> Self {
        Self::new(GateConfig::default().login_path)
    }
}

impl AccessGate {
    pub fn new(login_path: impl Into<String>) -> Self {
        Self {
            login_path: login_path.into(),
        }
    }

    pub fn from_config(config: &GateConfig) -> Self {
        Self::new(config.login_path.clone())
    }

    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Decide for a session read from storage.
    ///
    /// A user record without a token is an orphan and counts as signed out.
    pub fn check_session(
        &self,
        user: Option<&SessionUser>,
        has_token: bool,
        requirement: &AccessRequirement,
    ) -> GateDecision {
        if !has_token {
            if user.is_some() {
                debug!("Orphaned user record without token, treating as signed out");
            }
            return self.deny(DenyReason::Unauthenticated);
        }
        self.check(user, requirement)
    }

    /// Decide whether `user` may view a screen declaring `requirement`.
    ///
    /// Every supplied constraint must pass.
    pub fn check(
        &self,
        user: Option<&SessionUser>,
        requirement: &AccessRequirement,
    ) -> GateDecision {
        let Some(user) = user else {
            return self.deny(DenyReason::Unauthenticated);
        };

        let raw_role = user.role.as_deref();
        let role = normalize_role(raw_role);

        if !requirement.exact_roles.is_empty() {
            let listed = role.is_recognized()
                && requirement
                    .exact_roles
                    .iter()
                    .map(|allowed| normalize_threshold(allowed))
                    .any(|allowed| allowed == role);

            if !listed {
                debug!(
                    user_id = %user.id,
                    role = %role,
                    allowed = ?requirement.exact_roles,
                    "Exact role check failed"
                );
                return self.deny(DenyReason::NotInAllowList { role });
            }
        }

        if !has_required_role(raw_role, &requirement.roles) {
            debug!(
                user_id = %user.id,
                role = %role,
                required = ?requirement.roles,
                "Hierarchical role check failed"
            );
            return self.deny(DenyReason::InsufficientRole { role });
        }

        if let Some(required) = &requirement.role {
            if !has_required_role(raw_role, std::slice::from_ref(required)) {
                debug!(
                    user_id = %user.id,
                    role = %role,
                    required = %required,
                    "Required role check failed"
                );
                return self.deny(DenyReason::InsufficientRole { role });
            }
        }

        GateDecision::Allow
    }

    fn deny(&self, reason: DenyReason) -> GateDecision {
        GateDecision::Redirect {
            to: self.login_path.clone(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Option<&str>) -> SessionUser {
        SessionUser::new("u-1", role)
    }

    #[test]
    fn test_no_session_redirects_to_login() {
        let gate = AccessGate::default();
        let decision = gate.check(None, &AccessRequirement::default().with_role("admin"));

        assert_eq!(
            decision,
            GateDecision::Redirect {
                to: "/login".to_string(),
                reason: DenyReason::Unauthenticated,
            }
        );
    }

    #[test]
    fn test_session_alone_is_enough_without_roles() {
        let gate = AccessGate::default();
        let requirement = AccessRequirement::authenticated();
        assert!(!requirement.is_role_restricted());
        assert!(requirement.clone().with_role("viewer").is_role_restricted());

        let decision = gate.check(Some(&user(None)), &requirement);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_hierarchical_list_allows_matching_role() {
        let gate = AccessGate::default();
        let requirement =
            AccessRequirement::default().with_roles(["creator", "admin", "superadmin"]);
        assert!(gate.check(Some(&user(Some("creator"))), &requirement).is_allowed());
    }

    #[test]
    fn test_exact_list_is_not_satisfied_by_level() {
        let gate = AccessGate::default();
        let requirement = AccessRequirement::default().with_exact_roles(["superadmin"]);
        let decision = gate.check(Some(&user(Some("admin"))), &requirement);

        assert_eq!(decision.redirect_target(), Some("/login"));

        let requirement = AccessRequirement::default().with_exact_roles(["admin"]);
        let decision = gate.check(Some(&user(Some("superadmin"))), &requirement);
        assert_eq!(
            decision,
            GateDecision::Redirect {
                to: "/login".to_string(),
                reason: DenyReason::NotInAllowList {
                    role: Role::Superadmin
                },
            }
        );
    }

    #[test]
    fn test_legacy_alias_resolves_before_check() {
        let gate = AccessGate::default();
        let requirement = AccessRequirement::default().with_roles(["creator"]);
        assert!(gate.check(Some(&user(Some("coach"))), &requirement).is_allowed());

        let requirement = AccessRequirement::default().with_exact_roles(["Coach"]);
        assert!(gate.check(Some(&user(Some("creator"))), &requirement).is_allowed());
    }

    #[test]
    fn test_both_lists_must_pass() {
        let gate = AccessGate::default();
        let requirement = AccessRequirement::default()
            .with_roles(["creator"])
            .with_exact_roles(["viewer", "admin"]);

        assert!(gate.check(Some(&user(Some("admin"))), &requirement).is_allowed());
        // In the allow-list but below the threshold
        assert!(!gate.check(Some(&user(Some("viewer"))), &requirement).is_allowed());
        // Above the threshold but not in the allow-list
        assert!(!gate.check(Some(&user(Some("creator"))), &requirement).is_allowed());
    }

    #[test]
    fn test_single_role_and_list_both_apply() {
        let gate = AccessGate::default();
        let requirement = AccessRequirement::default()
            .with_role("admin")
            .with_roles(["creator"]);

        assert!(!gate.check(Some(&user(Some("creator"))), &requirement).is_allowed());
        assert!(gate.check(Some(&user(Some("admin"))), &requirement).is_allowed());
    }

    #[test]
    fn test_blank_requirement_entries_deny() {
        let gate = AccessGate::default();
        let viewer = user(Some("viewer"));

        let requirement = AccessRequirement::default().with_roles([""]);
        assert!(!gate.check(Some(&viewer), &requirement).is_allowed());

        let requirement = AccessRequirement::default().with_exact_roles(["  "]);
        assert_eq!(
            gate.check(Some(&viewer), &requirement),
            GateDecision::Redirect {
                to: "/login".to_string(),
                reason: DenyReason::NotInAllowList { role: Role::Viewer },
            }
        );

        let requirement = AccessRequirement::default().with_role("");
        assert!(!gate.check(Some(&user(Some("superadmin"))), &requirement).is_allowed());
    }

    #[test]
    fn test_unrecognized_roles_fail_closed() {
        let gate = AccessGate::default();

        let requirement = AccessRequirement::default().with_exact_roles(["moderator"]);
        assert!(!gate.check(Some(&user(Some("moderator"))), &requirement).is_allowed());

        let requirement = AccessRequirement::default().with_roles(["moderator"]);
        assert!(!gate.check(Some(&user(Some("superadmin"))), &requirement).is_allowed());

        let requirement = AccessRequirement::default().with_role("viewer");
        assert!(!gate.check(Some(&user(Some("moderator"))), &requirement).is_allowed());
    }

    #[test]
    fn test_orphaned_user_is_signed_out() {
        let gate = AccessGate::new("/signin");
        let decision = gate.check_session(
            Some(&user(Some("admin"))),
            false,
            &AccessRequirement::authenticated(),
        );

        assert_eq!(
            decision,
            GateDecision::Redirect {
                to: "/signin".to_string(),
                reason: DenyReason::Unauthenticated,
            }
        );
    }

    #[test]
    fn test_decision_serializes_with_tag() {
        let decision = GateDecision::Redirect {
            to: "/login".to_string(),
            reason: DenyReason::InsufficientRole { role: Role::Viewer },
        };
        let json = serde_json::to_value(&decision).unwrap();
        assert_eq!(json["decision"], "redirect");
        assert_eq!(json["to"], "/login");
        assert_eq!(json["reason"]["insufficient_role"]["role"], "viewer");
    }
}
