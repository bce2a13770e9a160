//! Role Resolution
//!
//! Canonicalizes raw role strings coming out of session records and compares
//! them by level for "at least" checks.

use serde::{Deserialize, Serialize};

/// Integer rank used for hierarchical comparisons. Unrecognized roles rank 0.
pub type RoleLevel = u8;

/// Normalized role.
///
/// The four canonical roles form a total order
/// (`Superadmin ⊇ Admin ⊇ Creator ⊇ Viewer`). Anything else is carried as
/// `Unrecognized` so that it can still be displayed, but it never satisfies a
/// check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Role {
    Viewer,
    Creator,
    Admin,
    Superadmin,
    /// Lower-cased, trimmed value that matched no known role or alias
    Unrecognized(String),
}

impl Role {
    /// All canonical roles, lowest level first
    pub const CANONICAL: [Role; 4] = [Role::Viewer, Role::Creator, Role::Admin, Role::Superadmin];

    pub fn level(&self) -> RoleLevel {
        match self {
            Role::Viewer => 1,
            Role::Creator => 2,
            Role::Admin => 3,
            Role::Superadmin => 4,
            Role::Unrecognized(_) => 0,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Role::Viewer => "viewer",
            Role::Creator => "creator",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
            Role::Unrecognized(raw) => raw,
        }
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, Role::Unrecognized(_))
    }

    /// Whether this role meets `threshold`. An unrecognized threshold is met by nobody.
    pub fn satisfies(&self, threshold: &Role) -> bool {
        threshold.is_recognized() && self.is_recognized() && self.level() >= threshold.level()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(normalize_role(Some(s)))
    }
}

impl From<String> for Role {
    fn from(raw: String) -> Self {
        normalize_role(Some(&raw))
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.as_str().to_string()
    }
}

/// Canonicalize a raw role.
///
/// Missing or blank input becomes `Viewer`. Legacy aliases are translated.
/// Unknown values pass through (lower-cased and trimmed) as `Unrecognized`.
pub fn normalize_role(raw: Option<&str>) -> Role {
    let normalized = raw.map(|r| r.trim().to_lowercase()).unwrap_or_default();

    match normalized.as_str() {
        "" => Role::Viewer,
        "viewer" | "student" | "participant" | "user" => Role::Viewer,
        "creator" | "coach" => Role::Creator,
        "admin" => Role::Admin,
        "superadmin" | "super_admin" => Role::Superadmin,
        _ => Role::Unrecognized(normalized),
    }
}

/// Canonicalize a role named by a requirement.
///
/// Unlike a user's role, a blank requirement entry is malformed rather than
/// "viewer", so it becomes an `Unrecognized` role that nobody satisfies.
pub fn normalize_threshold(raw: &str) -> Role {
    if raw.trim().is_empty() {
        return Role::Unrecognized(String::new());
    }
    normalize_role(Some(raw))
}

/// Level of a raw role after normalization
pub fn role_level(raw: Option<&str>) -> RoleLevel {
    normalize_role(raw).level()
}

/// Hierarchical check with OR-of-thresholds semantics.
///
/// An empty `allowed_roles` list grants access. Otherwise the user needs a
/// level at least as high as any one listed role.
pub fn has_required_role<S: AsRef<str>>(raw_user_role: Option<&str>, allowed_roles: &[S]) -> bool {
    if allowed_roles.is_empty() {
        return true;
    }

    let user_role = normalize_role(raw_user_role);
    allowed_roles
        .iter()
        .map(|allowed| normalize_threshold(allowed.as_ref()))
        .any(|threshold| user_role.satisfies(&threshold))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alias_mapping() {
        assert_eq!(normalize_role(Some("COACH")), Role::Creator);
        assert_eq!(normalize_role(Some(" Student ")), Role::Viewer);
        assert_eq!(normalize_role(Some("participant")), Role::Viewer);
        assert_eq!(normalize_role(Some("User")), Role::Viewer);
        assert_eq!(normalize_role(Some("super_admin")), Role::Superadmin);
        assert_eq!(normalize_role(None), Role::Viewer);
        assert_eq!(normalize_role(Some("")), Role::Viewer);
        assert_eq!(normalize_role(Some("   ")), Role::Viewer);
        assert_eq!(normalize_role(Some("superadmin")), Role::Superadmin);
    }

    #[test]
    fn test_unrecognized_roles_pass_through() {
        let role = normalize_role(Some("  Moderator "));
        assert_eq!(role, Role::Unrecognized("moderator".to_string()));
        assert_eq!(role.as_str(), "moderator");
        assert_eq!(role.level(), 0);
    }

    #[test]
    fn test_normalization_is_idempotent() {
        let inputs = [
            None,
            Some(""),
            Some("COACH"),
            Some(" Student "),
            Some("admin"),
            Some("Super_Admin"),
            Some("  Moderator  "),
            Some("root"),
            Some("ÉDITEUR"),
        ];

        for input in inputs {
            let once = normalize_role(input);
            let twice = normalize_role(Some(once.as_str()));
            assert_eq!(once, twice, "not idempotent for {:?}", input);
        }
    }

    #[test]
    fn test_levels_are_totally_ordered() {
        let levels: Vec<RoleLevel> = Role::CANONICAL.iter().map(Role::level).collect();
        assert_eq!(levels, vec![1, 2, 3, 4]);
        assert_eq!(role_level(Some("coach")), 2);
        assert_eq!(role_level(Some("nobody")), 0);
    }

    #[test]
    fn test_hierarchical_threshold() {
        assert!(has_required_role(Some("admin"), &["creator"]));
        assert!(!has_required_role(Some("viewer"), &["admin"]));
        assert!(has_required_role(Some("anything"), &[] as &[&str]));
        assert!(has_required_role(Some("superadmin"), &["admin"]));
        assert!(has_required_role(Some("creator"), &["creator"]));
    }

    #[test]
    fn test_lowest_threshold_suffices() {
        assert!(has_required_role(Some("creator"), &["superadmin", "creator"]));
        assert!(!has_required_role(Some("viewer"), &["superadmin", "creator"]));
    }

    #[test]
    fn test_unrecognized_user_role_is_denied() {
        assert!(!has_required_role(Some("moderator"), &["viewer"]));
    }

    #[test]
    fn test_unrecognized_threshold_grants_nothing() {
        assert!(!has_required_role(Some("viewer"), &["bogus"]));
        assert!(!has_required_role(Some("superadmin"), &["bogus"]));
        assert!(has_required_role(Some("admin"), &["bogus", "creator"]));
    }

    #[test]
    fn test_blank_threshold_grants_nothing() {
        assert!(!has_required_role(Some("viewer"), &[""]));
        assert!(!has_required_role(Some("superadmin"), &["   "]));
        assert!(has_required_role(Some("creator"), &["", "creator"]));
        assert!(!normalize_threshold("\t").is_recognized());
        assert_eq!(normalize_threshold(" Coach "), Role::Creator);
    }

    #[test]
    fn test_missing_user_role_is_viewer() {
        assert!(has_required_role(None, &["viewer"]));
        assert!(!has_required_role(None, &["creator"]));
    }

    #[test]
    fn test_serde_normalizes() {
        let role: Role = serde_json::from_str("\"Coach\"").unwrap();
        assert_eq!(role, Role::Creator);
        assert_eq!(serde_json::to_string(&Role::Superadmin).unwrap(), "\"superadmin\"");
    }
}
