//! Rolegate Access - role resolution and view gating
//!
//! Two pieces, both pure and synchronous:
//!
//! - **Roles** (`roles`): canonicalizes raw role strings, legacy aliases
//!   included, and compares them by level
//! - **Gate** (`gate`): decides allow or redirect for a protected view from
//!   the current session user and the view's declared requirement
//!
//! Everything here fails closed: missing sessions, unknown roles and lists
//! made only of unknown roles deny access.

pub mod gate;
pub mod roles;

pub use gate::{AccessGate, AccessRequirement, DenyReason, GateDecision};
pub use roles::{
    has_required_role, normalize_role, normalize_threshold, role_level, Role, RoleLevel,
};
