//! Employee nodes.

use super::role::RoleId;
use uuid::Uuid;

/// Opaque handle to an employee node within an [`super::OrgGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EmployeeId(pub(crate) u32);

impl EmployeeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A person entity, free-standing with respect to the unit tree.
///
/// The key is globally unique and opaque: it is generated once (uuid v4)
/// and preserved verbatim across save/load, which is what lets the codecs
/// deduplicate an employee holding roles in several units. The role list is
/// the employee-side half of the bidirectional assignment relation; unit
/// membership is derived from it, never stored.
#[derive(Debug, Clone)]
pub struct EmployeeNode {
    pub(crate) key: String,
    pub(crate) name: String,
    pub(crate) roles: Vec<RoleId>,
}

impl EmployeeNode {
    /// Returns the globally unique key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the roles held by this employee, in assignment order.
    #[must_use]
    pub fn roles(&self) -> &[RoleId] {
        &self.roles
    }
}

/// Generates a fresh employee key.
#[must_use]
pub(crate) fn generate_key() -> String {
    Uuid::new_v4().to_string()
}
