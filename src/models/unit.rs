//! Unit kinds and unit nodes.

use super::role::RoleId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The kind of an organizational unit.
///
/// Immutable after creation: codecs pick the kind when a node is
/// instantiated and the graph offers no way to change it afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UnitKind {
    /// Governing body; only valid at the tree root.
    Board,
    /// Mid-level unit; may contain departments and groups.
    #[default]
    Department,
    /// Leaf unit; never has children.
    Group,
}

impl UnitKind {
    /// Returns all unit kinds.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::Board, Self::Department, Self::Group]
    }

    /// Returns the kind as a string slice.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Board => "Board",
            Self::Department => "Department",
            Self::Group => "Group",
        }
    }

    /// Parses a kind from a string (case-insensitive).
    ///
    /// Returns `None` for unrecognized values; codecs decide the fallback.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "board" => Some(Self::Board),
            "department" => Some(Self::Department),
            "group" => Some(Self::Group),
            _ => None,
        }
    }

    /// Best-effort recognition for values that do not parse exactly.
    ///
    /// Legacy files may carry kinds like `DEPARTMENT`, `Unit` or free-form
    /// labels; this falls back to substring matching and finally to
    /// `Department`, the kind older exporters wrote for anything unnamed.
    #[must_use]
    pub fn sniff(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            let lower = s.to_lowercase();
            if lower.contains("group") {
                Self::Group
            } else if lower.contains("board") {
                Self::Board
            } else {
                Self::Department
            }
        })
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Opaque handle to a unit node within an [`super::OrgGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UnitId(pub(crate) u32);

impl UnitId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// A node in the organizational tree.
///
/// The parent link is a non-owning back-reference: the parent's `children`
/// list is the owning side, and `parent` is populated only on attachment.
#[derive(Debug, Clone)]
pub struct UnitNode {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) kind: UnitKind,
    pub(crate) parent: Option<UnitId>,
    pub(crate) children: Vec<UnitId>,
    pub(crate) roles: Vec<RoleId>,
}

impl UnitNode {
    /// Returns the unit's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the unit's description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Returns the unit's kind.
    #[must_use]
    pub const fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Returns the parent unit, if attached.
    #[must_use]
    pub const fn parent(&self) -> Option<UnitId> {
        self.parent
    }

    /// Returns the ordered child units.
    #[must_use]
    pub fn children(&self) -> &[UnitId] {
        &self.children
    }

    /// Returns the ordered roles owned by this unit.
    #[must_use]
    pub fn roles(&self) -> &[RoleId] {
        &self.roles
    }
}
