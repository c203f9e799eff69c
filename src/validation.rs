//! Post-load structural validation.
//!
//! Every codec hands its reconstructed graph through [`validate`] before the
//! caller sees it. The checks mirror the authoring-time business rules, but
//! are applied defensively: a file may have been edited by hand, produced by
//! an older version, or corrupted.

use crate::models::{OrgGraph, RoleType, UnitId, UnitKind};
use crate::{Error, Result};
use std::collections::HashSet;

/// Outcome of validating a reconstructed graph.
#[derive(Debug, Clone, Default)]
pub struct ValidationOutcome {
    /// Hard violations; any entry makes the graph unacceptable.
    pub violations: Vec<String>,
    /// Soft issues; the graph is kept, the issues are logged.
    pub warnings: Vec<String>,
}

impl ValidationOutcome {
    /// Returns true if no hard violation was found.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        self.violations.is_empty()
    }

    /// Converts the outcome into a `Result`, keeping the warnings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structure`] naming the first violation (and the
    /// count of any further ones).
    pub fn into_result(self) -> Result<Vec<String>> {
        match self.violations.first() {
            None => Ok(self.warnings),
            Some(first) => {
                let rest = self.violations.len() - 1;
                if rest == 0 {
                    Err(Error::Structure(first.clone()))
                } else {
                    Err(Error::Structure(format!("{first} (and {rest} more)")))
                }
            },
        }
    }
}

/// Checks hierarchy, uniqueness and role-compatibility invariants top-down.
///
/// Hard violations:
/// - sibling units sharing a name
/// - a `Group` with child units
/// - a `Board` anywhere but the tree root
/// - a catalog role attached to an incompatible unit kind
///
/// Soft warnings:
/// - a role name outside the catalog (kept as-is)
/// - any catalog role attached directly to a root `Board`, even one bound
///   to another kind — legacy files predate the board-role catalog and are
///   tolerated on load
/// - duplicate role names within one unit
pub fn validate(graph: &OrgGraph) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();

    let Some(root) = graph.root() else {
        outcome
            .violations
            .push("graph has no root unit".to_string());
        return outcome;
    };

    for unit_id in graph.preorder(root) {
        check_unit(graph, unit_id, root, &mut outcome);
    }

    for warning in &outcome.warnings {
        tracing::warn!(%warning, "structural warning");
    }

    outcome
}

fn check_unit(graph: &OrgGraph, id: UnitId, root: UnitId, outcome: &mut ValidationOutcome) {
    let unit = graph.unit(id);

    if unit.kind() == UnitKind::Board && id != root {
        outcome.violations.push(format!(
            "board '{}' appears below the tree root",
            unit.name()
        ));
    }

    if unit.kind() == UnitKind::Group && !unit.children().is_empty() {
        outcome.violations.push(format!(
            "group '{}' has {} child unit(s); groups must be leaves",
            unit.name(),
            unit.children().len()
        ));
    }

    let mut child_names = HashSet::new();
    for child in unit.children() {
        let name = graph.unit(*child).name();
        if !child_names.insert(name) {
            outcome.violations.push(format!(
                "unit '{}' has two children named '{name}'",
                unit.name()
            ));
        }
    }

    let mut role_names = HashSet::new();
    for role_id in unit.roles() {
        let role = graph.role(*role_id);
        if !role_names.insert(role.name()) {
            outcome.warnings.push(format!(
                "unit '{}' lists role '{}' more than once",
                unit.name(),
                role.name()
            ));
        }
        check_role_compatibility(unit.name(), unit.kind(), id == root, role.name(), outcome);
    }
}

fn check_role_compatibility(
    unit_name: &str,
    kind: UnitKind,
    is_root: bool,
    role_name: &str,
    outcome: &mut ValidationOutcome,
) {
    match RoleType::find(role_name) {
        None => {
            outcome.warnings.push(format!(
                "role '{role_name}' in unit '{unit_name}' is not in the catalog"
            ));
        },
        Some(role_type) if role_type.valid_for(kind) => {},
        Some(role_type) if is_root && kind == UnitKind::Board => {
            // Legacy tolerance: files written before the board catalog
            // existed attach department roles straight to the root board.
            outcome.warnings.push(format!(
                "role '{}' on root board '{unit_name}' is bound to {} units",
                role_type.as_str(),
                describe_kinds(role_type)
            ));
        },
        Some(role_type) => {
            outcome.violations.push(format!(
                "role '{}' cannot be attached to {} '{unit_name}' (valid for {})",
                role_type.as_str(),
                kind.as_str().to_lowercase(),
                describe_kinds(role_type)
            ));
        },
    }
}

fn describe_kinds(role_type: RoleType) -> String {
    role_type
        .valid_kinds()
        .iter()
        .map(|k| k.as_str().to_lowercase())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_sample() -> OrgGraph {
        let mut graph = OrgGraph::with_root("Acme", "", UnitKind::Board);
        let root = graph.root().unwrap();
        graph.add_role(root, "Presidente", "");
        let eng = graph.add_unit("Engineering", "", UnitKind::Department);
        graph.attach(root, eng);
        let direttore = graph.add_role(eng, "Direttore", "");
        let core = graph.add_unit("Core", "", UnitKind::Group);
        graph.attach(eng, core);
        let membro = graph.add_role(core, "Membro", "");
        let alice = graph.add_employee("emp-a", "Alice");
        let bob = graph.add_employee("emp-b", "Bob");
        graph.assign(alice, direttore);
        graph.assign(bob, membro);
        graph
    }

    #[test]
    fn test_valid_graph_passes() {
        let outcome = validate(&valid_sample());
        assert!(outcome.is_acceptable());
        assert!(outcome.warnings.is_empty());
    }

    #[test]
    fn test_group_with_children_is_violation() {
        let mut graph = valid_sample();
        let core = graph
            .units()
            .find(|(_, u)| u.name() == "Core")
            .map(|(id, _)| id)
            .unwrap();
        let nested = graph.add_unit("Nested", "", UnitKind::Group);
        graph.attach(core, nested);
        let outcome = validate(&graph);
        assert!(!outcome.is_acceptable());
        assert!(outcome.violations[0].contains("Core"));
    }

    #[test]
    fn test_non_root_board_is_violation() {
        let mut graph = valid_sample();
        let root = graph.root().unwrap();
        let shadow = graph.add_unit("Shadow Board", "", UnitKind::Board);
        graph.attach(root, shadow);
        let outcome = validate(&graph);
        assert!(!outcome.is_acceptable());
        assert!(outcome.violations[0].contains("Shadow Board"));
    }

    #[test]
    fn test_duplicate_sibling_names_is_violation() {
        let mut graph = valid_sample();
        let root = graph.root().unwrap();
        let dup = graph.add_unit("Engineering", "", UnitKind::Department);
        graph.attach(root, dup);
        let outcome = validate(&graph);
        assert!(!outcome.is_acceptable());
        assert!(outcome.violations[0].contains("Engineering"));
    }

    #[test]
    fn test_unknown_role_name_is_warning_only() {
        let mut graph = valid_sample();
        let eng = graph
            .units()
            .find(|(_, u)| u.name() == "Engineering")
            .map(|(id, _)| id)
            .unwrap();
        graph.add_role(eng, "Janitor", "");
        let outcome = validate(&graph);
        assert!(outcome.is_acceptable());
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].contains("Janitor"));
    }

    #[test]
    fn test_incompatible_role_is_violation() {
        let mut graph = valid_sample();
        let core = graph
            .units()
            .find(|(_, u)| u.name() == "Core")
            .map(|(id, _)| id)
            .unwrap();
        // Direttore is a department role; on a group it is a hard failure.
        graph.add_role(core, "Direttore", "");
        let outcome = validate(&graph);
        assert!(!outcome.is_acceptable());
        assert!(outcome.violations[0].contains("Direttore"));
    }

    #[test]
    fn test_misbound_role_on_root_board_is_relaxed() {
        let mut graph = valid_sample();
        let root = graph.root().unwrap();
        graph.add_role(root, "Direttore", "");
        let outcome = validate(&graph);
        assert!(outcome.is_acceptable());
        assert!(outcome.warnings.iter().any(|w| w.contains("Direttore")));
    }

    #[test]
    fn test_into_result_reports_first_violation() {
        let mut graph = valid_sample();
        let core = graph
            .units()
            .find(|(_, u)| u.name() == "Core")
            .map(|(id, _)| id)
            .unwrap();
        let nested = graph.add_unit("Nested", "", UnitKind::Group);
        graph.attach(core, nested);
        let err = validate(&graph).into_result().unwrap_err();
        assert!(err.to_string().contains("Core"));
    }
}
