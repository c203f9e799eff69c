//! Shared graph-reconstruction helpers for the flat codecs.
//!
//! The tabular and relational formats both store parent references by
//! external id and leave the root implicit, so they share the second-pass
//! linking and the root-inference policy here.

use super::LoadReport;
use crate::models::{OrgGraph, UnitId};
use std::collections::HashMap;
use std::fmt::Display;
use std::hash::Hash;

/// Names that suggest a unit is the organization's top level.
const ROOT_KEYWORDS: &[&str] = &["root", "board", "acme", "company", "corp", "azienda"];

/// Attaches units to their recorded parents.
///
/// `relations` holds `(child, parent)` external-id pairs. A pair whose
/// parent id resolves to no known unit is skipped and reported; the child
/// stays in the graph as a detached unit (and thus a root candidate).
pub(crate) fn link_parents<K>(
    graph: &mut OrgGraph,
    units: &HashMap<K, UnitId>,
    relations: &[(K, K)],
    report: &mut LoadReport,
) where
    K: Eq + Hash + Display,
{
    for (child_key, parent_key) in relations {
        match (units.get(child_key), units.get(parent_key)) {
            (Some(child), Some(parent)) => graph.attach(*parent, *child),
            (Some(_), None) => report.skip(format!(
                "unit '{child_key}' references unknown parent id '{parent_key}'"
            )),
            // A missing child means the unit row itself was dropped earlier.
            (None, _) => report.skip(format!(
                "parent relation references unknown unit id '{child_key}'"
            )),
        }
    }
}

/// Picks the root unit after linking.
///
/// Ordered policy, each step only reached when the previous is inconclusive:
/// 1. exactly one parentless unit — it is the root;
/// 2. among several candidates, the first whose name contains a
///    root-indicating keyword (case-insensitive);
/// 3. the candidate with the most descendants;
/// 4. the first candidate encountered;
/// 5. no parentless unit at all (cyclic or fully-linked data) — the first
///    unit in file order, with a warning.
///
/// Returns `None` only for a graph with no units.
pub(crate) fn infer_root(graph: &OrgGraph, report: &mut LoadReport) -> Option<UnitId> {
    let candidates: Vec<UnitId> = graph
        .units()
        .filter(|(_, node)| node.parent().is_none())
        .map(|(id, _)| id)
        .collect();

    match candidates.as_slice() {
        [] => {
            let first = graph.units().next().map(|(id, _)| id)?;
            report.warn(format!(
                "no parentless unit found; using '{}' as root",
                graph.unit(first).name()
            ));
            Some(first)
        },
        [only] => Some(*only),
        several => {
            report.warn(format!(
                "{} parentless units found; applying root inference",
                several.len()
            ));
            Some(disambiguate_root(graph, several))
        },
    }
}

fn disambiguate_root(graph: &OrgGraph, candidates: &[UnitId]) -> UnitId {
    if let Some(by_name) = candidates.iter().find(|id| {
        let name = graph.unit(**id).name().to_lowercase();
        ROOT_KEYWORDS.iter().any(|kw| name.contains(kw))
    }) {
        return *by_name;
    }

    // Most descendants wins; the first candidate breaks ties.
    let mut best = candidates[0];
    let mut best_count = graph.descendant_count(best);
    for id in &candidates[1..] {
        let count = graph.descendant_count(*id);
        if count > best_count {
            best = *id;
            best_count = count;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UnitKind;

    #[test]
    fn test_link_parents_reports_dangling() {
        let mut graph = OrgGraph::new();
        let a = graph.add_unit("A", "", UnitKind::Department);
        let b = graph.add_unit("B", "", UnitKind::Group);
        let mut units = HashMap::new();
        units.insert("a".to_string(), a);
        units.insert("b".to_string(), b);
        let relations = vec![
            ("b".to_string(), "a".to_string()),
            ("b".to_string(), "ghost".to_string()),
        ];
        let mut report = LoadReport::default();
        link_parents(&mut graph, &units, &relations, &mut report);
        assert_eq!(graph.unit(b).parent(), Some(a));
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].contains("ghost"));
    }

    #[test]
    fn test_single_parentless_unit_is_root() {
        let mut graph = OrgGraph::new();
        let a = graph.add_unit("Anything", "", UnitKind::Department);
        let b = graph.add_unit("Child", "", UnitKind::Group);
        graph.attach(a, b);
        let mut report = LoadReport::default();
        assert_eq!(infer_root(&graph, &mut report), Some(a));
        assert!(report.is_clean());
    }

    #[test]
    fn test_keyword_beats_size() {
        let mut graph = OrgGraph::new();
        // 'big' has a descendant, 'Acme Corp' has none but matches a keyword.
        let big = graph.add_unit("Engineering", "", UnitKind::Department);
        let child = graph.add_unit("Core", "", UnitKind::Group);
        graph.attach(big, child);
        let acme = graph.add_unit("Acme Corp", "", UnitKind::Department);
        let mut report = LoadReport::default();
        assert_eq!(infer_root(&graph, &mut report), Some(acme));
        let _ = big;
    }

    #[test]
    fn test_most_descendants_wins_without_keyword() {
        let mut graph = OrgGraph::new();
        let small = graph.add_unit("Alpha", "", UnitKind::Department);
        let big = graph.add_unit("Beta", "", UnitKind::Department);
        let c1 = graph.add_unit("Gamma", "", UnitKind::Group);
        let c2 = graph.add_unit("Delta", "", UnitKind::Group);
        graph.attach(big, c1);
        graph.attach(big, c2);
        let mut report = LoadReport::default();
        assert_eq!(infer_root(&graph, &mut report), Some(big));
        let _ = small;
    }

    #[test]
    fn test_zero_candidates_falls_back_to_first_unit() {
        let mut graph = OrgGraph::new();
        let a = graph.add_unit("One", "", UnitKind::Department);
        let b = graph.add_unit("Two", "", UnitKind::Department);
        // Cycle: both have parents.
        graph.attach(a, b);
        graph.attach(b, a);
        let mut report = LoadReport::default();
        assert_eq!(infer_root(&graph, &mut report), Some(a));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_empty_graph_has_no_root() {
        let graph = OrgGraph::new();
        let mut report = LoadReport::default();
        assert_eq!(infer_root(&graph, &mut report), None);
    }
}
