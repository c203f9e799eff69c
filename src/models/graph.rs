//! The arena-based organization graph.

use super::employee::{EmployeeId, EmployeeNode, generate_key};
use super::role::{RoleId, RoleNode};
use super::unit::{UnitId, UnitKind, UnitNode};

/// An in-memory organization graph.
///
/// Owns three arenas (units, roles, employees) addressed by copyable ids.
/// Units form a rooted tree through owning `children` lists plus non-owning
/// `parent` back-references; roles belong to exactly one unit; employees
/// hold roles across units. All adjacency is maintained here: codecs build
/// graphs exclusively through these mutators, which keep the employee↔role
/// relation bidirectional by construction.
///
/// The root is optional while a graph is being assembled (the tabular and
/// relational decoders create units before any parent links exist) and is
/// fixed by [`OrgGraph::set_root`] once reconstruction finishes.
#[derive(Debug, Clone, Default)]
pub struct OrgGraph {
    units: Vec<UnitNode>,
    roles: Vec<RoleNode>,
    employees: Vec<EmployeeNode>,
    root: Option<UnitId>,
}

impl OrgGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a graph with a root unit already in place.
    #[must_use]
    pub fn with_root(name: impl Into<String>, description: impl Into<String>, kind: UnitKind) -> Self {
        let mut graph = Self::new();
        let root = graph.add_unit(name, description, kind);
        graph.set_root(root);
        graph
    }

    /// Returns the root unit, if one has been designated.
    #[must_use]
    pub const fn root(&self) -> Option<UnitId> {
        self.root
    }

    /// Designates the root unit.
    pub fn set_root(&mut self, id: UnitId) {
        self.root = Some(id);
    }

    /// Adds a detached unit (no parent) and returns its id.
    pub fn add_unit(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        kind: UnitKind,
    ) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        self.units.push(UnitNode {
            name: name.into(),
            description: description.into(),
            kind,
            parent: None,
            children: Vec::new(),
            roles: Vec::new(),
        });
        id
    }

    /// Attaches `child` under `parent`, populating the back-reference.
    ///
    /// Idempotent for an already-attached pair; re-attaching under a new
    /// parent detaches from the old one first.
    pub fn attach(&mut self, parent: UnitId, child: UnitId) {
        if self.units[child.index()].parent == Some(parent) {
            return;
        }
        if let Some(old) = self.units[child.index()].parent {
            self.units[old.index()].children.retain(|c| *c != child);
        }
        self.units[parent.index()].children.push(child);
        self.units[child.index()].parent = Some(parent);
    }

    /// Adds a role to a unit and returns its id.
    pub fn add_role(
        &mut self,
        unit: UnitId,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> RoleId {
        let id = RoleId(self.roles.len() as u32);
        self.roles.push(RoleNode {
            name: name.into(),
            description: description.into(),
            unit,
            employees: Vec::new(),
        });
        self.units[unit.index()].roles.push(id);
        id
    }

    /// Adds an employee with an explicit key, deduplicating by key.
    ///
    /// If an employee with this key already exists, its id is returned
    /// unchanged (the stored display name wins over the incoming one).
    pub fn add_employee(&mut self, key: impl Into<String>, name: impl Into<String>) -> EmployeeId {
        let key = key.into();
        if let Some(existing) = self.employee_by_key(&key) {
            return existing;
        }
        let id = EmployeeId(self.employees.len() as u32);
        self.employees.push(EmployeeNode {
            key,
            name: name.into(),
            roles: Vec::new(),
        });
        id
    }

    /// Adds an employee with a freshly generated key.
    pub fn new_employee(&mut self, name: impl Into<String>) -> EmployeeId {
        let key = generate_key();
        self.add_employee(key, name)
    }

    /// Looks up an employee by key.
    #[must_use]
    pub fn employee_by_key(&self, key: &str) -> Option<EmployeeId> {
        self.employees
            .iter()
            .position(|e| e.key == key)
            .map(|i| EmployeeId(i as u32))
    }

    /// Assigns an employee to a role, linking both sides.
    ///
    /// Idempotent: assigning an already-held role is a no-op, so the same
    /// reference reached from multiple codepaths is stored once.
    pub fn assign(&mut self, employee: EmployeeId, role: RoleId) {
        if !self.roles[role.index()].employees.contains(&employee) {
            self.roles[role.index()].employees.push(employee);
        }
        if !self.employees[employee.index()].roles.contains(&role) {
            self.employees[employee.index()].roles.push(role);
        }
    }

    /// Removes an assignment, unlinking both sides.
    ///
    /// Returns true if the employee actually held the role. Because unit
    /// membership is derived from roles, dropping the last role an employee
    /// holds in a unit also drops that unit from
    /// [`OrgGraph::units_of_employee`].
    pub fn unassign(&mut self, employee: EmployeeId, role: RoleId) -> bool {
        let held = self.employees[employee.index()].roles.contains(&role);
        self.roles[role.index()].employees.retain(|e| *e != employee);
        self.employees[employee.index()].roles.retain(|r| *r != role);
        held
    }

    /// Returns a unit node.
    #[must_use]
    pub fn unit(&self, id: UnitId) -> &UnitNode {
        &self.units[id.index()]
    }

    /// Returns a role node.
    #[must_use]
    pub fn role(&self, id: RoleId) -> &RoleNode {
        &self.roles[id.index()]
    }

    /// Returns an employee node.
    #[must_use]
    pub fn employee(&self, id: EmployeeId) -> &EmployeeNode {
        &self.employees[id.index()]
    }

    /// Iterates over all units in creation order.
    pub fn units(&self) -> impl Iterator<Item = (UnitId, &UnitNode)> {
        self.units
            .iter()
            .enumerate()
            .map(|(i, node)| (UnitId(i as u32), node))
    }

    /// Iterates over all roles in creation order.
    pub fn roles(&self) -> impl Iterator<Item = (RoleId, &RoleNode)> {
        self.roles
            .iter()
            .enumerate()
            .map(|(i, node)| (RoleId(i as u32), node))
    }

    /// Iterates over all employees in creation order.
    pub fn employees(&self) -> impl Iterator<Item = (EmployeeId, &EmployeeNode)> {
        self.employees
            .iter()
            .enumerate()
            .map(|(i, node)| (EmployeeId(i as u32), node))
    }

    /// Number of units in the graph.
    #[must_use]
    pub const fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Number of roles in the graph.
    #[must_use]
    pub const fn role_count(&self) -> usize {
        self.roles.len()
    }

    /// Number of employees in the graph.
    #[must_use]
    pub const fn employee_count(&self) -> usize {
        self.employees.len()
    }

    /// Number of employee-role assignments in the graph.
    #[must_use]
    pub fn assignment_count(&self) -> usize {
        self.roles.iter().map(|r| r.employees.len()).sum()
    }

    /// Finds a role by name within a unit.
    #[must_use]
    pub fn find_role(&self, unit: UnitId, name: &str) -> Option<RoleId> {
        self.units[unit.index()]
            .roles
            .iter()
            .copied()
            .find(|id| self.roles[id.index()].name == name)
    }

    /// Units the employee participates in, derived from their roles.
    ///
    /// Ordered by first appearance; each unit listed once regardless of how
    /// many roles the employee holds there.
    #[must_use]
    pub fn units_of_employee(&self, id: EmployeeId) -> Vec<UnitId> {
        let mut units = Vec::new();
        for role in &self.employees[id.index()].roles {
            let unit = self.roles[role.index()].unit;
            if !units.contains(&unit) {
                units.push(unit);
            }
        }
        units
    }

    /// Preorder traversal of the subtree rooted at `from`.
    #[must_use]
    pub fn preorder(&self, from: UnitId) -> Vec<UnitId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Reverse so children pop in declaration order.
            for child in self.units[id.index()].children.iter().rev() {
                stack.push(*child);
            }
        }
        out
    }

    /// Number of descendants below a unit (the unit itself excluded).
    #[must_use]
    pub fn descendant_count(&self, id: UnitId) -> usize {
        self.preorder(id).len() - 1
    }

    /// The 0-based position of a unit among its siblings.
    ///
    /// Returns `None` for detached units.
    #[must_use]
    pub fn sibling_index(&self, id: UnitId) -> Option<usize> {
        let parent = self.units[id.index()].parent?;
        self.units[parent.index()]
            .children
            .iter()
            .position(|c| *c == id)
    }

    /// Unit names along the path from the tree top down to `id`, inclusive.
    #[must_use]
    pub fn path_names(&self, id: UnitId) -> Vec<&str> {
        let mut names = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            names.push(self.units[current.index()].name.as_str());
            cursor = self.units[current.index()].parent;
        }
        names.reverse();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> (OrgGraph, UnitId, UnitId, RoleId, EmployeeId) {
        let mut graph = OrgGraph::with_root("Acme", "Holding board", UnitKind::Board);
        let root = graph.root().unwrap();
        let eng = graph.add_unit("Engineering", "Builds things", UnitKind::Department);
        graph.attach(root, eng);
        let direttore = graph.add_role(eng, "Direttore", "Runs engineering");
        let alice = graph.add_employee("emp-alice", "Alice");
        graph.assign(alice, direttore);
        (graph, root, eng, direttore, alice)
    }

    #[test]
    fn test_attach_sets_both_sides() {
        let (graph, root, eng, _, _) = sample();
        assert_eq!(graph.unit(eng).parent(), Some(root));
        assert_eq!(graph.unit(root).children(), &[eng]);
    }

    #[test]
    fn test_reattach_moves_child() {
        let (mut graph, root, eng, _, _) = sample();
        let ops = graph.add_unit("Operations", "", UnitKind::Department);
        graph.attach(root, ops);
        graph.attach(ops, eng);
        assert_eq!(graph.unit(eng).parent(), Some(ops));
        assert_eq!(graph.unit(root).children(), &[ops]);
    }

    #[test]
    fn test_assign_is_bidirectional_and_idempotent() {
        let (mut graph, _, _, direttore, alice) = sample();
        graph.assign(alice, direttore);
        assert_eq!(graph.role(direttore).employees(), &[alice]);
        assert_eq!(graph.employee(alice).roles(), &[direttore]);
        assert_eq!(graph.assignment_count(), 1);
    }

    #[test]
    fn test_employee_dedup_by_key() {
        let (mut graph, _, eng, _, alice) = sample();
        let again = graph.add_employee("emp-alice", "Alice A.");
        assert_eq!(again, alice);
        assert_eq!(graph.employee_count(), 1);
        // Stored name wins.
        assert_eq!(graph.employee(alice).name(), "Alice");
        let _ = eng;
    }

    #[test]
    fn test_units_of_employee_is_derived() {
        let (mut graph, root, eng, direttore, alice) = sample();
        let core = graph.add_unit("Core", "", UnitKind::Group);
        graph.attach(eng, core);
        let membro = graph.add_role(core, "Membro", "");
        graph.assign(alice, membro);
        assert_eq!(graph.units_of_employee(alice), vec![eng, core]);

        // Dropping the last role in a unit drops the membership too.
        assert!(graph.unassign(alice, direttore));
        assert_eq!(graph.units_of_employee(alice), vec![core]);
        let _ = root;
    }

    #[test]
    fn test_preorder_and_descendants() {
        let (mut graph, root, eng, _, _) = sample();
        let core = graph.add_unit("Core", "", UnitKind::Group);
        graph.attach(eng, core);
        let ops = graph.add_unit("Operations", "", UnitKind::Department);
        graph.attach(root, ops);
        assert_eq!(graph.preorder(root), vec![root, eng, core, ops]);
        assert_eq!(graph.descendant_count(root), 3);
        assert_eq!(graph.descendant_count(core), 0);
        assert_eq!(graph.sibling_index(ops), Some(1));
        assert_eq!(graph.sibling_index(root), None);
        assert_eq!(graph.path_names(core), vec!["Acme", "Engineering", "Core"]);
    }
}
