//! Data models for orgchart.
//!
//! The organization graph is arena-based: [`OrgGraph`] owns every unit, role
//! and employee node, and hands out copyable ids instead of references.
//! Adjacency (children, roles per unit, employees per role, roles per
//! employee) is explicit and maintained by the graph's mutators, so the
//! employee↔role relation cannot go one-sided.

mod employee;
mod graph;
mod role;
mod unit;

pub use employee::{EmployeeId, EmployeeNode};
pub use graph::OrgGraph;
pub use role::{RoleId, RoleNode, RoleType};
pub use unit::{UnitId, UnitKind, UnitNode};
