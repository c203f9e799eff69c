//! Relational codec: SQLite-backed storage.
//!
//! Four tables mirror the external record forms:
//!
//! ```sql
//! units(id, name, description, kind, parent_id NULLABLE)
//! roles(id, name, description, unit_id)
//! employees(id, name)
//! employee_roles(employee_id, role_id)   -- pure join table
//! ```
//!
//! Saving upserts every entity keyed by the Identity Model's numeric ids,
//! parents before children, inside one transaction; a failed save rolls
//! back and leaves the database untouched. Loading verifies the file is a
//! real SQLite database with the expected tables before touching it, and
//! falls back to a minimal default structure (with the reason logged)
//! instead of failing outright when it is not.

use super::reconstruct::{infer_root, link_parents};
use super::{LoadReport, LoadedGraph, StorageCodec, StorageFormat};
use crate::identity::{role_numeric_id, unit_numeric_id};
use crate::models::{EmployeeId, OrgGraph, RoleId, UnitId, UnitKind};
use crate::{Error, Result};
use rusqlite::{Connection, params};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// First 16 bytes of every SQLite database file.
const SQLITE_MAGIC: &[u8; 16] = b"SQLite format 3\0";

/// A real database is never smaller than one page header.
const MIN_DB_LEN: u64 = 100;

const EXPECTED_TABLES: [&str; 4] = ["units", "roles", "employees", "employee_roles"];

const CREATE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS units (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    kind TEXT NOT NULL,
    parent_id INTEGER,
    FOREIGN KEY (parent_id) REFERENCES units(id)
);
CREATE TABLE IF NOT EXISTS roles (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    description TEXT,
    unit_id INTEGER NOT NULL,
    FOREIGN KEY (unit_id) REFERENCES units(id)
);
CREATE TABLE IF NOT EXISTS employees (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS employee_roles (
    employee_id TEXT NOT NULL,
    role_id INTEGER NOT NULL,
    PRIMARY KEY (employee_id, role_id),
    FOREIGN KEY (employee_id) REFERENCES employees(id),
    FOREIGN KEY (role_id) REFERENCES roles(id)
);
";

/// Codec for the relational format.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelationalCodec;

impl RelationalCodec {
    /// Creates a new relational codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StorageCodec for RelationalCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Relational
    }

    #[instrument(skip(self, graph), fields(codec = "relational"))]
    fn save(&self, graph: &OrgGraph, destination: &Path) -> Result<()> {
        let root = graph
            .root()
            .ok_or_else(|| Error::Structure("cannot save a graph with no root unit".to_string()))?;

        let mut conn =
            Connection::open(destination).map_err(|e| Error::io("open_database", e))?;
        configure_connection(&conn)?;
        conn.execute_batch(CREATE_TABLES)
            .map_err(|e| Error::io("create_tables", e))?;

        let order = graph.preorder(root);
        let counts = write_all(&mut conn, graph, &order)?;
        verify_row_counts(&conn, &counts);
        run_integrity_check(&conn)?;
        debug!(
            units = counts.units,
            roles = counts.roles,
            employees = counts.employees,
            assignments = counts.assignments,
            "database saved"
        );
        Ok(())
    }

    #[instrument(skip(self), fields(codec = "relational"))]
    fn load(&self, source: &Path) -> Result<LoadedGraph> {
        let mut report = LoadReport::default();

        if let Err(reason) = verify_database_file(source) {
            return Ok(fallback_structure(&reason, report));
        }

        let conn = match Connection::open(source) {
            Ok(conn) => conn,
            Err(e) => return Ok(fallback_structure(&format!("cannot open database: {e}"), report)),
        };
        let _ = conn.pragma_update(None, "foreign_keys", "ON");

        match tables_present(&conn) {
            Ok(true) => {},
            Ok(false) => {
                return Ok(fallback_structure(
                    "expected tables (units, roles, employees, employee_roles) are missing",
                    report,
                ));
            },
            Err(e) => return Ok(fallback_structure(&format!("cannot inspect schema: {e}"), report)),
        }

        let mut graph = OrgGraph::new();
        let (units, parent_relations) = load_units(&conn, &mut graph)?;
        link_parents(&mut graph, &units, &parent_relations, &mut report);
        let roles = load_roles(&conn, &mut graph, &units, &mut report)?;
        let employees = load_employees(&conn, &mut graph)?;
        load_assignments(&conn, &mut graph, &roles, &employees, &mut report)?;

        if graph.unit_count() == 0 {
            return Ok(fallback_structure("database contains no units", report));
        }

        if let Some(root) = infer_root(&graph, &mut report) {
            graph.set_root(root);
        }
        debug!(
            units = graph.unit_count(),
            roles = graph.role_count(),
            employees = graph.employee_count(),
            "database loaded"
        );
        Ok(LoadedGraph { graph, report })
    }
}

/// WAL journaling and a busy timeout keep the single-writer discipline
/// graceful; foreign keys are enforced where the engine supports it.
fn configure_connection(conn: &Connection) -> Result<()> {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");
    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::io("enable_foreign_keys", e))
}

// ---------------------------------------------------------------------------
// Saving
// ---------------------------------------------------------------------------

struct RowCounts {
    units: usize,
    roles: usize,
    employees: usize,
    assignments: usize,
}

/// Writes the full graph in one transaction: replace-style upserts keyed by
/// the synthesized ids, parents before children via the preorder walk. The
/// tables are cleared first so rows from a previously saved graph cannot
/// survive; a failure before commit rolls everything back.
fn write_all(conn: &mut Connection, graph: &OrgGraph, order: &[UnitId]) -> Result<RowCounts> {
    let tx = conn
        .transaction()
        .map_err(|e| Error::io("begin_transaction", e))?;

    tx.execute_batch(
        "DELETE FROM employee_roles; DELETE FROM employees; DELETE FROM roles; DELETE FROM units;",
    )
    .map_err(|e| Error::io("clear_tables", e))?;

    let numeric: HashMap<UnitId, i64> = order
        .iter()
        .map(|id| (*id, unit_numeric_id(graph, *id)))
        .collect();

    let mut counts = RowCounts {
        units: 0,
        roles: 0,
        employees: 0,
        assignments: 0,
    };
    let mut seen_employees = Vec::new();

    for id in order {
        let unit = graph.unit(*id);
        tx.execute(
            "INSERT OR REPLACE INTO units (id, name, description, kind, parent_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                numeric[id],
                unit.name(),
                unit.description(),
                unit.kind().as_str(),
                unit.parent().map(|p| numeric[&p]),
            ],
        )
        .map_err(|e| Error::io("insert_unit", e))?;
        counts.units += 1;

        for role_id in unit.roles() {
            let role = graph.role(*role_id);
            let role_row_id = role_numeric_id(numeric[id], role.name());
            tx.execute(
                "INSERT OR REPLACE INTO roles (id, name, description, unit_id)
                 VALUES (?1, ?2, ?3, ?4)",
                params![role_row_id, role.name(), role.description(), numeric[id]],
            )
            .map_err(|e| Error::io("insert_role", e))?;
            counts.roles += 1;

            for emp_id in role.employees() {
                let employee = graph.employee(*emp_id);
                if !seen_employees.contains(emp_id) {
                    seen_employees.push(*emp_id);
                    tx.execute(
                        "INSERT OR IGNORE INTO employees (id, name) VALUES (?1, ?2)",
                        params![employee.key(), employee.name()],
                    )
                    .map_err(|e| Error::io("insert_employee", e))?;
                    counts.employees += 1;
                }
                tx.execute(
                    "INSERT OR IGNORE INTO employee_roles (employee_id, role_id)
                     VALUES (?1, ?2)",
                    params![employee.key(), role_row_id],
                )
                .map_err(|e| Error::io("insert_assignment", e))?;
                counts.assignments += 1;
            }
        }
    }

    tx.commit().map_err(|e| Error::io("commit_transaction", e))?;
    Ok(counts)
}

/// Row counts must match what was just written; a mismatch is logged, not
/// fatal.
fn verify_row_counts(conn: &Connection, counts: &RowCounts) {
    let checks = [
        ("units", counts.units),
        ("roles", counts.roles),
        ("employees", counts.employees),
        ("employee_roles", counts.assignments),
    ];
    for (table, expected) in checks {
        let stored: std::result::Result<usize, _> = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table}"),
            [],
            |row| row.get::<_, i64>(0).map(|n| n as usize),
        );
        match stored {
            Ok(stored) if stored == expected => {},
            Ok(stored) => warn!(table, expected, stored, "row count mismatch after save"),
            Err(e) => warn!(table, %e, "row count verification failed"),
        }
    }
}

fn run_integrity_check(conn: &Connection) -> Result<()> {
    let outcome: String = conn
        .query_row("PRAGMA integrity_check", [], |row| row.get(0))
        .map_err(|e| Error::io("integrity_check", e))?;
    if outcome.eq_ignore_ascii_case("ok") {
        Ok(())
    } else {
        Err(Error::io("integrity_check", outcome))
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// Header check before connecting: the file must exist, be large enough to
/// hold a page, and open with the SQLite magic string.
fn verify_database_file(path: &Path) -> std::result::Result<(), String> {
    let metadata =
        std::fs::metadata(path).map_err(|e| format!("database file not accessible: {e}"))?;
    if metadata.len() < MIN_DB_LEN {
        return Err(format!(
            "file is too small ({} bytes) to be a SQLite database",
            metadata.len()
        ));
    }
    let mut header = [0u8; 16];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map_err(|e| format!("cannot read database header: {e}"))?;
    if &header != SQLITE_MAGIC {
        return Err("file header does not match 'SQLite format 3'".to_string());
    }
    Ok(())
}

fn tables_present(conn: &Connection) -> std::result::Result<bool, rusqlite::Error> {
    let count: usize = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master
         WHERE type = 'table' AND name IN ('units', 'roles', 'employees', 'employee_roles')",
        [],
        |row| row.get::<_, i64>(0).map(|n| n as usize),
    )?;
    Ok(count == EXPECTED_TABLES.len())
}

/// The minimal structure returned when the destination is unusable: a lone
/// root board with its president role. The reason lands in the report and
/// the log so the caller can tell this apart from a real load.
fn fallback_structure(reason: &str, mut report: LoadReport) -> LoadedGraph {
    warn!(reason, "falling back to default organization structure");
    report.warn(format!("falling back to default structure: {reason}"));
    let mut graph = OrgGraph::with_root("Root Board", "", UnitKind::Board);
    if let Some(root) = graph.root() {
        graph.add_role(root, "Presidente", "Board President");
    }
    LoadedGraph { graph, report }
}

type UnitMaps = (HashMap<i64, UnitId>, Vec<(i64, i64)>);

fn load_units(conn: &Connection, graph: &mut OrgGraph) -> Result<UnitMaps> {
    let mut stmt = conn
        .prepare("SELECT id, name, description, kind, parent_id FROM units")
        .map_err(|e| Error::io("load_units", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, Option<i64>>(4)?,
            ))
        })
        .map_err(|e| Error::io("load_units", e))?;

    let mut units = HashMap::new();
    let mut parent_relations = Vec::new();
    for row in rows {
        let (id, name, description, kind, parent_id) =
            row.map_err(|e| Error::io("load_units", e))?;
        let unit = graph.add_unit(name, description.unwrap_or_default(), UnitKind::sniff(&kind));
        units.insert(id, unit);
        if let Some(parent) = parent_id {
            parent_relations.push((id, parent));
        }
    }
    Ok((units, parent_relations))
}

fn load_roles(
    conn: &Connection,
    graph: &mut OrgGraph,
    units: &HashMap<i64, UnitId>,
    report: &mut LoadReport,
) -> Result<HashMap<i64, RoleId>> {
    let mut stmt = conn
        .prepare("SELECT id, name, description, unit_id FROM roles")
        .map_err(|e| Error::io("load_roles", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })
        .map_err(|e| Error::io("load_roles", e))?;

    let mut roles = HashMap::new();
    for row in rows {
        let (id, name, description, unit_id) = row.map_err(|e| Error::io("load_roles", e))?;
        match units.get(&unit_id) {
            Some(unit) => {
                let role = graph.add_role(*unit, name, description.unwrap_or_default());
                roles.insert(id, role);
            },
            None => report.skip(format!(
                "role '{name}' references unknown unit id {unit_id}"
            )),
        }
    }
    Ok(roles)
}

fn load_employees(
    conn: &Connection,
    graph: &mut OrgGraph,
) -> Result<HashMap<String, EmployeeId>> {
    let mut stmt = conn
        .prepare("SELECT id, name FROM employees")
        .map_err(|e| Error::io("load_employees", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(|e| Error::io("load_employees", e))?;

    let mut employees = HashMap::new();
    for row in rows {
        let (key, name) = row.map_err(|e| Error::io("load_employees", e))?;
        let employee = graph.add_employee(&*key, name);
        employees.insert(key, employee);
    }
    Ok(employees)
}

fn load_assignments(
    conn: &Connection,
    graph: &mut OrgGraph,
    roles: &HashMap<i64, RoleId>,
    employees: &HashMap<String, EmployeeId>,
    report: &mut LoadReport,
) -> Result<()> {
    let mut stmt = conn
        .prepare("SELECT employee_id, role_id FROM employee_roles")
        .map_err(|e| Error::io("load_assignments", e))?;
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })
        .map_err(|e| Error::io("load_assignments", e))?;

    for row in rows {
        let (employee_key, role_id) = row.map_err(|e| Error::io("load_assignments", e))?;
        match (employees.get(&employee_key), roles.get(&role_id)) {
            (Some(employee), Some(role)) => graph.assign(*employee, *role),
            (None, _) => report.skip(format!(
                "assignment references unknown employee id '{employee_key}'"
            )),
            (_, None) => report.skip(format!(
                "assignment references unknown role id {role_id}"
            )),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> OrgGraph {
        let mut graph = OrgGraph::with_root("Acme", "Holding board", UnitKind::Board);
        let root = graph.root().unwrap();
        graph.add_role(root, "Presidente", "Board president");
        let eng = graph.add_unit("Engineering", "Builds things", UnitKind::Department);
        graph.attach(root, eng);
        let direttore = graph.add_role(eng, "Direttore", "Runs engineering");
        let alice = graph.add_employee("emp-alice", "Alice");
        graph.assign(alice, direttore);
        let core = graph.add_unit("Core", "Platform team", UnitKind::Group);
        graph.attach(eng, core);
        let membro = graph.add_role(core, "Membro", "Team member");
        let bob = graph.add_employee("emp-bob", "Bob");
        graph.assign(bob, membro);
        graph
    }

    fn table_count(path: &Path, table: &str) -> usize {
        let conn = Connection::open(path).unwrap();
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get::<_, i64>(0).map(|n| n as usize)
        })
        .unwrap()
    }

    #[test]
    fn test_roundtrip() {
        let codec = RelationalCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.db");
        codec.save(&sample_graph(), &path).unwrap();

        let loaded = codec.load(&path).unwrap();
        assert!(loaded.report.is_clean(), "{:?}", loaded.report);

        let graph = loaded.graph;
        let root = graph.root().unwrap();
        assert_eq!(graph.unit(root).name(), "Acme");
        assert_eq!(graph.unit(root).kind(), UnitKind::Board);
        assert_eq!(graph.unit_count(), 3);
        assert_eq!(graph.role_count(), 3);
        assert_eq!(graph.employee_count(), 2);
        assert_eq!(graph.assignment_count(), 2);

        let eng = graph.unit(root).children()[0];
        assert_eq!(graph.unit(eng).name(), "Engineering");
        let direttore = graph.find_role(eng, "Direttore").unwrap();
        let alice = graph.employee_by_key("emp-alice").unwrap();
        assert_eq!(graph.role(direttore).employees(), &[alice]);
        assert_eq!(graph.employee(alice).roles(), &[direttore]);

        let core = graph.unit(eng).children()[0];
        let bob = graph.employee_by_key("emp-bob").unwrap();
        assert_eq!(graph.units_of_employee(bob), vec![core]);
    }

    #[test]
    fn test_resave_keeps_row_counts() {
        let codec = RelationalCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.db");
        let graph = sample_graph();

        codec.save(&graph, &path).unwrap();
        let first = (
            table_count(&path, "units"),
            table_count(&path, "roles"),
            table_count(&path, "employees"),
            table_count(&path, "employee_roles"),
        );
        codec.save(&graph, &path).unwrap();
        let second = (
            table_count(&path, "units"),
            table_count(&path, "roles"),
            table_count(&path, "employees"),
            table_count(&path, "employee_roles"),
        );
        assert_eq!(first, second);
        assert_eq!(first, (3, 3, 2, 2));
    }

    #[test]
    fn test_missing_file_falls_back() {
        let codec = RelationalCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let loaded = codec.load(&dir.path().join("absent.db")).unwrap();
        let root = loaded.graph.root().unwrap();
        assert_eq!(loaded.graph.unit(root).name(), "Root Board");
        assert_eq!(loaded.graph.unit(root).kind(), UnitKind::Board);
        assert!(loaded.graph.find_role(root, "Presidente").is_some());
        assert!(!loaded.report.warnings.is_empty());
    }

    #[test]
    fn test_non_database_file_falls_back() {
        let codec = RelationalCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fake.db");
        std::fs::write(&path, "this is just text ".repeat(20)).unwrap();
        let loaded = codec.load(&path).unwrap();
        let root = loaded.graph.root().unwrap();
        assert_eq!(loaded.graph.unit(root).name(), "Root Board");
        assert!(
            loaded
                .report
                .warnings
                .iter()
                .any(|w| w.contains("SQLite format 3"))
        );
    }

    #[test]
    fn test_database_without_tables_falls_back() {
        let codec = RelationalCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.db");
        {
            let conn = Connection::open(&path).unwrap();
            conn.execute("CREATE TABLE unrelated (x INTEGER)", [])
                .unwrap();
        }
        let loaded = codec.load(&path).unwrap();
        let root = loaded.graph.root().unwrap();
        assert_eq!(loaded.graph.unit(root).name(), "Root Board");
        assert!(
            loaded
                .report
                .warnings
                .iter()
                .any(|w| w.contains("missing"))
        );
    }

    #[test]
    fn test_dangling_join_row_is_skipped() {
        let codec = RelationalCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.db");
        codec.save(&sample_graph(), &path).unwrap();
        {
            // Foreign keys are off by default for fresh connections, so a
            // dangling join row can be planted for the loader to find.
            let conn = Connection::open(&path).unwrap();
            conn.pragma_update(None, "foreign_keys", "OFF").unwrap();
            conn.execute(
                "INSERT INTO employee_roles (employee_id, role_id) VALUES ('emp-ghost', 12345)",
                [],
            )
            .unwrap();
        }
        let loaded = codec.load(&path).unwrap();
        assert_eq!(loaded.report.skipped.len(), 1);
        assert!(loaded.report.skipped[0].contains("emp-ghost"));
        assert_eq!(loaded.graph.assignment_count(), 2);
    }

    #[test]
    fn test_save_requires_root() {
        let codec = RelationalCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.db");
        let err = codec.save(&OrgGraph::new(), &path).unwrap_err();
        assert!(matches!(err, Error::Structure(_)));
    }
}
