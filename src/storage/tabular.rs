//! Tabular codec: flat multi-section CSV.
//!
//! One text file, four sections, each introduced by a `#SECTION: <NAME>`
//! marker line and a fixed header row:
//!
//! ```text
//! #SECTION: UNITS
//! TYPE,ID,NAME,DESCRIPTION,PARENT_ID
//! #SECTION: ROLES
//! UNIT_ID,NAME,DESCRIPTION
//! #SECTION: EMPLOYEES
//! ID,NAME
//! #SECTION: ASSIGNMENTS
//! EMPLOYEE_ID,ROLE_NAME,UNIT_ID
//! ```
//!
//! Unit ids are synthesized per save by the [`crate::identity`] module;
//! employee ids are the employees' own keys. Loading is two-pass: every
//! entity is instantiated first, then parent links, role ownership and
//! assignments are resolved by id, skipping (and reporting) records whose
//! references do not resolve. The root is inferred afterwards.

use super::reconstruct::{infer_root, link_parents};
use super::{LoadReport, LoadedGraph, StorageCodec, StorageFormat};
use crate::identity::unit_external_id;
use crate::models::{EmployeeId, OrgGraph, UnitId, UnitKind};
use crate::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument};

const SECTION_MARKER: &str = "#SECTION:";
const UNIT_HEADER: [&str; 5] = ["TYPE", "ID", "NAME", "DESCRIPTION", "PARENT_ID"];
const ROLE_HEADER: [&str; 3] = ["UNIT_ID", "NAME", "DESCRIPTION"];
const EMPLOYEE_HEADER: [&str; 2] = ["ID", "NAME"];
const ASSIGNMENT_HEADER: [&str; 3] = ["EMPLOYEE_ID", "ROLE_NAME", "UNIT_ID"];

/// How many leading bytes are inspected by the binary-content guard, and
/// how many control bytes are tolerated before the file is rejected.
const BINARY_CHECK_LEN: usize = 400;
const BINARY_TOLERANCE: usize = 5;

/// Codec for the flat multi-section format.
#[derive(Debug, Default, Clone, Copy)]
pub struct TabularCodec;

impl TabularCodec {
    /// Creates a new tabular codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Serializes the graph to section-structured CSV text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structure`] if the graph has no root.
    pub fn encode(&self, graph: &OrgGraph) -> Result<String> {
        let root = graph
            .root()
            .ok_or_else(|| Error::Structure("cannot save a graph with no root unit".to_string()))?;

        let order = graph.preorder(root);
        let external: HashMap<UnitId, String> = order
            .iter()
            .map(|id| (*id, unit_external_id(graph, *id)))
            .collect();

        let mut unit_rows = Vec::new();
        let mut role_rows = Vec::new();
        let mut employee_rows = Vec::new();
        let mut assignment_rows = Vec::new();
        let mut seen_employees = Vec::new();

        for id in &order {
            let unit = graph.unit(*id);
            let parent = unit
                .parent()
                .map(|p| external[&p].clone())
                .unwrap_or_default();
            unit_rows.push(vec![
                unit.kind().as_str().to_string(),
                external[id].clone(),
                unit.name().to_string(),
                unit.description().to_string(),
                parent,
            ]);

            for role_id in unit.roles() {
                let role = graph.role(*role_id);
                role_rows.push(vec![
                    external[id].clone(),
                    role.name().to_string(),
                    role.description().to_string(),
                ]);

                for emp_id in role.employees() {
                    let employee = graph.employee(*emp_id);
                    if !seen_employees.contains(emp_id) {
                        seen_employees.push(*emp_id);
                        employee_rows.push(vec![
                            employee.key().to_string(),
                            employee.name().to_string(),
                        ]);
                    }
                    assignment_rows.push(vec![
                        employee.key().to_string(),
                        role.name().to_string(),
                        external[id].clone(),
                    ]);
                }
            }
        }

        let mut out = String::new();
        out.push_str(&section("UNITS", &UNIT_HEADER, &unit_rows)?);
        out.push_str(&section("ROLES", &ROLE_HEADER, &role_rows)?);
        out.push_str(&section("EMPLOYEES", &EMPLOYEE_HEADER, &employee_rows)?);
        out.push_str(&section("ASSIGNMENTS", &ASSIGNMENT_HEADER, &assignment_rows)?);
        Ok(out)
    }

    /// Reconstructs a graph from tabular bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for binary content, missing section
    /// markers, missing recognized headers, or an empty UNITS section.
    pub fn decode(&self, bytes: &[u8]) -> Result<LoadedGraph> {
        check_not_binary(bytes)?;
        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::Format("tabular file is not valid UTF-8 text".to_string()))?;

        let lines: Vec<&str> = text.lines().collect();
        if lines.len() < 2 {
            return Err(Error::Format(
                "tabular file has fewer than two lines".to_string(),
            ));
        }
        if !lines.iter().any(|l| l.starts_with(SECTION_MARKER)) {
            return Err(Error::Format(format!(
                "no '{SECTION_MARKER}' marker found; not a tabular orgchart file"
            )));
        }
        if !lines.iter().any(|l| is_known_header(l)) {
            return Err(Error::Format(
                "no recognized section header found".to_string(),
            ));
        }

        let sections = split_sections(&lines);
        debug!(sections = sections.len(), "tabular sections parsed");

        let mut graph = OrgGraph::new();
        let mut report = LoadReport::default();

        let mut units = HashMap::new();
        let mut parent_relations = Vec::new();
        match sections.get("UNITS") {
            Some(section_lines) => read_units(
                section_lines,
                &mut graph,
                &mut units,
                &mut parent_relations,
                &mut report,
            ),
            None => {
                return Err(Error::Format(
                    "required section UNITS is missing".to_string(),
                ));
            },
        }
        if units.is_empty() {
            return Err(Error::Format(
                "UNITS section contains no unit records".to_string(),
            ));
        }

        link_parents(&mut graph, &units, &parent_relations, &mut report);

        if let Some(section_lines) = sections.get("ROLES") {
            read_roles(section_lines, &mut graph, &units, &mut report);
        } else {
            report.warn("section ROLES is missing");
        }

        let mut employees = HashMap::new();
        if let Some(section_lines) = sections.get("EMPLOYEES") {
            read_employees(section_lines, &mut graph, &mut employees, &mut report);
        } else {
            report.warn("section EMPLOYEES is missing");
        }

        if let Some(section_lines) = sections.get("ASSIGNMENTS") {
            read_assignments(section_lines, &mut graph, &units, &employees, &mut report);
        } else {
            report.warn("section ASSIGNMENTS is missing");
        }

        if let Some(root) = infer_root(&graph, &mut report) {
            graph.set_root(root);
        }
        Ok(LoadedGraph { graph, report })
    }
}

impl StorageCodec for TabularCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Tabular
    }

    #[instrument(skip(self, graph), fields(codec = "tabular"))]
    fn save(&self, graph: &OrgGraph, destination: &Path) -> Result<()> {
        let text = self.encode(graph)?;
        fs::write(destination, text).map_err(|e| Error::io("write_tabular", e))
    }

    #[instrument(skip(self), fields(codec = "tabular"))]
    fn load(&self, source: &Path) -> Result<LoadedGraph> {
        let bytes = fs::read(source).map_err(|e| Error::io("read_tabular", e))?;
        self.decode(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

fn section(name: &str, header: &[&str], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(header)
        .map_err(|e| Error::io("write_section_header", e))?;
    for row in rows {
        writer
            .write_record(row)
            .map_err(|e| Error::io("write_section_row", e))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| Error::io("flush_section", e))?;
    let body = String::from_utf8(bytes).map_err(|e| Error::io("encode_section", e))?;
    Ok(format!("{SECTION_MARKER} {name}\n{body}"))
}

// ---------------------------------------------------------------------------
// Decoding helpers
// ---------------------------------------------------------------------------

/// Rejects files whose leading bytes look binary rather than CSV.
///
/// Control characters other than tab/newline/carriage-return count as
/// suspicious; a small tolerance absorbs stray artifacts of encoding
/// mishaps without letting serialized blobs through.
fn check_not_binary(bytes: &[u8]) -> Result<()> {
    let mut suspicious = 0;
    for byte in bytes.iter().take(BINARY_CHECK_LEN) {
        if *byte < 32 && !matches!(*byte, 9 | 10 | 13) {
            suspicious += 1;
            if suspicious > BINARY_TOLERANCE {
                return Err(Error::Format(
                    "file contains binary data and is not a valid tabular export".to_string(),
                ));
            }
        }
    }
    Ok(())
}

fn is_known_header(line: &str) -> bool {
    let joined_unit = UNIT_HEADER.join(",");
    let joined_role = ROLE_HEADER.join(",");
    let joined_employee = EMPLOYEE_HEADER.join(",");
    let joined_assignment = ASSIGNMENT_HEADER.join(",");
    line == joined_unit || line == joined_role || line == joined_employee || line == joined_assignment
}

fn split_sections<'a>(lines: &[&'a str]) -> HashMap<String, Vec<&'a str>> {
    let mut sections: HashMap<String, Vec<&'a str>> = HashMap::new();
    let mut current: Option<String> = None;
    for line in lines {
        if let Some(rest) = line.strip_prefix(SECTION_MARKER) {
            current = Some(rest.trim().to_string());
        } else if let Some(name) = &current {
            sections.entry(name.clone()).or_default().push(line);
        }
        // Lines before the first marker are ignored.
    }
    sections
}

/// Parses one section body; individually malformed rows are skipped and
/// reported, never fatal.
fn section_records(
    section_lines: &[&str],
    section: &str,
    report: &mut LoadReport,
) -> Vec<csv::StringRecord> {
    let body = section_lines.join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body.as_bytes());
    let mut records = Vec::new();
    for record in reader.records() {
        match record {
            Ok(record) => records.push(record),
            Err(e) => report.skip(format!("malformed row in {section} section: {e}")),
        }
    }
    records
}

fn read_units(
    section_lines: &[&str],
    graph: &mut OrgGraph,
    units: &mut HashMap<String, UnitId>,
    parent_relations: &mut Vec<(String, String)>,
    report: &mut LoadReport,
) {
    for (row, record) in section_records(section_lines, "UNITS", report).iter().enumerate() {
        let (Some(kind), Some(id), Some(name)) = (record.get(0), record.get(1), record.get(2))
        else {
            report.skip(format!("UNITS row {} has too few fields", row + 1));
            continue;
        };
        let description = record.get(3).unwrap_or_default();
        let parent = record.get(4).unwrap_or_default();

        let unit = graph.add_unit(name, description, UnitKind::sniff(kind));
        units.insert(id.to_string(), unit);
        if !parent.is_empty() {
            parent_relations.push((id.to_string(), parent.to_string()));
        }
    }
    debug!(units = units.len(), "UNITS section read");
}

fn read_roles(
    section_lines: &[&str],
    graph: &mut OrgGraph,
    units: &HashMap<String, UnitId>,
    report: &mut LoadReport,
) {
    for (row, record) in section_records(section_lines, "ROLES", report).iter().enumerate() {
        let (Some(unit_id), Some(name)) = (record.get(0), record.get(1)) else {
            report.skip(format!("ROLES row {} has too few fields", row + 1));
            continue;
        };
        let description = record.get(2).unwrap_or_default();
        match units.get(unit_id) {
            Some(unit) => {
                graph.add_role(*unit, name, description);
            },
            None => report.skip(format!(
                "role '{name}' references unknown unit id '{unit_id}'"
            )),
        }
    }
}

fn read_employees(
    section_lines: &[&str],
    graph: &mut OrgGraph,
    employees: &mut HashMap<String, EmployeeId>,
    report: &mut LoadReport,
) {
    for (row, record) in section_records(section_lines, "EMPLOYEES", report).iter().enumerate() {
        let (Some(id), Some(name)) = (record.get(0), record.get(1)) else {
            report.skip(format!("EMPLOYEES row {} has too few fields", row + 1));
            continue;
        };
        let employee = graph.add_employee(id, name);
        employees.insert(id.to_string(), employee);
    }
}

fn read_assignments(
    section_lines: &[&str],
    graph: &mut OrgGraph,
    units: &HashMap<String, UnitId>,
    employees: &HashMap<String, EmployeeId>,
    report: &mut LoadReport,
) {
    for (row, record) in section_records(section_lines, "ASSIGNMENTS", report).iter().enumerate() {
        let (Some(employee_id), Some(role_name), Some(unit_id)) =
            (record.get(0), record.get(1), record.get(2))
        else {
            report.skip(format!("ASSIGNMENTS row {} has too few fields", row + 1));
            continue;
        };

        let Some(employee) = employees.get(employee_id) else {
            report.skip(format!(
                "assignment references unknown employee id '{employee_id}'"
            ));
            continue;
        };
        let Some(unit) = units.get(unit_id) else {
            report.skip(format!(
                "assignment references unknown unit id '{unit_id}'"
            ));
            continue;
        };
        let Some(role) = graph.find_role(*unit, role_name) else {
            report.skip(format!(
                "assignment references role '{role_name}' not present in unit '{}'",
                graph.unit(*unit).name()
            ));
            continue;
        };
        graph.assign(*employee, role);
    }
}
