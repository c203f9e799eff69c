//! Document codec: nested JSON-like text.
//!
//! One object per unit with fields `type`, `name`, `description`, `roles[]`
//! and `subUnits[]`; each role carries `name`, `description`, `employees[]`;
//! each employee carries `id`, `name`. Containment implies the parent/unit
//! relationships, so the artifact holds no explicit ids besides employee
//! keys.
//!
//! Decoding does not use a JSON library: it is a small recursive-descent
//! reader that extracts string fields by pattern, carves out array bodies by
//! bracket depth (string-aware, escaped quotes included), splits them into
//! top-level object fragments and recurses. This keeps the reader tolerant
//! of the loosely formatted files older exporters produced.

use super::{LoadReport, LoadedGraph, StorageCodec, StorageFormat};
use crate::models::{OrgGraph, UnitId, UnitKind};
use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::{debug, instrument, warn};

/// Magic bytes of the legacy binary serialization format.
const BINARY_MAGIC: [u8; 2] = [0xAC, 0xED];

// Note: these patterns are static and guaranteed to compile, so expect() is safe.
static TYPE_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("type"));
static NAME_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("name"));
static DESCRIPTION_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("description"));
static ID_FIELD: Lazy<Regex> = Lazy::new(|| field_pattern("id"));

#[allow(clippy::expect_used)]
fn field_pattern(field: &str) -> Regex {
    // Matches `"field": "<value>"` with any escaped content in the value.
    Regex::new(&format!(
        r#""{field}"\s*:\s*"((?:[^"\\]|\\.)*)""#
    ))
    .expect("static regex: string field pattern")
}

/// Codec for the nested document format.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentCodec;

impl DocumentCodec {
    /// Creates a new document codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Serializes the graph to document text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Structure`] if the graph has no root.
    pub fn encode(&self, graph: &OrgGraph) -> Result<String> {
        let root = graph
            .root()
            .ok_or_else(|| Error::Structure("cannot save a graph with no root unit".to_string()))?;
        let doc = build_doc_unit(graph, root);
        serde_json::to_string_pretty(&doc)
            .map_err(|e| Error::io("encode_document", e))
    }

    /// Reconstructs a graph from document bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Format`] for empty input, the legacy binary magic,
    /// non-UTF-8 content, or text not starting with `{`.
    pub fn decode(&self, bytes: &[u8]) -> Result<LoadedGraph> {
        if bytes.is_empty() {
            return Err(Error::Format("document file is empty".to_string()));
        }
        if bytes.starts_with(&BINARY_MAGIC) {
            return binary_fallback(bytes);
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|_| Error::Format("document file is not valid UTF-8 text".to_string()))?;
        match text.trim_start().chars().next() {
            Some('{') => {},
            Some(first) => {
                return Err(Error::Format(format!(
                    "document must start with '{{', found '{first}'"
                )));
            },
            None => return Err(Error::Format("document file is blank".to_string())),
        }

        let mut graph = OrgGraph::new();
        let mut report = LoadReport::default();
        let root = decode_unit(text, &mut graph, &mut report)?;
        graph.set_root(root);
        debug!(
            units = graph.unit_count(),
            roles = graph.role_count(),
            employees = graph.employee_count(),
            "document decoded"
        );
        Ok(LoadedGraph { graph, report })
    }
}

impl StorageCodec for DocumentCodec {
    fn format(&self) -> StorageFormat {
        StorageFormat::Document
    }

    #[instrument(skip(self, graph), fields(codec = "document"))]
    fn save(&self, graph: &OrgGraph, destination: &Path) -> Result<()> {
        let text = self.encode(graph)?;
        fs::write(destination, text).map_err(|e| Error::io("write_document", e))
    }

    #[instrument(skip(self), fields(codec = "document"))]
    fn load(&self, source: &Path) -> Result<LoadedGraph> {
        let bytes = fs::read(source).map_err(|e| Error::io("read_document", e))?;
        self.decode(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct DocEmployee<'a> {
    id: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
struct DocRole<'a> {
    name: &'a str,
    description: &'a str,
    employees: Vec<DocEmployee<'a>>,
}

#[derive(Serialize)]
struct DocUnit<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'a str,
    description: &'a str,
    roles: Vec<DocRole<'a>>,
    #[serde(rename = "subUnits")]
    sub_units: Vec<DocUnit<'a>>,
}

fn build_doc_unit(graph: &OrgGraph, id: UnitId) -> DocUnit<'_> {
    let unit = graph.unit(id);
    DocUnit {
        kind: unit.kind().as_str(),
        name: unit.name(),
        description: unit.description(),
        roles: unit
            .roles()
            .iter()
            .map(|role_id| {
                let role = graph.role(*role_id);
                DocRole {
                    name: role.name(),
                    description: role.description(),
                    employees: role
                        .employees()
                        .iter()
                        .map(|emp_id| {
                            let employee = graph.employee(*emp_id);
                            DocEmployee {
                                id: employee.key(),
                                name: employee.name(),
                            }
                        })
                        .collect(),
                }
            })
            .collect(),
        sub_units: unit
            .children()
            .iter()
            .map(|child| build_doc_unit(graph, *child))
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Files opening with `0xAC 0xED` are Java object-serialization streams, a
/// format some legacy exports used. Their payload embeds class descriptors
/// that have no counterpart here, so the fallback inspects the stream only
/// far enough to report it precisely.
fn binary_fallback(bytes: &[u8]) -> Result<LoadedGraph> {
    warn!(len = bytes.len(), "binary serialization magic detected, attempting fallback");
    let version = if bytes.len() >= 4 {
        u16::from_be_bytes([bytes[2], bytes[3]])
    } else {
        0
    };
    Err(Error::Format(format!(
        "file is a legacy binary serialization stream (magic 0xACED, version {version}); \
         re-export the organization as a document file"
    )))
}

fn decode_unit(fragment: &str, graph: &mut OrgGraph, report: &mut LoadReport) -> Result<UnitId> {
    let kind_label = string_field(fragment, &TYPE_FIELD).unwrap_or_default();
    let name = string_field(fragment, &NAME_FIELD).unwrap_or_default();
    let description = string_field(fragment, &DESCRIPTION_FIELD).unwrap_or_default();

    if name.is_empty() {
        return Err(Error::Format(
            "unit object has no 'name' field".to_string(),
        ));
    }

    let kind = resolve_kind(&kind_label, &name, report);
    let unit = graph.add_unit(name, description, kind);

    if let Some(roles_body) = array_slice(fragment, "roles") {
        for role_fragment in split_objects(roles_body) {
            decode_role(role_fragment, graph, unit, report);
        }
    }

    if let Some(sub_units_body) = array_slice(fragment, "subUnits") {
        for child_fragment in split_objects(sub_units_body) {
            let child = decode_unit(child_fragment, graph, report)?;
            graph.attach(unit, child);
        }
    }

    Ok(unit)
}

fn decode_role(fragment: &str, graph: &mut OrgGraph, unit: UnitId, report: &mut LoadReport) {
    let Some(name) = string_field(fragment, &NAME_FIELD) else {
        report.skip(format!(
            "role object without a 'name' field in unit '{}'",
            graph.unit(unit).name()
        ));
        return;
    };
    let description = string_field(fragment, &DESCRIPTION_FIELD).unwrap_or_default();
    let role = graph.add_role(unit, name, description);

    if let Some(employees_body) = array_slice(fragment, "employees") {
        for employee_fragment in split_objects(employees_body) {
            let Some(emp_name) = string_field(employee_fragment, &NAME_FIELD) else {
                report.skip(format!(
                    "employee object without a 'name' field in role '{}'",
                    graph.role(role).name()
                ));
                continue;
            };
            let key = string_field(employee_fragment, &ID_FIELD).filter(|id| !id.is_empty());
            // A missing id means the record predates stable keys; mint one.
            let employee = match key {
                Some(key) => graph.add_employee(key, emp_name),
                None => graph.new_employee(emp_name),
            };
            graph.assign(employee, role);
        }
    }
}

/// Kind resolution with the legacy fallbacks: an unknown label first tries
/// a name-based board sniff, then defaults to Department.
fn resolve_kind(label: &str, name: &str, report: &mut LoadReport) -> UnitKind {
    if let Some(kind) = UnitKind::parse(label) {
        return kind;
    }
    if !label.is_empty() {
        report.warn(format!(
            "unit '{name}' has unrecognized type '{label}', inferring from name"
        ));
    }
    let lower = name.to_lowercase();
    if lower.contains("board") || lower.contains("comitato") {
        UnitKind::Board
    } else {
        UnitKind::Department
    }
}

/// Extracts a string field value from an object fragment and unescapes it.
fn string_field(fragment: &str, pattern: &Regex) -> Option<String> {
    pattern
        .captures(fragment)
        .and_then(|c| c.get(1))
        .map(|m| unescape(m.as_str()))
}

/// Carves out the raw `[ ... ]` body of a named array field.
///
/// Depth counting is string-aware: brackets inside string values (and
/// escaped quotes inside those strings) do not affect the depth.
fn array_slice<'a>(fragment: &'a str, field: &str) -> Option<&'a str> {
    let key = format!("\"{field}\"");
    let key_pos = fragment.find(&key)?;
    let after_key = &fragment[key_pos + key.len()..];
    let colon = after_key.find(':')?;
    let open_offset = after_key[colon..].find('[')?;
    let start = key_pos + key.len() + colon + open_offset;

    let bytes = fragment.as_bytes();
    let mut depth: usize = 0;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
        } else {
            match byte {
                b'"' => in_string = true,
                b'[' => depth += 1,
                b']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(&fragment[start..=i]);
                    }
                },
                _ => {},
            }
        }
    }
    None
}

/// Splits an array body into its top-level `{ ... }` object fragments.
fn split_objects(array_body: &str) -> Vec<&str> {
    let bytes = array_body.as_bytes();
    let mut fragments = Vec::new();
    let mut depth: usize = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in bytes.iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            },
            b'}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0
                        && let Some(s) = start.take()
                    {
                        fragments.push(&array_body[s..=i]);
                    }
                }
            },
            _ => {},
        }
    }
    fragments
}

/// Reverses JSON string escaping for extracted field values.
fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('/') => out.push('/'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('u') => {
                let code: String = chars.by_ref().take(4).collect();
                match u32::from_str_radix(&code, 16).ok().and_then(char::from_u32) {
                    Some(decoded) => out.push(decoded),
                    None => {
                        out.push_str("\\u");
                        out.push_str(&code);
                    },
                }
            },
            Some(other) => {
                out.push('\\');
                out.push(other);
            },
            None => out.push('\\'),
        }
    }
    out
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

    #[test]
    fn test_encode_shape() {
        let codec = DocumentCodec::new();
        let text = codec.encode(&sample_graph()).unwrap();
        assert!(text.trim_start().starts_with('{'));
        assert!(text.contains("\"type\": \"Board\""));
        assert!(text.contains("\"subUnits\""));
        assert!(text.contains("\"Presidente\""));
        assert!(text.contains("\"emp-alice\""));
    }

    #[test]
    fn test_roundtrip() {
        let codec = DocumentCodec::new();
        let original = sample_graph();
        let text = codec.encode(&original).unwrap();
        let loaded = codec.decode(text.as_bytes()).unwrap();
        assert!(loaded.report.is_clean());

        let graph = loaded.graph;
        let root = graph.root().unwrap();
        assert_eq!(graph.unit(root).name(), "Acme");
        assert_eq!(graph.unit(root).kind(), UnitKind::Board);
        assert_eq!(graph.unit_count(), 3);
        assert_eq!(graph.role_count(), 3);
        assert_eq!(graph.employee_count(), 2);

        let eng = graph.unit(root).children()[0];
        assert_eq!(graph.unit(eng).name(), "Engineering");
        let direttore = graph.find_role(eng, "Direttore").unwrap();
        let alice = graph.employee_by_key("emp-alice").unwrap();
        assert_eq!(graph.role(direttore).employees(), &[alice]);
        assert_eq!(graph.employee(alice).roles(), &[direttore]);

        let core = graph.unit(eng).children()[0];
        assert_eq!(graph.unit(core).kind(), UnitKind::Group);
        let bob = graph.employee_by_key("emp-bob").unwrap();
        assert_eq!(graph.units_of_employee(bob), vec![core]);
    }

    #[test]
    fn test_roundtrip_escaped_characters() {
        let mut graph = OrgGraph::with_root(
            "Acme \"Prime\", Inc.",
            "Line one\nLine [two] {three}",
            UnitKind::Board,
        );
        let root = graph.root().unwrap();
        graph.add_role(root, "Presidente", "Quoted \"description\"");

        let codec = DocumentCodec::new();
        let text = codec.encode(&graph).unwrap();
        let loaded = codec.decode(text.as_bytes()).unwrap();
        let restored_root = loaded.graph.root().unwrap();
        assert_eq!(loaded.graph.unit(restored_root).name(), "Acme \"Prime\", Inc.");
        assert_eq!(
            loaded.graph.unit(restored_root).description(),
            "Line one\nLine [two] {three}"
        );
        let role = loaded.graph.unit(restored_root).roles()[0];
        assert_eq!(
            loaded.graph.role(role).description(),
            "Quoted \"description\""
        );
    }

    #[test]
    fn test_shared_employee_deduplicated() {
        let mut graph = OrgGraph::with_root("Acme", "", UnitKind::Board);
        let root = graph.root().unwrap();
        let eng = graph.add_unit("Engineering", "", UnitKind::Department);
        graph.attach(root, eng);
        let core = graph.add_unit("Core", "", UnitKind::Group);
        graph.attach(eng, core);
        let direttore = graph.add_role(eng, "Direttore", "");
        let membro = graph.add_role(core, "Membro", "");
        let alice = graph.add_employee("emp-alice", "Alice");
        graph.assign(alice, direttore);
        graph.assign(alice, membro);

        let codec = DocumentCodec::new();
        let text = codec.encode(&graph).unwrap();
        let loaded = codec.decode(text.as_bytes()).unwrap();
        assert_eq!(loaded.graph.employee_count(), 1);
        let restored = loaded.graph.employee_by_key("emp-alice").unwrap();
        assert_eq!(loaded.graph.employee(restored).roles().len(), 2);
    }

    #[test]
    fn test_binary_magic_is_format_error() {
        let codec = DocumentCodec::new();
        let bytes = [0xAC, 0xED, 0x00, 0x05, 0x73, 0x72];
        let err = codec.decode(&bytes).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
        assert!(err.to_string().contains("0xACED"));
    }

    #[test]
    fn test_non_object_input_is_format_error() {
        let codec = DocumentCodec::new();
        assert!(matches!(
            codec.decode(b"TYPE,ID,NAME").unwrap_err(),
            Error::Format(_)
        ));
        assert!(matches!(codec.decode(b"").unwrap_err(), Error::Format(_)));
        assert!(matches!(
            codec.decode(b"   \n\t ").unwrap_err(),
            Error::Format(_)
        ));
    }

    #[test]
    fn test_unknown_type_falls_back() {
        let codec = DocumentCodec::new();
        let text = r#"{
            "type": "Committee",
            "name": "Steering",
            "description": "",
            "roles": [],
            "subUnits": []
        }"#;
        let loaded = codec.decode(text.as_bytes()).unwrap();
        let root = loaded.graph.root().unwrap();
        assert_eq!(loaded.graph.unit(root).kind(), UnitKind::Department);
        assert!(!loaded.report.warnings.is_empty());

        let board_text = r#"{
            "type": "Committee",
            "name": "Advisory Board",
            "description": "",
            "roles": [],
            "subUnits": []
        }"#;
        let loaded = codec.decode(board_text.as_bytes()).unwrap();
        let root = loaded.graph.root().unwrap();
        assert_eq!(loaded.graph.unit(root).kind(), UnitKind::Board);
    }

    #[test]
    fn test_array_slice_skips_strings_and_nesting() {
        let fragment = r#"{"name": "has ] bracket", "roles": [{"name": "a", "employees": [{"id": "1", "name": "n"}]}], "subUnits": []}"#;
        let body = array_slice(fragment, "roles").unwrap();
        assert!(body.starts_with('['));
        assert!(body.ends_with(']'));
        assert!(body.contains("employees"));
        let fragments = split_objects(body);
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn test_split_objects_ignores_braces_in_strings() {
        let body = r#"[{"name": "open { brace"}, {"name": "close } brace"}]"#;
        let fragments = split_objects(body);
        assert_eq!(fragments.len(), 2);
    }

    #[test]
    fn test_file_roundtrip() {
        let codec = DocumentCodec::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("org.json");
        codec.save(&sample_graph(), &path).unwrap();
        let loaded = codec.load(&path).unwrap();
        assert_eq!(loaded.graph.unit_count(), 3);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let codec = DocumentCodec::new();
        let err = codec.load(Path::new("/nonexistent/org.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }
}
