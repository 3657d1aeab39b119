//! Sidecar metadata extraction.
//!
//! A sidecar is an XML document next to the primary document. Each
//! sidecar-backed [`Field`] is read with one path expression from
//! [`FIELD_QUERIES`]; the first matching element's text becomes the value.
//!
//! Path expressions support the subset the table needs:
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `/a/b` | child steps from the document root |
//! | `//b`  | `b` at any depth |
//! | `dc:b` | element `b` in the namespace bound to `dc` in [`NAMESPACES`] |
//! | `*`    | any element |
//!
//! Prefixes are resolved against namespace URIs, so a sidecar may bind the
//! Dublin Core vocabulary to any prefix it likes.

use std::path::{Path, PathBuf};

use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use thiserror::Error;

use crate::models::{Field, MetadataRecord};

/// Namespace bindings available to path expressions.
pub const NAMESPACES: &[(&str, &str)] = &[("dc", "http://purl.org/dc/elements/1.1/")];

/// Field → path expression table. The only place sidecar fields are declared.
pub const FIELD_QUERIES: &[(Field, &str)] = &[
    (Field::Title, "//dc:title"),
    (Field::Creator, "//dc:creator"),
    (Field::Contributor, "//dc:contributor"),
    (Field::Publisher, "//dc:publisher"),
    (Field::Source, "//dc:source"),
    (Field::Language, "//dc:language"),
    (Field::Date, "//dc:date"),
    (Field::DocumentNumber, "//dc:identifier"),
    (Field::Excerpt, "//dc:description"),
    (Field::ScanResolution, "//scan/resolution"),
    (Field::ScanColorDepth, "//scan/colorDepth"),
    (Field::ScanDevice, "//scan/device"),
    (Field::GenerationSoftware, "//generation/software"),
    (Field::GenerationDate, "//generation/date"),
];

/// The sidecar exists but could not be read as a well-formed document.
#[derive(Debug, Error)]
#[error("malformed sidecar {}: {message}", .path.display())]
pub struct MetadataFormatError {
    pub path: PathBuf,
    pub message: String,
}

impl MetadataFormatError {
    fn new(path: &Path, message: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Reads a sidecar into a [`MetadataRecord`].
///
/// A missing sidecar is not an error: the record comes back with every field
/// absent.
pub fn extract_metadata(path: &Path) -> Result<MetadataRecord, MetadataFormatError> {
    if !path.exists() {
        return Ok(MetadataRecord::empty());
    }
    let bytes =
        std::fs::read(path).map_err(|e| MetadataFormatError::new(path, e.to_string()))?;
    let document =
        SidecarDocument::parse(&bytes).map_err(|message| MetadataFormatError::new(path, message))?;

    let mut record = MetadataRecord::empty();
    for (field, query) in FIELD_QUERIES {
        let path_expr = PathExpr::parse(query)
            .map_err(|message| MetadataFormatError::new(path, message))?;
        let value = document
            .first_match(&path_expr)
            .map(|idx| document.text_content(idx).trim().to_string());
        record.set(*field, value);
    }
    Ok(record)
}

// ============ Sidecar tree ============

#[derive(Debug)]
enum Content {
    Text(String),
    Child(usize),
}

#[derive(Debug)]
struct Element {
    namespace: Option<String>,
    local_name: String,
    parent: Option<usize>,
    content: Vec<Content>,
}

/// Parsed element tree. Elements are stored in document order.
#[derive(Debug)]
struct SidecarDocument {
    elements: Vec<Element>,
}

impl SidecarDocument {
    fn parse(bytes: &[u8]) -> Result<Self, String> {
        let mut reader = NsReader::from_reader(bytes);
        reader.config_mut().check_end_names = true;
        let mut buf = Vec::new();
        let mut elements: Vec<Element> = Vec::new();
        let mut open: Vec<usize> = Vec::new();
        let mut roots = 0usize;

        loop {
            buf.clear();
            // Tracks the encoding named by the XML declaration once it is read.
            let decoder = reader.decoder();
            let (resolved, event) = reader
                .read_resolved_event_into(&mut buf)
                .map_err(|e| e.to_string())?;
            match event {
                Event::Start(ref e) | Event::Empty(ref e) => {
                    let namespace = match resolved {
                        ResolveResult::Bound(ns) => Some(
                            decoder
                                .decode(ns.as_ref())
                                .map_err(|e| e.to_string())?
                                .into_owned(),
                        ),
                        ResolveResult::Unbound => None,
                        ResolveResult::Unknown(prefix) => {
                            return Err(format!(
                                "undeclared namespace prefix '{}'",
                                String::from_utf8_lossy(&prefix)
                            ))
                        }
                    };
                    let parent = open.last().copied();
                    if parent.is_none() {
                        roots += 1;
                        if roots > 1 {
                            return Err("more than one root element".to_string());
                        }
                    }
                    let local_name = decoder
                        .decode(e.local_name().as_ref())
                        .map_err(|e| e.to_string())?
                        .into_owned();
                    let idx = elements.len();
                    elements.push(Element {
                        namespace,
                        local_name,
                        parent,
                        content: Vec::new(),
                    });
                    if let Some(p) = parent {
                        elements[p].content.push(Content::Child(idx));
                    }
                    if matches!(event, Event::Start(_)) {
                        open.push(idx);
                    }
                }
                Event::End(_) => {
                    open.pop();
                }
                Event::Text(e) => {
                    let text = e.unescape().map_err(|e| e.to_string())?;
                    match open.last() {
                        Some(&idx) => elements[idx].content.push(Content::Text(text.into_owned())),
                        None if text.trim().is_empty() => {}
                        None => return Err("text outside the root element".to_string()),
                    }
                }
                Event::CData(e) => {
                    if let Some(&idx) = open.last() {
                        let text = decoder.decode(&e).map_err(|e| e.to_string())?;
                        elements[idx].content.push(Content::Text(text.into_owned()));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if let Some(&idx) = open.last() {
            return Err(format!(
                "unexpected end of document inside <{}>",
                elements[idx].local_name
            ));
        }
        if elements.is_empty() {
            return Err("document has no root element".to_string());
        }
        Ok(Self { elements })
    }

    /// Concatenated text of an element and all its descendants.
    ///
    /// Walks with an explicit work list; nesting depth is unbounded.
    fn text_content(&self, idx: usize) -> String {
        let mut out = String::new();
        let mut pending: Vec<&Content> = self.elements[idx].content.iter().rev().collect();
        while let Some(content) = pending.pop() {
            match content {
                Content::Text(t) => out.push_str(t),
                Content::Child(c) => pending.extend(self.elements[*c].content.iter().rev()),
            }
        }
        out
    }

    /// First element in document order matched by `expr`.
    fn first_match(&self, expr: &PathExpr) -> Option<usize> {
        (0..self.elements.len()).find(|&idx| self.matches(idx, &expr.steps))
    }

    fn matches(&self, idx: usize, steps: &[Step]) -> bool {
        let Some((last, rest)) = steps.split_last() else {
            return false;
        };
        let element = &self.elements[idx];
        if !last.test.matches(element) {
            return false;
        }
        match last.axis {
            Axis::Child => match element.parent {
                Some(parent) => !rest.is_empty() && self.matches(parent, rest),
                None => rest.is_empty(),
            },
            Axis::Descendant => {
                if rest.is_empty() {
                    return true;
                }
                let mut ancestor = element.parent;
                while let Some(a) = ancestor {
                    if self.matches(a, rest) {
                        return true;
                    }
                    ancestor = self.elements[a].parent;
                }
                false
            }
        }
    }
}

// ============ Path expressions ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Unqualified(String),
    Qualified { namespace: String, local: String },
}

impl NameTest {
    fn matches(&self, element: &Element) -> bool {
        match self {
            NameTest::Any => true,
            NameTest::Unqualified(local) => {
                element.namespace.is_none() && element.local_name == *local
            }
            NameTest::Qualified { namespace, local } => {
                element.namespace.as_deref() == Some(namespace.as_str())
                    && element.local_name == *local
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    test: NameTest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct PathExpr {
    steps: Vec<Step>,
}

impl PathExpr {
    fn parse(expr: &str) -> Result<Self, String> {
        if !expr.starts_with('/') {
            return Err(format!("path '{}' must be absolute", expr));
        }
        let mut steps = Vec::new();
        let mut rest = expr;
        while !rest.is_empty() {
            let axis = if let Some(r) = rest.strip_prefix("//") {
                rest = r;
                Axis::Descendant
            } else if let Some(r) = rest.strip_prefix('/') {
                rest = r;
                Axis::Child
            } else {
                return Err(format!("malformed path '{}'", expr));
            };
            let end = rest.find('/').unwrap_or(rest.len());
            let name = &rest[..end];
            rest = &rest[end..];
            if name.is_empty() {
                return Err(format!("empty step in path '{}'", expr));
            }
            steps.push(Step {
                axis,
                test: parse_name_test(name)?,
            });
        }
        Ok(Self { steps })
    }
}

fn parse_name_test(name: &str) -> Result<NameTest, String> {
    if name == "*" {
        return Ok(NameTest::Any);
    }
    match name.split_once(':') {
        Some((prefix, local)) => {
            let namespace = NAMESPACES
                .iter()
                .find(|(p, _)| *p == prefix)
                .map(|(_, uri)| uri.to_string())
                .ok_or_else(|| format!("unknown namespace prefix '{}'", prefix))?;
            Ok(NameTest::Qualified {
                namespace,
                local: local.to_string(),
            })
        }
        None => Ok(NameTest::Unqualified(name.to_string())),
    }
}
