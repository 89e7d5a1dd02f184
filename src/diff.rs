//! Structural comparison of multi-document YAML.
//!
//! Documents are paired by identity (`apiVersion`, `kind`, namespace and name)
//! rather than by position, so a composed resource that moved in the output
//! stream is not reported as changed. Within a pair, trees are walked key by
//! key and every differing leaf yields one [`Difference`].

use std::collections::{HashMap, HashSet};
use std::io;

use difference::{Changeset, Difference as LineChange};
use serde_yaml::{Mapping, Value};
use termcolor::{Color, ColorSpec, WriteColor};

use crate::document::{self, Document};

/// A single path-level difference between an expected and an actual document.
///
/// `before` is `None` for additions and `after` is `None` for removals. An
/// empty `path` refers to the whole document.
#[derive(Debug, Clone, PartialEq)]
pub struct Difference {
    pub document: String,
    pub path: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

impl Difference {
    pub fn is_addition(&self) -> bool {
        self.before.is_none()
    }

    pub fn is_removal(&self) -> bool {
        self.after.is_none()
    }
}

// ============================================================================
// DOCUMENT PAIRING
// ============================================================================

/// Human-readable identity of a document, e.g.
/// `s3.aws.upbound.io/v1beta1/Bucket/default/my-bucket`.
fn identity(doc: &Document) -> Option<String> {
    let kind = document::kind(doc)?;
    let name = document::name(doc)?;
    let mut id = String::new();
    if let Some(api_version) = document::lookup_str(doc, &["apiVersion"]) {
        id.push_str(api_version);
        id.push('/');
    }
    id.push_str(kind);
    id.push('/');
    if let Some(namespace) = document::lookup_str(doc, &["metadata", "namespace"]) {
        id.push_str(namespace);
        id.push('/');
    }
    id.push_str(name);
    Some(id)
}

/// Assigns every document a unique label: its identity, suffixed with an
/// occurrence counter on repeats, or its position when it has no identity.
fn label_documents(docs: &[Document]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    docs.iter()
        .enumerate()
        .map(|(i, doc)| match identity(doc) {
            Some(id) => {
                let count = seen.entry(id.clone()).or_insert(0);
                *count += 1;
                if *count == 1 {
                    id
                } else {
                    format!("{id} (#{count})")
                }
            }
            None => format!("document #{i}"),
        })
        .collect()
}

/// Compares two document sequences structurally.
///
/// Documents only present in `expected` are reported as whole-document
/// removals, documents only present in `actual` as additions. The result is
/// ordered by expected document order, then by actual order for additions.
pub fn diff_documents(expected: &[Document], actual: &[Document]) -> Vec<Difference> {
    let expected_labels = label_documents(expected);
    let actual_labels = label_documents(actual);
    let actual_by_label: HashMap<&str, &Document> = actual_labels
        .iter()
        .map(String::as_str)
        .zip(actual)
        .collect();
    let expected_set: HashSet<&str> = expected_labels.iter().map(String::as_str).collect();

    let mut out = Vec::new();
    for (label, before) in expected_labels.iter().zip(expected) {
        match actual_by_label.get(label.as_str()) {
            Some(after) => diff_values(label, String::new(), before, after, &mut out),
            None => out.push(Difference {
                document: label.clone(),
                path: String::new(),
                before: Some(before.clone()),
                after: None,
            }),
        }
    }
    for (label, after) in actual_labels.iter().zip(actual) {
        if !expected_set.contains(label.as_str()) {
            out.push(Difference {
                document: label.clone(),
                path: String::new(),
                before: None,
                after: Some(after.clone()),
            });
        }
    }
    out
}

// ============================================================================
// TREE WALK
// ============================================================================

fn key_string(key: &Value) -> String {
    match key {
        Value::String(s) => s.clone(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn push(
    out: &mut Vec<Difference>,
    document: &str,
    path: String,
    before: Option<&Value>,
    after: Option<&Value>,
) {
    out.push(Difference {
        document: document.to_string(),
        path,
        before: before.cloned(),
        after: after.cloned(),
    });
}

fn diff_values(
    document: &str,
    path: String,
    before: &Value,
    after: &Value,
    out: &mut Vec<Difference>,
) {
    match (before, after) {
        (Value::Mapping(a), Value::Mapping(b)) => diff_mappings(document, &path, a, b, out),
        (Value::Sequence(a), Value::Sequence(b)) => diff_sequences(document, &path, a, b, out),
        (Value::Tagged(a), Value::Tagged(b)) if a.tag == b.tag => {
            diff_values(document, path, &a.value, &b.value, out)
        }
        (a, b) if a == b => {}
        (a, b) => push(out, document, path, Some(a), Some(b)),
    }
}

fn diff_mappings(
    document: &str,
    path: &str,
    before: &Mapping,
    after: &Mapping,
    out: &mut Vec<Difference>,
) {
    for (key, a) in before {
        let child = child_path(path, &key_string(key));
        match after.get(key) {
            Some(b) => diff_values(document, child, a, b, out),
            None => push(out, document, child, Some(a), None),
        }
    }
    for (key, b) in after {
        if !before.contains_key(key) {
            push(out, document, child_path(path, &key_string(key)), None, Some(b));
        }
    }
}

/// Returns the `name` of every item when all items are mappings carrying a
/// unique string `name`.
fn named_items(items: &[Value]) -> Option<Vec<&str>> {
    let names: Vec<&str> = items
        .iter()
        .map(|item| item.as_mapping()?.get("name")?.as_str())
        .collect::<Option<_>>()?;
    let unique: HashSet<&str> = names.iter().copied().collect();
    (unique.len() == names.len()).then_some(names)
}

fn diff_sequences(
    document: &str,
    path: &str,
    before: &[Value],
    after: &[Value],
    out: &mut Vec<Difference>,
) {
    if let (Some(before_names), Some(after_names)) = (named_items(before), named_items(after)) {
        if !before.is_empty() && !after.is_empty() {
            let after_by_name: HashMap<&str, &Value> =
                after_names.iter().copied().zip(after).collect();
            for (name, a) in before_names.iter().zip(before) {
                let child = format!("{path}[name={name}]");
                match after_by_name.get(name) {
                    Some(b) => diff_values(document, child, a, b, out),
                    None => push(out, document, child, Some(a), None),
                }
            }
            for (name, b) in after_names.iter().zip(after) {
                if !before_names.contains(name) {
                    push(out, document, format!("{path}[name={name}]"), None, Some(b));
                }
            }
            return;
        }
    }

    for i in 0..before.len().max(after.len()) {
        let child = format!("{path}[{i}]");
        match (before.get(i), after.get(i)) {
            (Some(a), Some(b)) => diff_values(document, child, a, b, out),
            (a, b) => push(out, document, child, a, b),
        }
    }
}

// ============================================================================
// REPORT
// ============================================================================

/// Renders a scalar inline, anything else as a YAML block.
fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) if !s.contains('\n') => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => serde_yaml::to_string(other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_else(|_| format!("{other:?}")),
    }
}

/// A line-oriented changeset for two multi-line strings, or `None` when at
/// least one side is not a multi-line string.
fn line_changes(before: &Value, after: &Value) -> Option<Vec<LineChange>> {
    let (Value::String(a), Value::String(b)) = (before, after) else {
        return None;
    };
    if !a.contains('\n') && !b.contains('\n') {
        return None;
    }
    Some(Changeset::new(a, b, "\n").diffs)
}

/// Writes every line of `text` behind `prefix`, in `color` when given.
fn write_lines(
    out: &mut impl WriteColor,
    color: Option<Color>,
    prefix: &str,
    text: &str,
) -> io::Result<()> {
    for line in text.lines() {
        out.set_color(ColorSpec::new().set_fg(color))?;
        write!(out, "{prefix}{line}")?;
        out.reset()?;
        writeln!(out)?;
    }
    Ok(())
}

const REMOVED: &str = "      - ";
const ADDED: &str = "      + ";
const UNCHANGED: &str = "        ";

/// Writes a report listing every difference: one bold location line, then
/// removed lines in red and added lines in green. Multi-line string changes
/// are shown as a line changeset. A sink without color support gets plain
/// text.
pub fn format_differences(out: &mut impl WriteColor, differences: &[Difference]) -> io::Result<()> {
    for d in differences {
        out.set_color(ColorSpec::new().set_bold(true))?;
        if d.path.is_empty() {
            write!(out, "    {} (document)", d.document)?;
        } else {
            write!(out, "    {}: {}", d.document, d.path)?;
        }
        out.reset()?;
        writeln!(out)?;

        let before = d.before.as_ref();
        let after = d.after.as_ref();
        if let Some(changes) = before.zip(after).and_then(|(a, b)| line_changes(a, b)) {
            for change in changes {
                match change {
                    LineChange::Same(x) => write_lines(out, None, UNCHANGED, &x)?,
                    LineChange::Rem(x) => write_lines(out, Some(Color::Red), REMOVED, &x)?,
                    LineChange::Add(x) => write_lines(out, Some(Color::Green), ADDED, &x)?,
                }
            }
            continue;
        }
        if let Some(before) = before {
            write_lines(out, Some(Color::Red), REMOVED, &render_value(before))?;
        }
        if let Some(after) = after {
            write_lines(out, Some(Color::Green), ADDED, &render_value(after))?;
        }
    }
    Ok(())
}
