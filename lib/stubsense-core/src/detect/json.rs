use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use super::{Confidence, sample_values};
use crate::{DynamicField, IgnorePattern};

/// Recursive structural diff over JSON documents of the same endpoint.
///
/// Only scalar leaves are reported. Composite values that differ are
/// descended into so a changing timestamp doesn't mask its siblings.
#[derive(Debug, Clone, Copy)]
pub(crate) struct JsonDiffer {
    pattern: fn(String) -> IgnorePattern,
    max_samples: usize,
}

impl JsonDiffer {
    pub(crate) fn new(pattern: fn(String) -> IgnorePattern, max_samples: usize) -> Self {
        Self {
            pattern,
            max_samples,
        }
    }

    /// Reports leaves that differ among `documents`, with paths relative to `base_path`.
    pub(crate) fn detect(&self, documents: &[&Value], base_path: &str) -> Vec<DynamicField> {
        let mut fields = IndexMap::new();
        self.visit(documents, base_path, &mut fields);
        fields.into_values().collect()
    }

    fn visit(&self, nodes: &[&Value], path: &str, out: &mut IndexMap<String, DynamicField>) {
        self.visit_objects(nodes, path, out);
        self.visit_arrays(nodes, path, out);
    }

    fn visit_objects(
        &self,
        nodes: &[&Value],
        path: &str,
        out: &mut IndexMap<String, DynamicField>,
    ) {
        let objects = nodes
            .iter()
            .filter_map(|node| node.as_object())
            .collect::<Vec<_>>();
        if objects.len() < 2 {
            return;
        }

        let names = objects
            .iter()
            .flat_map(|object| object.keys().map(String::as_str))
            .collect::<IndexSet<_>>();

        for name in names {
            let values = objects
                .iter()
                .filter_map(|object| object.get(name))
                .collect::<Vec<_>>();
            if values.len() < 2 {
                continue;
            }
            self.compare(&values, &member_path(path, name), out);
        }
    }

    fn visit_arrays(&self, nodes: &[&Value], path: &str, out: &mut IndexMap<String, DynamicField>) {
        let arrays = nodes
            .iter()
            .filter_map(|node| node.as_array())
            .collect::<Vec<_>>();
        if arrays.len() < 2 {
            return;
        }

        let min_len = arrays.iter().map(|array| array.len()).min().unwrap_or_default();
        for index in 0..min_len {
            let items = arrays
                .iter()
                .filter_map(|array| array.get(index))
                .collect::<Vec<_>>();
            self.compare(&items, &format!("{path}[{index}]"), out);
        }
    }

    fn compare(&self, values: &[&Value], path: &str, out: &mut IndexMap<String, DynamicField>) {
        let Some((first, rest)) = values.split_first() else {
            return;
        };

        if rest.iter().all(|value| value == first) {
            if is_composite(first) {
                self.visit(values, path, out);
            }
            return;
        }

        if values.iter().any(|value| is_composite(value)) {
            self.visit(values, path, out);
            return;
        }

        let pattern = (self.pattern)(path.to_string()).to_string();
        let field = DynamicField {
            field_path: pattern.clone(),
            confidence: Confidence::from_sample_count(values.len()),
            sample_values: sample_values(values.iter().map(|value| text(value)), self.max_samples),
        };
        out.entry(pattern).or_insert(field);
    }
}

fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && chars.all(|next| next.is_ascii_alphanumeric() || next == '_')
}

/// `parent.name`, or `parent['name']` when `name` is not a plain identifier,
/// so the path is always a valid JSONPath once prefixed with `$`.
fn member_path(parent: &str, name: &str) -> String {
    if is_identifier(name) {
        if parent.is_empty() {
            name.to_string()
        } else {
            format!("{parent}.{name}")
        }
    } else {
        format!("{parent}['{}']", escape_member_name(name))
    }
}

/// Escapes a member name for a single-quoted JSONPath name selector.
fn escape_member_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for character in name.chars() {
        match character {
            '\\' => escaped.push_str(r"\\"),
            '\'' => escaped.push_str(r"\'"),
            '\u{8}' => escaped.push_str(r"\b"),
            '\t' => escaped.push_str(r"\t"),
            '\n' => escaped.push_str(r"\n"),
            '\u{c}' => escaped.push_str(r"\f"),
            '\r' => escaped.push_str(r"\r"),
            control if control < '\u{20}' => {
                escaped.push_str(&format!("\\u{:04x}", u32::from(control)));
            }
            other => escaped.push(other),
        }
    }
    escaped
}
