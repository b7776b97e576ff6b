use indexmap::{IndexMap, IndexSet};
use tracing::debug;

use super::{Confidence, sample_values};
use crate::xml_tree::{XmlElement, is_namespace_declaration, local_name, parse_xml};
use crate::{DynamicField, IgnorePattern};

/// Diff over XML documents of the same endpoint.
///
/// Documents are flattened to `path -> value` maps where paths use local
/// names only: `Envelope/Body/Req` for leaf elements and
/// `Envelope/Body/Req@RequestId` for attributes.
#[derive(Debug, Clone, Copy)]
pub(crate) struct XmlDiffer {
    max_samples: usize,
}

impl XmlDiffer {
    pub(crate) fn new(max_samples: usize) -> Self {
        Self { max_samples }
    }

    pub(crate) fn detect(&self, bodies: &[&str]) -> Vec<DynamicField> {
        let flattened = bodies
            .iter()
            .filter_map(|body| match parse_xml(body) {
                Ok(document) => Some(flatten(&document.root)),
                Err(error) => {
                    debug!(%error, "skip unparsable XML sample");
                    None
                }
            })
            .collect::<Vec<_>>();
        if flattened.len() < 2 {
            return Vec::new();
        }

        let paths = flattened
            .iter()
            .flat_map(IndexMap::keys)
            .collect::<IndexSet<_>>();

        let mut fields = Vec::new();
        for path in paths {
            let values = flattened
                .iter()
                .filter_map(|entries| entries.get(path))
                .collect::<Vec<_>>();
            let Some((first, rest)) = values.split_first() else {
                continue;
            };
            if rest.is_empty() || rest.iter().all(|value| value == first) {
                continue;
            }

            fields.push(DynamicField {
                field_path: IgnorePattern::Xml(xpath(path)).to_string(),
                confidence: Confidence::from_sample_count(values.len()),
                sample_values: sample_values(
                    values.iter().map(|value| (*value).clone()),
                    self.max_samples,
                ),
            });
        }
        fields
    }
}

fn flatten(root: &XmlElement) -> IndexMap<String, String> {
    let mut entries = IndexMap::new();
    flatten_into(root, "", &mut entries);
    entries
}

fn flatten_into(element: &XmlElement, parent: &str, entries: &mut IndexMap<String, String>) {
    let path = if parent.is_empty() {
        element.local_name().to_string()
    } else {
        format!("{parent}/{}", element.local_name())
    };

    for (name, value) in &element.attributes {
        if is_namespace_declaration(name) {
            continue;
        }
        entries.insert(format!("{path}@{}", local_name(name)), value.clone());
    }

    if element.is_leaf() {
        entries.insert(path, element.text());
    } else {
        for child in element.child_elements() {
            flatten_into(child, &path, entries);
        }
    }
}

/// Namespace-agnostic XPath of a flattened path.
///
/// `a/b@c` becomes `//*[local-name()='a']/*[local-name()='b']/@*[local-name()='c']`.
fn xpath(path: &str) -> String {
    let (element_path, attribute) = match path.split_once('@') {
        Some((element_path, attribute)) => (element_path, Some(attribute)),
        None => (path, None),
    };

    let steps = element_path
        .split('/')
        .map(|segment| format!("*[local-name()='{}']", local_name(segment)))
        .collect::<Vec<_>>();
    let mut xpath = format!("//{}", steps.join("/"));

    if let Some(attribute) = attribute {
        xpath.push_str(&format!("/@*[local-name()='{}']", local_name(attribute)));
    }
    xpath
}
