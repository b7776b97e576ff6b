//! Namespace-agnostic XPath subset used by `xml:` ignore patterns.
//!
//! Supported location paths:
//! - `//step/step` matches anywhere in the document, `/step/step` from the root,
//!   a relative `step/step` is treated like `//step/step`
//! - a step is `*`, `*[local-name()='name']` or a plain (possibly prefixed) name,
//!   always compared by local name
//! - a final `@*[local-name()='name']`, `@name` or `@*` selects attributes

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::StubsenseError;
use crate::xml_tree::{XmlElement, XmlNode, is_namespace_declaration, local_name};

static LOCAL_NAME_TEST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\*\[\s*local-name\(\)\s*=\s*(?:'(?<single>[^']+)'|"(?<double>[^"]+)")\s*\]$"#)
        .expect("a valid regex")
});

static QUALIFIED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:[A-Za-z_][\w.\-]*:)?[A-Za-z_][\w.\-]*$").expect("a valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
enum NameTest {
    Any,
    Local(String),
}

impl NameTest {
    fn parse(xpath: &str, step: &str) -> Result<Self, StubsenseError> {
        if step == "*" {
            return Ok(Self::Any);
        }
        if let Some(captures) = LOCAL_NAME_TEST.captures(step) {
            let name = captures
                .name("single")
                .or_else(|| captures.name("double"))
                .map_or("", |name| name.as_str());
            return Ok(Self::Local(local_name(name).to_string()));
        }
        if QUALIFIED_NAME.is_match(step) {
            return Ok(Self::Local(local_name(step).to_string()));
        }

        Err(unsupported(xpath, format!("unsupported step '{step}'")))
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            Self::Any => true,
            Self::Local(expected) => local_name(name) == expected,
        }
    }
}

fn unsupported(xpath: &str, message: impl Into<String>) -> StubsenseError {
    StubsenseError::InvalidPattern {
        pattern: xpath.to_string(),
        message: message.into(),
    }
}

/// Splits on `/` outside of `[...]` predicates.
fn split_steps(path: &str) -> Vec<&str> {
    let mut steps = Vec::new();
    let mut depth = 0_usize;
    let mut start = 0;
    for (index, character) in path.char_indices() {
        match character {
            '[' => depth += 1,
            ']' => depth = depth.saturating_sub(1),
            '/' if depth == 0 => {
                steps.push(path.get(start..index).unwrap_or_default());
                start = index + 1;
            }
            _ => {}
        }
    }
    steps.push(path.get(start..).unwrap_or_default());
    steps
}

/// A parsed `xml:` location path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XmlSelector {
    anywhere: bool,
    steps: Vec<NameTest>,
    attribute: Option<NameTest>,
}

impl XmlSelector {
    pub(crate) fn parse(xpath: &str) -> Result<Self, StubsenseError> {
        let xpath = xpath.trim();
        let (anywhere, path) = if let Some(path) = xpath.strip_prefix("//") {
            (true, path)
        } else if let Some(path) = xpath.strip_prefix('/') {
            (false, path)
        } else {
            (true, xpath)
        };

        let mut steps = Vec::new();
        let mut attribute = None;
        for step in split_steps(path) {
            if attribute.is_some() {
                return Err(unsupported(xpath, "attribute must be the last step"));
            }
            if step.is_empty() {
                return Err(unsupported(xpath, "empty step"));
            }
            match step.strip_prefix('@') {
                Some(name) => attribute = Some(NameTest::parse(xpath, name)?),
                None => steps.push(NameTest::parse(xpath, step)?),
            }
        }
        if steps.is_empty() {
            return Err(unsupported(xpath, "no element step"));
        }

        Ok(Self {
            anywhere,
            steps,
            attribute,
        })
    }

    /// Child-index paths (from `root`) of the selected elements.
    fn select(&self, root: &XmlElement) -> Vec<Vec<usize>> {
        let Some((first, rest)) = self.steps.split_first() else {
            return Vec::new();
        };

        let mut current = Vec::new();
        if self.anywhere {
            collect_matching(root, Vec::new(), first, &mut current);
        } else if first.matches(&root.name) {
            current.push((Vec::new(), root));
        }

        for step in rest {
            let mut next = Vec::new();
            for (indexes, element) in current {
                for (index, child) in element.children.iter().enumerate() {
                    if let XmlNode::Element(child) = child
                        && step.matches(&child.name)
                    {
                        let mut child_indexes = indexes.clone();
                        child_indexes.push(index);
                        next.push((child_indexes, child));
                    }
                }
            }
            current = next;
        }

        current.into_iter().map(|(indexes, _)| indexes).collect()
    }

    /// Replaces the selected values with `placeholder`.
    ///
    /// Element text is only replaced on leaf elements. Returns the number of
    /// replaced values.
    pub(crate) fn apply(&self, root: &mut XmlElement, placeholder: &str) -> usize {
        let mut applied = 0;
        for indexes in self.select(root) {
            let Some(element) = root.descendant_mut(&indexes) else {
                continue;
            };
            match &self.attribute {
                Some(test) => {
                    for (name, value) in &mut element.attributes {
                        if !is_namespace_declaration(name) && test.matches(name) {
                            placeholder.clone_into(value);
                            applied += 1;
                        }
                    }
                }
                None if element.is_leaf() => {
                    element.set_text(placeholder);
                    applied += 1;
                }
                None => debug!(element = %element.name, "skip non-leaf element"),
            }
        }
        applied
    }
}

fn collect_matching<'a>(
    element: &'a XmlElement,
    indexes: Vec<usize>,
    test: &NameTest,
    out: &mut Vec<(Vec<usize>, &'a XmlElement)>,
) {
    if test.matches(&element.name) {
        out.push((indexes.clone(), element));
    }
    for (index, child) in element.children.iter().enumerate() {
        if let XmlNode::Element(child) = child {
            let mut child_indexes = indexes.clone();
            child_indexes.push(index);
            collect_matching(child, child_indexes, test, out);
        }
    }
}
