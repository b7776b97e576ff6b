//! Rewriting of recorded WireMock stubs with ignore placeholders.
//!
//! A stub matches a request body with `bodyPatterns`. Literal `equalTo`
//! matchers are turned into structural ones so that placeholders are
//! honored, then every value located by an ignore pattern is replaced:
//!
//! | Body | Matcher | Placeholder | Added flags |
//! |---|---|---|---|
//! | JSON | `equalToJson` | `${json-unit.ignore}` | `ignoreArrayOrder`, `ignoreExtraElements` |
//! | XML | `equalToXml` | `${xmlunit.ignore}` | `enablePlaceholders` |
//!
//! Anything that cannot be understood is left untouched: a stub is never
//! made invalid by the rewrite.
//!
//! # Example
//!
//! ```rust
//! use serde_json::json;
//! use stubsense_core::placeholder::PlaceholderRewriter;
//!
//! let stub = json!({
//!     "request": {
//!         "method": "POST",
//!         "url": "/orders",
//!         "bodyPatterns": [{"equalTo": r#"{"id":1,"ts":"2024-01-01"}"#}]
//!     },
//!     "response": {"status": 201}
//! });
//!
//! let rewriter = PlaceholderRewriter::new(&["json:ts".to_string()], &[]);
//! let rewritten = rewriter.rewrite(&stub);
//!
//! assert_eq!(
//!     rewritten["request"]["bodyPatterns"][0],
//!     json!({
//!         "equalToJson": r#"{"id":1,"ts":"${json-unit.ignore}"}"#,
//!         "ignoreArrayOrder": true,
//!         "ignoreExtraElements": true
//!     })
//! );
//! ```

use std::io::{self, ErrorKind};
use std::path::Path;

use indexmap::IndexSet;
use serde_json::{Map, Value};
use tracing::debug;

use crate::storage::read_json;
use crate::{
    BodyFormat, DetectionResultStore, IgnorePattern, StubsenseError, TestIdentity, classify,
};

mod json;
mod selector;
mod xml;

use self::json::apply_json_patterns;
use self::xml::rewrite_xml_body;

/// Placeholder understood by JSON matchers.
pub const JSON_IGNORE_PLACEHOLDER: &str = "${json-unit.ignore}";

/// Placeholder understood by XML matchers with placeholders enabled.
pub const XML_IGNORE_PLACEHOLDER: &str = "${xmlunit.ignore}";

const MAPPINGS: &str = "mappings";
const REQUEST: &str = "request";
const BODY_PATTERNS: &str = "bodyPatterns";
const EQUAL_TO: &str = "equalTo";
const EQUAL_TO_JSON: &str = "equalToJson";
const EQUAL_TO_XML: &str = "equalToXml";
const IGNORE_ARRAY_ORDER: &str = "ignoreArrayOrder";
const IGNORE_EXTRA_ELEMENTS: &str = "ignoreExtraElements";
const ENABLE_PLACEHOLDERS: &str = "enablePlaceholders";

/// Combines auto-detected and manual patterns.
///
/// Manual patterns win on conflict: an auto-detected pattern also given
/// manually is dropped from the auto-detected part and the manual patterns
/// are appended, in their own order. Duplicates are removed.
#[must_use]
pub fn merge_patterns(auto_detected: &[String], manual: &[String]) -> Vec<String> {
    let manual = manual.iter().collect::<IndexSet<_>>();
    let auto_detected = auto_detected
        .iter()
        .filter(|pattern| !manual.contains(pattern))
        .collect::<IndexSet<_>>();

    auto_detected
        .into_iter()
        .chain(manual)
        .cloned()
        .collect()
}

/// Returns a rewritten copy of a stub document.
///
/// `document` is a single stub (`{"request": ...}`), a stub file holding
/// several stubs (`{"mappings": [...]}`) or a bare request matcher
/// (`{"bodyPatterns": [...]}`). Unparsable patterns are skipped. The input
/// is never modified.
#[must_use]
pub fn rewrite(document: &Value, patterns: &[String]) -> Value {
    let patterns = PatternsByFormat::parse(patterns);
    let mut rewritten = document.clone();

    for request in request_matchers_mut(&mut rewritten) {
        let Some(Value::Array(body_patterns)) = request.get_mut(BODY_PATTERNS) else {
            continue;
        };
        for body_pattern in body_patterns {
            if let Value::Object(matcher) = body_pattern {
                rewrite_body_pattern(matcher, &patterns);
            }
        }
    }

    rewritten
}

/// Reads a stub file and returns a rewritten copy of it.
///
/// The file itself is never written: recorded stubs stay byte-stable
/// across replays.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not JSON.
pub fn rewrite_file(path: &Path, patterns: &[String]) -> Result<Value, StubsenseError> {
    let document: Value = read_json(path)?.ok_or_else(|| {
        io::Error::new(
            ErrorKind::NotFound,
            format!("stub file '{}' not found", path.display()),
        )
    })?;
    debug!(file = %path.display(), patterns = patterns.len(), "rewrite stub file");

    Ok(rewrite(&document, patterns))
}

/// Parsed ignore patterns, split by the body format they apply to.
#[derive(Debug, Default)]
struct PatternsByFormat {
    json: Vec<IgnorePattern>,
    xml: Vec<IgnorePattern>,
}

impl PatternsByFormat {
    fn parse(patterns: &[String]) -> Self {
        let mut result = Self::default();
        for pattern in patterns {
            let pattern = match IgnorePattern::parse(pattern) {
                Ok(pattern) => pattern,
                Err(error) => {
                    debug!(%error, "skip ignore pattern");
                    continue;
                }
            };
            match pattern.format() {
                BodyFormat::Json => result.json.push(pattern),
                BodyFormat::Xml => result.xml.push(pattern),
                BodyFormat::Unknown => {}
            }
        }
        result
    }

    fn for_format(&self, format: BodyFormat) -> &[IgnorePattern] {
        match format {
            BodyFormat::Json => &self.json,
            BodyFormat::Xml => &self.xml,
            BodyFormat::Unknown => &[],
        }
    }
}

fn request_matchers_mut(document: &mut Value) -> Vec<&mut Map<String, Value>> {
    let Value::Object(root) = document else {
        return Vec::new();
    };

    if root.contains_key(MAPPINGS) {
        return match root.get_mut(MAPPINGS) {
            Some(Value::Array(mappings)) => mappings
                .iter_mut()
                .filter_map(|mapping| mapping.get_mut(REQUEST))
                .filter_map(Value::as_object_mut)
                .collect(),
            _ => Vec::new(),
        };
    }
    if root.contains_key(REQUEST) {
        return root
            .get_mut(REQUEST)
            .and_then(Value::as_object_mut)
            .into_iter()
            .collect();
    }

    vec![root]
}

fn rewrite_body_pattern(matcher: &mut Map<String, Value>, patterns: &PatternsByFormat) {
    if let Some(Value::String(literal)) = matcher.get(EQUAL_TO) {
        let literal = literal.clone();
        rewrite_literal(matcher, &literal, patterns);
        return;
    }

    if let Some(expected) = matcher.get_mut(EQUAL_TO_JSON) {
        match expected {
            Value::String(text) => match serde_json::from_str::<Value>(text) {
                Ok(mut body) => {
                    apply_json_patterns(&mut body, patterns.for_format(BodyFormat::Json));
                    *text = body.to_string();
                }
                Err(error) => debug!(%error, "keep unparsable equalToJson"),
            },
            body => {
                apply_json_patterns(body, patterns.for_format(BodyFormat::Json));
            }
        }
        return;
    }

    if let Some(Value::String(text)) = matcher.get_mut(EQUAL_TO_XML) {
        match rewrite_xml_body(text, patterns.for_format(BodyFormat::Xml)) {
            Ok(body) => *text = body,
            Err(error) => {
                debug!(%error, "keep unparsable equalToXml");
                return;
            }
        }
        matcher.insert(ENABLE_PLACEHOLDERS.to_string(), Value::Bool(true));
    }
}

/// Converts a literal `equalTo` into a structural matcher.
fn rewrite_literal(matcher: &mut Map<String, Value>, literal: &str, patterns: &PatternsByFormat) {
    let format = classify(None, Some(literal));
    match format {
        BodyFormat::Json => match serde_json::from_str::<Value>(literal) {
            Ok(mut body) => {
                apply_json_patterns(&mut body, patterns.for_format(format));
                rename_key(matcher, EQUAL_TO, EQUAL_TO_JSON, Value::String(body.to_string()));
                matcher.insert(IGNORE_ARRAY_ORDER.to_string(), Value::Bool(true));
                matcher.insert(IGNORE_EXTRA_ELEMENTS.to_string(), Value::Bool(true));
            }
            Err(error) => debug!(%error, "keep equalTo with non JSON body"),
        },
        BodyFormat::Xml => match rewrite_xml_body(literal, patterns.for_format(format)) {
            Ok(body) => {
                rename_key(matcher, EQUAL_TO, EQUAL_TO_XML, Value::String(body));
                matcher.insert(ENABLE_PLACEHOLDERS.to_string(), Value::Bool(true));
            }
            Err(error) => debug!(%error, "keep equalTo with non XML body"),
        },
        BodyFormat::Unknown => {}
    }
}

/// Replaces the `from` entry with `to`, at the same position.
fn rename_key(matcher: &mut Map<String, Value>, from: &str, to: &str, value: Value) {
    let entries = std::mem::take(matcher);
    *matcher = entries
        .into_iter()
        .map(|(key, current)| {
            if key == from {
                (to.to_string(), value.clone())
            } else {
                (key, current)
            }
        })
        .collect();
}

/// Rewrites stubs with the ignore patterns of a test.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaceholderRewriter {
    patterns: Vec<String>,
}

impl PlaceholderRewriter {
    /// Creates a rewriter from auto-detected and manual patterns, see [`merge_patterns`].
    #[must_use]
    pub fn new(auto_detected: &[String], manual: &[String]) -> Self {
        Self {
            patterns: merge_patterns(auto_detected, manual),
        }
    }

    /// Creates a rewriter from the stored detection result of `identity`.
    #[must_use]
    pub fn for_identity(
        store: &DetectionResultStore,
        identity: &TestIdentity,
        manual: &[String],
    ) -> Self {
        let auto_detected = store.load_ignore_patterns(identity);
        debug!(%identity, count = auto_detected.len(), "loaded auto-detected patterns");
        Self::new(&auto_detected, manual)
    }

    /// The merged patterns.
    #[must_use]
    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }

    /// See [`rewrite`].
    #[must_use]
    pub fn rewrite(&self, document: &Value) -> Value {
        rewrite(document, &self.patterns)
    }

    /// See [`rewrite_file`].
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not JSON.
    pub fn rewrite_file(&self, path: &Path) -> Result<Value, StubsenseError> {
        rewrite_file(path, &self.patterns)
    }
}
