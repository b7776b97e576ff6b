use jsonptr::{Pointer, assign::Assign};
use serde_json::Value;
use serde_json_path::JsonPath;
use tracing::debug;

use super::JSON_IGNORE_PLACEHOLDER;
use crate::{IgnorePattern, StubsenseError};

/// Turns a `json:`/`gql:` path into a JSONPath query.
///
/// Detected paths (`a.b[0]`, `['x-id']`) only need the `$` root; manual
/// patterns may already be full JSONPath expressions with wildcards.
fn to_json_path(path: &str) -> Result<JsonPath, StubsenseError> {
    let expression = if path.starts_with('$') {
        path.to_string()
    } else if path.starts_with('[') {
        format!("${path}")
    } else {
        format!("$.{path}")
    };

    JsonPath::parse(&expression).map_err(|err| StubsenseError::InvalidPattern {
        pattern: path.to_string(),
        message: err.to_string(),
    })
}

/// Replaces every value matched by the JSON and GraphQL patterns with the
/// JSON ignore placeholder.
///
/// Returns the number of replaced values.
pub(crate) fn apply_json_patterns(json: &mut Value, patterns: &[IgnorePattern]) -> usize {
    let mut applied = 0;

    for pattern in patterns {
        let (IgnorePattern::Json(path) | IgnorePattern::GraphQl(path)) = pattern else {
            continue;
        };
        let selector = match to_json_path(path) {
            Ok(selector) => selector,
            Err(error) => {
                debug!(%error, "skip ignore pattern");
                continue;
            }
        };

        let pointers = selector
            .query_located(json)
            .locations()
            .map(|location| location.to_json_pointer())
            .collect::<Vec<_>>();
        if pointers.is_empty() {
            debug!(%pattern, "ignore pattern matches nothing");
        }

        for pointer in pointers {
            let Ok(ptr) = Pointer::parse(&pointer) else {
                debug!(%pointer, "skip invalid JSON pointer");
                continue;
            };
            match json.assign(ptr, Value::String(JSON_IGNORE_PLACEHOLDER.to_string())) {
                Ok(_) => applied += 1,
                Err(error) => debug!(%pointer, %error, "fail to assign placeholder"),
            }
        }
    }

    applied
}
