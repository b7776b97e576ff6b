//! GraphQL requests are JSON bodies with a top-level `query`.
//!
//! Only their `variables` are compared: the query text is the same
//! operation re-sent and must never be reported, whatever its formatting.
//! Requests naming different operations (`operationName`) on the same
//! endpoint are compared separately.

use indexmap::IndexMap;
use serde_json::Value;

use super::json::JsonDiffer;
use crate::{DynamicField, IgnorePattern};

const QUERY: &str = "query";
const VARIABLES: &str = "variables";
const OPERATION_NAME: &str = "operationName";

pub(crate) fn is_graphql(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|object| object.contains_key(QUERY))
}

/// The explicit `operationName` of a GraphQL request, if any.
fn operation_name(document: &Value) -> Option<&str> {
    document
        .get(OPERATION_NAME)
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

pub(crate) fn detect(documents: &[&Value], max_samples: usize) -> Vec<DynamicField> {
    let mut operations: IndexMap<Option<&str>, Vec<&Value>> = IndexMap::new();
    for &document in documents {
        operations
            .entry(operation_name(document))
            .or_default()
            .push(document);
    }

    let differ = JsonDiffer::new(IgnorePattern::GraphQl, max_samples);
    operations
        .values()
        .filter(|requests| requests.len() >= 2)
        .flat_map(|requests| {
            let variables = requests
                .iter()
                .filter_map(|request| request.get(VARIABLES))
                .collect::<Vec<_>>();
            differ.detect(&variables, VARIABLES)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn patterns(fields: &[DynamicField]) -> Vec<&str> {
        fields.iter().map(|field| field.field_path.as_str()).collect()
    }

    #[test]
    fn should_recognize_graphql_body() {
        assert!(is_graphql(&json!({"query": "{ me { id } }"})));
        assert!(!is_graphql(&json!({"variables": {}})));
        assert!(!is_graphql(&json!([{"query": "{ me { id } }"}])));
    }

    #[test]
    fn should_detect_variables_only() {
        let first = json!({
            "query": "query Items($cursor: String) { items(after: $cursor) { id } }",
            "variables": {"cursor": "abc", "first": 10}
        });
        let second = json!({
            "query": "query Items($cursor: String) {\n  items(after: $cursor) { id }\n}",
            "variables": {"cursor": "def", "first": 10}
        });

        let fields = detect(&[&first, &second], 3);

        assert_eq!(patterns(&fields), vec!["gql:variables.cursor"]);
    }

    #[test]
    fn should_detect_nested_variables() {
        let first = json!({
            "query": "mutation M { m }",
            "variables": {"input": {"ts": 1, "name": "x"}}
        });
        let second = json!({
            "query": "mutation M { m }",
            "variables": {"input": {"ts": 2, "name": "x"}}
        });

        let fields = detect(&[&first, &second], 3);

        assert_eq!(patterns(&fields), vec!["gql:variables.input.ts"]);
    }

    #[test]
    fn should_ignore_query_token_spacing() {
        let first = json!({"query": "{a}", "variables": {"cursor": "c1"}});
        let second = json!({"query": "{ a }", "variables": {"cursor": "c2"}});

        let fields = detect(&[&first, &second], 3);

        assert_eq!(patterns(&fields), vec!["gql:variables.cursor"]);
    }

    #[test]
    fn should_compare_unnamed_operations_with_different_queries() {
        let first = json!({"query": "query Items { items { id } }", "variables": {"page": 1}});
        let second = json!({
            "query": "query Items { items { id __typename } }",
            "variables": {"page": 2}
        });

        let fields = detect(&[&first, &second], 3);

        assert_eq!(patterns(&fields), vec!["gql:variables.page"]);
    }

    #[test]
    fn should_not_compare_distinct_operation_names() {
        let first = json!({"query": "query A { a }", "operationName": "A", "variables": {"id": 1}});
        let second = json!({
            "query": "query B { b }",
            "operationName": "B",
            "variables": {"id": 2}
        });

        let fields = detect(&[&first, &second], 3);

        assert!(fields.is_empty());
    }

    #[test]
    fn should_group_by_operation_name() {
        let first = json!({"query": "query A { a }", "operationName": "A", "variables": {"id": 1}});
        let second = json!({
            "query": "query A { a b }",
            "operationName": "A",
            "variables": {"id": 2}
        });

        let fields = detect(&[&first, &second], 3);

        assert_eq!(patterns(&fields), vec!["gql:variables.id"]);
    }
}
