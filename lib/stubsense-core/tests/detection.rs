//! End-to-end detection over persisted request histories.

use std::fs;

use rstest::rstest;
use serde_json::json;
use stubsense_core::{
    CapturedRequest, Confidence, DetectionResult, DynamicFieldDetector, TestIdentity,
};

mod common;
pub use self::common::*;

fn load_result(storage: &TestStorage, method: &str) -> anyhow::Result<DetectionResult> {
    let identity = storage.identity(method);
    storage
        .detector
        .results()
        .load(&identity)
        .ok_or_else(|| anyhow::anyhow!("no detection result for {identity}"))
}

#[rstest]
fn should_detect_changing_timestamp(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldCreate");

    storage.execute(&identity, json_request("POST", "/x", &json!({"id": 1, "ts": "A"})));
    storage.execute(&identity, json_request("POST", "/x", &json!({"id": 1, "ts": "B"})));

    let result = load_result(&storage, "shouldCreate")?;
    insta::assert_debug_snapshot!(result.dynamic_fields, @r#"
    [
        DynamicField {
            field_path: "json:ts",
            confidence: Medium,
            sample_values: [
                "A",
                "B",
            ],
        },
    ]
    "#);
    assert_eq!(result.ignore_patterns, vec!["json:ts"]);
    assert_eq!(result.test_class_name, "com.acme.OrderApiTest");
    assert_eq!(result.test_method_name, "shouldCreate");
    assert_eq!(result.analyzed_requests_count, 2);

    Ok(())
}

#[rstest]
fn should_detect_nested_leaf_only(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldCreateNested");

    storage.execute(
        &identity,
        json_request("POST", "/orders", &json!({"order": {"id": 1, "meta": {"t": "A"}}})),
    );
    storage.execute(
        &identity,
        json_request("POST", "/orders", &json!({"order": {"id": 1, "meta": {"t": "B"}}})),
    );

    let result = load_result(&storage, "shouldCreateNested")?;
    assert_eq!(result.ignore_patterns, vec!["json:order.meta.t"]);

    Ok(())
}

#[rstest]
fn should_detect_prefixed_xml_attribute(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldCallSoap");

    storage.execute(&identity, xml_request("/ws", r#"<ns4:Req RequestId="R1"/>"#));
    storage.execute(&identity, xml_request("/ws", r#"<ns4:Req RequestId="R2"/>"#));

    let result = load_result(&storage, "shouldCallSoap")?;
    assert_eq!(
        result.ignore_patterns,
        vec!["xml://*[local-name()='Req']/@*[local-name()='RequestId']"]
    );

    Ok(())
}

#[rstest]
fn should_detect_graphql_variables_only(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldPaginate");

    storage.execute(
        &identity,
        json_request(
            "POST",
            "/graphql",
            &json!({
                "query": "query Items($cursor: String) { items(after: $cursor) { id } }",
                "variables": {"cursor": "c1"}
            }),
        ),
    );
    storage.execute(
        &identity,
        json_request(
            "POST",
            "/graphql",
            &json!({
                "query": "query Items($cursor: String) {\n  items(after: $cursor) {\n    id\n  }\n}",
                "variables": {"cursor": "c2"}
            }),
        ),
    );

    let result = load_result(&storage, "shouldPaginate")?;
    assert_eq!(result.ignore_patterns, vec!["gql:variables.cursor"]);

    Ok(())
}

#[rstest]
fn should_not_write_result_for_single_request(storage: TestStorage) {
    let identity = storage.identity("shouldRunOnce");

    storage.execute(&identity, json_request("POST", "/x", &json!({"id": 1, "ts": "A"})));

    assert!(storage.detector.results().load(&identity).is_none());
    assert!(!storage.detector.results().result_path(&identity).exists());
    assert_eq!(storage.detector.snapshots().load(&identity).len(), 1);
}

#[rstest]
fn should_keep_patterns_when_another_endpoint_is_called(
    storage: TestStorage,
) -> anyhow::Result<()> {
    let identity = storage.identity("shouldKeep");
    storage.execute(&identity, json_request("POST", "/x", &json!({"ts": "A"})));
    storage.execute(&identity, json_request("POST", "/x", &json!({"ts": "B"})));
    let before = load_result(&storage, "shouldKeep")?;

    storage.execute(&identity, json_request("POST", "/other", &json!({"ts": "C"})));

    let after = load_result(&storage, "shouldKeep")?;
    assert_eq!(after.ignore_patterns, before.ignore_patterns);

    Ok(())
}

#[rstest]
fn should_raise_confidence_with_more_samples(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldRepeat");

    for ts in ["A", "B", "C", "D"] {
        storage.execute(&identity, json_request("POST", "/x", &json!({"ts": ts})));
    }

    let result = load_result(&storage, "shouldRepeat")?;
    let field = result
        .dynamic_fields
        .first()
        .ok_or_else(|| anyhow::anyhow!("no dynamic field"))?;
    assert_eq!(field.confidence, Confidence::High);
    assert_eq!(field.sample_values, vec!["A", "B", "C"]);
    assert_eq!(result.analyzed_requests_count, 4);

    Ok(())
}

#[rstest]
fn should_cap_history(storage: TestStorage) {
    let identity = storage.identity("shouldCap");

    for index in 0..15 {
        storage.execute(&identity, json_request("POST", "/x", &json!({"n": index})));
    }

    let history = storage.detector.snapshots().load(&identity);
    assert_eq!(history.len(), 10);
    assert_eq!(history.first().and_then(|snapshot| snapshot.body()), Some(r#"{"n":5}"#));
    assert_eq!(history.last().and_then(|snapshot| snapshot.body()), Some(r#"{"n":14}"#));
}

#[rstest]
fn should_recover_from_corrupt_history(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldRecover");
    let history_path = storage.detector.snapshots().history_path(&identity);
    if let Some(parent) = history_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&history_path, "[{\"timestamp\": ")?;

    storage.execute(&identity, json_request("POST", "/x", &json!({"ts": "A"})));
    storage.execute(&identity, json_request("POST", "/x", &json!({"ts": "B"})));

    let result = load_result(&storage, "shouldRecover")?;
    assert_eq!(result.ignore_patterns, vec!["json:ts"]);

    Ok(())
}

#[rstest]
fn should_isolate_sub_indexes(storage: TestStorage) {
    let first = storage.identity("shouldCallTwoTargets").with_sub_index(0);
    let second = storage.identity("shouldCallTwoTargets").with_sub_index(1);

    storage.execute(&first, json_request("POST", "/x", &json!({"ts": "A"})));
    storage.execute(&second, json_request("POST", "/x", &json!({"ts": "B"})));

    assert_eq!(storage.detector.snapshots().load(&first).len(), 1);
    assert_eq!(storage.detector.snapshots().load(&second).len(), 1);
    assert!(storage.detector.load_ignore_patterns(&first).is_empty());
    assert!(storage.detector.load_ignore_patterns(&second).is_empty());
}

#[rstest]
fn should_be_idempotent_on_stable_history(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldBeStable");
    for (ts, user) in [("A", "u1"), ("B", "u2"), ("C", "u3")] {
        storage.execute(
            &identity,
            json_request("POST", "/x", &json!({"user": user, "id": 1, "ts": ts})),
        );
    }
    let history = storage.detector.snapshots().load(&identity);

    let first = storage
        .detector
        .analyze(&identity, &history)
        .ok_or_else(|| anyhow::anyhow!("no result"))?;
    let second = storage
        .detector
        .analyze(&identity, &history)
        .ok_or_else(|| anyhow::anyhow!("no result"))?;

    assert_eq!(first.ignore_patterns, vec!["json:user", "json:ts"]);
    assert_eq!(
        serde_json::to_string(&first.ignore_patterns)?,
        serde_json::to_string(&second.ignore_patterns)?
    );
    assert_eq!(first.dynamic_fields, second.dynamic_fields);

    Ok(())
}

#[rstest]
fn should_only_report_leaves(storage: TestStorage) -> anyhow::Result<()> {
    let identity = storage.identity("shouldReportLeaves");
    let bodies = [
        json!({"a": {"b": [1, {"c": "x"}]}, "d": [1, 2], "e": {"f": null}}),
        json!({"a": {"b": [2, {"c": "y"}]}, "d": {"k": 1}, "e": {"f": true}}),
        json!({"a": "flat", "d": [1, 3], "e": {"f": "z"}}),
    ];
    for body in &bodies {
        storage.execute(&identity, json_request("POST", "/x", body));
    }

    let result = load_result(&storage, "shouldReportLeaves")?;
    assert_eq!(
        result.ignore_patterns,
        vec!["json:a.b[0]", "json:a.b[1].c", "json:d[1]", "json:e.f"]
    );
    for pattern in &result.ignore_patterns {
        let path = pattern.trim_start_matches("json:");
        let pointer = format!(
            "/{}",
            path.replace('[', "/").replace(']', "").replace('.', "/")
        );
        for body in &bodies {
            let value = body.pointer(&pointer);
            assert!(
                !value.is_some_and(|value| value.is_object() || value.is_array()),
                "{pattern} is composite in {body}"
            );
        }
    }

    Ok(())
}

#[rstest]
#[case::json(
    json_request("POST", "/x", &json!({"ts": "A"})),
    json_request("POST", "/x", &json!({"ts": "B"}))
)]
#[case::xml(xml_request("/ws", "<a><t>1</t></a>"), xml_request("/ws", "<a><t>2</t></a>"))]
fn should_need_two_requests_on_the_same_endpoint(
    storage: TestStorage,
    #[case] first: CapturedRequest,
    #[case] second: CapturedRequest,
) {
    let identity = storage.identity("shouldNeedEvidence");

    storage.execute(&identity, first.clone());
    assert!(storage.detector.load_ignore_patterns(&identity).is_empty());

    storage.execute(&identity, second);
    assert_eq!(storage.detector.load_ignore_patterns(&identity).len(), 1);
}

#[test]
fn should_share_detector_between_threads() -> anyhow::Result<()> {
    init_tracing();
    let dir = tempfile::TempDir::new()?;
    let detector = DynamicFieldDetector::builder()
        .with_storage_root(dir.path())
        .build()?;

    std::thread::scope(|scope| {
        for thread in 0..4 {
            let detector = &detector;
            scope.spawn(move || {
                let identity = TestIdentity::new("ParallelTest", format!("test{thread}"));
                for run in 0..3 {
                    let body = json!({"thread": thread, "run": run});
                    let request = json_request("POST", "/x", &body);
                    detector.analyze_and_persist(&identity, &[request]);
                }
            });
        }
    });

    for thread in 0..4 {
        let identity = TestIdentity::new("ParallelTest", format!("test{thread}"));
        assert_eq!(detector.load_ignore_patterns(&identity), vec!["json:run"]);
    }

    Ok(())
}
