//! # Stubsense Core
//!
//! Detect request body fields that change between test runs, and rewrite
//! recorded WireMock stubs so they match despite those changes.
//!
//! Record/replay tests store the requests they send as stubs. Bodies often
//! carry values that differ on every execution (timestamps, generated ids,
//! correlation ids, pagination cursors...), so a stub recorded once no
//! longer matches the next run. This crate:
//!
//! 1. keeps a bounded **history** of the requests of each test
//!    ([`SnapshotStore`]),
//! 2. **compares** the bodies sent to the same endpoint and reports the
//!    leaf values that differ ([`DynamicFieldDetector`]), as JSON, XML or
//!    GraphQL ignore patterns ([`DetectionResult`]),
//! 3. **rewrites** stubs, replacing those values by the placeholders of
//!    the stub matchers ([`placeholder`]).
//!
//! ## Quick Start
//!
//! ```rust
//! use serde_json::json;
//! use stubsense_core::{CapturedRequest, DynamicFieldDetector, TestIdentity};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let root = tempfile::tempdir()?;
//! let detector = DynamicFieldDetector::builder()
//!     .with_storage_root(root.path())
//!     .build()?;
//! let identity = TestIdentity::new("OrderApiTest", "shouldCreateOrder");
//!
//! // After each execution of the test, hand over the requests it sent
//! for created_at in ["2024-01-01T10:00:00Z", "2024-01-02T08:30:00Z"] {
//!     let body = json!({"customer": 42, "created_at": created_at});
//!     let request = CapturedRequest::new("POST", "/orders")
//!         .with_content_type("application/json")
//!         .with_body(body.to_string());
//!     detector.analyze_and_persist(&identity, &[request]);
//! }
//!
//! // At replay time, rewrite the recorded stub
//! let stub = json!({
//!     "request": {
//!         "method": "POST",
//!         "url": "/orders",
//!         "bodyPatterns": [{"equalTo": r#"{"customer":42,"created_at":"2024-01-01T10:00:00Z"}"#}]
//!     },
//!     "response": {"status": 201}
//! });
//! let rewritten = detector.rewriter(&identity, &[]).rewrite(&stub);
//!
//! assert_eq!(
//!     rewritten["request"]["bodyPatterns"][0]["equalToJson"],
//!     json!(r#"{"customer":42,"created_at":"${json-unit.ignore}"}"#)
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage
//!
//! Histories and detection results are JSON files under the storage root
//! (`target/stubsense` by default), one directory per test class:
//!
//! ```text
//! target/stubsense/
//! └── orderapitest/
//!     ├── shouldcreateorder.history.json
//!     └── shouldcreateorder.dynamic-fields.json
//! ```
//!
//! Files are replaced atomically. A corrupt file is logged and treated as
//! missing: detection problems never fail the calling test.
//!
//! ## Ignore Patterns
//!
//! | Body | Pattern | Example |
//! |---|---|---|
//! | JSON | `json:<path>` | `json:order.items[0].created_at` |
//! | XML | `xml:<xpath>` | `xml://*[local-name()='Req']/@*[local-name()='RequestId']` |
//! | GraphQL | `gql:variables.<path>` | `gql:variables.cursor` |
//!
//! Manual patterns can be given to [`PlaceholderRewriter::new`]; they take
//! precedence over detected ones and may use JSONPath wildcards
//! (`json:$.items[*].id`).

mod body;
mod config;
mod detect;
mod error;
mod identity;
mod pattern;
mod result;
mod snapshot;
mod storage;
mod xml_tree;

pub mod placeholder;

pub use self::body::{BodyFormat, classify};
pub use self::config::{DetectorConfig, DynamicFieldDetectorBuilder};
pub use self::detect::{Confidence, DynamicFieldDetector};
pub use self::error::StubsenseError;
pub use self::identity::TestIdentity;
pub use self::pattern::IgnorePattern;
pub use self::placeholder::{PlaceholderRewriter, merge_patterns};
pub use self::result::{DetectionResult, DetectionResultStore, DynamicField};
pub use self::snapshot::{CapturedRequest, RequestSnapshot, SnapshotStore};
