#![allow(dead_code)]

use rstest::fixture;
use serde_json::Value;
use stubsense_core::{CapturedRequest, DynamicFieldDetector, TestIdentity};
use tempfile::TempDir;
use tracing::info;

pub fn init_tracing() {
    // should be run once, fail otherwise, we skip that error
    let _ = tracing_subscriber::fmt()
        .pretty()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();

    info!("Tracing initialized");
}

/// A detector writing into its own temporary storage root.
///
/// The directory is removed when the value is dropped.
pub struct TestStorage {
    pub dir: TempDir,
    pub detector: DynamicFieldDetector,
}

impl TestStorage {
    pub fn identity(&self, method: &str) -> TestIdentity {
        TestIdentity::new("com.acme.OrderApiTest", method)
    }

    /// Runs one test execution sending a single request.
    pub fn execute(&self, identity: &TestIdentity, request: CapturedRequest) {
        self.detector.analyze_and_persist(identity, &[request]);
    }
}

#[fixture]
pub fn storage() -> TestStorage {
    init_tracing();
    let dir = match TempDir::new() {
        Ok(dir) => dir,
        Err(error) => panic!("fail to create storage root: {error:?}"),
    };
    let detector = match DynamicFieldDetector::builder()
        .with_storage_root(dir.path())
        .build()
    {
        Ok(detector) => detector,
        Err(error) => panic!("fail to build detector: {error:?}"),
    };

    TestStorage { dir, detector }
}

pub fn json_request(method: &str, url: &str, body: &Value) -> CapturedRequest {
    CapturedRequest::new(method, url)
        .with_content_type("application/json")
        .with_body(body.to_string())
}

pub fn xml_request(url: &str, body: &str) -> CapturedRequest {
    CapturedRequest::new("POST", url)
        .with_content_type("text/xml; charset=utf-8")
        .with_body(body)
}
