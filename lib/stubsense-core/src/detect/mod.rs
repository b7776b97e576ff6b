//! Detection of dynamic fields in request histories.
//!
//! Requests of a history are grouped by endpoint (HTTP method and URL).
//! Within each group with at least two requests, bodies are classified and
//! compared structurally:
//!
//! - JSON bodies are diffed recursively, see `json:` patterns
//! - GraphQL bodies (JSON with a `query`) only have their `variables`
//!   diffed, per `operationName` when set, see `gql:` patterns
//! - XML bodies are flattened and diffed by namespace-agnostic path, see
//!   `xml:` patterns
//!
//! Only leaf values are reported. Bodies that fail to parse are skipped.

use indexmap::IndexMap;
use jiff::Timestamp;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::placeholder::PlaceholderRewriter;
use crate::{
    BodyFormat, CapturedRequest, DetectionResult, DetectionResultStore, DetectorConfig,
    DynamicField, DynamicFieldDetectorBuilder, IgnorePattern, RequestSnapshot, SnapshotStore,
    StubsenseError, TestIdentity, classify,
};

mod confidence;
mod graphql;
mod json;
mod xml;

pub use self::confidence::Confidence;
use self::json::JsonDiffer;
use self::xml::XmlDiffer;

/// Distinct values, in first-seen order, at most `max`.
pub(crate) fn sample_values(values: impl IntoIterator<Item = String>, max: usize) -> Vec<String> {
    let mut samples = Vec::new();
    for value in values {
        if samples.len() >= max {
            break;
        }
        if !samples.contains(&value) {
            samples.push(value);
        }
    }
    samples
}

/// Finds request body fields that change between executions of a test.
///
/// The detector owns the history and result stores of a storage root. It
/// is cheap to clone and can be shared between threads; concurrent calls
/// for the *same* [`TestIdentity`] must be serialized by the caller.
///
/// # Example
///
/// ```rust
/// use stubsense_core::{CapturedRequest, DynamicFieldDetector, TestIdentity};
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let root = tempfile::tempdir()?;
/// let detector = DynamicFieldDetector::builder()
///     .with_storage_root(root.path())
///     .build()?;
/// let identity = TestIdentity::new("OrderTest", "create");
///
/// for ts in ["A", "B"] {
///     let request = CapturedRequest::new("POST", "/orders")
///         .with_content_type("application/json")
///         .with_body(format!(r#"{{"id": 1, "ts": "{ts}"}}"#));
///     detector.analyze_and_persist(&identity, &[request]);
/// }
///
/// assert_eq!(detector.load_ignore_patterns(&identity), vec!["json:ts"]);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct DynamicFieldDetector {
    config: DetectorConfig,
    snapshots: SnapshotStore,
    results: DetectionResultStore,
}

impl Default for DynamicFieldDetector {
    fn default() -> Self {
        let config = DetectorConfig::default();
        Self {
            snapshots: SnapshotStore::new(config.storage_root(), config.history_limit()),
            results: DetectionResultStore::new(config.storage_root()),
            config,
        }
    }
}

impl DynamicFieldDetector {
    /// Creates a detector from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, see [`DetectorConfig::validate`].
    pub fn new(config: DetectorConfig) -> Result<Self, StubsenseError> {
        config.validate()?;

        Ok(Self {
            snapshots: SnapshotStore::new(config.storage_root(), config.history_limit()),
            results: DetectionResultStore::new(config.storage_root()),
            config,
        })
    }

    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn builder() -> DynamicFieldDetectorBuilder {
        DynamicFieldDetectorBuilder::default()
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// The request history store.
    #[must_use]
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// The detection result store.
    #[must_use]
    pub fn results(&self) -> &DetectionResultStore {
        &self.results
    }

    /// Tracks the requests of one test execution, then refreshes the
    /// detection result of the test.
    ///
    /// The detection runs on the whole (capped) history once it holds at
    /// least two requests. A result is only written when a dynamic field
    /// was found. Never fails: every problem is logged.
    pub fn analyze_and_persist(&self, identity: &TestIdentity, requests: &[CapturedRequest]) {
        self.snapshots.track_all(identity, requests);

        let history = self.snapshots.load(identity);
        if history.len() < 2 {
            debug!(%identity, history = history.len(), "not enough requests to compare");
            return;
        }

        let Some(result) = self.analyze(identity, &history) else {
            debug!(%identity, history = history.len(), "no dynamic field detected");
            return;
        };

        match self.results.save(identity, &result) {
            Ok(()) => info!(
                %identity,
                fields = result.dynamic_fields.len(),
                requests = result.analyzed_requests_count,
                "dynamic fields detected"
            ),
            Err(error) => warn!(%identity, %error, "fail to save detection result"),
        }
    }

    /// Detects the dynamic fields of a history, without touching the stores.
    ///
    /// Returns `None` if no dynamic field was found.
    #[must_use]
    pub fn analyze(
        &self,
        identity: &TestIdentity,
        history: &[RequestSnapshot],
    ) -> Option<DetectionResult> {
        let mut endpoints: IndexMap<(String, &str), Vec<&RequestSnapshot>> = IndexMap::new();
        for snapshot in history {
            endpoints
                .entry((snapshot.method().to_ascii_uppercase(), snapshot.url()))
                .or_default()
                .push(snapshot);
        }

        let mut fields = IndexMap::new();
        for ((method, url), snapshots) in &endpoints {
            if snapshots.len() < 2 {
                continue;
            }
            let detected = self.detect_endpoint(snapshots);
            debug!(
                %identity,
                %method,
                %url,
                requests = snapshots.len(),
                fields = detected.len(),
                "endpoint analyzed"
            );
            for field in detected {
                fields.entry(field.field_path.clone()).or_insert(field);
            }
        }

        if fields.is_empty() {
            return None;
        }

        let dynamic_fields = fields.into_values().collect::<Vec<_>>();
        let ignore_patterns = dynamic_fields
            .iter()
            .map(|field| field.field_path.clone())
            .collect();

        Some(DetectionResult {
            test_class_name: identity.class_name().to_string(),
            test_method_name: identity.method_name().to_string(),
            sub_index: identity.sub_index(),
            detected_at: Timestamp::now(),
            analyzed_requests_count: history.len(),
            dynamic_fields,
            ignore_patterns,
        })
    }

    fn detect_endpoint(&self, snapshots: &[&RequestSnapshot]) -> Vec<DynamicField> {
        let max_samples = self.config.max_sample_values();

        let mut documents = Vec::new();
        let mut xml_bodies = Vec::new();
        for snapshot in snapshots {
            let Some(body) = snapshot.body() else {
                continue;
            };
            match classify(snapshot.content_type(), Some(body)) {
                BodyFormat::Json => match serde_json::from_str::<Value>(body) {
                    Ok(document) => documents.push(document),
                    Err(error) => debug!(%error, "skip unparsable JSON sample"),
                },
                BodyFormat::Xml => xml_bodies.push(body),
                BodyFormat::Unknown => {}
            }
        }

        let (graphql, plain): (Vec<&Value>, Vec<&Value>) =
            documents.iter().partition(|document| graphql::is_graphql(document));

        let mut fields = Vec::new();
        if plain.len() >= 2 {
            fields.extend(JsonDiffer::new(IgnorePattern::Json, max_samples).detect(&plain, ""));
        }
        if graphql.len() >= 2 {
            fields.extend(graphql::detect(&graphql, max_samples));
        }
        if xml_bodies.len() >= 2 {
            fields.extend(XmlDiffer::new(max_samples).detect(&xml_bodies));
        }
        fields
    }

    /// The auto-detected ignore patterns of `identity`, empty if none.
    #[must_use]
    pub fn load_ignore_patterns(&self, identity: &TestIdentity) -> Vec<String> {
        self.results.load_ignore_patterns(identity)
    }

    /// A stub rewriter combining the auto-detected patterns of `identity`
    /// with `manual` ones.
    #[must_use]
    pub fn rewriter(&self, identity: &TestIdentity, manual: &[String]) -> PlaceholderRewriter {
        PlaceholderRewriter::for_identity(&self.results, identity, manual)
    }

    /// Forgets the history and the detection result of `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self, identity: &TestIdentity) -> Result<(), StubsenseError> {
        self.snapshots.clear(identity)?;
        self.results.clear(identity)
    }
}
