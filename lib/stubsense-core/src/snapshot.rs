//! Bounded request history per test identity.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::storage::{read_json, remove_file, write_json_atomic};
use crate::{StubsenseError, TestIdentity};

const HISTORY_KIND: &str = "history";

/// A request observed by the record/replay engine during a test execution.
///
/// This is the input of [`DynamicFieldDetector::analyze_and_persist`](crate::DynamicFieldDetector::analyze_and_persist).
///
/// # Example
///
/// ```rust
/// use stubsense_core::CapturedRequest;
///
/// let request = CapturedRequest::new("POST", "/orders")
///     .with_body(r#"{"id": 1}"#)
///     .with_content_type("application/json");
/// assert_eq!(request.method(), "POST");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRequest {
    method: String,
    url: String,
    body: Option<String>,
    content_type: Option<String>,
}

impl CapturedRequest {
    /// Creates a request without body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: None,
            content_type: None,
        }
    }

    /// Sets the raw request body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Sets the `Content-Type` header value.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// One captured request at a point in time, as stored in the history file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSnapshot {
    timestamp: Timestamp,
    url: String,
    method: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
}

impl RequestSnapshot {
    /// Snapshots a request, timestamped now.
    #[must_use]
    pub fn capture(request: &CapturedRequest) -> Self {
        Self {
            timestamp: Timestamp::now(),
            url: request.url.clone(),
            method: request.method.clone(),
            body: request.body.clone(),
            content_type: request.content_type.clone(),
        }
    }

    /// When the request was tracked.
    #[must_use]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// The request URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The HTTP method.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The raw body.
    #[must_use]
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// The `Content-Type` header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }
}

/// File-backed history of request snapshots, one file per [`TestIdentity`].
///
/// The history is never cached: every call reads the file again, so
/// executions in separate processes see each other's snapshots. Writers
/// for the same identity must be serialized by the caller.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    root: PathBuf,
    history_limit: usize,
}

impl SnapshotStore {
    /// Creates a store writing under `root` and keeping at most
    /// `history_limit` snapshots per identity.
    pub fn new(root: impl Into<PathBuf>, history_limit: usize) -> Self {
        Self {
            root: root.into(),
            history_limit,
        }
    }

    /// The directory holding the history files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The maximum number of snapshots kept per identity.
    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// The history file of an identity.
    #[must_use]
    pub fn history_path(&self, identity: &TestIdentity) -> PathBuf {
        identity.artifact_path(&self.root, HISTORY_KIND)
    }

    /// Appends a request to the history of `identity`.
    ///
    /// Failures are logged and swallowed: losing one snapshot must not fail
    /// the test run.
    pub fn track(&self, identity: &TestIdentity, request: &CapturedRequest) {
        self.track_all(identity, std::slice::from_ref(request));
    }

    /// Appends several requests with a single read and write of the file.
    pub fn track_all(&self, identity: &TestIdentity, requests: &[CapturedRequest]) {
        if let Err(error) = self.try_track_all(identity, requests) {
            warn!(%identity, %error, "fail to track requests, snapshots are lost");
        }
    }

    /// Appends requests, then truncates and saves the history.
    ///
    /// Returns the history as written.
    ///
    /// # Errors
    ///
    /// Returns an error if the history file cannot be written. An existing
    /// but corrupt file is replaced.
    pub fn try_track_all(
        &self,
        identity: &TestIdentity,
        requests: &[CapturedRequest],
    ) -> Result<Vec<RequestSnapshot>, StubsenseError> {
        if requests.is_empty() {
            return Ok(self.load(identity));
        }

        let mut history = self.load(identity);
        history.extend(requests.iter().map(RequestSnapshot::capture));

        let overflow = history.len().saturating_sub(self.history_limit);
        if overflow > 0 {
            debug!(%identity, overflow, "evict oldest snapshots");
            history.drain(..overflow);
        }

        write_json_atomic(&self.history_path(identity), &history)?;
        Ok(history)
    }

    /// Loads the history of `identity`, oldest first.
    ///
    /// A missing, unreadable or corrupt file is an empty history.
    #[must_use]
    pub fn load(&self, identity: &TestIdentity) -> Vec<RequestSnapshot> {
        let path = self.history_path(identity);
        match read_json::<Vec<RequestSnapshot>>(&path) {
            Ok(history) => history.unwrap_or_default(),
            Err(error) => {
                warn!(%identity, %error, "ignore unreadable history");
                Vec::new()
            }
        }
    }

    /// Deletes the history of `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self, identity: &TestIdentity) -> Result<(), StubsenseError> {
        remove_file(&self.history_path(identity))
    }
}
