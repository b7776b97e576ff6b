//! Detection results and their persistence.

use std::path::{Path, PathBuf};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::detect::Confidence;
use crate::storage::{read_json, remove_file, write_json_atomic};
use crate::{StubsenseError, TestIdentity};

const RESULT_KIND: &str = "dynamic-fields";

/// A leaf value observed to differ across repeated requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicField {
    /// The ignore pattern locating the field, e.g. `json:order.meta.t`.
    pub field_path: String,
    /// Evidence level, derived from the number of compared samples.
    pub confidence: Confidence,
    /// A few of the observed values, distinct, in observation order.
    pub sample_values: Vec<String>,
}

/// Dynamic fields detected for one test identity.
///
/// A result is replaced as a whole by every detection run that finds at
/// least one field; a run finding nothing leaves the previous one in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    /// The test class.
    pub test_class_name: String,
    /// The test method.
    pub test_method_name: String,
    /// The target sub-index, for tests with several targets.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_index: Option<u32>,
    /// When the detection ran.
    pub detected_at: Timestamp,
    /// Size of the history the detection was computed from.
    pub analyzed_requests_count: usize,
    /// The detected fields.
    pub dynamic_fields: Vec<DynamicField>,
    /// The patterns of [`dynamic_fields`](Self::dynamic_fields), deduplicated, in detection order.
    pub ignore_patterns: Vec<String>,
}

/// File-backed store of [`DetectionResult`]s, one file per [`TestIdentity`].
#[derive(Debug, Clone)]
pub struct DetectionResultStore {
    root: PathBuf,
}

impl DetectionResultStore {
    /// Creates a store writing under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory holding the result files.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The result file of an identity.
    #[must_use]
    pub fn result_path(&self, identity: &TestIdentity) -> PathBuf {
        identity.artifact_path(&self.root, RESULT_KIND)
    }

    /// Replaces the stored result of `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(
        &self,
        identity: &TestIdentity,
        result: &DetectionResult,
    ) -> Result<(), StubsenseError> {
        write_json_atomic(&self.result_path(identity), result)
    }

    /// Loads the stored result of `identity`.
    ///
    /// A missing, unreadable or corrupt file yields `None`.
    #[must_use]
    pub fn load(&self, identity: &TestIdentity) -> Option<DetectionResult> {
        match read_json(&self.result_path(identity)) {
            Ok(result) => result,
            Err(error) => {
                warn!(%identity, %error, "ignore unreadable detection result");
                None
            }
        }
    }

    /// The auto-detected ignore patterns of `identity`, empty if none.
    #[must_use]
    pub fn load_ignore_patterns(&self, identity: &TestIdentity) -> Vec<String> {
        self.load(identity)
            .map(|result| result.ignore_patterns)
            .unwrap_or_default()
    }

    /// Deletes the stored result of `identity`.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file cannot be removed.
    pub fn clear(&self, identity: &TestIdentity) -> Result<(), StubsenseError> {
        remove_file(&self.result_path(identity))
    }
}
