use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{DynamicFieldDetector, StubsenseError};

/// Settings of a [`DynamicFieldDetector`].
///
/// Missing fields take their default value when deserialized, so a
/// configuration file only needs the settings it changes:
///
/// ```rust
/// use stubsense_core::DetectorConfig;
///
/// let config: DetectorConfig = serde_json::from_str(r#"{"history_limit": 5}"#)?;
/// assert_eq!(config.history_limit(), 5);
/// assert_eq!(config.max_sample_values(), 3);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    storage_root: PathBuf,
    history_limit: usize,
    max_sample_values: usize,
}

impl DetectorConfig {
    /// Directory used when none is configured.
    pub const DEFAULT_STORAGE_ROOT: &'static str = "target/stubsense";
    /// Snapshots kept per test identity by default.
    pub const DEFAULT_HISTORY_LIMIT: usize = 10;
    /// Sample values kept per dynamic field by default.
    pub const DEFAULT_MAX_SAMPLE_VALUES: usize = 3;

    /// The directory holding histories and detection results.
    #[must_use]
    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// The maximum number of snapshots kept per test identity.
    #[must_use]
    pub fn history_limit(&self) -> usize {
        self.history_limit
    }

    /// The maximum number of sample values kept per dynamic field.
    #[must_use]
    pub fn max_sample_values(&self) -> usize {
        self.max_sample_values
    }

    /// Checks that the settings allow a detection to run.
    ///
    /// # Errors
    ///
    /// Returns [`StubsenseError::InvalidConfiguration`] if the history
    /// limit is below 2 (nothing could ever be compared) or if no sample
    /// value would be kept.
    pub fn validate(&self) -> Result<(), StubsenseError> {
        if self.history_limit < 2 {
            return Err(StubsenseError::InvalidConfiguration {
                message: format!(
                    "history limit must be at least 2, got {}",
                    self.history_limit
                ),
            });
        }
        if self.max_sample_values == 0 {
            return Err(StubsenseError::InvalidConfiguration {
                message: "max sample values must be at least 1".to_string(),
            });
        }
        if self.storage_root.as_os_str().is_empty() {
            return Err(StubsenseError::InvalidConfiguration {
                message: "storage root must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from(Self::DEFAULT_STORAGE_ROOT),
            history_limit: Self::DEFAULT_HISTORY_LIMIT,
            max_sample_values: Self::DEFAULT_MAX_SAMPLE_VALUES,
        }
    }
}

/// Builder for [`DynamicFieldDetector`].
///
/// # Default Configuration
///
/// - **Storage root**: `target/stubsense`
/// - **History limit**: 10 snapshots per test identity
/// - **Max sample values**: 3 per dynamic field
///
/// # Example
///
/// ```rust
/// use stubsense_core::DynamicFieldDetector;
///
/// let detector = DynamicFieldDetector::builder()
///     .with_storage_root("target/my-stubs")
///     .with_history_limit(5)
///     .build()?;
/// assert_eq!(detector.snapshots().history_limit(), 5);
/// # Ok::<(), stubsense_core::StubsenseError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct DynamicFieldDetectorBuilder {
    config: DetectorConfig,
}

impl DynamicFieldDetectorBuilder {
    /// Starts from an existing configuration.
    #[must_use]
    pub fn from_config(config: DetectorConfig) -> Self {
        Self { config }
    }

    /// Sets the directory holding histories and detection results.
    #[must_use]
    pub fn with_storage_root(mut self, storage_root: impl Into<PathBuf>) -> Self {
        self.config.storage_root = storage_root.into();
        self
    }

    /// Sets the maximum number of snapshots kept per test identity.
    #[must_use]
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.config.history_limit = history_limit;
        self
    }

    /// Sets the maximum number of sample values kept per dynamic field.
    #[must_use]
    pub fn with_max_sample_values(mut self, max_sample_values: usize) -> Self {
        self.config.max_sample_values = max_sample_values;
        self
    }

    /// Builds the detector.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, see [`DetectorConfig::validate`].
    pub fn build(self) -> Result<DynamicFieldDetector, StubsenseError> {
        DynamicFieldDetector::new(self.config)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn should_use_defaults() {
        let config = DetectorConfig::default();

        insta::assert_debug_snapshot!(config, @r#"
        DetectorConfig {
            storage_root: "target/stubsense",
            history_limit: 10,
            max_sample_values: 3,
        }
        "#);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn should_deserialize_partial_config() {
        let config = serde_json::from_str::<DetectorConfig>(r#"{"storage_root": "build/stubs"}"#)
            .expect("valid config");

        assert_eq!(config.storage_root(), Path::new("build/stubs"));
        assert_eq!(config.history_limit(), DetectorConfig::DEFAULT_HISTORY_LIMIT);
    }

    #[rstest]
    #[case::history_too_short(DynamicFieldDetectorBuilder::default().with_history_limit(1))]
    #[case::no_samples(DynamicFieldDetectorBuilder::default().with_max_sample_values(0))]
    #[case::empty_root(DynamicFieldDetectorBuilder::default().with_storage_root(""))]
    fn should_reject_invalid_configuration(#[case] builder: DynamicFieldDetectorBuilder) {
        let result = builder.build();

        assert!(matches!(
            result,
            Err(StubsenseError::InvalidConfiguration { .. })
        ));
    }

    #[test]
    fn should_build_detector() {
        let detector = DynamicFieldDetectorBuilder::default()
            .with_storage_root("out")
            .with_history_limit(2)
            .with_max_sample_values(1)
            .build()
            .expect("valid configuration");

        assert_eq!(detector.snapshots().root(), Path::new("out"));
        assert_eq!(detector.snapshots().history_limit(), 2);
        assert_eq!(detector.results().root(), Path::new("out"));
        assert_eq!(detector.config().max_sample_values(), 1);
    }
}
