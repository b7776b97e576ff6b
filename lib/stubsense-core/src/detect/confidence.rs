use serde::{Deserialize, Serialize};

/// How much evidence supports a dynamic field.
///
/// Derived from the number of samples that were compared:
///
/// | Samples | Confidence |
/// |---|---|
/// | 3 or more | [`High`](Confidence::High) |
/// | 2 | [`Medium`](Confidence::Medium) |
/// | fewer | [`Low`](Confidence::Low) |
///
/// More samples never lower the confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    /// Not enough samples to be trusted.
    Low,
    /// Observed on two samples.
    Medium,
    /// Observed on three samples or more.
    High,
}

impl Confidence {
    const HIGH_THRESHOLD: usize = 3;
    const MEDIUM_THRESHOLD: usize = 2;

    /// Maps a sample count to a confidence level.
    #[must_use]
    pub fn from_sample_count(count: usize) -> Self {
        if count >= Self::HIGH_THRESHOLD {
            Self::High
        } else if count >= Self::MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }
}
