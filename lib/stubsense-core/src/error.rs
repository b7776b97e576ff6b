use std::path::PathBuf;

/// Errors that can occur while tracking requests, detecting dynamic fields
/// or rewriting stored stubs.
///
/// Most public entry points absorb these errors and log them, so a broken
/// history file never fails the calling test. The `try_*` variants expose
/// them for callers that want to react.
#[derive(Debug, derive_more::Error, derive_more::Display, derive_more::From)]
pub enum StubsenseError {
    /// I/O error while reading or writing a persisted artifact.
    IoError(std::io::Error),

    /// JSON serialization/deserialization error.
    JsonValueError(serde_json::Error),

    /// XML reading or writing error.
    XmlError(quick_xml::Error),

    /// A persisted file exists but cannot be decoded.
    ///
    /// Occurs when a history or detection result file was truncated or
    /// written by an incompatible version.
    #[display("Failed to deserialize '{}' at '{path}': {error}", file.display())]
    #[from(skip)]
    CorruptFile {
        /// The file that failed to decode.
        file: PathBuf,
        /// The location inside the JSON document where decoding failed.
        path: String,
        /// The underlying JSON error.
        error: serde_json::Error,
    },

    /// The temporary file could not be renamed onto its target.
    #[display("Failed to persist '{}': {error}", file.display())]
    #[from(skip)]
    PersistError {
        /// The target file.
        file: PathBuf,
        /// The underlying I/O error.
        error: std::io::Error,
    },

    /// An ignore pattern does not follow one of the supported shapes.
    #[display("Invalid ignore pattern '{pattern}': {message}")]
    #[from(skip)]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Why the pattern was rejected.
        message: String,
    },

    /// An XML document is not well formed.
    #[display("Malformed XML: {message}")]
    #[from(skip)]
    MalformedXml {
        /// Description of the problem.
        message: String,
    },

    /// The detector configuration is not usable.
    #[display("Invalid configuration: {message}")]
    #[from(skip)]
    InvalidConfiguration {
        /// Description of the problem.
        message: String,
    },
}
