use serde::{Deserialize, Serialize};

/// The payload format of a recorded request body.
///
/// Decided by [`classify`] from the content type and the body text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BodyFormat {
    /// A JSON document (object or array).
    Json,
    /// An XML document.
    Xml,
    /// Anything else: form data, plain text, binary...
    Unknown,
}

/// Classifies a body as JSON, XML or unknown.
///
/// A content type that names JSON or XML (`application/json`,
/// `application/soap+xml`, `text/xml`, ...) is trusted. Otherwise the
/// trimmed body is sniffed: `{...}` or `[...]` is JSON, `<...>` is XML.
///
/// Without any content type, an unrecognised body is reported as JSON to
/// stay compatible with stubs recorded before content types were captured.
/// Such bodies then simply fail to parse and are skipped.
///
/// # Example
///
/// ```rust
/// use stubsense_core::{BodyFormat, classify};
///
/// assert_eq!(classify(Some("text/xml; charset=utf-8"), None), BodyFormat::Xml);
/// assert_eq!(classify(None, Some(r#"{"id": 1}"#)), BodyFormat::Json);
/// assert_eq!(classify(Some("text/plain"), Some("hello")), BodyFormat::Unknown);
/// ```
#[must_use]
pub fn classify(content_type: Option<&str>, body: Option<&str>) -> BodyFormat {
    let content_type = content_type.map(str::trim).filter(|ct| !ct.is_empty());

    if let Some(format) = content_type.and_then(format_from_content_type) {
        return format;
    }

    let trimmed = body.map(str::trim).unwrap_or_default();
    let looks_like_json = (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'));
    let looks_like_xml = trimmed.starts_with('<') && trimmed.ends_with('>');

    if looks_like_json || (!looks_like_xml && content_type.is_none()) {
        BodyFormat::Json
    } else if looks_like_xml {
        BodyFormat::Xml
    } else {
        BodyFormat::Unknown
    }
}

fn format_from_content_type(content_type: &str) -> Option<BodyFormat> {
    if let Ok(mime) = content_type.parse::<mime::Mime>() {
        if mime.subtype() == mime::JSON || mime.suffix() == Some(mime::JSON) {
            return Some(BodyFormat::Json);
        }
        if mime.subtype() == mime::XML || mime.suffix() == Some(mime::XML) {
            return Some(BodyFormat::Xml);
        }
    }

    // Vendor types like `application/vnd.foo.json-v2` don't follow the suffix convention
    let lower = content_type.to_ascii_lowercase();
    if lower.contains("json") {
        Some(BodyFormat::Json)
    } else if lower.contains("xml") {
        Some(BodyFormat::Xml)
    } else {
        None
    }
}
