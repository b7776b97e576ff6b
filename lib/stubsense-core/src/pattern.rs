use std::fmt;
use std::str::FromStr;

use crate::{BodyFormat, StubsenseError};

const JSON_PREFIX: &str = "json:";
const XML_PREFIX: &str = "xml:";
const GRAPHQL_PREFIX: &str = "gql:";

/// Typed view of an ignore pattern string.
///
/// Ignore patterns are persisted and exchanged as plain strings; this type
/// is the parsed form used when applying them.
///
/// | Shape | Example |
/// |---|---|
/// | `json:<path>` | `json:order.items[0].created_at` |
/// | `xml:<xpath>` | `xml://*[local-name()='Req']/@*[local-name()='RequestId']` |
/// | `gql:<path>` | `gql:variables.cursor` |
///
/// # Example
///
/// ```rust
/// use stubsense_core::IgnorePattern;
///
/// let pattern: IgnorePattern = "gql:variables.cursor".parse()?;
/// assert_eq!(pattern, IgnorePattern::GraphQl("variables.cursor".to_string()));
/// assert_eq!(pattern.to_string(), "gql:variables.cursor");
/// # Ok::<(), stubsense_core::StubsenseError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum IgnorePattern {
    /// A path inside a JSON body.
    Json(String),
    /// A namespace-agnostic XPath inside an XML body.
    Xml(String),
    /// A path inside a GraphQL request, usually under `variables`.
    GraphQl(String),
}

impl IgnorePattern {
    /// Parses a pattern string.
    ///
    /// # Errors
    ///
    /// Returns [`StubsenseError::InvalidPattern`] if the prefix is unknown
    /// or the path is empty.
    pub fn parse(pattern: &str) -> Result<Self, StubsenseError> {
        let invalid = |message: &str| StubsenseError::InvalidPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };

        let (constructor, path): (fn(String) -> Self, &str) =
            if let Some(path) = pattern.strip_prefix(JSON_PREFIX) {
                (Self::Json, path)
            } else if let Some(path) = pattern.strip_prefix(XML_PREFIX) {
                (Self::Xml, path)
            } else if let Some(path) = pattern.strip_prefix(GRAPHQL_PREFIX) {
                (Self::GraphQl, path)
            } else {
                return Err(invalid("expected a 'json:', 'xml:' or 'gql:' prefix"));
            };

        let path = path.trim();
        if path.is_empty() {
            return Err(invalid("empty path"));
        }

        Ok(constructor(path.to_string()))
    }

    /// The body format this pattern applies to.
    #[must_use]
    pub fn format(&self) -> BodyFormat {
        match self {
            Self::Json(_) | Self::GraphQl(_) => BodyFormat::Json,
            Self::Xml(_) => BodyFormat::Xml,
        }
    }

    /// The path or XPath without its prefix.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::Json(path) | Self::Xml(path) | Self::GraphQl(path) => path,
        }
    }
}

impl fmt::Display for IgnorePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self {
            Self::Json(_) => JSON_PREFIX,
            Self::Xml(_) => XML_PREFIX,
            Self::GraphQl(_) => GRAPHQL_PREFIX,
        };
        write!(f, "{prefix}{}", self.path())
    }
}

impl FromStr for IgnorePattern {
    type Err = StubsenseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json:ts", IgnorePattern::Json("ts".to_string()))]
    #[case("json:items[0].id", IgnorePattern::Json("items[0].id".to_string()))]
    #[case(
        "xml://*[local-name()='Req']",
        IgnorePattern::Xml("//*[local-name()='Req']".to_string())
    )]
    #[case("gql:variables.cursor", IgnorePattern::GraphQl("variables.cursor".to_string()))]
    fn should_parse_and_display(#[case] input: &str, #[case] expected: IgnorePattern) {
        let pattern = IgnorePattern::parse(input).expect("should parse");

        assert_eq!(pattern, expected);
        assert_eq!(pattern.to_string(), input);
    }

    #[rstest]
    #[case::unknown_prefix("yaml:foo")]
    #[case::no_prefix("foo.bar")]
    #[case::empty_path("json:")]
    #[case::blank_path("xml:   ")]
    fn should_reject_invalid_pattern(#[case] input: &str) {
        let result = IgnorePattern::parse(input);

        assert!(matches!(
            result,
            Err(StubsenseError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn should_map_to_body_format() {
        assert_eq!(IgnorePattern::Json("a".into()).format(), BodyFormat::Json);
        assert_eq!(IgnorePattern::GraphQl("a".into()).format(), BodyFormat::Json);
        assert_eq!(IgnorePattern::Xml("//a".into()).format(), BodyFormat::Xml);
    }
}
