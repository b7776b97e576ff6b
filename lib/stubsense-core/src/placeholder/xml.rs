use tracing::debug;

use super::XML_IGNORE_PLACEHOLDER;
use super::selector::XmlSelector;
use crate::xml_tree::{XmlElement, parse_xml, write_xml};
use crate::{IgnorePattern, StubsenseError};

/// Replaces every node matched by the XML patterns with the XML ignore
/// placeholder.
///
/// Returns the number of replaced values.
pub(crate) fn apply_xml_patterns(root: &mut XmlElement, patterns: &[IgnorePattern]) -> usize {
    let mut applied = 0;
    for pattern in patterns {
        let IgnorePattern::Xml(xpath) = pattern else {
            continue;
        };
        match XmlSelector::parse(xpath) {
            Ok(selector) => {
                let count = selector.apply(root, XML_IGNORE_PLACEHOLDER);
                if count == 0 {
                    debug!(%pattern, "ignore pattern matches nothing");
                }
                applied += count;
            }
            Err(error) => debug!(%error, "skip ignore pattern"),
        }
    }
    applied
}

/// Parses `body`, applies the XML patterns and writes the document back.
///
/// # Errors
///
/// Returns an error if `body` is not a well-formed XML document.
pub(crate) fn rewrite_xml_body(
    body: &str,
    patterns: &[IgnorePattern],
) -> Result<String, StubsenseError> {
    let mut document = parse_xml(body)?;
    apply_xml_patterns(&mut document.root, patterns);
    write_xml(&document)
}
