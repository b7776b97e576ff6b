//! Minimal owned XML tree built with `quick-xml`.
//!
//! Namespaces are not resolved: names are kept as written (`ns4:Req`) and
//! callers compare local names. Undeclared prefixes are therefore accepted.
//! No DTD is processed, so external entities are never expanded; a
//! reference to an unknown entity makes the document invalid.

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::StubsenseError;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XmlDocument {
    declaration: Option<BytesDecl<'static>>,
    pub(crate) root: XmlElement,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct XmlElement {
    pub(crate) name: String,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) children: Vec<XmlNode>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum XmlNode {
    Element(XmlElement),
    Text(String),
    CData(String),
    Comment(String),
}

/// Strips the namespace prefix of a qualified name.
pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// `xmlns` and `xmlns:*` attributes declare namespaces, they carry no data.
pub(crate) fn is_namespace_declaration(name: &str) -> bool {
    name == "xmlns" || name.starts_with("xmlns:")
}

impl XmlElement {
    fn from_start(start: &BytesStart<'_>) -> Result<Self, StubsenseError> {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        let mut attributes = Vec::new();
        for attribute in start.attributes() {
            let attribute = attribute.map_err(quick_xml::Error::from)?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute.unescape_value()?.into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            children: Vec::new(),
        })
    }

    pub(crate) fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    pub(crate) fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.child_elements().next().is_none()
    }

    /// Concatenated text and CDATA content, trimmed.
    pub(crate) fn text(&self) -> String {
        let mut text = String::new();
        for child in &self.children {
            match child {
                XmlNode::Text(content) | XmlNode::CData(content) => text.push_str(content),
                XmlNode::Element(_) | XmlNode::Comment(_) => {}
            }
        }
        text.trim().to_string()
    }

    pub(crate) fn set_text(&mut self, text: &str) {
        self.children.retain(|child| matches!(child, XmlNode::Comment(_)));
        self.children.push(XmlNode::Text(text.to_string()));
    }

    /// Follows child indexes (positions in `children`) from this element.
    pub(crate) fn descendant_mut(&mut self, indexes: &[usize]) -> Option<&mut XmlElement> {
        let Some((first, rest)) = indexes.split_first() else {
            return Some(self);
        };
        match self.children.get_mut(*first) {
            Some(XmlNode::Element(child)) => child.descendant_mut(rest),
            _ => None,
        }
    }
}

fn malformed(message: impl Into<String>) -> StubsenseError {
    StubsenseError::MalformedXml {
        message: message.into(),
    }
}

fn attach(
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
    element: XmlElement,
) -> Result<(), StubsenseError> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
    } else if root.is_some() {
        return Err(malformed(format!(
            "unexpected second root element '{}'",
            element.name
        )));
    } else {
        *root = Some(element);
    }
    Ok(())
}

pub(crate) fn parse_xml(input: &str) -> Result<XmlDocument, StubsenseError> {
    let mut reader = Reader::from_str(input);
    let mut declaration = None;
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root = None;

    loop {
        match reader.read_event()? {
            Event::Decl(decl) => declaration = Some(decl.into_owned()),
            Event::Start(start) => stack.push(XmlElement::from_start(&start)?),
            Event::Empty(start) => {
                let element = XmlElement::from_start(&start)?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed("closing tag without opening tag"))?;
                attach(&mut stack, &mut root, element)?;
            }
            Event::Text(text) => {
                let content = text.unescape()?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(XmlNode::Text(content.into_owned()));
                } else if !content.trim().is_empty() {
                    return Err(malformed("text outside of the root element"));
                }
            }
            Event::CData(cdata) => {
                if let Some(parent) = stack.last_mut() {
                    let content = String::from_utf8_lossy(&cdata).into_owned();
                    parent.children.push(XmlNode::CData(content));
                }
            }
            Event::Comment(comment) => {
                if let Some(parent) = stack.last_mut() {
                    let content = String::from_utf8_lossy(&comment).into_owned();
                    parent.children.push(XmlNode::Comment(content));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if let Some(unclosed) = stack.last() {
        return Err(malformed(format!("unclosed element '{}'", unclosed.name)));
    }
    let root = root.ok_or_else(|| malformed("no root element"))?;

    Ok(XmlDocument { declaration, root })
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), StubsenseError> {
    let mut start = BytesStart::new(element.name.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    for child in &element.children {
        match child {
            XmlNode::Element(child) => write_element(writer, child)?,
            XmlNode::Text(text) => writer.write_event(Event::Text(BytesText::new(text)))?,
            XmlNode::CData(text) => {
                writer.write_event(Event::CData(BytesCData::new(text.as_str())))?;
            }
            XmlNode::Comment(text) => {
                writer.write_event(Event::Comment(BytesText::from_escaped(text.as_str())))?;
            }
        }
    }
    writer.write_event(Event::End(BytesEnd::new(element.name.as_str())))?;

    Ok(())
}

pub(crate) fn write_xml(document: &XmlDocument) -> Result<String, StubsenseError> {
    let mut writer = Writer::new(Vec::new());
    if let Some(declaration) = &document.declaration {
        writer.write_event(Event::Decl(declaration.clone()))?;
    }
    write_element(&mut writer, &document.root)?;

    String::from_utf8(writer.into_inner()).map_err(|err| malformed(err.to_string()))
}
