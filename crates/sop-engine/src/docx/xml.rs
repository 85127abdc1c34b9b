//! Minimal owned XML tree for WordprocessingML parts
//!
//! Parsing and writing go through quick-xml. Anything the document model does
//! not interpret (unknown elements, attributes, whitespace, comments, CDATA)
//! is kept so that it round-trips unchanged.

use quick_xml::escape::unescape;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use super::error::DocxError;

/// A node inside an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlNode {
    Element(XmlElement),
    /// Unescaped character data
    Text(String),
    CData(String),
    Comment(String),
}

/// An element with its qualified name, unescaped attributes and children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlElement {
    pub name: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl XmlElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    /// Name without its namespace prefix (`w:p` -> `p`)
    pub fn local_name(&self) -> &str {
        local_name(&self.name)
    }

    /// True if the local name matches
    pub fn is(&self, local: &str) -> bool {
        self.local_name() == local
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((key, value)),
        }
    }

    /// First child element with the given local name
    pub fn child(&self, local: &str) -> Option<&XmlElement> {
        self.elements().find(|e| e.is(local))
    }

    pub fn child_mut(&mut self, local: &str) -> Option<&mut XmlElement> {
        self.children.iter_mut().find_map(|c| match c {
            XmlNode::Element(e) if e.is(local) => Some(e),
            _ => None,
        })
    }

    /// Child elements, skipping text and comments
    pub fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|c| match c {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Concatenated text of direct text children
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|c| match c {
                XmlNode::Text(t) | XmlNode::CData(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Copy of this element without its children
    pub fn shell(&self) -> XmlElement {
        XmlElement {
            name: self.name.clone(),
            attributes: self.attributes.clone(),
            children: Vec::new(),
        }
    }
}

pub fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Parse a complete XML part and return its root element
pub fn parse(xml: &str) -> Result<XmlElement, DocxError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = Vec::new();
    let mut root: Option<XmlElement> = None;
    // Raw (still escaped) text, flushed when the next non-text event arrives
    let mut pending = String::new();

    loop {
        let event = reader.read_event().map_err(|e| {
            DocxError::Xml(format!("at byte {}: {}", reader.buffer_position(), e))
        })?;

        match event {
            Event::Text(e) => pending.push_str(&String::from_utf8_lossy(&e)),
            Event::GeneralRef(e) => {
                pending.push('&');
                pending.push_str(&String::from_utf8_lossy(&e));
                pending.push(';');
            }
            other => {
                flush_text(&mut pending, &mut stack)?;
                match other {
                    Event::Start(e) => stack.push(element_from_start(&e)?),
                    Event::Empty(e) => {
                        let element = element_from_start(&e)?;
                        attach(element, &mut stack, &mut root)?;
                    }
                    Event::End(_) => {
                        let element = stack
                            .pop()
                            .ok_or_else(|| DocxError::Xml("unbalanced end tag".to_string()))?;
                        attach(element, &mut stack, &mut root)?;
                    }
                    Event::CData(e) => {
                        if let Some(parent) = stack.last_mut() {
                            parent
                                .children
                                .push(XmlNode::CData(String::from_utf8_lossy(&e).into_owned()));
                        }
                    }
                    Event::Comment(e) => {
                        if let Some(parent) = stack.last_mut() {
                            parent
                                .children
                                .push(XmlNode::Comment(String::from_utf8_lossy(&e).into_owned()));
                        }
                    }
                    Event::Eof => break,
                    // Declaration, processing instructions and doctype are regenerated on write
                    _ => {}
                }
            }
        }
    }

    if let Some(open) = stack.last() {
        return Err(DocxError::Xml(format!("unclosed element <{}>", open.name)));
    }
    root.ok_or_else(|| DocxError::Xml("no root element".to_string()))
}

fn element_from_start(start: &BytesStart) -> Result<XmlElement, DocxError> {
    let mut element = XmlElement::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    for attr in start.attributes() {
        let attr = attr.map_err(|e| DocxError::Xml(e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let raw = String::from_utf8_lossy(&attr.value);
        let value = unescape(&raw).map_err(|e| DocxError::Xml(e.to_string()))?;
        element.attributes.push((key, value.into_owned()));
    }
    Ok(element)
}

fn attach(
    element: XmlElement,
    stack: &mut [XmlElement],
    root: &mut Option<XmlElement>,
) -> Result<(), DocxError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(XmlNode::Element(element));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(element);
            Ok(())
        }
        None => Err(DocxError::Xml("multiple root elements".to_string())),
    }
}

fn flush_text(pending: &mut String, stack: &mut [XmlElement]) -> Result<(), DocxError> {
    if pending.is_empty() {
        return Ok(());
    }
    // Text outside the root element (whitespace around the prolog) is dropped
    if let Some(parent) = stack.last_mut() {
        let text = unescape(pending).map_err(|e| DocxError::Xml(e.to_string()))?;
        match parent.children.last_mut() {
            Some(XmlNode::Text(existing)) => existing.push_str(&text),
            _ => parent.children.push(XmlNode::Text(text.into_owned())),
        }
    }
    pending.clear();
    Ok(())
}

/// Serialize a root element as a standalone UTF-8 part
pub fn write_document(root: &XmlElement) -> Result<Vec<u8>, DocxError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))
        .map_err(write_err)?;
    writer
        .write_event(Event::Text(BytesText::from_escaped("\r\n")))
        .map_err(write_err)?;
    write_element(&mut writer, root)?;
    Ok(writer.into_inner())
}

fn write_element(writer: &mut Writer<Vec<u8>>, element: &XmlElement) -> Result<(), DocxError> {
    let start = BytesStart::new(element.name.as_str()).with_attributes(
        element
            .attributes
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str())),
    );

    if element.children.is_empty() {
        return writer.write_event(Event::Empty(start)).map_err(write_err);
    }

    writer.write_event(Event::Start(start)).map_err(write_err)?;
    for child in &element.children {
        match child {
            XmlNode::Element(e) => write_element(writer, e)?,
            XmlNode::Text(t) => writer
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(write_err)?,
            XmlNode::CData(t) => writer
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(write_err)?,
            XmlNode::Comment(t) => writer
                .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                .map_err(write_err)?,
        }
    }
    writer
        .write_event(Event::End(BytesEnd::new(element.name.as_str())))
        .map_err(write_err)
}

fn write_err(e: impl std::fmt::Display) -> DocxError {
    DocxError::Write(e.to_string())
}
