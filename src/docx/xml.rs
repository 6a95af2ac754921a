//! Minimal owned XML tree over `quick-xml` events.
//!
//! WordprocessingML has to survive a load → edit → save cycle without losing
//! anything the engine does not understand: namespaces, `mc:Ignorable`
//! attributes, processing instructions, whitespace between elements. The tree
//! therefore keeps each start tag verbatim ([`BytesStart`]) and stores every
//! non-element, non-text event untouched; only text nodes are decoded so
//! that run text can be edited as ordinary `String`s.

use crate::error::WelcomePackError;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::fmt::Display;

/// One node of the tree.
#[derive(Debug, Clone)]
pub enum XmlNode {
    Element(XmlElement),
    /// Decoded character data.
    Text(String),
    /// Declarations, comments, CDATA, processing instructions, doctype.
    Other(Event<'static>),
}

/// An element with its original start tag.
#[derive(Debug, Clone)]
pub struct XmlElement {
    start: BytesStart<'static>,
    name: String,
    pub children: Vec<XmlNode>,
    self_closing: bool,
}

impl XmlElement {
    /// A new, attribute-less element.
    pub fn new(name: &str) -> Self {
        Self {
            start: BytesStart::new(name.to_string()),
            name: name.to_string(),
            children: Vec::new(),
            self_closing: false,
        }
    }

    fn from_start(start: BytesStart<'static>, self_closing: bool) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
        Self {
            start,
            name,
            children: Vec::new(),
            self_closing,
        }
    }

    /// Qualified name, e.g. `w:p`.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is(&self, name: &str) -> bool {
        self.name == name
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        matches!(self.start.try_get_attribute(key), Ok(Some(_)))
    }

    /// Set (or replace) an attribute, keeping the others in order.
    pub fn set_attribute(&mut self, key: &str, value: &str) {
        let mut start = BytesStart::new(self.name.clone());
        for attr in self.start.attributes().flatten() {
            if attr.key.as_ref() != key.as_bytes() {
                start.push_attribute(attr);
            }
        }
        start.push_attribute((key, value));
        self.start = start;
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn child_elements_mut(&mut self) -> impl Iterator<Item = &mut XmlElement> {
        self.children.iter_mut().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Concatenated text of this element's direct text children.
    pub fn own_text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                XmlNode::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Replace all direct text children with `text`.
    pub fn set_own_text(&mut self, text: &str) {
        self.children.retain(|n| !matches!(n, XmlNode::Text(_)));
        if !text.is_empty() {
            self.children.push(XmlNode::Text(text.to_string()));
        }
    }

    /// Concatenated text of every `name` descendant, in document order.
    pub fn descendant_text(&self, name: &str) -> String {
        let mut out = String::new();
        self.collect_descendant_text(name, &mut out);
        out
    }

    fn collect_descendant_text(&self, name: &str, out: &mut String) {
        for child in self.child_elements() {
            if child.is(name) {
                out.push_str(&child.own_text());
            } else {
                child.collect_descendant_text(name, out);
            }
        }
    }

    /// Every `name` descendant, in document order (not descending into matches).
    pub fn descendants<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect_descendants(name, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in self.child_elements() {
            if child.is(name) {
                out.push(child);
            } else {
                child.collect_descendants(name, out);
            }
        }
    }
}

/// A parsed XML part: top-level nodes (declaration, root element, trailing
/// whitespace or comments).
#[derive(Debug, Clone)]
pub struct XmlDocument {
    pub nodes: Vec<XmlNode>,
}

impl XmlDocument {
    /// Parse a complete XML part.
    pub fn parse(xml: &[u8]) -> Result<Self, WelcomePackError> {
        let mut reader = Reader::from_reader(xml);
        let mut nodes = Vec::new();
        let mut stack: Vec<XmlElement> = Vec::new();

        loop {
            let event = reader.read_event().map_err(|e| malformed(e, &reader))?;
            let node = match event {
                Event::Start(start) => {
                    stack.push(XmlElement::from_start(start.into_owned(), false));
                    continue;
                }
                Event::End(_) => match stack.pop() {
                    Some(element) => XmlNode::Element(element),
                    None => {
                        return Err(WelcomePackError::UnreadableDocument {
                            kind: "docx",
                            detail: "unbalanced closing tag".into(),
                        })
                    }
                },
                Event::Empty(start) => XmlNode::Element(XmlElement::from_start(start.into_owned(), true)),
                Event::Text(text) => {
                    let decoded = text.unescape().map_err(|e| malformed(e, &reader))?;
                    XmlNode::Text(decoded.into_owned())
                }
                Event::Eof => break,
                other => XmlNode::Other(other.into_owned()),
            };

            match stack.last_mut() {
                Some(parent) => parent.children.push(node),
                None => nodes.push(node),
            }
        }

        if !stack.is_empty() {
            return Err(WelcomePackError::UnreadableDocument {
                kind: "docx",
                detail: format!("unclosed element <{}>", stack[stack.len() - 1].name),
            });
        }
        Ok(Self { nodes })
    }

    /// The document element, if any.
    pub fn root(&self) -> Option<&XmlElement> {
        self.nodes.iter().find_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    pub fn root_mut(&mut self) -> Option<&mut XmlElement> {
        self.nodes.iter_mut().find_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Serialise the tree back to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, WelcomePackError> {
        let mut writer = Writer::new(Vec::new());
        for node in &self.nodes {
            write_node(&mut writer, node)?;
        }
        Ok(writer.into_inner())
    }
}

fn write_node(writer: &mut Writer<Vec<u8>>, node: &XmlNode) -> Result<(), WelcomePackError> {
    match node {
        XmlNode::Element(el) if el.self_closing && el.children.is_empty() => writer
            .write_event(Event::Empty(el.start.borrow()))
            .map_err(write_failed)?,
        XmlNode::Element(el) => {
            writer
                .write_event(Event::Start(el.start.borrow()))
                .map_err(write_failed)?;
            for child in &el.children {
                write_node(writer, child)?;
            }
            writer
                .write_event(Event::End(BytesEnd::new(el.name.as_str())))
                .map_err(write_failed)?;
        }
        XmlNode::Text(text) => writer
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(write_failed)?,
        XmlNode::Other(event) => writer.write_event(event.clone()).map_err(write_failed)?,
    }
    Ok(())
}

fn malformed(e: impl Display, reader: &Reader<&[u8]>) -> WelcomePackError {
    WelcomePackError::UnreadableDocument {
        kind: "docx",
        detail: format!("malformed XML at byte {}: {e}", reader.buffer_position()),
    }
}

fn write_failed(e: impl Display) -> WelcomePackError {
    WelcomePackError::Internal(format!("XML serialisation failed: {e}"))
}
