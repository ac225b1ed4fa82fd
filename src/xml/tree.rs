//! Owned XML tree used wherever a parsed document has to be inspected or
//! changed (template flattening, cadena original, seal embedding, complements).
//!
//! Trees are never edited in place: every change consumes an [`Element`] and
//! returns the rebuilt one.

use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

use super::ns;
use crate::core::XmlError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    CData(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    name: String,
    namespace: Option<String>,
    attributes: Vec<(String, String)>,
    children: Vec<Node>,
}

impl Element {
    /// New element with a qualified name such as `cfdi:Complemento`.
    pub fn new(name: impl Into<String>, namespace: Option<&str>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.map(str::to_string),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Qualified name as written in the document.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn local_name(&self) -> &str {
        split_qname(&self.name).1
    }

    pub fn prefix(&self) -> Option<&str> {
        split_qname(&self.name).0
    }

    /// Namespace URI the element's prefix resolved to when parsed.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn is(&self, namespace: &str, local_name: &str) -> bool {
        self.namespace() == Some(namespace) && self.local_name() == local_name
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn attributes(&self) -> &[(String, String)] {
        &self.attributes
    }

    pub fn children(&self) -> &[Node] {
        &self.children
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// `xmlns` / `xmlns:p` declarations on this element as (prefix, uri);
    /// the default namespace has an empty prefix.
    pub fn namespace_declarations(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attributes.iter().filter_map(|(k, v)| {
            if k == "xmlns" {
                Some(("", v.as_str()))
            } else {
                k.strip_prefix("xmlns:").map(|p| (p, v.as_str()))
            }
        })
    }

    /// True if this element or any descendant satisfies `pred`.
    pub fn any(&self, pred: &dyn Fn(&Element) -> bool) -> bool {
        pred(self) || self.child_elements().any(|c| c.any(pred))
    }

    /// Set an attribute, replacing its value in place or appending it.
    pub fn with_attribute(self, name: &str, value: impl Into<String>) -> Self {
        self.with_attribute_after(name, value, None)
    }

    /// Set an attribute; a new attribute goes right after `after` when that
    /// attribute exists, otherwise at the end.
    pub fn with_attribute_after(
        mut self,
        name: &str,
        value: impl Into<String>,
        after: Option<&str>,
    ) -> Self {
        let value = value.into();
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| k == name) {
            slot.1 = value;
            return self;
        }
        let pos = after
            .and_then(|a| self.attributes.iter().position(|(k, _)| k == a))
            .map(|i| i + 1)
            .unwrap_or(self.attributes.len());
        self.attributes.insert(pos, (name.to_string(), value));
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(Node::Element(child));
        self
    }

    pub fn with_children(mut self, children: Vec<Node>) -> Self {
        self.children = children;
        self
    }

    /// Take the children out, leaving the element itself intact.
    pub fn into_parts(self) -> (Element, Vec<Node>) {
        let Element {
            name,
            namespace,
            attributes,
            children,
        } = self;
        (
            Element {
                name,
                namespace,
                attributes,
                children: Vec::new(),
            },
            children,
        )
    }

    /// Serialize with an XML declaration and no added whitespace.
    pub fn to_xml(&self) -> Result<String, XmlError> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .map_err(write_err)?;
        write_element(&mut writer, self)?;
        String::from_utf8(writer.into_inner().into_inner())
            .map_err(|e| XmlError::Write(format!("UTF-8 error: {e}")))
    }
}

fn split_qname(name: &str) -> (Option<&str>, &str) {
    match name.split_once(':') {
        Some((p, l)) => (Some(p), l),
        None => (None, name),
    }
}

fn write_err(e: std::io::Error) -> XmlError {
    XmlError::Write(e.to_string())
}

fn write_element(w: &mut Writer<Cursor<Vec<u8>>>, el: &Element) -> Result<(), XmlError> {
    let mut start = BytesStart::new(el.name.as_str());
    for (k, v) in &el.attributes {
        start.push_attribute((k.as_str(), v.as_str()));
    }
    if el.children.is_empty() {
        return w.write_event(Event::Empty(start)).map_err(write_err);
    }
    w.write_event(Event::Start(start)).map_err(write_err)?;
    for child in &el.children {
        match child {
            Node::Element(e) => write_element(w, e)?,
            Node::Text(t) => w
                .write_event(Event::Text(BytesText::new(t)))
                .map_err(write_err)?,
            Node::CData(t) => w
                .write_event(Event::CData(BytesCData::new(t.as_str())))
                .map_err(write_err)?,
            Node::Comment(t) => w
                .write_event(Event::Comment(BytesText::from_escaped(t.as_str())))
                .map_err(write_err)?,
        }
    }
    w.write_event(Event::End(BytesEnd::new(el.name.as_str())))
        .map_err(write_err)
}

/// Parse a document into its root element.
///
/// Prefixes are resolved against the in-scope declarations as the tree is
/// built; an undeclared prefix leaves the element without a namespace.
pub fn parse(xml: &str) -> Result<Element, XmlError> {
    let mut reader = Reader::from_str(xml);
    let mut scopes: Vec<(String, String)> = vec![("xml".to_string(), ns::XML.to_string())];
    let mut stack: Vec<(Element, usize)> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| XmlError::Parse(format!("{e} at byte {}", reader.buffer_position())))?;
        match event {
            Event::Start(e) => {
                let (el, pushed) = open_element(&e, &mut scopes)?;
                stack.push((el, pushed));
            }
            Event::Empty(e) => {
                let (el, pushed) = open_element(&e, &mut scopes)?;
                scopes.truncate(scopes.len() - pushed);
                close_element(el, &mut stack, &mut root)?;
            }
            Event::End(_) => {
                let (el, pushed) = stack
                    .pop()
                    .ok_or_else(|| XmlError::Parse("unexpected closing tag".into()))?;
                scopes.truncate(scopes.len() - pushed);
                close_element(el, &mut stack, &mut root)?;
            }
            Event::Text(t) => {
                if let Some((parent, _)) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| XmlError::Parse(e.to_string()))?;
                    parent.children.push(Node::Text(text.into_owned()));
                }
            }
            Event::CData(t) => {
                if let Some((parent, _)) = stack.last_mut() {
                    let text = String::from_utf8(t.into_inner().into_owned())
                        .map_err(|e| XmlError::Parse(e.to_string()))?;
                    parent.children.push(Node::CData(text));
                }
            }
            Event::Comment(t) => {
                if let Some((parent, _)) = stack.last_mut() {
                    let text = String::from_utf8_lossy(&t).into_owned();
                    parent.children.push(Node::Comment(text));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(XmlError::Parse("unexpected end of document".into()));
    }
    root.ok_or_else(|| XmlError::Parse("document has no root element".into()))
}

fn open_element(
    e: &BytesStart<'_>,
    scopes: &mut Vec<(String, String)>,
) -> Result<(Element, usize), XmlError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(|e| XmlError::Parse(e.to_string()))?
        .to_string();
    let mut attributes = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|e| XmlError::Parse(e.to_string()))?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| XmlError::Parse(e.to_string()))?
            .to_string();
        let value = attr
            .unescape_value()
            .map_err(|e| XmlError::Parse(e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }

    let mut el = Element {
        name,
        namespace: None,
        attributes,
        children: Vec::new(),
    };
    let declared: Vec<(String, String)> = el
        .namespace_declarations()
        .map(|(p, u)| (p.to_string(), u.to_string()))
        .collect();
    let pushed = declared.len();
    scopes.extend(declared);

    let prefix = el.prefix().unwrap_or("");
    el.namespace = scopes
        .iter()
        .rev()
        .find(|(p, _)| p == prefix)
        .map(|(_, u)| u.clone())
        .filter(|u| !u.is_empty());
    Ok((el, pushed))
}

fn close_element(
    el: Element,
    stack: &mut [(Element, usize)],
    root: &mut Option<Element>,
) -> Result<(), XmlError> {
    match stack.last_mut() {
        Some((parent, _)) => {
            parent.children.push(Node::Element(el));
            Ok(())
        }
        None if root.is_none() => {
            *root = Some(el);
            Ok(())
        }
        None => Err(XmlError::Parse("more than one root element".into())),
    }
}
