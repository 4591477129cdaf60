//! Owned XML element tree
//!
//! Jingle handlers work on a parsed stanza tree rather than on a stream of
//! reader events, so this module provides a small [`Element`] type with
//! namespace resolution, plus parsing and serialization on top of
//! `quick-xml`.
//!
//! Namespaces are always resolved: a child attached without a namespace
//! inherits its parent's, the same way an unprefixed element inherits the
//! default `xmlns` of its ancestors in a document.

mod parser;
mod writer;

use indexmap::IndexMap;

use crate::errors::Result;

/// A single XML element with resolved namespace
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    name: String,
    ns: Option<String>,
    attrs: IndexMap<String, String>,
    children: Vec<Element>,
    text: Option<String>,
}

impl Element {
    /// Create an element that inherits its namespace from the parent
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create an element in an explicit namespace
    pub fn with_ns(name: impl Into<String>, ns: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ns: Some(ns.into()),
            ..Default::default()
        }
    }

    /// Parse a complete XML document into its root element
    pub fn parse(xml: &str) -> Result<Self> {
        parser::parse(xml)
    }

    /// Serialize this element (and its subtree) to a string
    pub fn to_xml(&self) -> String {
        writer::write(self)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ns(&self) -> Option<&str> {
        self.ns.as_deref()
    }

    /// True if the element has the given name and namespace
    pub fn is(&self, name: &str, ns: &str) -> bool {
        self.name == name && self.ns.as_deref() == Some(ns)
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(key.into(), value.into());
    }

    pub fn remove_attr(&mut self, key: &str) -> Option<String> {
        self.attrs.shift_remove(key)
    }

    /// Builder form of [`Element::set_attr`]
    pub fn attr_with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attr(key, value);
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Builder form of [`Element::set_text`]
    pub fn text_with(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Text content of the first child with this name
    pub fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).and_then(Element::text)
    }

    pub fn children(&self) -> impl Iterator<Item = &Element> {
        self.children.iter()
    }

    pub fn children_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    pub fn first_child(&self) -> Option<&Element> {
        self.children.first()
    }

    /// First child with this local name, in any namespace
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Element> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// First child with this local name and namespace
    pub fn child_ns(&self, name: &str, ns: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.is(name, ns))
    }

    /// All children with this local name
    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Attach a child and return a mutable reference to it
    pub fn push_child(&mut self, mut child: Element) -> &mut Element {
        child.inherit_ns(self.ns.as_deref());
        self.children.push(child);
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Builder form of [`Element::push_child`]
    pub fn child_with(mut self, child: Element) -> Self {
        self.push_child(child);
        self
    }

    fn inherit_ns(&mut self, parent_ns: Option<&str>) {
        if self.ns.is_none() {
            self.ns = parent_ns.map(str::to_owned);
        }
        let ns = self.ns.clone();
        for child in &mut self.children {
            child.inherit_ns(ns.as_deref());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn children_inherit_namespace_on_attach() {
        let mut jingle = Element::with_ns("jingle", crate::namespaces::JINGLE);
        let content = jingle.push_child(Element::new("content").attr_with("name", "audio"));
        content.push_child(Element::with_ns("description", crate::namespaces::JINGLE_RTP));
        content.push_child(Element::new("transport"));

        let content = jingle.child("content").unwrap();
        assert_eq!(content.ns(), Some(crate::namespaces::JINGLE));
        assert_eq!(
            content.child("description").unwrap().ns(),
            Some(crate::namespaces::JINGLE_RTP)
        );
        assert_eq!(
            content.child("transport").unwrap().ns(),
            Some(crate::namespaces::JINGLE)
        );
    }

    #[test]
    fn parse_and_write_keep_structure() {
        let xml = r#"<iq xmlns="jabber:client" type="set" from="a@x/r" to="b@y/r" id="1"><jingle xmlns="urn:xmpp:jingle:1" action="session-info" sid="s1"><ringing xmlns="urn:xmpp:jingle:apps:rtp:info:1"/></jingle></iq>"#;
        let iq = Element::parse(xml).unwrap();
        assert_eq!(iq.attr("type"), Some("set"));
        let jingle = iq.child_ns("jingle", crate::namespaces::JINGLE).unwrap();
        assert_eq!(jingle.attr("sid"), Some("s1"));
        assert!(jingle
            .first_child()
            .unwrap()
            .is("ringing", crate::namespaces::JINGLE_RTP_INFO));

        let reparsed = Element::parse(&iq.to_xml()).unwrap();
        assert_eq!(reparsed, iq);
    }

    #[test]
    fn prefixed_namespaces_resolve() {
        let xml = r#"<root xmlns="urn:a" xmlns:g="urn:g"><g:item k="v">hi &amp; bye</g:item></root>"#;
        let root = Element::parse(xml).unwrap();
        let item = root.child_ns("item", "urn:g").unwrap();
        assert_eq!(item.text(), Some("hi & bye"));
        assert_eq!(item.attr("k"), Some("v"));
    }

    #[test]
    fn malformed_input_is_an_error() {
        assert!(Element::parse("<a><b></a>").is_err());
        assert!(Element::parse("").is_err());
    }
}
