//! IQ stanza helpers
//!
//! The engine only deals with `<iq/>` requests and their replies. A
//! [`Stanza`] wraps the top-level element and knows how to build the
//! `result` acknowledgement and `error` reply for an inbound request.

use std::fmt;

use crate::errors::JingleError;
use crate::namespaces;
use crate::xml::Element;

/// IQ `type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IqType {
    Get,
    Set,
    Result,
    Error,
}

impl IqType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IqType::Get => "get",
            IqType::Set => "set",
            IqType::Result => "result",
            IqType::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "get" => Some(IqType::Get),
            "set" => Some(IqType::Set),
            "result" => Some(IqType::Result),
            "error" => Some(IqType::Error),
            _ => None,
        }
    }
}

/// An IQ stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stanza {
    root: Element,
}

impl Stanza {
    /// Wrap an already-parsed element
    pub fn from_element(root: Element) -> Self {
        Self { root }
    }

    /// Parse stanza text
    pub fn parse(xml: &str) -> crate::errors::Result<Self> {
        Element::parse(xml).map(Self::from_element)
    }

    /// Build an outbound `set` request carrying one payload element
    pub fn new_set(to: &str, id: &str, payload: Element) -> Self {
        let root = Element::with_ns("iq", namespaces::JABBER_CLIENT)
            .attr_with("type", IqType::Set.as_str())
            .attr_with("to", to)
            .attr_with("id", id)
            .child_with(payload);
        Self { root }
    }

    pub fn is_iq(&self) -> bool {
        self.root.name() == "iq"
    }

    pub fn iq_type(&self) -> Option<IqType> {
        if !self.is_iq() {
            return None;
        }
        self.root.attr("type").and_then(IqType::parse)
    }

    pub fn from(&self) -> Option<&str> {
        self.root.attr("from")
    }

    pub fn to(&self) -> Option<&str> {
        self.root.attr("to")
    }

    pub fn id(&self) -> Option<&str> {
        self.root.attr("id")
    }

    pub fn root(&self) -> &Element {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Element {
        &mut self.root
    }

    pub fn into_element(self) -> Element {
        self.root
    }

    /// First payload child (the session element for Jingle requests)
    pub fn payload(&self) -> Option<&Element> {
        self.root.first_child()
    }

    /// Empty `result` acknowledging this request
    pub fn make_result(&self) -> Stanza {
        let mut root = Element::with_ns("iq", namespaces::JABBER_CLIENT)
            .attr_with("type", IqType::Result.as_str());
        self.address_reply(&mut root);
        Stanza { root }
    }

    /// `error` reply describing why this request was refused
    pub fn make_error(&self, error: &JingleError) -> Stanza {
        let mut root = Element::with_ns("iq", namespaces::JABBER_CLIENT)
            .attr_with("type", IqType::Error.as_str());
        self.address_reply(&mut root);

        let mut err = Element::new("error").attr_with("type", error.error_type());
        err.push_child(Element::with_ns(error.condition(), namespaces::XMPP_STANZAS));
        if let Some(condition) = error.jingle_condition() {
            err.push_child(Element::with_ns(condition, namespaces::JINGLE_ERRORS));
        }
        err.push_child(Element::with_ns("text", namespaces::XMPP_STANZAS).text_with(error.to_string()));
        root.push_child(err);
        Stanza { root }
    }

    fn address_reply(&self, reply: &mut Element) {
        if let Some(from) = self.from() {
            reply.set_attr("to", from);
        }
        if let Some(to) = self.to() {
            reply.set_attr("from", to);
        }
        if let Some(id) = self.id() {
            reply.set_attr("id", id);
        }
    }
}

impl fmt::Display for Stanza {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root.to_xml())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_reply_swaps_addresses_and_carries_conditions() {
        let request = Stanza::parse(
            r#"<iq xmlns="jabber:client" type="set" from="romeo@x/a" to="juliet@y/b" id="42"><jingle xmlns="urn:xmpp:jingle:1" action="session-accept" sid="s"/></iq>"#,
        )
        .unwrap();
        let reply = request.make_error(&JingleError::out_of_order("nope"));
        assert_eq!(reply.iq_type(), Some(IqType::Error));
        assert_eq!(reply.to(), Some("romeo@x/a"));
        assert_eq!(reply.from(), Some("juliet@y/b"));
        assert_eq!(reply.id(), Some("42"));

        let error = reply.root().child("error").unwrap();
        assert!(error.child_ns("unexpected-request", namespaces::XMPP_STANZAS).is_some());
        assert!(error.child_ns("out-of-order", namespaces::JINGLE_ERRORS).is_some());
    }

    #[test]
    fn result_reply_has_no_payload() {
        let request = Stanza::parse(r#"<iq type="set" from="a" to="b" id="7"><x xmlns="urn:x"/></iq>"#).unwrap();
        let ack = request.make_result();
        assert_eq!(ack.iq_type(), Some(IqType::Result));
        assert!(ack.payload().is_none());
    }
}
