//! Session contents
//!
//! A [`Content`] is one negotiable unit of a session (an audio stream, a
//! file transfer, ...). The engine only tracks its signaling state; the
//! media or transfer specifics live behind a [`ContentHandler`] supplied by
//! the collaborator layer through a [`ContentHandlerFactory`] registered in
//! the [`ContentTypeRegistry`].

pub mod registry;

pub use registry::ContentRegistry;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::protocol::{Creator, Dialect, MediaType, Senders};
use crate::xml::Element;

/// Disposition of contents that are part of the initial offer
pub const DISPOSITION_SESSION: &str = "session";

/// Signaling state of a content
///
/// Locally created contents start `Empty` and become `Sent` once offered;
/// peer contents start `New` and become `Acknowledged` once accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ContentState {
    Empty,
    New,
    Sent,
    Acknowledged,
    Removing,
}

/// Identifies a content inside its session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId {
    pub name: String,
    pub creator: Creator,
}

impl ContentId {
    pub fn new(name: impl Into<String>, creator: Creator) -> Self {
        Self {
            name: name.into(),
            creator,
        }
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.creator.as_str(), self.name)
    }
}

/// Media or transfer logic behind one content
///
/// Parsing hooks receive the peer's elements; producing hooks fill in the
/// elements of outbound messages. Everything except [`ContentHandler::is_ready`]
/// has a no-op default.
pub trait ContentHandler: Send {
    /// Local media and transport are in place
    fn is_ready(&self) -> bool;

    /// Peer's offered or answered description
    fn parse_description(&mut self, _description: &Element) -> Result<()> {
        Ok(())
    }

    /// Peer's transport element, from an offer or a transport-info
    fn parse_transport(&mut self, _transport: &Element) -> Result<()> {
        Ok(())
    }

    fn parse_description_info(&mut self, _description: &Element) -> Result<()> {
        Ok(())
    }

    fn parse_info(&mut self, _payload: &Element) -> Result<()> {
        Ok(())
    }

    fn produce_description(&self, _description: &mut Element) {}

    fn produce_transport(&self, _transport: &mut Element) {}

    /// Peer lost our candidates (dialect downgrade)
    fn retransmit_candidates(&mut self) {}

    fn remote_mute_changed(&mut self, _muted: bool) {}
}

/// Parameters a factory gets when creating a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentSpec {
    pub name: String,
    pub media_type: MediaType,
    pub content_ns: String,
    pub transport_ns: String,
    pub created_by_us: bool,
    pub dialect: Dialect,
}

/// Creates handlers for one description namespace
pub trait ContentHandlerFactory: Send + Sync {
    /// Media type of a peer-offered content
    fn media_type(&self, description: &Element) -> MediaType;

    fn create(&self, spec: &ContentSpec) -> Box<dyn ContentHandler>;
}

/// Description namespace to handler factory, plus known transports
#[derive(Default)]
pub struct ContentTypeRegistry {
    factories: HashMap<String, Arc<dyn ContentHandlerFactory>>,
    transports: HashSet<String>,
}

impl ContentTypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, content_ns: impl Into<String>, factory: Arc<dyn ContentHandlerFactory>) {
        self.factories.insert(content_ns.into(), factory);
    }

    pub fn register_transport(&mut self, transport_ns: impl Into<String>) {
        self.transports.insert(transport_ns.into());
    }

    pub fn factory(&self, content_ns: &str) -> Option<Arc<dyn ContentHandlerFactory>> {
        self.factories.get(content_ns).cloned()
    }

    /// Unknown transports are only refused once at least one is registered
    pub fn accepts_transport(&self, transport_ns: &str) -> bool {
        self.transports.is_empty() || self.transports.contains(transport_ns)
    }
}

impl std::fmt::Debug for ContentTypeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentTypeRegistry")
            .field("content_types", &self.factories.keys().collect::<Vec<_>>())
            .field("transports", &self.transports)
            .finish()
    }
}

/// Snapshot of a content handed to collaborators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentInfo {
    pub id: ContentId,
    pub media_type: MediaType,
    pub senders: Senders,
    pub disposition: String,
    pub state: ContentState,
    pub content_ns: String,
    pub transport_ns: String,
    pub created_by_us: bool,
    pub remote_mute: bool,
}

/// A content owned by a session
pub struct Content {
    id: ContentId,
    media_type: MediaType,
    senders: Senders,
    disposition: String,
    state: ContentState,
    content_ns: String,
    transport_ns: String,
    created_by_us: bool,
    remote_mute: bool,
    handler: Box<dyn ContentHandler>,
}

impl Content {
    pub fn new(id: ContentId, spec: &ContentSpec, handler: Box<dyn ContentHandler>) -> Self {
        Self {
            id,
            media_type: spec.media_type,
            senders: Senders::Both,
            disposition: DISPOSITION_SESSION.to_string(),
            state: if spec.created_by_us {
                ContentState::Empty
            } else {
                ContentState::New
            },
            content_ns: spec.content_ns.clone(),
            transport_ns: spec.transport_ns.clone(),
            created_by_us: spec.created_by_us,
            remote_mute: false,
            handler,
        }
    }

    pub fn id(&self) -> &ContentId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.id.name
    }

    pub fn creator(&self) -> Creator {
        self.id.creator
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn senders(&self) -> Senders {
        self.senders
    }

    pub fn set_senders(&mut self, senders: Senders) {
        self.senders = senders;
    }

    pub fn disposition(&self) -> &str {
        &self.disposition
    }

    pub fn set_disposition(&mut self, disposition: impl Into<String>) {
        self.disposition = disposition.into();
    }

    pub fn is_session_disposition(&self) -> bool {
        self.disposition == DISPOSITION_SESSION
    }

    pub fn state(&self) -> ContentState {
        self.state
    }

    pub fn set_state(&mut self, state: ContentState) {
        self.state = state;
    }

    pub fn content_ns(&self) -> &str {
        &self.content_ns
    }

    pub fn transport_ns(&self) -> &str {
        &self.transport_ns
    }

    pub fn created_by_us(&self) -> bool {
        self.created_by_us
    }

    pub fn remote_mute(&self) -> bool {
        self.remote_mute
    }

    pub fn set_remote_mute(&mut self, muted: bool) {
        if self.remote_mute != muted {
            self.remote_mute = muted;
            self.handler.remote_mute_changed(muted);
        }
    }

    /// Counts towards keeping the session alive
    pub fn is_active(&self) -> bool {
        self.state != ContentState::Removing
    }

    /// Handler is ready and the content has not been signalled yet
    pub fn is_ready(&self) -> bool {
        let unsignalled = if self.created_by_us {
            self.state == ContentState::Empty
        } else {
            self.state == ContentState::New
        };
        unsignalled && self.handler.is_ready()
    }

    pub fn handler(&self) -> &dyn ContentHandler {
        self.handler.as_ref()
    }

    pub fn handler_mut(&mut self) -> &mut dyn ContentHandler {
        self.handler.as_mut()
    }

    pub fn info(&self) -> ContentInfo {
        ContentInfo {
            id: self.id.clone(),
            media_type: self.media_type,
            senders: self.senders,
            disposition: self.disposition.clone(),
            state: self.state,
            content_ns: self.content_ns.clone(),
            transport_ns: self.transport_ns.clone(),
            created_by_us: self.created_by_us,
            remote_mute: self.remote_mute,
        }
    }

    /// Append `<content/>` for a standard-dialect message
    ///
    /// `full` adds the description and transport, otherwise only the
    /// identifying attributes are written (as content-remove needs).
    pub fn produce_node(&self, parent: &mut Element, full: bool) {
        let node = parent.push_child(
            Element::new("content")
                .attr_with("creator", self.id.creator.as_str())
                .attr_with("name", self.id.name.as_str()),
        );
        if !full {
            return;
        }
        if self.senders != Senders::Both {
            node.set_attr("senders", self.senders.as_str());
        }
        if !self.is_session_disposition() {
            node.set_attr("disposition", self.disposition.as_str());
        }

        let description = node.push_child(Element::with_ns("description", self.content_ns.as_str()));
        self.handler.produce_description(description);
        let transport = node.push_child(Element::with_ns("transport", self.transport_ns.as_str()));
        self.handler.produce_transport(transport);
    }
}

impl std::fmt::Debug for Content {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Content")
            .field("id", &self.id)
            .field("media_type", &self.media_type)
            .field("state", &self.state)
            .field("created_by_us", &self.created_by_us)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespaces;

    struct Fixed(bool);

    impl ContentHandler for Fixed {
        fn is_ready(&self) -> bool {
            self.0
        }
    }

    fn spec(created_by_us: bool) -> ContentSpec {
        ContentSpec {
            name: "audio".into(),
            media_type: MediaType::Audio,
            content_ns: namespaces::JINGLE_RTP.into(),
            transport_ns: "urn:xmpp:jingle:transports:ice-udp:1".into(),
            created_by_us,
            dialect: Dialect::V1,
        }
    }

    #[test]
    fn readiness_requires_unsignalled_state() {
        let mut ours = Content::new(
            ContentId::new("audio", Creator::Initiator),
            &spec(true),
            Box::new(Fixed(true)),
        );
        assert_eq!(ours.state(), ContentState::Empty);
        assert!(ours.is_ready());
        ours.set_state(ContentState::Sent);
        assert!(!ours.is_ready());

        let theirs = Content::new(
            ContentId::new("audio", Creator::Responder),
            &spec(false),
            Box::new(Fixed(false)),
        );
        assert_eq!(theirs.state(), ContentState::New);
        assert!(!theirs.is_ready());
    }

    #[test]
    fn content_node_omits_defaults() {
        let content = Content::new(
            ContentId::new("audio", Creator::Initiator),
            &spec(true),
            Box::new(Fixed(true)),
        );
        let mut jingle = Element::with_ns("jingle", namespaces::JINGLE);
        content.produce_node(&mut jingle, true);

        let node = jingle.child("content").unwrap();
        assert_eq!(node.attr("creator"), Some("initiator"));
        assert_eq!(node.attr("senders"), None);
        assert_eq!(node.attr("disposition"), None);
        assert!(node.child_ns("description", namespaces::JINGLE_RTP).is_some());
    }
}
