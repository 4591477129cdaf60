// Shared fixtures for the session integration tests
//
// A scripted content handler stands in for the media layer: it records every
// call into a shared log and reports ready when the test flips a flag.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use jingle_core::capabilities::QuirkResolver;
use jingle_core::content::{ContentHandler, ContentHandlerFactory, ContentSpec, ContentTypeRegistry};
use jingle_core::namespaces;
use jingle_core::prelude::*;
use jingle_core::xml::Element;

/// The remote party
pub const ALICE: &str = "alice@example.com/phone";
/// Us
pub const BOB: &str = "bob@example.com/desk";

pub const ICE_UDP: &str = "urn:xmpp:jingle:transports:ice-udp:1";
pub const FILE_TRANSFER: &str = "urn:xmpp:jingle:apps:file-transfer:3";

pub type CallLog = Arc<Mutex<Vec<String>>>;

pub struct ScriptedHandler {
    name: String,
    ready: Arc<AtomicBool>,
    log: CallLog,
}

impl ScriptedHandler {
    fn record(&self, what: &str) {
        self.log.lock().push(format!("{}:{}", what, self.name));
    }
}

impl ContentHandler for ScriptedHandler {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn parse_description(&mut self, _description: &Element) -> jingle_core::Result<()> {
        self.record("description");
        Ok(())
    }

    fn parse_transport(&mut self, transport: &Element) -> jingle_core::Result<()> {
        if transport.child("bad").is_some() {
            return Err(JingleError::bad_request("unusable candidate"));
        }
        self.record("transport");
        Ok(())
    }

    fn parse_info(&mut self, _payload: &Element) -> jingle_core::Result<()> {
        self.record("info");
        Ok(())
    }

    fn produce_description(&self, description: &mut Element) {
        description.push_child(Element::new("payload-type").attr_with("id", "0").attr_with("name", "PCMU"));
    }

    fn retransmit_candidates(&mut self) {
        self.record("retransmit");
    }

    fn remote_mute_changed(&mut self, muted: bool) {
        self.record(if muted { "muted" } else { "unmuted" });
    }
}

pub struct ScriptedFactory {
    fallback: MediaType,
    ready: Arc<AtomicBool>,
    log: CallLog,
}

impl ContentHandlerFactory for ScriptedFactory {
    fn media_type(&self, description: &Element) -> MediaType {
        match description.attr("media") {
            Some("audio") => MediaType::Audio,
            Some("video") => MediaType::Video,
            _ => self.fallback,
        }
    }

    fn create(&self, spec: &ContentSpec) -> Box<dyn ContentHandler> {
        self.log.lock().push(format!("create:{}", spec.name));
        Box::new(ScriptedHandler {
            name: spec.name.clone(),
            ready: self.ready.clone(),
            log: self.log.clone(),
        })
    }
}

/// A manager wired to a channel sink, scripted handlers and a capability cache
pub struct Harness {
    pub manager: SessionManager,
    pub outbound: mpsc::UnboundedReceiver<Stanza>,
    pub ready: Arc<AtomicBool>,
    pub log: CallLog,
    pub caps: Arc<PeerCapabilityCache>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let ready = Arc::new(AtomicBool::new(false));
        let log: CallLog = Arc::new(Mutex::new(Vec::new()));
        let caps = Arc::new(PeerCapabilityCache::new(QuirkResolver::default()));

        let mut oracles = CapabilityOracles::new();
        oracles.push(caps.clone());

        let (sink, outbound) = ChannelSink::new();
        let manager = SessionManager::new(
            BOB,
            config,
            content_types(&ready, &log),
            oracles,
            Arc::new(sink),
        );
        Self {
            manager,
            outbound,
            ready,
            log,
            caps,
        }
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Everything sent since the last call
    pub fn sent(&mut self) -> Vec<Stanza> {
        let mut stanzas = Vec::new();
        while let Ok(stanza) = self.outbound.try_recv() {
            stanzas.push(stanza);
        }
        stanzas
    }

    /// Sent requests (type `set`) only
    pub fn sent_requests(&mut self) -> Vec<Stanza> {
        self.sent()
            .into_iter()
            .filter(|s| s.iq_type() == Some(jingle_core::stanza::IqType::Set))
            .collect()
    }

    pub fn deliver(&mut self, xml: &str) -> bool {
        let stanza = Stanza::parse(xml).expect("test stanza parses");
        self.manager.handle_stanza(&stanza)
    }

    /// Answer one of our requests with an empty result
    pub fn ack(&mut self, request: &Stanza) -> bool {
        let id = request.id().expect("request has an id");
        self.deliver(&format!(
            "<iq xmlns='jabber:client' type='result' id='{}' from='{}' to='{}'/>",
            id, ALICE, BOB
        ))
    }

    /// Answer one of our requests with an error
    pub fn refuse(&mut self, request: &Stanza) -> bool {
        let id = request.id().expect("request has an id");
        self.deliver(&format!(
            "<iq xmlns='jabber:client' type='error' id='{}' from='{}' to='{}'><error type='cancel'><not-acceptable xmlns='urn:ietf:params:xml:ns:xmpp-stanzas'/></error></iq>",
            id, ALICE, BOB
        ))
    }

    pub fn session(&self, sid: &str) -> Option<&Session> {
        self.manager.session(&key(sid))
    }

    /// Tell the cache the peer omits content creators
    pub fn mark_peer_buggy(&self) {
        let disco = Element::parse(
            r#"<query xmlns="http://jabber.org/protocol/disco#info"><identity category="client" type="pc" name="Telepathy Gabble 0.7.20"/><feature var="urn:xmpp:jingle:1"/></query>"#,
        )
        .expect("disco parses");
        self.caps.update_from_disco(ALICE, &disco);
    }
}

pub fn content_types(ready: &Arc<AtomicBool>, log: &CallLog) -> ContentTypeRegistry {
    let factory = |fallback| -> Arc<dyn ContentHandlerFactory> {
        Arc::new(ScriptedFactory {
            fallback,
            ready: ready.clone(),
            log: log.clone(),
        })
    };

    let mut registry = ContentTypeRegistry::new();
    registry.register(namespaces::JINGLE_RTP, factory(MediaType::Audio));
    registry.register(namespaces::GOOGLE_SESSION_PHONE, factory(MediaType::Audio));
    registry.register(namespaces::GOOGLE_SESSION_VIDEO, factory(MediaType::Video));
    registry.register(FILE_TRANSFER, factory(MediaType::None));
    registry.register_transport(ICE_UDP);
    registry.register_transport(namespaces::GOOGLE_TRANSPORT_P2P);
    registry
}

/// A session outside any manager, with no capability oracles
pub fn standalone_session(sid: &str, local_initiator: bool, ready: &Arc<AtomicBool>, log: &CallLog) -> Session {
    Session::new(SessionParams {
        sid: sid.to_string(),
        peer: ALICE.to_string(),
        local_jid: BOB.to_string(),
        local_initiator,
        dialect: Dialect::V1,
        local_hold: false,
        content_types: Arc::new(content_types(ready, log)),
        oracles: CapabilityOracles::new(),
    })
}

pub fn key(sid: &str) -> SessionKey {
    SessionKey {
        peer: ALICE.to_string(),
        sid: sid.to_string(),
    }
}

/// Wrap a payload in an inbound `set` from the peer
pub fn iq_set(id: &str, payload: &str) -> String {
    format!(
        "<iq xmlns='jabber:client' type='set' id='{}' from='{}' to='{}'>{}</iq>",
        id, ALICE, BOB, payload
    )
}

/// Current-dialect session element
pub fn jingle(action: &str, sid: &str, body: &str) -> String {
    format!(
        "<jingle xmlns='urn:xmpp:jingle:1' action='{}' sid='{}' initiator='{}'>{}</jingle>",
        action, sid, ALICE, body
    )
}

/// RTP content offer
pub fn rtp_content(name: &str, creator: &str, media: &str) -> String {
    format!(
        "<content creator='{}' name='{}'><description xmlns='urn:xmpp:jingle:apps:rtp:1' media='{}'/><transport xmlns='{}'/></content>",
        creator, name, media, ICE_UDP
    )
}

/// RTP content offer without a creator attribute
pub fn rtp_content_without_creator(name: &str) -> String {
    format!(
        "<content name='{}'><description xmlns='urn:xmpp:jingle:apps:rtp:1' media='audio'/><transport xmlns='{}'/></content>",
        name, ICE_UDP
    )
}

pub fn file_content(name: &str, creator: &str) -> String {
    format!(
        "<content creator='{}' name='{}'><description xmlns='{}'/><transport xmlns='{}'/></content>",
        creator, name, FILE_TRANSFER, ICE_UDP
    )
}

/// Payload element of an outbound request
pub fn payload(stanza: &Stanza) -> &Element {
    stanza.payload().expect("request has a payload")
}

/// Verb of an outbound request, whatever the dialect
pub fn verb(stanza: &Stanza) -> String {
    let payload = payload(stanza);
    payload
        .attr("action")
        .or_else(|| payload.attr("type"))
        .unwrap_or_default()
        .to_string()
}

/// Error condition of an error reply
pub fn error_conditions(stanza: &Stanza) -> Vec<String> {
    stanza
        .root()
        .child("error")
        .map(|error| error.children().map(|c| c.name().to_string()).collect())
        .unwrap_or_default()
}

pub fn replies_of(stanzas: &[Stanza], kind: jingle_core::stanza::IqType) -> Vec<&Stanza> {
    stanzas.iter().filter(|s| s.iq_type() == Some(kind)).collect()
}

/// Drain buffered events without waiting
pub fn drain<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
