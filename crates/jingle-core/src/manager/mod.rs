//! Session factory and stanza routing
//!
//! [`SessionManager`] owns every live session of one connection, keyed by
//! peer address and session id. It classifies inbound stanzas, creates
//! sessions for new session-initiates, answers every request with a result
//! or error, routes replies back to the session that sent the request, and
//! drops sessions once they have ended.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::capabilities::CapabilityOracles;
use crate::config::EngineConfig;
use crate::content::ContentTypeRegistry;
use crate::errors::JingleError;
use crate::namespaces;
use crate::protocol::{detect, Action, Dialect, Reason};
use crate::session::{ReplyOutcome, Session, SessionParams, Subscribers};
use crate::stanza::{IqType, Stanza};
use crate::state_table::SessionState;

/// Where outbound stanzas go
pub trait MessageSink: Send + Sync {
    fn send(&self, stanza: Stanza);
}

/// [`MessageSink`] feeding an unbounded channel
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Stanza>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Stanza>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl MessageSink for ChannelSink {
    fn send(&self, stanza: Stanza) {
        if self.tx.send(stanza).is_err() {
            warn!("Outbound stanza channel closed, dropping stanza");
        }
    }
}

/// Identifies a session on a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey {
    pub peer: String,
    pub sid: String,
}

impl std::fmt::Display for SessionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.peer, self.sid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManagerEvent {
    /// A peer started a session with us
    NewSession(SessionKey),
    /// A session ended and was dropped
    SessionEnded { key: SessionKey, reason: Reason },
}

pub struct SessionManager {
    local_jid: String,
    config: EngineConfig,
    content_types: Arc<ContentTypeRegistry>,
    oracles: CapabilityOracles,
    sink: Arc<dyn MessageSink>,
    sessions: HashMap<SessionKey, Session>,
    /// Outstanding request id to the session that sent it
    reply_routes: HashMap<String, SessionKey>,
    events: Subscribers<ManagerEvent>,
}

impl SessionManager {
    pub fn new(
        local_jid: impl Into<String>,
        config: EngineConfig,
        content_types: ContentTypeRegistry,
        oracles: CapabilityOracles,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            local_jid: local_jid.into(),
            config,
            content_types: Arc::new(content_types),
            oracles,
            sink,
            sessions: HashMap::new(),
            reply_routes: HashMap::new(),
            events: Subscribers::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ManagerEvent> {
        self.events.subscribe()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session(&self, key: &SessionKey) -> Option<&Session> {
        self.sessions.get(key)
    }

    pub fn session_keys(&self) -> Vec<SessionKey> {
        self.sessions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Run a local operation on a session, then send what it queued
    pub fn with_session<R>(
        &mut self,
        key: &SessionKey,
        f: impl FnOnce(&mut Session) -> R,
    ) -> Option<R> {
        let session = self.sessions.get_mut(key)?;
        let result = f(session);
        self.flush(key);
        self.flush_deferred(key);
        self.reap(key);
        Some(result)
    }

    /// Start a session from our side
    pub fn create_session(
        &mut self,
        peer: &str,
        local_initiator: bool,
        local_hold: bool,
    ) -> SessionKey {
        let key = loop {
            let key = SessionKey {
                peer: peer.to_owned(),
                sid: Uuid::new_v4().simple().to_string(),
            };
            if !self.sessions.contains_key(&key) {
                break key;
            }
        };
        let dialect = self.choose_dialect(peer);
        info!("Creating outgoing session {} ({})", key, dialect);
        let session = self.new_session(&key, local_initiator, local_hold, dialect);
        self.sessions.insert(key.clone(), session);
        key
    }

    /// Newest dialect the peer advertises, or the configured default
    fn choose_dialect(&self, peer: &str) -> Dialect {
        if self.oracles.query(peer, namespaces::JINGLE) {
            Dialect::V1
        } else if self.oracles.query(peer, namespaces::JINGLE_015) {
            Dialect::V015
        } else {
            self.config.session.default_dialect
        }
    }

    fn new_session(
        &self,
        key: &SessionKey,
        local_initiator: bool,
        local_hold: bool,
        dialect: Dialect,
    ) -> Session {
        Session::new(SessionParams {
            sid: key.sid.clone(),
            peer: key.peer.clone(),
            local_jid: self.local_jid.clone(),
            local_initiator,
            dialect,
            local_hold,
            content_types: self.content_types.clone(),
            oracles: self.oracles.clone(),
        })
    }

    /// Handle an inbound stanza
    ///
    /// Returns false if the stanza is neither a session request nor a
    /// reply to one of our requests.
    pub fn handle_stanza(&mut self, stanza: &Stanza) -> bool {
        match stanza.iq_type() {
            Some(IqType::Result) | Some(IqType::Error) => {
                let Some(id) = stanza.id() else {
                    return false;
                };
                let outcome = if stanza.iq_type() == Some(IqType::Result) {
                    ReplyOutcome::Success
                } else {
                    ReplyOutcome::Failure
                };
                return self.handle_reply(id, outcome);
            }
            _ => {}
        }

        let Some(detected) = detect(stanza) else {
            return false;
        };
        let key = SessionKey {
            peer: detected.from.clone(),
            sid: detected.sid.clone(),
        };

        let is_new = !self.sessions.contains_key(&key);
        if is_new {
            if detected.action != Action::SessionInitiate {
                debug!("{} for unknown session {}", detected.action, key);
                self.sink.send(stanza.make_error(&JingleError::UnknownSession {
                    sid: detected.sid.clone(),
                }));
                return true;
            }
            let session = self.new_session(&key, false, self.config.session.local_hold, detected.dialect);
            self.sessions.insert(key.clone(), session);
        }

        let Some(session) = self.sessions.get_mut(&key) else {
            return false;
        };
        let result = session.handle_request(&detected, stanza);
        self.flush(&key);

        match &result {
            Ok(()) => self.sink.send(stanza.make_result()),
            Err(err) => {
                warn!("Session {}: refusing {}: {}", key.sid, detected.action, err);
                self.sink.send(stanza.make_error(err));
                if is_new {
                    if let Some(session) = self.sessions.get_mut(&key) {
                        if let Err(err) = session.terminate(Reason::Unknown, None) {
                            warn!("Session {}: terminate failed: {}", key.sid, err);
                        }
                    }
                }
            }
        }

        self.flush_deferred(&key);
        if is_new && result.is_ok() {
            info!("New incoming session {}", key);
            self.events.emit(ManagerEvent::NewSession(key.clone()));
        }
        self.reap(&key);
        true
    }

    /// Deliver the peer's answer to one of our requests
    pub fn handle_reply(&mut self, iq_id: &str, outcome: ReplyOutcome) -> bool {
        let Some(key) = self.reply_routes.remove(iq_id) else {
            debug!("Reply {} does not belong to any session", iq_id);
            return false;
        };
        let Some(session) = self.sessions.get_mut(&key) else {
            return false;
        };
        let consumed = session.handle_reply(iq_id, outcome);
        self.flush(&key);
        self.flush_deferred(&key);
        self.reap(&key);
        consumed
    }

    fn flush(&mut self, key: &SessionKey) {
        let Some(session) = self.sessions.get_mut(key) else {
            return;
        };
        let stanzas = session.take_outbound();
        self.send_all(key, stanzas);
    }

    fn flush_deferred(&mut self, key: &SessionKey) {
        let Some(session) = self.sessions.get_mut(key) else {
            return;
        };
        let stanzas = session.take_deferred();
        self.send_all(key, stanzas);
    }

    fn send_all(&mut self, key: &SessionKey, stanzas: Vec<Stanza>) {
        for stanza in stanzas {
            if let Some(id) = stanza.id() {
                self.reply_routes.insert(id.to_owned(), key.clone());
            }
            self.sink.send(stanza);
        }
    }

    /// Drop the session if it has ended
    fn reap(&mut self, key: &SessionKey) {
        let ended = self
            .sessions
            .get(key)
            .map_or(false, |s| s.state() == SessionState::Ended);
        if !ended {
            return;
        }
        if let Some(mut session) = self.sessions.remove(key) {
            let reason = session.termination_reason().unwrap_or_default();
            session.dispose();
            self.reply_routes.retain(|_, routed| routed != key);
            debug!("Dropped ended session {}", key);
            self.events.emit(ManagerEvent::SessionEnded {
                key: key.clone(),
                reason,
            });
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("local_jid", &self.local_jid)
            .field("sessions", &self.sessions.len())
            .field("pending_replies", &self.reply_routes.len())
            .finish()
    }
}
