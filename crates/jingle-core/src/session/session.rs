use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::events::{SessionEvent, Subscribers};
use super::outbound::ReplyContext;
use crate::capabilities::{
    CapabilityOracles, QUIRK_GOOGLE_WEBMAIL_CLIENT, QUIRK_OMITS_CONTENT_CREATORS,
};
use crate::content::{
    Content, ContentId, ContentInfo, ContentRegistry, ContentSpec, ContentState,
    ContentTypeRegistry,
};
use crate::errors::{JingleError, Result};
use crate::protocol::detect::session_node;
use crate::protocol::{Action, Creator, Detected, Dialect, MediaType, Reason, Senders};
use crate::stanza::Stanza;
use crate::state_table::{action_defined_by_dialect, check_action, SessionState};
use crate::xml::Element;

/// Everything needed to create a [`Session`]
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub sid: String,
    /// Full address of the remote party
    pub peer: String,
    /// Our own full address, used for the `initiator` attribute
    pub local_jid: String,
    pub local_initiator: bool,
    pub dialect: Dialect,
    pub local_hold: bool,
    pub content_types: Arc<ContentTypeRegistry>,
    pub oracles: CapabilityOracles,
}

/// One negotiated session with one peer
///
/// All entry points are synchronous. Outbound stanzas are queued and
/// collected with [`Session::take_outbound`] (sent right away) and
/// [`Session::take_deferred`] (sent after the reply to the current request).
#[derive(Debug)]
pub struct Session {
    pub(super) sid: String,
    pub(super) peer: String,
    pub(super) local_jid: String,
    pub(super) dialect: Dialect,
    pub(super) state: SessionState,
    pub(super) local_initiator: bool,
    pub(super) locally_accepted: bool,
    pub(super) locally_terminated: bool,
    pub(super) local_hold: bool,
    pub(super) remote_hold: bool,
    pub(super) remote_ringing: bool,
    pub(super) terminate_reason: Option<Reason>,
    pub(super) terminate_text: Option<String>,
    pub(super) contents: ContentRegistry,
    pub(super) content_types: Arc<ContentTypeRegistry>,
    pub(super) oracles: CapabilityOracles,
    pub(super) events: Subscribers<SessionEvent>,
    pub(super) outbox: Vec<Stanza>,
    pub(super) deferred: Vec<Stanza>,
    pub(super) pending_replies: HashMap<String, ReplyContext>,
    /// Suppresses auto-termination while content-replace swaps contents
    pub(super) replacing: bool,
}

impl Session {
    pub fn new(params: SessionParams) -> Self {
        debug!(
            "Creating session {} with {} (local initiator: {}, {})",
            params.sid, params.peer, params.local_initiator, params.dialect
        );
        Self {
            sid: params.sid,
            peer: params.peer,
            local_jid: params.local_jid,
            dialect: params.dialect,
            state: SessionState::PendingCreated,
            local_initiator: params.local_initiator,
            locally_accepted: false,
            locally_terminated: false,
            local_hold: params.local_hold,
            remote_hold: false,
            remote_ringing: false,
            terminate_reason: None,
            terminate_text: None,
            contents: ContentRegistry::new(),
            content_types: params.content_types,
            oracles: params.oracles,
            events: Subscribers::new(),
            outbox: Vec::new(),
            deferred: Vec::new(),
            pending_replies: HashMap::new(),
            replacing: false,
        }
    }

    pub fn sid(&self) -> &str {
        &self.sid
    }

    pub fn peer(&self) -> &str {
        &self.peer
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_local_initiator(&self) -> bool {
        self.local_initiator
    }

    pub fn is_locally_accepted(&self) -> bool {
        self.locally_accepted
    }

    pub fn locally_terminated(&self) -> bool {
        self.locally_terminated
    }

    pub fn local_hold(&self) -> bool {
        self.local_hold
    }

    pub fn remote_hold(&self) -> bool {
        self.remote_hold
    }

    pub fn remote_ringing(&self) -> bool {
        self.remote_ringing
    }

    /// Set once the session has ended
    pub fn termination_reason(&self) -> Option<Reason> {
        self.terminate_reason
    }

    pub fn termination_text(&self) -> Option<&str> {
        self.terminate_text.as_deref()
    }

    /// Receive every event emitted from now on
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.subscribe()
    }

    pub(super) fn emit(&mut self, event: SessionEvent) {
        self.events.emit(event);
    }

    /// Ask the collaborator layer about the peer
    pub fn peer_has_capability(&self, token: &str) -> bool {
        self.oracles.query(&self.peer, token)
    }

    pub(super) fn omits_content_creators(&self) -> bool {
        self.peer_has_capability(QUIRK_OMITS_CONTENT_CREATORS)
    }

    /// Whether contents may be added or removed after the initial offer
    pub fn can_modify_contents(&self) -> bool {
        !self.dialect.is_google() && !self.peer_has_capability(QUIRK_GOOGLE_WEBMAIL_CLIENT)
    }

    /// Snapshot of all contents, initiator partition first
    pub fn get_contents(&self) -> Vec<ContentInfo> {
        self.contents.infos()
    }

    pub fn content(&self, id: &ContentId) -> Option<&Content> {
        self.contents.get(id)
    }

    pub fn content_mut(&mut self, id: &ContentId) -> Option<&mut Content> {
        self.contents.get_mut(id)
    }

    /// Stanzas to send now
    pub fn take_outbound(&mut self) -> Vec<Stanza> {
        std::mem::take(&mut self.outbox)
    }

    /// Stanzas to send once the current request has been answered
    pub fn take_deferred(&mut self) -> Vec<Stanza> {
        std::mem::take(&mut self.deferred)
    }

    /// Process an inbound request already classified by [`crate::protocol::detect`]
    ///
    /// On error nothing has been mutated and the caller replies to the peer
    /// with the error's condition.
    pub fn handle_request(&mut self, detected: &Detected, stanza: &Stanza) -> Result<()> {
        if detected.from != self.peer {
            return Err(JingleError::bad_request(format!(
                "sender {} does not match session peer",
                detected.from
            )));
        }
        if detected.sid != self.sid {
            return Err(JingleError::bad_request(format!(
                "session id {} does not match {}",
                detected.sid, self.sid
            )));
        }

        let (node, dialect) = session_node(stanza.root())
            .ok_or_else(|| JingleError::bad_request("missing session element"))?;

        if self.state == SessionState::PendingCreated && !self.local_initiator {
            self.dialect = dialect;
        } else if dialect.is_google() != self.dialect.is_google()
            || (!dialect.is_google() && dialect != self.dialect)
        {
            return Err(JingleError::bad_request(format!(
                "{} message in a {} session",
                dialect, self.dialect
            )));
        }

        check_action(self.dialect, detected.action, self.state)?;
        debug!(
            "Session {}: handling {} in state {}",
            self.sid, detected.action, self.state
        );
        self.dispatch(detected.action, node)
    }

    /// Local side agrees to the session
    ///
    /// For an outgoing session this means "send the offer once the contents
    /// are ready"; for an incoming one, "answer once they are ready".
    pub fn accept(&mut self) {
        if !self.locally_accepted {
            debug!("Session {}: locally accepted", self.sid);
        }
        self.locally_accepted = true;
        self.try_session_initiate_or_accept();
    }

    /// End the session
    ///
    /// Safe to call in any state; once Ended this does nothing. With
    /// [`Reason::Unknown`] the peer is told `success` if the session was
    /// active and `cancel` otherwise.
    pub fn terminate(&mut self, reason: Reason, text: Option<&str>) -> Result<()> {
        self.end_locally(reason, text.map(str::to_owned));
        Ok(())
    }

    pub(super) fn end_locally(&mut self, reason: Reason, text: Option<String>) {
        if self.state == SessionState::Ended {
            debug!("Session {}: already ended", self.sid);
            return;
        }

        let wire_reason = match reason {
            Reason::Unknown if self.state == SessionState::Active => Reason::Success,
            Reason::Unknown => Reason::Cancel,
            other => other,
        };

        if self.state != SessionState::PendingCreated {
            let mut msg = self.new_message(Action::SessionTerminate);
            if self.dialect == Dialect::V1 {
                let reason_node = msg.push_child(Element::new("reason"));
                if let Some(name) = wire_reason.wire_name() {
                    reason_node.push_child(Element::new(name));
                }
                if let Some(text) = text.as_deref() {
                    reason_node.push_child(Element::new("text").text_with(text));
                }
            }
            self.send(msg, None);
        }

        info!(
            "Session {}: terminating locally ({})",
            self.sid,
            wire_reason.as_ref()
        );
        self.locally_terminated = true;
        self.transition(SessionState::Ended, reason, text);
    }

    /// Create a local content
    ///
    /// The content is offered once its handler reports ready (see
    /// [`Session::content_ready`]). An empty or colliding name is replaced
    /// by a unique one derived from the media type.
    pub fn add_content(
        &mut self,
        media_type: MediaType,
        senders: Senders,
        name: Option<&str>,
        content_ns: &str,
        transport_ns: &str,
    ) -> Result<ContentId> {
        if self.state == SessionState::Ended {
            return Err(JingleError::out_of_order("session has ended"));
        }
        let factory = self
            .content_types
            .factory(content_ns)
            .ok_or_else(|| JingleError::unknown_content_type(content_ns))?;
        if !self.content_types.accepts_transport(transport_ns) {
            return Err(JingleError::bad_request(format!(
                "unsupported transport '{}'",
                transport_ns
            )));
        }

        let base = name
            .filter(|n| !n.is_empty())
            .unwrap_or(media_type.default_content_name());
        let name = self.unique_content_name(base);
        let creator = if self.local_initiator || self.dialect.is_google() {
            Creator::Initiator
        } else {
            Creator::Responder
        };

        let spec = ContentSpec {
            name: name.clone(),
            media_type,
            content_ns: content_ns.to_owned(),
            transport_ns: transport_ns.to_owned(),
            created_by_us: true,
            dialect: self.dialect,
        };
        let mut content = Content::new(ContentId::new(name, creator), &spec, factory.create(&spec));
        content.set_senders(senders);

        let info = content.info();
        let id = self.contents.insert(content)?;
        info!("Session {}: added local content {}", self.sid, id);
        self.emit(SessionEvent::NewContent(info));
        Ok(id)
    }

    fn unique_content_name(&self, base: &str) -> String {
        let mut candidate = base.to_owned();
        let mut suffix = 1;
        while self.contents.contains_name(&candidate) {
            candidate = format!("{}_{}", base, suffix);
            suffix += 1;
        }
        candidate
    }

    /// Remove a content
    ///
    /// With other active contents left and the content already signalled,
    /// the peer is told first and removal completes on its reply. The last
    /// active content is removed at once, which ends the session.
    pub fn remove_content(&mut self, id: &ContentId) -> Result<()> {
        let content = self
            .contents
            .get(id)
            .ok_or_else(|| JingleError::bad_request(format!("no content {}", id)))?;

        let content_state = content.state();
        if content_state == ContentState::Removing {
            return Ok(());
        }

        let signal_peer = self.state != SessionState::Ended
            && self.contents.active_count() > 1
            && content_state != ContentState::Empty;
        let action = if content_state == ContentState::New {
            Action::ContentReject
        } else {
            Action::ContentRemove
        };
        if !signal_peer || !action_defined_by_dialect(self.dialect, action) {
            self.remove_content_now(id);
            return Ok(());
        }

        let mut msg = self.new_message(action);
        content.produce_node(&mut msg, false);
        if let Some(content) = self.contents.get_mut(id) {
            content.set_state(ContentState::Removing);
        }
        debug!("Session {}: removing {} via {}", self.sid, id, action);
        self.send(msg, Some(ReplyContext::ContentRemove(id.clone())));
        Ok(())
    }

    /// Drop a content and react to what is left
    pub(super) fn remove_content_now(&mut self, id: &ContentId) {
        let Some(content) = self.contents.remove(id) else {
            return;
        };
        info!("Session {}: content {} removed", self.sid, id);
        self.emit(SessionEvent::ContentRemoved(content.info()));

        if self.state == SessionState::Ended || self.replacing {
            return;
        }
        self.check_remaining_contents();
    }

    /// Terminate if nothing is left, otherwise retry the offer or answer
    pub(super) fn check_remaining_contents(&mut self) {
        if self.contents.active_count() == 0 {
            info!("Session {}: no active contents left", self.sid);
            self.end_locally(Reason::Unknown, None);
        } else {
            self.try_session_initiate_or_accept();
        }
    }

    /// Put the call on hold (or take it off)
    pub fn set_local_hold(&mut self, held: bool) {
        self.local_hold = held;
        if self.state >= SessionState::PendingInitiated && self.state < SessionState::Ended {
            self.send_held();
        }
    }

    pub(super) fn set_state(&mut self, state: SessionState) {
        self.transition(state, Reason::Unknown, None);
    }

    /// Move forward in the lifecycle; backwards or same-state moves are ignored
    pub(super) fn transition(&mut self, state: SessionState, reason: Reason, text: Option<String>) {
        if state <= self.state {
            debug!(
                "Session {}: ignoring transition {} -> {}",
                self.sid, self.state, state
            );
            return;
        }

        let from = self.state;
        self.state = state;
        info!("Session {}: {} -> {}", self.sid, from, state);
        self.emit(SessionEvent::StateChanged { from, to: state });

        if state == SessionState::Ended {
            self.terminate_reason = Some(reason);
            self.terminate_text = text.clone();
            self.emit(SessionEvent::Terminated {
                locally_terminated: self.locally_terminated,
                reason,
                text,
            });
            return;
        }

        if self.local_hold && state >= SessionState::PendingInitiated {
            self.send_held();
        }
    }

    /// Release contents and subscribers
    pub fn dispose(&mut self) {
        let contents = self.contents.drain();
        debug!(
            "Session {}: disposing {} contents",
            self.sid,
            contents.len()
        );
        self.pending_replies.clear();
        self.events.clear();
    }
}
