//! Building and queueing outbound messages

use tracing::debug;
use uuid::Uuid;

use super::session::Session;
use crate::content::{ContentId, ContentState};
use crate::errors::{JingleError, Result};
use crate::namespaces;
use crate::protocol::{produce_action, Action, Dialect, MediaType};
use crate::stanza::Stanza;
use crate::state_table::{action_defined_by_dialect, SessionState};
use crate::xml::Element;

/// What an outstanding request was for, so its reply can be acted on
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReplyContext {
    SessionInitiate,
    SessionAccept,
    ContentAdd(ContentId),
    ContentRemove(ContentId),
}

impl Session {
    /// Session element for `action`, with verb, sid and initiator set
    pub(super) fn new_message(&self, action: Action) -> Element {
        let initiator = if self.local_initiator {
            &self.local_jid
        } else {
            &self.peer
        };
        Element::with_ns(self.dialect.session_element(), self.dialect.session_ns())
            .attr_with(self.dialect.verb_attr(), produce_action(action, self.dialect))
            .attr_with("initiator", initiator.as_str())
            .attr_with(self.dialect.sid_attr(), self.sid.as_str())
    }

    fn wrap(&self, payload: Element) -> (String, Stanza) {
        let id = Uuid::new_v4().to_string();
        let stanza = Stanza::new_set(&self.peer, &id, payload);
        (id, stanza)
    }

    /// Queue a request for immediate sending
    pub(super) fn send(&mut self, payload: Element, reply: Option<ReplyContext>) -> String {
        let (id, stanza) = self.wrap(payload);
        debug!("Session {}: queueing request {}", self.sid, id);
        if let Some(context) = reply {
            self.pending_replies.insert(id.clone(), context);
        }
        self.outbox.push(stanza);
        id
    }

    /// Queue a request to go out after the reply to the current request
    pub(super) fn send_deferred(&mut self, payload: Element) {
        let (id, stanza) = self.wrap(payload);
        debug!("Session {}: deferring request {}", self.sid, id);
        self.deferred.push(stanza);
    }

    /// Send an RTP session-info payload, if the dialect has session-info
    pub(super) fn send_rtp_info(&mut self, name: &str, content_name: Option<&str>) {
        if !action_defined_by_dialect(self.dialect, Action::SessionInfo) {
            debug!(
                "Session {}: {} has no session-info, not sending {}",
                self.sid, self.dialect, name
            );
            return;
        }
        let mut msg = self.new_message(Action::SessionInfo);
        let mut info = Element::with_ns(name, namespaces::JINGLE_RTP_INFO);
        if let Some(content_name) = content_name {
            info.set_attr("name", content_name);
        }
        msg.push_child(info);
        self.send(msg, None);
    }

    pub(super) fn send_held(&mut self) {
        let name = if self.local_hold { "hold" } else { "unhold" };
        self.send_rtp_info(name, None);
    }

    /// Google messages carry a single description (and p2p transport)
    /// directly under the session element
    pub(super) fn produce_google_payload(&self, msg: &mut Element) {
        let video = self
            .contents
            .iter()
            .any(|c| c.media_type() == MediaType::Video);
        let ns = if video {
            namespaces::GOOGLE_SESSION_VIDEO
        } else {
            namespaces::GOOGLE_SESSION_PHONE
        };

        let description = msg.push_child(Element::with_ns("description", ns));
        for content in self.contents.iter().filter(|c| c.is_active()) {
            content.handler().produce_description(description);
        }

        if self.dialect == Dialect::GTalk4 {
            let transport =
                msg.push_child(Element::with_ns("transport", namespaces::GOOGLE_TRANSPORT_P2P));
            for content in self.contents.iter().filter(|c| c.is_active()) {
                content.handler().produce_transport(transport);
            }
        }
    }

    /// Send a content's current transport (new local candidates)
    ///
    /// Only signalled contents of a live session produce a message; for
    /// anything else this is a no-op.
    pub fn send_transport_info(&mut self, id: &ContentId) -> Result<()> {
        let content = self
            .contents
            .get(id)
            .ok_or_else(|| JingleError::bad_request(format!("no content {}", id)))?;

        let signalled = matches!(
            content.state(),
            ContentState::Sent | ContentState::Acknowledged
        );
        if !signalled
            || self.state < SessionState::PendingInitiateSent
            || self.state == SessionState::Ended
        {
            debug!(
                "Session {}: not sending transport-info for {} yet",
                self.sid, id
            );
            return Ok(());
        }

        let mut msg = self.new_message(Action::TransportInfo);
        match self.dialect {
            Dialect::GTalk3 => content.handler().produce_transport(&mut msg),
            Dialect::GTalk4 => {
                let transport = msg
                    .push_child(Element::with_ns("transport", namespaces::GOOGLE_TRANSPORT_P2P));
                content.handler().produce_transport(transport);
            }
            Dialect::V1 | Dialect::V015 => {
                let node = msg.push_child(
                    Element::new("content")
                        .attr_with("creator", content.creator().as_str())
                        .attr_with("name", content.name()),
                );
                let transport =
                    node.push_child(Element::with_ns("transport", content.transport_ns()));
                content.handler().produce_transport(transport);
            }
        }
        self.send(msg, None);
        Ok(())
    }

    /// Refuse a peer content whose description namespace is unknown
    pub(super) fn reject_unknown_content(&mut self, name: Option<&str>, creator: Option<&str>) {
        let mut msg = self.new_message(Action::ContentReject);
        let mut node = Element::new("content");
        if let Some(name) = name {
            node.set_attr("name", name);
        }
        if let Some(creator) = creator {
            node.set_attr("creator", creator);
        }
        msg.push_child(node);
        if self.dialect == Dialect::V1 {
            msg.push_child(Element::new("reason").child_with(Element::new("unsupported-applications")));
        }
        self.send_deferred(msg);
    }
}
