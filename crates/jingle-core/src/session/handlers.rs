//! Inbound action handlers
//!
//! Every handler resolves the contents a message names, and checks the
//! elements it needs, before touching session or content state. Content
//! handlers see payloads in message order and the first handler error
//! stops the walk; content states only change once every handler call has
//! succeeded. Per-content transport-info on standard dialects is the
//! exception: one bad content must not block the others.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use super::events::SessionEvent;
use super::session::Session;
use crate::content::{
    Content, ContentId, ContentSpec, ContentState, DISPOSITION_SESSION,
};
use crate::errors::{JingleError, Result};
use crate::namespaces;
use crate::protocol::{Action, Creator, Dialect, MediaType, Reason, Senders};
use crate::state_table::SessionState;
use crate::xml::Element;

/// Contents parsed from an offer, not yet part of the session
#[derive(Default)]
struct ParsedOffer {
    contents: Vec<Content>,
    /// (name, creator) of contents with an unknown description namespace
    rejected: Vec<(Option<String>, Option<String>)>,
}

/// One understood session-info child, validated but not yet applied
enum InfoPayload {
    Active,
    Ringing,
    Hold,
    Unhold,
    /// `None` targets every RTP content
    Mute(Option<ContentId>, bool),
}

impl Session {
    pub(super) fn dispatch(&mut self, action: Action, node: &Element) -> Result<()> {
        match action {
            Action::SessionInitiate => self.on_session_initiate(node),
            Action::SessionAccept => self.on_session_accept(node),
            Action::SessionTerminate => self.on_session_terminate(node),
            Action::SessionInfo => self.on_session_info(node),
            Action::ContentAdd => self.on_content_add(node),
            Action::ContentRemove => self.on_content_remove(node),
            Action::ContentModify => self.on_content_modify(node),
            Action::ContentReplace => self.on_content_replace(node),
            Action::ContentAccept => self.on_content_accept(node),
            Action::ContentReject => self.on_content_reject(node),
            Action::TransportInfo => self.on_transport_info(node),
            Action::TransportAccept => {
                debug!("Session {}: ignoring transport-accept", self.sid);
                Ok(())
            }
            Action::DescriptionInfo => self.on_description_info(node),
            Action::Info => self.on_info(node),
            Action::Unknown => Err(JingleError::bad_request("unknown session action")),
        }
    }

    /// Resolve the content a `<content/>` child refers to
    pub(super) fn lookup_content(
        &self,
        node: &Element,
        fail_if_missing: bool,
    ) -> Result<Option<ContentId>> {
        self.contents.lookup(
            node.attr("name"),
            node.attr("creator"),
            self.dialect,
            self.omits_content_creators(),
            fail_if_missing,
        )
    }

    fn require_content(&self, node: &Element) -> Result<ContentId> {
        self.lookup_content(node, true)?.ok_or_else(|| {
            JingleError::bad_request(format!(
                "content '{}' does not exist",
                node.attr("name").unwrap_or_default()
            ))
        })
    }

    /// Resolve every `<content/>` child before acting on any of them
    fn require_contents<'a>(&self, node: &'a Element) -> Result<Vec<(ContentId, &'a Element)>> {
        let mut found = Vec::new();
        for child in node.children_named("content") {
            found.push((self.require_content(child)?, child));
        }
        Ok(found)
    }

    fn on_session_initiate(&mut self, node: &Element) -> Result<()> {
        if self.local_initiator {
            warn!(
                "Session {}: peer sent session-initiate for our own session",
                self.sid
            );
            self.end_locally(Reason::Busy, None);
            return Ok(());
        }

        let offer = self.parse_offer(node, &[])?;
        if offer.contents.is_empty() {
            return Err(JingleError::bad_request(
                "session-initiate without any content",
            ));
        }
        self.commit_offer(offer)?;
        self.set_state(SessionState::PendingInitiated);
        self.send_rtp_info("ringing", None);
        Ok(())
    }

    fn on_session_accept(&mut self, node: &Element) -> Result<()> {
        let targets: Vec<(ContentId, &Element)> = if self.dialect.is_google() {
            self.contents
                .ids_in(Creator::Initiator)
                .into_iter()
                .map(|id| (id, node))
                .collect()
        } else {
            self.require_contents(node)?
        };
        self.accept_contents(targets)?;

        self.set_state(SessionState::Active);
        if self.dialect != Dialect::V1 {
            // no <active/> notification in older dialects; accept ends ringing
            self.remote_ringing = false;
            self.emit(SessionEvent::RemoteStateChanged);
        }
        Ok(())
    }

    /// Peer accepted some of our offered contents
    ///
    /// Contents not waiting for an answer are skipped. None is marked
    /// acknowledged unless every handler took its payload.
    fn accept_contents(&mut self, targets: Vec<(ContentId, &Element)>) -> Result<()> {
        let mut accepted = Vec::new();
        for (id, node) in targets {
            let Some(content) = self.contents.get_mut(&id) else {
                continue;
            };
            if content.state() != ContentState::Sent {
                debug!(
                    "Session {}: ignoring accept for {} in state {:?}",
                    self.sid,
                    id,
                    content.state()
                );
                continue;
            }
            if let Some(description) = node.child("description") {
                content.handler_mut().parse_description(description)?;
            }
            if let Some(transport) = node.child("transport") {
                content.handler_mut().parse_transport(transport)?;
            }
            accepted.push(id);
        }

        for id in accepted {
            if let Some(content) = self.contents.get_mut(&id) {
                content.set_state(ContentState::Acknowledged);
                debug!("Session {}: content {} acknowledged", self.sid, id);
            }
        }
        Ok(())
    }

    fn on_session_terminate(&mut self, node: &Element) -> Result<()> {
        let (reason, text) = parse_reason(node);
        info!(
            "Session {}: peer terminated ({:?}{})",
            self.sid,
            reason,
            text.as_deref().map(|t| format!(": {}", t)).unwrap_or_default()
        );
        self.transition(SessionState::Ended, reason, text);
        Ok(())
    }

    fn on_session_info(&mut self, node: &Element) -> Result<()> {
        if !node.has_children() {
            debug!("Session {}: session-info ping", self.sid);
            return Ok(());
        }

        let mut payloads = Vec::new();
        for child in node.children() {
            if let Some(payload) = self.parse_info_payload(child)? {
                payloads.push(payload);
            }
        }
        if payloads.is_empty() {
            return Err(JingleError::unsupported_info(format!(
                "no recognized payload in session-info for {}",
                self.sid
            )));
        }

        for payload in payloads {
            self.apply_info_payload(payload);
        }
        self.emit(SessionEvent::RemoteStateChanged);
        Ok(())
    }

    /// Classify one session-info child; `Ok(None)` if it is not understood
    fn parse_info_payload(&self, payload: &Element) -> Result<Option<InfoPayload>> {
        let name = payload.attr("name");
        let parsed = match (payload.ns(), payload.name()) {
            (Some(namespaces::JINGLE_RTP_INFO), "active") => InfoPayload::Active,
            (Some(namespaces::JINGLE_RTP_INFO), "ringing") => InfoPayload::Ringing,
            (Some(namespaces::JINGLE_RTP_INFO), "hold") => InfoPayload::Hold,
            (Some(namespaces::JINGLE_RTP_INFO), "unhold") => InfoPayload::Unhold,
            (
                Some(
                    namespaces::JINGLE_RTP_INFO
                    | namespaces::GOOGLE_SESSION_PHONE
                    | namespaces::GOOGLE_SESSION_VIDEO,
                ),
                verb @ ("mute" | "unmute"),
            ) => InfoPayload::Mute(self.mute_target(name)?, verb == "mute"),
            _ => return Ok(None),
        };
        Ok(Some(parsed))
    }

    /// The RTP content a mute payload names, if it names one
    fn mute_target(&self, name: Option<&str>) -> Result<Option<ContentId>> {
        let Some(name) = name else {
            return Ok(None);
        };
        let id = self
            .contents
            .find_by_name(name)
            .ok_or_else(|| JingleError::bad_request(format!("content '{}' does not exist", name)))?;
        match self.contents.get(&id) {
            Some(content) if content.media_type().is_rtp() => Ok(Some(id)),
            _ => Err(JingleError::bad_request(format!(
                "mute for non-RTP content '{}'",
                name
            ))),
        }
    }

    fn apply_info_payload(&mut self, payload: InfoPayload) {
        match payload {
            InfoPayload::Active => {
                self.set_remote_mute(None, false);
                self.remote_hold = false;
                self.remote_ringing = false;
            }
            InfoPayload::Ringing => self.remote_ringing = true,
            InfoPayload::Hold => self.remote_hold = true,
            InfoPayload::Unhold => self.remote_hold = false,
            InfoPayload::Mute(target, muted) => self.set_remote_mute(target.as_ref(), muted),
        }
    }

    /// Mute one RTP content, or all of them
    fn set_remote_mute(&mut self, target: Option<&ContentId>, muted: bool) {
        match target {
            Some(id) => {
                if let Some(content) = self.contents.get_mut(id) {
                    content.set_remote_mute(muted);
                }
            }
            None => {
                for content in self.contents.iter_mut() {
                    if content.media_type().is_rtp() {
                        content.set_remote_mute(muted);
                    }
                }
            }
        }
    }

    fn on_content_add(&mut self, node: &Element) -> Result<()> {
        let offer = self.parse_offer(node, &[])?;
        self.commit_offer(offer)
    }

    fn on_content_remove(&mut self, node: &Element) -> Result<()> {
        for (id, _) in self.require_contents(node)? {
            self.remove_content_now(&id);
        }
        Ok(())
    }

    fn on_content_reject(&mut self, node: &Element) -> Result<()> {
        let (reason, text) = parse_reason(node);
        let reason = match reason {
            Reason::Unknown => Reason::GeneralError,
            other => other,
        };

        for (id, _) in self.require_contents(node)? {
            let Some(content) = self.contents.get(&id) else {
                continue;
            };
            info!("Session {}: peer rejected {}", self.sid, id);
            let event = SessionEvent::ContentRejected {
                content: content.info(),
                reason,
                text: text.clone(),
            };
            self.emit(event);
            self.remove_content_now(&id);
        }
        Ok(())
    }

    fn on_content_modify(&mut self, node: &Element) -> Result<()> {
        let mut changes = Vec::new();
        for (id, child) in self.require_contents(node)? {
            let senders = child
                .attr("senders")
                .and_then(Senders::parse)
                .ok_or_else(|| JingleError::bad_request("invalid content senders"))?;
            changes.push((id, senders));
        }
        for (id, senders) in changes {
            if let Some(content) = self.contents.get_mut(&id) {
                content.set_senders(senders);
            }
        }
        Ok(())
    }

    /// Swap contents in one step; the session never sees zero contents
    /// half way through
    fn on_content_replace(&mut self, node: &Element) -> Result<()> {
        let replaced: Vec<ContentId> = self
            .require_contents(node)?
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        let offer = self.parse_offer(node, &replaced)?;

        self.replacing = true;
        for id in &replaced {
            self.remove_content_now(id);
        }
        let committed = self.commit_offer(offer);
        self.replacing = false;
        committed?;

        self.check_remaining_contents();
        Ok(())
    }

    fn on_content_accept(&mut self, node: &Element) -> Result<()> {
        let targets = self.require_contents(node)?;
        self.accept_contents(targets)
    }

    fn on_transport_info(&mut self, node: &Element) -> Result<()> {
        if self.dialect.is_google() {
            return self.on_google_transport_info(node);
        }

        let mut first_error = None;
        for child in node.children_named("content") {
            let result = self.require_content(child).and_then(|id| {
                let transport = child
                    .child("transport")
                    .ok_or_else(|| JingleError::bad_request("missing transport element"))?;
                match self.contents.get_mut(&id) {
                    Some(content) => content.handler_mut().parse_transport(transport),
                    None => Ok(()),
                }
            });
            if let Err(err) = result {
                debug!("Session {}: transport-info error: {}", self.sid, err);
                first_error.get_or_insert(err);
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn on_google_transport_info(&mut self, node: &Element) -> Result<()> {
        let verb = node.attr(self.dialect.verb_attr());
        if self.dialect == Dialect::GTalk4 && verb == Some("candidates") {
            info!("Session {}: peer uses gtalk-v3 candidates, downgrading", self.sid);
            self.dialect = Dialect::GTalk3;
            for content in self.contents.iter_mut() {
                content.handler_mut().retransmit_candidates();
            }
        }

        let transport = if self.dialect == Dialect::GTalk4 {
            node.child_ns("transport", namespaces::GOOGLE_TRANSPORT_P2P)
                .ok_or_else(|| JingleError::bad_request("missing transport element"))?
        } else {
            node
        };

        for id in self.contents.ids_in(Creator::Initiator) {
            if let Some(content) = self.contents.get_mut(&id) {
                content.handler_mut().parse_transport(transport)?;
            }
        }
        Ok(())
    }

    fn on_description_info(&mut self, node: &Element) -> Result<()> {
        let mut updates = Vec::new();
        for (id, child) in self.require_contents(node)? {
            let description = child
                .child("description")
                .ok_or_else(|| JingleError::bad_request("missing description element"))?;
            updates.push((id, description));
        }
        for (id, description) in updates {
            if let Some(content) = self.contents.get_mut(&id) {
                content.handler_mut().parse_description_info(description)?;
            }
        }
        Ok(())
    }

    fn on_info(&mut self, node: &Element) -> Result<()> {
        if !self.dialect.is_google() {
            debug!("Session {}: info ping", self.sid);
            return Ok(());
        }
        for id in self.contents.ids_in(Creator::Initiator) {
            if let Some(content) = self.contents.get_mut(&id) {
                content.handler_mut().parse_info(node)?;
            }
        }
        Ok(())
    }

    /// Parse the contents a session-initiate, content-add or content-replace
    /// offers
    ///
    /// Names in `replacing` may already exist; any other collision is a bad
    /// request.
    fn parse_offer(&self, node: &Element, replacing: &[ContentId]) -> Result<ParsedOffer> {
        let mut offer = ParsedOffer::default();
        if self.dialect.is_google() {
            self.parse_google_offer(node, &mut offer)?;
        } else {
            for child in node.children_named("content") {
                self.parse_content(child, &mut offer)?;
            }
        }

        let mut seen = HashSet::new();
        for content in &offer.contents {
            let name = content.name();
            let replaced = replacing.iter().any(|id| id.name == name);
            if (self.contents.contains_name(name) && !replaced) || !seen.insert(name.to_owned()) {
                return Err(JingleError::bad_request(format!(
                    "content '{}' already exists",
                    name
                )));
            }
        }
        Ok(offer)
    }

    fn parse_content(&self, node: &Element, offer: &mut ParsedOffer) -> Result<()> {
        let known = node.child("description").and_then(|description| {
            let ns = description.ns()?;
            self.content_types
                .factory(ns)
                .map(|factory| (description, ns, factory))
        });
        let Some((description, content_ns, factory)) = known else {
            let ns = node
                .child("description")
                .and_then(Element::ns)
                .unwrap_or_default();
            if self.state < SessionState::PendingInitiated {
                return Err(JingleError::unknown_content_type(ns));
            }
            debug!(
                "Session {}: rejecting content with unknown type '{}'",
                self.sid, ns
            );
            offer.rejected.push((
                node.attr("name").map(str::to_owned),
                node.attr("creator").map(str::to_owned),
            ));
            return Ok(());
        };

        let creator = match node.attr("creator") {
            Some(value) => Creator::parse(value).ok_or_else(|| {
                JingleError::bad_request(format!("invalid 'creator' attribute '{}'", value))
            })?,
            // the peer created it, so it belongs to the peer's role
            None if self.omits_content_creators() => {
                if self.local_initiator {
                    Creator::Responder
                } else {
                    Creator::Initiator
                }
            }
            None => return Err(JingleError::bad_request("'creator' attribute missing")),
        };
        let name = node
            .attr("name")
            .ok_or_else(|| JingleError::bad_request("'name' attribute unset"))?;
        let transport = node
            .child("transport")
            .ok_or_else(|| JingleError::bad_request("missing transport element"))?;
        let transport_ns = transport.ns().unwrap_or_default();
        if !self.content_types.accepts_transport(transport_ns) {
            return Err(JingleError::bad_request(format!(
                "unsupported transport '{}'",
                transport_ns
            )));
        }
        let senders = match node.attr("senders") {
            Some(value) => Senders::parse(value)
                .ok_or_else(|| JingleError::bad_request("invalid content senders"))?,
            None => Senders::Both,
        };

        let spec = ContentSpec {
            name: name.to_owned(),
            media_type: factory.media_type(description),
            content_ns: content_ns.to_owned(),
            transport_ns: transport_ns.to_owned(),
            created_by_us: false,
            dialect: self.dialect,
        };
        let mut handler = factory.create(&spec);
        handler.parse_description(description)?;
        handler.parse_transport(transport)?;

        let mut content = Content::new(ContentId::new(name, creator), &spec, handler);
        content.set_senders(senders);
        content.set_disposition(node.attr("disposition").unwrap_or(DISPOSITION_SESSION));
        offer.contents.push(content);
        Ok(())
    }

    /// Google offers have one description under the session element
    fn parse_google_offer(&self, node: &Element, offer: &mut ParsedOffer) -> Result<()> {
        let description = node
            .child("description")
            .ok_or_else(|| JingleError::bad_request("missing description element"))?;
        let content_ns = description.ns().unwrap_or_default();
        let factory = self
            .content_types
            .factory(content_ns)
            .ok_or_else(|| JingleError::unknown_content_type(content_ns))?;

        let transport = node.child_ns("transport", namespaces::GOOGLE_TRANSPORT_P2P);
        if self.dialect == Dialect::GTalk4 && transport.is_none() {
            return Err(JingleError::bad_request("missing transport element"));
        }

        let implicit: Vec<(&str, MediaType)> =
            if self.dialect == Dialect::GTalk3 && content_ns == namespaces::GOOGLE_SESSION_VIDEO {
                vec![("video", MediaType::Video), ("audio", MediaType::Audio)]
            } else {
                vec![("gtalk", factory.media_type(description))]
            };

        for (name, media_type) in implicit {
            let spec = ContentSpec {
                name: name.to_owned(),
                media_type,
                content_ns: content_ns.to_owned(),
                transport_ns: namespaces::GOOGLE_TRANSPORT_P2P.to_owned(),
                created_by_us: false,
                dialect: self.dialect,
            };
            let mut handler = factory.create(&spec);
            handler.parse_description(description)?;
            if let Some(transport) = transport {
                handler.parse_transport(transport)?;
            }
            offer.contents.push(Content::new(
                ContentId::new(name, Creator::Initiator),
                &spec,
                handler,
            ));
        }
        Ok(())
    }

    fn commit_offer(&mut self, offer: ParsedOffer) -> Result<()> {
        for content in offer.contents {
            let info = content.info();
            let id = self.contents.insert(content)?;
            info!("Session {}: new peer content {}", self.sid, id);
            self.emit(SessionEvent::NewContent(info));
        }
        for (name, creator) in offer.rejected {
            self.reject_unknown_content(name.as_deref(), creator.as_deref());
        }
        Ok(())
    }
}

/// Termination cause and text from a `<reason/>` child
///
/// The legacy dialect wraps the condition in `<condition/>`.
fn parse_reason(node: &Element) -> (Reason, Option<String>) {
    let Some(reason) = node.child("reason") else {
        return (Reason::Unknown, None);
    };
    let holder = reason.child("condition").unwrap_or(reason);
    let cause = holder
        .children()
        .find(|c| c.name() != "text")
        .map(|c| Reason::from_wire(c.name()))
        .unwrap_or(Reason::Unknown);
    let text = reason.child_text("text").map(str::to_owned);
    (cause, text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_parsing_handles_both_layouts() {
        let modern = Element::parse(
            r#"<jingle xmlns="urn:xmpp:jingle:1"><reason><busy/><text>on another call</text></reason></jingle>"#,
        )
        .unwrap();
        assert_eq!(
            parse_reason(&modern),
            (Reason::Busy, Some("on another call".to_string()))
        );

        let legacy = Element::parse(
            r#"<jingle xmlns="http://jabber.org/protocol/jingle"><reason><condition><decline/></condition></reason></jingle>"#,
        )
        .unwrap();
        assert_eq!(parse_reason(&legacy), (Reason::Decline, None));

        let bare = Element::parse(r#"<session xmlns="http://www.google.com/session"/>"#).unwrap();
        assert_eq!(parse_reason(&bare), (Reason::Unknown, None));
    }
}
