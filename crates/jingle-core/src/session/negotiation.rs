//! Offer/answer timing and reply handling
//!
//! session-initiate and session-accept go out only once the local side has
//! accepted and every session-disposition content is ready. Both readiness
//! and acceptance can happen in any order, so every event that might
//! complete the set retries [`Session::try_session_initiate_or_accept`].

use tracing::{debug, info, warn};

use super::events::SessionEvent;
use super::outbound::ReplyContext;
use super::session::Session;
use crate::content::{ContentId, ContentState};
use crate::errors::{JingleError, Result};
use crate::protocol::{Action, Dialect, Reason};
use crate::state_table::{action_defined_by_dialect, SessionState};

/// How the peer answered one of our requests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    Success,
    Failure,
}

impl Session {
    /// Send the offer (or answer) if everything is in place
    pub(super) fn try_session_initiate_or_accept(&mut self) {
        let (action, next_state, context) = if self.local_initiator {
            if self.state != SessionState::PendingCreated {
                debug!("Session {}: session-initiate already sent", self.sid);
                return;
            }
            (
                Action::SessionInitiate,
                SessionState::PendingInitiateSent,
                ReplyContext::SessionInitiate,
            )
        } else {
            if self.state != SessionState::PendingInitiated {
                debug!("Session {}: not in a state to accept", self.sid);
                return;
            }
            (
                Action::SessionAccept,
                SessionState::PendingAcceptSent,
                ReplyContext::SessionAccept,
            )
        };

        if !self.locally_accepted {
            debug!("Session {}: not locally accepted yet", self.sid);
            return;
        }
        if self.contents.active_count() == 0 {
            debug!("Session {}: no contents to offer", self.sid);
            return;
        }
        if let Some(waiting) = self
            .contents
            .iter()
            .find(|c| c.is_active() && c.is_session_disposition() && !c.is_ready())
        {
            debug!("Session {}: content {} not ready", self.sid, waiting.id());
            return;
        }

        let mut msg = self.new_message(action);
        if self.dialect.is_google() {
            self.produce_google_payload(&mut msg);
        } else {
            for content in self
                .contents
                .iter()
                .filter(|c| c.is_active() && c.is_session_disposition())
            {
                content.produce_node(&mut msg, true);
            }
        }

        for content in self
            .contents
            .iter_mut()
            .filter(|c| c.is_active() && c.is_session_disposition())
        {
            match content.state() {
                ContentState::Empty => content.set_state(ContentState::Sent),
                ContentState::New => content.set_state(ContentState::Acknowledged),
                _ => {}
            }
        }

        info!("Session {}: sending {}", self.sid, action);
        self.send(msg, Some(context));
        self.set_state(next_state);
    }

    /// A content's handler became ready
    ///
    /// Session contents feed the initial offer or answer while that is still
    /// to be sent; anything else, including contents created after it went
    /// out, is added (ours) or accepted (theirs) on its own once the session
    /// has been initiated.
    pub fn content_ready(&mut self, id: &ContentId) -> Result<()> {
        let content = self
            .contents
            .get(id)
            .ok_or_else(|| JingleError::bad_request(format!("no content {}", id)))?;

        if !content.is_ready() || self.state == SessionState::Ended {
            debug!("Session {}: {} is not ready to be signalled", self.sid, id);
            return Ok(());
        }

        if content.is_session_disposition() && self.offer_or_answer_pending() {
            self.try_session_initiate_or_accept();
        } else if self.state >= SessionState::PendingInitiateSent {
            self.send_content_add_or_accept(id);
        } else {
            debug!(
                "Session {}: session not initiated yet, holding {}",
                self.sid, id
            );
        }
        Ok(())
    }

    /// True while our session-initiate (or session-accept) is yet to be sent
    fn offer_or_answer_pending(&self) -> bool {
        if self.local_initiator {
            self.state == SessionState::PendingCreated
        } else {
            self.state == SessionState::PendingInitiated
        }
    }

    fn send_content_add_or_accept(&mut self, id: &ContentId) {
        let Some(content) = self.contents.get(id) else {
            return;
        };
        let created_by_us = content.created_by_us();
        let action = if created_by_us {
            Action::ContentAdd
        } else {
            Action::ContentAccept
        };
        if !action_defined_by_dialect(self.dialect, action) {
            debug!("Session {}: {} has no {}", self.sid, self.dialect, action);
            return;
        }

        let mut msg = self.new_message(action);
        content.produce_node(&mut msg, true);

        let (next, context) = if created_by_us {
            (ContentState::Sent, Some(ReplyContext::ContentAdd(id.clone())))
        } else {
            (ContentState::Acknowledged, None)
        };
        if let Some(content) = self.contents.get_mut(id) {
            content.set_state(next);
        }
        self.send(msg, context);
    }

    /// Route the peer's answer to one of our requests
    ///
    /// Returns false if the id does not belong to this session. Replies
    /// that arrive after the session moved on are ignored.
    pub fn handle_reply(&mut self, iq_id: &str, outcome: ReplyOutcome) -> bool {
        let Some(context) = self.pending_replies.remove(iq_id) else {
            return false;
        };

        match context {
            ReplyContext::SessionInitiate => self.on_initiate_reply(outcome),
            ReplyContext::SessionAccept => self.on_accept_reply(outcome),
            ReplyContext::ContentAdd(id) => {
                if outcome == ReplyOutcome::Failure {
                    warn!("Session {}: peer refused content-add for {}", self.sid, id);
                    self.remove_content_now(&id);
                }
            }
            ReplyContext::ContentRemove(id) => self.remove_content_now(&id),
        }
        true
    }

    fn on_initiate_reply(&mut self, outcome: ReplyOutcome) {
        if self.state != SessionState::PendingInitiateSent {
            debug!(
                "Session {}: ignoring session-initiate reply in state {}",
                self.sid, self.state
            );
            return;
        }
        match outcome {
            ReplyOutcome::Success => {
                self.set_state(SessionState::PendingInitiated);
                if self.dialect != Dialect::V1 {
                    // no explicit ringing in older dialects
                    self.remote_ringing = true;
                    self.emit(SessionEvent::RemoteStateChanged);
                }
            }
            ReplyOutcome::Failure => {
                warn!("Session {}: session-initiate failed", self.sid);
                self.transition(
                    SessionState::Ended,
                    Reason::Unknown,
                    Some("session-initiate failed".to_string()),
                );
            }
        }
    }

    fn on_accept_reply(&mut self, outcome: ReplyOutcome) {
        if self.state != SessionState::PendingAcceptSent {
            debug!(
                "Session {}: ignoring session-accept reply in state {}",
                self.sid, self.state
            );
            return;
        }
        match outcome {
            ReplyOutcome::Success => {
                self.set_state(SessionState::Active);
                if self.dialect != Dialect::V1 {
                    self.remote_hold = false;
                    self.remote_ringing = false;
                    self.emit(SessionEvent::RemoteStateChanged);
                }
            }
            ReplyOutcome::Failure => {
                warn!("Session {}: session-accept failed", self.sid);
                self.transition(
                    SessionState::Ended,
                    Reason::Unknown,
                    Some("session-accept failed".to_string()),
                );
            }
        }
    }
}
