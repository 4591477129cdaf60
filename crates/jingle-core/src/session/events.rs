//! Session lifecycle events
//!
//! Events are pushed to every subscriber synchronously, right after the
//! mutation they describe. Subscribers whose receiver was dropped are pruned
//! on the next emit.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::content::ContentInfo;
use crate::protocol::Reason;
use crate::state_table::SessionState;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A content was created, by either side
    NewContent(ContentInfo),
    /// A content left the session
    ContentRemoved(ContentInfo),
    /// The peer refused one of our contents
    ContentRejected {
        content: ContentInfo,
        reason: Reason,
        text: Option<String>,
    },
    /// Remote hold, ringing or mute flags changed
    RemoteStateChanged,
    StateChanged {
        from: SessionState,
        to: SessionState,
    },
    Terminated {
        locally_terminated: bool,
        reason: Reason,
        text: Option<String>,
    },
}

/// Fan-out list of unbounded channels
#[derive(Debug)]
pub struct Subscribers<T> {
    senders: Vec<mpsc::UnboundedSender<T>>,
}

impl<T: Clone> Subscribers<T> {
    pub fn new() -> Self {
        Self {
            senders: Vec::new(),
        }
    }

    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.push(tx);
        rx
    }

    pub fn emit(&mut self, event: T) {
        self.senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn clear(&mut self) {
        self.senders.clear();
    }
}

impl<T: Clone> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropped_receivers_are_pruned() {
        let mut subscribers = Subscribers::new();
        let mut kept = subscribers.subscribe();
        let dropped = subscribers.subscribe();
        drop(dropped);

        subscribers.emit(SessionEvent::RemoteStateChanged);
        assert_eq!(subscribers.len(), 1);
        assert_eq!(kept.try_recv().unwrap(), SessionEvent::RemoteStateChanged);
    }
}
