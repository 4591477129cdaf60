//! Jingle session signaling engine
//!
//! This crate negotiates and manages peer-to-peer media sessions over XMPP
//! stanzas. It speaks four wire dialects (current Jingle, Jingle draft 0.15
//! and two Google Talk variants), enforces which actions are legal in which
//! session state, tracks the contents of each session, resolves known peer
//! bugs through capability quirks, and decides when to send the offer and
//! the answer.
//!
//! Media, transports and codecs are not handled here: collaborators plug
//! them in through [`content::ContentHandler`] and are told about session
//! progress through [`session::SessionEvent`]s.
//!
//! ```no_run
//! use std::sync::Arc;
//! use jingle_core::prelude::*;
//!
//! let (sink, _outbound) = ChannelSink::new();
//! let mut manager = SessionManager::new(
//!     "romeo@montague.lit/orchard",
//!     EngineConfig::default(),
//!     ContentTypeRegistry::new(),
//!     CapabilityOracles::new(),
//!     Arc::new(sink),
//! );
//! let stanza = Stanza::parse("<iq type='result' id='1'/>").unwrap();
//! manager.handle_stanza(&stanza);
//! ```

pub mod capabilities;
pub mod config;
pub mod content;
pub mod errors;
pub mod logging;
pub mod manager;
pub mod namespaces;
pub mod protocol;
pub mod session;
pub mod stanza;
pub mod state_table;
pub mod xml;

pub use capabilities::{CapabilityOracle, CapabilityOracles, CapabilitySet, PeerCapabilityCache, QuirkResolver, TokenPool};
pub use config::EngineConfig;
pub use errors::{JingleError, Result};
pub use manager::{ChannelSink, ManagerEvent, MessageSink, SessionKey, SessionManager};
pub use protocol::{Action, Creator, Dialect, MediaType, Reason, Senders};
pub use session::{ReplyOutcome, Session, SessionEvent, SessionParams};
pub use state_table::SessionState;

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        Action, CapabilityOracle, CapabilityOracles, CapabilitySet, ChannelSink, Creator,
        Dialect, EngineConfig, JingleError, ManagerEvent, MediaType, MessageSink,
        PeerCapabilityCache, QuirkResolver, Reason, ReplyOutcome, Result, Senders, Session,
        SessionEvent, SessionKey, SessionManager, SessionParams, SessionState,
        content::{ContentHandler, ContentHandlerFactory, ContentId, ContentInfo, ContentSpec, ContentTypeRegistry},
        stanza::Stanza,
        xml::Element,
    };
}
