//! Wire vocabulary shared by every dialect
//!
//! [`Dialect`], [`Action`], [`Reason`] and the small content attribute enums
//! live here together with the verb tables in [`verbs`] and the stateless
//! [`detect`] classifier.

pub mod detect;
pub mod verbs;

pub use detect::{detect, Detected};
pub use verbs::{parse_action, produce_action};

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

use crate::namespaces;

/// Concrete wire syntax of the session protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum Dialect {
    /// Current Jingle, `urn:xmpp:jingle:1`
    #[serde(rename = "v1")]
    V1,
    /// Jingle draft 0.15
    #[serde(rename = "v015")]
    V015,
    /// Google Talk without an explicit transport element
    #[serde(rename = "gtalk3")]
    GTalk3,
    /// Google Talk with a p2p transport element
    #[serde(rename = "gtalk4")]
    GTalk4,
}

impl Dialect {
    pub fn is_google(&self) -> bool {
        matches!(self, Dialect::GTalk3 | Dialect::GTalk4)
    }

    /// Namespace of the session (or jingle) element
    pub fn session_ns(&self) -> &'static str {
        match self {
            Dialect::V1 => namespaces::JINGLE,
            Dialect::V015 => namespaces::JINGLE_015,
            Dialect::GTalk3 | Dialect::GTalk4 => namespaces::GOOGLE_SESSION,
        }
    }

    /// Local name of the session element
    pub fn session_element(&self) -> &'static str {
        if self.is_google() { "session" } else { "jingle" }
    }

    /// Attribute carrying the verb
    pub fn verb_attr(&self) -> &'static str {
        if self.is_google() { "type" } else { "action" }
    }

    /// Attribute carrying the session id
    pub fn sid_attr(&self) -> &'static str {
        if self.is_google() { "id" } else { "sid" }
    }
}

impl Default for Dialect {
    fn default() -> Self {
        Dialect::V1
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Dialect::V1 => "jingle-v1",
            Dialect::V015 => "jingle-v0.15",
            Dialect::GTalk3 => "gtalk-v3",
            Dialect::GTalk4 => "gtalk-v4",
        };
        f.write_str(name)
    }
}

/// Protocol verbs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter)]
pub enum Action {
    SessionInitiate,
    SessionAccept,
    SessionTerminate,
    SessionInfo,
    ContentAdd,
    ContentRemove,
    ContentModify,
    ContentReplace,
    ContentAccept,
    ContentReject,
    TransportInfo,
    TransportAccept,
    DescriptionInfo,
    Info,
    Unknown,
}

impl Action {
    /// Canonical (non-Google) verb
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::SessionInitiate => "session-initiate",
            Action::SessionAccept => "session-accept",
            Action::SessionTerminate => "session-terminate",
            Action::SessionInfo => "session-info",
            Action::ContentAdd => "content-add",
            Action::ContentRemove => "content-remove",
            Action::ContentModify => "content-modify",
            Action::ContentReplace => "content-replace",
            Action::ContentAccept => "content-accept",
            Action::ContentReject => "content-reject",
            Action::TransportInfo => "transport-info",
            Action::TransportAccept => "transport-accept",
            Action::DescriptionInfo => "description-info",
            Action::Info => "info",
            Action::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Termination causes
///
/// `Unknown` has no wire form; it marks "no particular reason" locally and
/// is what an unrecognized `<reason>` child parses to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, AsRefStr, EnumIter,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum Reason {
    Unknown,
    AlternativeSession,
    Busy,
    Cancel,
    ConnectivityError,
    Decline,
    Expired,
    FailedApplication,
    FailedTransport,
    GeneralError,
    Gone,
    IncompatibleParameters,
    MediaError,
    SecurityError,
    Success,
    Timeout,
    UnsupportedApplications,
    UnsupportedTransports,
}

impl Reason {
    /// Parse the local name of a `<reason>` child
    pub fn from_wire(name: &str) -> Reason {
        name.parse().unwrap_or(Reason::Unknown)
    }

    /// Element name used on the wire, `None` for [`Reason::Unknown`]
    pub fn wire_name(&self) -> Option<&str> {
        match self {
            Reason::Unknown => None,
            other => Some(other.as_ref()),
        }
    }
}

impl Default for Reason {
    fn default() -> Self {
        Reason::Unknown
    }
}

/// Which side created a content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Creator {
    Initiator,
    Responder,
}

impl Creator {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiator" => Some(Creator::Initiator),
            "responder" => Some(Creator::Responder),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Creator::Initiator => "initiator",
            Creator::Responder => "responder",
        }
    }
}

/// Which parties send media on a content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Senders {
    Initiator,
    Responder,
    Both,
}

impl Senders {
    /// `none` and anything unrecognized are rejected
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "initiator" => Some(Senders::Initiator),
            "responder" => Some(Senders::Responder),
            "both" => Some(Senders::Both),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Senders::Initiator => "initiator",
            Senders::Responder => "responder",
            Senders::Both => "both",
        }
    }
}

impl Default for Senders {
    fn default() -> Self {
        Senders::Both
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Audio,
    Video,
    /// Non-RTP content such as file transfer
    None,
}

impl MediaType {
    /// Default name for a locally created content of this type
    pub fn default_content_name(&self) -> &'static str {
        match self {
            MediaType::Audio => "Audio",
            MediaType::Video => "Video",
            MediaType::None => "stream",
        }
    }

    pub fn is_rtp(&self) -> bool {
        !matches!(self, MediaType::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_use_kebab_case_on_the_wire() {
        assert_eq!(Reason::from_wire("general-error"), Reason::GeneralError);
        assert_eq!(Reason::from_wire("alternative-session"), Reason::AlternativeSession);
        assert_eq!(Reason::from_wire("no-such-reason"), Reason::Unknown);
        assert_eq!(Reason::Busy.wire_name(), Some("busy"));
        assert_eq!(Reason::Unknown.wire_name(), None);
    }

    #[test]
    fn dialect_attribute_names() {
        assert_eq!(Dialect::V1.verb_attr(), "action");
        assert_eq!(Dialect::GTalk4.verb_attr(), "type");
        assert_eq!(Dialect::V015.sid_attr(), "sid");
        assert_eq!(Dialect::GTalk3.sid_attr(), "id");
    }

    #[test]
    fn senders_reject_none() {
        assert_eq!(Senders::parse("both"), Some(Senders::Both));
        assert_eq!(Senders::parse("none"), None);
    }
}
