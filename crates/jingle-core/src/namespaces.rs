//! XML namespaces used on the wire

/// Current Jingle (XEP-0166 1.x)
pub const JINGLE: &str = "urn:xmpp:jingle:1";
/// Legacy Jingle (XEP-0166 draft 0.15)
pub const JINGLE_015: &str = "http://jabber.org/protocol/jingle";
/// Jingle error conditions
pub const JINGLE_ERRORS: &str = "urn:xmpp:jingle:errors:1";
/// RTP session-info payloads (active, ringing, hold, mute, ...)
pub const JINGLE_RTP_INFO: &str = "urn:xmpp:jingle:apps:rtp:info:1";
/// RTP description (audio/video)
pub const JINGLE_RTP: &str = "urn:xmpp:jingle:apps:rtp:1";

/// Google Talk session element
pub const GOOGLE_SESSION: &str = "http://www.google.com/session";
/// Google Talk audio description
pub const GOOGLE_SESSION_PHONE: &str = "http://www.google.com/session/phone";
/// Google Talk video description
pub const GOOGLE_SESSION_VIDEO: &str = "http://www.google.com/session/video";
/// Google p2p transport
pub const GOOGLE_TRANSPORT_P2P: &str = "http://www.google.com/transport/p2p";

/// XMPP stanza error conditions
pub const XMPP_STANZAS: &str = "urn:ietf:params:xml:ns:xmpp-stanzas";
/// Client stream namespace
pub const JABBER_CLIENT: &str = "jabber:client";
/// Service discovery info
pub const DISCO_INFO: &str = "http://jabber.org/protocol/disco#info";
