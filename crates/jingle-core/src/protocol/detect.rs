//! Stateless dialect detection
//!
//! Looks at an inbound stanza and decides whether it is a session request,
//! and if so in which dialect, for which session, and with which verb.
//! Never mutates anything and never fails: anything that does not look like
//! a session request is simply `None`.

use super::verbs::parse_action;
use super::{Action, Dialect};
use crate::namespaces;
use crate::stanza::{IqType, Stanza};
use crate::xml::Element;

/// Result of classifying an inbound stanza
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detected {
    pub sid: String,
    pub action: Action,
    pub dialect: Dialect,
    /// Full address of the sender
    pub from: String,
}

/// Dialects in the order they are searched, newest first
const SEARCH_ORDER: [Dialect; 3] = [Dialect::V1, Dialect::V015, Dialect::GTalk3];

/// Classify a stanza
pub fn detect(stanza: &Stanza) -> Option<Detected> {
    if stanza.iq_type() != Some(IqType::Set) {
        return None;
    }
    let from = stanza.from()?;
    stanza.to()?;

    let (node, dialect) = session_node(stanza.root())?;
    let sid = node.attr(dialect.sid_attr())?;
    let action = node
        .attr(dialect.verb_attr())
        .map(parse_action)
        .unwrap_or(Action::Unknown);

    Some(Detected {
        sid: sid.to_owned(),
        action,
        dialect,
        from: from.to_owned(),
    })
}

/// Locate the session element and the dialect it belongs to
pub fn session_node(iq: &Element) -> Option<(&Element, Dialect)> {
    SEARCH_ORDER.iter().find_map(|dialect| {
        let node = iq.child_ns(dialect.session_element(), dialect.session_ns())?;
        let dialect = match dialect {
            Dialect::GTalk3 | Dialect::GTalk4 => google_variant(node),
            other => *other,
        };
        Some((node, dialect))
    })
}

/// GTalk4 carries an explicit p2p transport element, GTalk3 does not
fn google_variant(session: &Element) -> Dialect {
    if session
        .child_ns("transport", namespaces::GOOGLE_TRANSPORT_P2P)
        .is_some()
    {
        Dialect::GTalk4
    } else {
        Dialect::GTalk3
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn detect_str(xml: &str) -> Option<Detected> {
        detect(&Stanza::parse(xml).unwrap())
    }

    #[test]
    fn detects_current_jingle() {
        let found = detect_str(
            r#"<iq type="set" from="juliet@capulet.lit/balcony" to="romeo@montague.lit/orchard" id="1"><jingle xmlns="urn:xmpp:jingle:1" action="session-initiate" sid="a73sjjvkla37jfea"/></iq>"#,
        )
        .unwrap();
        assert_eq!(
            found,
            Detected {
                sid: "a73sjjvkla37jfea".into(),
                action: Action::SessionInitiate,
                dialect: Dialect::V1,
                from: "juliet@capulet.lit/balcony".into(),
            }
        );
    }

    #[test]
    fn distinguishes_google_variants() {
        let gtalk4 = detect_str(
            r#"<iq type="set" from="a@x/r" to="b@y/r" id="1"><session xmlns="http://www.google.com/session" type="candidates" id="77"><transport xmlns="http://www.google.com/transport/p2p"/></session></iq>"#,
        )
        .unwrap();
        assert_eq!(gtalk4.dialect, Dialect::GTalk4);
        assert_eq!(gtalk4.action, Action::TransportInfo);
        assert_eq!(gtalk4.sid, "77");

        let gtalk3 = detect_str(
            r#"<iq type="set" from="a@x/r" to="b@y/r" id="1"><session xmlns="http://www.google.com/session" type="reject" id="77"/></iq>"#,
        )
        .unwrap();
        assert_eq!(gtalk3.dialect, Dialect::GTalk3);
        assert_eq!(gtalk3.action, Action::SessionTerminate);
    }

    #[test]
    fn ignores_non_requests_and_unaddressed_stanzas() {
        assert!(detect_str(
            r#"<iq type="result" from="a" to="b" id="1"><jingle xmlns="urn:xmpp:jingle:1" action="session-accept" sid="s"/></iq>"#
        )
        .is_none());
        assert!(detect_str(
            r#"<iq type="set" to="b" id="1"><jingle xmlns="urn:xmpp:jingle:1" action="session-accept" sid="s"/></iq>"#
        )
        .is_none());
        assert!(detect_str(
            r#"<iq type="set" from="a" to="b" id="1"><query xmlns="jabber:iq:roster"/></iq>"#
        )
        .is_none());
    }

    #[test]
    fn missing_verb_is_unknown_action() {
        let found = detect_str(
            r#"<iq type="set" from="a" to="b" id="1"><jingle xmlns="http://jabber.org/protocol/jingle" sid="s"/></iq>"#,
        )
        .unwrap();
        assert_eq!(found.dialect, Dialect::V015);
        assert_eq!(found.action, Action::Unknown);
    }
}
