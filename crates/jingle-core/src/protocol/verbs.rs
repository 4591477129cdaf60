//! Verb strings per dialect

use super::{Action, Dialect};

/// Map a verb attribute to an action
///
/// Accepts the canonical verbs of every dialect plus the Google synonyms.
/// Anything unrecognized is [`Action::Unknown`].
pub fn parse_action(verb: &str) -> Action {
    match verb {
        "initiate" | "session-initiate" => Action::SessionInitiate,
        "accept" | "session-accept" => Action::SessionAccept,
        "terminate" | "reject" | "session-terminate" => Action::SessionTerminate,
        "session-info" => Action::SessionInfo,
        "content-add" => Action::ContentAdd,
        "content-remove" => Action::ContentRemove,
        "content-modify" => Action::ContentModify,
        "content-replace" => Action::ContentReplace,
        "content-accept" => Action::ContentAccept,
        "content-reject" => Action::ContentReject,
        "candidates" | "transport-info" => Action::TransportInfo,
        "transport-accept" => Action::TransportAccept,
        "description-info" => Action::DescriptionInfo,
        "info" => Action::Info,
        _ => Action::Unknown,
    }
}

/// Verb to put on the wire for an action in a dialect
pub fn produce_action(action: Action, dialect: Dialect) -> &'static str {
    if dialect.is_google() {
        match action {
            Action::SessionInitiate => return "initiate",
            Action::SessionAccept => return "accept",
            Action::SessionTerminate => return "terminate",
            Action::TransportInfo if dialect == Dialect::GTalk3 => return "candidates",
            _ => {}
        }
    }
    action.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn google_vocabulary() {
        assert_eq!(produce_action(Action::SessionInitiate, Dialect::GTalk3), "initiate");
        assert_eq!(produce_action(Action::TransportInfo, Dialect::GTalk3), "candidates");
        assert_eq!(produce_action(Action::TransportInfo, Dialect::GTalk4), "transport-info");
        assert_eq!(produce_action(Action::SessionTerminate, Dialect::V1), "session-terminate");
        assert_eq!(parse_action("reject"), Action::SessionTerminate);
    }

    #[test]
    fn unknown_verbs_never_fail() {
        assert_eq!(parse_action(""), Action::Unknown);
        assert_eq!(parse_action("session-dance"), Action::Unknown);
        assert_eq!(parse_action("unknown"), Action::Unknown);
    }
}
