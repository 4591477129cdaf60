// Verb vocabulary and action gating across every dialect and state

use jingle_core::protocol::{parse_action, produce_action};
use jingle_core::state_table::{action_allowed, action_defined_by_dialect, allowed_actions, check_action};
use jingle_core::{Action, Dialect, JingleError, SessionState};
use pretty_assertions::assert_eq;
use strum::IntoEnumIterator;

#[test]
fn test_defined_verbs_round_trip() {
    for dialect in Dialect::iter() {
        for action in Action::iter().filter(|a| action_defined_by_dialect(dialect, *a)) {
            assert_eq!(
                parse_action(produce_action(action, dialect)),
                action,
                "{} in {}",
                action,
                dialect
            );
        }
    }
}

#[test]
fn test_check_action_agrees_with_the_tables() {
    for dialect in Dialect::iter() {
        for state in SessionState::iter() {
            for action in Action::iter() {
                let defined = action_defined_by_dialect(dialect, action);
                let allowed = action_allowed(action, state);
                match check_action(dialect, action, state) {
                    Ok(()) => assert!(defined && allowed, "{} in {} ({})", action, state, dialect),
                    Err(JingleError::BadRequest { .. }) => assert!(!defined),
                    Err(JingleError::OutOfOrder { .. }) => assert!(defined && !allowed),
                    Err(other) => panic!("unexpected error {:?}", other),
                }
            }
        }
    }
}

#[test]
fn test_lifecycle_edges() {
    assert_eq!(
        allowed_actions(SessionState::PendingCreated),
        vec![Action::SessionInitiate]
    );
    assert!(allowed_actions(SessionState::Ended).is_empty());
    for state in SessionState::iter() {
        assert!(!action_allowed(Action::Unknown, state));
        if state != SessionState::Ended {
            assert!(action_allowed(Action::SessionTerminate, state) || state == SessionState::PendingCreated);
        }
    }
    assert!(action_allowed(Action::ContentAdd, SessionState::Active));
    assert!(!action_allowed(Action::ContentAdd, SessionState::PendingInitiated));
}

#[test]
fn test_google_synonyms() {
    assert_eq!(parse_action("reject"), Action::SessionTerminate);
    assert_eq!(parse_action("candidates"), Action::TransportInfo);
    assert_eq!(produce_action(Action::TransportInfo, Dialect::GTalk3), "candidates");
    assert_eq!(produce_action(Action::TransportInfo, Dialect::GTalk4), "transport-info");
    assert_eq!(produce_action(Action::SessionInitiate, Dialect::V015), "session-initiate");
    assert_eq!(parse_action("session-dance"), Action::Unknown);
}
