//! Session states and the action table
//!
//! Two lookups decide whether an inbound action may run:
//! [`action_defined_by_dialect`] (does the wire syntax have this verb at all)
//! and [`action_allowed`] (is it legal in the current state). The first
//! failing check decides the error reported to the peer.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use strum::{EnumIter, IntoEnumIterator};

use crate::errors::{JingleError, Result};
use crate::protocol::{Action, Dialect};

/// Session lifecycle states
///
/// The derived ordering is the lifecycle order; a session only ever moves
/// to a strictly greater state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, EnumIter,
)]
pub enum SessionState {
    PendingCreated,
    PendingInitiateSent,
    PendingInitiated,
    PendingAcceptSent,
    Active,
    Ended,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::PendingCreated => "pending-created",
            SessionState::PendingInitiateSent => "pending-initiate-sent",
            SessionState::PendingInitiated => "pending-initiated",
            SessionState::PendingAcceptSent => "pending-accept-sent",
            SessionState::Active => "active",
            SessionState::Ended => "ended",
        }
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Actions legal to receive in each state
static ALLOWED_ACTIONS: Lazy<HashMap<SessionState, HashSet<Action>>> = Lazy::new(|| {
    use Action::*;
    use SessionState::*;

    let mut table = HashMap::new();
    table.insert(PendingCreated, HashSet::from([SessionInitiate]));
    table.insert(
        PendingInitiateSent,
        HashSet::from([
            SessionTerminate,
            SessionAccept,
            TransportAccept,
            DescriptionInfo,
            SessionInfo,
            TransportInfo,
            Info,
        ]),
    );
    table.insert(
        PendingInitiated,
        HashSet::from([
            SessionAccept,
            SessionTerminate,
            TransportInfo,
            ContentReject,
            ContentModify,
            ContentAccept,
            ContentRemove,
            DescriptionInfo,
            TransportAccept,
            SessionInfo,
            Info,
        ]),
    );
    table.insert(
        PendingAcceptSent,
        HashSet::from([
            TransportInfo,
            DescriptionInfo,
            SessionTerminate,
            SessionInfo,
            Info,
        ]),
    );
    table.insert(
        Active,
        HashSet::from([
            ContentModify,
            ContentAdd,
            ContentRemove,
            ContentReplace,
            ContentAccept,
            ContentReject,
            SessionInfo,
            TransportInfo,
            DescriptionInfo,
            Info,
            SessionTerminate,
        ]),
    );
    table.insert(Ended, HashSet::new());
    table
});

/// Actions legal to receive in `state`
pub fn allowed_actions(state: SessionState) -> Vec<Action> {
    Action::iter().filter(|a| action_allowed(*a, state)).collect()
}

/// True if `action` may be received in `state`
pub fn action_allowed(action: Action, state: SessionState) -> bool {
    ALLOWED_ACTIONS
        .get(&state)
        .map_or(false, |actions| actions.contains(&action))
}

/// True if the dialect has a verb for `action` at all
pub fn action_defined_by_dialect(dialect: Dialect, action: Action) -> bool {
    use Action::*;

    if action == Unknown {
        return false;
    }
    match dialect {
        Dialect::V1 => true,
        Dialect::V015 => !matches!(action, SessionInfo | DescriptionInfo),
        Dialect::GTalk3 => matches!(
            action,
            SessionInitiate | SessionAccept | SessionTerminate | TransportInfo | Info
        ),
        Dialect::GTalk4 => matches!(
            action,
            SessionInitiate
                | SessionAccept
                | SessionTerminate
                | TransportInfo
                | TransportAccept
                | Info
        ),
    }
}

/// Gate an inbound action
///
/// Unknown or dialect-undefined verbs are a bad request; a defined verb in
/// the wrong state is out of order.
pub fn check_action(dialect: Dialect, action: Action, state: SessionState) -> Result<()> {
    if action == Action::Unknown {
        return Err(JingleError::bad_request("unknown session action"));
    }
    if !action_defined_by_dialect(dialect, action) {
        return Err(JingleError::bad_request(format!(
            "action '{}' is not defined in {}",
            action, dialect
        )));
    }
    if !action_allowed(action, state) {
        return Err(JingleError::out_of_order(format!(
            "action '{}' not allowed in state {}",
            action, state
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_state_has_a_table_entry() {
        for state in SessionState::iter() {
            assert!(ALLOWED_ACTIONS.contains_key(&state), "missing {}", state);
        }
    }

    #[test]
    fn unknown_is_never_allowed() {
        for state in SessionState::iter() {
            assert!(!action_allowed(Action::Unknown, state));
        }
        assert!(allowed_actions(SessionState::Ended).is_empty());
    }

    #[test]
    fn states_are_ordered_by_lifecycle() {
        let states: Vec<_> = SessionState::iter().collect();
        assert!(states.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn legacy_dialect_lacks_info_verbs() {
        assert!(!action_defined_by_dialect(Dialect::V015, Action::SessionInfo));
        assert!(action_defined_by_dialect(Dialect::V015, Action::ContentAdd));
        assert!(!action_defined_by_dialect(Dialect::GTalk3, Action::TransportAccept));
        assert!(action_defined_by_dialect(Dialect::GTalk4, Action::TransportAccept));
    }

    #[test]
    fn check_action_error_kinds() {
        let err = check_action(Dialect::V1, Action::SessionAccept, SessionState::PendingCreated)
            .unwrap_err();
        assert!(matches!(err, JingleError::OutOfOrder { .. }));

        let err = check_action(Dialect::GTalk3, Action::ContentAdd, SessionState::Active)
            .unwrap_err();
        assert!(err.is_bad_request());

        assert!(check_action(Dialect::V1, Action::SessionInitiate, SessionState::PendingCreated).is_ok());
    }
}
