//! The session state machine
//!
//! A [`Session`] owns the lifecycle state, dialect, hold/ringing flags and
//! the content registry of one negotiation with one peer. Inbound requests
//! are gated by [`crate::state_table`] and dispatched to the handlers in
//! `handlers`; offer/answer timing lives in `negotiation` and message
//! building in `outbound`.

mod events;
mod handlers;
mod negotiation;
mod outbound;
mod session;

pub use events::{SessionEvent, Subscribers};
pub use negotiation::ReplyOutcome;
pub use session::{Session, SessionParams};
