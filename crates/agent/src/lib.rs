//! The quality-gated generation loop.
//!
//! Every user turn runs one gate cycle:
//!
//! 1. **Draft**: the [`Responder`] answers from the professional context,
//!    calling tools as needed
//! 2. **Evaluate**: the [`Evaluator`] issues a PASS/FAIL verdict with
//!    corrective feedback
//! 3. **Accept or retry**: on FAIL the feedback goes into the next draft,
//!    up to the attempt ceiling; at the ceiling the last draft is released
//!    flagged as forced
//!
//! [`ChatService::handle_turn`] is the entry point the chat surface uses.

pub mod evaluator;
pub mod gate;
pub mod guard;
pub mod monitor;
pub mod responder;
pub mod service;
pub mod session;

#[cfg(test)]
mod test_helpers;

pub use evaluator::{Evaluator, parse_verdict};
pub use gate::{GateController, GateLimits, GateState, TurnOutcome};
pub use guard::{ScopeGuard, ToneLint};
pub use monitor::OperatorMonitor;
pub use responder::{PriorFeedback, Responder};
pub use service::{ChatService, SESSION_ENDED_REPLY};
pub use session::{Session, SessionStore};
