//! The load session: completion tracking and bounded retry.
//!
//! [`LoadSession`] consumes a frozen manifest and drives every resource to a
//! terminal state ([`ResourceState::Succeeded`] or
//! [`ResourceState::FailedPermanently`]), verifying completions against their
//! validators and retrying rejected ones within the policy's budget.

mod engine;
mod state;

pub use engine::LoadSession;
pub use state::{ResourceState, SessionSnapshot};
