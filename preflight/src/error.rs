//! Configuration error types.
//!
//! Only caller mistakes surface as errors: subscribing to a channel name that
//! does not exist, or running a session without a loader. Runtime load
//! failures never appear here; they are handled by the retry engine and
//! reported through the `fail` event channel.

use thiserror::Error;

/// Errors raised synchronously for caller misconfiguration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An event channel name did not match any known channel.
    ///
    /// Valid channel names are `progress`, `retry`, and `fail`.
    #[error("unknown event channel '{name}' (expected progress, retry, or fail)")]
    UnknownChannel {
        /// The name that failed to parse.
        name: String,
    },

    /// `run()` was invoked with no loader configured.
    ///
    /// Supply one with [`Preflight::loader`](crate::Preflight::loader), or
    /// build the session and call
    /// [`LoadSession::start`](crate::LoadSession::start) directly.
    #[error("no resource loader configured; supply one with loader() before run()")]
    LoaderMissing,
}
