//! Preflight - declarative asset-load orchestration with bounded retry
//!
//! Callers describe a sequence of resources (scripts, stylesheets, preload
//! assets) through a fluent builder, attach per-resource success checks and
//! completion callbacks, and hand the batch to an external loader. The
//! session then tracks each resource's asynchronous completion, verifies
//! that it actually initialized (not just that the fetch finished), retries
//! rejected resources up to a bounded count with a configurable delay, and
//! emits progress / retry / fail events to observers.
//!
//! # Architecture
//!
//! ```text
//! Preflight (builder) ──build()──► LoadSession ──start()──► ResourceLoader
//!   manifest, validators,            │    ▲                    (external)
//!   callbacks, policy,               │    │ retry re-issue          │
//!   observers                        │    │ (single resource)       │
//!                                    │  RetryScheduler ◄── verify   │
//!                                    │                    failed    │
//!                                    ▼                              │
//!                          progress / retry / fail ◄── CompletionSink
//!                                 observers            (one report per key)
//! ```
//!
//! The loader and the retry scheduler are both injected trait objects: the
//! core performs no fetching, no injection, and no ambient service
//! discovery. Fetching is entirely the loader's concern; deciding whether a
//! completion counts, and what to do when it does not, is entirely the
//! session's.
//!
//! # Example
//!
//! ```
//! use preflight::{InlineRetryScheduler, LoadRequest, Preflight, ResourceLoader};
//! use std::sync::Arc;
//!
//! // A loader that "finishes" every resource as soon as it is asked.
//! struct EagerLoader;
//!
//! impl ResourceLoader for EagerLoader {
//!     fn load(&self, request: LoadRequest) {
//!         let (resources, completions) = request.into_parts();
//!         for key in resources {
//!             completions.complete(key);
//!         }
//!     }
//! }
//!
//! let session = Preflight::new()
//!     .script("app.js")
//!     .then(|| println!("app.js is up"))
//!     .style("theme.css")
//!     .on_progress(|e| println!("{:.0}% loaded", e.percent * 100.0))
//!     .scheduler(Arc::new(InlineRetryScheduler))
//!     .loader(Arc::new(EagerLoader))
//!     .run()
//!     .unwrap();
//!
//! assert!(session.is_settled());
//! assert_eq!(session.snapshot().succeeded, 2);
//! ```

pub mod error;
pub mod events;
pub mod loader;
pub mod manifest;
pub mod policy;
pub mod schedule;
pub mod session;

pub use error::ConfigError;
pub use events::{AttemptEvent, Channel, Event, Observers, ProgressEvent};
pub use loader::{CompletionSink, LoadRequest, ResourceLoader};
pub use manifest::{
    LoadedCallback, Manifest, Preflight, ResourceDescriptor, ResourceKey, ResourceKind, Validator,
};
pub use policy::{RetryDecision, RetryPolicy, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_MS};
pub use schedule::{InlineRetryScheduler, RetryScheduler, RetryTask, TokioRetryScheduler};
pub use session::{LoadSession, ResourceState, SessionSnapshot};
