//! The fluent manifest builder.
//!
//! `Preflight` is a single owned value threaded through chained calls. Every
//! method is total: empty URIs and `then` with nothing to attach to are
//! silent no-ops, so builders can be composed conditionally without manual
//! guards. Only two things can fail, both synchronously and both caller
//! mistakes: subscribing to an unknown channel name and running without a
//! loader.
//!
//! # Example
//!
//! ```ignore
//! let session = Preflight::new()
//!     .script_with_check("vendor/jquery.js", || js_global_exists("jQuery"))
//!     .then(|| bootstrap_widgets())
//!     .style("theme.css")
//!     .when(is_mobile, |b| b.preload("sprites-small.png"))
//!     .retries(4)
//!     .retry_delay(Duration::from_secs(2))
//!     .loader(loader)
//!     .run()?;
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ConfigError;
use crate::events::{AttemptEvent, Event, Observers, ProgressEvent};
use crate::loader::ResourceLoader;
use crate::policy::RetryPolicy;
use crate::schedule::{RetryScheduler, TokioRetryScheduler};
use crate::session::LoadSession;

use super::resource::{Manifest, ResourceDescriptor, ResourceKey, ResourceKind};

/// Per-resource success check: returns `true` once the resource is usable.
pub type Validator = Arc<dyn Fn() -> bool + Send + Sync>;

/// Completion callback, fired exactly once when its resource is confirmed.
pub type LoadedCallback = Box<dyn FnOnce() + Send>;

/// Fluent builder for a [`LoadSession`].
///
/// Accumulates the ordered manifest, per-resource validators and completion
/// callbacks, retry configuration, and event observers, then freezes them
/// into a session with [`build`](Self::build) or [`run`](Self::run).
pub struct Preflight {
    manifest: Manifest,
    validators: HashMap<ResourceKey, Validator>,
    callbacks: HashMap<ResourceKey, Vec<LoadedCallback>>,
    last_added: Option<ResourceKey>,
    policy: RetryPolicy,
    observers: Observers,
    loader: Option<Arc<dyn ResourceLoader>>,
    scheduler: Arc<dyn RetryScheduler>,
}

impl Preflight {
    /// Creates an empty builder with the default retry policy.
    pub fn new() -> Self {
        Self {
            manifest: Manifest::new(),
            validators: HashMap::new(),
            callbacks: HashMap::new(),
            last_added: None,
            policy: RetryPolicy::default(),
            observers: Observers::new(),
            loader: None,
            scheduler: Arc::new(TokioRetryScheduler),
        }
    }

    /// Adds a script resource.
    ///
    /// An empty URI is a silent no-op.
    pub fn script(self, uri: impl AsRef<str>) -> Self {
        self.add(ResourceKind::Script, uri.as_ref(), None)
    }

    /// Adds a script resource with a success check.
    ///
    /// The check runs after every completion report for this resource; a
    /// `false` return sends the resource into the retry path.
    pub fn script_with_check(
        self,
        uri: impl AsRef<str>,
        check: impl Fn() -> bool + Send + Sync + 'static,
    ) -> Self {
        self.add(ResourceKind::Script, uri.as_ref(), Some(Arc::new(check)))
    }

    /// Adds a stylesheet resource, keyed as `css!{uri}`.
    ///
    /// Stylesheets have no natural success check, so none can be attached.
    pub fn style(self, uri: impl AsRef<str>) -> Self {
        self.add(ResourceKind::Stylesheet, uri.as_ref(), None)
    }

    /// Adds a preload asset (image, font), keyed as `preload!{uri}`.
    pub fn preload(self, uri: impl AsRef<str>) -> Self {
        self.add(ResourceKind::Preload, uri.as_ref(), None)
    }

    /// Attaches a completion callback to the most recently added resource.
    ///
    /// Callbacks fire exactly once, in registration order, after the resource
    /// is confirmed. A silent no-op when nothing has been added yet.
    pub fn then(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        let Some(key) = self.last_added.clone() else {
            return self;
        };
        self.callbacks.entry(key).or_default().push(Box::new(callback));
        self
    }

    /// Applies `then_fn` to the builder when `condition` holds.
    pub fn when(self, condition: bool, then_fn: impl FnOnce(Self) -> Self) -> Self {
        if condition {
            then_fn(self)
        } else {
            self
        }
    }

    /// Applies `then_fn` when `condition` holds, `else_fn` otherwise.
    pub fn when_or_else(
        self,
        condition: bool,
        then_fn: impl FnOnce(Self) -> Self,
        else_fn: impl FnOnce(Self) -> Self,
    ) -> Self {
        if condition {
            then_fn(self)
        } else {
            else_fn(self)
        }
    }

    /// Sets the maximum number of retries per resource.
    pub fn retries(mut self, max_retries: u32) -> Self {
        self.policy.set_max_retries(max_retries);
        self
    }

    /// Sets the delay applied before each retry.
    pub fn retry_delay(mut self, delay: Duration) -> Self {
        self.policy.set_retry_delay(delay);
        self
    }

    /// Subscribes to `progress` events.
    pub fn on_progress(mut self, observer: impl Fn(&ProgressEvent) + Send + Sync + 'static) -> Self {
        self.observers.on_progress(observer);
        self
    }

    /// Subscribes to `retry` events.
    pub fn on_retry(mut self, observer: impl Fn(&AttemptEvent) + Send + Sync + 'static) -> Self {
        self.observers.on_retry(observer);
        self
    }

    /// Subscribes to `fail` events.
    pub fn on_fail(mut self, observer: impl Fn(&AttemptEvent) + Send + Sync + 'static) -> Self {
        self.observers.on_fail(observer);
        self
    }

    /// Subscribes to a channel by name: `progress`, `retry`, or `fail`.
    ///
    /// For configuration-driven callers holding channel names as strings;
    /// anything else fails with [`ConfigError::UnknownChannel`]. Statically
    /// known channels should prefer the typed methods.
    pub fn subscribe(
        mut self,
        channel: &str,
        observer: impl Fn(&Event) + Send + Sync + 'static,
    ) -> Result<Self, ConfigError> {
        let channel = channel.parse()?;
        self.observers.subscribe(channel, Arc::new(observer));
        Ok(self)
    }

    /// Injects the loader `run()` will start the session with.
    pub fn loader(mut self, loader: Arc<dyn ResourceLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Replaces the retry scheduler (timer-backed by default).
    pub fn scheduler(mut self, scheduler: Arc<dyn RetryScheduler>) -> Self {
        self.scheduler = scheduler;
        self
    }

    /// Freezes the builder into a session without starting it.
    ///
    /// Any loader injected with [`loader`](Self::loader) is discarded; pass
    /// one to [`LoadSession::start`] instead.
    pub fn build(self) -> Arc<LoadSession> {
        LoadSession::new(
            self.manifest,
            self.validators,
            self.callbacks,
            self.policy,
            self.observers,
            self.scheduler,
        )
    }

    /// Freezes the builder and starts the session with the injected loader.
    ///
    /// Fails with [`ConfigError::LoaderMissing`] when no loader was supplied.
    pub fn run(mut self) -> Result<Arc<LoadSession>, ConfigError> {
        let loader = self.loader.take().ok_or(ConfigError::LoaderMissing)?;
        let session = self.build();
        session.start(loader);
        Ok(session)
    }

    fn add(mut self, kind: ResourceKind, uri: &str, check: Option<Validator>) -> Self {
        if uri.is_empty() {
            return self;
        }
        let descriptor = ResourceDescriptor::new(kind, uri);
        let key = descriptor.key.clone();
        self.manifest.push(descriptor);
        if let Some(check) = check {
            self.validators.insert(key.clone(), check);
        }
        self.last_added = Some(key);
        self
    }
}

impl Default for Preflight {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Preflight {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Preflight")
            .field("manifest", &self.manifest)
            .field("policy", &self.policy)
            .field("last_added", &self.last_added)
            .field("observers", &self.observers)
            .finish()
    }
}
