//! The batch-loader seam.
//!
//! The engine never fetches anything itself. It hands a [`LoadRequest`] to a
//! [`ResourceLoader`], the external service that actually fetches or injects
//! each resource, and waits for the loader to report per-resource completion
//! through the request's [`CompletionSink`].
//!
//! The loader's completion report means "I believe this resource finished",
//! success or not; verifying that the resource actually initialized is the
//! engine's job. Requests may cover any subset of the manifest, down to a
//! single key for retries.
//!
//! Loaders are injected explicitly (builder or `start()` parameter); the
//! core performs no ambient service discovery.

use std::fmt;
use std::sync::Arc;

use crate::manifest::ResourceKey;

/// External service that loads resources and reports their completion.
///
/// `load` is fire-and-forget: the loader performs its work asynchronously
/// and invokes the request's sink once per resource key, in whatever order
/// it finishes them.
pub trait ResourceLoader: Send + Sync + 'static {
    /// Begins loading every resource in `request`.
    fn load(&self, request: LoadRequest);
}

/// A batch of resources to load, with the channel for reporting completion.
pub struct LoadRequest {
    resources: Vec<ResourceKey>,
    completions: CompletionSink,
}

impl LoadRequest {
    /// Creates a request for the given keys.
    pub fn new(resources: Vec<ResourceKey>, completions: CompletionSink) -> Self {
        Self {
            resources,
            completions,
        }
    }

    /// The resource keys to load, in manifest order.
    pub fn resources(&self) -> &[ResourceKey] {
        &self.resources
    }

    /// The sink to report per-resource completion on.
    pub fn completions(&self) -> &CompletionSink {
        &self.completions
    }

    /// Splits the request into its keys and sink.
    pub fn into_parts(self) -> (Vec<ResourceKey>, CompletionSink) {
        (self.resources, self.completions)
    }
}

impl fmt::Debug for LoadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadRequest")
            .field("resources", &self.resources)
            .finish()
    }
}

/// Cloneable handle a loader uses to report that a resource finished.
///
/// Completion is a statement about the fetch, not about correctness: the
/// engine runs the resource's validator (if any) on every report and decides
/// success or retry itself. Reports for unknown or already-settled keys are
/// ignored.
#[derive(Clone)]
pub struct CompletionSink {
    deliver: Arc<dyn Fn(ResourceKey) + Send + Sync>,
}

impl CompletionSink {
    /// Creates a sink that routes completions into `deliver`.
    pub fn new(deliver: impl Fn(ResourceKey) + Send + Sync + 'static) -> Self {
        Self {
            deliver: Arc::new(deliver),
        }
    }

    /// Reports that the resource identified by `key` finished loading.
    pub fn complete(&self, key: ResourceKey) {
        (self.deliver)(key);
    }
}

impl fmt::Debug for CompletionSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CompletionSink")
    }
}
