//! Manifest construction: resource identity and the fluent builder.
//!
//! A manifest is the ordered, immutable-at-run-time list of resources a
//! session will load. It is assembled through [`Preflight`], the fluent
//! builder, which also accumulates per-resource validators, completion
//! callbacks, retry configuration, and event observers.

mod builder;
mod resource;

pub use builder::{LoadedCallback, Preflight, Validator};
pub use resource::{
    Manifest, ResourceDescriptor, ResourceKey, ResourceKind, CSS_PREFIX, PRELOAD_PREFIX,
};
