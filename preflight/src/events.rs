//! Lifecycle event channels and observer dispatch.
//!
//! A session emits on three channels:
//!
//! - `progress`: a resource was confirmed loaded
//! - `retry`: verification failed and a re-issue was scheduled
//! - `fail`: the retry budget is exhausted; the resource will never finalize
//!
//! Channels are a fixed enum with a typed dispatch table, so a misspelled
//! channel cannot be subscribed silently: typed registration
//! ([`Observers::on_progress`] and friends) rejects it at compile time, and
//! string registration validates through [`Channel::from_str`] and returns
//! [`ConfigError::UnknownChannel`].
//!
//! Observers on a channel fire in subscription order. There is no
//! unsubscribe.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::manifest::ResourceKey;

/// The fixed set of event channels a session emits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A resource was confirmed loaded.
    Progress,
    /// A failed resource was scheduled for another attempt.
    Retry,
    /// A resource exhausted its retry budget.
    Fail,
}

impl Channel {
    /// Returns the channel's wire name, as accepted by `subscribe`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Progress => "progress",
            Channel::Retry => "retry",
            Channel::Fail => "fail",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ConfigError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "progress" => Ok(Channel::Progress),
            "retry" => Ok(Channel::Retry),
            "fail" => Ok(Channel::Fail),
            other => Err(ConfigError::UnknownChannel {
                name: other.to_string(),
            }),
        }
    }
}

/// Payload of a `progress` event.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressEvent {
    /// The resource that was confirmed.
    pub key: ResourceKey,
    /// Resources confirmed so far, including this one.
    pub succeeded: usize,
    /// Total resources in the manifest.
    pub total: usize,
    /// `succeeded / total`.
    pub percent: f64,
}

/// Payload of a `retry` or `fail` event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptEvent {
    /// The resource that failed verification.
    pub key: ResourceKey,
    /// Attempts counted so far for this resource.
    pub attempts: u32,
}

/// A lifecycle event with its channel, for string-subscribed observers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Emitted on the `progress` channel.
    Progress(ProgressEvent),
    /// Emitted on the `retry` channel.
    Retry(AttemptEvent),
    /// Emitted on the `fail` channel.
    Fail(AttemptEvent),
}

impl Event {
    /// Returns the channel this event was emitted on.
    pub fn channel(&self) -> Channel {
        match self {
            Event::Progress(_) => Channel::Progress,
            Event::Retry(_) => Channel::Retry,
            Event::Fail(_) => Channel::Fail,
        }
    }
}

/// Observer of `progress` events.
pub type ProgressObserver = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

/// Observer of `retry` and `fail` events.
pub type AttemptObserver = Arc<dyn Fn(&AttemptEvent) + Send + Sync>;

/// Dispatch table mapping each channel to its ordered observer list.
///
/// Built up through the manifest builder and frozen into the session; the
/// engine emits without holding its state lock, so observers may freely call
/// back into session accessors such as `snapshot()`.
#[derive(Default)]
pub struct Observers {
    progress: Vec<ProgressObserver>,
    retry: Vec<AttemptObserver>,
    fail: Vec<AttemptObserver>,
}

impl Observers {
    /// Creates an empty dispatch table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `progress` observer.
    pub fn on_progress(&mut self, observer: impl Fn(&ProgressEvent) + Send + Sync + 'static) {
        self.progress.push(Arc::new(observer));
    }

    /// Appends a `retry` observer.
    pub fn on_retry(&mut self, observer: impl Fn(&AttemptEvent) + Send + Sync + 'static) {
        self.retry.push(Arc::new(observer));
    }

    /// Appends a `fail` observer.
    pub fn on_fail(&mut self, observer: impl Fn(&AttemptEvent) + Send + Sync + 'static) {
        self.fail.push(Arc::new(observer));
    }

    /// Appends an [`Event`]-typed observer to the given channel.
    ///
    /// Used by the string-validated `subscribe` path; the observer is wrapped
    /// into the channel's typed list, so ordering interleaves correctly with
    /// observers registered through the typed methods.
    pub fn subscribe(&mut self, channel: Channel, observer: Arc<dyn Fn(&Event) + Send + Sync>) {
        match channel {
            Channel::Progress => self
                .progress
                .push(Arc::new(move |e| observer(&Event::Progress(e.clone())))),
            Channel::Retry => self
                .retry
                .push(Arc::new(move |e| observer(&Event::Retry(e.clone())))),
            Channel::Fail => self
                .fail
                .push(Arc::new(move |e| observer(&Event::Fail(e.clone())))),
        }
    }

    /// Emits a `progress` event to all subscribers, in subscription order.
    pub fn emit_progress(&self, event: &ProgressEvent) {
        for observer in &self.progress {
            observer(event);
        }
    }

    /// Emits a `retry` event to all subscribers, in subscription order.
    pub fn emit_retry(&self, event: &AttemptEvent) {
        for observer in &self.retry {
            observer(event);
        }
    }

    /// Emits a `fail` event to all subscribers, in subscription order.
    pub fn emit_fail(&self, event: &AttemptEvent) {
        for observer in &self.fail {
            observer(event);
        }
    }
}

impl fmt::Debug for Observers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observers")
            .field("progress", &self.progress.len())
            .field("retry", &self.retry.len())
            .field("fail", &self.fail.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn progress_event(key: &str, succeeded: usize, total: usize) -> ProgressEvent {
        ProgressEvent {
            key: ResourceKey::new(key),
            succeeded,
            total,
            percent: succeeded as f64 / total as f64,
        }
    }

    #[test]
    fn test_channel_parses_known_names() {
        assert_eq!("progress".parse::<Channel>().unwrap(), Channel::Progress);
        assert_eq!("retry".parse::<Channel>().unwrap(), Channel::Retry);
        assert_eq!("fail".parse::<Channel>().unwrap(), Channel::Fail);
    }

    #[test]
    fn test_channel_rejects_unknown_names() {
        let err = "complete".parse::<Channel>().unwrap_err();
        match err {
            ConfigError::UnknownChannel { name } => assert_eq!(name, "complete"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_channel_display_round_trips() {
        for channel in [Channel::Progress, Channel::Retry, Channel::Fail] {
            assert_eq!(channel.to_string().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn test_observers_fire_in_subscription_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();
        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            observers.on_progress(move |_| order.lock().unwrap().push(tag));
        }

        observers.emit_progress(&progress_event("a.js", 1, 2));
        assert_eq!(*order.lock().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_subscribe_routes_to_the_named_channel() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut observers = Observers::new();
        let sink = Arc::clone(&seen);
        observers.subscribe(
            Channel::Retry,
            Arc::new(move |event: &Event| sink.lock().unwrap().push(event.channel())),
        );

        observers.emit_progress(&progress_event("a.js", 1, 1));
        observers.emit_retry(&AttemptEvent {
            key: ResourceKey::new("a.js"),
            attempts: 1,
        });

        assert_eq!(*seen.lock().unwrap(), vec![Channel::Retry]);
    }

    #[test]
    fn test_event_reports_its_channel() {
        let event = Event::Fail(AttemptEvent {
            key: ResourceKey::new("a.js"),
            attempts: 4,
        });
        assert_eq!(event.channel(), Channel::Fail);
    }
}
