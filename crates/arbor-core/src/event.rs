//! Event values and per-node handler tables.
//!
//! An [`Event`] is an immutable description of an occurrence: its type, the
//! id of the widget it originated at, and an open payload. Widgets declare
//! interest in event types passing by during bubbling through their
//! [`EventTable`], which maps event types to ordered handler descriptors.
//!
//! # Design Notes
//!
//! - Handler lists preserve registration order; dispatch relies on it.
//! - Registration is idempotent by default: re-registering a descriptor
//!   that compares equal (full tuple) is a no-op unless forced.
//! - A descriptor's `source_filter` restricts matching to events that
//!   originated at one specific widget; `None` matches any source.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Open-ended event payload: parameter name to JSON-shaped value.
pub type Payload = BTreeMap<String, serde_json::Value>;

/// An immutable description of an occurrence in the widget tree.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// The event type, e.g. `"squeak"`.
    pub event_type: String,
    /// Id of the widget the event originated at. Used for source-filter
    /// matching while bubbling.
    pub source: String,
    /// Arbitrary additional parameters.
    pub payload: Payload,
}

impl Event {
    /// Create an event of `event_type` originating at widget `source`.
    #[must_use]
    pub fn new(event_type: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            source: source.into(),
            payload: Payload::new(),
        }
    }

    /// Add a payload parameter.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.into(), value.into());
        self
    }
}

/// A registered interest: when a matching event bubbles past the owning
/// node, invoke `state` on the widget identified by `target_id`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HandlerDescriptor {
    /// Id of the widget whose transition gets invoked.
    pub target_id: String,
    /// Name of the transition to invoke.
    pub state: String,
    /// When set, only events originating at this widget id match.
    pub source_filter: Option<String>,
}

/// Handler registration options, built with [`Response::invoke`].
///
/// Defaults mirror the common case: the handler targets the registering
/// widget itself, matches any source, and registers idempotently.
///
/// # Example
///
/// ```
/// use arbor_core::Response;
///
/// let response = Response::invoke("refill_cheese")
///     .with_target("mouse_trap")
///     .with_source_filter("mouse_trap");
/// assert!(response.is_once());
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    state: String,
    target: Option<String>,
    source_filter: Option<String>,
    once: bool,
}

impl Response {
    /// Respond by invoking the named transition.
    #[must_use]
    pub fn invoke(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            target: None,
            source_filter: None,
            once: true,
        }
    }

    /// Invoke the transition on this widget id instead of the registrant.
    #[must_use]
    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target = Some(target_id.into());
        self
    }

    /// Only react to events originating at this widget id.
    #[must_use]
    pub fn with_source_filter(mut self, source_id: impl Into<String>) -> Self {
        self.source_filter = Some(source_id.into());
        self
    }

    /// Register even when an identical descriptor is already present.
    #[must_use]
    pub fn repeatable(mut self) -> Self {
        self.once = false;
        self
    }

    /// Whether registration is idempotent (the default).
    #[must_use]
    pub fn is_once(&self) -> bool {
        self.once
    }

    /// Resolve into a descriptor, defaulting the target to `own_id`.
    #[must_use]
    pub fn into_descriptor(self, own_id: &str) -> (HandlerDescriptor, bool) {
        let descriptor = HandlerDescriptor {
            target_id: self.target.unwrap_or_else(|| own_id.to_string()),
            state: self.state,
            source_filter: self.source_filter,
        };
        (descriptor, self.once)
    }
}

/// Per-node registry of bubbling-interest handlers.
#[derive(Clone, Debug, Default)]
pub struct EventTable {
    handlers: BTreeMap<String, Vec<HandlerDescriptor>>,
}

impl EventTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor for `event_type`.
    ///
    /// With `once` set, an identical descriptor already present for the
    /// type (matched by value equality of the full tuple) makes the call
    /// a no-op. Returns whether the descriptor was appended.
    pub fn register(
        &mut self,
        event_type: impl Into<String>,
        descriptor: HandlerDescriptor,
        once: bool,
    ) -> bool {
        let event_type = event_type.into();
        let list = self.handlers.entry(event_type).or_default();
        if once && list.contains(&descriptor) {
            return false;
        }
        list.push(descriptor);
        true
    }

    /// All descriptors for `event_type` matching an event from `source`,
    /// in registration order.
    ///
    /// A descriptor matches when its source filter is unset or equals
    /// `source`.
    #[must_use]
    pub fn handlers_for(&self, event_type: &str, source: &str) -> Vec<HandlerDescriptor> {
        self.handlers
            .get(event_type)
            .map(|list| {
                list.iter()
                    .filter(|h| {
                        h.source_filter
                            .as_deref()
                            .is_none_or(|filter| filter == source)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Total number of registered descriptors for `event_type`.
    #[must_use]
    pub fn len_for(&self, event_type: &str) -> usize {
        self.handlers.get(event_type).map_or(0, Vec::len)
    }

    /// Whether no handlers are registered at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.values().all(Vec::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(target: &str, state: &str, from: Option<&str>) -> HandlerDescriptor {
        HandlerDescriptor {
            target_id: target.into(),
            state: state.into(),
            source_filter: from.map(Into::into),
        }
    }

    #[test]
    fn register_is_idempotent_by_default() {
        let mut table = EventTable::new();
        assert!(table.register("squeak", descriptor("mum", "alert", None), true));
        assert!(!table.register("squeak", descriptor("mum", "alert", None), true));
        assert_eq!(table.len_for("squeak"), 1);
    }

    #[test]
    fn forced_register_appends_duplicates() {
        let mut table = EventTable::new();
        table.register("squeak", descriptor("mum", "alert", None), true);
        assert!(table.register("squeak", descriptor("mum", "alert", None), false));
        assert_eq!(table.len_for("squeak"), 2);
    }

    #[test]
    fn distinct_filter_is_a_distinct_descriptor() {
        let mut table = EventTable::new();
        table.register("squeak", descriptor("mum", "alert", None), true);
        assert!(table.register("squeak", descriptor("mum", "alert", Some("kid")), true));
        assert_eq!(table.len_for("squeak"), 2);
    }

    #[test]
    fn handlers_for_applies_source_filter() {
        let mut table = EventTable::new();
        table.register("captured", descriptor("trap", "refill", Some("mouse_trap")), true);
        table.register("captured", descriptor("trap", "log", None), true);

        let from_mouse = table.handlers_for("captured", "mouse_trap");
        assert_eq!(from_mouse.len(), 2);

        let from_bear = table.handlers_for("captured", "bear_trap");
        assert_eq!(from_bear.len(), 1);
        assert_eq!(from_bear[0].state, "log");
    }

    #[test]
    fn handlers_for_preserves_registration_order() {
        let mut table = EventTable::new();
        table.register("squeak", descriptor("a", "first", None), true);
        table.register("squeak", descriptor("b", "second", None), true);
        table.register("squeak", descriptor("c", "third", None), true);
        let states: Vec<_> = table
            .handlers_for("squeak", "anyone")
            .into_iter()
            .map(|h| h.state)
            .collect();
        assert_eq!(states, ["first", "second", "third"]);
    }

    #[test]
    fn response_defaults_target_to_own_id() {
        let (descriptor, once) = Response::invoke("squeak").into_descriptor("kid");
        assert_eq!(descriptor.target_id, "kid");
        assert_eq!(descriptor.state, "squeak");
        assert!(descriptor.source_filter.is_none());
        assert!(once);
    }

    #[test]
    fn event_builder_collects_payload() {
        let event = Event::new("squeak", "kid").with("volume", "loud");
        assert_eq!(event.payload["volume"], "loud");
    }
}
