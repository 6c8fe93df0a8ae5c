//! State transitions: the named operations a widget kind exposes.
//!
//! Kinds are open-ended strings, so behaviors live in a
//! [`TransitionRegistry`] mapping `(kind, transition name)` to a boxed
//! closure rather than in a trait per kind. Invoking a missing mapping
//! fails with `UnknownState`.
//!
//! A transition runs against a [`TransitionScope`]: mutable access to the
//! tree and the cycle's update queue, the triggering event, the target
//! node, and the externally bound [`RenderContext`]. Events fired from a
//! scope are collected and fully bubbled by the dispatcher before the
//! outer bubbling loop continues.

use crate::error::CoreError;
use crate::event::{Event, Payload};
use crate::node::{NodeId, WidgetNode, WidgetTree};
use crate::update::{UpdateQueue, UpdateRecord};
use std::collections::HashMap;

/// The external rendering collaborator.
///
/// Consumes a node's kind and state dictionary and produces a markup
/// string. The core calls it only from inside transitions and never
/// inspects the result.
pub trait RenderContext {
    /// Render markup for `node` with call-time `params`.
    fn render(&self, node: &WidgetNode, params: &Payload) -> Result<String, CoreError>;
}

/// Everything a transition may touch while it runs.
pub struct TransitionScope<'a> {
    /// The live tree; transitions may attach, detach, and mutate state.
    pub tree: &'a mut WidgetTree,
    /// The node the transition was invoked on.
    pub target: NodeId,
    /// The event that triggered the invocation.
    pub event: &'a Event,
    /// The cycle's update queue.
    pub queue: &'a mut UpdateQueue,
    /// The bound rendering collaborator, when the caller supplied one.
    pub ctx: Option<&'a dyn RenderContext>,
    fired: Vec<Event>,
}

impl<'a> TransitionScope<'a> {
    /// Build a scope for one invocation.
    #[must_use]
    pub fn new(
        tree: &'a mut WidgetTree,
        target: NodeId,
        event: &'a Event,
        queue: &'a mut UpdateQueue,
        ctx: Option<&'a dyn RenderContext>,
    ) -> Self {
        Self {
            tree,
            target,
            event,
            queue,
            ctx,
            fired: Vec::new(),
        }
    }

    /// Borrow the target node.
    pub fn node(&self) -> Result<&WidgetNode, CoreError> {
        self.tree
            .get(self.target)
            .ok_or_else(|| CoreError::NotFound(self.event.source.clone()))
    }

    /// Mutably borrow the target node.
    pub fn node_mut(&mut self) -> Result<&mut WidgetNode, CoreError> {
        let source = self.event.source.clone();
        self.tree
            .get_mut(self.target)
            .ok_or(CoreError::NotFound(source))
    }

    /// Queue a UI mutation.
    pub fn push(&mut self, record: UpdateRecord) {
        self.queue.push(record);
    }

    /// Fire a nested event.
    ///
    /// The dispatcher bubbles it to completion right after this
    /// transition returns, before ascending further.
    pub fn fire(&mut self, event: Event) {
        self.fired.push(event);
    }

    /// Render the target node through the bound context.
    ///
    /// Fails with a transition error when no context was bound.
    pub fn render(&self, params: &Payload) -> Result<String, CoreError> {
        let ctx = self.ctx.ok_or_else(|| {
            CoreError::transition(self.event.event_type.clone(), "no render context bound")
        })?;
        ctx.render(self.node()?, params)
    }

    /// Consume the scope, yielding events fired during the invocation.
    #[must_use]
    pub fn into_fired(self) -> Vec<Event> {
        self.fired
    }
}

type TransitionFn = Box<dyn Fn(&mut TransitionScope<'_>) -> Result<Option<String>, CoreError>>;

/// Registry mapping `(kind, transition name)` to behavior.
///
/// A transition returns `Ok(Some(markup))` when it rendered something
/// (the render entry point surfaces that string) and `Ok(None)` when it
/// only mutated state or queued updates.
#[derive(Default)]
pub struct TransitionRegistry {
    transitions: HashMap<(String, String), TransitionFn>,
}

impl TransitionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `state` for `kind`, replacing any previous registration.
    pub fn register<F>(&mut self, kind: impl Into<String>, state: impl Into<String>, f: F)
    where
        F: Fn(&mut TransitionScope<'_>) -> Result<Option<String>, CoreError> + 'static,
    {
        self.transitions
            .insert((kind.into(), state.into()), Box::new(f));
    }

    /// Whether `kind` exposes `state`.
    #[must_use]
    pub fn exposes(&self, kind: &str, state: &str) -> bool {
        self.transitions
            .contains_key(&(kind.to_string(), state.to_string()))
    }

    /// Invoke `state` on the scope's target, which must be of `kind`.
    pub fn invoke(
        &self,
        scope: &mut TransitionScope<'_>,
        kind: &str,
        state: &str,
    ) -> Result<Option<String>, CoreError> {
        let f = self
            .transitions
            .get(&(kind.to_string(), state.to_string()))
            .ok_or_else(|| CoreError::UnknownState {
                kind: kind.to_string(),
                state: state.to_string(),
            })?;
        tracing::trace!(kind = %kind, state = %state, "invoke transition");
        f(scope)
    }
}

impl std::fmt::Debug for TransitionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransitionRegistry")
            .field("transitions", &self.transitions.len())
            .finish()
    }
}
