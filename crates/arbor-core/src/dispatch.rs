//! Bubbling event dispatch.
//!
//! An event climbs from its source node through every ancestor to the
//! root. At each level the node's matching handlers run in registration
//! order; each handler resolves its target by full-tree search and
//! invokes the named transition on it. Events fired from inside a
//! transition are bubbled to completion before the outer loop continues,
//! so dispatch is synchronous and depth-first with respect to nested
//! firing.
//!
//! # Design Notes
//!
//! - Bubbling always reaches the root; there is no stop-propagation
//!   primitive. Per-level exhaustive handling before ascending keeps
//!   "nearest handler reacts first" semantics while still letting
//!   ancestors react to the same occurrence.
//! - The ancestor chain is fixed before any handler runs. Chain nodes
//!   detached by an earlier handler are skipped when their turn comes.

use crate::error::CoreError;
use crate::event::Event;
use crate::node::{NodeId, WidgetTree};
use crate::transition::{RenderContext, TransitionRegistry, TransitionScope};
use crate::update::UpdateQueue;

/// Bubble `event` from its source to the root, invoking every matching
/// handler along the way.
///
/// Fails with `NotFound` when the event source or a handler's target id
/// does not exist in the current tree.
pub fn dispatch(
    tree: &mut WidgetTree,
    registry: &TransitionRegistry,
    event: &Event,
    queue: &mut UpdateQueue,
    ctx: Option<&dyn RenderContext>,
) -> Result<(), CoreError> {
    let source = tree.find_required(&event.source)?;
    let chain = tree.ancestry(source);
    tracing::debug!(
        event_type = %event.event_type,
        source = %event.source,
        depth = chain.len(),
        "bubbling event"
    );

    for level in chain {
        // A handler earlier in the bubble may have detached this node.
        let Some(node) = tree.get(level) else {
            continue;
        };
        let matching = node.handlers().handlers_for(&event.event_type, &event.source);
        if !matching.is_empty() {
            tracing::trace!(widget = %node.id(), handlers = matching.len(), "handlers matched");
        }
        for handler in matching {
            let target = tree.find_required(&handler.target_id)?;
            invoke(tree, registry, target, &handler.state, event, queue, ctx)?;
        }
    }
    Ok(())
}

/// Invoke `state` on `target` and bubble any events it fires to
/// completion.
///
/// Returns the markup the transition produced, when it produced any.
/// This is also the entry point for direct (non-bubbled) invocations
/// such as rendering a single widget.
pub fn invoke(
    tree: &mut WidgetTree,
    registry: &TransitionRegistry,
    target: NodeId,
    state: &str,
    event: &Event,
    queue: &mut UpdateQueue,
    ctx: Option<&dyn RenderContext>,
) -> Result<Option<String>, CoreError> {
    let kind = tree
        .get(target)
        .ok_or_else(|| CoreError::NotFound(event.source.clone()))?
        .kind()
        .to_string();

    let mut scope = TransitionScope::new(tree, target, event, queue, ctx);
    let markup = registry.invoke(&mut scope, &kind, state)?;
    let fired = scope.into_fired();

    for nested in fired {
        dispatch(tree, registry, &nested, queue, ctx)?;
    }
    Ok(markup)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Response;
    use crate::node::WidgetNode;
    use crate::update::UpdateRecord;

    fn mouse_registry() -> TransitionRegistry {
        let mut registry = TransitionRegistry::new();
        registry.register("mouse", "squeak", |scope| {
            let id = scope.node()?.id().to_string();
            scope.push(UpdateRecord::update(&id, "squeak!"));
            Ok(None)
        });
        registry.register("mouse", "alert", |scope| {
            let id = scope.node()?.id().to_string();
            scope.push(UpdateRecord::replace(&id, "alert!"));
            Ok(None)
        });
        registry
    }

    fn family() -> (WidgetTree, NodeId, NodeId) {
        let mut tree = WidgetTree::new(WidgetNode::new("mum", "mouse"));
        let mum = tree.root();
        let kid = tree.attach(mum, WidgetNode::new("kid", "mouse")).unwrap();
        (tree, mum, kid)
    }

    #[test]
    fn bubbles_source_to_root_in_order() {
        let (mut tree, mum, kid) = family();
        tree.respond_to_event(kid, "squeak", Response::invoke("squeak"))
            .unwrap();
        tree.respond_to_event(mum, "squeak", Response::invoke("alert"))
            .unwrap();

        let registry = mouse_registry();
        let mut queue = UpdateQueue::new();
        dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "kid"),
            &mut queue,
            None,
        )
        .unwrap();

        assert_eq!(
            queue.drain(),
            vec![
                UpdateRecord::update("kid", "squeak!"),
                UpdateRecord::replace("mum", "alert!"),
            ]
        );
    }

    #[test]
    fn each_level_runs_all_its_handlers_before_ascending() {
        let (mut tree, mum, kid) = family();
        // Two handlers at the kid level, one at mum.
        tree.respond_to_event(kid, "squeak", Response::invoke("squeak"))
            .unwrap();
        tree.respond_to_event(kid, "squeak", Response::invoke("alert").with_target("mum"))
            .unwrap();
        tree.respond_to_event(mum, "squeak", Response::invoke("squeak"))
            .unwrap();

        let registry = mouse_registry();
        let mut queue = UpdateQueue::new();
        dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "kid"),
            &mut queue,
            None,
        )
        .unwrap();

        assert_eq!(
            queue.drain(),
            vec![
                UpdateRecord::update("kid", "squeak!"),
                UpdateRecord::replace("mum", "alert!"),
                UpdateRecord::update("mum", "squeak!"),
            ]
        );
    }

    #[test]
    fn source_filter_skips_other_sources() {
        let (mut tree, mum, _kid) = family();
        tree.respond_to_event(
            mum,
            "squeak",
            Response::invoke("alert").with_source_filter("kid"),
        )
        .unwrap();

        let registry = mouse_registry();
        let mut queue = UpdateQueue::new();
        dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "mum"),
            &mut queue,
            None,
        )
        .unwrap();
        assert!(queue.is_empty());

        dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "kid"),
            &mut queue,
            None,
        )
        .unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn nested_events_bubble_before_the_outer_loop_continues() {
        let (mut tree, mum, kid) = family();
        let mut registry = mouse_registry();
        registry.register("mouse", "panic", |scope| {
            let id = scope.node()?.id().to_string();
            scope.push(UpdateRecord::update(&id, "panic!"));
            scope.fire(Event::new("doorSlam", id));
            Ok(None)
        });
        registry.register("mouse", "hide", |scope| {
            let id = scope.node()?.id().to_string();
            scope.push(UpdateRecord::update(&id, "hidden"));
            Ok(None)
        });

        tree.respond_to_event(kid, "squeak", Response::invoke("panic"))
            .unwrap();
        tree.respond_to_event(mum, "doorSlam", Response::invoke("hide"))
            .unwrap();
        tree.respond_to_event(mum, "squeak", Response::invoke("alert"))
            .unwrap();

        let mut queue = UpdateQueue::new();
        dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "kid"),
            &mut queue,
            None,
        )
        .unwrap();

        // The doorSlam fired by `panic` fully bubbles (mum hides) before
        // mum's own squeak handler runs.
        assert_eq!(
            queue.drain(),
            vec![
                UpdateRecord::update("kid", "panic!"),
                UpdateRecord::update("mum", "hidden"),
                UpdateRecord::replace("mum", "alert!"),
            ]
        );
    }

    #[test]
    fn unknown_source_fails() {
        let (mut tree, _, _) = family();
        let registry = mouse_registry();
        let mut queue = UpdateQueue::new();
        let err = dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "tom"),
            &mut queue,
            None,
        )
        .unwrap_err();
        assert_eq!(err, CoreError::NotFound("tom".into()));
    }

    #[test]
    fn handler_target_missing_from_tree_fails() {
        let (mut tree, _mum, kid) = family();
        tree.respond_to_event(kid, "squeak", Response::invoke("squeak").with_target("ghost"))
            .unwrap();

        let registry = mouse_registry();
        let mut queue = UpdateQueue::new();
        let err = dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "kid"),
            &mut queue,
            None,
        )
        .unwrap_err();
        assert_eq!(err, CoreError::NotFound("ghost".into()));
    }

    #[test]
    fn detached_chain_nodes_are_skipped() {
        let mut tree = WidgetTree::new(WidgetNode::new("mum", "mouse"));
        let mum = tree.root();
        let kid = tree.attach(mum, WidgetNode::new("kid", "mouse")).unwrap();
        let toy = tree.attach(kid, WidgetNode::new("toy", "mouse")).unwrap();

        let mut registry = mouse_registry();
        registry.register("mouse", "drop_kid", |scope| {
            let kid = scope.tree.find_required("kid")?;
            scope.tree.detach(kid)?;
            Ok(None)
        });

        // toy's own handler detaches kid; kid's level must then be skipped
        // and bubbling still reach mum. The handler targets mum so the
        // target survives its own detach.
        tree.respond_to_event(toy, "squeak", Response::invoke("drop_kid").with_target("mum"))
            .unwrap();
        tree.respond_to_event(kid, "squeak", Response::invoke("squeak"))
            .unwrap();
        tree.respond_to_event(mum, "squeak", Response::invoke("alert"))
            .unwrap();

        let mut queue = UpdateQueue::new();
        dispatch(
            &mut tree,
            &registry,
            &Event::new("squeak", "toy"),
            &mut queue,
            None,
        )
        .unwrap();

        assert_eq!(queue.drain(), vec![UpdateRecord::replace("mum", "alert!")]);
        assert_eq!(tree.size(), 1);
    }
}
