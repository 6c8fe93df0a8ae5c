//! The server-held widget tree.
//!
//! Nodes live in an arena owned by [`WidgetTree`] and are addressed by
//! copyable [`NodeId`] handles; parent links are plain ids, so bubbling
//! and path computation never fight the ownership of the subtree.
//!
//! # Design Invariants
//!
//! 1. **Path as identity**: a node's path (root-to-node id chain) is the
//!    key that survives serialization. Reconstruction produces new arena
//!    slots, so `NodeId` values never cross a freeze/thaw boundary.
//! 2. **Sibling id uniqueness**: callers keep ids unique among siblings;
//!    [`WidgetTree::find`] is a full-tree depth-first first-match search
//!    and does not police duplicates.
//! 3. **Version gating**: the root's `version` counter is compared
//!    against a caller-supplied expectation to decide whether a stored
//!    tree may be reused. Callers bump it when the structural shape
//!    changes in a way that should invalidate stale snapshots.

use crate::error::CoreError;
use crate::event::{EventTable, Response};
use std::collections::BTreeMap;

/// Open-ended widget state: attribute name to JSON-shaped value.
pub type Attrs = BTreeMap<String, serde_json::Value>;

/// Handle to a node slot inside a [`WidgetTree`].
///
/// Only meaningful for the tree that issued it, and only until that node
/// is detached.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// A tree element with identity, kind, open state, and handler table.
#[derive(Clone, Debug)]
pub struct WidgetNode {
    id: String,
    kind: String,
    version: u32,
    attrs: Attrs,
    handlers: EventTable,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl WidgetNode {
    /// Create a detached node with the given id and kind.
    #[must_use]
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            version: 0,
            attrs: Attrs::new(),
            handlers: EventTable::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Set an attribute at construction time.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    /// The node id (unique among siblings, used as path segment).
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The variant tag selecting which transitions this node exposes.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Structural version counter. Only the root's value gates reuse.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Set the version counter.
    pub fn set_version(&mut self, version: u32) {
        self.version = version;
    }

    /// Bump the version counter, invalidating stored snapshots gated on
    /// the previous value.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// The state dictionary.
    #[must_use]
    pub fn attrs(&self) -> &Attrs {
        &self.attrs
    }

    /// Mutable access to the state dictionary.
    pub fn attrs_mut(&mut self) -> &mut Attrs {
        &mut self.attrs
    }

    /// Read a single attribute.
    #[must_use]
    pub fn attr(&self, key: &str) -> Option<&serde_json::Value> {
        self.attrs.get(key)
    }

    /// Write a single attribute.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.attrs.insert(key.into(), value.into());
    }

    /// The node's handler table.
    #[must_use]
    pub fn handlers(&self) -> &EventTable {
        &self.handlers
    }

    /// Mutable access to the handler table.
    pub fn handlers_mut(&mut self) -> &mut EventTable {
        &mut self.handlers
    }

    /// Parent handle, `None` for the root.
    #[must_use]
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Ordered child handles.
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// Arena-owned tree of [`WidgetNode`]s.
#[derive(Clone, Debug)]
pub struct WidgetTree {
    slots: Vec<Option<WidgetNode>>,
    root: NodeId,
}

impl WidgetTree {
    /// Create a tree holding just the given root node.
    #[must_use]
    pub fn new(mut root: WidgetNode) -> Self {
        root.parent = None;
        Self {
            slots: vec![Some(root)],
            root: NodeId(0),
        }
    }

    /// The root handle.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Borrow a node, `None` when the slot was detached.
    #[must_use]
    pub fn get(&self, id: NodeId) -> Option<&WidgetNode> {
        self.slots.get(id.index()).and_then(Option::as_ref)
    }

    /// Mutably borrow a node.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut WidgetNode> {
        self.slots.get_mut(id.index()).and_then(Option::as_mut)
    }

    fn fetch(&self, id: NodeId) -> Result<&WidgetNode, CoreError> {
        self.get(id)
            .ok_or_else(|| CoreError::NotFound(format!("#{}", id.0)))
    }

    /// Append `node` as the last child of `parent`.
    pub fn attach(&mut self, parent: NodeId, mut node: WidgetNode) -> Result<NodeId, CoreError> {
        let parent_id = self.fetch(parent)?.id().to_string();
        node.parent = Some(parent);
        let child_id = NodeId(self.slots.len() as u32);
        tracing::trace!(parent = %parent_id, child = %node.id(), "attach widget");
        self.slots.push(Some(node));
        self.slots[parent.index()]
            .as_mut()
            .expect("parent checked above")
            .children
            .push(child_id);
        Ok(child_id)
    }

    /// Detach `id` from its parent, discarding its subtree.
    ///
    /// Returns the detached node with its parent link cleared. Detaching
    /// the root fails with `NotFound` (the root has no parent to detach
    /// from).
    pub fn detach(&mut self, id: NodeId) -> Result<WidgetNode, CoreError> {
        let node_ref = self.fetch(id)?;
        let own_id = node_ref.id().to_string();
        let parent = node_ref.parent.ok_or(CoreError::NotFound(own_id))?;

        if let Some(parent_node) = self.slots[parent.index()].as_mut() {
            parent_node.children.retain(|c| *c != id);
        }

        // Vacate the whole subtree; slots are not reused within a request.
        for descendant in self.descendants(id) {
            self.slots[descendant.index()] = None;
        }
        let mut node = self.slots[id.index()].take().expect("checked above");
        tracing::trace!(widget = %node.id(), "detach widget");
        node.parent = None;
        node.children.clear();
        Ok(node)
    }

    fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let Some(node) = self.get(id) else {
            return out;
        };
        for child in &node.children {
            out.push(*child);
            out.extend(self.descendants(*child));
        }
        out
    }

    /// Depth-first preorder walk of all live nodes.
    #[must_use]
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = vec![self.root];
        out.extend(self.descendants(self.root));
        out
    }

    /// Full-tree search for the first node whose id matches `widget_id`.
    #[must_use]
    pub fn find(&self, widget_id: &str) -> Option<NodeId> {
        self.walk()
            .into_iter()
            .find(|n| self.get(*n).is_some_and(|node| node.id() == widget_id))
    }

    /// Like [`find`](Self::find) but failing with `NotFound`.
    pub fn find_required(&self, widget_id: &str) -> Result<NodeId, CoreError> {
        self.find(widget_id)
            .ok_or_else(|| CoreError::NotFound(widget_id.to_string()))
    }

    /// The root-to-node id chain joined by `/`.
    ///
    /// This is the persistence key: it is stable across structurally
    /// identical reconstructions, unlike [`NodeId`] values.
    pub fn path(&self, id: NodeId) -> Result<String, CoreError> {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.fetch(current)?;
            segments.push(node.id().to_string());
            cursor = node.parent;
        }
        segments.reverse();
        Ok(segments.join("/"))
    }

    /// The chain source..=root used for bubbling.
    #[must_use]
    pub fn ancestry(&self, id: NodeId) -> Vec<NodeId> {
        let mut chain = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            match self.get(current) {
                Some(node) => {
                    chain.push(current);
                    cursor = node.parent;
                }
                None => break,
            }
        }
        chain
    }

    /// Count of live nodes (root plus descendants).
    #[must_use]
    pub fn size(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Register a bubbling-interest handler on `node`.
    ///
    /// The response's target defaults to the node's own id; registration
    /// is idempotent unless the response was marked repeatable.
    pub fn respond_to_event(
        &mut self,
        node: NodeId,
        event_type: impl Into<String>,
        response: Response,
    ) -> Result<(), CoreError> {
        let own_id = self.fetch(node)?.id().to_string();
        let (descriptor, once) = response.into_descriptor(&own_id);
        tracing::debug!(
            widget = %own_id,
            target = %descriptor.target_id,
            state = %descriptor.state,
            "register event handler"
        );
        self.get_mut(node)
            .ok_or(CoreError::NotFound(own_id))?
            .handlers_mut()
            .register(event_type, descriptor, once);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mum_and_kid() -> (WidgetTree, NodeId, NodeId) {
        let mut tree = WidgetTree::new(WidgetNode::new("root", "widget"));
        let mum = tree
            .attach(tree.root(), WidgetNode::new("mum", "mouse"))
            .unwrap();
        let kid = tree.attach(mum, WidgetNode::new("kid", "mouse")).unwrap();
        (tree, mum, kid)
    }

    #[test]
    fn attach_sets_parent_and_size() {
        let (tree, mum, kid) = mum_and_kid();
        assert_eq!(tree.size(), 3);
        assert_eq!(tree.get(kid).unwrap().parent(), Some(mum));
        assert_eq!(tree.get(mum).unwrap().children(), &[kid]);
    }

    #[test]
    fn find_searches_the_full_tree() {
        let (tree, mum, kid) = mum_and_kid();
        assert_eq!(tree.find("mum"), Some(mum));
        assert_eq!(tree.find("kid"), Some(kid));
        assert_eq!(tree.find("ghost"), None);
        assert_eq!(
            tree.find_required("ghost"),
            Err(CoreError::NotFound("ghost".into()))
        );
    }

    #[test]
    fn path_joins_ids_from_root() {
        let (tree, mum, kid) = mum_and_kid();
        assert_eq!(tree.path(tree.root()).unwrap(), "root");
        assert_eq!(tree.path(mum).unwrap(), "root/mum");
        assert_eq!(tree.path(kid).unwrap(), "root/mum/kid");
    }

    #[test]
    fn ancestry_runs_source_to_root() {
        let (tree, mum, kid) = mum_and_kid();
        assert_eq!(tree.ancestry(kid), vec![kid, mum, tree.root()]);
    }

    #[test]
    fn detach_discards_the_subtree() {
        let (mut tree, mum, kid) = mum_and_kid();
        let node = tree.detach(mum).unwrap();
        assert_eq!(node.id(), "mum");
        assert!(node.parent().is_none());
        assert_eq!(tree.size(), 1);
        assert!(tree.get(kid).is_none());
        assert_eq!(tree.find("kid"), None);
    }

    #[test]
    fn detach_root_fails() {
        let (mut tree, _, _) = mum_and_kid();
        let root = tree.root();
        assert!(tree.detach(root).is_err());
    }

    #[test]
    fn respond_to_event_defaults_target_to_self() {
        let (mut tree, mum, _) = mum_and_kid();
        tree.respond_to_event(mum, "squeak", Response::invoke("alert"))
            .unwrap();
        let handlers = tree.get(mum).unwrap().handlers().handlers_for("squeak", "kid");
        assert_eq!(handlers.len(), 1);
        assert_eq!(handlers[0].target_id, "mum");
    }

    #[test]
    fn respond_to_event_twice_is_a_noop() {
        let (mut tree, mum, _) = mum_and_kid();
        tree.respond_to_event(mum, "squeak", Response::invoke("alert"))
            .unwrap();
        tree.respond_to_event(mum, "squeak", Response::invoke("alert"))
            .unwrap();
        assert_eq!(tree.get(mum).unwrap().handlers().len_for("squeak"), 1);
    }

    #[test]
    fn version_starts_at_zero_and_bumps() {
        let mut tree = WidgetTree::new(WidgetNode::new("root", "widget"));
        let root = tree.root();
        assert_eq!(tree.get(root).unwrap().version(), 0);
        tree.get_mut(root).unwrap().bump_version();
        assert_eq!(tree.get(root).unwrap().version(), 1);
    }
}
