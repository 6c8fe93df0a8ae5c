//! Per-request orchestration of the widget tree lifecycle.
//!
//! A [`RequestProcessor`] is built once per request. At construction it
//! decides between exactly two cases:
//!
//! - **Fresh**: the store holds no snapshot, the caller forced a flush,
//!   or the stored version differs from the caller's expectation. The
//!   request starts with a single root node and `flushed()` reports
//!   `true`.
//! - **Reused**: a snapshot exists, no flush was forced, and the version
//!   matches. The stored tree is reconstructed and `flushed()` reports
//!   `false`.
//!
//! The store is read once here and written once at [`freeze`]
//! (`RequestProcessor::freeze`); between those points the processor owns
//! its tree outright and nothing is shared.

use crate::codec::TreeCodec;
use crate::error::SessionError;
use crate::store::SessionStore;
use arbor_core::dispatch;
use arbor_core::{
    Event, NodeId, Payload, RenderContext, TransitionRegistry, UpdateQueue, UpdateRecord,
    WidgetNode, WidgetTree,
};

/// Transition name every renderable kind is expected to expose.
pub const RENDER_STATE: &str = "render";

const ROOT_ID: &str = "root";
const ROOT_KIND: &str = "widget";

/// A resolved event descriptor: type, source widget, and free payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Address {
    /// The event type to fire.
    pub event_type: String,
    /// Id of the widget the event originates at.
    pub source: String,
    /// Arbitrary additional parameters, forwarded as the event payload.
    pub payload: Payload,
}

impl Address {
    /// Build the event this address describes.
    #[must_use]
    pub fn to_event(&self) -> Event {
        Event {
            event_type: self.event_type.clone(),
            source: self.source.clone(),
            payload: self.payload.clone(),
        }
    }
}

/// Construction options for [`RequestProcessor`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessorOptions {
    flush: bool,
    expected_version: Option<u32>,
}

impl ProcessorOptions {
    /// Default options: reuse a stored tree when one exists.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any stored tree and start fresh.
    #[must_use]
    pub fn flush(mut self) -> Self {
        self.flush = true;
        self
    }

    /// Only reuse a stored tree whose version equals `version`.
    #[must_use]
    pub fn expect_version(mut self, version: u32) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Reference to a render target: a widget id or a live node handle.
#[derive(Clone, Debug)]
pub enum WidgetRef {
    /// Resolve by id through a full-tree search.
    Id(String),
    /// A node handle from this request's tree.
    Node(NodeId),
}

impl From<&str> for WidgetRef {
    fn from(id: &str) -> Self {
        WidgetRef::Id(id.to_string())
    }
}

impl From<String> for WidgetRef {
    fn from(id: String) -> Self {
        WidgetRef::Id(id)
    }
}

impl From<NodeId> for WidgetRef {
    fn from(node: NodeId) -> Self {
        WidgetRef::Node(node)
    }
}

/// Per-request controller over one materialized widget tree.
pub struct RequestProcessor {
    tree: WidgetTree,
    registry: TransitionRegistry,
    store: Box<dyn SessionStore>,
    codec: TreeCodec,
    flushed: bool,
}

impl RequestProcessor {
    /// Load or create the request's tree from `store`.
    pub fn new(
        store: Box<dyn SessionStore>,
        registry: TransitionRegistry,
        options: ProcessorOptions,
    ) -> Result<Self, SessionError> {
        Self::with_codec(store, registry, options, TreeCodec::new())
    }

    /// Like [`new`](Self::new) with a custom codec (field separator,
    /// transient-attribute denylist).
    pub fn with_codec(
        store: Box<dyn SessionStore>,
        registry: TransitionRegistry,
        options: ProcessorOptions,
        codec: TreeCodec,
    ) -> Result<Self, SessionError> {
        let stored = store.load()?;
        let reusable = match &stored {
            Some(snapshot) if options.flush => {
                tracing::debug!(version = snapshot.version, "flush requested, discarding stored tree");
                false
            }
            Some(snapshot) => match options.expected_version {
                Some(expected) if expected != snapshot.version => {
                    tracing::debug!(
                        stored = snapshot.version,
                        expected,
                        "version mismatch, discarding stored tree"
                    );
                    false
                }
                _ => true,
            },
            None => false,
        };

        let (tree, flushed) = if reusable {
            let snapshot = stored.as_ref().expect("reusable implies stored");
            let tree = codec.load(snapshot)?;
            tracing::debug!(size = tree.size(), version = snapshot.version, "reusing stored tree");
            (tree, false)
        } else {
            (WidgetTree::new(WidgetNode::new(ROOT_ID, ROOT_KIND)), true)
        };

        Ok(Self {
            tree,
            registry,
            store,
            codec,
            flushed,
        })
    }

    /// Whether this request started with a fresh single-node tree.
    #[must_use]
    pub fn flushed(&self) -> bool {
        self.flushed
    }

    /// The root handle.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.tree.root()
    }

    /// The request's tree.
    #[must_use]
    pub fn tree(&self) -> &WidgetTree {
        &self.tree
    }

    /// Mutable access to the tree, for external modification between
    /// construction and freeze.
    pub fn tree_mut(&mut self) -> &mut WidgetTree {
        &mut self.tree
    }

    /// The transition registry.
    pub fn registry_mut(&mut self) -> &mut TransitionRegistry {
        &mut self.registry
    }

    /// Fire the addressed event through the tree and return the UI
    /// mutations it produced, in production order.
    ///
    /// Fails with `UnknownSource` when the address names a widget absent
    /// from the current tree.
    pub fn process_for(
        &mut self,
        address: &Address,
        ctx: Option<&dyn RenderContext>,
    ) -> Result<Vec<UpdateRecord>, SessionError> {
        if self.tree.find(&address.source).is_none() {
            return Err(SessionError::UnknownSource(address.source.clone()));
        }
        let event = address.to_event();
        tracing::debug!(event_type = %event.event_type, source = %event.source, "processing event");

        let mut queue = UpdateQueue::new();
        dispatch::dispatch(&mut self.tree, &self.registry, &event, &mut queue, ctx)?;
        Ok(queue.drain())
    }

    /// Render a single widget and return its markup.
    ///
    /// The target may be a widget id (failing with `UnknownWidget` when
    /// absent) or a node handle from this tree. Updates queued during the
    /// render are discarded; only the markup is surfaced.
    pub fn render_widget_for(
        &mut self,
        widget: impl Into<WidgetRef>,
        params: Payload,
        ctx: Option<&dyn RenderContext>,
    ) -> Result<String, SessionError> {
        let (target, widget_id) = match widget.into() {
            WidgetRef::Id(id) => match self.tree.find(&id) {
                Some(node) => (node, id),
                None => return Err(SessionError::UnknownWidget(id)),
            },
            WidgetRef::Node(node) => match self.tree.get(node) {
                Some(live) => (node, live.id().to_string()),
                None => return Err(SessionError::UnknownWidget(format!("{node:?}"))),
            },
        };

        let event = Event {
            event_type: RENDER_STATE.to_string(),
            source: widget_id,
            payload: params,
        };
        let mut queue = UpdateQueue::new();
        let markup = dispatch::invoke(
            &mut self.tree,
            &self.registry,
            target,
            RENDER_STATE,
            &event,
            &mut queue,
            ctx,
        )?;
        markup.ok_or_else(|| {
            SessionError::Core(arbor_core::CoreError::transition(
                RENDER_STATE,
                "render transition produced no markup",
            ))
        })
    }

    /// Validate and enrich an options map into an [`Address`].
    ///
    /// `type` is required (`MissingType` otherwise); `source` defaults to
    /// the root widget's id; everything else passes through as payload.
    pub fn address_for(&self, mut options: Payload) -> Result<Address, SessionError> {
        let event_type = match options.remove("type") {
            Some(serde_json::Value::String(s)) if !s.is_empty() => s,
            _ => return Err(SessionError::MissingType),
        };
        let source = match options.remove("source") {
            Some(serde_json::Value::String(s)) => s,
            _ => self
                .tree
                .get(self.tree.root())
                .map(|n| n.id().to_string())
                .unwrap_or_else(|| ROOT_ID.to_string()),
        };
        Ok(Address {
            event_type,
            source,
            payload: options,
        })
    }

    /// Persist the current tree into the store.
    pub fn freeze(&self) -> Result<(), SessionError> {
        let snapshot = self.codec.freeze(&self.tree)?;
        self.store.save(&snapshot)?;
        tracing::debug!(
            store = %self.store.name(),
            size = self.tree.size(),
            "froze widget tree to store"
        );
        Ok(())
    }
}

impl std::fmt::Debug for RequestProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestProcessor")
            .field("size", &self.tree.size())
            .field("flushed", &self.flushed)
            .field("store", &self.store.name())
            .finish()
    }
}
