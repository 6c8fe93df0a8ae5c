//! Tree serialization: structure and state travel separately.
//!
//! The structural dump is a newline-delimited stream, one record per
//! node in depth-first order, each record `id|kind|parent-id`. The first
//! record is self-parented and denotes the root. Loading replays the
//! stream in a single pass, so every record's parent must appear earlier
//! in the stream (the format guarantees a tree, not a graph).
//!
//! The state snapshot keys each node's attribute dictionary by its path.
//! Paths, not node handles, are the identity that survives the round
//! trip: structural reconstruction produces new arena slots every time.
//!
//! # Snapshot Format
//!
//! ```json
//! {
//!   "structure": "root|widget|root\nmum|mouse|root",
//!   "version": 1,
//!   "state": { "root": {}, "root/mum": { "cheese": 3 } }
//! }
//! ```

use crate::error::SessionError;
use arbor_core::{Attrs, WidgetNode, WidgetTree};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A frozen tree: structural blob, root version, and path-keyed state.
///
/// State entries whose path matches no node after structural
/// reconstruction are silently unused.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Newline-delimited structural records.
    pub structure: String,
    /// The root's version counter at freeze time.
    pub version: u32,
    /// Per-path attribute dictionaries.
    pub state: BTreeMap<String, Attrs>,
}

/// Serializes widget trees to [`SessionSnapshot`]s and back.
#[derive(Clone, Debug)]
pub struct TreeCodec {
    field_sep: char,
    transient: BTreeSet<String>,
}

impl Default for TreeCodec {
    fn default() -> Self {
        Self {
            field_sep: '|',
            transient: BTreeSet::new(),
        }
    }
}

impl TreeCodec {
    /// Codec with the default field separator and no transient keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a different field separator.
    ///
    /// The separator must not appear in widget ids or kind names; the
    /// codec does not escape it.
    #[must_use]
    pub fn with_field_sep(mut self, sep: char) -> Self {
        self.field_sep = sep;
        self
    }

    /// Exclude the named attributes from frozen state.
    ///
    /// Meant for transient values (live request or controller handles)
    /// that must not cross the request boundary.
    #[must_use]
    pub fn with_transient<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.transient.extend(keys.into_iter().map(Into::into));
        self
    }

    /// Serialize the tree's shape, one record per node, depth-first.
    #[must_use]
    pub fn dump_structure(&self, tree: &WidgetTree) -> String {
        let sep = self.field_sep;
        let mut lines = Vec::with_capacity(tree.size());
        for id in tree.walk() {
            let Some(node) = tree.get(id) else { continue };
            // The root is recorded as its own parent.
            let parent_id = node
                .parent()
                .and_then(|p| tree.get(p))
                .map_or_else(|| node.id().to_string(), |p| p.id().to_string());
            lines.push(format!("{}{sep}{}{sep}{parent_id}", node.id(), node.kind()));
        }
        lines.join("\n")
    }

    /// Rebuild a tree's shape from a structural stream.
    ///
    /// Strict single pass: the first record seeds the root and must be
    /// self-parented; every later record attaches to an
    /// already-materialized parent. Anything else fails with
    /// `MalformedStructuralStream`.
    pub fn load_structure(&self, input: &str) -> Result<WidgetTree, SessionError> {
        let mut tree: Option<WidgetTree> = None;
        let mut seen = HashMap::new();

        for line in input.lines().filter(|l| !l.is_empty()) {
            let fields: Vec<&str> = line.split(self.field_sep).collect();
            let &[id, kind, parent] = fields.as_slice() else {
                return Err(SessionError::malformed(line, "expected 3 fields"));
            };
            let node = WidgetNode::new(id, kind);

            match tree.as_mut() {
                None => {
                    if id != parent {
                        return Err(SessionError::malformed(
                            line,
                            "first record must be self-parented",
                        ));
                    }
                    let fresh = WidgetTree::new(node);
                    seen.insert(id.to_string(), fresh.root());
                    tree = Some(fresh);
                }
                Some(tree) => {
                    let parent_slot = *seen.get(parent).ok_or_else(|| {
                        SessionError::malformed(line, format!("parent `{parent}` not yet seen"))
                    })?;
                    let slot = tree.attach(parent_slot, node)?;
                    seen.insert(id.to_string(), slot);
                }
            }
        }

        tree.ok_or_else(|| SessionError::malformed("", "empty structural stream"))
    }

    /// Freeze the tree: structural dump plus path-keyed state snapshot.
    pub fn freeze(&self, tree: &WidgetTree) -> Result<SessionSnapshot, SessionError> {
        let mut state = BTreeMap::new();
        for id in tree.walk() {
            let Some(node) = tree.get(id) else { continue };
            let attrs: Attrs = node
                .attrs()
                .iter()
                .filter(|(k, _)| !self.transient.contains(*k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            state.insert(tree.path(id)?, attrs);
        }
        let version = tree
            .get(tree.root())
            .map(WidgetNode::version)
            .unwrap_or_default();
        tracing::debug!(nodes = state.len(), version, "froze widget tree");
        Ok(SessionSnapshot {
            structure: self.dump_structure(tree),
            version,
            state,
        })
    }

    /// Overwrite every node's attributes from the snapshot, keyed by
    /// path. Nodes without a matching entry get an empty dictionary.
    pub fn thaw(&self, tree: &mut WidgetTree, snapshot: &SessionSnapshot) -> Result<(), SessionError> {
        for id in tree.walk() {
            let path = tree.path(id)?;
            let attrs = snapshot.state.get(&path).cloned().unwrap_or_default();
            if let Some(node) = tree.get_mut(id) {
                *node.attrs_mut() = attrs;
            }
        }
        Ok(())
    }

    /// Reconstruct a live tree from a snapshot: structural load, state
    /// thaw, and root version restoration.
    pub fn load(&self, snapshot: &SessionSnapshot) -> Result<WidgetTree, SessionError> {
        let mut tree = self.load_structure(&snapshot.structure)?;
        self.thaw(&mut tree, snapshot)?;
        let root = tree.root();
        if let Some(node) = tree.get_mut(root) {
            node.set_version(snapshot.version);
        }
        tracing::debug!(size = tree.size(), version = snapshot.version, "thawed widget tree");
        Ok(tree)
    }
}
