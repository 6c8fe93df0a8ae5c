//! Ordered collection of UI mutations produced while processing one event.
//!
//! A queue instance is owned per processing cycle and passed explicitly
//! through the dispatch call chain; there is no process-wide accumulator.
//! Records are append-only during the cycle and drained exactly once by
//! the renderer, so clients applying the payload sequentially observe the
//! same end state production did.

use serde::{Deserialize, Serialize};

/// The mutation applied to a patch target.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOp {
    /// Replace the target element entirely.
    Replace,
    /// Update the target element's content.
    Update,
}

impl PatchOp {
    /// Wire name of the operation.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PatchOp::Replace => "replace",
            PatchOp::Update => "update",
        }
    }
}

/// One UI mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateRecord {
    /// Mutate an existing target element with `content`.
    Patch {
        /// The operation to apply.
        op: PatchOp,
        /// Id of the element being mutated.
        target: String,
        /// Markup to apply; escaped by the renderer, not here.
        content: String,
    },
    /// An opaque instruction executed verbatim, unescaped.
    Script {
        /// The raw instruction text.
        content: String,
    },
}

impl UpdateRecord {
    /// A patch replacing `target` with `content`.
    #[must_use]
    pub fn replace(target: impl Into<String>, content: impl Into<String>) -> Self {
        UpdateRecord::Patch {
            op: PatchOp::Replace,
            target: target.into(),
            content: content.into(),
        }
    }

    /// A patch updating `target`'s content.
    #[must_use]
    pub fn update(target: impl Into<String>, content: impl Into<String>) -> Self {
        UpdateRecord::Patch {
            op: PatchOp::Update,
            target: target.into(),
            content: content.into(),
        }
    }

    /// A raw script record.
    #[must_use]
    pub fn script(content: impl Into<String>) -> Self {
        UpdateRecord::Script {
            content: content.into(),
        }
    }
}

/// Ordered, append-only collector of [`UpdateRecord`]s for one cycle.
#[derive(Debug, Default)]
pub struct UpdateQueue {
    records: Vec<UpdateRecord>,
}

impl UpdateQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record.
    pub fn push(&mut self, record: UpdateRecord) {
        self.records.push(record);
    }

    /// Take the full ordered sequence, leaving the queue empty.
    #[must_use]
    pub fn drain(&mut self) -> Vec<UpdateRecord> {
        std::mem::take(&mut self.records)
    }

    /// Number of queued records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing has been queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_returns_records_in_push_order_and_clears() {
        let mut queue = UpdateQueue::new();
        queue.push(UpdateRecord::update("kid", "squeak!"));
        queue.push(UpdateRecord::replace("mum", "burp!"));
        queue.push(UpdateRecord::script("squeak();"));

        let drained = queue.drain();
        assert_eq!(
            drained,
            vec![
                UpdateRecord::update("kid", "squeak!"),
                UpdateRecord::replace("mum", "burp!"),
                UpdateRecord::script("squeak();"),
            ]
        );
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn patch_op_wire_names() {
        assert_eq!(PatchOp::Replace.as_str(), "replace");
        assert_eq!(PatchOp::Update.as_str(), "update");
    }
}
