#![forbid(unsafe_code)]

//! Core: widget tree, per-node event tables, bubbling dispatch, state
//! transitions, and the per-cycle update queue.

pub mod dispatch;
pub mod error;
pub mod event;
pub mod node;
pub mod transition;
pub mod update;

pub use error::CoreError;
pub use event::{Event, EventTable, HandlerDescriptor, Payload, Response};
pub use node::{Attrs, NodeId, WidgetNode, WidgetTree};
pub use transition::{RenderContext, TransitionRegistry, TransitionScope};
pub use update::{PatchOp, UpdateQueue, UpdateRecord};
