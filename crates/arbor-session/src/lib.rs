#![forbid(unsafe_code)]

//! Session: tree persistence (freeze/thaw), pluggable snapshot stores,
//! per-request orchestration, and update-payload rendering.

pub mod codec;
pub mod error;
pub mod processor;
pub mod render;
pub mod store;

pub use codec::{SessionSnapshot, TreeCodec};
pub use error::{SessionError, StoreError};
pub use processor::{Address, ProcessorOptions, RequestProcessor, WidgetRef, RENDER_STATE};
pub use render::render_page_updates;
pub use store::{FileStore, MemoryStore, SessionStore};
