//! Storage traits and implementations
//!
//! The trait-based design allows swapping between in-memory and SQLite
//! storage for dedup state, and keeps attachment file writes behind their
//! own seam.

mod files;
mod memory;
mod sqlite;
mod traits;

pub use files::{DETAILS_FILENAME, FileAttachmentStore, sanitize_filename};
pub use memory::InMemoryContentStore;
pub use sqlite::SqliteContentStore;
pub use traits::{AttachmentStore, ContentStore};
