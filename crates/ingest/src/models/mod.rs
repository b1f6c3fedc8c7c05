//! Domain models for ingestion

mod credential;
mod message;
mod part;
mod processed;
mod task;

pub use credential::{EXPIRY_BUFFER_SECS, UserCredential};
pub use message::{EmailAddress, FetchedMessage, FetchedMessageBuilder, MessageId};
pub use part::{PartBody, PartIter, PartNode};
pub use processed::{ContentHash, ProcessedMessage};
pub use task::{TaskRecord, TaskStatus};
