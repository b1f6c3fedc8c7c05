//! Mail provider seam
//!
//! The ingestion driver talks to the mailbox only through these traits, so
//! tests can substitute a scripted mailbox for the Gmail API.

use anyhow::Result;

use crate::models::{FetchedMessage, MessageId, UserCredential};

/// A label as known to the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLabel {
    pub id: String,
    pub name: String,
}

/// Remote mailbox operations used by ingestion
///
/// Every call is a blocking remote call that may fail; callers decide
/// whether a failure is fatal for their unit of work.
pub trait MailProvider {
    /// List message IDs matching a search query, at most `max_results`
    fn list_messages(&self, query: &str, max_results: usize) -> Result<Vec<MessageId>>;

    /// Fetch a full message including its part tree
    fn get_message(&self, id: &MessageId) -> Result<FetchedMessage>;

    /// Fetch the raw bytes of an attachment
    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>>;

    /// List the mailbox's labels
    fn list_labels(&self) -> Result<Vec<RemoteLabel>>;

    /// Create a user label, returning it
    fn create_label(&self, name: &str) -> Result<RemoteLabel>;

    /// Add and remove labels on a message
    fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()>;
}

/// An authenticated connection to one user's mailbox
pub struct MailSession {
    pub provider: Box<dyn MailProvider>,
    /// Set when connecting had to refresh the access token; the caller
    /// persists it
    pub refreshed: Option<UserCredential>,
}

/// Opens mailbox sessions from stored credentials
pub trait MailConnector {
    /// Connect as the given user, refreshing the access token if needed
    ///
    /// # Errors
    /// Returns [`CredentialError`](crate::CredentialError) when no usable
    /// access token can be obtained.
    fn connect(&self, credential: &UserCredential) -> Result<MailSession>;
}

/// Find a label by name, creating it if absent
pub fn ensure_label(provider: &dyn MailProvider, name: &str) -> Result<RemoteLabel> {
    if let Some(label) = provider
        .list_labels()?
        .into_iter()
        .find(|label| label.name == name)
    {
        return Ok(label);
    }
    provider.create_label(name)
}
