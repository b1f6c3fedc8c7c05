//! Message model for a fetched Gmail message

use super::PartNode;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a message (Gmail message ID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// An email address with optional display name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailAddress {
    /// Display name (e.g., "John Doe")
    pub name: Option<String>,
    /// Email address (e.g., "john@example.com")
    pub email: String,
}

impl EmailAddress {
    /// Create a new email address with just the email
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            name: None,
            email: email.into(),
        }
    }

    /// Create a new email address with a display name
    pub fn with_name(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            email: email.into(),
        }
    }

    /// Parse an email address from a string like "John Doe <john@example.com>"
    pub fn parse(s: &str) -> Self {
        let s = s.trim();

        if let Some(angle_start) = s.rfind('<')
            && let Some(angle_end) = s.rfind('>')
            && angle_start < angle_end
        {
            let name = s[..angle_start].trim().trim_matches('"').trim();
            let email = s[angle_start + 1..angle_end].trim();
            return Self {
                name: if name.is_empty() {
                    None
                } else {
                    Some(name.to_string())
                },
                email: email.to_string(),
            };
        }

        Self {
            name: None,
            email: s.to_string(),
        }
    }

    /// Whether this address is the given mailbox (case-insensitive)
    pub fn is(&self, email: &str) -> bool {
        self.email.eq_ignore_ascii_case(email.trim())
    }

    /// Format the email address for display
    pub fn display(&self) -> String {
        match &self.name {
            Some(name) => format!("{} <{}>", name, self.email),
            None => self.email.clone(),
        }
    }
}

/// A message as fetched from the provider, normalized for ingestion
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Gmail message ID
    pub id: MessageId,
    /// Sender
    pub from: EmailAddress,
    /// Subject line ("No Subject" when the header is missing)
    pub subject: String,
    /// When the message was sent (Date header, falling back to Gmail's internal date)
    pub sent_at: DateTime<Utc>,
    /// First text/plain body found in the part tree
    pub body_text: String,
    /// Gmail snippet
    pub snippet: String,
    /// Root of the MIME part tree
    pub parts: PartNode,
}

impl FetchedMessage {
    /// Create a new message builder
    pub fn builder(id: impl Into<MessageId>) -> FetchedMessageBuilder {
        FetchedMessageBuilder::new(id.into())
    }

    /// Render the side-channel details text stored next to saved attachments
    pub fn details_text(&self) -> String {
        format!(
            "Email Details:\nFrom: {}\nDate: {}\nSubject: {}\n\nBody:\n{}\n",
            self.from.display(),
            self.sent_at.to_rfc3339(),
            self.subject,
            self.body_text
        )
    }
}

/// Builder for creating FetchedMessage instances
pub struct FetchedMessageBuilder {
    id: MessageId,
    from: Option<EmailAddress>,
    subject: Option<String>,
    sent_at: Option<DateTime<Utc>>,
    body_text: String,
    snippet: String,
    parts: PartNode,
}

impl FetchedMessageBuilder {
    fn new(id: MessageId) -> Self {
        Self {
            id,
            from: None,
            subject: None,
            sent_at: None,
            body_text: String::new(),
            snippet: String::new(),
            parts: PartNode::default(),
        }
    }

    pub fn from(mut self, from: EmailAddress) -> Self {
        self.from = Some(from);
        self
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn sent_at(mut self, sent_at: DateTime<Utc>) -> Self {
        self.sent_at = Some(sent_at);
        self
    }

    pub fn body_text(mut self, body_text: impl Into<String>) -> Self {
        self.body_text = body_text.into();
        self
    }

    pub fn snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = snippet.into();
        self
    }

    pub fn parts(mut self, parts: PartNode) -> Self {
        self.parts = parts;
        self
    }

    pub fn build(self) -> FetchedMessage {
        FetchedMessage {
            id: self.id,
            from: self
                .from
                .unwrap_or_else(|| EmailAddress::new("unknown@unknown.com")),
            subject: self.subject.unwrap_or_else(|| "No Subject".to_string()),
            sent_at: self.sent_at.unwrap_or_else(Utc::now),
            body_text: self.body_text,
            snippet: self.snippet,
            parts: self.parts,
        }
    }
}
