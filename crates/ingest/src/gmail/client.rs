//! Gmail API HTTP client
//!
//! Implements [`MailProvider`] over the Gmail REST API.
//! Uses synchronous HTTP (ureq) to be executor-agnostic; every request goes
//! through an agent configured with a global timeout.

use anyhow::{Context, Result};
use log::debug;

use super::api::{
    AttachmentResponse, CreateLabelRequest, GmailLabel, GmailMessage, ListLabelsResponse,
    ListMessagesResponse, ModifyMessageRequest,
};
use super::{OAuthClient, decode_base64_bytes, normalize_message};
use crate::models::{FetchedMessage, MessageId, UserCredential};
use crate::provider::{MailConnector, MailProvider, MailSession, RemoteLabel};

/// Gmail API client bound to one user's access token
pub struct GmailClient {
    access_token: String,
    agent: ureq::Agent,
}

impl GmailClient {
    /// Gmail API base URL
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1";

    /// Gmail caps `maxResults` on list calls at 500
    const MAX_PAGE_SIZE: usize = 500;

    /// Create a client for an already valid access token
    pub fn new(access_token: impl Into<String>, agent: ureq::Agent) -> Self {
        Self {
            access_token: access_token.into(),
            agent,
        }
    }

    fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl MailProvider for GmailClient {
    fn list_messages(&self, query: &str, max_results: usize) -> Result<Vec<MessageId>> {
        let url = format!(
            "{}/users/me/messages?q={}&maxResults={}",
            Self::BASE_URL,
            urlencoding::encode(query),
            max_results.clamp(1, Self::MAX_PAGE_SIZE)
        );

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
            .context("Failed to send list messages request")?;

        let list: ListMessagesResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse list messages response")?;

        debug!(
            "Listed {} messages (estimate {:?}) for query {:?}",
            list.messages.as_ref().map_or(0, Vec::len),
            list.result_size_estimate,
            query
        );

        Ok(list
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|m| MessageId::new(m.id))
            .collect())
    }

    fn get_message(&self, id: &MessageId) -> Result<FetchedMessage> {
        let url = format!(
            "{}/users/me/messages/{}?format=full",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
            .with_context(|| format!("Failed to send get message request for {}", id))?;

        let message: GmailMessage = response
            .body_mut()
            .read_json()
            .context("Failed to parse message response")?;

        normalize_message(message)
    }

    fn get_attachment(&self, message_id: &MessageId, attachment_id: &str) -> Result<Vec<u8>> {
        let url = format!(
            "{}/users/me/messages/{}/attachments/{}",
            Self::BASE_URL,
            urlencoding::encode(message_id.as_str()),
            urlencoding::encode(attachment_id)
        );

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
            .context("Failed to send get attachment request")?;

        let attachment: AttachmentResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse attachment response")?;

        match attachment.data {
            Some(data) => decode_base64_bytes(&data).context("Attachment data is not valid base64"),
            None => Ok(Vec::new()),
        }
    }

    fn list_labels(&self) -> Result<Vec<RemoteLabel>> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = self
            .agent
            .get(&url)
            .header("Authorization", &self.bearer())
            .call()
            .context("Failed to send list labels request")?;

        let labels: ListLabelsResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse labels response")?;

        Ok(labels
            .labels
            .unwrap_or_default()
            .into_iter()
            .map(|l| RemoteLabel {
                id: l.id,
                name: l.name,
            })
            .collect())
    }

    fn create_label(&self, name: &str) -> Result<RemoteLabel> {
        let url = format!("{}/users/me/labels", Self::BASE_URL);

        let mut response = self
            .agent
            .post(&url)
            .header("Authorization", &self.bearer())
            .send_json(CreateLabelRequest {
                name,
                label_list_visibility: "labelShow",
                message_list_visibility: "show",
            })
            .with_context(|| format!("Failed to create label {}", name))?;

        let label: GmailLabel = response
            .body_mut()
            .read_json()
            .context("Failed to parse create label response")?;

        Ok(RemoteLabel {
            id: label.id,
            name: label.name,
        })
    }

    fn modify_labels(&self, id: &MessageId, add: &[&str], remove: &[&str]) -> Result<()> {
        let url = format!(
            "{}/users/me/messages/{}/modify",
            Self::BASE_URL,
            urlencoding::encode(id.as_str())
        );

        self.agent
            .post(&url)
            .header("Authorization", &self.bearer())
            .send_json(ModifyMessageRequest {
                add_label_ids: add,
                remove_label_ids: remove,
            })
            .with_context(|| format!("Failed to modify labels on {}", id))?;

        Ok(())
    }
}

/// Opens Gmail sessions, refreshing access tokens that are about to expire
pub struct GmailConnector {
    oauth: OAuthClient,
    agent: ureq::Agent,
}

impl GmailConnector {
    pub fn new(oauth: OAuthClient, agent: ureq::Agent) -> Self {
        Self { oauth, agent }
    }
}

impl MailConnector for GmailConnector {
    fn connect(&self, credential: &UserCredential) -> Result<MailSession> {
        if credential.access_token_valid() {
            return Ok(MailSession {
                provider: Box::new(GmailClient::new(
                    credential.access_token.clone(),
                    self.agent.clone(),
                )),
                refreshed: None,
            });
        }

        debug!("Access token for {} expired, refreshing", credential.id);
        let refreshed = self.oauth.refresh(credential)?;

        Ok(MailSession {
            provider: Box::new(GmailClient::new(
                refreshed.access_token.clone(),
                self.agent.clone(),
            )),
            refreshed: Some(refreshed),
        })
    }
}
