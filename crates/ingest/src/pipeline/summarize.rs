//! Document summarization
//!
//! [`OpenAiSummarizer`] makes one blocking chat-completions call per
//! document. There is no retry; a failed call fails the task.

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

/// Summary of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub summary: String,
    pub key_points: Vec<String>,
}

/// Produces a summary for extracted document text
pub trait Summarizer: Send + Sync {
    fn summarize(&self, text: &str) -> Result<Summary>;
}

const PROMPT: &str = "Summarize the following document in a concise paragraph. \
                      Then, provide 3-5 key bullet points. Document content:\n\n";

/// Reply used when the model returns no content
const EMPTY_REPLY: &str = "No summary generated.";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

/// Summarizer backed by the OpenAI chat completions API
pub struct OpenAiSummarizer {
    api_key: String,
    model: String,
    endpoint: String,
    agent: ureq::Agent,
}

impl OpenAiSummarizer {
    const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1/chat/completions";

    pub fn new(api_key: impl Into<String>, model: impl Into<String>, agent: ureq::Agent) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            agent,
        }
    }

    /// Use a different chat completions endpoint (compatible servers)
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl Summarizer for OpenAiSummarizer {
    fn summarize(&self, text: &str) -> Result<Summary> {
        let prompt = format!("{}{}", PROMPT, text);
        debug!("Requesting summary from {} ({} chars)", self.model, text.len());

        let mut response = self
            .agent
            .post(&self.endpoint)
            .header("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(ChatRequest {
                model: &self.model,
                messages: [ChatMessage {
                    role: "user",
                    content: &prompt,
                }],
            })
            .context("Failed to send summarization request")?;

        let chat: ChatResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse summarization response")?;

        let reply = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| EMPTY_REPLY.to_string());

        Ok(parse_summary(&reply))
    }
}

/// Split a model reply into the summary paragraph and its bullet points
///
/// Lines starting with `-`, `*`, `•` or a list number (`1.`, `2)`) become key
/// points; everything else is the summary. A reply without bullets is kept
/// whole as the summary.
pub fn parse_summary(reply: &str) -> Summary {
    let mut paragraph = Vec::new();
    let mut key_points = Vec::new();

    for line in reply.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match bullet_text(trimmed) {
            Some(point) if !point.is_empty() => key_points.push(point.to_string()),
            Some(_) => {}
            None => paragraph.push(trimmed),
        }
    }

    let summary = if paragraph.is_empty() {
        reply.trim().to_string()
    } else {
        paragraph.join("\n")
    };

    Summary {
        summary,
        key_points,
    }
}

fn bullet_text(line: &str) -> Option<&str> {
    for marker in ["-", "*", "•"] {
        if let Some(rest) = line.strip_prefix(marker)
            && (rest.is_empty() || rest.starts_with(char::is_whitespace))
        {
            return Some(rest.trim());
        }
    }

    let digits = line.chars().take_while(char::is_ascii_digit).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(rest) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return Some(rest.trim());
        }
    }
    None
}
