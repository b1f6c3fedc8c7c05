//! Gmail API response normalization
//!
//! Converts Gmail API responses to ingestion domain models.

use anyhow::{Context, Result};
use base64::prelude::*;
use chrono::{DateTime, TimeZone, Utc};

use super::api::{GmailMessage, MessagePart};
use crate::models::{EmailAddress, FetchedMessage, MessageId, PartBody, PartNode};

/// Normalize a Gmail API message to a FetchedMessage
pub fn normalize_message(gmail_msg: GmailMessage) -> Result<FetchedMessage> {
    let payload = gmail_msg
        .payload
        .as_ref()
        .context("Message has no payload")?;

    let from = extract_header(payload, "From")
        .map(|s| EmailAddress::parse(&s))
        .unwrap_or_else(|| EmailAddress::new("unknown@unknown.com"));

    let subject = extract_header(payload, "Subject")
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "No Subject".to_string());

    // Date header first, Gmail's internal date (ms since epoch) second
    let sent_at = extract_header(payload, "Date")
        .and_then(|d| parse_date_header(&d))
        .or_else(|| {
            gmail_msg
                .internal_date
                .parse::<i64>()
                .ok()
                .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        })
        .unwrap_or_else(Utc::now);

    let body_text = find_plain_text(payload).unwrap_or_default();
    let parts = to_part_node(payload);

    Ok(FetchedMessage::builder(MessageId::new(gmail_msg.id))
        .from(from)
        .subject(subject)
        .sent_at(sent_at)
        .body_text(body_text)
        .snippet(gmail_msg.snippet)
        .parts(parts)
        .build())
}

/// Extract a header value by name
fn extract_header(part: &MessagePart, name: &str) -> Option<String> {
    part.headers.as_ref()?.iter().find_map(|h| {
        if h.name.eq_ignore_ascii_case(name) {
            Some(h.value.clone())
        } else {
            None
        }
    })
}

/// Parse an RFC 2822 Date header, tolerating a trailing "(UTC)"-style comment
fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    let value = match value.find('(') {
        Some(idx) => value[..idx].trim(),
        None => value.trim(),
    };
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Convert a Gmail part (recursively) into a PartNode
fn to_part_node(part: &MessagePart) -> PartNode {
    let body = match &part.body {
        Some(body) => match (&body.attachment_id, &body.data) {
            (Some(attachment_id), _) if !attachment_id.is_empty() => PartBody::Remote {
                attachment_id: attachment_id.clone(),
            },
            (_, Some(data)) => decode_base64_bytes(data)
                .map(PartBody::Inline)
                .unwrap_or_default(),
            _ => PartBody::Empty,
        },
        None => PartBody::Empty,
    };

    PartNode {
        part_id: part.part_id.clone(),
        filename: non_empty(part.filename.as_deref()),
        mime_type: non_empty(part.mime_type.as_deref()),
        body,
        children: part
            .parts
            .as_ref()
            .map(|parts| parts.iter().map(to_part_node).collect())
            .unwrap_or_default(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Find the first text/plain body in the part tree (pre-order)
fn find_plain_text(part: &MessagePart) -> Option<String> {
    if part
        .mime_type
        .as_ref()
        .is_some_and(|m| m.starts_with("text/plain"))
        && part.filename.as_deref().is_none_or(str::is_empty)
        && let Some(body) = &part.body
        && let Some(data) = &body.data
        && let Some(bytes) = decode_base64_bytes(data)
    {
        return Some(String::from_utf8_lossy(&bytes).into_owned());
    }

    part.parts.as_ref()?.iter().find_map(find_plain_text)
}

/// Decode base64-encoded body data
///
/// Gmail uses URL-safe base64 but padding can vary, so we try multiple decoders.
pub fn decode_base64_bytes(data: &str) -> Option<Vec<u8>> {
    use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE};

    let decoders: &[&base64::engine::GeneralPurpose] =
        &[&BASE64_URL_SAFE_NO_PAD, &URL_SAFE, &STANDARD, &STANDARD_NO_PAD];

    decoders.iter().find_map(|decoder| decoder.decode(data).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gmail::api::{Header, MessagePartBody};

    fn header(name: &str, value: &str) -> Header {
        Header {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    fn leaf(part_id: &str, mime: &str, filename: &str, body: MessagePartBody) -> MessagePart {
        MessagePart {
            part_id: Some(part_id.to_string()),
            mime_type: Some(mime.to_string()),
            filename: Some(filename.to_string()),
            headers: None,
            body: Some(body),
            parts: None,
        }
    }

    fn inline(data: &str) -> MessagePartBody {
        MessagePartBody {
            attachment_id: None,
            data: Some(data.to_string()),
        }
    }

    fn remote(id: &str) -> MessagePartBody {
        MessagePartBody {
            attachment_id: Some(id.to_string()),
            data: None,
        }
    }

    fn make_message(headers: Vec<Header>, parts: Vec<MessagePart>) -> GmailMessage {
        GmailMessage {
            id: "m1".to_string(),
            snippet: "snippet".to_string(),
            internal_date: "1709285400000".to_string(),
            payload: Some(MessagePart {
                part_id: Some(String::new()),
                mime_type: Some("multipart/mixed".to_string()),
                filename: Some(String::new()),
                headers: Some(headers),
                body: Some(MessagePartBody {
                    attachment_id: None,
                    data: None,
                }),
                parts: Some(parts),
            }),
        }
    }

    #[test]
    fn test_extract_header_case_insensitive() {
        let msg = make_message(vec![header("FROM", "ops@example.com")], vec![]);
        let payload = msg.payload.as_ref().unwrap();
        assert_eq!(
            extract_header(payload, "from"),
            Some("ops@example.com".to_string())
        );
        assert_eq!(extract_header(payload, "Cc"), None);
    }

    #[test]
    fn test_normalize_headers_and_body() {
        // "See attached." in base64url
        let msg = make_message(
            vec![
                header("From", "Ops <ops@example.com>"),
                header("Subject", "Monthly report"),
                header("Date", "Fri, 1 Mar 2024 09:30:00 +0000"),
            ],
            vec![
                leaf("0", "text/plain", "", inline("U2VlIGF0dGFjaGVkLg")),
                leaf("1", "application/pdf", "report.pdf", remote("ANGjdJ_1")),
            ],
        );

        let fetched = normalize_message(msg).unwrap();

        assert_eq!(fetched.id.as_str(), "m1");
        assert_eq!(fetched.from.email, "ops@example.com");
        assert_eq!(fetched.subject, "Monthly report");
        assert_eq!(
            fetched.sent_at,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
        );
        assert_eq!(fetched.body_text, "See attached.");
    }

    #[test]
    fn test_normalize_part_tree() {
        let msg = make_message(
            vec![header("From", "ops@example.com")],
            vec![
                leaf("0", "text/plain", "", inline("aGk")),
                leaf("1", "application/pdf", "report.pdf", remote("ANGjdJ_1")),
            ],
        );

        let fetched = normalize_message(msg).unwrap();
        let root = &fetched.parts;

        assert_eq!(root.filename, None);
        assert_eq!(root.children.len(), 2);
        assert_eq!(root.children[0].body, PartBody::Inline(b"hi".to_vec()));
        assert_eq!(root.children[0].filename, None);
        assert_eq!(root.children[1].filename.as_deref(), Some("report.pdf"));
        assert_eq!(root.children[1].body.attachment_id(), Some("ANGjdJ_1"));
    }

    #[test]
    fn test_date_falls_back_to_internal_date() {
        let msg = make_message(
            vec![header("From", "ops@example.com"), header("Date", "not a date")],
            vec![],
        );

        let fetched = normalize_message(msg).unwrap();

        assert_eq!(fetched.sent_at.timestamp_millis(), 1_709_285_400_000);
        assert_eq!(fetched.subject, "No Subject");
    }

    #[test]
    fn test_parse_date_header_with_comment() {
        let parsed = parse_date_header("Fri, 1 Mar 2024 09:30:00 +0000 (UTC)");
        assert_eq!(
            parsed,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap())
        );
    }

    #[test]
    fn test_missing_payload_is_error() {
        let mut msg = make_message(vec![], vec![]);
        msg.payload = None;
        assert!(normalize_message(msg).is_err());
    }

    #[test]
    fn test_decode_base64_bytes() {
        // "Hello, World!" in base64url
        let decoded = decode_base64_bytes("SGVsbG8sIFdvcmxkIQ");
        assert_eq!(decoded, Some(b"Hello, World!".to_vec()));
    }
}
