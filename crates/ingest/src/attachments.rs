//! Attachment selection over a message part tree
//!
//! Selection is pure over the tree; bytes are fetched in a separate step so
//! the driver can hash and dedup each part as it goes.

use anyhow::{Context, Result};

use crate::models::{ContentHash, MessageId, PartNode};
use crate::provider::MailProvider;

/// Extensions accepted as documents regardless of MIME type
const DOCUMENT_EXTENSIONS: &[&str] = &[
    "pdf", "doc", "docx", "txt", "rtf", "odt", "xls", "xlsx", "ppt", "pptx",
];

/// MIME types never treated as documents
const EXCLUDED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/bmp",
    "image/webp",
];

/// A document-like part chosen for ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedPart {
    /// MIME part ID, or the attachment ID when the part has none
    pub part_id: String,
    pub filename: String,
    pub mime_type: Option<String>,
    pub attachment_id: String,
}

/// Decide whether a file looks like a document
///
/// Either the extension is on the document list, or a MIME type is present
/// and is not one of the excluded image types. A blank MIME type counts as
/// absent.
pub fn is_document(filename: &str, mime_type: Option<&str>) -> bool {
    let has_document_extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| DOCUMENT_EXTENSIONS.contains(&ext.as_str()));
    if has_document_extension {
        return true;
    }

    match mime_type.map(mime_essence) {
        Some(essence) if !essence.is_empty() => !EXCLUDED_MIME_TYPES.contains(&essence.as_str()),
        _ => false,
    }
}

/// Lowercased MIME type without parameters ("Image/PNG; name=x" -> "image/png")
fn mime_essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Select the document parts of a tree, depth-first pre-order
///
/// The root itself is considered, and children are visited whether or not
/// their parent qualified.
pub fn select_document_parts(root: &PartNode) -> Vec<SelectedPart> {
    root.iter().filter_map(select_part).collect()
}

fn select_part(node: &PartNode) -> Option<SelectedPart> {
    let filename = node.filename.as_deref().filter(|f| !f.is_empty())?;
    let attachment_id = node.body.attachment_id()?;
    if !is_document(filename, node.mime_type.as_deref()) {
        return None;
    }

    let part_id = node
        .part_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .unwrap_or(attachment_id);

    Some(SelectedPart {
        part_id: part_id.to_string(),
        filename: filename.to_string(),
        mime_type: node.mime_type.clone(),
        attachment_id: attachment_id.to_string(),
    })
}

/// Fetch a selected part's bytes; a single attempt
pub fn fetch_part_bytes(
    provider: &dyn MailProvider,
    message_id: &MessageId,
    part: &SelectedPart,
) -> Result<Vec<u8>> {
    provider
        .get_attachment(message_id, &part.attachment_id)
        .with_context(|| format!("Failed to fetch attachment {} of {}", part.filename, message_id))
}

/// Content hash used as the dedup key
pub fn content_hash(data: &[u8]) -> ContentHash {
    ContentHash::of(data)
}
