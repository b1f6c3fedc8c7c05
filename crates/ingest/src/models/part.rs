//! MIME part tree of a message

/// Body of a single MIME part
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PartBody {
    /// No body data (multipart containers, empty parts)
    #[default]
    Empty,
    /// Body bytes delivered inline with the message
    Inline(Vec<u8>),
    /// Body stored remotely, fetched separately by attachment ID
    Remote { attachment_id: String },
}

impl PartBody {
    /// Attachment ID if the body must be fetched separately
    pub fn attachment_id(&self) -> Option<&str> {
        match self {
            PartBody::Remote { attachment_id } => Some(attachment_id),
            _ => None,
        }
    }
}

/// A node in a message's MIME part tree
///
/// `filename` and `mime_type` are `None` when absent on the wire; an empty
/// filename is normalized to `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartNode {
    /// MIME part ID ("0", "1.2", ...)
    pub part_id: Option<String>,
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub body: PartBody,
    /// Sub-parts, in wire order
    pub children: Vec<PartNode>,
}

impl PartNode {
    /// A container part (multipart/*) with the given children
    pub fn multipart(mime_type: impl Into<String>, children: Vec<PartNode>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            children,
            ..Default::default()
        }
    }

    /// An inline part carrying its bytes directly
    pub fn inline(mime_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            mime_type: Some(mime_type.into()),
            body: PartBody::Inline(data.into()),
            ..Default::default()
        }
    }

    /// An attachment part whose bytes are fetched by attachment ID
    pub fn attachment(
        part_id: impl Into<String>,
        filename: impl Into<String>,
        mime_type: Option<&str>,
        attachment_id: impl Into<String>,
    ) -> Self {
        let filename = filename.into();
        Self {
            part_id: Some(part_id.into()),
            filename: (!filename.is_empty()).then_some(filename),
            mime_type: mime_type.map(str::to_string),
            body: PartBody::Remote {
                attachment_id: attachment_id.into(),
            },
            children: Vec::new(),
        }
    }

    /// Set the part ID
    pub fn with_part_id(mut self, part_id: impl Into<String>) -> Self {
        self.part_id = Some(part_id.into());
        self
    }

    /// Depth-first, pre-order iterator over this node and all descendants
    pub fn iter(&self) -> PartIter<'_> {
        PartIter { stack: vec![self] }
    }
}

/// Pre-order iterator over a part tree
pub struct PartIter<'a> {
    stack: Vec<&'a PartNode>,
}

impl<'a> Iterator for PartIter<'a> {
    type Item = &'a PartNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        // Reverse so the leftmost child is visited first
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attachment_empty_filename_is_none() {
        let part = PartNode::attachment("1", "", None, "att");
        assert_eq!(part.filename, None);
        assert_eq!(part.body.attachment_id(), Some("att"));
    }

    #[test]
    fn test_iter_is_preorder_left_to_right() {
        let tree = PartNode::multipart(
            "multipart/mixed",
            vec![
                PartNode::multipart(
                    "multipart/alternative",
                    vec![
                        PartNode::inline("text/plain", "a").with_part_id("0.0"),
                        PartNode::inline("text/html", "b").with_part_id("0.1"),
                    ],
                )
                .with_part_id("0"),
                PartNode::attachment("1", "x.pdf", None, "att1"),
            ],
        )
        .with_part_id("");

        let ids: Vec<_> = tree
            .iter()
            .map(|p| p.part_id.clone().unwrap_or_default())
            .collect();
        assert_eq!(ids, vec!["", "0", "0.0", "0.1", "1"]);
    }
}
