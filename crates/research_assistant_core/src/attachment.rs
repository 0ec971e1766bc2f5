//! crates/research_assistant_core/src/attachment.rs
//!
//! Validation, encoding and staging of user images before they are sent.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use uuid::Uuid;

use crate::domain::{Attachment, AttachmentKind};

/// Largest accepted file, 5 MiB.
pub const MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;

pub const ALLOWED_IMAGE_TYPES: [&str; 4] = ["image/png", "image/jpeg", "image/webp", "image/heic"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AttachmentError {
    #[error("Only PNG, JPEG, WEBP, and HEIC images are supported.")]
    UnsupportedType(String),
    #[error("File size must be less than 5MB.")]
    TooLarge(usize),
    #[error("Failed to convert file to base64: {0}")]
    Conversion(String),
}

/// Checks a file's declared type and size against the allow-list.
pub fn validate(mime_type: &str, size: usize) -> Result<(), AttachmentError> {
    if !ALLOWED_IMAGE_TYPES.contains(&mime_type) {
        return Err(AttachmentError::UnsupportedType(mime_type.to_string()));
    }
    if size > MAX_ATTACHMENT_BYTES {
        return Err(AttachmentError::TooLarge(size));
    }
    Ok(())
}

/// Standard base64, without any data-URL prefix.
pub fn encode(bytes: &[u8]) -> String {
    BASE64_STANDARD.encode(bytes)
}

/// Recovers the raw file from a stored payload.
pub fn decode(data: &str) -> Result<Vec<u8>, AttachmentError> {
    BASE64_STANDARD
        .decode(data)
        .map_err(|e| AttachmentError::Conversion(e.to_string()))
}

/// Validates and encodes an image into an attachment ready for staging.
pub fn image_attachment(
    name: impl Into<String>,
    mime_type: &str,
    bytes: &[u8],
) -> Result<Attachment, AttachmentError> {
    validate(mime_type, bytes.len())?;
    Ok(Attachment {
        id: Uuid::new_v4(),
        kind: AttachmentKind::Image,
        name: name.into(),
        mime_type: mime_type.to_string(),
        data: encode(bytes),
    })
}

/// Attachments waiting for the next send, in the order they were staged.
#[derive(Debug, Default)]
pub struct StagingArea {
    items: Vec<Attachment>,
}

impl StagingArea {
    pub fn stage(&mut self, attachment: Attachment) {
        self.items.push(attachment);
    }

    pub fn remove(&mut self, attachment_id: Uuid) -> bool {
        let before = self.items.len();
        self.items.retain(|a| a.id != attachment_id);
        self.items.len() != before
    }

    pub fn list(&self) -> &[Attachment] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Hands every staged attachment to an outgoing message and empties the area.
    pub fn drain(&mut self) -> Vec<Attachment> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_types_outside_the_allow_list() {
        let err = validate("application/pdf", 10).unwrap_err();
        assert_eq!(err.to_string(), "Only PNG, JPEG, WEBP, and HEIC images are supported.");
        assert!(validate("image/gif", 10).is_err());
    }

    #[test]
    fn size_limit_is_inclusive_of_five_mebibytes() {
        assert!(validate("image/png", MAX_ATTACHMENT_BYTES).is_ok());
        let err = validate("image/png", MAX_ATTACHMENT_BYTES + 1).unwrap_err();
        assert_eq!(err, AttachmentError::TooLarge(MAX_ATTACHMENT_BYTES + 1));
        assert_eq!(err.to_string(), "File size must be less than 5MB.");
    }

    #[test]
    fn image_attachment_is_base64_without_prefix() {
        let attachment = image_attachment("dot.png", "image/png", b"hello").unwrap();
        assert_eq!(attachment.kind, AttachmentKind::Image);
        assert_eq!(attachment.data, "aGVsbG8=");
        assert_eq!(attachment.mime_type, "image/png");
        assert_eq!(decode(&attachment.data).unwrap(), b"hello");
        assert!(matches!(decode("not base64!"), Err(AttachmentError::Conversion(_))));
    }

    #[test]
    fn staging_area_keeps_order_and_drains() {
        let mut staging = StagingArea::default();
        let first = image_attachment("a.png", "image/png", b"a").unwrap();
        let second = image_attachment("b.jpg", "image/jpeg", b"b").unwrap();
        let (first_id, second_id) = (first.id, second.id);
        staging.stage(first);
        staging.stage(second);

        assert!(staging.remove(first_id));
        assert!(!staging.remove(first_id));

        let drained = staging.drain();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].id, second_id);
        assert!(staging.is_empty());
    }
}
