//! Image attachments for multimodal sends.
//!
//! Images are validated against an allow-list of content types and a size
//! cap before anything is sent. [`PendingAttachments`] is the composer-side
//! list of picked images; each entry owns a preview reference acquired from a
//! [`PreviewRegistry`] and released on remove, send, clear, or drop.

use crate::defaults::images::{
    ALLOWED_CONTENT_TYPES, DISALLOWED_TYPE_MESSAGE, MAX_IMAGE_BYTES, TOO_LARGE_MESSAGE,
};
use crate::error::{ChatError, Result};
use crate::utils::mime::guess_mime;
use bytes::Bytes;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// An image picked for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageAttachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageAttachment {
    pub fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Bytes>,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    /// Build an attachment whose content type is detected from its bytes,
    /// falling back to the file extension.
    pub fn detect(file_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        let file_name = file_name.into();
        let bytes = bytes.into();
        let content_type = guess_mime(Some(bytes.as_ref()), Some(file_name.as_str()));
        Self {
            file_name,
            content_type,
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Check one image against the content-type allow-list and size cap.
pub fn validate_image(image: &ImageAttachment) -> Result<()> {
    let content_type = image.content_type.trim().to_ascii_lowercase();
    if !ALLOWED_CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ChatError::Validation(DISALLOWED_TYPE_MESSAGE.to_string()));
    }
    if image.size() > MAX_IMAGE_BYTES {
        return Err(ChatError::Validation(TOO_LARGE_MESSAGE.to_string()));
    }
    Ok(())
}

/// Validate a batch; the first failing image decides the error.
pub fn validate_images(images: &[ImageAttachment]) -> Result<()> {
    for image in images {
        if let Err(e) = validate_image(image) {
            tracing::debug!(file = %image.file_name, error = %e, "image rejected");
            return Err(e);
        }
    }
    Ok(())
}

/// Displayable reference to a picked image.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PreviewRef {
    id: Uuid,
    pub name: String,
}

impl PreviewRef {
    pub fn url(&self) -> String {
        format!("preview:{}", self.id)
    }
}

/// Tracks preview references that have been handed out and not released.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<Mutex<HashSet<Uuid>>>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, name: impl Into<String>) -> PreviewRef {
        let id = Uuid::new_v4();
        self.lock().insert(id);
        PreviewRef {
            id,
            name: name.into(),
        }
    }

    /// Release a reference. Returns false if it was already released.
    pub fn release(&self, preview: &PreviewRef) -> bool {
        self.lock().remove(&preview.id)
    }

    pub fn is_live(&self, preview: &PreviewRef) -> bool {
        self.lock().contains(&preview.id)
    }

    /// Number of outstanding references.
    pub fn live(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<Uuid>> {
        // A poisoned set is still a valid set.
        self.live.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Images picked in the composer, waiting to be sent.
#[derive(Debug)]
pub struct PendingAttachments {
    registry: PreviewRegistry,
    items: Vec<(PreviewRef, ImageAttachment)>,
}

impl Default for PendingAttachments {
    fn default() -> Self {
        Self::new(PreviewRegistry::new())
    }
}

impl PendingAttachments {
    pub fn new(registry: PreviewRegistry) -> Self {
        Self {
            registry,
            items: Vec::new(),
        }
    }

    /// Validate and add a batch. Nothing is added if any image is rejected.
    pub fn attach(&mut self, images: Vec<ImageAttachment>) -> Result<Vec<PreviewRef>> {
        validate_images(&images)?;
        let mut added = Vec::with_capacity(images.len());
        for image in images {
            let preview = self.registry.acquire(image.file_name.clone());
            added.push(preview.clone());
            self.items.push((preview, image));
        }
        Ok(added)
    }

    /// Remove the image at `index`, releasing its preview.
    pub fn remove(&mut self, index: usize) -> Option<ImageAttachment> {
        if index >= self.items.len() {
            return None;
        }
        let (preview, image) = self.items.remove(index);
        self.registry.release(&preview);
        Some(image)
    }

    /// Release every preview and hand the images over for sending.
    pub fn take_for_send(&mut self) -> Vec<ImageAttachment> {
        self.items
            .drain(..)
            .map(|(preview, image)| {
                self.registry.release(&preview);
                image
            })
            .collect()
    }

    /// Drop all images, releasing their previews.
    pub fn clear(&mut self) {
        for (preview, _) in self.items.drain(..) {
            self.registry.release(&preview);
        }
    }

    pub fn previews(&self) -> Vec<PreviewRef> {
        self.items.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn registry(&self) -> &PreviewRegistry {
        &self.registry
    }
}

impl Drop for PendingAttachments {
    fn drop(&mut self) {
        self.clear();
    }
}
