//! Image hosting seam and two-phase upload staging.
//!
//! Images are pushed to an external host before the document that references them is written.
//! An [`UploadBatch`] remembers everything hosted for one operation so a failure later in the
//! operation can delete those images again instead of leaving them orphaned on the host.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use metrics::counter;
use serde::Serialize;
use thiserror::Error;
use tracing::warn;

/// An image received from a client, not yet hosted.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// An image accepted by the external host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostedImage {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImageDimensions {
    pub width: usize,
    pub height: usize,
}

#[derive(Debug, Error)]
pub enum ImageHostError {
    #[error("image `{file_name}` is empty")]
    Empty { file_name: String },
    #[error("image `{file_name}` exceeds the {limit} byte limit")]
    TooLarge { file_name: String, limit: u64 },
    #[error("`{file_name}` is not a recognised image")]
    NotAnImage { file_name: String },
    #[error("image host is not configured")]
    Unconfigured,
    #[error("image host rejected the upload: {0}")]
    Rejected(String),
    #[error("image host request failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait ImageHost: Send + Sync {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError>;

    async fn delete(&self, image: &HostedImage) -> Result<(), ImageHostError>;
}

/// Check that `image` is a non-empty, decodable image within the size limit.
pub fn inspect_image(
    image: &ImageUpload,
    max_bytes: u64,
) -> Result<ImageDimensions, ImageHostError> {
    if image.data.is_empty() {
        return Err(ImageHostError::Empty {
            file_name: image.file_name.clone(),
        });
    }
    if image.data.len() as u64 > max_bytes {
        return Err(ImageHostError::TooLarge {
            file_name: image.file_name.clone(),
            limit: max_bytes,
        });
    }
    let size = imagesize::blob_size(&image.data).map_err(|_| ImageHostError::NotAnImage {
        file_name: image.file_name.clone(),
    })?;
    Ok(ImageDimensions {
        width: size.width,
        height: size.height,
    })
}

/// Images hosted on behalf of a single pending write.
pub struct UploadBatch {
    host: Arc<dyn ImageHost>,
    hosted: Vec<HostedImage>,
}

impl UploadBatch {
    /// Validate every image up front, then host them one at a time in order.
    ///
    /// If any upload fails, the images hosted so far are deleted before the error is returned.
    pub async fn stage(
        host: Arc<dyn ImageHost>,
        images: Vec<ImageUpload>,
        max_bytes: u64,
    ) -> Result<Self, ImageHostError> {
        for image in &images {
            inspect_image(image, max_bytes)?;
        }

        let mut batch = Self {
            host,
            hosted: Vec::with_capacity(images.len()),
        };

        for image in images {
            let file_name = image.file_name.clone();
            match batch.host.upload(image).await {
                Ok(hosted) => {
                    counter!("kumoscan_images_hosted_total").increment(1);
                    batch.hosted.push(hosted);
                }
                Err(err) => {
                    warn!(
                        target = "kumoscan::uploads",
                        file_name = %file_name,
                        hosted = batch.hosted.len(),
                        error = %err,
                        "image upload failed; rolling back staged images"
                    );
                    batch.rollback().await;
                    return Err(err);
                }
            }
        }

        Ok(batch)
    }

    pub fn urls(&self) -> Vec<String> {
        self.hosted.iter().map(|image| image.url.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.hosted.is_empty()
    }

    /// Keep the hosted images; the referencing document has been written.
    pub fn commit(self) -> Vec<HostedImage> {
        self.hosted
    }

    /// Delete every hosted image. Failures are logged and counted, never returned.
    pub async fn rollback(self) {
        for image in self.hosted.iter().rev() {
            counter!("kumoscan_upload_compensations_total").increment(1);
            if let Err(err) = self.host.delete(image).await {
                warn!(
                    target = "kumoscan::uploads",
                    url = %image.url,
                    error = %err,
                    "failed to delete staged image"
                );
            }
        }
    }
}
