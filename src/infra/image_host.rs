//! ImgBB-compatible image hosting client.

use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, Url, multipart};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::application::uploads::{HostedImage, ImageHost, ImageHostError, ImageUpload};
use crate::config::ImageHostSettings;

use super::error::InfraError;

#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    #[serde(default)]
    success: bool,
    data: Option<UploadData>,
    error: Option<UploadFailure>,
}

#[derive(Debug, Deserialize)]
struct UploadData {
    url: String,
    delete_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadFailure {
    message: Option<String>,
}

#[derive(Clone)]
pub struct HttpImageHost {
    client: Client,
    endpoint: Url,
    api_key: Option<String>,
}

impl HttpImageHost {
    pub fn new(settings: &ImageHostSettings) -> Result<Self, InfraError> {
        let client = build_client(settings.timeout)?;
        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    fn upload_url(&self) -> Result<Url, ImageHostError> {
        let key = self.api_key.as_deref().ok_or(ImageHostError::Unconfigured)?;
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("key", key);
        Ok(url)
    }
}

pub(super) fn build_client(timeout: Duration) -> Result<Client, InfraError> {
    Client::builder()
        .user_agent(concat!("kumoscan/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .map_err(|err| InfraError::http_client(err.to_string()))
}

/// Host-safe file name: slugged stem plus the original extension.
fn hosted_file_name(file_name: &str) -> String {
    let (stem, extension) = match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => (stem, Some(ext)),
        _ => (file_name, None),
    };
    let mut name = slug::slugify(stem);
    if name.is_empty() {
        name.push_str("image");
    }
    if let Some(ext) = extension {
        name.push('.');
        name.push_str(&ext.to_ascii_lowercase());
    }
    name
}

#[async_trait]
impl ImageHost for HttpImageHost {
    async fn upload(&self, image: ImageUpload) -> Result<HostedImage, ImageHostError> {
        let url = self.upload_url()?;
        let file_name = hosted_file_name(&image.file_name);
        let content_type = image.content_type.clone().unwrap_or_else(|| {
            mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

        let part = multipart::Part::bytes(image.data.to_vec())
            .file_name(file_name.clone())
            .mime_str(&content_type)
            .map_err(|err| ImageHostError::Rejected(err.to_string()))?;
        let form = multipart::Form::new().part("image", part);

        let response = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|err| ImageHostError::Transport(err.to_string()))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|err| ImageHostError::Transport(err.to_string()))?;
        let envelope: UploadEnvelope = serde_json::from_slice(&body).map_err(|err| {
            ImageHostError::Rejected(format!("status {status}: unreadable response: {err}"))
        })?;

        if !status.is_success() || !envelope.success {
            let message = envelope
                .error
                .and_then(|failure| failure.message)
                .unwrap_or_else(|| format!("status {status}"));
            return Err(ImageHostError::Rejected(message));
        }

        let data = envelope
            .data
            .ok_or_else(|| ImageHostError::Rejected("response carried no image".to_string()))?;

        counter!("kumoscan_images_hosted_total").increment(1);
        debug!(
            target = "kumoscan::uploads",
            file_name = %file_name,
            url = %data.url,
            "image hosted"
        );

        Ok(HostedImage {
            url: data.url,
            delete_url: data.delete_url,
        })
    }

    async fn delete(&self, image: &HostedImage) -> Result<(), ImageHostError> {
        let Some(delete_url) = image.delete_url.as_deref() else {
            warn!(
                target = "kumoscan::uploads",
                url = %image.url,
                "hosted image has no delete link; leaving it in place"
            );
            return Ok(());
        };

        let response = self
            .client
            .get(delete_url)
            .send()
            .await
            .map_err(|err| ImageHostError::Transport(err.to_string()))?;

        if !response.status().is_success() {
            return Err(ImageHostError::Rejected(format!(
                "delete returned status {}",
                response.status()
            )));
        }
        Ok(())
    }
}
