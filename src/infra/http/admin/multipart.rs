//! Multipart form parsing for title and chapter uploads.

use axum::extract::Multipart;
use axum::http::StatusCode;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::error;

use crate::application::uploads::ImageUpload;
use crate::infra::http::api::error::{ApiError, codes};

const SOURCE: &str = "kumoscan::http::admin::multipart";
const PAYLOAD_FIELD: &str = "payload";

/// A JSON `payload` field plus the image files sent under one field name, in order.
pub(super) struct ImageForm<T> {
    pub(super) payload: T,
    pub(super) images: Vec<ImageUpload>,
}

pub(super) async fn read_image_form<T: DeserializeOwned>(
    multipart: &mut Multipart,
    file_field: &str,
) -> Result<ImageForm<T>, ApiError> {
    let mut payload: Option<Bytes> = None;
    let mut images = Vec::new();

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => {
                let status = err.status();
                error!(
                    target = SOURCE,
                    status = status.as_u16(),
                    error = %err,
                    "failed to read multipart payload"
                );
                return Err(match status {
                    StatusCode::PAYLOAD_TOO_LARGE => ApiError::new(
                        StatusCode::PAYLOAD_TOO_LARGE,
                        codes::UPLOAD,
                        "Upload too large",
                        Some(err.body_text()),
                    ),
                    _ => ApiError::bad_request("invalid multipart payload", Some(err.body_text())),
                });
            }
        };

        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(PAYLOAD_FIELD) => {
                let bytes = field.bytes().await.map_err(|err| {
                    ApiError::bad_request("failed to read payload", Some(err.body_text()))
                })?;
                payload = Some(bytes);
            }
            Some(field_name) if field_name == file_field => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .filter(|value| !value.trim().is_empty())
                    .unwrap_or_else(|| format!("{file_field}-{}", images.len() + 1));
                let content_type = field.content_type().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    ApiError::bad_request("failed to read image", Some(err.body_text()))
                })?;
                images.push(ImageUpload {
                    file_name,
                    content_type,
                    data,
                });
            }
            _ => continue,
        }
    }

    let payload = payload.ok_or_else(|| {
        ApiError::bad_request("missing payload", Some(format!("expected a `{PAYLOAD_FIELD}` field")))
    })?;
    let payload = serde_json::from_slice(&payload)
        .map_err(|err| ApiError::invalid_input("Invalid payload", err.to_string()))?;

    Ok(ImageForm { payload, images })
}
