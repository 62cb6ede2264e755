//! Metadata publisher: pushes the token descriptor and image to the
//! content-addressed upload service and returns the hosted URI.
//!
//! Pure I/O, no retries — a failed upload is terminal for the request.

use base64::{engine::general_purpose::STANDARD as BASE64_STANDARD, Engine};
use serde::Deserialize;

use crate::error::ApiError;
use crate::handlers::TokenDescriptor;

#[derive(Debug, Clone)]
pub struct PublishedMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
    pub image_url: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(rename = "metadataUri")]
    metadata_uri: String,
    metadata: UploadedFields,
}

#[derive(Deserialize)]
struct UploadedFields {
    name: String,
    symbol: String,
    image: String,
}

pub struct MetadataPublisher {
    http: reqwest::Client,
    upload_url: String,
}

impl MetadataPublisher {
    pub fn new(upload_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            upload_url: upload_url.into(),
        }
    }

    pub async fn publish(&self, token: &TokenDescriptor) -> Result<PublishedMetadata, ApiError> {
        let (image_bytes, content_type) = self.resolve_image(&token.image_url).await?;

        let file_part = reqwest::multipart::Part::bytes(image_bytes)
            .file_name("image")
            .mime_str(&content_type)
            .map_err(|e| upload_err(format!("invalid image content type: {}", e)))?;

        let mut form = reqwest::multipart::Form::new()
            .part("file", file_part)
            .text("name", token.name.clone())
            .text("symbol", token.ticker.clone())
            .text("description", token.description.clone())
            .text("showName", "true");
        if let Some(website) = &token.website_url {
            form = form.text("website", website.clone());
        }
        if let Some(twitter) = &token.twitter {
            form = form.text("twitter", twitter.clone());
        }
        if let Some(telegram) = &token.telegram {
            form = form.text("telegram", telegram.clone());
        }

        let resp = self
            .http
            .post(&self.upload_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| upload_err(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(upload_err(format!(
                "upload service returned {}",
                resp.status()
            )));
        }

        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| upload_err(format!("malformed upload response: {}", e)))?;

        Ok(PublishedMetadata {
            name: body.metadata.name,
            symbol: body.metadata.symbol,
            uri: body.metadata_uri,
            image_url: body.metadata.image,
        })
    }

    /// Decode an embedded `data:` URI or download a remote image.
    async fn resolve_image(&self, image_url: &str) -> Result<(Vec<u8>, String), ApiError> {
        if image_url.is_empty() {
            return Err(upload_err("no image provided for token creation".to_string()));
        }
        if let Some(rest) = image_url.strip_prefix("data:") {
            return decode_data_uri(rest);
        }

        let resp = self
            .http
            .get(image_url)
            .send()
            .await
            .map_err(|e| upload_err(format!("image fetch failed: {}", e)))?;
        if !resp.status().is_success() {
            return Err(upload_err(format!(
                "image fetch returned {}",
                resp.status()
            )));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| upload_err(format!("image fetch failed: {}", e)))?;
        Ok((bytes.to_vec(), content_type))
    }
}

/// `data:<content-type>;base64,<payload>` → raw bytes + content type.
fn decode_data_uri(rest: &str) -> Result<(Vec<u8>, String), ApiError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| upload_err("malformed data URI".to_string()))?;
    let content_type = meta
        .split(';')
        .next()
        .filter(|ct| !ct.is_empty())
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = BASE64_STANDARD
        .decode(payload)
        .map_err(|e| upload_err(format!("invalid base64 image data: {}", e)))?;
    Ok((bytes, content_type))
}

fn upload_err(reason: String) -> ApiError {
    ApiError::Upstream {
        dependency: "metadata_upload",
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_is_decoded_with_its_content_type() {
        let (bytes, ct) = decode_data_uri("image/png;base64,AAAA").unwrap();
        assert_eq!(ct, "image/png");
        assert_eq!(bytes, vec![0, 0, 0]);
    }

    #[test]
    fn data_uri_without_payload_fails() {
        assert!(decode_data_uri("image/png;base64").is_err());
    }

    #[test]
    fn invalid_base64_fails() {
        assert!(decode_data_uri("image/png;base64,!!!").is_err());
    }

    #[tokio::test]
    async fn empty_image_reference_is_rejected_without_io() {
        let publisher = MetadataPublisher::new("http://127.0.0.1:0");
        let err = publisher.resolve_image("").await.unwrap_err();
        assert!(matches!(
            err,
            ApiError::Upstream {
                dependency: "metadata_upload",
                ..
            }
        ));
    }
}
