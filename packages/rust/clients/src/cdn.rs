//! CDN object store for synthesized audio.
//!
//! Uploads are a single authenticated PUT of the raw MP3 bytes to
//! `{upload_url}/{key}`; the returned public URL is `{public_url}/{key}`.
//! Keys are UUID v7 so concurrent runs never collide and listings sort by
//! upload time.

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use url::Url;
use uuid::Uuid;

use newsreel_core::ObjectStore;
use newsreel_shared::{CdnConfig, NewsreelError, StageError};

use crate::http;

/// Object store backed by a CDN bucket with a token-authenticated upload
/// endpoint.
pub struct CdnStore {
    client: Client,
    upload_url: String,
    public_url: String,
    token: String,
}

impl CdnStore {
    /// Build a store from config, reading the upload token from the
    /// environment.
    pub fn new(config: &CdnConfig) -> Result<Self, NewsreelError> {
        let token = http::api_key_from_env("cdn", &config.token_env)?;
        for (name, value) in [
            ("cdn.upload_url", &config.upload_url),
            ("cdn.public_url", &config.public_url),
        ] {
            if Url::parse(value).is_err() {
                return Err(NewsreelError::config(format!(
                    "{name} is not a valid URL: {value:?}"
                )));
            }
        }
        Ok(Self {
            client: http::build_client()?,
            upload_url: config.upload_url.trim_end_matches('/').to_string(),
            public_url: config.public_url.trim_end_matches('/').to_string(),
            token,
        })
    }
}

#[async_trait]
impl ObjectStore for CdnStore {
    async fn upload(&self, bytes: &[u8]) -> Result<String, StageError> {
        if bytes.is_empty() {
            return Err(StageError::validation("cdn: refusing to upload empty audio"));
        }
        let key = format!("{}.mp3", Uuid::now_v7());

        let response = self
            .client
            .put(format!("{}/{key}", self.upload_url))
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "audio/mpeg")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| http::transport_error("cdn", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(http::status_error("cdn", status, &body));
        }

        let public = format!("{}/{key}", self.public_url);
        info!(key = %key, size = bytes.len(), "audio uploaded");
        Ok(public)
    }
}
