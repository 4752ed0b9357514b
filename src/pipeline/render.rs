//! Label rasterization through a Labelary-compatible HTTP service.
//!
//! The markup is POSTed verbatim as the request body; the service answers
//! with a PNG of the label at the configured size and density. Failure of
//! any kind (network, non-2xx, empty body) is reported as `None` so the
//! pipeline can treat every render failure the same way.

use crate::config::DeskConfig;
use crate::error::DeskError;
use crate::item::RenderedPreview;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use std::time::Duration;
use tracing::{debug, warn};

/// Something that turns label markup into a preview image.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    /// Render `markup`. `None` means the render failed.
    async fn rasterize(&self, markup: &str) -> Option<RenderedPreview>;
}

/// [`Rasterizer`] backed by the Labelary REST API (or a self-hosted clone).
#[derive(Debug, Clone)]
pub struct LabelaryRasterizer {
    client: reqwest::Client,
    endpoint: String,
}

impl LabelaryRasterizer {
    /// Build a rasterizer for the endpoint and timeout in `config`.
    pub fn from_config(config: &DeskConfig) -> Result<Self, DeskError> {
        let mut builder = reqwest::Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| DeskError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self::with_client(client, config.render_endpoint()))
    }

    /// Use an existing client against a full endpoint URL.
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Rasterizer for LabelaryRasterizer {
    async fn rasterize(&self, markup: &str) -> Option<RenderedPreview> {
        let response = match self
            .client
            .post(&self.endpoint)
            .header(ACCEPT, "image/png")
            .body(markup.to_owned())
            .send()
            .await
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Label render request failed: {}", e);
                return None;
            }
        };

        let status = response.status();
        if !status.is_success() {
            // Labelary explains syntax errors in the body; keep it for the log.
            let detail = response.text().await.unwrap_or_default();
            warn!("Label render rejected: HTTP {} {}", status, detail.trim());
            return None;
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/png")
            .to_string();

        match response.bytes().await {
            Ok(bytes) if !bytes.is_empty() => {
                debug!("Rendered label → {} bytes ({})", bytes.len(), mime);
                Some(RenderedPreview::new(bytes.to_vec(), mime))
            }
            Ok(_) => {
                warn!("Label render returned an empty body");
                None
            }
            Err(e) => {
                warn!("Failed to read rendered label: {}", e);
                None
            }
        }
    }
}
