//! Configuration types for the label desk.
//!
//! All behaviour is controlled through [`DeskConfig`], built via its
//! [`DeskConfigBuilder`]. The CLI maps its flags (and their environment
//! variables) onto the builder; library callers set only what they need and
//! rely on the documented defaults for the rest.

use crate::error::DeskError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Public Labelary endpoint.
pub const DEFAULT_RENDER_URL: &str = "https://api.labelary.com";

/// Name used when saving the assembled PDF without an explicit path.
pub const DEFAULT_PDF_NAME: &str = "shipping-labels.pdf";

/// Thermal printers overwhelmingly ship configured for 9600 baud.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// How much of the markup is sent to the extractor.
pub const DEFAULT_EXTRACTION_CHAR_LIMIT: usize = 5000;

/// Physical label geometry shared by the rasterizer and the PDF assembler.
///
/// The default is the standard 4×6 in shipping label at 8 dots/mm
/// (203 dpi), i.e. 101.6 × 152.4 mm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelGeometry {
    pub width_in: f32,
    pub height_in: f32,
    /// Print density in dots per millimetre (6, 8, 12 or 24).
    pub dpmm: u8,
}

impl Default for LabelGeometry {
    fn default() -> Self {
        Self {
            width_in: 4.0,
            height_in: 6.0,
            dpmm: 8,
        }
    }
}

impl LabelGeometry {
    pub fn width_mm(&self) -> f32 {
        self.width_in * 25.4
    }

    pub fn height_mm(&self) -> f32 {
        self.height_in * 25.4
    }

    /// Dots per inch equivalent of `dpmm`.
    pub fn dpi(&self) -> f32 {
        f32::from(self.dpmm) * 25.4
    }

    /// Path segment understood by Labelary, e.g. `8dpmm/labels/4x6/0/`.
    pub fn endpoint_path(&self) -> String {
        format!(
            "/v1/printers/{}dpmm/labels/{}x{}/0/",
            self.dpmm,
            trim_float(self.width_in),
            trim_float(self.height_in)
        )
    }

    /// Parse `"4x6"` / `"4.5x3"` style sizes (inches).
    pub fn parse_size(s: &str) -> Option<(f32, f32)> {
        let (w, h) = s.trim().to_lowercase().split_once('x').map(|(w, h)| {
            (w.trim().parse::<f32>(), h.trim().parse::<f32>())
        })?;
        match (w, h) {
            (Ok(w), Ok(h)) if w > 0.0 && h > 0.0 => Some((w, h)),
            _ => None,
        }
    }
}

fn trim_float(v: f32) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

/// Configuration for a [`crate::LabelDesk`].
#[derive(Clone)]
pub struct DeskConfig {
    /// Base URL of the Labelary-compatible rasterizer. Default: [`DEFAULT_RENDER_URL`].
    pub render_url: String,

    /// Label size and density. Default: 4×6 in at 8 dpmm.
    pub geometry: LabelGeometry,

    /// Optional per-request timeout for the rasterizer, in seconds.
    /// Default: none; a hung request leaves its label in `processing`.
    pub request_timeout_secs: Option<u64>,

    /// Turn shipment extraction off even if a key is present.
    pub extraction_enabled: bool,

    /// LLM provider name (e.g. "gemini", "openai", "ollama").
    /// If None along with `provider`, the provider is auto-detected from API keys.
    pub provider_name: Option<String>,

    /// LLM model identifier. If None, a per-provider default is used.
    pub model: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for extraction. Default: 0.0.
    pub temperature: f32,

    /// Maximum tokens the extractor may generate. Default: 512.
    pub max_tokens: usize,

    /// Characters of markup sent to the extractor. Default: 5000.
    pub extraction_char_limit: usize,

    /// Serial baud rate for direct printing. Default: 9600.
    pub baud_rate: u32,

    /// Serial device to print to. If None the user picks one interactively.
    pub device: Option<String>,

    /// Where `export_pdf` saves when no path is given. Default: [`DEFAULT_PDF_NAME`].
    pub output_path: PathBuf,

    /// Per-label progress events. Default: none.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            render_url: DEFAULT_RENDER_URL.to_string(),
            geometry: LabelGeometry::default(),
            request_timeout_secs: None,
            extraction_enabled: true,
            provider_name: None,
            model: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 512,
            extraction_char_limit: DEFAULT_EXTRACTION_CHAR_LIMIT,
            baud_rate: DEFAULT_BAUD_RATE,
            device: None,
            output_path: PathBuf::from(DEFAULT_PDF_NAME),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for DeskConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeskConfig")
            .field("render_url", &self.render_url)
            .field("geometry", &self.geometry)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("extraction_enabled", &self.extraction_enabled)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("extraction_char_limit", &self.extraction_char_limit)
            .field("baud_rate", &self.baud_rate)
            .field("device", &self.device)
            .field("output_path", &self.output_path)
            .finish()
    }
}

impl DeskConfig {
    /// Create a new builder for `DeskConfig`.
    pub fn builder() -> DeskConfigBuilder {
        DeskConfigBuilder {
            config: Self::default(),
        }
    }

    /// Full rasterizer URL for the configured geometry.
    pub fn render_endpoint(&self) -> String {
        format!(
            "{}{}",
            self.render_url.trim_end_matches('/'),
            self.geometry.endpoint_path()
        )
    }
}

/// Builder for [`DeskConfig`].
pub struct DeskConfigBuilder {
    config: DeskConfig,
}

impl DeskConfigBuilder {
    pub fn render_url(mut self, url: impl Into<String>) -> Self {
        self.config.render_url = url.into();
        self
    }

    pub fn geometry(mut self, geometry: LabelGeometry) -> Self {
        self.config.geometry = geometry;
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = Some(secs);
        self
    }

    pub fn extraction_enabled(mut self, v: bool) -> Self {
        self.config.extraction_enabled = v;
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn extraction_char_limit(mut self, n: usize) -> Self {
        self.config.extraction_char_limit = n;
        self
    }

    pub fn baud_rate(mut self, baud: u32) -> Self {
        self.config.baud_rate = baud;
        self
    }

    pub fn device(mut self, device: impl Into<String>) -> Self {
        self.config.device = Some(device.into());
        self
    }

    pub fn output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.output_path = path.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<DeskConfig, DeskError> {
        let c = &self.config;
        if !(c.render_url.starts_with("http://") || c.render_url.starts_with("https://")) {
            return Err(DeskError::InvalidConfig(format!(
                "render URL must be http(s), got '{}'",
                c.render_url
            )));
        }
        if ![6, 8, 12, 24].contains(&c.geometry.dpmm) {
            return Err(DeskError::InvalidConfig(format!(
                "density must be 6, 8, 12 or 24 dpmm, got {}",
                c.geometry.dpmm
            )));
        }
        if c.geometry.width_in <= 0.0 || c.geometry.height_in <= 0.0 {
            return Err(DeskError::InvalidConfig(
                "label width and height must be positive".into(),
            ));
        }
        if c.extraction_char_limit == 0 {
            return Err(DeskError::InvalidConfig(
                "extraction character limit must be ≥ 1".into(),
            ));
        }
        if c.baud_rate == 0 {
            return Err(DeskError::InvalidConfig("baud rate must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}
