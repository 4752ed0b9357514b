//! Queue item types: one [`LabelItem`] per ingested label file.
//!
//! An item is created `Pending` on ingestion, becomes `Processing` once its
//! markup has been read, and settles on `Ready` or `Error` after both remote
//! calls finish. The status tracks the rasterizer only; extraction results
//! are attached when available and never change the status.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Opaque identity of a queued label.
pub type LabelId = Uuid;

/// Lifecycle of a queued label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelStatus {
    /// Queued, markup not read yet.
    #[default]
    Pending,
    /// Markup loaded; render and extraction in flight.
    Processing,
    /// The rasterizer returned a preview.
    Ready,
    /// The rasterizer failed (or the file could not be read).
    Error,
}

impl LabelStatus {
    /// `true` once the pipeline for this item has finished.
    pub fn is_settled(self) -> bool {
        matches!(self, LabelStatus::Ready | LabelStatus::Error)
    }
}

impl fmt::Display for LabelStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LabelStatus::Pending => "pending",
            LabelStatus::Processing => "processing",
            LabelStatus::Ready => "ready",
            LabelStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Shipment fields inferred from the raw label markup.
///
/// All four fields are required in the extractor's reply; a reply missing
/// any of them is discarded as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentMetadata {
    /// Name of the person or company receiving the parcel.
    pub recipient_name: String,
    /// Tracking code or order number.
    pub tracking_number: String,
    /// Carrier, e.g. "Correios", "FedEx", "Loggi".
    pub carrier: String,
    /// Destination city and state, e.g. "São Paulo, SP".
    pub destination: String,
}

/// A rendered label image held in memory.
///
/// Cloning is cheap: the bytes live behind an `Arc`.
#[derive(Clone, PartialEq, Eq)]
pub struct RenderedPreview {
    bytes: Arc<[u8]>,
    mime_type: String,
}

impl RenderedPreview {
    pub fn new(bytes: impl Into<Arc<[u8]>>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    /// PNG preview, the format the rasterizer is asked for.
    pub fn png(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::new(bytes, "image/png")
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Inline the preview as a `data:` URI.
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

impl fmt::Debug for RenderedPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderedPreview")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// One label file in the queue.
#[derive(Debug, Clone)]
pub struct LabelItem {
    pub id: LabelId,
    /// Display name (file name without directories).
    pub name: String,
    /// Where the markup was read from.
    pub source: PathBuf,
    /// Raw markup; empty until the file has been read.
    pub raw_content: String,
    pub preview: Option<RenderedPreview>,
    pub metadata: Option<ShipmentMetadata>,
    pub status: LabelStatus,
}

impl LabelItem {
    /// A freshly ingested item for `source`, status `Pending`.
    pub fn pending(source: impl AsRef<Path>) -> Self {
        let source = source.as_ref().to_path_buf();
        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        Self {
            id: Uuid::new_v4(),
            name,
            source,
            raw_content: String::new(),
            preview: None,
            metadata: None,
            status: LabelStatus::Pending,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == LabelStatus::Ready
    }

    /// Serializable view used by the CLI's `--json` output.
    pub fn summary(&self, embed_preview: bool) -> LabelSummary {
        LabelSummary {
            id: self.id,
            name: self.name.clone(),
            source: self.source.clone(),
            status: self.status,
            metadata: self.metadata.clone(),
            preview_bytes: self.preview.as_ref().map(RenderedPreview::len),
            preview: if embed_preview {
                self.preview.as_ref().map(RenderedPreview::to_data_uri)
            } else {
                None
            },
        }
    }
}

/// JSON-friendly snapshot of a [`LabelItem`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelSummary {
    pub id: LabelId,
    pub name: String,
    pub source: PathBuf,
    pub status: LabelStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ShipmentMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_item_uses_file_name() {
        let item = LabelItem::pending("/tmp/batch/order-17.zpl");
        assert_eq!(item.name, "order-17.zpl");
        assert_eq!(item.status, LabelStatus::Pending);
        assert!(item.raw_content.is_empty());
        assert!(item.preview.is_none());
    }

    #[test]
    fn ids_are_unique() {
        let a = LabelItem::pending("a.zpl");
        let b = LabelItem::pending("a.zpl");
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let json = r#"{"recipientName":"Ana","trackingNumber":"BR1","carrier":"Loggi","destination":"Recife, PE"}"#;
        let meta: ShipmentMetadata = serde_json::from_str(json).expect("valid metadata");
        assert_eq!(meta.recipient_name, "Ana");
        assert_eq!(meta.destination, "Recife, PE");
    }

    #[test]
    fn data_uri_is_base64_png() {
        let preview = RenderedPreview::png(vec![1u8, 2, 3]);
        assert_eq!(preview.to_data_uri(), "data:image/png;base64,AQID");
    }

    #[test]
    fn summary_embeds_preview_only_on_request() {
        let mut item = LabelItem::pending("x.zpl");
        item.preview = Some(RenderedPreview::png(vec![0u8; 4]));
        item.status = LabelStatus::Ready;

        let plain = item.summary(false);
        assert_eq!(plain.preview_bytes, Some(4));
        assert!(plain.preview.is_none());

        let json = serde_json::to_string(&plain).expect("serialise");
        assert!(json.contains("\"status\":\"ready\""), "got: {json}");

        let embedded = item.summary(true);
        assert!(embedded.preview.unwrap().starts_with("data:image/png;base64,"));
    }
}
