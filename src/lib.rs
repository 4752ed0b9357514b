//! # zpl-desk
//!
//! Preview ZPL shipping labels, pull shipment details out of them with an
//! LLM, and either print them straight to a thermal printer or bundle them
//! into one PDF.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .zpl / .txt files
//!  │
//!  ├─ 1. Ingest   filter by extension, walk directories, read text
//!  ├─ 2. Render   POST markup to Labelary → PNG preview      ┐ concurrent,
//!  ├─ 3. Extract  LLM → recipient / tracking / carrier / dest ┘ per label
//!  ├─ 4. Settle   ready iff the render succeeded
//!  └─ 5. Output   multi-page 4×6 PDF, or raw bytes to a serial printer
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use zpl_desk::{DeskConfig, LabelDesk};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Extraction is enabled when GEMINI_API_KEY / OPENAI_API_KEY / … is set.
//!     let desk = LabelDesk::from_config(DeskConfig::default())?;
//!     desk.process_files(&["labels/"]).await;
//!     for item in desk.items() {
//!         println!("{} {}", item.status, item.name);
//!     }
//!     if let Some(path) = desk.export_pdf(None).await? {
//!         println!("saved {}", path.display());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `zpldesk` binary (clap + anyhow + tracing-subscriber) |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod desk;
pub mod document;
pub mod error;
pub mod item;
pub mod pipeline;
pub mod printer;
pub mod progress;
pub mod prompts;
pub mod store;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{DeskConfig, DeskConfigBuilder, LabelGeometry};
pub use desk::{Capabilities, IngestBatch, LabelDesk};
pub use document::{LabelDocument, LabelPage};
pub use error::{DeskError, PrintError};
pub use item::{LabelId, LabelItem, LabelStatus, LabelSummary, RenderedPreview, ShipmentMetadata};
pub use pipeline::extract::{Extractor, LlmExtractor};
pub use pipeline::render::{LabelaryRasterizer, Rasterizer};
pub use printer::{DeviceChoice, PrintTransport, SerialTransport};
pub use progress::{LabelProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::LabelStore;
pub use stream::{ingest_stream, LabelStream};
