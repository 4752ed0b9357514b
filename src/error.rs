//! Error types for the zpl-desk library.
//!
//! Two error types reflect two distinct failure modes:
//!
//! * [`DeskError`]: **Fatal** for the operation that returned it: the
//!   configuration is invalid, the PDF could not be written, a direct print
//!   failed. Returned as `Err(DeskError)` from [`crate::LabelDesk`] methods.
//!
//! * [`PrintError`]: the single failure signal of the direct-print
//!   handshake. Every step (capability check, device selection, open, write)
//!   maps onto one variant; none of them is retried.
//!
//! Render and extraction failures are *not* errors at all. They are recorded
//! as absence on the [`crate::item::LabelItem`] (no preview, no metadata) so
//! one bad label never aborts a batch.

use crate::item::LabelId;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the zpl-desk library.
#[derive(Debug, Error)]
pub enum DeskError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Queue errors ──────────────────────────────────────────────────────
    /// The requested label is not (or no longer) in the queue.
    #[error("No label with id {id} in the queue")]
    UnknownLabel { id: LabelId },

    /// The label's markup has not been read (still pending, or the file
    /// could not be read), so there is nothing to send.
    #[error("Label '{name}' has no markup to print")]
    NothingToPrint { name: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// printpdf refused to serialise the assembled document.
    #[error("Failed to assemble label PDF: {0}")]
    PdfAssembly(String),

    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Device errors ─────────────────────────────────────────────────────
    /// Direct print failed at some step of the handshake.
    #[error(transparent)]
    Print(#[from] PrintError),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure of a direct print. No variant is retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PrintError {
    /// The platform has no usable serial transport.
    #[error(
        "Serial printing is not available on this system.\n\
Connect the thermal printer over USB and make sure its serial device is visible."
    )]
    Unsupported,

    /// The transport works but no serial device is attached.
    #[error("No serial devices found. Is the printer plugged in and switched on?")]
    NoDevices,

    /// The user dismissed the device picker.
    #[error("No printer selected")]
    SelectionCancelled,

    /// The device could not be opened at the requested baud rate.
    #[error("Could not open '{device}': {detail}")]
    OpenFailed { device: String, detail: String },

    /// Writing or flushing the payload failed.
    #[error("Failed to send label to '{device}': {detail}")]
    WriteFailed { device: String, detail: String },

    /// The blocking print task could not be joined.
    #[error("Print task failed: {0}")]
    Internal(String),
}
