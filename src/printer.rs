//! Direct printing: raw markup bytes over a serial port.
//!
//! ## Handshake
//!
//! ```text
//! unsupported ──▶ (stop: PrintError::Unsupported)
//!      │ supported
//!      ▼
//! awaiting-device-selection ──▶ open ──▶ writing ──▶ closed
//! ```
//!
//! The capability check comes first, so a system without serial support never
//! shows a device picker. The open port lives in a [`PortSession`] whose
//! `Drop` closes it, so the port is released on every exit path, including a
//! failed write. Nothing is retried.
//!
//! Serial I/O is blocking, so the whole handshake runs on `spawn_blocking`.

use crate::error::PrintError;
use std::fmt;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// An open, writable device.
pub type PortWriter = Box<dyn Write + Send>;

/// A byte-oriented device transport.
pub trait PrintTransport: Send + Sync {
    /// Whether this platform can talk to serial devices at all.
    fn is_supported(&self) -> bool;

    /// Ask the user which device to print to.
    fn request_device(&self) -> Result<String, PrintError>;

    /// Open `device` at `baud_rate`.
    fn open(&self, device: &str, baud_rate: u32) -> Result<PortWriter, PrintError>;
}

/// Steps of the print handshake, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintStage {
    Unsupported,
    AwaitingDeviceSelection,
    Open,
    Writing,
    Closed,
}

impl fmt::Display for PrintStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PrintStage::Unsupported => "unsupported",
            PrintStage::AwaitingDeviceSelection => "awaiting-device-selection",
            PrintStage::Open => "open",
            PrintStage::Writing => "writing",
            PrintStage::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Scoped ownership of an open port. Dropping it closes the port.
pub struct PortSession {
    device: String,
    writer: Option<PortWriter>,
}

impl PortSession {
    pub fn open(transport: &dyn PrintTransport, device: &str, baud_rate: u32) -> Result<Self, PrintError> {
        let writer = transport.open(device, baud_rate)?;
        debug!("Print: {} on {} @ {} baud", PrintStage::Open, device, baud_rate);
        Ok(Self {
            device: device.to_string(),
            writer: Some(writer),
        })
    }

    /// Send `payload` in one write and flush it out of the driver.
    pub fn write_payload(&mut self, payload: &[u8]) -> Result<(), PrintError> {
        debug!("Print: {} {} bytes to {}", PrintStage::Writing, payload.len(), self.device);
        let device = self.device.clone();
        let writer = self.writer.as_mut().ok_or_else(|| PrintError::WriteFailed {
            device: device.clone(),
            detail: "port already closed".into(),
        })?;
        writer
            .write_all(payload)
            .and_then(|()| writer.flush())
            .map_err(|e| PrintError::WriteFailed {
                device,
                detail: e.to_string(),
            })
    }

    /// Close explicitly. Equivalent to dropping the session.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(writer) = self.writer.take() {
            drop(writer);
            debug!("Print: {} {}", PrintStage::Closed, self.device);
        }
    }
}

impl Drop for PortSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Run the whole handshake synchronously.
pub fn print_blocking(
    transport: &dyn PrintTransport,
    payload: &[u8],
    baud_rate: u32,
) -> Result<(), PrintError> {
    if !transport.is_supported() {
        debug!("Print: {}", PrintStage::Unsupported);
        return Err(PrintError::Unsupported);
    }

    debug!("Print: {}", PrintStage::AwaitingDeviceSelection);
    let device = transport.request_device()?;

    let mut session = PortSession::open(transport, &device, baud_rate)?;
    session.write_payload(payload)?;
    session.close();

    info!("Sent {} bytes to {}", payload.len(), device);
    Ok(())
}

/// Print `markup` through `transport` without blocking the runtime.
pub async fn print_markup(
    transport: Arc<dyn PrintTransport>,
    markup: &str,
    baud_rate: u32,
) -> Result<(), PrintError> {
    let payload = markup.as_bytes().to_vec();
    let result = tokio::task::spawn_blocking(move || {
        print_blocking(transport.as_ref(), &payload, baud_rate)
    })
    .await
    .map_err(|e| PrintError::Internal(e.to_string()))?;

    if let Err(ref e) = result {
        warn!("Direct print failed: {}", e);
    }
    result
}

// ── serialport-backed transport ──────────────────────────────────────────

/// How [`SerialTransport`] picks its device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceChoice {
    /// Always use this device path.
    Named(String),
    /// List the detected ports on stderr and read a choice from stdin.
    /// An empty line cancels.
    Prompt,
}

/// [`PrintTransport`] over the `serialport` crate.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    choice: DeviceChoice,
    write_timeout: Duration,
}

impl SerialTransport {
    pub fn new(choice: DeviceChoice) -> Self {
        Self {
            choice,
            write_timeout: Duration::from_secs(10),
        }
    }

    /// Named device if one is configured, otherwise interactive.
    pub fn from_device(device: Option<&str>) -> Self {
        match device {
            Some(d) => Self::new(DeviceChoice::Named(d.to_string())),
            None => Self::new(DeviceChoice::Prompt),
        }
    }

    fn prompt_for_device(&self) -> Result<String, PrintError> {
        let ports = serialport::available_ports().map_err(|_| PrintError::Unsupported)?;
        let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
        if names.is_empty() {
            return Err(PrintError::NoDevices);
        }

        eprintln!("Select the printer's serial port:");
        for (i, name) in names.iter().enumerate() {
            eprintln!("  [{}] {}", i + 1, name);
        }
        eprint!("Port number (empty to cancel): ");
        io::stderr().flush().ok();

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|_| PrintError::SelectionCancelled)?;

        pick_device(&names, &line)
    }
}

/// Interpret the user's answer to the device prompt.
///
/// Accepts a 1-based index or an exact port name; anything else cancels.
pub fn pick_device(names: &[String], answer: &str) -> Result<String, PrintError> {
    let answer = answer.trim();
    if answer.is_empty() {
        return Err(PrintError::SelectionCancelled);
    }
    if let Ok(n) = answer.parse::<usize>() {
        return names
            .get(n.wrapping_sub(1))
            .cloned()
            .ok_or(PrintError::SelectionCancelled);
    }
    names
        .iter()
        .find(|name| name.as_str() == answer)
        .cloned()
        .ok_or(PrintError::SelectionCancelled)
}

impl PrintTransport for SerialTransport {
    fn is_supported(&self) -> bool {
        serialport::available_ports().is_ok()
    }

    fn request_device(&self) -> Result<String, PrintError> {
        match self.choice {
            DeviceChoice::Named(ref device) => Ok(device.clone()),
            DeviceChoice::Prompt => self.prompt_for_device(),
        }
    }

    fn open(&self, device: &str, baud_rate: u32) -> Result<PortWriter, PrintError> {
        let port = serialport::new(device, baud_rate)
            .timeout(self.write_timeout)
            .open()
            .map_err(|e| PrintError::OpenFailed {
                device: device.to_string(),
                detail: e.to_string(),
            })?;
        Ok(Box::new(port))
    }
}
