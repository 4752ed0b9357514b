//! Pipeline stages for previewing a label file.
//!
//! Each submodule implements one step so it can be tested, and swapped, on
//! its own.
//!
//! ## Data Flow
//!
//! ```text
//!            ┌──▶ render  ──┐
//! ingest ──▶ │              ├──▶ process (write-back)
//! (filter)   └──▶ extract ──┘
//!              (HTTP)  (LLM)
//! ```
//!
//! 1. [`ingest`]   filter inputs to `.zpl`/`.txt`, walk directories, read text
//! 2. [`render`]   POST the markup to the rasterizer, get a PNG back
//! 3. [`extract`]  ask an LLM for recipient, tracking, carrier, destination
//! 4. [`process`]  join render and extract, write the result to the store

pub mod extract;
pub mod ingest;
pub mod process;
pub mod render;
