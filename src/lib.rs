//! Force/torque sensor acquisition, buffering, and logging pipeline.
//!
//! The crate is organized by pipeline stage: [`net`]/[`wire`] talk to the
//! sensor, [`acquisition`] owns the receive loop and raw ring, [`buffer`]
//! holds the tiered min/max history, [`processing`] converts and filters
//! samples, [`writer`] persists them to disk, and [`bias`]/[`diagnostics`]
//! are the cross-cutting services the CLI wires together.

pub mod acquisition;
pub mod bias;
pub mod buffer;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod models;
pub mod net;
pub mod processing;
pub mod sim;
pub mod wire;
pub mod writer;

pub use error::{GsdvError, Result};
pub use models::{Calibration, Sample, SoftZeroOffsets};
