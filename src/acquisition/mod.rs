//! Acquisition engine (§4.5): owns the receive worker, raw ring, optional
//! decimated fan-out, and rate/loss statistics.

pub mod engine;

pub use engine::{AcquisitionEngine, AcquisitionState, AcquisitionStats};
