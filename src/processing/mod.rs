//! Conversion, soft-zero, and filtering pipeline between acquisition and
//! the logger/visualization consumers (§4.6).

pub mod engine;
pub mod filter;
pub mod units;

pub use engine::{ProcessingEngine, ProcessingStats};
pub use filter::LowPassFilter;
