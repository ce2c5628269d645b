//! Asynchronous disk logging: filename generation, row/header formatting,
//! and the bounded-queue writer thread (§4.8, §6.5).

pub mod async_writer;
pub mod filename;
pub mod formats;

pub use async_writer::{AsyncFileWriter, WriterState, WriterStats};
pub use formats::OutputFormat;
