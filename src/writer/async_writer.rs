//! Bounded-queue asynchronous file writer (§4.8). The producer never
//! blocks: `write()` is a `try_send` that drops and counts on a full
//! queue. A single worker thread owns the open file, batches rows, and
//! flushes on a size/time threshold, rotating files when configured.
//! Worker lifecycle follows the teacher's `SyncManager::start_log_consumer`
//! idiom (bounded queue, batch drain, `Arc<Mutex<Option<JoinHandle>>>`);
//! the rotation trigger itself has no original-source precedent and is
//! designed fresh against the filename scheme of [`crate::writer::filename`].

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::Utc;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::{error, warn};
use parking_lot::Mutex;

use crate::config::{RotationConfig, WriterConfig};
use crate::error::{GsdvError, Result};
use crate::models::{Calibration, Sample};
use crate::writer::filename::generate_filename;
use crate::writer::formats::{self, Identity, OutputFormat};

const FLUSH_LATENCY_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Stopped,
    Running,
    Error,
}

#[derive(Debug, Clone, Default)]
pub struct WriterStats {
    pub samples_written: u64,
    pub samples_dropped: u64,
    pub flushes: u64,
    pub avg_flush_latency_us: f64,
    pub current_file: Option<PathBuf>,
}

struct SharedState {
    stats: Mutex<WriterStats>,
    state: Mutex<WriterState>,
    error: Mutex<Option<String>>,
}

pub struct AsyncFileWriter {
    tx: Option<Sender<Sample>>,
    running: Arc<AtomicBool>,
    samples_dropped: Arc<AtomicU64>,
    shared: Arc<SharedState>,
    handle: Option<JoinHandle<()>>,
}

struct RotationTracker {
    config: Option<RotationConfig>,
    bytes_since_rotation: u64,
    opened_at: Instant,
    part_number: Option<u32>,
}

impl RotationTracker {
    fn new(config: Option<RotationConfig>, part_number: Option<u32>) -> Self {
        Self { config, bytes_since_rotation: 0, opened_at: Instant::now(), part_number }
    }

    fn should_rotate(&self) -> bool {
        match self.config {
            None => false,
            Some(c) => c.max_bytes.is_some_and(|m| self.bytes_since_rotation >= m) || c.max_interval.is_some_and(|m| self.opened_at.elapsed() >= m),
        }
    }

    fn next_part(&self) -> u32 {
        self.part_number.map(|n| n + 1).unwrap_or(1)
    }

    fn record_bytes(&mut self, n: u64) {
        self.bytes_since_rotation += n;
    }

    fn reset(&mut self, part_number: Option<u32>) {
        self.bytes_since_rotation = 0;
        self.opened_at = Instant::now();
        self.part_number = part_number;
    }
}

fn open_output_file(output_dir: &Path, format: OutputFormat, prefix: &str, part_number: Option<u32>, calibration: Option<&Calibration>, identity: Option<&Identity>) -> io::Result<(File, PathBuf)> {
    fs::create_dir_all(output_dir)?;
    let filename = generate_filename(format.extension(), prefix, Utc::now(), part_number).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    let path = output_dir.join(filename);
    let mut file = OpenOptions::new().create(true).write(true).truncate(true).open(&path)?;

    let header = formats::metadata_header(format, calibration, identity);
    file.write_all(header.as_bytes())?;
    file.write_all(format.line_ending().as_bytes())?;
    Ok((file, path))
}

/// `fsync` the file and, best-effort, the directory that contains it so the
/// rename/create is itself durable.
fn durable_close(file: &mut File, path: &Path) -> io::Result<()> {
    file.sync_all()?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

impl AsyncFileWriter {
    pub fn new() -> Self {
        Self {
            tx: None,
            running: Arc::new(AtomicBool::new(false)),
            samples_dropped: Arc::new(AtomicU64::new(0)),
            shared: Arc::new(SharedState {
                stats: Mutex::new(WriterStats::default()),
                state: Mutex::new(WriterState::Stopped),
                error: Mutex::new(None),
            }),
            handle: None,
        }
    }

    pub fn state(&self) -> WriterState {
        *self.shared.state.lock()
    }

    pub fn last_error(&self) -> Option<String> {
        self.shared.error.lock().clone()
    }

    pub fn stats(&self) -> WriterStats {
        let mut stats = self.shared.stats.lock().clone();
        stats.samples_dropped = self.samples_dropped.load(Ordering::Relaxed);
        stats
    }

    /// Non-blocking enqueue. Returns `false` (and counts a drop) if the
    /// queue is full or the writer isn't running.
    pub fn write(&self, sample: Sample) -> bool {
        match &self.tx {
            Some(tx) => match tx.try_send(sample) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    self.samples_dropped.fetch_add(1, Ordering::Relaxed);
                    false
                }
                Err(TrySendError::Disconnected(_)) => false,
            },
            None => false,
        }
    }

    pub fn start(&mut self, output_dir: PathBuf, format: OutputFormat, prefix: String, config: WriterConfig, calibration: Option<Calibration>, identity: Option<Identity>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let (tx, rx) = channel::bounded(config.queue_capacity);
        self.tx = Some(tx);
        *self.shared.state.lock() = WriterState::Running;
        *self.shared.error.lock() = None;
        *self.shared.stats.lock() = WriterStats::default();

        let running = self.running.clone();
        let shared = self.shared.clone();

        self.handle = Some(
            thread::Builder::new()
                .name("gsdv-writer".into())
                .spawn(move || run_writer_loop(rx, running, shared, output_dir, format, prefix, config, calibration, identity))
                .expect("failed to spawn writer thread"),
        );
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        self.tx = None;
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
        *self.shared.state.lock() = WriterState::Stopped;
    }
}

impl Default for AsyncFileWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::too_many_arguments)]
fn run_writer_loop(rx: Receiver<Sample>, running: Arc<AtomicBool>, shared: Arc<SharedState>, output_dir: PathBuf, format: OutputFormat, prefix: String, config: WriterConfig, calibration: Option<Calibration>, identity: Option<Identity>) {
    let (mut file, mut path) = match open_output_file(&output_dir, format, &prefix, None, calibration.as_ref(), identity.as_ref()) {
        Ok(v) => v,
        Err(e) => {
            report_io_error(&shared, &path_or_dir(&output_dir), e);
            return;
        }
    };

    let mut rotation = RotationTracker::new(config.rotation, None);
    let mut batch: Vec<String> = Vec::new();
    let mut last_flush = Instant::now();
    let mut flush_latencies: VecDeque<Duration> = VecDeque::with_capacity(FLUSH_LATENCY_WINDOW);

    loop {
        let stopping = !running.load(Ordering::SeqCst);
        let remaining = config.flush_interval.saturating_sub(last_flush.elapsed());

        if !stopping {
            match rx.recv_timeout(remaining) {
                Ok(sample) => {
                    batch.push(formats::format_row(format, &sample));
                    shared.stats.lock().samples_written += 1;
                }
                Err(channel::RecvTimeoutError::Timeout) => {}
                Err(channel::RecvTimeoutError::Disconnected) => {}
            }
        } else {
            while let Ok(sample) = rx.try_recv() {
                batch.push(formats::format_row(format, &sample));
                shared.stats.lock().samples_written += 1;
            }
        }

        let should_flush = batch.len() >= config.buffer_flush_threshold_rows || last_flush.elapsed() >= config.flush_interval || stopping;

        if should_flush && !batch.is_empty() {
            if rotation.should_rotate() {
                if let Err(e) = durable_close(&mut file, &path) {
                    warn!("rotation close failed for {}: {e}", path.display());
                }
                let next_part = rotation.next_part();
                match open_output_file(&output_dir, format, &prefix, Some(next_part), calibration.as_ref(), identity.as_ref()) {
                    Ok((new_file, new_path)) => {
                        file = new_file;
                        path = new_path;
                        rotation.reset(Some(next_part));
                        shared.stats.lock().current_file = Some(path.clone());
                    }
                    Err(e) => {
                        report_io_error(&shared, &path_or_dir(&output_dir), e);
                        return;
                    }
                }
            }

            let flush_start = Instant::now();
            let mut body = batch.join(format.line_ending());
            body.push_str(format.line_ending());
            let write_result = file.write_all(body.as_bytes()).and_then(|_| file.flush());

            match write_result {
                Ok(()) => {
                    rotation.record_bytes(body.len() as u64);
                    let latency = flush_start.elapsed();
                    if flush_latencies.len() == FLUSH_LATENCY_WINDOW {
                        flush_latencies.pop_front();
                    }
                    flush_latencies.push_back(latency);
                    let avg_us = flush_latencies.iter().map(|d| d.as_micros() as f64).sum::<f64>() / flush_latencies.len() as f64;

                    let mut stats = shared.stats.lock();
                    stats.flushes += 1;
                    stats.avg_flush_latency_us = avg_us;
                    stats.current_file = Some(path.clone());
                }
                Err(e) => {
                    report_io_error(&shared, &path.display().to_string(), e);
                    return;
                }
            }

            batch.clear();
            last_flush = Instant::now();
        }

        if stopping {
            break;
        }
    }

    if let Err(e) = durable_close(&mut file, &path) {
        error!("final durable close failed for {}: {e}", path.display());
    }
}

fn path_or_dir(dir: &Path) -> String {
    dir.display().to_string()
}

fn report_io_error(shared: &Arc<SharedState>, path: &str, e: io::Error) {
    let classified = if e.raw_os_error() == Some(libc::ENOSPC) { GsdvError::disk_full(path) } else { GsdvError::file_write(path, e.to_string()) };
    error!("writer I/O error: {classified}");
    *shared.error.lock() = Some(classified.to_string());
    *shared.state.lock() = WriterState::Error;
}
