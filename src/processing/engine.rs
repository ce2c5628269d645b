//! Processing engine (§4.6): counts -> SI conversion, soft-zero, optional
//! IIR filtering, and fan-out to visualization (synchronous callback) and
//! the logger queue (bounded, drop-on-full). Grounded in the teacher's
//! try-receive/sleep-backoff worker idiom used by `Processor::run`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use parking_lot::{Mutex, RwLock};

use crate::models::{Calibration, Sample, SoftZeroOffsets};
use crate::processing::filter::LowPassFilter;

const WORKER_POLL: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingStats {
    pub samples_processed: u64,
    pub samples_dropped_input: u64,
    pub samples_dropped_logger: u64,
}

type VisualizationCallback = Arc<dyn Fn(Sample) + Send + Sync>;

struct FilterState {
    enabled: bool,
    filter: LowPassFilter<6>,
    primed: bool,
}

/// Converts raw samples to engineering units, applies soft-zero and
/// optional low-pass filtering, and fans out to a visualization callback
/// and a bounded logger queue.
pub struct ProcessingEngine {
    calibration: Arc<RwLock<Calibration>>,
    soft_zero: Arc<RwLock<Option<SoftZeroOffsets>>>,
    filter_state: Arc<Mutex<FilterState>>,
    visualization_callback: Arc<RwLock<Option<VisualizationCallback>>>,

    input_tx: Sender<Sample>,
    input_rx: Receiver<Sample>,
    logger_tx: Sender<Sample>,
    logger_rx: Receiver<Sample>,

    samples_processed: Arc<AtomicU64>,
    samples_dropped_input: Arc<AtomicU64>,
    samples_dropped_logger: Arc<AtomicU64>,

    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl ProcessingEngine {
    pub fn new(calibration: Calibration, sample_rate_hz: f64, cutoff_hz: f64, filter_enabled: bool, input_capacity: usize, logger_capacity: usize) -> Self {
        let filter = LowPassFilter::<6>::new(cutoff_hz, sample_rate_hz).unwrap_or_else(|_| LowPassFilter::<6>::new(crate::processing::filter::MAX_CUTOFF_HZ, sample_rate_hz).expect("default cutoff is always valid"));
        let (input_tx, input_rx) = channel::bounded(input_capacity);
        let (logger_tx, logger_rx) = channel::bounded(logger_capacity);

        Self {
            calibration: Arc::new(RwLock::new(calibration)),
            soft_zero: Arc::new(RwLock::new(None)),
            filter_state: Arc::new(Mutex::new(FilterState { enabled: filter_enabled, filter, primed: false })),
            visualization_callback: Arc::new(RwLock::new(None)),
            input_tx,
            input_rx,
            logger_tx,
            logger_rx,
            samples_processed: Arc::new(AtomicU64::new(0)),
            samples_dropped_input: Arc::new(AtomicU64::new(0)),
            samples_dropped_logger: Arc::new(AtomicU64::new(0)),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
        }
    }

    pub fn set_calibration(&self, calibration: Calibration) {
        *self.calibration.write() = calibration;
    }

    pub fn calibration(&self) -> Calibration {
        self.calibration.read().clone()
    }

    pub fn set_soft_zero(&self, offsets: Option<SoftZeroOffsets>) {
        *self.soft_zero.write() = offsets;
    }

    pub fn capture_soft_zero(&self, sample: &Sample) -> SoftZeroOffsets {
        let offsets = SoftZeroOffsets::from_counts(&sample.counts);
        self.set_soft_zero(Some(offsets));
        offsets
    }

    pub fn clear_soft_zero(&self) {
        self.set_soft_zero(None);
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        let mut state = self.filter_state.lock();
        state.enabled = enabled;
        if enabled {
            state.primed = false;
        }
    }

    pub fn set_visualization_callback(&self, callback: impl Fn(Sample) + Send + Sync + 'static) {
        *self.visualization_callback.write() = Some(Arc::new(callback));
    }

    /// Queue-submission half of the async interface; drops and counts on a
    /// full input queue rather than blocking the caller.
    pub fn submit_sample(&self, sample: Sample) {
        if let Err(TrySendError::Full(_)) = self.input_tx.try_send(sample) {
            self.samples_dropped_input.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn logger_receiver(&self) -> Receiver<Sample> {
        self.logger_rx.clone()
    }

    pub fn stats(&self) -> ProcessingStats {
        ProcessingStats {
            samples_processed: self.samples_processed.load(Ordering::Relaxed),
            samples_dropped_input: self.samples_dropped_input.load(Ordering::Relaxed),
            samples_dropped_logger: self.samples_dropped_logger.load(Ordering::Relaxed),
        }
    }

    /// Convert, offset, and filter one sample synchronously (no queue, no
    /// fan-out) — used directly by callers that already own a thread.
    pub fn process_sample(&self, sample: &Sample) -> Sample {
        let offsets = *self.soft_zero.read();
        let adjusted_counts = match offsets {
            Some(o) => o.apply(&sample.counts),
            None => sample.counts,
        };

        let calibration = self.calibration.read();
        let (force, torque) = calibration.convert_counts_to_si(&adjusted_counts);
        drop(calibration);

        let values = [force[0], force[1], force[2], torque[0], torque[1], torque[2]];

        let mut state = self.filter_state.lock();
        let filtered = if state.enabled {
            if !state.primed {
                state.filter.prime(&values);
                state.primed = true;
                values
            } else {
                state.filter.process_sample(&values)
            }
        } else {
            values
        };
        drop(state);

        Sample {
            counts: adjusted_counts,
            force_n: Some([filtered[0], filtered[1], filtered[2]]),
            torque_nm: Some([filtered[3], filtered[4], filtered[5]]),
            ..*sample
        }
    }

    pub fn start(&mut self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        self.filter_state.lock().primed = false;

        let input_rx = self.input_rx.clone();
        let logger_tx = self.logger_tx.clone();
        let visualization_callback = self.visualization_callback.clone();
        let samples_processed = self.samples_processed.clone();
        let samples_dropped_logger = self.samples_dropped_logger.clone();
        let running = self.running.clone();

        let calibration = self.calibration.clone();
        let soft_zero = self.soft_zero.clone();
        let filter_state = self.filter_state.clone();

        self.worker = Some(
            thread::Builder::new()
                .name("gsdv-processing".into())
                .spawn(move || {
                    while running.load(Ordering::SeqCst) {
                        match input_rx.recv_timeout(WORKER_POLL) {
                            Ok(sample) => {
                                let processed = process_one(&sample, &calibration, &soft_zero, &filter_state);
                                samples_processed.fetch_add(1, Ordering::Relaxed);

                                if let Some(cb) = visualization_callback.read().as_ref() {
                                    cb(processed);
                                }

                                if let Err(TrySendError::Full(_)) = logger_tx.try_send(processed) {
                                    samples_dropped_logger.fetch_add(1, Ordering::Relaxed);
                                }
                            }
                            Err(channel::RecvTimeoutError::Timeout) => continue,
                            Err(channel::RecvTimeoutError::Disconnected) => break,
                        }
                    }
                })
                .expect("failed to spawn processing thread"),
        );
    }

    pub fn stop(&mut self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

fn process_one(sample: &Sample, calibration: &RwLock<Calibration>, soft_zero: &RwLock<Option<SoftZeroOffsets>>, filter_state: &Mutex<FilterState>) -> Sample {
    let offsets = *soft_zero.read();
    let adjusted_counts = match offsets {
        Some(o) => o.apply(&sample.counts),
        None => sample.counts,
    };

    let (force, torque) = calibration.read().convert_counts_to_si(&adjusted_counts);
    let values = [force[0], force[1], force[2], torque[0], torque[1], torque[2]];

    let mut state = filter_state.lock();
    let filtered = if state.enabled {
        if !state.primed {
            state.filter.prime(&values);
            state.primed = true;
            values
        } else {
            state.filter.process_sample(&values)
        }
    } else {
        values
    };

    Sample {
        counts: adjusted_counts,
        force_n: Some([filtered[0], filtered[1], filtered[2]]),
        torque_nm: Some([filtered[3], filtered[4], filtered[5]]),
        ..*sample
    }
}

impl Drop for ProcessingEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn calibration() -> Calibration {
        Calibration::new(1000.0, 1000.0)
    }

    #[test]
    fn process_sample_converts_and_offsets() {
        let engine = ProcessingEngine::new(calibration(), 1000.0, 100.0, false, 100, 100);
        engine.set_soft_zero(Some(SoftZeroOffsets::from_counts(&[100, 100, 100, 100, 100, 100])));
        let sample = Sample::raw(0, 1, 1, 0, [1100, 1100, 1100, 1200, 1200, 1200]);
        let processed = engine.process_sample(&sample);
        assert_eq!(processed.force_n.unwrap(), [1.0, 1.0, 1.0]);
        assert_eq!(processed.torque_nm.unwrap(), [1.1, 1.1, 1.1]);
    }

    #[test]
    fn async_pipeline_routes_to_logger_queue() {
        let mut engine = ProcessingEngine::new(calibration(), 1000.0, 100.0, false, 100, 100);
        engine.start();
        engine.submit_sample(Sample::raw(0, 1, 1, 0, [1000, 0, 0, 0, 0, 0]));

        let logger_rx = engine.logger_receiver();
        let processed = logger_rx.recv_timeout(Duration::from_millis(500)).unwrap();
        assert_eq!(processed.force_n.unwrap()[0], 1.0);
        engine.stop();
        assert_eq!(engine.stats().samples_processed, 1);
    }

    #[test]
    fn filter_primes_on_first_sample_after_enable() {
        let engine = ProcessingEngine::new(calibration(), 1000.0, 10.0, true, 100, 100);
        let sample = Sample::raw(0, 1, 1, 0, [5000, 5000, 5000, 5000, 5000, 5000]);
        let processed = engine.process_sample(&sample);
        assert!((processed.force_n.unwrap()[0] - 5.0).abs() < 1e-9);
    }
}
