//! Receive-thread acquisition engine (§4.5). Grounded in the teacher's
//! `SyncManager`/`Sensor` worker-thread idiom: a daemon thread owns all
//! socket and ring activity, state transitions are guarded by a lock, and
//! the fan-out queue is a non-blocking bounded channel.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use log::{debug, warn};
use parking_lot::Mutex;

use crate::buffer::{Bucket, RawRing, RingStats, SelectedTier, TierName, TieredBuffer};
use crate::config::EngineConfig;
use crate::error::GsdvError;
use crate::models::Sample;
use crate::net::datagram_client::RdtClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Error,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("acquisition already running")]
    AlreadyRunning,
    #[error("engine is in an error state; call reset() first")]
    InErrorState,
    #[error("cannot reset while running")]
    CannotResetWhileRunning,
    #[error("failed to connect to sensor: {0}")]
    Connect(#[from] GsdvError),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcquisitionStats {
    pub state_is_running: bool,
    pub buffer_stats: RingStats,
    pub packets_received: u64,
    pub packets_lost: u64,
    pub receive_errors: u64,
    pub samples_per_second: f64,
}

impl AcquisitionStats {
    pub fn loss_ratio(&self) -> f64 {
        let total = self.packets_received + self.packets_lost;
        if total == 0 { 0.0 } else { self.packets_lost as f64 / total as f64 }
    }
}

type SampleCallback = Arc<dyn Fn(Sample) + Send + Sync>;

struct RateTracker {
    samples: VecDeque<(Instant, u64)>,
}

impl RateTracker {
    fn new() -> Self {
        Self { samples: VecDeque::new() }
    }

    fn record(&mut self, now: Instant, total_received: u64) {
        self.samples.push_back((now, total_received));
        let cutoff = now - Duration::from_secs(2);
        while let Some(&(t, _)) = self.samples.front() {
            if t < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn rate(&self) -> f64 {
        if self.samples.len() < 2 {
            return 0.0;
        }
        let (t_old, c_old) = *self.samples.front().unwrap();
        let (t_new, c_new) = *self.samples.back().unwrap();
        let elapsed = t_new.saturating_duration_since(t_old).as_secs_f64();
        if elapsed <= 0.0 { 0.0 } else { (c_new - c_old) as f64 / elapsed }
    }
}

/// Owns the datagram client, raw ring, and the receive/fan-out worker
/// threads for one sensor connection.
pub struct AcquisitionEngine {
    host: String,
    port: u16,
    config: EngineConfig,
    ring: Arc<RawRing>,
    tiered: Arc<TieredBuffer>,
    state: Arc<Mutex<AcquisitionState>>,
    stop_signal: Arc<AtomicBool>,
    packets_received: Arc<AtomicU64>,
    packets_lost: Arc<AtomicU64>,
    receive_errors: Arc<AtomicU64>,
    rate_tracker: Arc<Mutex<RateTracker>>,
    receive_handle: Option<JoinHandle<()>>,
    fanout_handle: Option<JoinHandle<()>>,
    fanout_tx: Option<Sender<Sample>>,
    sample_callback: Option<SampleCallback>,
}

impl AcquisitionEngine {
    pub fn new(host: impl Into<String>, port: u16, config: EngineConfig) -> Self {
        let ring = Arc::new(RawRing::new(config.raw_ring_capacity));
        let tiered = Arc::new(TieredBuffer::default());
        Self {
            host: host.into(),
            port,
            config,
            ring,
            tiered,
            state: Arc::new(Mutex::new(AcquisitionState::Stopped)),
            stop_signal: Arc::new(AtomicBool::new(false)),
            packets_received: Arc::new(AtomicU64::new(0)),
            packets_lost: Arc::new(AtomicU64::new(0)),
            receive_errors: Arc::new(AtomicU64::new(0)),
            rate_tracker: Arc::new(Mutex::new(RateTracker::new())),
            receive_handle: None,
            fanout_handle: None,
            fanout_tx: None,
            sample_callback: None,
        }
    }

    pub fn ring(&self) -> &Arc<RawRing> {
        &self.ring
    }

    /// Multi-resolution decimated history, fed every raw sample in parallel
    /// with the ring, independent of the fan-out decimation factor.
    pub fn tiered(&self) -> &Arc<TieredBuffer> {
        &self.tiered
    }

    pub fn query_tiered(&self, tier: TierName, start_ns: u64, end_ns: u64) -> Vec<Bucket> {
        self.tiered.get_tier_data(tier, start_ns, end_ns)
    }

    pub fn select_tier_for_window(&self, window_secs: f64, sample_rate_hz: f64) -> SelectedTier {
        TieredBuffer::select_tier_for_window(window_secs, sample_rate_hz, self.config.raw_ring_capacity)
    }

    pub fn state(&self) -> AcquisitionState {
        *self.state.lock()
    }

    pub fn is_running(&self) -> bool {
        self.state() == AcquisitionState::Running
    }

    /// Register a callback invoked for each (post-decimation) sample, from
    /// the dedicated fan-out worker thread. Must be set before `start()`.
    pub fn set_sample_callback(&mut self, callback: impl Fn(Sample) + Send + Sync + 'static) {
        self.sample_callback = Some(Arc::new(callback));
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            match *state {
                AcquisitionState::Running => return Err(EngineError::AlreadyRunning),
                AcquisitionState::Error => return Err(EngineError::InErrorState),
                _ => {}
            }
            *state = AcquisitionState::Starting;
        }

        self.stop_signal.store(false, Ordering::SeqCst);
        self.packets_received.store(0, Ordering::SeqCst);
        self.packets_lost.store(0, Ordering::SeqCst);
        self.receive_errors.store(0, Ordering::SeqCst);
        *self.rate_tracker.lock() = RateTracker::new();
        self.ring.clear();
        self.tiered.clear();

        let client = RdtClient::connect(&self.host, self.port).map_err(|e| {
            *self.state.lock() = AcquisitionState::Error;
            EngineError::Connect(e)
        })?;
        client.start_streaming(0).map_err(|e| {
            *self.state.lock() = AcquisitionState::Error;
            EngineError::Connect(e)
        })?;

        let (fanout_tx, fanout_rx) = if self.sample_callback.is_some() {
            let (tx, rx) = channel::bounded(self.config.fanout_queue_capacity);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };

        let receive_handle = self.spawn_receive_worker(client, fanout_tx.clone());
        let fanout_handle = match (fanout_rx, self.sample_callback.clone()) {
            (Some(rx), Some(cb)) => Some(self.spawn_fanout_worker(rx, cb)),
            _ => None,
        };

        self.receive_handle = Some(receive_handle);
        self.fanout_handle = fanout_handle;
        self.fanout_tx = fanout_tx;
        *self.state.lock() = AcquisitionState::Running;
        Ok(())
    }

    fn spawn_receive_worker(&self, client: RdtClient, fanout_tx: Option<Sender<Sample>>) -> JoinHandle<()> {
        let stop_signal = self.stop_signal.clone();
        let ring = self.ring.clone();
        let tiered = self.tiered.clone();
        let packets_received = self.packets_received.clone();
        let packets_lost = self.packets_lost.clone();
        let receive_errors = self.receive_errors.clone();
        let rate_tracker = self.rate_tracker.clone();
        let receive_timeout = self.config.receive_timeout;
        let batch_size = self.config.receive_batch_size;
        let decimation = self.config.fanout_decimation.max(1);

        thread::Builder::new()
            .name("gsdv-acquisition-rx".into())
            .spawn(move || {
                let mut client = client;
                let mut decimation_counter = 0usize;

                while !stop_signal.load(Ordering::SeqCst) {
                    let batch = client.receive_batch(receive_timeout, batch_size, |e| {
                        receive_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("protocol error while receiving: {e}");
                    });

                    for sample in batch {
                        if stop_signal.load(Ordering::SeqCst) {
                            break;
                        }
                        let total = packets_received.fetch_add(1, Ordering::Relaxed) + 1;
                        rate_tracker.lock().record(Instant::now(), total);
                        tiered.add_sample(sample.t_monotonic_ns, &sample.counts);

                        decimation_counter += 1;
                        if decimation_counter < decimation {
                            continue;
                        }
                        decimation_counter = 0;

                        ring.append(&sample);

                        if let Some(tx) = &fanout_tx {
                            if let Err(TrySendError::Full(_)) = tx.try_send(sample) {
                                // dropped: fan-out is best-effort, never blocks receive
                            }
                        }
                    }

                    packets_lost.store(client.statistics().packets_lost, Ordering::Relaxed);
                }

                debug!("acquisition receive worker exiting");
            })
            .expect("failed to spawn acquisition receive thread")
    }

    fn spawn_fanout_worker(&self, rx: Receiver<Sample>, callback: SampleCallback) -> JoinHandle<()> {
        let stop_signal = self.stop_signal.clone();
        thread::Builder::new()
            .name("gsdv-acquisition-fanout".into())
            .spawn(move || {
                while !stop_signal.load(Ordering::SeqCst) {
                    match rx.recv_timeout(Duration::from_millis(100)) {
                        Ok(sample) => callback(sample),
                        Err(channel::RecvTimeoutError::Timeout) => continue,
                        Err(channel::RecvTimeoutError::Disconnected) => break,
                    }
                }
            })
            .expect("failed to spawn acquisition fan-out thread")
    }

    pub fn stop(&mut self) {
        {
            let mut state = self.state.lock();
            if *state != AcquisitionState::Running {
                return;
            }
            *state = AcquisitionState::Stopping;
        }

        self.stop_signal.store(true, Ordering::SeqCst);

        if let Some(handle) = self.receive_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.fanout_handle.take() {
            let _ = handle.join();
        }
        self.fanout_tx = None;

        *self.state.lock() = AcquisitionState::Stopped;
    }

    pub fn reset(&mut self) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        if *state == AcquisitionState::Running {
            return Err(EngineError::CannotResetWhileRunning);
        }
        *state = AcquisitionState::Stopped;
        Ok(())
    }

    pub fn stats(&self) -> AcquisitionStats {
        AcquisitionStats {
            state_is_running: self.is_running(),
            buffer_stats: self.ring.stats(),
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_lost: self.packets_lost.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            samples_per_second: self.rate_tracker.lock().rate(),
        }
    }

    pub fn get_latest(&self, n: usize) -> Vec<Sample> {
        self.ring.get_latest(n)
    }
}

impl Drop for AcquisitionEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::rdt::build_response;
    use std::net::UdpSocket as StdUdpSocket;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn start_stop_roundtrip_transitions_state() {
        let server = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        thread::spawn(move || {
            let mut buf = [0u8; 8];
            if let Ok((_, from)) = server.recv_from(&mut buf) {
                for seq in 1..=5u32 {
                    let sample = Sample::raw(0, seq, seq, 0, [0; 6]);
                    let _ = server.send_to(&build_response(&sample), from);
                    thread::sleep(Duration::from_millis(5));
                }
            }
        });

        let mut engine = AcquisitionEngine::new("127.0.0.1", port, EngineConfig::default());
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        assert!(engine.is_running());
        let stats = engine.stats();
        assert!(stats.packets_received > 0);
        engine.stop();
        assert_eq!(engine.state(), AcquisitionState::Stopped);
    }

    #[test]
    fn starting_while_running_is_rejected() {
        let server = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let mut engine = AcquisitionEngine::new("127.0.0.1", port, EngineConfig::default());
        engine.start().unwrap();
        assert!(matches!(engine.start(), Err(EngineError::AlreadyRunning)));
        engine.stop();
    }

    #[test]
    fn sample_callback_receives_fanout() {
        let server = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        thread::spawn(move || {
            let mut buf = [0u8; 8];
            if let Ok((_, from)) = server.recv_from(&mut buf) {
                for seq in 1..=3u32 {
                    let sample = Sample::raw(0, seq, seq, 0, [0; 6]);
                    let _ = server.send_to(&build_response(&sample), from);
                    thread::sleep(Duration::from_millis(5));
                }
            }
        });

        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = received.clone();
        let mut engine = AcquisitionEngine::new("127.0.0.1", port, EngineConfig::default());
        engine.set_sample_callback(move |_sample| {
            received_clone.fetch_add(1, Ordering::Relaxed);
        });
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(200));
        engine.stop();
        assert!(received.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn received_samples_populate_tiered_buffer() {
        let server = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        thread::spawn(move || {
            let mut buf = [0u8; 8];
            if let Ok((_, from)) = server.recv_from(&mut buf) {
                // T1's decimation factor is 100; send enough samples to
                // finalize at least one T1 bucket.
                for seq in 1..=150u32 {
                    let sample = Sample::raw(seq as u64, seq, seq, 0, [0; 6]);
                    let _ = server.send_to(&build_response(&sample), from);
                }
            }
        });

        let mut engine = AcquisitionEngine::new("127.0.0.1", port, EngineConfig::default());
        engine.start().unwrap();
        thread::sleep(Duration::from_millis(300));
        engine.stop();

        let buckets = engine.query_tiered(TierName::T1, 0, u64::MAX);
        assert!(!buckets.is_empty());
    }
}
