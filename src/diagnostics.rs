//! Diagnostics snapshot and periodic poller (§4.10). The snapshot is a
//! pure function of acquisition statistics; the poller pushes it into any
//! consumer implementing [`DiagnosticsSink`] at a fixed interval, failing
//! safe (stop, don't loop) if the sink errors.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::warn;

use crate::acquisition::AcquisitionStats;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticsSnapshot {
    pub samples_per_second: f64,
    pub buffer_fill_percent: f64,
    pub packets_lost: u64,
    pub dropped_by_app: u64,
}

impl DiagnosticsSnapshot {
    pub fn from_acquisition(stats: &AcquisitionStats, dropped_by_app: u64) -> Self {
        Self {
            samples_per_second: stats.samples_per_second,
            buffer_fill_percent: stats.buffer_stats.fill_ratio() * 100.0,
            packets_lost: stats.packets_lost,
            dropped_by_app,
        }
    }

    /// A human-readable warning composed from whichever loss/drop counters
    /// are non-zero, or `None` if everything looks healthy.
    pub fn warning(&self) -> Option<String> {
        let mut parts = Vec::new();
        if self.packets_lost > 0 {
            parts.push(format!("{} packets lost", self.packets_lost));
        }
        if self.dropped_by_app > 0 {
            parts.push(format!("{} samples dropped downstream", self.dropped_by_app));
        }
        if parts.is_empty() { None } else { Some(parts.join("; ")) }
    }
}

impl fmt::Display for DiagnosticsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1} samples/s, buffer {:.1}% full", self.samples_per_second, self.buffer_fill_percent)
    }
}

/// Duck-typed push target for diagnostics snapshots.
pub trait DiagnosticsSink: Send {
    fn push(&mut self, snapshot: DiagnosticsSnapshot) -> Result<(), String>;
}

impl<F: FnMut(DiagnosticsSnapshot) -> Result<(), String> + Send> DiagnosticsSink for F {
    fn push(&mut self, snapshot: DiagnosticsSnapshot) -> Result<(), String> {
        self(snapshot)
    }
}

/// Periodic poller: invokes a snapshot provider at `interval` and pushes
/// the result into a sink. A sink error stops the poller rather than
/// looping forever on a broken target.
pub struct DiagnosticsPoller {
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl DiagnosticsPoller {
    pub fn start(interval: Duration, mut provider: impl FnMut() -> DiagnosticsSnapshot + Send + 'static, mut sink: impl DiagnosticsSink + 'static) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_for_thread = running.clone();

        let handle = thread::Builder::new()
            .name("gsdv-diagnostics".into())
            .spawn(move || {
                while running_for_thread.load(Ordering::SeqCst) {
                    let snapshot = provider();
                    if let Err(e) = sink.push(snapshot) {
                        warn!("diagnostics sink failed, stopping poller: {e}");
                        break;
                    }
                    thread::sleep(interval);
                }
            })
            .expect("failed to spawn diagnostics poller thread");

        Self { running, handle: Some(handle) }
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for DiagnosticsPoller {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    #[test]
    fn warning_is_none_when_counters_are_clean() {
        let snapshot = DiagnosticsSnapshot { samples_per_second: 1000.0, buffer_fill_percent: 50.0, packets_lost: 0, dropped_by_app: 0 };
        assert!(snapshot.warning().is_none());
    }

    #[test]
    fn warning_names_nonzero_counters() {
        let snapshot = DiagnosticsSnapshot { samples_per_second: 1000.0, buffer_fill_percent: 50.0, packets_lost: 3, dropped_by_app: 7 };
        let warning = snapshot.warning().unwrap();
        assert!(warning.contains("3 packets lost"));
        assert!(warning.contains("7 samples dropped downstream"));
    }

    #[test]
    fn poller_invokes_sink_repeatedly_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let provider = || DiagnosticsSnapshot { samples_per_second: 0.0, buffer_fill_percent: 0.0, packets_lost: 0, dropped_by_app: 0 };
        let sink = move |_snap: DiagnosticsSnapshot| -> Result<(), String> {
            count_clone.fetch_add(1, Ordering::Relaxed);
            Ok(())
        };
        let mut poller = DiagnosticsPoller::start(Duration::from_millis(10), provider, sink);
        thread::sleep(Duration::from_millis(60));
        poller.stop();
        assert!(count.load(Ordering::Relaxed) >= 2);
    }

    #[test]
    fn poller_stops_on_sink_error() {
        let calls = Arc::new(Mutex::new(0u32));
        let calls_clone = calls.clone();
        let provider = || DiagnosticsSnapshot { samples_per_second: 0.0, buffer_fill_percent: 0.0, packets_lost: 0, dropped_by_app: 0 };
        let sink = move |_snap: DiagnosticsSnapshot| -> Result<(), String> {
            *calls_clone.lock().unwrap() += 1;
            Err("target disconnected".to_string())
        };
        let mut poller = DiagnosticsPoller::start(Duration::from_millis(10), provider, sink);
        thread::sleep(Duration::from_millis(60));
        let calls_seen = *calls.lock().unwrap();
        poller.stop();
        assert_eq!(calls_seen, 1);
    }
}
