//! Crate-wide defaults. No external config-file format is required by the
//! spec (§6.7); CLI flags are the only configuration surface, so these
//! structs exist purely to collect the named constants of §4 in one place
//! with `Default` impls the CLI can override.

use std::time::Duration;

/// Datagram (RDT) protocol port, §6.1.
pub const RDT_PORT: u16 = 49152;
/// Stream command channel port, §6.2.
pub const TCP_CMD_PORT: u16 = 49151;
/// Calibration HTTP port, §6.3.
pub const HTTP_PORT: u16 = 80;

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub udp_port: u16,
    pub tcp_port: u16,
    pub http_port: u16,
    pub connect_timeout: Duration,
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            udp_port: RDT_PORT,
            tcp_port: TCP_CMD_PORT,
            http_port: HTTP_PORT,
            connect_timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Raw ring capacity, `C_raw` in §3 (default 60,000, 60s at 1kHz).
    pub raw_ring_capacity: usize,
    /// Receive-worker socket-read timeout, `T_recv` in §5 (default 100ms).
    pub receive_timeout: Duration,
    /// Samples read per `receive_samples` batch in the receive-worker loop.
    pub receive_batch_size: usize,
    /// Decimation factor `k`: every k-th received sample propagates to the
    /// fan-out callback; all samples are still stored in the raw ring.
    pub fanout_decimation: usize,
    /// Depth of the fan-out (sample-callback) bounded queue.
    pub fanout_queue_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            raw_ring_capacity: 60_000,
            receive_timeout: Duration::from_millis(100),
            receive_batch_size: 100,
            fanout_decimation: 1,
            fanout_queue_capacity: 1000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessingConfig {
    /// Depth of the bounded `submit_sample` input queue.
    pub input_queue_capacity: usize,
    /// Depth of the bounded logger-output queue.
    pub logger_queue_capacity: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            input_queue_capacity: 2_000,
            logger_queue_capacity: 2_000,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WriterConfig {
    pub queue_capacity: usize,
    pub buffer_flush_threshold_rows: usize,
    pub flush_interval: Duration,
    pub rotation: Option<RotationConfig>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            buffer_flush_threshold_rows: 1_000,
            flush_interval: Duration::from_millis(250),
            rotation: None,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RotationConfig {
    pub max_bytes: Option<u64>,
    pub max_interval: Option<Duration>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_defaults_match_spec_constants() {
        let c = EngineConfig::default();
        assert_eq!(c.raw_ring_capacity, 60_000);
        assert_eq!(c.receive_timeout, Duration::from_millis(100));
    }
}
