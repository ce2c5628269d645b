//! Bias (tare/zero) service (§4.9): device-level hardware tare via UDP
//! `SET_BIAS` (primary) with TCP fallback, and an app-level soft-zero
//! offset captured from the most recent sample.

use std::time::Duration;

use crate::config::{RDT_PORT, TCP_CMD_PORT};
use crate::error::{GsdvError, Result};
use crate::models::{Sample, SoftZeroOffsets};
use crate::net::datagram_client::RdtClient;
use crate::net::tcp_client::TcpCommandClient;

/// Send device-level bias (tare) to the sensor: UDP `SET_BIAS` first, TCP
/// bias request on failure. Returns a combined error only if both fail.
pub fn send_device_bias(host: &str, udp_port: u16, tcp_port: u16, timeout: Duration) -> Result<()> {
    let udp_error = match RdtClient::connect(host, udp_port).and_then(|c| c.send_bias()) {
        Ok(()) => return Ok(()),
        Err(e) => e.to_string(),
    };

    let tcp_error = match TcpCommandClient::connect(host, tcp_port, timeout).and_then(|mut c| c.send_bias()) {
        Ok(()) => return Ok(()),
        Err(e) => e.to_string(),
    };

    Err(GsdvError::bias(host, "device tare", format!("UDP: {udp_error}; TCP: {tcp_error}")))
}

/// Tracks app-level soft-zero state and exposes both bias modes behind one
/// entry point so callers don't need to pick a protocol themselves.
pub struct BiasService {
    host: String,
    udp_port: u16,
    tcp_port: u16,
    timeout: Duration,
    soft_zero: Option<SoftZeroOffsets>,
}

impl BiasService {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into(), udp_port: RDT_PORT, tcp_port: TCP_CMD_PORT, timeout: Duration::from_secs(2), soft_zero: None }
    }

    pub fn with_ports(mut self, udp_port: u16, tcp_port: u16) -> Self {
        self.udp_port = udp_port;
        self.tcp_port = tcp_port;
        self
    }

    pub fn apply_device_bias(&self) -> Result<()> {
        send_device_bias(&self.host, self.udp_port, self.tcp_port, self.timeout)
    }

    pub fn apply_soft_zero(&mut self, sample: &Sample) -> SoftZeroOffsets {
        let offsets = SoftZeroOffsets::from_counts(&sample.counts);
        self.soft_zero = Some(offsets);
        offsets
    }

    pub fn clear_soft_zero(&mut self) {
        self.soft_zero = None;
    }

    pub fn soft_zero(&self) -> Option<SoftZeroOffsets> {
        self.soft_zero
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capturing_soft_zero_stores_offsets() {
        let mut service = BiasService::new("127.0.0.1");
        assert!(service.soft_zero().is_none());
        let sample = Sample::raw(0, 1, 1, 0, [10, 20, 30, 40, 50, 60]);
        let offsets = service.apply_soft_zero(&sample);
        assert_eq!(offsets.force_counts, [10, 20, 30]);
        assert_eq!(service.soft_zero(), Some(offsets));
        service.clear_soft_zero();
        assert!(service.soft_zero().is_none());
    }

    #[test]
    fn device_bias_fails_combined_when_both_protocols_unreachable() {
        let service = BiasService::new("127.0.0.1").with_ports(1, 2);
        let err = service.apply_device_bias().unwrap_err();
        assert_eq!(err.code(), "CAL-005");
    }
}
