//! Calibration document fetch over HTTP (§4.1, §6.3), plus the
//! HTTP-then-TCP fallback chain used at connect time.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{GsdvError, Result};
use crate::models::Calibration;
use crate::net::tcp_client::TcpCommandClient;
use crate::wire::calibration_xml;

const CALIBRATION_ENDPOINT: &str = "/netftapi2.xml";

/// Minimal raw-socket HTTP/1.0 GET — the calibration document is small and
/// local-network only, so no HTTP client dependency is pulled in.
fn http_get(host: &str, port: u16, path: &str, timeout: Duration) -> Result<String> {
    let addr = format!("{host}:{port}");
    let mut stream = TcpStream::connect(&addr).map_err(|e| GsdvError::http_calibration(host, e.to_string()))?;
    stream.set_read_timeout(Some(timeout)).ok();
    stream.set_write_timeout(Some(timeout)).ok();

    let request = format!("GET {path} HTTP/1.0\r\nHost: {host}\r\nConnection: close\r\n\r\n");
    stream
        .write_all(request.as_bytes())
        .map_err(|e| GsdvError::http_calibration(host, e.to_string()))?;

    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .map_err(|e| GsdvError::http_calibration(host, e.to_string()))?;
    let text = String::from_utf8_lossy(&raw);

    match text.split_once("\r\n\r\n").or_else(|| text.split_once("\n\n")) {
        Some((_, body)) => Ok(body.to_string()),
        None => Err(GsdvError::http_calibration(host, "response had no body")),
    }
}

pub fn fetch_calibration_http(host: &str, port: u16, timeout: Duration) -> Result<Calibration> {
    let body = http_get(host, port, CALIBRATION_ENDPOINT, timeout)?;
    calibration_xml::parse_calibration_xml(&body)
}

pub fn fetch_calibration_tcp(host: &str, port: u16, timeout: Duration) -> Result<Calibration> {
    let mut client = TcpCommandClient::connect(host, port, timeout)?;
    client.read_calibration()
}

/// Try HTTP first, fall back to TCP on failure; surface a combined error
/// (§7 Calibration) only if both fail.
pub fn get_calibration_with_fallback(host: &str, http_port: u16, tcp_port: u16, timeout: Duration) -> Result<Calibration> {
    match fetch_calibration_http(host, http_port, timeout) {
        Ok(cal) => Ok(cal),
        Err(http_err) => match fetch_calibration_tcp(host, tcp_port, timeout) {
            Ok(cal) => Ok(cal),
            Err(tcp_err) => Err(GsdvError::calibration_unavailable(host, Some(http_err.to_string()), Some(tcp_err.to_string()))),
        },
    }
}
