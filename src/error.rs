//! Error taxonomy shared across the acquisition pipeline.
//!
//! Every fallible operation in this crate returns one of the four category
//! enums below, unified by [`GsdvError`]. Each leaf variant carries a short
//! code (`NET-001`, `CAL-004`, ...), a human-readable message, a
//! [`RecoveryAction`] hint, and an [`ErrorContext`] record. Single-packet
//! parse errors are recovered locally by callers and only counted; engine-
//! and writer-level errors propagate up to the controller.

use std::fmt;

/// Suggested recovery action for the operator or controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryAction {
    Retry,
    Reconnect,
    Fallback,
    ChooseDirectory,
    Manual,
}

impl fmt::Display for RecoveryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RecoveryAction::Retry => "retry",
            RecoveryAction::Reconnect => "reconnect",
            RecoveryAction::Fallback => "fallback",
            RecoveryAction::ChooseDirectory => "choose_directory",
            RecoveryAction::Manual => "manual",
        };
        f.write_str(s)
    }
}

/// Additional context attached to an error for logging and diagnostics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub path: Option<String>,
    pub protocol: Option<&'static str>,
    pub original_error: Option<String>,
}

impl ErrorContext {
    pub fn host_port(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: Some(host.into()),
            port: Some(port),
            ..Default::default()
        }
    }

    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Connection refused by {host}:{port}. Check that the sensor is powered on and the IP address is correct.")]
    ConnectionRefused { host: String, port: u16, context: ErrorContext },
    #[error("Connection to {host}:{port} timed out after {timeout_secs:.1}s. Check network connectivity and sensor status.")]
    ConnectionTimeout { host: String, port: u16, timeout_secs: f64, context: ErrorContext },
    #[error("Lost connection to {host}:{port}. The sensor may have been disconnected or powered off.")]
    Disconnect { host: String, port: u16, context: ErrorContext },
    #[error("Socket error during {operation} with {host}:{port}: {source}")]
    Socket { host: String, port: u16, operation: &'static str, source: String, context: ErrorContext },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed {protocol} packet: expected {expected_size} bytes, got {actual_size}.")]
    MalformedPacket { protocol: &'static str, expected_size: usize, actual_size: usize, context: ErrorContext },
    #[error("Invalid {protocol} header: expected {expected}, got {actual}.")]
    InvalidHeader { protocol: &'static str, expected: String, actual: String, context: ErrorContext },
    #[error("Failed to parse {protocol} packet field '{field}': {reason}")]
    PacketParse { protocol: &'static str, field: &'static str, reason: String, context: ErrorContext },
    #[error("Packet loss detected: expected sequence {expected_seq}, got {actual_seq} ({gap_size} packets lost).")]
    SequenceGap { expected_seq: u32, actual_seq: u32, gap_size: u32, context: ErrorContext },
}

#[derive(Debug, thiserror::Error)]
pub enum CalibrationError {
    #[error("HTTP calibration request to {host} failed: {reason}")]
    Http { host: String, reason: String, context: ErrorContext },
    #[error("TCP calibration request to {host}:{port} failed: {reason}")]
    Tcp { host: String, port: u16, reason: String, context: ErrorContext },
    #[error("Failed to parse calibration data ({protocol}): missing or invalid '{field}'. {reason}")]
    Parse { protocol: &'static str, field: &'static str, reason: String, context: ErrorContext },
    #[error("Could not retrieve calibration from {host}. {detail}")]
    Unavailable { host: String, detail: String, context: ErrorContext },
    #[error("Failed to apply {mode} bias to sensor at {host}: {detail}")]
    Bias { host: String, mode: &'static str, detail: String, context: ErrorContext },
}

#[derive(Debug, thiserror::Error)]
pub enum IoCategoryError {
    #[error("Cannot write to directory '{path}'. Check permissions or choose a different directory.")]
    DirectoryNotWritable { path: String, context: ErrorContext },
    #[error("Disk full while writing to '{path}'. Recording stopped to preserve existing data.")]
    DiskFull { path: String, context: ErrorContext },
    #[error("Failed to rotate log file: {reason}. Recording stopped, existing data preserved.")]
    LogRotation { path: String, reason: String, context: ErrorContext },
    #[error("Error writing to '{path}': {reason}")]
    FileWrite { path: String, reason: String, context: ErrorContext },
    #[error("Error closing file '{path}': {reason}. Data may be incomplete.")]
    FileClose { path: String, reason: String, context: ErrorContext },
}

/// Unified crate-wide error, one variant per category of §7.
#[derive(Debug, thiserror::Error)]
pub enum GsdvError {
    #[error("[{code}] {source}")]
    Network { code: &'static str, #[source] source: NetworkError },
    #[error("[{code}] {source}")]
    Protocol { code: &'static str, #[source] source: ProtocolError },
    #[error("[{code}] {source}")]
    Calibration { code: &'static str, #[source] source: CalibrationError },
    #[error("[{code}] {source}")]
    Io { code: &'static str, #[source] source: IoCategoryError },
}

impl GsdvError {
    pub fn code(&self) -> &'static str {
        match self {
            GsdvError::Network { code, .. } => code,
            GsdvError::Protocol { code, .. } => code,
            GsdvError::Calibration { code, .. } => code,
            GsdvError::Io { code, .. } => code,
        }
    }

    pub fn recovery(&self) -> RecoveryAction {
        match self {
            GsdvError::Network { source, .. } => match source {
                NetworkError::ConnectionTimeout { .. } => RecoveryAction::Retry,
                _ => RecoveryAction::Reconnect,
            },
            GsdvError::Protocol { source, .. } => match source {
                ProtocolError::SequenceGap { .. } => RecoveryAction::Manual,
                _ => RecoveryAction::Reconnect,
            },
            GsdvError::Calibration { source, .. } => match source {
                CalibrationError::Tcp { .. } | CalibrationError::Parse { .. } => RecoveryAction::Retry,
                CalibrationError::Unavailable { .. } => RecoveryAction::Manual,
                _ => RecoveryAction::Fallback,
            },
            GsdvError::Io { source, .. } => match source {
                IoCategoryError::FileClose { .. } => RecoveryAction::Manual,
                _ => RecoveryAction::ChooseDirectory,
            },
        }
    }

    pub fn connection_refused(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        GsdvError::Network {
            code: "NET-001",
            source: NetworkError::ConnectionRefused {
                context: ErrorContext::host_port(host.clone(), port),
                host,
                port,
            },
        }
    }

    pub fn connection_timeout(host: impl Into<String>, port: u16, timeout_secs: f64) -> Self {
        let host = host.into();
        GsdvError::Network {
            code: "NET-002",
            source: NetworkError::ConnectionTimeout {
                context: ErrorContext::host_port(host.clone(), port),
                host,
                port,
                timeout_secs,
            },
        }
    }

    pub fn disconnect(host: impl Into<String>, port: u16) -> Self {
        let host = host.into();
        GsdvError::Network {
            code: "NET-003",
            source: NetworkError::Disconnect {
                context: ErrorContext::host_port(host.clone(), port),
                host,
                port,
            },
        }
    }

    pub fn socket(host: impl Into<String>, port: u16, operation: &'static str, source: impl fmt::Display) -> Self {
        let host = host.into();
        GsdvError::Network {
            code: "NET-004",
            source: NetworkError::Socket {
                context: ErrorContext::host_port(host.clone(), port),
                host,
                port,
                operation,
                source: source.to_string(),
            },
        }
    }

    pub fn malformed_packet(protocol: &'static str, expected_size: usize, actual_size: usize) -> Self {
        GsdvError::Protocol {
            code: "PROTO-001",
            source: ProtocolError::MalformedPacket { protocol, expected_size, actual_size, context: ErrorContext::default() },
        }
    }

    pub fn invalid_header(protocol: &'static str, expected: impl Into<String>, actual: impl Into<String>) -> Self {
        GsdvError::Protocol {
            code: "PROTO-002",
            source: ProtocolError::InvalidHeader { protocol, expected: expected.into(), actual: actual.into(), context: ErrorContext::default() },
        }
    }

    pub fn packet_parse(protocol: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        GsdvError::Protocol {
            code: "PROTO-003",
            source: ProtocolError::PacketParse { protocol, field, reason: reason.into(), context: ErrorContext::default() },
        }
    }

    pub fn sequence_gap(expected_seq: u32, actual_seq: u32, gap_size: u32) -> Self {
        GsdvError::Protocol {
            code: "PROTO-004",
            source: ProtocolError::SequenceGap {
                expected_seq,
                actual_seq,
                gap_size,
                context: ErrorContext { protocol: Some("RDT"), ..Default::default() },
            },
        }
    }

    pub fn http_calibration(host: impl Into<String>, reason: impl Into<String>) -> Self {
        let host = host.into();
        GsdvError::Calibration {
            code: "CAL-001",
            source: CalibrationError::Http {
                context: ErrorContext { host: Some(host.clone()), port: Some(80), protocol: Some("HTTP"), ..Default::default() },
                host,
                reason: reason.into(),
            },
        }
    }

    pub fn tcp_calibration(host: impl Into<String>, port: u16, reason: impl Into<String>) -> Self {
        let host = host.into();
        GsdvError::Calibration {
            code: "CAL-002",
            source: CalibrationError::Tcp {
                context: ErrorContext { host: Some(host.clone()), port: Some(port), protocol: Some("TCP"), ..Default::default() },
                host,
                port,
                reason: reason.into(),
            },
        }
    }

    pub fn calibration_parse(protocol: &'static str, field: &'static str, reason: impl Into<String>) -> Self {
        GsdvError::Calibration {
            code: "CAL-003",
            source: CalibrationError::Parse { protocol, field, reason: reason.into(), context: ErrorContext::default() },
        }
    }

    pub fn calibration_unavailable(host: impl Into<String>, http_error: Option<String>, tcp_error: Option<String>) -> Self {
        let host = host.into();
        let mut parts = Vec::new();
        if let Some(e) = &http_error {
            parts.push(format!("HTTP: {e}"));
        }
        if let Some(e) = &tcp_error {
            parts.push(format!("TCP: {e}"));
        }
        let detail = if parts.is_empty() { "Unknown reason".to_string() } else { parts.join("; ") };
        GsdvError::Calibration {
            code: "CAL-004",
            source: CalibrationError::Unavailable {
                context: ErrorContext { host: Some(host.clone()), ..Default::default() },
                host,
                detail,
            },
        }
    }

    pub fn bias(host: impl Into<String>, mode: &'static str, detail: impl Into<String>) -> Self {
        let host = host.into();
        GsdvError::Calibration {
            code: "CAL-005",
            source: CalibrationError::Bias {
                context: ErrorContext { host: Some(host.clone()), ..Default::default() },
                host,
                mode,
                detail: detail.into(),
            },
        }
    }

    pub fn directory_not_writable(path: impl Into<String>) -> Self {
        let path = path.into();
        GsdvError::Io {
            code: "IO-001",
            source: IoCategoryError::DirectoryNotWritable { context: ErrorContext::path(path.clone()), path },
        }
    }

    pub fn disk_full(path: impl Into<String>) -> Self {
        let path = path.into();
        GsdvError::Io {
            code: "IO-002",
            source: IoCategoryError::DiskFull { context: ErrorContext::path(path.clone()), path },
        }
    }

    pub fn log_rotation(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        GsdvError::Io {
            code: "IO-003",
            source: IoCategoryError::LogRotation { context: ErrorContext::path(path.clone()), path, reason: reason.into() },
        }
    }

    pub fn file_write(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        GsdvError::Io {
            code: "IO-004",
            source: IoCategoryError::FileWrite { context: ErrorContext::path(path.clone()), path, reason: reason.into() },
        }
    }

    pub fn file_close(path: impl Into<String>, reason: impl Into<String>) -> Self {
        let path = path.into();
        GsdvError::Io {
            code: "IO-005",
            source: IoCategoryError::FileClose { context: ErrorContext::path(path.clone()), path, reason: reason.into() },
        }
    }
}

pub type Result<T> = std::result::Result<T, GsdvError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disk_full_has_choose_directory_recovery() {
        let e = GsdvError::disk_full("/data/out.csv");
        assert_eq!(e.code(), "IO-002");
        assert_eq!(e.recovery(), RecoveryAction::ChooseDirectory);
    }

    #[test]
    fn sequence_gap_recovery_is_manual() {
        let e = GsdvError::sequence_gap(5, 8, 2);
        assert_eq!(e.code(), "PROTO-004");
        assert_eq!(e.recovery(), RecoveryAction::Manual);
    }
}
