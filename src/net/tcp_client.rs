//! Stream command channel client (§4.1, §6.2): calibration retrieval,
//! tool transform, and the TCP bias fallback.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use crate::error::{GsdvError, Result};
use crate::models::Calibration;
use crate::wire::tcp_cmd::{self, ToolTransform, CALINFO_RESPONSE_SIZE};

pub struct TcpCommandClient {
    stream: TcpStream,
    host: String,
    port: u16,
}

impl TcpCommandClient {
    pub fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{host}:{port}");
        let stream = TcpStream::connect(&addr).map_err(|e| GsdvError::socket(host, port, "connect", e))?;
        stream.set_read_timeout(Some(timeout)).ok();
        stream.set_write_timeout(Some(timeout)).ok();
        Ok(Self { stream, host: host.to_string(), port })
    }

    fn send_receive(&mut self, request: &[u8], response_size: usize) -> Result<Vec<u8>> {
        self.stream.write_all(request).map_err(|e| GsdvError::socket(&self.host, self.port, "send", e))?;
        let mut response = vec![0u8; response_size];
        self.stream.read_exact(&mut response).map_err(|e| GsdvError::socket(&self.host, self.port, "recv", e))?;
        Ok(response)
    }

    pub fn read_calibration(&mut self) -> Result<Calibration> {
        let request = tcp_cmd::build_calinfo_request();
        let response = self.send_receive(&request, CALINFO_RESPONSE_SIZE)?;
        tcp_cmd::parse_calinfo_response(&response)
    }

    pub fn write_transform(&mut self, transform: &ToolTransform) -> Result<()> {
        let request = tcp_cmd::build_transform_request(transform)?;
        self.stream.write_all(&request).map_err(|e| GsdvError::socket(&self.host, self.port, "send", e))?;
        Ok(())
    }

    /// TCP fallback for bias/tare (§4.9 step 2).
    pub fn send_bias(&mut self) -> Result<()> {
        let request = tcp_cmd::build_bias_request();
        self.stream.write_all(&request).map_err(|e| GsdvError::socket(&self.host, self.port, "send", e))?;
        Ok(())
    }
}
