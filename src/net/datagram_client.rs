//! RDT datagram client (§4.2): opens a socket bound to an ephemeral local
//! port with a 2 MiB receive buffer, sends start/stop/bias control
//! commands, and receives samples while tracking wrap-safe sequence-gap
//! loss.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::{Duration, Instant};

use socket2::{Domain, Socket, Type};

use crate::error::{GsdvError, Result};
use crate::models::Sample;
use crate::wire::rdt::{self, RdtCommand, RDT_RESPONSE_SIZE};

const RECEIVE_BUFFER_BYTES: usize = 2 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct RdtStatistics {
    pub packets_received: u64,
    pub packets_lost: u64,
    pub last_rdt_sequence: Option<u32>,
}

pub struct RdtClient {
    socket: UdpSocket,
    peer: SocketAddr,
    host: String,
    port: u16,
    stats: RdtStatistics,
    start_instant: Instant,
}

impl RdtClient {
    /// Open a UDP socket bound to an ephemeral local port, sized to a
    /// 2 MiB receive buffer, and connect it to `host:port`.
    pub fn connect(host: &str, port: u16) -> Result<Self> {
        let peer = (host, port)
            .to_socket_addrs()
            .map_err(|e| GsdvError::socket(host, port, "resolve", e))?
            .next()
            .ok_or_else(|| GsdvError::connection_refused(host, port))?;

        let domain = if peer.is_ipv6() { Domain::IPV6 } else { Domain::IPV4 };
        let socket = Socket::new(domain, Type::DGRAM, None).map_err(|e| GsdvError::socket(host, port, "create", e))?;
        socket
            .set_recv_buffer_size(RECEIVE_BUFFER_BYTES)
            .map_err(|e| GsdvError::socket(host, port, "set_recv_buffer_size", e))?;
        let bind_addr: SocketAddr = if peer.is_ipv6() { "[::]:0".parse().unwrap() } else { "0.0.0.0:0".parse().unwrap() };
        socket.bind(&bind_addr.into()).map_err(|e| GsdvError::socket(host, port, "bind", e))?;
        socket.connect(&peer.into()).map_err(|e| GsdvError::socket(host, port, "connect", e))?;

        let socket: UdpSocket = socket.into();

        Ok(Self {
            socket,
            peer,
            host: host.to_string(),
            port,
            stats: RdtStatistics::default(),
            start_instant: Instant::now(),
        })
    }

    pub fn statistics(&self) -> RdtStatistics {
        self.stats
    }

    fn send_command(&self, command: RdtCommand, sample_count: u32) -> Result<()> {
        let req = rdt::build_request(command, sample_count);
        self.socket.send(&req).map_err(|e| GsdvError::socket(&self.host, self.port, "send", e))?;
        Ok(())
    }

    /// Send `START_REALTIME` with the given sample count (0 = open-ended).
    pub fn start_streaming(&self, sample_count: u32) -> Result<()> {
        self.send_command(RdtCommand::StartRealtime, sample_count)
    }

    pub fn stop_streaming(&self) -> Result<()> {
        self.send_command(RdtCommand::Stop, 0)
    }

    pub fn send_bias(&self) -> Result<()> {
        self.send_command(RdtCommand::SetBias, 0)
    }

    /// Receive up to `max` samples, waiting no longer than `timeout` total
    /// for the batch. Malformed packets are reported as protocol errors
    /// via `on_protocol_error` and skipped, per §4.2 step 2. Returns once
    /// `max` samples are gathered or the per-call deadline elapses.
    pub fn receive_batch(&mut self, timeout: Duration, max: usize, mut on_protocol_error: impl FnMut(GsdvError)) -> Vec<Sample> {
        let deadline = Instant::now() + timeout;
        let mut out = Vec::with_capacity(max);
        let mut buf = [0u8; RDT_RESPONSE_SIZE + 64];

        while out.len() < max {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            if self.socket.set_read_timeout(Some(remaining)).is_err() {
                break;
            }
            match self.socket.recv(&mut buf) {
                Ok(n) => {
                    let t_monotonic_ns = self.start_instant.elapsed().as_nanos() as u64;
                    match rdt::parse_response(&buf[..n], t_monotonic_ns) {
                        Ok(sample) => {
                            self.stats.packets_received += 1;
                            if let Some(last) = self.stats.last_rdt_sequence {
                                let lost = rdt::gap_since(last, sample.rdt_sequence);
                                self.stats.packets_lost += lost as u64;
                            }
                            self.stats.last_rdt_sequence = Some(sample.rdt_sequence);
                            out.push(sample);
                        }
                        Err(e) => on_protocol_error(e),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => break,
                Err(_) => break,
            }
        }
        out
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::rdt::build_response;
    use std::net::UdpSocket as StdUdpSocket;

    #[test]
    fn connect_binds_ephemeral_port_and_tracks_loss() {
        let server = StdUdpSocket::bind("127.0.0.1:0").unwrap();
        let server_addr = server.local_addr().unwrap();
        let mut client = RdtClient::connect("127.0.0.1", server_addr.port()).unwrap();

        let sample1 = Sample::raw(0, 1, 1, 0, [0; 6]);
        let sample2 = Sample::raw(0, 3, 2, 0, [0; 6]); // seq gap: 2 missing

        let client_addr = server.local_addr().unwrap(); // placeholder, real reply target resolved via recv
        let _ = client_addr;
        // Server learns the client's ephemeral address from its first send.
        client.send_bias().unwrap();
        let mut probe = [0u8; 8];
        let (_, from) = server.recv_from(&mut probe).unwrap();

        server.send_to(&build_response(&sample1), from).unwrap();
        server.send_to(&build_response(&sample2), from).unwrap();

        let batch = client.receive_batch(Duration::from_millis(200), 10, |e| panic!("{e}"));
        assert_eq!(batch.len(), 2);
        assert_eq!(client.statistics().packets_received, 2);
        assert_eq!(client.statistics().packets_lost, 1);
    }
}
