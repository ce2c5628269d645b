//! In-process RDT sensor emulator (§4.12). A UDP server thread answers
//! `START_REALTIME`/`STOP`/`SET_BIAS` requests with synthetic 36-byte
//! responses at a configurable rate, using `spin_sleep::SpinSleeper` for
//! release-time discipline exactly as the teacher's `Sensor::run` does for
//! its periodic sample release.

use std::net::UdpSocket;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::debug;
use spin_sleep::{SpinSleeper, SpinStrategy};

use crate::wire::rdt::{build_response, parse_request, RdtCommand};

/// Emulates one sensor endpoint bound to a local UDP port.
pub struct SensorSimulator {
    local_addr: std::net::SocketAddr,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SensorSimulator {
    /// Bind to `bind_addr` (e.g. `"127.0.0.1:49152"`) and start answering
    /// RDT requests at `rate_hz`, synthesizing a slowly varying counts
    /// waveform so consumers see non-trivial signal.
    pub fn start(bind_addr: &str, rate_hz: f64) -> std::io::Result<Self> {
        let socket = UdpSocket::bind(bind_addr)?;
        let local_addr = socket.local_addr()?;
        let running = Arc::new(AtomicBool::new(true));
        let running_for_thread = running.clone();

        let handle = thread::Builder::new()
            .name("gsdv-sim-sensor".into())
            .spawn(move || run_server(socket, running_for_thread, rate_hz))
            .expect("failed to spawn sensor simulator thread");

        Ok(Self { local_addr, running, handle: Some(handle) })
    }

    pub fn local_addr(&self) -> std::net::SocketAddr {
        self.local_addr
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for SensorSimulator {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_server(socket: UdpSocket, running: Arc<AtomicBool>, rate_hz: f64) {
    socket.set_read_timeout(Some(Duration::from_millis(100))).ok();

    let period = Duration::from_secs_f64(1.0 / rate_hz.max(1.0));
    let sleeper = SpinSleeper::new(100_000).with_spin_strategy(SpinStrategy::YieldThread);

    let mut req_buf = [0u8; 64];
    let mut streaming = false;
    let mut peer = None;
    let mut rdt_seq: u32 = 0;
    let mut ft_seq: u32 = 0;
    let mut next_deadline = Instant::now() + period;

    while running.load(Ordering::SeqCst) {
        match socket.recv_from(&mut req_buf) {
            Ok((n, from)) => {
                if let Ok((command, _sample_count)) = parse_request(&req_buf[..n]) {
                    peer = Some(from);
                    match command {
                        RdtCommand::StartRealtime | RdtCommand::StartBuffered => {
                            streaming = true;
                            next_deadline = Instant::now() + period;
                        }
                        RdtCommand::Stop => streaming = false,
                        RdtCommand::SetBias => {
                            rdt_seq = 0;
                            ft_seq = 0;
                        }
                    }
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(_) => break,
        }

        if streaming {
            if let Some(to) = peer {
                let now = Instant::now();
                if now < next_deadline {
                    sleeper.sleep(next_deadline - now);
                }

                rdt_seq = rdt_seq.wrapping_add(1);
                ft_seq = ft_seq.wrapping_add(1);
                let phase = (rdt_seq % 1000) as i32;
                let counts = [phase * 10, phase * 5, phase * 2, phase, phase / 2, phase / 4];
                let sample = crate::models::Sample::raw(0, rdt_seq, ft_seq, 0, counts);

                if socket.send_to(&build_response(&sample), to).is_err() {
                    streaming = false;
                }

                next_deadline += period;
            }
        }
    }

    debug!("sensor simulator stopped after {rdt_seq} samples");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::rdt::build_request;
    use std::net::UdpSocket as ClientSocket;

    #[test]
    fn streams_samples_after_start_realtime() {
        let mut sim = SensorSimulator::start("127.0.0.1:0", 200.0).unwrap();
        let client = ClientSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_millis(500))).ok();

        let request = build_request(RdtCommand::StartRealtime, 0);
        client.send_to(&request, sim.local_addr()).unwrap();

        let mut buf = [0u8; 64];
        let (n, _) = client.recv_from(&mut buf).unwrap();
        assert_eq!(n, 36);

        sim.stop();
    }

    #[test]
    fn stops_streaming_on_stop_command() {
        let mut sim = SensorSimulator::start("127.0.0.1:0", 500.0).unwrap();
        let client = ClientSocket::bind("127.0.0.1:0").unwrap();
        client.set_read_timeout(Some(Duration::from_millis(200))).ok();

        client.send_to(&build_request(RdtCommand::StartRealtime, 0), sim.local_addr()).unwrap();
        let mut buf = [0u8; 64];
        client.recv_from(&mut buf).unwrap();

        client.send_to(&build_request(RdtCommand::Stop, 0), sim.local_addr()).unwrap();
        thread::sleep(Duration::from_millis(50));

        // Drain anything already in flight, then confirm no more arrive.
        while client.recv_from(&mut buf).is_ok() {}
        let result = client.recv_from(&mut buf);
        assert!(result.is_err());

        sim.stop();
    }
}
