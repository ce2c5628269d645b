//! Local-subnet sensor discovery (§1, §6.6). This is explicitly an
//! "external collaborator" per the core/non-core split — the core
//! acquisition pipeline never calls into it — but the CLI's `discover`
//! subcommand needs *something* behind it, so a minimal best-effort probe
//! lives here rather than in the engine.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crate::config::RDT_PORT;

#[derive(Debug, Clone, Copy)]
pub struct Subnet {
    base: Ipv4Addr,
    prefix_len: u8,
}

impl FromStr for Subnet {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, String> {
        let (addr_part, prefix_part) = s.split_once('/').ok_or_else(|| format!("'{s}' is not in CIDR form (e.g. 192.168.1.0/24)"))?;
        let base: Ipv4Addr = addr_part.parse().map_err(|_| format!("'{addr_part}' is not a valid IPv4 address"))?;
        let prefix_len: u8 = prefix_part.parse().map_err(|_| format!("'{prefix_part}' is not a valid prefix length"))?;
        if prefix_len > 32 {
            return Err(format!("prefix length {prefix_len} exceeds 32"));
        }
        Ok(Subnet { base, prefix_len })
    }
}

impl Subnet {
    /// Host addresses in this subnet, excluding network/broadcast for
    /// prefixes shorter than /31.
    pub fn hosts(&self) -> Vec<Ipv4Addr> {
        let host_bits = 32 - self.prefix_len as u32;
        if host_bits == 0 {
            return vec![self.base];
        }
        let base_u32 = u32::from(self.base);
        let mask = if host_bits == 32 { 0 } else { !0u32 << host_bits };
        let network = base_u32 & mask;
        let count = 1u32 << host_bits;
        let (start, end) = if host_bits >= 2 { (1, count - 1) } else { (0, count) };
        (start..end).map(|i| Ipv4Addr::from(network + i)).collect()
    }
}

/// One detected sensor: its address and whether it answered a probe.
#[derive(Debug, Clone)]
pub struct DiscoveredSensor {
    pub ip: IpAddr,
}

/// Probe every host in `subnet` with a short-timeout `STOP` datagram and
/// collect the ones that answer. Best-effort: a host that doesn't
/// implement RDT is silently skipped, never treated as a hard error.
pub fn discover(subnet: &Subnet, per_host_timeout: Duration) -> Vec<DiscoveredSensor> {
    let mut found = Vec::new();
    for host in subnet.hosts() {
        if probe_host(host, per_host_timeout) {
            found.push(DiscoveredSensor { ip: IpAddr::V4(host) });
        }
    }
    found
}

fn probe_host(host: Ipv4Addr, timeout: Duration) -> bool {
    let Ok(socket) = UdpSocket::bind("0.0.0.0:0") else { return false };
    if socket.set_read_timeout(Some(timeout)).is_err() {
        return false;
    }
    let request = crate::wire::rdt::build_request(crate::wire::rdt::RdtCommand::Stop, 0);
    if socket.send_to(&request, (host, RDT_PORT)).is_err() {
        return false;
    }
    let mut buf = [0u8; 64];
    thread::sleep(Duration::from_millis(1));
    socket.recv_from(&mut buf).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_cidr() {
        let subnet: Subnet = "192.168.1.0/24".parse().unwrap();
        assert_eq!(subnet.hosts().len(), 254);
    }

    #[test]
    fn rejects_malformed_subnet() {
        let result: Result<Subnet, _> = "not-a-subnet".parse();
        assert!(result.is_err());
    }
}
