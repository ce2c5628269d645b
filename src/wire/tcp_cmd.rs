//! Stream command channel codec, §4.1 / §6.2: 20-byte requests, 24-byte
//! `READ_CALINFO` response. Grounded in the ATI NETrs TCP command protocol.

use crate::error::{GsdvError, Result};
use crate::models::Calibration;
use crate::wire::WIRE_HEADER;

pub const CALINFO_REQUEST_SIZE: usize = 20;
pub const CALINFO_RESPONSE_SIZE: usize = 24;
pub const TRANSFORM_REQUEST_SIZE: usize = 20;
pub const READFT_REQUEST_SIZE: usize = 20;

const DIST_UNITS_MM: u8 = 3;
const ANGLE_UNITS_DEG: u8 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TcpCommand {
    ReadFt = 0x00,
    ReadCalInfo = 0x01,
    WriteTransform = 0x02,
}

/// Tool transform parameters: distances in mm, angles in degrees.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToolTransform {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
}

/// Representable range for a transform coordinate once scaled by 100 into
/// a signed 16-bit integer: `[-327.68, +327.67]`.
pub const TRANSFORM_COORD_MIN: f64 = -327.68;
pub const TRANSFORM_COORD_MAX: f64 = 327.67;

pub fn build_calinfo_request() -> [u8; CALINFO_REQUEST_SIZE] {
    let mut req = [0u8; CALINFO_REQUEST_SIZE];
    req[0] = TcpCommand::ReadCalInfo as u8;
    req
}

pub fn parse_calinfo_response(data: &[u8]) -> Result<Calibration> {
    if data.len() != CALINFO_RESPONSE_SIZE {
        return Err(GsdvError::malformed_packet("TCP calinfo", CALINFO_RESPONSE_SIZE, data.len()));
    }
    let header = u16::from_be_bytes([data[0], data[1]]);
    if header != WIRE_HEADER {
        return Err(GsdvError::invalid_header("TCP calinfo", format!("0x{WIRE_HEADER:04X}"), format!("0x{header:04X}")));
    }
    let force_units_code = data[2] as u16;
    let torque_units_code = data[3] as u16;
    let counts_per_force = u32::from_be_bytes(data[4..8].try_into().unwrap()) as f64;
    let counts_per_torque = u32::from_be_bytes(data[8..12].try_into().unwrap()) as f64;

    let mut cal = Calibration::new(counts_per_force, counts_per_torque);
    cal.force_units_code = Some(force_units_code);
    cal.torque_units_code = Some(torque_units_code);
    Ok(cal)
}

/// Build a `WRITE_TRANSFORM` request. Each coordinate is packed as
/// `round(x * 100)` into a signed 16-bit field; out-of-range coordinates
/// are rejected per the §8 boundary test (`+327.67` ok, `+327.68` rejected).
pub fn build_transform_request(transform: &ToolTransform) -> Result<[u8; TRANSFORM_REQUEST_SIZE]> {
    let coords = [transform.dx, transform.dy, transform.dz, transform.rx, transform.ry, transform.rz];
    let mut scaled = [0i16; 6];
    for (i, &x) in coords.iter().enumerate() {
        if !(TRANSFORM_COORD_MIN..=TRANSFORM_COORD_MAX).contains(&x) {
            return Err(GsdvError::packet_parse(
                "TCP transform",
                "coordinate",
                format!("{x} outside representable range [{TRANSFORM_COORD_MIN}, {TRANSFORM_COORD_MAX}]"),
            ));
        }
        scaled[i] = (x * 100.0).round() as i16;
    }

    let mut req = [0u8; TRANSFORM_REQUEST_SIZE];
    req[0] = TcpCommand::WriteTransform as u8;
    req[1] = DIST_UNITS_MM;
    req[2] = ANGLE_UNITS_DEG;
    for (i, v) in scaled.iter().enumerate() {
        let start = 3 + i * 2;
        req[start..start + 2].copy_from_slice(&v.to_be_bytes());
    }
    Ok(req)
}

/// Build a `READFT` request with the bias/tare `sys_commands` bit set —
/// the TCP fallback for device bias when the UDP `SET_BIAS` path fails.
pub fn build_bias_request() -> [u8; READFT_REQUEST_SIZE] {
    let mut req = [0u8; READFT_REQUEST_SIZE];
    req[0] = TcpCommand::ReadFt as u8;
    // MCEnable at offset 16: 0x0000
    req[16..18].copy_from_slice(&0x0000u16.to_be_bytes());
    // sysCommands at offset 18: bit 0 = bias
    req[18..20].copy_from_slice(&0x0001u16.to_be_bytes());
    req
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calinfo_response_parses() {
        let mut data = [0u8; CALINFO_RESPONSE_SIZE];
        data[0..2].copy_from_slice(&WIRE_HEADER.to_be_bytes());
        data[2] = 2; // N
        data[3] = 3; // Nm
        data[4..8].copy_from_slice(&1000u32.to_be_bytes());
        data[8..12].copy_from_slice(&2000u32.to_be_bytes());
        let cal = parse_calinfo_response(&data).unwrap();
        assert_eq!(cal.counts_per_force, 1000.0);
        assert_eq!(cal.counts_per_torque, 2000.0);
        assert_eq!(cal.force_units_code, Some(2));
    }

    #[test]
    fn calinfo_rejects_bad_header() {
        let data = [0u8; CALINFO_RESPONSE_SIZE];
        let err = parse_calinfo_response(&data).unwrap_err();
        assert_eq!(err.code(), "PROTO-002");
    }

    #[test]
    fn transform_coordinate_at_boundary_succeeds() {
        let t = ToolTransform { dx: 327.67, ..Default::default() };
        assert!(build_transform_request(&t).is_ok());
    }

    #[test]
    fn transform_coordinate_past_boundary_rejects() {
        let t = ToolTransform { dx: 327.68, ..Default::default() };
        assert!(build_transform_request(&t).is_err());
    }

    #[test]
    fn bias_request_sets_sys_commands_bit() {
        let req = build_bias_request();
        assert_eq!(u16::from_be_bytes([req[18], req[19]]), 0x0001);
    }
}
