//! Core data types shared by every stage of the pipeline.

/// A single force/torque sample, raw from the wire or enriched by the
/// processing engine. Fields mirror §3 exactly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub t_monotonic_ns: u64,
    pub rdt_sequence: u32,
    pub ft_sequence: u32,
    pub status: u32,
    pub counts: [i32; 6],
    pub force_n: Option<[f64; 3]>,
    pub torque_nm: Option<[f64; 3]>,
}

impl Sample {
    pub fn raw(t_monotonic_ns: u64, rdt_sequence: u32, ft_sequence: u32, status: u32, counts: [i32; 6]) -> Self {
        Self {
            t_monotonic_ns,
            rdt_sequence,
            ft_sequence,
            status,
            counts,
            force_n: None,
            torque_nm: None,
        }
    }
}

/// Calibration data retrieved via HTTP (`/netftapi2.xml`) or the TCP
/// `READCALINFO` command. Immutable after fetch; the controller swaps it
/// atomically at rest.
#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub counts_per_force: f64,
    pub counts_per_torque: f64,
    pub serial_number: Option<String>,
    pub firmware_version: Option<String>,
    pub force_units_code: Option<u16>,
    pub torque_units_code: Option<u16>,
}

impl Calibration {
    pub fn new(counts_per_force: f64, counts_per_torque: f64) -> Self {
        Self {
            counts_per_force,
            counts_per_torque,
            serial_number: None,
            firmware_version: None,
            force_units_code: None,
            torque_units_code: None,
        }
    }

    /// Convert raw (already offset-adjusted) counts to SI units per §6.4.
    pub fn convert_counts_to_si(&self, counts: &[i32; 6]) -> ([f64; 3], [f64; 3]) {
        let force = [
            counts[0] as f64 / self.counts_per_force,
            counts[1] as f64 / self.counts_per_force,
            counts[2] as f64 / self.counts_per_force,
        ];
        let torque = [
            counts[3] as f64 / self.counts_per_torque,
            counts[4] as f64 / self.counts_per_torque,
            counts[5] as f64 / self.counts_per_torque,
        ];
        (force, torque)
    }
}

/// Application-level offset subtracted from counts before SI conversion,
/// independent of hardware tare. Absent means identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoftZeroOffsets {
    pub force_counts: [i32; 3],
    pub torque_counts: [i32; 3],
}

impl SoftZeroOffsets {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: &[i32; 6]) -> Self {
        Self {
            force_counts: [counts[0], counts[1], counts[2]],
            torque_counts: [counts[3], counts[4], counts[5]],
        }
    }

    /// Subtract this offset from raw counts, returning adjusted counts.
    pub fn apply(&self, counts: &[i32; 6]) -> [i32; 6] {
        [
            counts[0] - self.force_counts[0],
            counts[1] - self.force_counts[1],
            counts[2] - self.force_counts[2],
            counts[3] - self.torque_counts[0],
            counts[4] - self.torque_counts[1],
            counts[5] - self.torque_counts[2],
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn soft_zero_subtracts_per_channel() {
        let offsets = SoftZeroOffsets::from_counts(&[100, 200, 300, 400, 500, 600]);
        let adjusted = offsets.apply(&[1100, 1200, 1300, 1500, 1600, 1700]);
        assert_eq!(adjusted, [1000, 1000, 1000, 1100, 1100, 1100]);
    }

    #[test]
    fn calibration_converts_to_si() {
        let cal = Calibration::new(1000.0, 1000.0);
        let (force, torque) = cal.convert_counts_to_si(&[1000, 1000, 1000, 1100, 1100, 1100]);
        assert_eq!(force, [1.0, 1.0, 1.0]);
        assert_eq!(torque, [1.1, 1.1, 1.1]);
    }
}
