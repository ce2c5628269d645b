//! Engineering-unit conversion (§6.4). Canonical internal units are N and
//! N·m; device-reported unit codes are converted to canonical before use.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceUnit {
    Lbf,
    Newton,
    Kgf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TorqueUnit {
    LbfIn,
    LbfFt,
    NewtonMeter,
    NewtonMillimeter,
}

impl ForceUnit {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(ForceUnit::Lbf),
            2 => Some(ForceUnit::Newton),
            5 => Some(ForceUnit::Kgf),
            _ => None,
        }
    }

    /// Multiplier to convert a value in this unit to newtons.
    pub fn to_newton_factor(self) -> f64 {
        match self {
            ForceUnit::Lbf => 4.448_221_615_260_5,
            ForceUnit::Newton => 1.0,
            ForceUnit::Kgf => 9.806_65,
        }
    }
}

impl TorqueUnit {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(TorqueUnit::LbfIn),
            2 => Some(TorqueUnit::LbfFt),
            3 => Some(TorqueUnit::NewtonMeter),
            4 => Some(TorqueUnit::NewtonMillimeter),
            _ => None,
        }
    }

    /// Multiplier to convert a value in this unit to newton-meters.
    pub fn to_newton_meter_factor(self) -> f64 {
        match self {
            TorqueUnit::LbfIn => 0.112_984_829_027_616_7,
            TorqueUnit::LbfFt => 1.355_817_948_331_400_4,
            TorqueUnit::NewtonMeter => 1.0,
            TorqueUnit::NewtonMillimeter => 0.001,
        }
    }
}

pub fn force_to_newtons(value: f64, unit: ForceUnit) -> f64 {
    value * unit.to_newton_factor()
}

pub fn torque_to_newton_meters(value: f64, unit: TorqueUnit) -> f64 {
    value * unit.to_newton_meter_factor()
}

/// Converts a force value from newtons to `unit`.
pub fn force_from_newtons(newtons: f64, unit: ForceUnit) -> f64 {
    newtons / unit.to_newton_factor()
}

/// Converts a torque value from newton-meters to `unit`.
pub fn torque_from_newton_meters(newton_meters: f64, unit: TorqueUnit) -> f64 {
    newton_meters / unit.to_newton_meter_factor()
}

/// Converts a force value between any two supported units via newtons.
pub fn convert_force(value: f64, from: ForceUnit, to: ForceUnit) -> f64 {
    if from == to {
        return value;
    }
    force_from_newtons(force_to_newtons(value, from), to)
}

/// Converts a torque value between any two supported units via newton-meters.
pub fn convert_torque(value: f64, from: TorqueUnit, to: TorqueUnit) -> f64 {
    if from == to {
        return value;
    }
    torque_from_newton_meters(torque_to_newton_meters(value, from), to)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lbf_converts_to_newtons() {
        let n = force_to_newtons(1.0, ForceUnit::Lbf);
        assert!((n - 4.448_221_615_260_5).abs() < 1e-12);
    }

    #[test]
    fn newton_millimeter_converts_to_newton_meter() {
        let nm = torque_to_newton_meters(1000.0, TorqueUnit::NewtonMillimeter);
        assert!((nm - 1.0).abs() < 1e-12);
    }

    #[test]
    fn unit_codes_map_to_expected_variants() {
        assert_eq!(ForceUnit::from_code(2), Some(ForceUnit::Newton));
        assert_eq!(TorqueUnit::from_code(3), Some(TorqueUnit::NewtonMeter));
        assert_eq!(ForceUnit::from_code(99), None);
    }

    #[test]
    fn force_round_trips_through_every_unit_pair() {
        let units = [ForceUnit::Lbf, ForceUnit::Newton, ForceUnit::Kgf];
        let x = 12.345;
        for &u in &units {
            for &v in &units {
                let round_tripped = convert_force(convert_force(x, u, v), v, u);
                assert!((round_tripped - x).abs() / x.abs() < 1e-10, "{u:?} <-> {v:?}");
            }
        }
    }

    #[test]
    fn torque_round_trips_through_every_unit_pair() {
        let units = [TorqueUnit::LbfIn, TorqueUnit::LbfFt, TorqueUnit::NewtonMeter, TorqueUnit::NewtonMillimeter];
        let x = 7.89;
        for &u in &units {
            for &v in &units {
                let round_tripped = convert_torque(convert_torque(x, u, v), v, u);
                assert!((round_tripped - x).abs() / x.abs() < 1e-10, "{u:?} <-> {v:?}");
            }
        }
    }
}
