//! Reactor readings, operator controls and the per-tick physics step.
//!
//! The physics here is a deliberately coarse approximation: every output of a
//! tick is computed from the previous reading and the current operator
//! controls, with a little jitter drawn from an injected random source so the
//! whole step is reproducible under a seeded RNG.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Physical constants and floors for the simulated core
pub mod constants {
    /// Absolute temperature floor [°C]
    pub const MIN_TEMPERATURE_C: f64 = 20.0;
    /// Primary circuit pressure floor [Bar]
    pub const MIN_PRESSURE_BAR: f64 = 1.0;
    /// Radiation flux floor [µSv/h]
    pub const MIN_RADIATION_USV: f64 = 0.1;

    /// Operating pressure with zero heat rise [Bar]
    pub const BASE_PRESSURE_BAR: f64 = 150.0;
    /// Normal containment atmosphere [kPa]
    pub const BASE_AIR_KPA: f64 = 101.3;
    /// Above this core temperature the containment starts to pressurize [°C]
    pub const AIR_PRESSURIZATION_TEMP_C: f64 = 500.0;

    /// Flow setting at which the pumps exactly balance heat generation [%]
    pub const BALANCED_FLOW_PERCENT: f64 = 80.0;
    /// Rod insertion at which the core is exactly critical [%]
    pub const BALANCED_ROD_PERCENT: f64 = 30.0;
    /// Fixed heat rise while SCRAM is latched
    pub const SCRAM_RISE: f64 = -35.0;

    /// Default length of the SCRAM pulse
    pub const SCRAM_WINDOW_MS: u64 = 5_000;
}

use constants::*;

/// One immutable telemetry snapshot, produced once per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sequence: u64,
    pub temperature: f64,   // [°C]
    pub pressure: f64,      // [Bar]
    pub radiation: f64,     // [µSv/h]
    pub air: f64,           // Containment air pressure [kPa]
    pub coolant_flow: f64,  // [m³/s]
}

impl Reading {
    /// Baseline the plant starts from before the first tick
    pub fn baseline() -> Self {
        Self {
            sequence: 0,
            temperature: 300.0,
            pressure: 150.0,
            radiation: 12.5,
            air: 101.3,
            coolant_flow: 850.0,
        }
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Clamp an operator percentage to [0, 100]. NaN is treated as 0.
pub fn clamp_percent(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 100.0)
}

/// Effective control values for a single tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ControlInputs {
    pub flow_power: f64,     // Coolant pump power [%]
    pub rod_insertion: f64,  // Control rod insertion [%]
    pub scram: bool,
}

/// Operator controls: two sliders plus a time-limited SCRAM pulse
#[derive(Debug, Clone)]
pub struct Controls {
    flow_power: f64,
    rod_insertion: f64,
    scram_until: Option<Instant>,
}

impl Default for Controls {
    fn default() -> Self {
        Self {
            flow_power: BALANCED_FLOW_PERCENT,
            rod_insertion: BALANCED_ROD_PERCENT,
            scram_until: None,
        }
    }
}

impl Controls {
    pub fn flow_power(&self) -> f64 {
        self.flow_power
    }

    pub fn rod_insertion(&self) -> f64 {
        self.rod_insertion
    }

    pub fn set_flow_power(&mut self, percent: f64) {
        self.flow_power = clamp_percent(percent);
    }

    pub fn set_rod_insertion(&mut self, percent: f64) {
        self.rod_insertion = clamp_percent(percent);
    }

    /// Latch SCRAM until `now + window` and drive both sliders to saturation.
    /// Re-triggering while latched extends the pulse.
    pub fn trigger_scram(&mut self, now: Instant, window: Duration) {
        self.flow_power = 100.0;
        self.rod_insertion = 100.0;
        let until = now + window;
        self.scram_until = Some(match self.scram_until {
            Some(existing) if existing > until => existing,
            _ => until,
        });
    }

    /// Whether the SCRAM pulse is still in effect at `now`
    pub fn is_scrammed(&self, now: Instant) -> bool {
        matches!(self.scram_until, Some(until) if now < until)
    }

    /// Drop an expired SCRAM latch. Returns true if the pulse ended here.
    ///
    /// Sliders are left where they are; after the pulse they are back at
    /// operator discretion.
    pub fn release_expired_scram(&mut self, now: Instant) -> bool {
        match self.scram_until {
            Some(until) if now >= until => {
                self.scram_until = None;
                true
            }
            _ => false,
        }
    }

    pub fn inputs(&self, now: Instant) -> ControlInputs {
        ControlInputs {
            flow_power: self.flow_power,
            rod_insertion: self.rod_insertion,
            scram: self.is_scrammed(now),
        }
    }
}

/// Net heat rise for the given controls
pub fn heat_rise(controls: &ControlInputs) -> f64 {
    if controls.scram {
        return SCRAM_RISE;
    }
    (BALANCED_FLOW_PERCENT - controls.flow_power) * 0.4
        + (BALANCED_ROD_PERCENT - controls.rod_insertion) * 0.7
}

/// Compute the next reading from the previous one.
///
/// Every channel is derived from `previous` and `controls` only; no channel
/// feeds another within the same tick except the containment air term, which
/// follows the new core temperature.
pub fn step<R: Rng>(previous: &Reading, controls: &ControlInputs, rng: &mut R) -> Reading {
    let rise = heat_rise(controls);

    let jitter: f64 = rng.gen_range(-0.5..0.5);
    let flux_noise: f64 = rng.gen_range(0.0..5.0);
    let flow_noise: f64 = rng.gen_range(0.0..10.0);

    let temperature = (previous.temperature + rise * 0.25 + jitter).max(MIN_TEMPERATURE_C);
    let pressure = (BASE_PRESSURE_BAR + rise * 0.6).max(MIN_PRESSURE_BAR);
    let radiation = ((100.0 - controls.rod_insertion) * 2.8 + flux_noise).max(MIN_RADIATION_USV);
    let air = BASE_AIR_KPA
        + if temperature > AIR_PRESSURIZATION_TEMP_C {
            (temperature - AIR_PRESSURIZATION_TEMP_C) * 0.08
        } else {
            0.0
        };
    let coolant_flow = controls.flow_power * 12.5 + flow_noise;

    Reading {
        sequence: previous.sequence + 1,
        temperature,
        pressure,
        radiation,
        air,
        coolant_flow,
    }
}

/// Absolute core temperature change between two consecutive readings
pub fn anomaly_score(previous: &Reading, next: &Reading) -> f64 {
    (next.temperature - previous.temperature).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn inputs(flow: f64, rods: f64, scram: bool) -> ControlInputs {
        ControlInputs { flow_power: flow, rod_insertion: rods, scram }
    }

    #[test]
    fn balanced_controls_hold_temperature() {
        let mut rng = StdRng::seed_from_u64(7);
        let prev = Reading::baseline();
        let next = step(&prev, &inputs(80.0, 30.0, false), &mut rng);

        assert_eq!(next.sequence, 1);
        assert!((next.temperature - 300.0).abs() <= 0.5);
        assert_eq!(next.pressure, 150.0);
        assert_eq!(next.air, BASE_AIR_KPA);
        assert!(next.radiation >= 196.0 && next.radiation < 201.0);
        assert!(next.coolant_flow >= 1000.0 && next.coolant_flow < 1010.0);
    }

    #[test]
    fn scram_overrides_rise() {
        assert_eq!(heat_rise(&inputs(0.0, 0.0, true)), SCRAM_RISE);
        assert!((heat_rise(&inputs(100.0, 100.0, false)) + 57.0).abs() < 1e-9);

        let mut rng = StdRng::seed_from_u64(1);
        let prev = Reading { temperature: 400.0, ..Reading::baseline() };
        let next = step(&prev, &inputs(100.0, 100.0, true), &mut rng);
        // -35 * 0.25 = -8.75, plus jitter in [-0.5, 0.5)
        assert!(next.temperature < 400.0 - 8.25 && next.temperature >= 400.0 - 9.25);
        assert!((next.pressure - 129.0).abs() < 1e-9);
    }

    #[test]
    fn hot_core_pressurizes_containment() {
        let mut rng = StdRng::seed_from_u64(3);
        let prev = Reading { temperature: 700.0, ..Reading::baseline() };
        let next = step(&prev, &inputs(80.0, 30.0, false), &mut rng);
        let expected = BASE_AIR_KPA + (next.temperature - 500.0) * 0.08;
        assert!((next.air - expected).abs() < 1e-9);
    }

    #[test]
    fn same_seed_same_reading() {
        let prev = Reading::baseline();
        let c = inputs(40.0, 10.0, false);
        let a = step(&prev, &c, &mut StdRng::seed_from_u64(42));
        let b = step(&prev, &c, &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn clamp_percent_bounds() {
        assert_eq!(clamp_percent(-5.0), 0.0);
        assert_eq!(clamp_percent(250.0), 100.0);
        assert_eq!(clamp_percent(f64::NAN), 0.0);
        assert_eq!(clamp_percent(42.5), 42.5);
    }

    #[test]
    fn scram_pulse_expires() {
        let t0 = Instant::now();
        let mut controls = Controls::default();
        controls.set_flow_power(10.0);
        controls.trigger_scram(t0, Duration::from_secs(5));

        assert!(controls.is_scrammed(t0));
        assert_eq!(controls.flow_power(), 100.0);
        assert_eq!(controls.rod_insertion(), 100.0);
        assert!(controls.is_scrammed(t0 + Duration::from_millis(4_999)));
        assert!(!controls.release_expired_scram(t0 + Duration::from_secs(4)));
        assert!(!controls.is_scrammed(t0 + Duration::from_secs(5)));
        assert!(controls.release_expired_scram(t0 + Duration::from_secs(5)));
        assert_eq!(controls.rod_insertion(), 100.0);
    }

    proptest! {
        #[test]
        fn floors_hold_for_valid_controls(
            flow in 0.0f64..=100.0,
            rods in 0.0f64..=100.0,
            scram in any::<bool>(),
            temp in 20.0f64..2000.0,
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let prev = Reading { temperature: temp, ..Reading::baseline() };
            let next = step(&prev, &inputs(flow, rods, scram), &mut rng);
            prop_assert!(next.temperature >= MIN_TEMPERATURE_C);
            prop_assert!(next.pressure >= MIN_PRESSURE_BAR);
            prop_assert!(next.radiation >= MIN_RADIATION_USV);
            prop_assert!(next.sequence > prev.sequence);
        }
    }
}
