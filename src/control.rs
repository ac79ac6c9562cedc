//! The charge cycle engine.
//!
//! One cycle: wait, temperature guards, a randomized maximum power point
//! probe (sample the panel with the setpoint nudged down, then nudged up),
//! apply the best of baseline/decreased/increased, then measure the battery
//! behind its sense gate and classify what the charger chip is doing.
//!
//! The engine is a cooperative state machine. [`ChargeController::tick`]
//! performs at most one phase transition and returns, so it can share a
//! loop with anything else; all probe state lives in the struct, never on
//! the stack across a wait.

use crate::adc::AnalogSensor;
use crate::config::*;
use crate::hal::ChargerHal;
use crate::rand::StepLfsr;
use crate::stat::{self, ChipChargeState};
use crate::status::ChargeStatus;

/// Overall charging state, as reported to the outside.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChargingState {
    NotCharging,
    /// Charging, or charge complete.
    Charging,
}

impl ChargingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChargingState::NotCharging => "not-charging",
            ChargingState::Charging => "charging",
        }
    }
}

/// Why charging is not proceeding. Only meaningful while not charging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotChargingReason {
    Unknown,
    BatteryTempTooHigh,
    BatteryTempTooLow,
    ChargerTempTooHigh,
    SolarVoltageTooLow,
    /// Battery voltage below the plausible minimum, the pack itself is
    /// suspect.
    BatteryError,
}

impl NotChargingReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotChargingReason::Unknown => "unknown",
            NotChargingReason::BatteryTempTooHigh => "batt-too-hot",
            NotChargingReason::BatteryTempTooLow => "batt-too-cold",
            NotChargingReason::ChargerTempTooHigh => "charger-too-hot",
            NotChargingReason::SolarVoltageTooLow => "solar-too-low",
            NotChargingReason::BatteryError => "batt-error",
        }
    }

    /// Temperature faults are the ones that park the charge path at zero
    /// current until conditions normalize.
    pub fn is_temperature_fault(&self) -> bool {
        matches!(
            self,
            NotChargingReason::BatteryTempTooHigh
                | NotChargingReason::BatteryTempTooLow
                | NotChargingReason::ChargerTempTooHigh
        )
    }
}

/// Resumption points of the cycle. `Init` doubles as the first-entry
/// sentinel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Init,
    /// Waiting out the inter-cycle delay.
    CycleWait,
    /// Decreased setpoint applied, waiting for the current to stabilize.
    MeasureDecreased,
    /// Increased setpoint applied, waiting for the current to stabilize.
    MeasureIncreased,
    /// Winner applied, letting it settle before touching the battery.
    ApplySettle,
    /// Battery sense gate closed, divider settling.
    BatterySettle,
}

/// One MPPT sample: a setpoint and what the panel delivered there.
#[derive(Clone, Copy, Debug, Default)]
struct ProbePoint {
    index: u16,
    solar: f32,
    current: f32,
    power: f32,
}

fn clamp_index(index: i32) -> u16 {
    index.clamp(0, MAX_CHARGING_CURRENT_INDEX as i32) as u16
}

/// Pick the best sample. Order matters: on equal power the baseline wins so
/// repeated identical readings never move the setpoint, and the decreased
/// side beats the increased one (back off rather than push when in doubt).
fn select_candidate(
    baseline: ProbePoint,
    decreased: ProbePoint,
    increased: ProbePoint,
) -> ProbePoint {
    let mut best = baseline;
    if decreased.power > best.power {
        best = decreased;
    }
    if increased.power > best.power {
        best = increased;
    }
    best
}

/// Wrap safe deadline comparison on a free running millisecond counter.
fn deadline_reached(now: u32, deadline: u32) -> bool {
    now.wrapping_sub(deadline) as i32 >= 0
}

/// The battery manager. Construct once, call [`Self::tick`] forever.
pub struct ChargeController {
    sensor: AnalogSensor,
    rng: StepLfsr,
    phase: Phase,
    deadline: u32,

    charging_state: ChargingState,
    not_charging_reason: NotChargingReason,
    chip_state: ChipChargeState,

    charging_current_index: u16,
    battery_voltage: f32, // V
    solar_voltage: f32,   // V
    battery_temp: f32,    // deg C
    charger_temp: f32,    // deg C
    charging_current: f32, // mA
    charging_power: f32,  // mW

    baseline: ProbePoint,
    decreased: ProbePoint,
    increased: ProbePoint,
}

impl ChargeController {
    pub fn new(sensor: AnalogSensor) -> Self {
        Self {
            sensor,
            rng: StepLfsr::new(),
            phase: Phase::Init,
            deadline: 0,
            charging_state: ChargingState::NotCharging,
            not_charging_reason: NotChargingReason::Unknown,
            chip_state: ChipChargeState::NotChargingNorComplete,
            charging_current_index: 0,
            battery_voltage: 0.0,
            solar_voltage: 0.0,
            battery_temp: 0.0,
            charger_temp: 0.0,
            charging_current: 0.0,
            charging_power: 0.0,
            baseline: ProbePoint::default(),
            decreased: ProbePoint::default(),
            increased: ProbePoint::default(),
        }
    }

    /// Advance the cycle by at most one transition. Call at millisecond-ish
    /// rate; the engine sequences itself off [`ChargerHal::millis`].
    pub fn tick<H: ChargerHal>(&mut self, hal: &mut H) {
        let now = hal.millis();
        match self.phase {
            Phase::Init => self.restart_cycle(hal),
            Phase::CycleWait if deadline_reached(now, self.deadline) => self.begin_cycle(hal),
            Phase::MeasureDecreased if deadline_reached(now, self.deadline) => {
                self.finish_decreased(hal)
            }
            Phase::MeasureIncreased if deadline_reached(now, self.deadline) => {
                self.finish_increased(hal)
            }
            Phase::ApplySettle if deadline_reached(now, self.deadline) => {
                self.begin_battery_sense(hal)
            }
            Phase::BatterySettle if deadline_reached(now, self.deadline) => self.classify_cycle(hal),
            _ => {}
        }
    }

    pub fn charging_state(&self) -> ChargingState {
        self.charging_state
    }

    pub fn not_charging_reason(&self) -> NotChargingReason {
        self.not_charging_reason
    }

    /// Currently applied charge current index. Deviates from the cycle
    /// winner for a few milliseconds while a probe is in flight.
    pub fn charging_current_index(&self) -> u16 {
        self.charging_current_index
    }

    /// Snapshot for the status line.
    pub fn status(&self) -> ChargeStatus {
        ChargeStatus {
            charging_state: self.charging_state,
            not_charging_reason: self.not_charging_reason,
            battery_temp: self.battery_temp,
            charger_temp: self.charger_temp,
            charging_current_index: self.charging_current_index,
            charging_current: self.charging_current,
            battery_voltage: self.battery_voltage,
            solar_voltage: self.solar_voltage,
            charging_power: self.charging_power,
        }
    }

    fn arm(&mut self, now: u32, delay_ms: u32, next: Phase) {
        // +1 so at least delay_ms elapses no matter where in the current
        // millisecond we are
        self.deadline = now.wrapping_add(delay_ms).wrapping_add(1);
        self.phase = next;
    }

    /// Clamp and apply a charge current index.
    fn set_charging_current<H: ChargerHal>(&mut self, hal: &mut H, index: i32) {
        let index = clamp_index(index);
        self.charging_current_index = index;
        hal.set_charge_pwm(index);
    }

    /// Drop the charge path to a safe state and schedule the next cycle.
    fn restart_cycle<H: ChargerHal>(&mut self, hal: &mut H) {
        self.set_charging_current(hal, 0);
        self.sensor.disconnect_battery_sense(hal);
        self.arm(hal.millis(), WAIT_TIME_MS, Phase::CycleWait);
    }

    fn temperature_fault(&self) -> Option<NotChargingReason> {
        if self.battery_temp.is_nan() || self.charger_temp.is_nan() {
            // a dead thermistor must not pass the bound checks below
            // (every comparison against NaN is false), refuse to charge
            // but leave the diagnosis open
            return Some(NotChargingReason::Unknown);
        }
        if self.battery_temp < BATTERY_CHARGEABLE_TEMP_LOW {
            return Some(NotChargingReason::BatteryTempTooLow);
        }
        if self.battery_temp > BATTERY_CHARGEABLE_TEMP_HIGH {
            return Some(NotChargingReason::BatteryTempTooHigh);
        }
        if self.charger_temp > CHARGER_MAX_TEMP {
            return Some(NotChargingReason::ChargerTempTooHigh);
        }
        None
    }

    /// A sample is only meaningful when the panel has headroom over the
    /// battery and is out of the chip's UVLO region.
    fn solar_usable(&self, solar: f32) -> bool {
        solar >= self.battery_voltage + MINIMUM_SOLAR_VOLTAGE_OVER_BATTERY_VOLTAGE
            && solar >= MINIMUM_SOLAR_VOLTAGE
    }

    /// Build a probe sample, zeroed out when the panel voltage says no
    /// charge current can actually flow; such a sample must not win the
    /// selection.
    fn probe_point(&self, index: u16, solar: f32, current: f32, power: f32) -> ProbePoint {
        if self.solar_usable(solar) {
            ProbePoint {
                index,
                solar,
                current,
                power,
            }
        } else {
            ProbePoint {
                index,
                solar: 0.0,
                current,
                power: 0.0,
            }
        }
    }

    /// Wait expired: run the temperature guards and start a probe.
    fn begin_cycle<H: ChargerHal>(&mut self, hal: &mut H) {
        self.battery_temp = self.sensor.read_battery_temperature(hal);
        self.charger_temp = self.sensor.read_charger_temperature(hal);

        if let Some(reason) = self.temperature_fault() {
            self.charging_state = ChargingState::NotCharging;
            self.not_charging_reason = reason;
            warn!(
                "charging inhibited: {} (batt {} C, charger {} C)",
                reason.as_str(),
                self.battery_temp,
                self.charger_temp
            );
            self.restart_cycle(hal);
            return;
        }

        // baseline carries the previous cycle's power at the current
        // setpoint; on the very first cycle that is zero and any usable
        // probe wins
        let solar = self.sensor.read_solar_voltage(hal);
        self.baseline = self.probe_point(
            self.charging_current_index,
            solar,
            self.charging_current,
            self.charging_power,
        );

        let decrease = self.rng.step(MPPT_STEP_BITS) as i32;
        let increase = self.rng.step(MPPT_STEP_BITS) as i32;
        let base = self.baseline.index as i32;

        self.set_charging_current(hal, base - decrease);
        self.decreased = ProbePoint {
            index: self.charging_current_index,
            ..ProbePoint::default()
        };
        self.increased = ProbePoint {
            index: clamp_index(base + increase),
            ..ProbePoint::default()
        };

        self.arm(
            hal.millis(),
            CHARGE_CURRENT_STABILIZE_TIME_MS,
            Phase::MeasureDecreased,
        );
    }

    /// Decreased setpoint has settled: sample it, apply the increased one.
    fn finish_decreased<H: ChargerHal>(&mut self, hal: &mut H) {
        let current = self.sensor.read_charge_current(hal);
        let solar = self.sensor.read_solar_voltage(hal);
        self.decreased = self.probe_point(self.decreased.index, solar, current, current * solar);

        self.set_charging_current(hal, self.increased.index as i32);
        self.arm(
            hal.millis(),
            CHARGE_CURRENT_STABILIZE_TIME_MS,
            Phase::MeasureIncreased,
        );
    }

    /// Increased setpoint has settled: sample it, apply the best candidate.
    fn finish_increased<H: ChargerHal>(&mut self, hal: &mut H) {
        let current = self.sensor.read_charge_current(hal);
        let solar = self.sensor.read_solar_voltage(hal);
        self.increased = self.probe_point(self.increased.index, solar, current, current * solar);

        let best = select_candidate(self.baseline, self.decreased, self.increased);
        self.set_charging_current(hal, best.index as i32);
        self.charging_current = best.current;
        self.solar_voltage = best.solar;
        self.charging_power = best.power;

        debug!(
            "mppt: idx {} -> {} ({} mW)",
            self.baseline.index, best.index, best.power
        );

        self.arm(
            hal.millis(),
            CHARGE_CURRENT_STABILIZE_TIME_MS,
            Phase::ApplySettle,
        );
    }

    /// Winner has settled: close the battery sense gate and let the divider
    /// charge up.
    fn begin_battery_sense<H: ChargerHal>(&mut self, hal: &mut H) {
        self.sensor.connect_battery_sense(hal);
        self.arm(
            hal.millis(),
            BATTERY_SENSE_SETTLE_TIME_MS,
            Phase::BatterySettle,
        );
    }

    /// Read the battery, open the gate again, and classify the cycle.
    fn classify_cycle<H: ChargerHal>(&mut self, hal: &mut H) {
        self.battery_voltage = self.sensor.read_battery_voltage(hal);
        self.sensor.disconnect_battery_sense(hal);

        self.chip_state = stat::read_chip_state(hal);

        let chip_active = matches!(
            self.chip_state,
            ChipChargeState::Charging | ChipChargeState::Complete
        );

        // under the absolute solar minimum the chip input is in UVLO and a
        // "charging" STAT level is leftover charge on the input caps, not
        // charging
        if chip_active && self.solar_voltage >= MINIMUM_SOLAR_VOLTAGE {
            self.charging_state = ChargingState::Charging;
            self.not_charging_reason = NotChargingReason::Unknown;
        } else {
            self.charging_state = ChargingState::NotCharging;
            self.not_charging_reason = if self.battery_voltage < MINIMUM_BATTERY_VOLTAGE {
                NotChargingReason::BatteryError
            } else if self.solar_voltage
                < self.battery_voltage + MINIMUM_SOLAR_VOLTAGE_OVER_BATTERY_VOLTAGE
                || self.solar_voltage < MINIMUM_SOLAR_VOLTAGE
            {
                NotChargingReason::SolarVoltageTooLow
            } else {
                NotChargingReason::Unknown
            };
        }

        debug!(
            "cycle: {} ({}) idx {} current {} mA solar {} V batt {} V power {} mW",
            self.charging_state.as_str(),
            self.not_charging_reason.as_str(),
            self.charging_current_index,
            self.charging_current,
            self.solar_voltage,
            self.battery_voltage,
            self.charging_power
        );

        self.arm(hal.millis(), WAIT_TIME_MS, Phase::CycleWait);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(index: u16, power: f32) -> ProbePoint {
        ProbePoint {
            index,
            solar: 4.5,
            current: 100.0,
            power,
        }
    }

    #[test]
    fn clamps_to_pwm_range() {
        assert_eq!(clamp_index(-5), 0);
        assert_eq!(clamp_index(0), 0);
        assert_eq!(clamp_index(512), 512);
        assert_eq!(clamp_index(1023), 1023);
        assert_eq!(clamp_index(5000), 1023);
    }

    #[test]
    fn equal_power_keeps_baseline() {
        let best = select_candidate(point(500, 100.0), point(490, 100.0), point(510, 100.0));
        assert_eq!(best.index, 500);
    }

    #[test]
    fn decreased_beats_increased_on_tie() {
        let best = select_candidate(point(500, 100.0), point(490, 150.0), point(510, 150.0));
        assert_eq!(best.index, 490);
    }

    #[test]
    fn strictly_better_candidate_wins() {
        let best = select_candidate(point(500, 100.0), point(490, 90.0), point(510, 120.0));
        assert_eq!(best.index, 510);
    }

    #[test]
    fn deadline_is_wrap_safe() {
        assert!(deadline_reached(100, 100));
        assert!(deadline_reached(101, 100));
        assert!(!deadline_reached(99, 100));
        // across the wrap
        assert!(!deadline_reached(u32::MAX, 5));
        assert!(deadline_reached(5, u32::MAX.wrapping_add(6)));
        assert!(deadline_reached(6, 5));
    }
}
