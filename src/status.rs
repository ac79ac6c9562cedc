//! Single line status rendering for the periodic telemetry output.

use core::fmt::Write;

use crate::control::{ChargingState, NotChargingReason};

/// Sized for the longest possible line with some slack.
pub const STATUS_LINE_CAPACITY: usize = 192;

pub type StatusLine = heapless::String<STATUS_LINE_CAPACITY>;

/// Snapshot of the controller state, taken between cycles.
#[derive(Clone, Copy, Debug)]
pub struct ChargeStatus {
    pub charging_state: ChargingState,
    pub not_charging_reason: NotChargingReason,
    pub battery_temp: f32,
    pub charger_temp: f32,
    pub charging_current_index: u16,
    pub charging_current: f32,
    pub battery_voltage: f32,
    pub solar_voltage: f32,
    pub charging_power: f32,
}

impl ChargeStatus {
    /// Render the one line summary. During a temperature fault the charge
    /// path is parked at zero, the electrical numbers would only repeat
    /// that, so the line stops after the temperatures.
    pub fn render(&self) -> StatusLine {
        let mut line = StatusLine::new();

        // capacity is sized for the worst case, a full line always fits
        let _ = write!(
            &mut line,
            "stat={} reason={} batt_temp={:.1}C chg_temp={:.1}C",
            self.charging_state.as_str(),
            self.not_charging_reason.as_str(),
            self.battery_temp,
            self.charger_temp,
        );

        if !self.not_charging_reason.is_temperature_fault() {
            let _ = write!(
                &mut line,
                " idx={} current={:.1}mA batt={:.2}V solar={:.2}V power={:.1}mW",
                self.charging_current_index,
                self.charging_current,
                self.battery_voltage,
                self.solar_voltage,
                self.charging_power,
            );
        }

        line
    }
}
