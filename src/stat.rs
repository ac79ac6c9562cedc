//! MCP73831 STAT pin decoding.
//!
//! STAT is tri-state: driven low while charging, driven high when the cycle
//! completed, high impedance otherwise (shutdown, no input power, no
//! battery). Reading it once tells you nothing; reading it under pull-up and
//! pull-down bias reveals whether anyone is driving it at all.

use crate::hal::{ChargerHal, StatPull};

/// Charge state as reported by the charger chip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipChargeState {
    /// STAT high impedance: shutdown, UVLO or no battery.
    NotChargingNorComplete,
    /// STAT driven low: charge in progress.
    Charging,
    /// STAT driven high: charge terminated.
    Complete,
}

impl ChipChargeState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChipChargeState::NotChargingNorComplete => "idle",
            ChipChargeState::Charging => "charging",
            ChipChargeState::Complete => "complete",
        }
    }
}

/// Classify the STAT level from three samples: floating, under pull-up and
/// under pull-down. Each argument is the level read under that bias.
pub fn decode_stat(level_z: bool, level_pulled_up: bool, level_pulled_down: bool) -> ChipChargeState {
    if !level_pulled_down && level_pulled_up {
        // the pin follows whatever bias we apply, nobody is driving it
        return ChipChargeState::NotChargingNorComplete;
    }

    // driven; the floating level is the real one
    if level_z {
        ChipChargeState::Complete
    } else {
        ChipChargeState::Charging
    }
}

/// Run the three-sample sequence against the hardware.
pub fn read_chip_state<H: ChargerHal>(hal: &mut H) -> ChipChargeState {
    let level_z = hal.read_stat_pin(StatPull::None);
    let level_pulled_up = hal.read_stat_pin(StatPull::Up);
    let level_pulled_down = hal.read_stat_pin(StatPull::Down);
    decode_stat(level_z, level_pulled_up, level_pulled_down)
}
