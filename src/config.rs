//! Charge controller thresholds and timings.

/// Li-ion cells must not be charged below freezing, the plating damage is
/// permanent. Upper bound per the cell datasheet charge rating.
pub const BATTERY_CHARGEABLE_TEMP_LOW: f32 = 0.0; // deg C
pub const BATTERY_CHARGEABLE_TEMP_HIGH: f32 = 45.0; // deg C

/// The MCP73831 thermally folds back on its own, but by then the board is
/// already cooking. Back off well before the junction limit.
pub const CHARGER_MAX_TEMP: f32 = 80.0; // deg C

/// Below this the pack is deeply discharged and something is wrong with it,
/// report a battery error instead of blaming the panel.
pub const MINIMUM_BATTERY_VOLTAGE: f32 = 2.5; // V

/// The charger is a linear regulator, it needs headroom over the battery
/// before any charge current can flow at all.
pub const MINIMUM_SOLAR_VOLTAGE_OVER_BATTERY_VOLTAGE: f32 = 0.35; // V

/// Absolute panel voltage floor. Under this the chip input is in UVLO and
/// whatever the STAT pin says is residual capacitance, not charging.
pub const MINIMUM_SOLAR_VOLTAGE: f32 = 3.95; // V

/// Control loop wait time between charge cycles.
pub const WAIT_TIME_MS: u32 = 100;

/// Settling time after moving the charge current setpoint, before the PROG
/// voltage is worth sampling.
pub const CHARGE_CURRENT_STABILIZE_TIME_MS: u32 = 10;

/// The battery sense divider needs a moment after its gate closes.
pub const BATTERY_SENSE_SETTLE_TIME_MS: u32 = 1;

/// Charge current PWM width in bits.
pub const CHARGING_CURRENT_PWM_WIDTH: u32 = 10;

/// Highest usable charge current index. The actual charge current saturates
/// once the PROG network tops out, possibly before this index is reached.
pub const MAX_CHARGING_CURRENT_INDEX: u16 = (1 << CHARGING_CURRENT_PWM_WIDTH) - 1;

/// Charge current PWM frequency. At the 64 MHz core clock this gives exactly
/// the full 10 bit duty range.
pub const CHARGE_PWM_FREQ_HZ: u32 = 62_500;

/// Width of the random MPPT perturbation draw. 5 bits squared and rescaled
/// yields steps of 0..30 on the 10 bit index range, mostly small ones.
pub const MPPT_STEP_BITS: u32 = 5;

/// Solar input divider: half of the panel voltage reaches the ADC pin.
pub const SOLAR_VOLTAGE_DIVIDER_RATIO: f32 = 2.0;

/// Battery divider behind the sense gate, same 1:2 split.
pub const BATTERY_VOLTAGE_DIVIDER_RATIO: f32 = 2.0;

/// MCP73831 PROG network: the chip regulates 1000x the PROG pin current,
/// sensed across this resistor.
pub const PROG_CURRENT_GAIN: f32 = 1000.0;
pub const PROG_RESISTANCE_OHM: f32 = 2000.0;

/// Thermistor parameters, one 100k B2950 NTC at the battery and one at the
/// charger chip, both with a 4.7k pull-up to VREF.
pub const THERMISTOR_T0: f32 = 25.0; // deg C
pub const THERMISTOR_BETA: f32 = 2950.0;
pub const THERMISTOR_R0: f32 = 100_000.0; // ohm
pub const THERMISTOR_RP: f32 = 4_700.0; // ohm
