//! Hardware seam for the charge controller.
//!
//! The board crate implements [`ChargerHal`] over the real ADC, GPIO and
//! timer peripherals; tests implement it over scripted values.

/// Analog inputs the controller samples.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AdcChannel {
    /// NTC at the li-ion cell.
    BatteryThermistor,
    /// NTC at the charger chip.
    ChargerThermistor,
    /// Solar input behind its divider.
    SolarVoltage,
    /// Battery behind the gated divider. Only valid while the sense gate is
    /// closed, see [`ChargerHal::set_battery_sense`].
    BatteryVoltage,
    /// PROG pin of the charger chip, proportional to the charge current.
    ProgVoltage,
    /// Internal reference, used for self calibration.
    VrefInt,
}

/// Bias applied to the STAT pin for one read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatPull {
    None,
    Up,
    Down,
}

/// Everything the control logic needs from the hardware.
pub trait ChargerHal {
    /// One raw 12 bit conversion of the given channel.
    fn adc_sample(&mut self, channel: AdcChannel) -> u16;

    /// Factory VREFINT calibration word (measured at 30 deg C, VREF+ = 3.0 V).
    fn vrefint_cal(&self) -> u16;

    /// Level of the tri-state STAT pin with the given bias applied. The
    /// implementation must give the pin time to settle after switching bias.
    fn read_stat_pin(&mut self, pull: StatPull) -> bool;

    /// Close or open the battery sense gate. The battery normally stays
    /// disconnected from its divider so it cannot discharge through it.
    fn set_battery_sense(&mut self, connected: bool);

    /// Apply a charge current index to the PWM. The value is already clamped
    /// to [`crate::config::MAX_CHARGING_CURRENT_INDEX`].
    fn set_charge_pwm(&mut self, index: u16);

    /// Free running millisecond counter. Expected to wrap.
    fn millis(&self) -> u32;
}
