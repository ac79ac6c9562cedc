//! ADC self calibration and scaled sensor reads.
//!
//! The ADC reference is the 3.3 V rail, which on a solar powered board is
//! whatever the regulator makes of the day. The factory stores the VREFINT
//! reading taken at VREF+ = 3.0 V; comparing it against a live VREFINT
//! sample solves for the actual VREF+ so every conversion comes out in real
//! volts regardless of rail sag.

use crate::config;
use crate::hal::{AdcChannel, ChargerHal};
use crate::thermistor::ThermistorModel;

/// Full scale of a 12 bit conversion.
pub const ADC_MAX_VALUE: u16 = 4095;

/// Factory calibration is taken at VREF+ = 3.0 V (value in mV).
const VREFINT_CAL_VREF_MV: f32 = 3000.0;

/// Nominal VREFINT and rail voltage, used only for the fallback below.
const VREFINT_NOMINAL_V: f32 = 1.21;
const VDDA_NOMINAL_V: f32 = 3.3;

/// Result of the power-on reference calibration.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct AdcCalibration {
    vref_cal: f32,
    vref_pos: f32,
    volts_per_count: f32,
    degraded: bool,
}

impl AdcCalibration {
    /// Solve for the actual VREF+ from the factory VREFINT word and a live
    /// VREFINT sample.
    pub fn measure<H: ChargerHal>(hal: &mut H) -> Self {
        let vref_cal =
            hal.vrefint_cal() as f32 * (VREFINT_CAL_VREF_MV / 1000.0 / ADC_MAX_VALUE as f32);

        let mut raw = hal.adc_sample(AdcChannel::VrefInt) as f32;
        let mut degraded = false;
        if raw == 0.0 {
            // cannot happen on a sane board; substitute the nominal ratio so
            // the math stays finite and flag the result
            raw = VREFINT_NOMINAL_V / VDDA_NOMINAL_V * ADC_MAX_VALUE as f32;
            degraded = true;
            warn!("vrefint sampled zero, calibration falls back to nominal reference");
        }

        let vref_pos = vref_cal / raw * ADC_MAX_VALUE as f32;
        let volts_per_count = vref_pos / ADC_MAX_VALUE as f32;

        info!("adc calibration: vref_int {} V, vref+ {} V", vref_cal, vref_pos);

        Self {
            vref_cal,
            vref_pos,
            volts_per_count,
            degraded,
        }
    }

    /// Factory VREFINT voltage, for reporting.
    pub fn vref_int(&self) -> f32 {
        self.vref_cal
    }

    /// Computed VREF+ rail voltage.
    pub fn vref_pos(&self) -> f32 {
        self.vref_pos
    }

    pub fn volts_per_count(&self) -> f32 {
        self.volts_per_count
    }

    /// True when the live VREFINT sample was unusable and nominal values
    /// stand in for it.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    /// Raw counts to volts at the pin.
    pub fn volts(&self, raw: u16) -> f32 {
        raw as f32 * self.volts_per_count
    }

    /// Raw counts to the 0.0..1.0 range (1.0 at VREF+). Ratiometric reads
    /// like the thermistor dividers want this, rail sag cancels out.
    pub fn normalized(raw: u16) -> f32 {
        raw as f32 / ADC_MAX_VALUE as f32
    }
}

/// Calibrated access to every analog input of the charger.
pub struct AnalogSensor {
    calibration: AdcCalibration,
    battery_thermistor: ThermistorModel,
    charger_thermistor: ThermistorModel,
}

impl AnalogSensor {
    pub fn new(calibration: AdcCalibration) -> Self {
        let model = ThermistorModel::new(
            config::THERMISTOR_T0,
            config::THERMISTOR_BETA,
            config::THERMISTOR_R0,
            config::THERMISTOR_RP,
        );
        Self {
            calibration,
            battery_thermistor: model,
            charger_thermistor: model,
        }
    }

    pub fn calibration(&self) -> &AdcCalibration {
        &self.calibration
    }

    /// Voltage at the pin of any channel.
    pub fn read_voltage<H: ChargerHal>(&self, hal: &mut H, channel: AdcChannel) -> f32 {
        self.calibration.volts(hal.adc_sample(channel))
    }

    /// Channel reading as a 0.0..1.0 fraction of VREF+.
    pub fn read_normalized<H: ChargerHal>(&self, hal: &mut H, channel: AdcChannel) -> f32 {
        AdcCalibration::normalized(hal.adc_sample(channel))
    }

    /// Solar input voltage ahead of the divider.
    pub fn read_solar_voltage<H: ChargerHal>(&self, hal: &mut H) -> f32 {
        self.read_voltage(hal, AdcChannel::SolarVoltage) * config::SOLAR_VOLTAGE_DIVIDER_RATIO
    }

    /// Battery voltage. Only meaningful between [`Self::connect_battery_sense`]
    /// (plus a settle of [`config::BATTERY_SENSE_SETTLE_TIME_MS`]) and
    /// [`Self::disconnect_battery_sense`].
    pub fn read_battery_voltage<H: ChargerHal>(&self, hal: &mut H) -> f32 {
        self.read_voltage(hal, AdcChannel::BatteryVoltage) * config::BATTERY_VOLTAGE_DIVIDER_RATIO
    }

    /// Charge current in mA as indicated by the PROG pin. The chip sources
    /// 1/1000 of the charge current out of PROG, sensed across the PROG
    /// resistor.
    pub fn read_charge_current<H: ChargerHal>(&self, hal: &mut H) -> f32 {
        self.read_voltage(hal, AdcChannel::ProgVoltage) * config::PROG_CURRENT_GAIN
            / config::PROG_RESISTANCE_OHM
            * 1000.0
    }

    /// Battery NTC temperature in deg C, NaN on an open sensor.
    pub fn read_battery_temperature<H: ChargerHal>(&self, hal: &mut H) -> f32 {
        let ratio = self.read_normalized(hal, AdcChannel::BatteryThermistor);
        self.battery_thermistor.celsius_from_ratio(ratio)
    }

    /// Charger chip NTC temperature in deg C, NaN on an open sensor.
    pub fn read_charger_temperature<H: ChargerHal>(&self, hal: &mut H) -> f32 {
        let ratio = self.read_normalized(hal, AdcChannel::ChargerThermistor);
        self.charger_thermistor.celsius_from_ratio(ratio)
    }

    /// Connect the battery to its divider. Wait
    /// [`config::BATTERY_SENSE_SETTLE_TIME_MS`] before reading.
    pub fn connect_battery_sense<H: ChargerHal>(&self, hal: &mut H) {
        hal.set_battery_sense(true);
    }

    /// Disconnect the battery from its divider so it cannot discharge
    /// through it.
    pub fn disconnect_battery_sense<H: ChargerHal>(&self, hal: &mut H) {
        hal.set_battery_sense(false);
    }
}
