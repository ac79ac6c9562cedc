//! End to end charge cycle tests against a scripted hardware mock.

use solar_charge_core::adc::{AdcCalibration, AnalogSensor};
use solar_charge_core::config;
use solar_charge_core::control::{ChargeController, ChargingState, NotChargingReason};
use solar_charge_core::hal::{AdcChannel, ChargerHal, StatPull};

/// Scripted hardware: per channel raw values, a STAT truth table, a manual
/// millisecond clock, and enough accounting to check what the engine did.
struct MockHal {
    now_ms: u32,
    vrefint_cal: u16,
    vrefint: u16,
    therm_batt: u16,
    therm_chg: u16,
    solar: u16,
    battery: u16,
    prog: u16,
    /// When set, the PROG sample is computed from the applied PWM index.
    prog_model: Option<Box<dyn Fn(u16) -> u16>>,
    stat_z: bool,
    stat_up: bool,
    stat_down: bool,
    sense_connected: bool,
    sense_closures: u32,
    battery_reads: u32,
    reads_while_disconnected: u32,
    pwm: u16,
    /// Volts per ADC count, derived from the mock's own calibration data.
    vpc: f32,
}

impl MockHal {
    fn new() -> Self {
        let mut hal = Self {
            now_ms: 0,
            // cal word for 1.212 V at 3.0 V, live sample on a 3.3 V rail
            vrefint_cal: 1655,
            vrefint: 1504,
            therm_batt: 0,
            therm_chg: 0,
            solar: 0,
            battery: 0,
            prog: 0,
            prog_model: None,
            // STAT driven low: charging
            stat_z: false,
            stat_up: false,
            stat_down: false,
            sense_connected: false,
            sense_closures: 0,
            battery_reads: 0,
            reads_while_disconnected: 0,
            pwm: 0,
            vpc: 0.0,
        };
        hal.vpc = AdcCalibration::measure(&mut hal).volts_per_count();
        hal.set_battery_temp(20.0);
        hal.set_charger_temp(25.0);
        hal.set_solar_volts(4.5);
        hal.set_battery_volts(3.8);
        hal.set_charge_current_ma(250.0);
        hal
    }

    fn raw_for_pin_volts(&self, volts: f32) -> u16 {
        ((volts / self.vpc).round() as i32).clamp(0, 4095) as u16
    }

    fn set_solar_volts(&mut self, volts: f32) {
        self.solar = self.raw_for_pin_volts(volts / config::SOLAR_VOLTAGE_DIVIDER_RATIO);
    }

    fn set_battery_volts(&mut self, volts: f32) {
        self.battery = self.raw_for_pin_volts(volts / config::BATTERY_VOLTAGE_DIVIDER_RATIO);
    }

    fn set_charge_current_ma(&mut self, ma: f32) {
        let volts = ma * config::PROG_RESISTANCE_OHM / config::PROG_CURRENT_GAIN / 1000.0;
        self.prog = self.raw_for_pin_volts(volts);
    }

    fn temp_ratio(t: f32) -> f32 {
        let t0_k = config::THERMISTOR_T0 + 273.15;
        let rt = config::THERMISTOR_R0
            * libm::expf(config::THERMISTOR_BETA * (1.0 / (t + 273.15) - 1.0 / t0_k));
        rt / (rt + config::THERMISTOR_RP)
    }

    fn set_battery_temp(&mut self, t: f32) {
        self.therm_batt = (Self::temp_ratio(t) * 4095.0).round() as u16;
    }

    fn set_charger_temp(&mut self, t: f32) {
        self.therm_chg = (Self::temp_ratio(t) * 4095.0).round() as u16;
    }

    fn set_stat_floating(&mut self) {
        self.stat_z = true;
        self.stat_up = true;
        self.stat_down = false;
    }

    fn set_stat_driven(&mut self, high: bool) {
        self.stat_z = high;
        self.stat_up = high;
        self.stat_down = high;
    }
}

impl ChargerHal for MockHal {
    fn adc_sample(&mut self, channel: AdcChannel) -> u16 {
        match channel {
            AdcChannel::BatteryThermistor => self.therm_batt,
            AdcChannel::ChargerThermistor => self.therm_chg,
            AdcChannel::SolarVoltage => self.solar,
            AdcChannel::BatteryVoltage => {
                self.battery_reads += 1;
                if !self.sense_connected {
                    self.reads_while_disconnected += 1;
                }
                self.battery
            }
            AdcChannel::ProgVoltage => match &self.prog_model {
                Some(model) => model(self.pwm),
                None => self.prog,
            },
            AdcChannel::VrefInt => self.vrefint,
        }
    }

    fn vrefint_cal(&self) -> u16 {
        self.vrefint_cal
    }

    fn read_stat_pin(&mut self, pull: StatPull) -> bool {
        match pull {
            StatPull::None => self.stat_z,
            StatPull::Up => self.stat_up,
            StatPull::Down => self.stat_down,
        }
    }

    fn set_battery_sense(&mut self, connected: bool) {
        if connected && !self.sense_connected {
            self.sense_closures += 1;
        }
        self.sense_connected = connected;
    }

    fn set_charge_pwm(&mut self, index: u16) {
        self.pwm = index;
    }

    fn millis(&self) -> u32 {
        self.now_ms
    }
}

fn controller(hal: &mut MockHal) -> ChargeController {
    let cal = AdcCalibration::measure(hal);
    ChargeController::new(AnalogSensor::new(cal))
}

fn run_ms(ctrl: &mut ChargeController, hal: &mut MockHal, ms: u32) {
    for _ in 0..ms {
        hal.now_ms = hal.now_ms.wrapping_add(1);
        ctrl.tick(hal);
    }
}

/// Run until `cycles` more classifications have completed, then land in the
/// following wait so the cycle winner is the applied setpoint.
fn run_cycles(ctrl: &mut ChargeController, hal: &mut MockHal, cycles: u32) {
    let target = hal.sense_closures + cycles;
    for _ in 0..200_000 {
        if hal.sense_closures >= target {
            break;
        }
        run_ms(ctrl, hal, 1);
    }
    assert!(
        hal.sense_closures >= target,
        "engine stalled before completing {} cycles",
        cycles
    );
    run_ms(ctrl, hal, 5);
}

#[test]
fn charges_when_sun_is_good() {
    let mut hal = MockHal::new();
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 3);

    let s = ctrl.status();
    assert_eq!(s.charging_state, ChargingState::Charging);
    assert_eq!(s.not_charging_reason, NotChargingReason::Unknown);
    assert!((s.battery_voltage - 3.8).abs() < 0.02);
    assert!((s.solar_voltage - 4.5).abs() < 0.02);
    assert!((s.charging_current - 250.0).abs() < 2.0);
    assert!((s.charging_power - 1125.0).abs() < 10.0);
}

#[test]
fn battery_is_sensed_once_per_cycle_behind_the_gate() {
    let mut hal = MockHal::new();
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 4);

    assert_eq!(hal.sense_closures, 4);
    assert_eq!(hal.battery_reads, 4);
    assert_eq!(hal.reads_while_disconnected, 0);
    // gate open again between cycles
    assert!(!hal.sense_connected);
}

#[test]
fn cold_battery_inhibits_charging() {
    let mut hal = MockHal::new();
    hal.set_battery_temp(-5.0);
    let mut ctrl = controller(&mut hal);

    run_ms(&mut ctrl, &mut hal, 400);

    assert_eq!(ctrl.charging_state(), ChargingState::NotCharging);
    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::BatteryTempTooLow);
    // charge path parked at zero, the probe never runs
    assert_eq!(hal.pwm, 0);
    assert_eq!(hal.sense_closures, 0);
}

#[test]
fn hot_battery_inhibits_charging() {
    let mut hal = MockHal::new();
    hal.set_battery_temp(50.0);
    let mut ctrl = controller(&mut hal);

    run_ms(&mut ctrl, &mut hal, 400);

    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::BatteryTempTooHigh);
    assert_eq!(hal.pwm, 0);
}

#[test]
fn hot_charger_inhibits_charging() {
    let mut hal = MockHal::new();
    hal.set_charger_temp(85.0);
    let mut ctrl = controller(&mut hal);

    run_ms(&mut ctrl, &mut hal, 400);

    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::ChargerTempTooHigh);
    assert_eq!(hal.pwm, 0);
}

#[test]
fn battery_bounds_are_checked_before_the_charger() {
    let mut hal = MockHal::new();
    hal.set_battery_temp(-5.0);
    hal.set_charger_temp(85.0);
    let mut ctrl = controller(&mut hal);

    run_ms(&mut ctrl, &mut hal, 400);

    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::BatteryTempTooLow);
}

#[test]
fn recovers_once_temperature_normalizes() {
    let mut hal = MockHal::new();
    hal.set_battery_temp(-5.0);
    let mut ctrl = controller(&mut hal);

    run_ms(&mut ctrl, &mut hal, 400);
    assert_eq!(ctrl.charging_state(), ChargingState::NotCharging);

    hal.set_battery_temp(20.0);
    run_cycles(&mut ctrl, &mut hal, 2);

    assert_eq!(ctrl.charging_state(), ChargingState::Charging);
    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::Unknown);
}

#[test]
fn open_thermistor_refuses_to_charge() {
    let mut hal = MockHal::new();
    // full scale reading: open sensor, converts to NaN
    hal.therm_batt = 4095;
    let mut ctrl = controller(&mut hal);

    run_ms(&mut ctrl, &mut hal, 400);

    assert_eq!(ctrl.charging_state(), ChargingState::NotCharging);
    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::Unknown);
    assert_eq!(hal.pwm, 0);
    assert_eq!(hal.sense_closures, 0);
}

#[test]
fn mppt_converges_to_the_power_peak() {
    let mut hal = MockHal::new();
    // panel/charger response with a single power maximum at index 600
    let vpc = hal.vpc;
    hal.prog_model = Some(Box::new(move |idx: u16| {
        let ma = (400.0 - 0.5 * (idx as f32 - 600.0).abs()).max(0.0);
        let volts = ma * config::PROG_RESISTANCE_OHM / config::PROG_CURRENT_GAIN / 1000.0;
        ((volts / vpc).round() as i32).clamp(0, 4095) as u16
    }));
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 120);

    let s = ctrl.status();
    let idx = s.charging_current_index as i32;
    assert!(
        (idx - 600).abs() <= 31,
        "tracker settled at {} instead of near 600",
        idx
    );
    assert!(s.charging_power > 1500.0, "power {} mW", s.charging_power);
    assert_eq!(s.charging_state, ChargingState::Charging);
}

#[test]
fn weak_sun_reports_solar_too_low_and_holds_the_setpoint() {
    let mut hal = MockHal::new();
    let vpc = hal.vpc;
    hal.prog_model = Some(Box::new(move |idx: u16| {
        let ma = (400.0 - 0.5 * (idx as f32 - 600.0).abs()).max(0.0);
        let volts = ma * config::PROG_RESISTANCE_OHM / config::PROG_CURRENT_GAIN / 1000.0;
        ((volts / vpc).round() as i32).clamp(0, 4095) as u16
    }));
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 40);
    let settled = hal.pwm;
    assert!(settled > 0, "tracker should have moved off zero");

    // cloud cover: panel collapses under the battery voltage and the
    // absolute minimum, the chip browns out, no charge current flows
    hal.prog_model = None;
    hal.set_charge_current_ma(0.0);
    hal.set_solar_volts(3.5);
    hal.set_stat_floating();

    run_cycles(&mut ctrl, &mut hal, 3);

    let s = ctrl.status();
    assert_eq!(s.charging_state, ChargingState::NotCharging);
    assert_eq!(s.not_charging_reason, NotChargingReason::SolarVoltageTooLow);
    // every candidate zeroed: the setpoint parks at the baseline and the
    // recorded sample is the zeroed one
    assert_eq!(hal.pwm, settled);
    assert_eq!(s.solar_voltage, 0.0);
    assert_eq!(s.charging_power, 0.0);
}

#[test]
fn deep_discharged_battery_reports_battery_error() {
    let mut hal = MockHal::new();
    hal.set_battery_volts(2.0);
    hal.set_solar_volts(3.5);
    hal.set_charge_current_ma(0.0);
    hal.set_stat_floating();
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 2);

    assert_eq!(ctrl.charging_state(), ChargingState::NotCharging);
    // battery under minimum outranks the solar diagnosis
    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::BatteryError);
}

#[test]
fn idle_chip_with_good_sun_is_unknown() {
    let mut hal = MockHal::new();
    hal.set_charge_current_ma(0.0);
    hal.set_stat_floating();
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 2);

    assert_eq!(ctrl.charging_state(), ChargingState::NotCharging);
    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::Unknown);
}

#[test]
fn charge_complete_still_counts_as_charging() {
    let mut hal = MockHal::new();
    hal.set_charge_current_ma(0.0);
    // STAT driven high: termination reached
    hal.set_stat_driven(true);
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 2);

    assert_eq!(ctrl.charging_state(), ChargingState::Charging);
    assert_eq!(ctrl.not_charging_reason(), NotChargingReason::Unknown);
}

#[test]
fn survives_millis_wraparound() {
    let mut hal = MockHal::new();
    hal.now_ms = u32::MAX - 120;
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 3);

    assert_eq!(hal.sense_closures, 3);
    assert_eq!(ctrl.charging_state(), ChargingState::Charging);
}

#[test]
fn status_line_reflects_the_cycle() {
    let mut hal = MockHal::new();
    let mut ctrl = controller(&mut hal);

    run_cycles(&mut ctrl, &mut hal, 2);
    let line = ctrl.status().render();
    assert!(line.as_str().starts_with("stat=charging reason=unknown batt_temp="));
    assert!(line.as_str().contains("solar=4.50V"));

    hal.set_battery_temp(-5.0);
    run_ms(&mut ctrl, &mut hal, 300);
    let line = ctrl.status().render();
    assert!(line
        .as_str()
        .starts_with("stat=not-charging reason=batt-too-cold batt_temp=-"));
    assert!(!line.as_str().contains("idx="));
}
