use embassy_executor::Spawner;
use embassy_stm32::adc::{Adc, AdcChannel, SampleTime};
use embassy_stm32::gpio::{Flex, Level, Output, OutputType, Speed};
use embassy_stm32::time::hz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_time::{Duration, Instant, Ticker};

use solar_charge_core::adc::{AdcCalibration, AnalogSensor};
use solar_charge_core::config::CHARGE_PWM_FREQ_HZ;
use solar_charge_core::control::ChargeController;

use crate::hal::ChargerBoardHal;
use crate::pins::*;

const CONTROL_TICK_INTERVAL: Duration = Duration::from_millis(1);
const STATUS_REPORT_INTERVAL: Duration = Duration::from_millis(1000);

#[macro_export]
macro_rules! create_charge_task {
    ($spawner:ident, $p:ident) => {
        solar_charge_board::tasks::charge_task::start_charge_task(&$spawner,
            $p.ADC1,
            $p.PA0, $p.PA1, $p.PA12, $p.PA6, $p.PA4,
            $p.TIM3, $p.PA7, $p.PB0, $p.PA11).await;
    };
}

#[embassy_executor::task]
async fn charge_task_entry(
    adc: ChargeAdc,
    battery_thermistor_pin: BatteryThermistorPin,
    charger_thermistor_pin: ChargerThermistorPin,
    solar_voltage_pin: SolarVoltagePin,
    battery_voltage_pin: BatteryVoltagePin,
    prog_sense_pin: ProgSensePin,
    pwm_timer: ChargePwmTimer,
    charge_pwm_pin: ChargeCurrentPwmPin,
    stat_pin: ChargeStatPin,
    battery_sense_enable_pin: BatterySenseEnablePin,
) {
    /////////////////
    //  ADC Setup  //
    /////////////////

    let mut adc = Adc::new(adc);
    adc.set_sample_time(SampleTime::CYCLES160_5);
    let vrefint_channel = adc.enable_vrefint().degrade_adc();

    ///////////////////////////
    //  Charge Output Setup  //
    ///////////////////////////

    // PROG PWM above the MCP73831 internal filter corner, duty starts at zero
    let charge_pwm = SimplePwm::new(
        pwm_timer,
        None,
        Some(PwmPin::new_ch2(charge_pwm_pin, OutputType::PushPull)),
        None,
        None,
        hz(CHARGE_PWM_FREQ_HZ),
        Default::default(),
    );

    let stat = Flex::new(stat_pin);
    let battery_sense_enable = Output::new(battery_sense_enable_pin, Level::Low, Speed::Low);

    let mut hal = ChargerBoardHal::new(
        adc,
        battery_thermistor_pin.degrade_adc(),
        charger_thermistor_pin.degrade_adc(),
        solar_voltage_pin.degrade_adc(),
        battery_voltage_pin.degrade_adc(),
        prog_sense_pin.degrade_adc(),
        vrefint_channel,
        stat,
        battery_sense_enable,
        charge_pwm,
    );

    ////////////////////////
    //  Controller Setup  //
    ////////////////////////

    let calibration = AdcCalibration::measure(&mut hal);
    let sensor = AnalogSensor::new(calibration);
    let mut controller = ChargeController::new(sensor);

    let mut loop_ticker = Ticker::every(CONTROL_TICK_INTERVAL);
    let mut last_status_report_time = Instant::now();

    loop {
        controller.tick(&mut hal);

        if last_status_report_time.elapsed() > STATUS_REPORT_INTERVAL {
            last_status_report_time = Instant::now();

            let line = controller.status().render();
            defmt::info!("{=str}", line.as_str());
        }

        loop_ticker.next().await;
    }
}

pub async fn start_charge_task(spawner: &Spawner,
    adc: ChargeAdc,
    battery_thermistor_pin: BatteryThermistorPin,
    charger_thermistor_pin: ChargerThermistorPin,
    solar_voltage_pin: SolarVoltagePin,
    battery_voltage_pin: BatteryVoltagePin,
    prog_sense_pin: ProgSensePin,
    pwm_timer: ChargePwmTimer,
    charge_pwm_pin: ChargeCurrentPwmPin,
    stat_pin: ChargeStatPin,
    battery_sense_enable_pin: BatterySenseEnablePin,
    ) {
    spawner.spawn(charge_task_entry(
        adc,
        battery_thermistor_pin, charger_thermistor_pin, solar_voltage_pin, battery_voltage_pin, prog_sense_pin,
        pwm_timer, charge_pwm_pin, stat_pin, battery_sense_enable_pin
    )).expect("failed to spawn charge task");
}
