#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    adc::{Adc, AdcChannel, SampleTime},
    gpio::{Flex, Level, Output, OutputType, Speed},
    time::hz,
    timer::simple_pwm::{PwmPin, SimplePwm},
};
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

use solar_charge_board::hal::ChargerBoardHal;
use solar_charge_board::tasks::get_system_config;
use solar_charge_core::adc::{AdcCalibration, AnalogSensor};
use solar_charge_core::config::{BATTERY_SENSE_SETTLE_TIME_MS, CHARGE_PWM_FREQ_HZ};

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_stm32::init(get_system_config());
    info!("adc hwtest starting");

    let _default_charge_inhibit = Output::new(p.PA5, Level::High, Speed::Low);

    let mut adc = Adc::new(p.ADC1);
    adc.set_sample_time(SampleTime::CYCLES160_5);
    let vrefint_channel = adc.enable_vrefint().degrade_adc();

    let charge_pwm = SimplePwm::new(
        p.TIM3,
        None,
        Some(PwmPin::new_ch2(p.PA7, OutputType::PushPull)),
        None,
        None,
        hz(CHARGE_PWM_FREQ_HZ),
        Default::default(),
    );

    let mut hal = ChargerBoardHal::new(
        adc,
        p.PA0.degrade_adc(),
        p.PA1.degrade_adc(),
        p.PA12.degrade_adc(),
        p.PA6.degrade_adc(),
        p.PA4.degrade_adc(),
        vrefint_channel,
        Flex::new(p.PB0),
        Output::new(p.PA11, Level::Low, Speed::Low),
        charge_pwm,
    );

    let calibration = AdcCalibration::measure(&mut hal);
    info!(
        "vref_int {} V, vref+ {} V",
        calibration.vref_int(),
        calibration.vref_pos()
    );

    let sensor = AnalogSensor::new(calibration);

    loop {
        let solar = sensor.read_solar_voltage(&mut hal);
        let current = sensor.read_charge_current(&mut hal);

        sensor.connect_battery_sense(&mut hal);
        Timer::after_millis(BATTERY_SENSE_SETTLE_TIME_MS as u64).await;
        let battery = sensor.read_battery_voltage(&mut hal);
        sensor.disconnect_battery_sense(&mut hal);

        info!("solar {} V, battery {} V, prog {} mA", solar, battery, current);
        Timer::after_millis(1000).await;
    }
}
