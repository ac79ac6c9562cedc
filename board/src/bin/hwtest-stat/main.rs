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
use solar_charge_core::stat::read_chip_state;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_stm32::init(get_system_config());
    info!("stat decode hwtest starting");

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
        hz(solar_charge_core::config::CHARGE_PWM_FREQ_HZ),
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

    loop {
        let state = read_chip_state(&mut hal);
        info!("chip reports {}", state);
        Timer::after_millis(1000).await;
    }
}
