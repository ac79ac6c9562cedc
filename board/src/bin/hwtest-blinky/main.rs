#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::gpio::{Level, Output, Speed};
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

use solar_charge_board::tasks::get_system_config;

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    let p = embassy_stm32::init(get_system_config());
    info!("Hello World!");

    let mut user_led = Output::new(p.PC6, Level::High, Speed::Low);

    loop {
        info!("high");
        user_led.set_high();
        Timer::after_millis(250).await;

        info!("low");
        user_led.set_low();
        Timer::after_millis(250).await;
    }
}
