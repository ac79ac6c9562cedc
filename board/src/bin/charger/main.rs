#![no_std]
#![no_main]

use defmt::*;
use embassy_executor::Spawner;
use embassy_stm32::{
    gpio::{Level, Output, Speed},
    i2c::I2c,
    time::hz,
};
use embassy_time::Timer;
use {defmt_rtt as _, panic_probe as _};

use solar_charge_board::create_charge_task;
use solar_charge_board::bus_scan::dump_i2c;
use solar_charge_board::optguard;
use solar_charge_board::tasks::get_system_config;

#[embassy_executor::main]
async fn main(spawner: Spawner) {
    let p = embassy_stm32::init(get_system_config());
    info!("solar charge controller starting");

    // hold the MCP73831 default current source off before anything else powers up,
    // charge current is only ever set through the PROG PWM
    let _default_charge_inhibit = Output::new(p.PA5, Level::High, Speed::Low);

    let mut i2c = I2c::new_blocking(p.I2C1, p.PB6, p.PB7, hz(100_000), Default::default());
    dump_i2c(&mut i2c);

    // resets the chip on first boot after production programming
    optguard::ensure_boot_pin_enabled();

    create_charge_task!(spawner, p);

    let mut user_led = Output::new(p.PC6, Level::High, Speed::Low);

    loop {
        user_led.set_low();
        Timer::after_millis(1000).await;
        user_led.set_high();
        Timer::after_millis(1000).await;
    }
}
