use embassy_stm32::adc::{Adc, AnyAdcChannel};
use embassy_stm32::gpio::{Flex, Output, Pull};
use embassy_stm32::peripherals::{ADC1, TIM3};
use embassy_stm32::timer::simple_pwm::SimplePwm;
use embassy_time::{block_for, Duration, Instant};

use solar_charge_core::config::MAX_CHARGING_CURRENT_INDEX;
use solar_charge_core::hal::{AdcChannel, ChargerHal, StatPull};

// System memory address of the factory VREFINT calibration word (STM32G0 reference
// manual, section 14.9). Sampled at 3.0 V VDDA during production test.
const VREFINT_CAL_ADDR: *const u16 = 0x1FFF_75AA as *const u16;

// The STAT net sits behind a 1M bias resistor, so give the pin time to slew
// after swapping the internal pull before sampling it.
const STAT_BIAS_SETTLE_US: u64 = 50;

/// Board access for the charge controller: one ADC shared across six channels,
/// the tri-state STAT input, the battery sense divider gate and the PROG PWM.
pub struct ChargerBoardHal {
    adc: Adc<'static, ADC1>,
    battery_thermistor: AnyAdcChannel<ADC1>,
    charger_thermistor: AnyAdcChannel<ADC1>,
    solar_voltage: AnyAdcChannel<ADC1>,
    battery_voltage: AnyAdcChannel<ADC1>,
    prog_sense: AnyAdcChannel<ADC1>,
    vrefint: AnyAdcChannel<ADC1>,
    stat: Flex<'static>,
    battery_sense_enable: Output<'static>,
    charge_pwm: SimplePwm<'static, TIM3>,
}

impl ChargerBoardHal {
    pub fn new(
        adc: Adc<'static, ADC1>,
        battery_thermistor: AnyAdcChannel<ADC1>,
        charger_thermistor: AnyAdcChannel<ADC1>,
        solar_voltage: AnyAdcChannel<ADC1>,
        battery_voltage: AnyAdcChannel<ADC1>,
        prog_sense: AnyAdcChannel<ADC1>,
        vrefint: AnyAdcChannel<ADC1>,
        stat: Flex<'static>,
        battery_sense_enable: Output<'static>,
        mut charge_pwm: SimplePwm<'static, TIM3>,
    ) -> Self {
        charge_pwm.ch2().set_duty_cycle_fully_off();
        charge_pwm.ch2().enable();

        Self {
            adc,
            battery_thermistor,
            charger_thermistor,
            solar_voltage,
            battery_voltage,
            prog_sense,
            vrefint,
            stat,
            battery_sense_enable,
            charge_pwm,
        }
    }
}

impl ChargerHal for ChargerBoardHal {
    fn adc_sample(&mut self, channel: AdcChannel) -> u16 {
        let channel = match channel {
            AdcChannel::BatteryThermistor => &mut self.battery_thermistor,
            AdcChannel::ChargerThermistor => &mut self.charger_thermistor,
            AdcChannel::SolarVoltage => &mut self.solar_voltage,
            AdcChannel::BatteryVoltage => &mut self.battery_voltage,
            AdcChannel::ProgVoltage => &mut self.prog_sense,
            AdcChannel::VrefInt => &mut self.vrefint,
        };

        self.adc.blocking_read(channel)
    }

    fn vrefint_cal(&self) -> u16 {
        unsafe { VREFINT_CAL_ADDR.read_volatile() }
    }

    fn read_stat_pin(&mut self, pull: StatPull) -> bool {
        let pull = match pull {
            StatPull::None => Pull::None,
            StatPull::Up => Pull::Up,
            StatPull::Down => Pull::Down,
        };

        self.stat.set_as_input(pull);
        block_for(Duration::from_micros(STAT_BIAS_SETTLE_US));
        self.stat.is_high()
    }

    fn set_battery_sense(&mut self, connected: bool) {
        if connected {
            self.battery_sense_enable.set_high();
        } else {
            self.battery_sense_enable.set_low();
        }
    }

    fn set_charge_pwm(&mut self, index: u16) {
        self.charge_pwm
            .ch2()
            .set_duty_cycle_fraction(index, MAX_CHARGING_CURRENT_INDEX);
    }

    fn millis(&self) -> u32 {
        Instant::now().as_millis() as u32
    }
}
