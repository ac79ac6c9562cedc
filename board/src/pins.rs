use embassy_stm32::peripherals::*;
use embassy_stm32::Peri;

///////////////////////////
//  Analog Measurements  //
///////////////////////////

pub type ChargeAdc = Peri<'static, ADC1>;
pub type BatteryThermistorPin = Peri<'static, PA0>;
pub type ChargerThermistorPin = Peri<'static, PA1>;
pub type SolarVoltagePin = Peri<'static, PA12>;
pub type BatteryVoltagePin = Peri<'static, PA6>;
pub type ProgSensePin = Peri<'static, PA4>;

//////////////////////
//  Charge Control  //
//////////////////////

pub type ChargePwmTimer = Peri<'static, TIM3>;
pub type ChargeCurrentPwmPin = Peri<'static, PA7>; // TIM3_CH2
pub type ChargeStatPin = Peri<'static, PB0>;
pub type BatterySenseEnablePin = Peri<'static, PA11>;
pub type DefaultChargeInhibitPin = Peri<'static, PA5>;

/////////////////
//  Debug I/O  //
/////////////////

pub type UserLedPin = Peri<'static, PC6>;
pub type DebugI2c = Peri<'static, I2C1>;
pub type DebugI2cSclPin = Peri<'static, PB6>;
pub type DebugI2cSdaPin = Peri<'static, PB7>;
