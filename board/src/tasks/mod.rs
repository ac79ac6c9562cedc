use embassy_stm32::{
    rcc::{
        mux::Adcsel, AHBPrescaler, APBPrescaler, Pll, PllMul, PllPreDiv, PllRDiv, PllSource,
        Sysclk,
    },
    Config,
};

pub mod charge_task;

pub fn get_system_config() -> Config {
    let mut config = Config::default();

    // configure the main PLL, the board has no crystal so everything runs from the HSI
    config.rcc.pll = Some(Pll {
        source: PllSource::HSI,
        prediv: PllPreDiv::DIV1, // root frequency to the PLL is the raw HSI at 16 MHz
        mul: PllMul::MUL8,       // multiply up by 8 to get 128 MHz
        divp: None,
        divq: None,
        divr: Some(PllRDiv::DIV2), // 128 MHz / 2 = 64 MHz r which feeds sysclk
    });

    // run the ADC from the system clock instead of the async HSI path
    config.rcc.mux.adcsel = Adcsel::SYS;

    // configure the busses
    config.rcc.ahb_pre = AHBPrescaler::DIV1;
    config.rcc.apb1_pre = APBPrescaler::DIV1;

    // all configs should be good now, switch the system root clock from the raw HSI (16 MHz) to the PLL (64 MHz)
    config.rcc.sys = Sysclk::PLL1_R;

    config
}
