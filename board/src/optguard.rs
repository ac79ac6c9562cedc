use embassy_stm32::pac;

const FLASH_KEY1: u32 = 0x4567_0123;
const FLASH_KEY2: u32 = 0xCDEF_89AB;
const FLASH_OPTKEY1: u32 = 0x0819_2A3B;
const FLASH_OPTKEY2: u32 = 0x4C5D_6E7F;

/// Forces nBOOT_SEL back to pin-selected boot.
///
/// Parts ship from the factory with nBOOT_SEL set, and once main flash holds a
/// valid image that setting locks out the BOOT0 strap and the UART bootloader
/// with it. When the bit is found set this clears it and relaunches the option
/// bytes, which resets the chip, so that path never returns.
pub fn ensure_boot_pin_enabled() {
    let flash = pac::FLASH;

    if !flash.optr().read().n_boot_sel() {
        defmt::debug!("option bytes already select BOOT0 from pin");
        return;
    }

    defmt::info!("reprogramming option bytes to boot from the BOOT0 pin");

    while flash.sr().read().bsy1() {}

    if flash.cr().read().lock() {
        flash.keyr().write_value(FLASH_KEY1);
        flash.keyr().write_value(FLASH_KEY2);
    }
    if flash.cr().read().optlock() {
        flash.optkeyr().write_value(FLASH_OPTKEY1);
        flash.optkeyr().write_value(FLASH_OPTKEY2);
    }

    flash.optr().modify(|w| w.set_n_boot_sel(false));
    flash.cr().modify(|w| w.set_optstrt(true));

    while flash.sr().read().bsy1() || flash.sr().read().cfgbsy() {}

    // reloading the option bytes resets the chip
    flash.cr().modify(|w| w.set_obl_launch(true));

    loop {
        cortex_m::asm::nop();
    }
}
