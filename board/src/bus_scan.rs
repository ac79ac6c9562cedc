use core::fmt::Write;

use embassy_stm32::i2c::I2c;
use embassy_stm32::mode::Blocking;

// 16 probe results of three characters each
type ScanRow = heapless::String<48>;

/// Probes every 7-bit address with an empty write and logs an ack map,
/// 16 addresses per row. Reserved addresses 0x00 and 0x7f show as "xx".
pub fn dump_i2c(i2c: &mut I2c<'_, Blocking>) {
    defmt::info!("i2c map:");

    let mut row = ScanRow::new();
    for addr in 0u8..128 {
        if addr == 0 || addr == 127 {
            let _ = write!(row, "xx ");
        } else if i2c.blocking_write(addr, &[]).is_ok() {
            let _ = write!(row, "{:02x} ", addr);
        } else {
            let _ = write!(row, "-- ");
        }

        if addr & 0x0f == 0x0f {
            defmt::info!("  {=str}", row.as_str());
            row.clear();
        }
    }
}
