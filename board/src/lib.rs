#![no_std]

#![allow(clippy::too_many_arguments)]  // hal constructors take the full pin set for the board

pub mod bus_scan;
pub mod hal;
pub mod optguard;
pub mod pins;
pub mod tasks;
