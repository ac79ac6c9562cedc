//! Hardware independent control logic for a solar powered Li-ion charge
//! controller built around an MCP73831 and a PWM driven current setpoint.
//!
//! Everything in this crate runs on the host for testing; the `hal` module
//! defines the trait a board crate implements to bind it to real hardware.

#![cfg_attr(not(test), no_std)]

// This mod MUST go first, so that the others see its macros.
pub(crate) mod fmt;

pub mod adc;
pub mod config;
pub mod control;
pub mod hal;
pub mod rand;
pub mod stat;
pub mod status;
pub mod thermistor;
