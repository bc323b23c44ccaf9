//! Firmware-only glue: concrete radio drivers, board bring-up, the USB
//! host-link transport and the console command table. Everything hardware-
//! agnostic lives in `usbrf-core`; this crate only implements its traits
//! against real STM32F103 peripherals.
#![no_std]

pub mod antenna;
pub mod board;
pub mod console;
pub mod flash_config;
pub mod radio;
pub mod shared;
pub mod tick;
pub mod usb_hostlink;
