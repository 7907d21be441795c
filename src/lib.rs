//! LCD tester companion library
//!
//! - [`install`] - dependency bootstrap (toolchains, SDKs, portable Python)
//! - [`convert`] - image to C source conversion through the LVGL script
//! - [`firmware`] - firmware configure/build and flashing
//! - [`config`] - settings with compiled-in defaults

pub mod config;
pub mod convert;
pub mod firmware;
pub mod install;
