//! Access to the keyboard backlight kernel parameters.
//!
//! The driver exposes one file per parameter (`kb_brightness`, `kb_off`,
//! `kb_left`, `kb_center`, `kb_right`), each holding a single ASCII integer.
//! [`DeviceIo`] is the raw file seam and [`DeviceChannel`] layers parsing,
//! presence caching and redundant-write suppression on top of it.

pub mod channel;
pub mod error;
pub mod io;

#[cfg(test)]
pub mod testing;

pub use channel::{DeviceChannel, Param};
pub use error::DeviceError;
pub use io::{DeviceIo, SysfsIo};
