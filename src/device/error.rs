use std::io;

use thiserror::Error;

use super::Param;
use crate::color::Zone;

/// Failures surfaced by the device layer.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The driver's parameter directory does not exist.
    #[error("keyboard backlight interface is not present")]
    Unavailable,

    #[error("failed to read {param}: {source}")]
    Read {
        param: Param,
        #[source]
        source: io::Error,
    },

    #[error("{param} holds a non-integer value {value:?}")]
    Parse { param: Param, value: String },

    #[error("failed to write {value} to {param}: {source}")]
    Write {
        param: Param,
        value: u8,
        #[source]
        source: io::Error,
    },

    /// The driver reported a colour code outside the known palette.
    #[error("{zone} zone reports unknown colour code {code}")]
    UnknownColorCode { zone: Zone, code: u8 },
}
