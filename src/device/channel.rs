use std::fmt;

use log::debug;

use super::{DeviceError, DeviceIo, SysfsIo};
use crate::color::Zone;

/// A single scalar exposed by the backlight driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Param {
    Brightness,
    Off,
    Zone(Zone),
}

impl Param {
    pub const fn file_name(self) -> &'static str {
        match self {
            Param::Brightness => "kb_brightness",
            Param::Off => "kb_off",
            Param::Zone(Zone::Left) => "kb_left",
            Param::Zone(Zone::Center) => "kb_center",
            Param::Zone(Zone::Right) => "kb_right",
        }
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.file_name())
    }
}

/// Typed reads and writes of driver parameters.
///
/// Presence is probed once at construction and cached; when the driver is
/// absent every call fails with [`DeviceError::Unavailable`] without touching
/// the store. The channel holds no lock of its own.
pub struct DeviceChannel {
    io: Box<dyn DeviceIo>,
    present: bool,
}

impl DeviceChannel {
    pub fn new(io: impl DeviceIo) -> Self {
        let present = io.is_present();
        if !present {
            debug!("Keyboard backlight interface not found, backlight control disabled");
        }
        Self {
            io: Box::new(io),
            present,
        }
    }

    /// Channel over the parameter files in `root`.
    pub fn sysfs(root: impl Into<std::path::PathBuf>) -> Self {
        Self::new(SysfsIo::new(root))
    }

    pub const fn present(&self) -> bool {
        self.present
    }

    /// Reads the first line of `param` as an integer.
    pub fn read(&self, param: Param) -> Result<u8, DeviceError> {
        if !self.present {
            return Err(DeviceError::Unavailable);
        }

        let raw = self
            .io
            .read_param(param.file_name())
            .map_err(|source| DeviceError::Read { param, source })?;
        let line = raw.lines().next().unwrap_or_default().trim();

        line.parse().map_err(|_| DeviceError::Parse {
            param,
            value: line.to_string(),
        })
    }

    /// Writes `value` to `param` unless the driver already reports it.
    pub fn write(&self, param: Param, value: u8) -> Result<(), DeviceError> {
        if !self.present {
            return Err(DeviceError::Unavailable);
        }

        match self.read(param) {
            Ok(current) if current == value => {
                debug!("{param} already at {value}, skipping write");
                return Ok(());
            }
            Ok(_) => {}
            Err(e) => debug!("Could not read {param} before writing: {e}"),
        }

        self.io
            .write_param(param.file_name(), &value.to_string())
            .map_err(|source| DeviceError::Write {
                param,
                value,
                source,
            })
    }
}

impl fmt::Debug for DeviceChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceChannel")
            .field("present", &self.present)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::io::MockDeviceIo;
    use mockall::predicate::eq;
    use pretty_assertions::assert_eq;
    use std::io;

    fn present_mock() -> MockDeviceIo {
        let mut io = MockDeviceIo::new();
        io.expect_is_present().return_const(true);
        io
    }

    #[test]
    fn parameter_file_names() {
        assert_eq!(Param::Brightness.file_name(), "kb_brightness");
        assert_eq!(Param::Off.file_name(), "kb_off");
        assert_eq!(Param::Zone(Zone::Center).to_string(), "kb_center");
    }

    #[test]
    fn read_parses_first_line() {
        let mut io = present_mock();
        io.expect_read_param()
            .with(eq("kb_brightness"))
            .returning(|_| Ok("7\nignored\n".to_string()));

        let channel = DeviceChannel::new(io);
        assert_eq!(channel.read(Param::Brightness).unwrap(), 7);
    }

    #[test]
    fn read_rejects_garbage() {
        let mut io = present_mock();
        io.expect_read_param()
            .returning(|_| Ok("bright\n".to_string()));

        let channel = DeviceChannel::new(io);
        assert!(matches!(
            channel.read(Param::Off),
            Err(DeviceError::Parse { param: Param::Off, .. })
        ));
    }

    #[test]
    fn write_skips_when_value_unchanged() {
        let mut io = present_mock();
        io.expect_read_param()
            .with(eq("kb_left"))
            .returning(|_| Ok("2\n".to_string()));
        io.expect_write_param().never();

        let channel = DeviceChannel::new(io);
        channel.write(Param::Zone(Zone::Left), 2).unwrap();
    }

    #[test]
    fn write_stores_ascii_value() {
        let mut io = present_mock();
        io.expect_read_param()
            .returning(|_| Ok("10\n".to_string()));
        io.expect_write_param()
            .with(eq("kb_brightness"), eq("4"))
            .times(1)
            .returning(|_, _| Ok(()));

        let channel = DeviceChannel::new(io);
        channel.write(Param::Brightness, 4).unwrap();
    }

    #[test]
    fn write_failure_is_reported() {
        let mut io = present_mock();
        io.expect_read_param()
            .returning(|_| Ok("10\n".to_string()));
        io.expect_write_param()
            .returning(|_, _| Err(io::Error::from(io::ErrorKind::PermissionDenied)));

        let channel = DeviceChannel::new(io);
        assert!(matches!(
            channel.write(Param::Brightness, 3),
            Err(DeviceError::Write { value: 3, .. })
        ));
    }

    #[test]
    fn absent_device_never_touches_store() {
        let mut io = MockDeviceIo::new();
        io.expect_is_present().times(1).return_const(false);
        io.expect_read_param().never();
        io.expect_write_param().never();

        let channel = DeviceChannel::new(io);
        assert!(!channel.present());
        assert!(matches!(
            channel.read(Param::Brightness),
            Err(DeviceError::Unavailable)
        ));
        assert!(matches!(
            channel.write(Param::Off, 1),
            Err(DeviceError::Unavailable)
        ));
        assert!(!channel.present());
    }
}
