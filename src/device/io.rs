use std::{fs, io, path::PathBuf};

/// Raw access to the driver's parameter store.
///
/// Implementations perform no locking; [`Controller`](crate::controller::Controller)
/// serializes every call.
#[cfg_attr(test, mockall::automock)]
pub trait DeviceIo: Send + Sync + 'static {
    /// Whether the parameter store exists at all.
    fn is_present(&self) -> bool;
    fn read_param(&self, name: &str) -> io::Result<String>;
    fn write_param(&self, name: &str, value: &str) -> io::Result<()>;
}

/// Parameter files under a sysfs module directory,
/// e.g. `/sys/module/tuxedo_wmi/parameters/`.
#[derive(Debug, Clone)]
pub struct SysfsIo {
    root: PathBuf,
}

impl SysfsIo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl DeviceIo for SysfsIo {
    fn is_present(&self) -> bool {
        self.root.is_dir()
    }

    fn read_param(&self, name: &str) -> io::Result<String> {
        fs::read_to_string(self.root.join(name))
    }

    fn write_param(&self, name: &str, value: &str) -> io::Result<()> {
        fs::write(self.root.join(name), value)
    }
}
