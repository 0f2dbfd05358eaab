//! In-memory mirror of the keyboard backlight.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use serde::Serialize;

use crate::{
    color::{Color, Zone},
    device::{DeviceChannel, DeviceError, Param},
};

/// Highest brightness level the driver accepts.
pub const MAX_BRIGHTNESS: u8 = 10;

/// Copy of the last state confirmed by the driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BacklightSnapshot {
    pub brightness: u8,
    pub powered_off: bool,
    pub zones: BTreeMap<Zone, Color>,
}

impl Default for BacklightSnapshot {
    fn default() -> Self {
        Self {
            brightness: MAX_BRIGHTNESS,
            powered_off: false,
            zones: Zone::ALL.into_iter().map(|z| (z, Color::Blue)).collect(),
        }
    }
}

/// Device state plus the channel it is read from and written to.
///
/// Every setter writes first and then reads the parameter back, so the mirror
/// only ever holds values the driver has reported. When the driver is absent
/// all operations return the mirrored defaults without error.
#[derive(Debug)]
pub struct BacklightState {
    channel: DeviceChannel,
    mirror: BacklightSnapshot,
}

impl BacklightState {
    /// Wraps `channel` and pulls the current brightness and zone colours.
    pub fn new(channel: DeviceChannel) -> Self {
        let mut state = Self {
            channel,
            mirror: BacklightSnapshot::default(),
        };

        if state.present() {
            if let Err(e) = state.get_brightness() {
                warn!("Initial brightness read failed: {e}");
            }
            if let Err(e) = state.get_zone_colors(&Zone::ALL) {
                warn!("Initial zone colour read failed: {e}");
            }
            info!(
                "Keyboard backlight found: brightness {}, zones {:?}",
                state.mirror.brightness, state.mirror.zones
            );
        }

        state
    }

    pub const fn present(&self) -> bool {
        self.channel.present()
    }

    pub fn snapshot(&self) -> BacklightSnapshot {
        self.mirror.clone()
    }

    pub fn get_brightness(&mut self) -> Result<u8, DeviceError> {
        if !self.present() {
            return Ok(self.mirror.brightness);
        }
        self.mirror.brightness = self.channel.read(Param::Brightness)?;
        Ok(self.mirror.brightness)
    }

    /// Writes `value` (clamped to [`MAX_BRIGHTNESS`]) and returns what the
    /// driver reports afterwards.
    pub fn set_brightness(&mut self, value: u8) -> Result<u8, DeviceError> {
        if !self.present() {
            return Ok(self.mirror.brightness);
        }
        self.channel
            .write(Param::Brightness, value.min(MAX_BRIGHTNESS))?;
        self.get_brightness()
    }

    pub fn get_powered_off(&mut self) -> Result<bool, DeviceError> {
        if !self.present() {
            return Ok(self.mirror.powered_off);
        }
        self.mirror.powered_off = self.channel.read(Param::Off)? != 0;
        Ok(self.mirror.powered_off)
    }

    pub fn set_powered_off(&mut self, off: bool) -> Result<bool, DeviceError> {
        if !self.present() {
            return Ok(self.mirror.powered_off);
        }
        self.channel.write(Param::Off, u8::from(off))?;
        self.get_powered_off()
    }

    /// Reads the colour of each requested zone.
    ///
    /// A zone reporting a code outside the palette, or a value that is not a
    /// colour code at all, keeps its previous mirrored colour; the mismatch is
    /// logged and not returned as an error.
    pub fn get_zone_colors(&mut self, zones: &[Zone]) -> Result<BTreeMap<Zone, Color>, DeviceError> {
        if self.present() {
            for &zone in zones {
                let code = match self.channel.read(Param::Zone(zone)) {
                    Ok(code) => code,
                    Err(e @ DeviceError::Parse { .. }) => {
                        warn!("{zone} zone colour left stale: {e}");
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                match Color::from_code(code) {
                    Some(color) => {
                        self.mirror.zones.insert(zone, color);
                    }
                    None => warn!("{}", DeviceError::UnknownColorCode { zone, code }),
                }
            }
        }

        Ok(self.mirrored_zones(zones))
    }

    /// Writes each zone in `updates`, then re-reads those zones.
    ///
    /// A failed write does not stop the remaining zones from being written.
    /// The zones that were written are still re-read into the mirror before
    /// the first write error is returned.
    pub fn set_zone_colors(
        &mut self,
        updates: &BTreeMap<Zone, Color>,
    ) -> Result<BTreeMap<Zone, Color>, DeviceError> {
        let zones: Vec<Zone> = updates.keys().copied().collect();
        if !self.present() {
            return Ok(self.mirrored_zones(&zones));
        }

        let mut written = Vec::with_capacity(zones.len());
        let mut first_error = None;
        for (&zone, &color) in updates {
            match self.channel.write(Param::Zone(zone), color.code()) {
                Ok(()) => written.push(zone),
                Err(e) => {
                    debug!("{zone} zone not updated: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            None => self.get_zone_colors(&zones),
            Some(e) => {
                if let Err(read) = self.get_zone_colors(&written) {
                    warn!("Re-reading updated zones failed: {read}");
                }
                Err(e)
            }
        }
    }

    fn mirrored_zones(&self, zones: &[Zone]) -> BTreeMap<Zone, Color> {
        zones
            .iter()
            .filter_map(|zone| self.mirror.zones.get(zone).map(|c| (*zone, *c)))
            .collect()
    }
}
