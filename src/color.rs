//! Keyboard zones and the indexed colour palette understood by the driver.

use std::{fmt, str::FromStr};

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// One of the three independently colourable keyboard regions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Left,
    Center,
    Right,
}

impl Zone {
    pub const ALL: [Zone; 3] = [Zone::Left, Zone::Center, Zone::Right];

    pub const fn as_str(self) -> &'static str {
        match self {
            Zone::Left => "left",
            Zone::Center => "center",
            Zone::Right => "right",
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Zone {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::ALL
            .into_iter()
            .find(|zone| zone.as_str() == s)
            .ok_or_else(|| anyhow!("Unknown keyboard zone '{s}'"))
    }
}

/// Colours the backlight can display.
///
/// The driver only understands the numeric code; the rest of the daemon only
/// deals in `Color`. The code table is fixed by the kernel module:
///
/// | colour | code |
/// |--------|------|
/// | off    | 0    |
/// | blue   | 1    |
/// | red    | 2    |
/// | purple | 3    |
/// | green  | 4    |
/// | ice    | 5    |
/// | yellow | 6    |
/// | white  | 7    |
/// | aqua   | 8    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Off,
    Blue,
    Red,
    Purple,
    Green,
    Ice,
    Yellow,
    White,
    Aqua,
}

impl Color {
    /// Palette in code order; the index of each entry is its driver code.
    const TABLE: [Color; 9] = [
        Color::Off,
        Color::Blue,
        Color::Red,
        Color::Purple,
        Color::Green,
        Color::Ice,
        Color::Yellow,
        Color::White,
        Color::Aqua,
    ];

    pub fn code(self) -> u8 {
        Self::TABLE
            .iter()
            .position(|c| *c == self)
            .map_or(0, |idx| idx as u8)
    }

    /// Decodes a driver code; `None` for anything outside the table.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::TABLE.get(usize::from(code)).copied()
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Color::Off => "off",
            Color::Blue => "blue",
            Color::Red => "red",
            Color::Purple => "purple",
            Color::Green => "green",
            Color::Ice => "ice",
            Color::Yellow => "yellow",
            Color::White => "white",
            Color::Aqua => "aqua",
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Color {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::TABLE
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| anyhow!("Unknown colour '{s}'"))
    }
}
