use std::fmt::{Display, Formatter, UpperHex};
use std::str::FromStr;
use thiserror::Error;

#[cfg(test)]
use quickcheck::{Arbitrary, Gen};

/// Number of bytes a single color occupies in canvas memory and on the wire
pub const COLOR_BYTES: usize = 3;

/// Color data represented as red, green, and blue channels each having a depth of 8 bits
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default, Hash)]
pub struct Color(pub u8, pub u8, pub u8);

/// An error which indicates that a token is not a valid `RRGGBB` hex color
#[derive(Debug, Error, Clone, Eq, PartialEq)]
#[error("Could not parse HEX color {token:?}: expected exactly 6 hex digits (000000 - FFFFFF)")]
pub struct ColorParseError {
    token: String,
}

impl Color {
    /// Decode a color from its 6 digit hex representation (`RRGGBB`, case-insensitive, without `#`)
    pub fn from_hex(token: &str) -> Result<Self, ColorParseError> {
        let digits = token.as_bytes();
        if digits.len() != COLOR_BYTES * 2 || !digits.iter().all(u8::is_ascii_hexdigit) {
            return Err(ColorParseError {
                token: token.to_owned(),
            });
        }

        let channel = |i: usize| (hex_value(digits[i * 2]) << 4) | hex_value(digits[i * 2 + 1]);
        Ok(Self(channel(0), channel(1), channel(2)))
    }
}

/// Value of a single ascii hex digit that has already been validated
#[inline(always)]
fn hex_value(digit: u8) -> u8 {
    match digit {
        b'0'..=b'9' => digit - b'0',
        b'a'..=b'f' => digit - b'a' + 10,
        _ => digit - b'A' + 10,
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl From<[u8; 3]> for Color {
    fn from(data: [u8; 3]) -> Self {
        Self(data[0], data[1], data[2])
    }
}

impl From<Color> for [u8; 3] {
    fn from(value: Color) -> Self {
        [value.0, value.1, value.2]
    }
}

impl From<(u8, u8, u8)> for Color {
    fn from(value: (u8, u8, u8)) -> Self {
        Self(value.0, value.1, value.2)
    }
}

/// Interprets the lower 24 bits as `0xRRGGBB`
impl From<u32> for Color {
    fn from(src: u32) -> Self {
        let b = src.to_be_bytes();
        Self(b[1], b[2], b[3])
    }
}

impl From<Color> for u32 {
    fn from(value: Color) -> Self {
        (value.0 as u32) << 16 | (value.1 as u32) << 8 | value.2 as u32
    }
}

impl UpperHex for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        // format each byte as hex string with at least two characters and leading zeroes
        f.write_fmt(format_args!("{:02X}{:02X}{:02X}", self.0, self.1, self.2))
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        UpperHex::fmt(self, f)
    }
}

#[cfg(test)]
impl Arbitrary for Color {
    fn arbitrary(g: &mut Gen) -> Self {
        Self(u8::arbitrary(g), u8::arbitrary(g), u8::arbitrary(g))
    }
}
