use bytemuck::{Pod, Zeroable};
use std::{
    fmt,
    ops::{Add, Mul, Sub},
    str::FromStr,
};

/// ABGR color packed as u32 value (most of the platforms are little-endian)
///
/// This is the pixel type of the actual images produced by a rasterizer under test.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Pod, Zeroable)]
pub struct RGBA(u32);

impl RGBA {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self(((a as u32) << 24) | ((b as u32) << 16) | ((g as u32) << 8) | (r as u32))
    }

    pub const fn alpha(self) -> u8 {
        ((self.0 >> 24) & 0xff) as u8
    }

    pub const fn blue(self) -> u8 {
        ((self.0 >> 16) & 0xff) as u8
    }

    pub const fn green(self) -> u8 {
        ((self.0 >> 8) & 0xff) as u8
    }

    pub const fn red(self) -> u8 {
        (self.0 & 0xff) as u8
    }

    pub fn to_rgba(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    pub fn to_rgb(self) -> [u8; 3] {
        let [r, g, b, _] = self.to_rgba();
        [r, g, b]
    }

    /// Largest per-channel difference between red, green and blue channels
    pub fn rgb_distance(self, other: Self) -> u8 {
        let [r0, g0, b0] = self.to_rgb();
        let [r1, g1, b1] = other.to_rgb();
        r0.abs_diff(r1).max(g0.abs_diff(g1)).max(b0.abs_diff(b1))
    }
}

impl From<LinColor> for RGBA {
    fn from(color: LinColor) -> Self {
        let [r, g, b, a] = color.to_unorm8();
        RGBA::new(r, g, b, a)
    }
}

impl fmt::Debug for RGBA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGBA({})", self)
    }
}

impl fmt::Display for RGBA {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, a] = self.to_rgba();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)?;
        if a != 255 {
            write!(f, "{:02x}", a)?;
        }
        Ok(())
    }
}

impl FromStr for RGBA {
    type Err = ColorError;

    fn from_str(color: &str) -> Result<Self, Self::Err> {
        if color.starts_with('#') && (color.len() == 7 || color.len() == 9) {
            // #RRGGBB(AA)
            let bytes: &[u8] = color[1..].as_ref();
            let digit = |byte| match byte {
                b'A'..=b'F' => Ok(byte - b'A' + 10),
                b'a'..=b'f' => Ok(byte - b'a' + 10),
                b'0'..=b'9' => Ok(byte - b'0'),
                _ => Err(ColorError::HexExpected),
            };
            let mut hex = bytes
                .chunks(2)
                .map(|pair| Ok((digit(pair[0])? << 4) | digit(pair[1])?));
            Ok(RGBA::new(
                hex.next().unwrap_or(Ok(0))?,
                hex.next().unwrap_or(Ok(0))?,
                hex.next().unwrap_or(Ok(0))?,
                hex.next().unwrap_or(Ok(255))?,
            ))
        } else {
            Err(ColorError::HexExpected)
        }
    }
}

#[cfg(feature = "serde")]
impl serde::Serialize for RGBA {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(feature = "serde")]
impl<'de> serde::Deserialize<'de> for RGBA {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let color = std::borrow::Cow::<'de, str>::deserialize(deserializer)?;
        color.parse().map_err(serde::de::Error::custom)
    }
}

/// Normalized (unorm) RGBA color with `f32` channels, not alpha premultiplied
///
/// Vertex colors and reference pixels are kept in this representation, values
/// are only quantized when compared against the actual image.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinColor([f32; 4]);

impl LinColor {
    pub const BLACK: Self = Self([0.0, 0.0, 0.0, 1.0]);
    pub const WHITE: Self = Self([1.0, 1.0, 1.0, 1.0]);

    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self([r, g, b, a])
    }

    #[inline]
    pub fn red(self) -> f32 {
        self.0[0]
    }

    #[inline]
    pub fn green(self) -> f32 {
        self.0[1]
    }

    #[inline]
    pub fn blue(self) -> f32 {
        self.0[2]
    }

    #[inline]
    pub fn alpha(self) -> f32 {
        self.0[3]
    }

    /// Linear interpolation between self and other colors.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// Channel-wise minimum
    pub fn min(self, other: Self) -> Self {
        let Self([r0, g0, b0, a0]) = self;
        let Self([r1, g1, b1, a1]) = other;
        Self([r0.min(r1), g0.min(g1), b0.min(b1), a0.min(a1)])
    }

    /// Channel-wise maximum
    pub fn max(self, other: Self) -> Self {
        let Self([r0, g0, b0, a0]) = self;
        let Self([r1, g1, b1, a1]) = other;
        Self([r0.max(r1), g0.max(g1), b0.max(b1), a0.max(a1)])
    }

    /// Largest absolute difference between red, green and blue channels
    pub fn rgb_distance(self, other: Self) -> f32 {
        let Self([r0, g0, b0, _]) = self;
        let Self([r1, g1, b1, _]) = other;
        (r0 - r1).abs().max((g0 - g1).abs()).max((b0 - b1).abs())
    }

    /// Quantize to 8-bit unorm channels, rounding to nearest
    pub fn to_unorm8(self) -> [u8; 4] {
        self.0
            .map(|c| (crate::utils::clamp(c, 0.0, 1.0) * 255.0 + 0.5) as u8)
    }
}

impl Add<Self> for LinColor {
    type Output = Self;

    #[inline(always)]
    fn add(self, other: Self) -> Self::Output {
        let Self([r0, g0, b0, a0]) = self;
        let Self([r1, g1, b1, a1]) = other;
        Self([r0 + r1, g0 + g1, b0 + b1, a0 + a1])
    }
}

impl Sub<Self> for LinColor {
    type Output = Self;

    #[inline(always)]
    fn sub(self, other: Self) -> Self::Output {
        let Self([r0, g0, b0, a0]) = self;
        let Self([r1, g1, b1, a1]) = other;
        Self([r0 - r1, g0 - g1, b0 - b1, a0 - a1])
    }
}

impl Mul<f32> for LinColor {
    type Output = Self;

    #[inline(always)]
    fn mul(self, scale: f32) -> Self::Output {
        Self(self.0.map(|c| c * scale))
    }
}

impl From<RGBA> for LinColor {
    fn from(color: RGBA) -> Self {
        Self(color.to_rgba().map(|c| c as f32 / 255.0))
    }
}

impl From<[f32; 4]> for LinColor {
    fn from(color: [f32; 4]) -> Self {
        Self(color)
    }
}

impl From<LinColor> for [f32; 4] {
    fn from(color: LinColor) -> Self {
        color.0
    }
}

impl fmt::Display for LinColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Self([r, g, b, a]) = self;
        write!(f, "({:.3}, {:.3}, {:.3}, {:.3})", r, g, b, a)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ColorError {
    #[error("color expected to be #RRGGBB(AA)")]
    HexExpected,
}
