//! Screen density buckets (dpi).

use serde::{Deserialize, Serialize};

/// Error returned when a dpi value is not one of the platform's buckets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0} is not a known density bucket")]
pub struct UnknownDensity(pub u16);

/// A pixel-density bucket as used by resource qualifiers and `densities:` lines.
///
/// Only the values the platform defines (see `DisplayMetrics`) are accepted,
/// plus the two sentinels `anydpi` (65534) and `nodpi` (65535).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Density(u16);

impl Density {
    /// `ldpi`
    pub const LOW: Density = Density(120);
    /// `mdpi`, the baseline density.
    pub const MEDIUM: Density = Density(160);
    /// `tvdpi`
    pub const TV: Density = Density(213);
    /// `hdpi`
    pub const HIGH: Density = Density(240);
    /// `xhdpi`
    pub const XHIGH: Density = Density(320);
    /// `xxhdpi`
    pub const XXHIGH: Density = Density(480);
    /// `xxxhdpi`
    pub const XXXHIGH: Density = Density(640);
    /// `anydpi`: vector resources usable at any density.
    pub const ANY: Density = Density(65534);
    /// `nodpi`: bitmaps that must never be scaled.
    pub const NONE: Density = Density(65535);

    /// All buckets the platform defines, ascending.
    pub const BUCKETS: [u16; 25] = [
        120, 140, 160, 180, 200, 213, 220, 240, 260, 280, 300, 320, 340, 360, 400, 420, 440, 450,
        480, 520, 560, 600, 640, 65534, 65535,
    ];

    /// Accept `dpi` only if it is a defined bucket.
    pub fn new(dpi: u16) -> Option<Self> {
        Self::BUCKETS.contains(&dpi).then_some(Self(dpi))
    }

    /// Map a resource qualifier (`xxhdpi`, `tvdpi`, ...) to its bucket.
    pub fn from_qualifier(qualifier: &str) -> Option<Self> {
        match qualifier {
            "ldpi" => Some(Self::LOW),
            "mdpi" => Some(Self::MEDIUM),
            "tvdpi" => Some(Self::TV),
            "hdpi" => Some(Self::HIGH),
            "xhdpi" => Some(Self::XHIGH),
            "xxhdpi" => Some(Self::XXHIGH),
            "xxxhdpi" => Some(Self::XXXHIGH),
            "anydpi" => Some(Self::ANY),
            "nodpi" => Some(Self::NONE),
            _ => None,
        }
    }

    /// Named qualifier for this bucket, if it has one.
    pub fn qualifier(self) -> Option<&'static str> {
        match self.0 {
            120 => Some("ldpi"),
            160 => Some("mdpi"),
            213 => Some("tvdpi"),
            240 => Some("hdpi"),
            320 => Some("xhdpi"),
            480 => Some("xxhdpi"),
            640 => Some("xxxhdpi"),
            65534 => Some("anydpi"),
            65535 => Some("nodpi"),
            _ => None,
        }
    }

    /// Raw dpi value.
    pub fn dpi(self) -> u16 {
        self.0
    }

    /// Whether this is one of the sentinel buckets rather than a real density.
    pub fn is_sentinel(self) -> bool {
        self.0 >= Self::ANY.0
    }
}

impl TryFrom<u16> for Density {
    type Error = UnknownDensity;

    fn try_from(dpi: u16) -> Result<Self, Self::Error> {
        Self::new(dpi).ok_or(UnknownDensity(dpi))
    }
}

impl From<Density> for u16 {
    fn from(density: Density) -> Self {
        density.0
    }
}

impl std::fmt::Display for Density {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.qualifier() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{}dpi", self.0),
        }
    }
}
