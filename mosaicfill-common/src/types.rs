use serde::{Deserialize, Serialize};
use std::fmt;

/// The fixed six-color palette a patch can be classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColorLabel {
    Red,
    Orange,
    Yellow,
    Green,
    Blue,
    Purple,
}

impl ColorLabel {
    /// Evaluation order of the color predicates.
    ///
    /// Hue bands overlap, so this order is part of the classification contract:
    /// the first matching predicate wins a pixel, and the dominant-color scan
    /// resolves equal counts in favour of the earlier entry.
    pub const PRIORITY: [ColorLabel; 6] = [
        ColorLabel::Red,
        ColorLabel::Orange,
        ColorLabel::Yellow,
        ColorLabel::Green,
        ColorLabel::Purple,
        ColorLabel::Blue,
    ];

    /// Display color as a (B, G, R) triple
    pub fn display_bgr(&self) -> [u8; 3] {
        match self {
            ColorLabel::Red => [0, 0, 255],
            ColorLabel::Orange => [0, 165, 255],
            ColorLabel::Yellow => [0, 255, 255],
            ColorLabel::Green => [0, 255, 0],
            ColorLabel::Blue => [255, 0, 0],
            ColorLabel::Purple => [255, 0, 255],
        }
    }

    /// Display color as an (R, G, B) triple, the channel order of `image::Rgb`
    pub fn display_rgb(&self) -> [u8; 3] {
        let [b, g, r] = self.display_bgr();
        [r, g, b]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ColorLabel::Red => "Red",
            ColorLabel::Orange => "Orange",
            ColorLabel::Yellow => "Yellow",
            ColorLabel::Green => "Green",
            ColorLabel::Blue => "Blue",
            ColorLabel::Purple => "Purple",
        }
    }

    /// Parse a color name, ignoring ASCII case
    pub fn from_name(name: &str) -> Option<Self> {
        Self::PRIORITY
            .into_iter()
            .find(|label| label.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Position of this label in [`ColorLabel::PRIORITY`]
    pub fn priority(&self) -> usize {
        match self {
            ColorLabel::Red => 0,
            ColorLabel::Orange => 1,
            ColorLabel::Yellow => 2,
            ColorLabel::Green => 3,
            ColorLabel::Purple => 4,
            ColorLabel::Blue => 5,
        }
    }
}

impl fmt::Display for ColorLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Physical rotation of the mosaic surface, in clockwise quarter turns
///
/// Serialized as its angle in degrees (0, 90, 180 or 270).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u32", try_from = "u32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    pub fn degrees(&self) -> u32 {
        self.quarter_turns() as u32 * 90
    }

    pub fn from_degrees(degrees: u32) -> Option<Self> {
        match degrees {
            0 => Some(Rotation::Deg0),
            90 => Some(Rotation::Deg90),
            180 => Some(Rotation::Deg180),
            270 => Some(Rotation::Deg270),
            _ => None,
        }
    }

    pub fn quarter_turns(&self) -> u8 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    /// Build from a quarter-turn count, wrapping modulo 4
    pub fn from_quarter_turns(turns: u8) -> Self {
        match turns % 4 {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    /// The rotation that undoes this one
    pub fn inverse(&self) -> Self {
        Self::from_quarter_turns(4 - self.quarter_turns())
    }

    /// Whether applying this rotation swaps image width and height
    pub fn swaps_axes(&self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl fmt::Display for Rotation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}°", self.degrees())
    }
}

impl From<Rotation> for u32 {
    fn from(rotation: Rotation) -> Self {
        rotation.degrees()
    }
}

impl TryFrom<u32> for Rotation {
    type Error = String;

    fn try_from(degrees: u32) -> Result<Self, Self::Error> {
        Rotation::from_degrees(degrees)
            .ok_or_else(|| format!("rotation must be 0, 90, 180 or 270 degrees, got {degrees}"))
    }
}

/// 2D point in pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2D {
    pub x: f32,
    pub y: f32,
}

impl Point2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Stabilized state of one patch after a frame has been processed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchState {
    /// Patch index within its layout
    pub id: usize,
    /// Majority-voted label, `None` while the patch reads as empty
    pub label: Option<ColorLabel>,
    /// Smoothed share of colorful pixels in the patch interior, in [0, 1]
    pub fill_ratio: f32,
    /// Area centroid in the layout's native pixel coordinates
    pub centroid: Point2D,
}

/// Output format for replayed frames
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputFormat {
    Png,
    Json,
    Both,
}

impl OutputFormat {
    pub fn includes_png(&self) -> bool {
        matches!(self, OutputFormat::Png | OutputFormat::Both)
    }

    pub fn includes_json(&self) -> bool {
        matches!(self, OutputFormat::Json | OutputFormat::Both)
    }
}
