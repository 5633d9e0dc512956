//! Tunable parameters for every stage of the mosaic pipeline.
//!
//! All thresholds live here as named values so they can be overridden from a
//! JSON file instead of being edited in place. Every section is
//! `#[serde(default)]`, so a file only needs to name the values it changes:
//!
//! ```json
//! { "stabilizer": { "history_depth": 9 }, "selector": { "hysteresis_frames": 15 } }
//! ```
//!
//! Hue values use the 8-bit OpenCV convention (degrees / 2, 0..=180);
//! saturation, value and color channels are 0..=255.

use crate::error::MosaicError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Complete pipeline configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MosaicConfig {
    pub classifier: ClassifierConfig,
    pub stabilizer: StabilizerConfig,
    pub rotation: RotationConfig,
    pub selector: SelectorConfig,
    pub layout: LayoutConfig,
    pub render: RenderConfig,
}

impl MosaicConfig {
    /// Load a configuration from JSON, filling unspecified values with defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, MosaicError> {
        let contents = fs::read_to_string(path).map_err(|e| MosaicError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: MosaicConfig =
            serde_json::from_str(&contents).map_err(|e| MosaicError::Config {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        config.validate().map_err(|message| MosaicError::Config {
            path: path.to_path_buf(),
            message,
        })?;
        Ok(config)
    }

    /// Reject values that would break the stage invariants.
    pub fn validate(&self) -> Result<(), String> {
        let s = &self.stabilizer;
        if s.history_depth == 0 {
            return Err("stabilizer.history_depth must be at least 1".into());
        }
        if !(s.ratio_ema_alpha > 0.0 && s.ratio_ema_alpha <= 1.0) {
            return Err(format!(
                "stabilizer.ratio_ema_alpha must be in (0, 1], got {}",
                s.ratio_ema_alpha
            ));
        }
        if !(0.0..=1.0).contains(&s.fill_ratio_floor) {
            return Err(format!(
                "stabilizer.fill_ratio_floor must be in [0, 1], got {}",
                s.fill_ratio_floor
            ));
        }
        if self.rotation.hysteresis_frames == 0 || self.selector.hysteresis_frames == 0 {
            return Err("hysteresis_frames must be at least 1".into());
        }
        if self.classifier.dominant_divisor == 0 {
            return Err("classifier.dominant_divisor must be at least 1".into());
        }
        let l = &self.layout;
        if !(l.max_patch_area_fraction > 0.0 && l.max_patch_area_fraction <= 1.0) {
            return Err(format!(
                "layout.max_patch_area_fraction must be in (0, 1], got {}",
                l.max_patch_area_fraction
            ));
        }
        Ok(())
    }
}

/// Inclusive hue interval on the 0..=180 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HueBand {
    pub min: u8,
    pub max: u8,
}

impl HueBand {
    pub const fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, hue: u8) -> bool {
        hue >= self.min && hue <= self.max
    }
}

/// Pixels matching this band are "neutral" (white, gray, black or washed out)
/// and do not count toward the colorful total.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NeutralBand {
    pub min_saturation: u8,
    pub min_value: u8,
    /// Above this value a pixel is washed out unless it is strongly saturated.
    pub washed_out_value: u8,
    pub washed_out_saturation: u8,
}

impl Default for NeutralBand {
    fn default() -> Self {
        Self {
            min_saturation: 35,
            min_value: 40,
            washed_out_value: 230,
            washed_out_saturation: 50,
        }
    }
}

/// Red wraps around the hue circle, so it carries two bands.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RedRule {
    pub hue: HueBand,
    pub wrap_hue: HueBand,
    pub min_red: u8,
    /// Red must exceed both green and blue by this factor.
    pub dominance: f32,
}

impl Default for RedRule {
    fn default() -> Self {
        Self {
            hue: HueBand::new(0, 10),
            wrap_hue: HueBand::new(170, 180),
            min_red: 100,
            dominance: 1.3,
        }
    }
}

/// Orange additionally requires the channel ordering r > g > b.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrangeRule {
    pub hue: HueBand,
    pub min_red: u8,
    pub min_green: u8,
}

impl Default for OrangeRule {
    fn default() -> Self {
        Self {
            hue: HueBand::new(11, 25),
            min_red: 120,
            min_green: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YellowRule {
    pub hue: HueBand,
    pub min_red: u8,
    pub min_green: u8,
    pub max_red_green_gap: u8,
}

impl Default for YellowRule {
    fn default() -> Self {
        Self {
            hue: HueBand::new(26, 34),
            min_red: 120,
            min_green: 120,
            max_red_green_gap: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GreenRule {
    pub hue: HueBand,
    pub min_green: u8,
    /// Green must exceed both red and blue by this factor.
    pub dominance: f32,
}

impl Default for GreenRule {
    fn default() -> Self {
        Self {
            hue: HueBand::new(35, 85),
            min_green: 60,
            dominance: 1.05,
        }
    }
}

/// Purple requires red and blue both above green and close to each other.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurpleRule {
    pub hue: HueBand,
    pub min_red: u8,
    pub min_blue: u8,
    pub max_red_blue_gap: u8,
}

impl Default for PurpleRule {
    fn default() -> Self {
        Self {
            hue: HueBand::new(121, 170),
            min_red: 60,
            min_blue: 60,
            max_red_blue_gap: 100,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BlueRule {
    pub hue: HueBand,
    pub min_blue: u8,
    pub over_red: f32,
    pub over_green: f32,
    pub max_red: u8,
}

impl Default for BlueRule {
    fn default() -> Self {
        Self {
            hue: HueBand::new(90, 120),
            min_blue: 80,
            over_red: 1.2,
            over_green: 1.1,
            max_red: 120,
        }
    }
}

/// Per-pixel color rules and the dominance test applied to their counts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub neutral: NeutralBand,
    pub red: RedRule,
    pub orange: OrangeRule,
    pub yellow: YellowRule,
    pub green: GreenRule,
    pub purple: PurpleRule,
    pub blue: BlueRule,
    /// Absolute floor a color count must exceed to be dominant.
    pub min_dominant_pixels: u32,
    /// A dominant color must also exceed `colorful / dominant_divisor`.
    pub dominant_divisor: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            neutral: NeutralBand::default(),
            red: RedRule::default(),
            orange: OrangeRule::default(),
            yellow: YellowRule::default(),
            green: GreenRule::default(),
            purple: PurpleRule::default(),
            blue: BlueRule::default(),
            min_dominant_pixels: 3,
            dominant_divisor: 15,
        }
    }
}

/// Temporal smoothing of per-patch classifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilizerConfig {
    /// Number of accepted labels kept for the majority vote.
    pub history_depth: usize,
    /// Weight of the newest sample in the fill-ratio moving average.
    pub ratio_ema_alpha: f32,
    /// Raw fill ratios below this floor count as an empty patch.
    pub fill_ratio_floor: f32,
}

impl Default for StabilizerConfig {
    fn default() -> Self {
        Self {
            history_depth: 7,
            ratio_ema_alpha: 0.3,
            fill_ratio_floor: 0.15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    /// Consecutive consistent estimates required to commit a new rotation.
    pub hysteresis_frames: u32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self { hysteresis_frames: 6 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Consecutive identical detections required to switch layouts.
    pub hysteresis_frames: u32,
    /// Pixels whose HSV value (max channel) is below this are line pixels.
    pub line_value_threshold: u8,
    /// Radius of the morphological closing applied to the line mask.
    pub close_radius: u8,
    /// Clear the newly active layout's patch histories on a switch.
    pub reset_histories_on_switch: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            hysteresis_frames: 10,
            line_value_threshold: 90,
            close_radius: 2,
            reset_histories_on_switch: true,
        }
    }
}

/// Layout ingestion from reference images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    /// Gray levels at or below this are boundary lines in the reference image.
    pub line_threshold: u8,
    pub line_dilate_radius: u8,
    /// Minimum patch area in square pixels.
    pub min_patch_area: f32,
    /// Maximum patch area as a fraction of the reference image area.
    pub max_patch_area_fraction: f32,
    /// Pixels shaved off each patch mask so boundary lines are not sampled.
    pub mask_inset_px: u8,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            line_threshold: 200,
            line_dilate_radius: 1,
            min_patch_area: 200.0,
            max_patch_area_fraction: 0.2,
            mask_inset_px: 2,
        }
    }
}

/// Composite rendering. Colors are (B, G, R) triples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub boundary_bgr: [u8; 3],
    pub empty_bgr: [u8; 3],
    pub text_bgr: [u8; 3],
    pub text_scale: f32,
    /// TrueType font used for fill-ratio labels; no labels are drawn without one.
    pub font_path: Option<PathBuf>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            boundary_bgr: [0, 0, 0],
            empty_bgr: [255, 255, 255],
            text_bgr: [0, 0, 0],
            text_scale: 18.0,
            font_path: None,
        }
    }
}
