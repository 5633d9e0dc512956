//! Dominant-color classification of a single patch.
//!
//! Every masked pixel is first tested against the neutral band (too gray, too
//! dark or washed out). Colorful pixels are then offered to six color
//! predicates in [`ColorLabel::PRIORITY`] order; the first predicate that
//! accepts the pixel gets its vote. A color is dominant when its vote count is
//! strictly above both the absolute floor and `colorful / dominant_divisor`,
//! and strictly above every color scanned before it, so equal counts go to the
//! earlier color in priority order.
//!
//! The classifier is a pure function of its inputs and keeps no state.

use crate::color::{ColorSample, HsvImage};
use crate::config::ClassifierConfig;
use crate::layout::PatchMask;
use image::RgbImage;
use mosaicfill_common::ColorLabel;

/// Raw per-frame classification of one patch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClassificationResult {
    /// Dominant color, `None` when no color clears the dominance threshold
    pub label: Option<ColorLabel>,
    /// Colorful pixels / masked pixels, 0 for an empty mask
    pub fill_ratio: f32,
}

impl ClassificationResult {
    pub const EMPTY: ClassificationResult = ClassificationResult {
        label: None,
        fill_ratio: 0.0,
    };
}

type Predicate = fn(&ClassifierConfig, &ColorSample) -> bool;

/// Color predicates in evaluation priority. Must list labels in the same order
/// as [`ColorLabel::PRIORITY`] so counter slots line up with `priority()`.
const PREDICATES: [(ColorLabel, Predicate); 6] = [
    (ColorLabel::Red, is_red),
    (ColorLabel::Orange, is_orange),
    (ColorLabel::Yellow, is_yellow),
    (ColorLabel::Green, is_green),
    (ColorLabel::Purple, is_purple),
    (ColorLabel::Blue, is_blue),
];

#[inline]
fn exceeds(channel: u8, other: u8, factor: f32) -> bool {
    channel as f32 > other as f32 * factor
}

fn is_red(cfg: &ClassifierConfig, px: &ColorSample) -> bool {
    let rule = &cfg.red;
    (rule.hue.contains(px.h) || rule.wrap_hue.contains(px.h))
        && px.r > rule.min_red
        && exceeds(px.r, px.g, rule.dominance)
        && exceeds(px.r, px.b, rule.dominance)
}

fn is_orange(cfg: &ClassifierConfig, px: &ColorSample) -> bool {
    let rule = &cfg.orange;
    rule.hue.contains(px.h)
        && px.r > rule.min_red
        && px.g > rule.min_green
        && px.g < px.r
        && px.b < px.g
}

fn is_yellow(cfg: &ClassifierConfig, px: &ColorSample) -> bool {
    let rule = &cfg.yellow;
    rule.hue.contains(px.h)
        && px.r > rule.min_red
        && px.g > rule.min_green
        && px.r.abs_diff(px.g) < rule.max_red_green_gap
}

fn is_green(cfg: &ClassifierConfig, px: &ColorSample) -> bool {
    let rule = &cfg.green;
    rule.hue.contains(px.h)
        && px.g >= rule.min_green
        && exceeds(px.g, px.r, rule.dominance)
        && exceeds(px.g, px.b, rule.dominance)
}

fn is_purple(cfg: &ClassifierConfig, px: &ColorSample) -> bool {
    let rule = &cfg.purple;
    rule.hue.contains(px.h)
        && px.r > rule.min_red
        && px.b > rule.min_blue
        && px.r > px.g
        && px.b > px.g
        && px.r.abs_diff(px.b) < rule.max_red_blue_gap
}

fn is_blue(cfg: &ClassifierConfig, px: &ColorSample) -> bool {
    let rule = &cfg.blue;
    rule.hue.contains(px.h)
        && px.b >= rule.min_blue
        && exceeds(px.b, px.r, rule.over_red)
        && exceeds(px.b, px.g, rule.over_green)
        && px.r < rule.max_red
}

/// Running vote counts for one patch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorTally {
    /// Votes per color, indexed by [`ColorLabel::priority`]
    pub counts: [u32; 6],
    /// Pixels under the mask
    pub masked: u32,
    /// Masked pixels that were not neutral
    pub colorful: u32,
}

impl ColorTally {
    pub fn count(&self, label: ColorLabel) -> u32 {
        self.counts[label.priority()]
    }

    /// Minimum count a color must strictly exceed to be dominant
    pub fn threshold(&self, cfg: &ClassifierConfig) -> u32 {
        cfg.min_dominant_pixels
            .max(self.colorful / cfg.dominant_divisor.max(1))
    }

    pub fn dominant(&self, cfg: &ClassifierConfig) -> Option<ColorLabel> {
        let threshold = self.threshold(cfg);
        let mut best = None;
        let mut best_count = 0;
        for label in ColorLabel::PRIORITY {
            let count = self.count(label);
            if count > threshold && count > best_count {
                best_count = count;
                best = Some(label);
            }
        }
        best
    }

    pub fn fill_ratio(&self) -> f32 {
        if self.masked == 0 {
            0.0
        } else {
            self.colorful as f32 / self.masked as f32
        }
    }
}

/// Stateless dominant-color classifier
#[derive(Debug, Clone, Default)]
pub struct PatchColorClassifier {
    config: ClassifierConfig,
}

impl PatchColorClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Whether a pixel is white, gray, black or washed out
    pub fn is_neutral(&self, px: &ColorSample) -> bool {
        let n = &self.config.neutral;
        px.s < n.min_saturation
            || px.v < n.min_value
            || (px.v > n.washed_out_value && px.s < n.washed_out_saturation)
    }

    /// First color predicate accepting a (non-neutral) pixel
    pub fn label_of(&self, px: &ColorSample) -> Option<ColorLabel> {
        PREDICATES
            .iter()
            .find(|(_, predicate)| predicate(&self.config, px))
            .map(|(label, _)| *label)
    }

    /// Add one masked pixel to a tally
    pub fn observe(&self, tally: &mut ColorTally, px: &ColorSample) {
        tally.masked += 1;
        if self.is_neutral(px) {
            return;
        }
        tally.colorful += 1;
        if let Some(label) = self.label_of(px) {
            tally.counts[label.priority()] += 1;
        }
    }

    pub fn finish(&self, tally: &ColorTally) -> ClassificationResult {
        ClassificationResult {
            label: tally.dominant(&self.config),
            fill_ratio: tally.fill_ratio(),
        }
    }

    /// Classify an explicit set of masked samples
    pub fn classify_samples<I>(&self, samples: I) -> ClassificationResult
    where
        I: IntoIterator<Item = ColorSample>,
    {
        let mut tally = ColorTally::default();
        for px in samples {
            self.observe(&mut tally, &px);
        }
        self.finish(&tally)
    }

    /// Tally the frame pixels selected by `mask`
    pub fn tally(&self, frame: &RgbImage, hsv: &HsvImage, mask: &PatchMask) -> ColorTally {
        let mut tally = ColorTally::default();
        let width = frame.width().min(hsv.width());
        let height = frame.height().min(hsv.height());

        for (mx, my, m) in mask.mask.enumerate_pixels() {
            if m[0] == 0 {
                continue;
            }
            let x = mask.origin.0 + mx;
            let y = mask.origin.1 + my;
            if x >= width || y >= height {
                continue;
            }
            let [r, g, b] = frame.get_pixel(x, y).0;
            let px = ColorSample::new([b, g, r], hsv.get_pixel(x, y).0);
            self.observe(&mut tally, &px);
        }
        tally
    }

    /// Classify the patch interior selected by `mask`
    pub fn classify(&self, frame: &RgbImage, hsv: &HsvImage, mask: &PatchMask) -> ClassificationResult {
        let tally = self.tally(frame, hsv, mask);
        self.finish(&tally)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Red: hue 0, strong red channel
    const RED: [u8; 3] = [200, 40, 40];
    // Cyan-green at hue 88: colorful but outside every band
    const TEAL: [u8; 3] = [40, 170, 160];
    const ORANGE: [u8; 3] = [240, 140, 20];
    const YELLOW: [u8; 3] = [230, 220, 40];
    const GREEN: [u8; 3] = [40, 200, 60];
    const BLUE: [u8; 3] = [30, 60, 200];
    const PURPLE: [u8; 3] = [150, 40, 170];

    fn samples(rgb: [u8; 3], n: usize) -> impl Iterator<Item = ColorSample> {
        std::iter::repeat(ColorSample::from_rgb(rgb)).take(n)
    }

    #[test]
    fn test_predicate_table_matches_priority() {
        let labels: Vec<ColorLabel> = PREDICATES.iter().map(|(l, _)| *l).collect();
        assert_eq!(labels, ColorLabel::PRIORITY.to_vec());
    }

    #[test]
    fn test_reference_colors_hit_their_predicate() {
        let classifier = PatchColorClassifier::default();
        let cases = [
            (RED, ColorLabel::Red),
            (ORANGE, ColorLabel::Orange),
            (YELLOW, ColorLabel::Yellow),
            (GREEN, ColorLabel::Green),
            (BLUE, ColorLabel::Blue),
            (PURPLE, ColorLabel::Purple),
        ];
        for (rgb, expected) in cases {
            let px = ColorSample::from_rgb(rgb);
            assert!(!classifier.is_neutral(&px), "{rgb:?} should be colorful");
            assert_eq!(classifier.label_of(&px), Some(expected), "{rgb:?}");
        }
        let teal = ColorSample::from_rgb(TEAL);
        assert!(!classifier.is_neutral(&teal));
        assert_eq!(classifier.label_of(&teal), None);
    }

    #[test]
    fn test_neutral_pixels() {
        let classifier = PatchColorClassifier::default();
        for rgb in [[255, 255, 255], [128, 128, 128], [10, 5, 5], [250, 240, 235]] {
            assert!(classifier.is_neutral(&ColorSample::from_rgb(rgb)), "{rgb:?}");
        }
    }

    #[test]
    fn test_quarter_red_patch_is_red_and_full() {
        // 100 colorful pixels, 25 red: threshold = max(3, 100 / 15) = 6
        let classifier = PatchColorClassifier::default();
        let mut tally = ColorTally::default();
        for px in samples(RED, 25).chain(samples(TEAL, 75)) {
            classifier.observe(&mut tally, &px);
        }
        assert_eq!(tally.threshold(classifier.config()), 6);
        let result = classifier.finish(&tally);
        assert_eq!(result.label, Some(ColorLabel::Red));
        assert_eq!(result.fill_ratio, 1.0);
    }

    #[test]
    fn test_all_neutral_is_empty() {
        let classifier = PatchColorClassifier::default();
        let result = classifier.classify_samples(samples([255, 255, 255], 50));
        assert_eq!(result, ClassificationResult::EMPTY);
        assert_eq!(classifier.classify_samples(std::iter::empty()), ClassificationResult::EMPTY);
    }

    #[test]
    fn test_count_must_strictly_exceed_threshold() {
        let classifier = PatchColorClassifier::default();
        // 90 colorful pixels: threshold = 6, six red votes are not enough
        let result = classifier.classify_samples(samples(RED, 6).chain(samples(TEAL, 84)));
        assert_eq!(result.label, None);
        let result = classifier.classify_samples(samples(RED, 7).chain(samples(TEAL, 83)));
        assert_eq!(result.label, Some(ColorLabel::Red));
    }

    #[test]
    fn test_tie_goes_to_earlier_priority() {
        let classifier = PatchColorClassifier::default();
        let result = classifier.classify_samples(samples(BLUE, 20).chain(samples(PURPLE, 20)));
        assert_eq!(result.label, Some(ColorLabel::Purple));
        let result = classifier.classify_samples(samples(GREEN, 20).chain(samples(RED, 20)));
        assert_eq!(result.label, Some(ColorLabel::Red));
    }

    #[test]
    fn test_majority_wins_over_priority() {
        let classifier = PatchColorClassifier::default();
        let result = classifier.classify_samples(samples(RED, 10).chain(samples(BLUE, 30)));
        assert_eq!(result.label, Some(ColorLabel::Blue));
    }

    #[test]
    fn test_fill_ratio_counts_neutral_pixels() {
        let classifier = PatchColorClassifier::default();
        let result = classifier.classify_samples(samples(GREEN, 30).chain(samples([255, 255, 255], 70)));
        assert_eq!(result.label, Some(ColorLabel::Green));
        assert!((result.fill_ratio - 0.3).abs() < 1e-6);
    }
}
