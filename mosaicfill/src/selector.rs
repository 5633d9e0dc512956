//! Choosing the active layout from the outlines visible in the frame.
//!
//! The dark boundary lines of the normalized frame are compared with every
//! layout's stored line mask by intersection-over-union. The best match is this
//! frame's detection; the active layout only follows once the same detection
//! has repeated for `hysteresis_frames` consecutive frames.

use crate::config::SelectorConfig;
use crate::layout::TemplateLayout;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::morphology::close;
use log::{debug, info};

/// Dark-line mask of a frame: pixels whose brightest channel is below the threshold
pub fn extract_line_mask(frame: &RgbImage, config: &SelectorConfig) -> GrayImage {
    let mut mask = GrayImage::new(frame.width(), frame.height());
    for (src, dst) in frame.pixels().zip(mask.pixels_mut()) {
        let value = src.0.into_iter().max().unwrap_or(0);
        *dst = Luma([if value < config.line_value_threshold { 255 } else { 0 }]);
    }
    if config.close_radius > 0 {
        mask = close(&mask, Norm::LInf, config.close_radius);
    }
    mask
}

/// Intersection-over-union of two equally sized binary masks; 0 when both are empty
pub fn mask_iou(a: &GrayImage, b: &GrayImage) -> f32 {
    let mut intersection = 0u64;
    let mut union = 0u64;
    for (pa, pb) in a.pixels().zip(b.pixels()) {
        let (on_a, on_b) = (pa[0] > 0, pb[0] > 0);
        if on_a && on_b {
            intersection += 1;
        }
        if on_a || on_b {
            union += 1;
        }
    }
    if union == 0 {
        0.0
    } else {
        intersection as f32 / union as f32
    }
}

/// Outcome of one selector update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub active: usize,
    pub detected: usize,
    pub switched: bool,
}

#[derive(Debug, Clone)]
pub struct TemplateSelector {
    active: usize,
    last_detected: usize,
    counter: u32,
    config: SelectorConfig,
}

impl TemplateSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self {
            active: 0,
            last_detected: 0,
            counter: 0,
            config,
        }
    }

    pub fn active(&self) -> usize {
        self.active
    }

    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// IoU of the frame's line mask against each layout, in layout order
    pub fn score(&self, frame: &RgbImage, layouts: &[TemplateLayout]) -> Vec<f32> {
        let lines = extract_line_mask(frame, &self.config);
        layouts
            .iter()
            .map(|layout| {
                let (w, h) = layout.size();
                if lines.dimensions() == (w, h) {
                    mask_iou(&lines, layout.line_mask())
                } else {
                    let resized = imageops::resize(&lines, w, h, FilterType::Nearest);
                    mask_iou(&resized, layout.line_mask())
                }
            })
            .collect()
    }

    /// Index of the first strictly best score
    pub fn best_match(scores: &[f32]) -> usize {
        let mut best = 0;
        for (idx, &score) in scores.iter().enumerate() {
            if score > scores[best] {
                best = idx;
            }
        }
        best
    }

    /// Score the frame and feed the detection through the hysteresis vote
    pub fn update(&mut self, frame: &RgbImage, layouts: &[TemplateLayout]) -> Selection {
        if layouts.len() <= 1 {
            self.active = 0;
            return Selection {
                active: 0,
                detected: 0,
                switched: false,
            };
        }
        let scores = self.score(frame, layouts);
        let detected = Self::best_match(&scores);
        debug!("layout scores {:?}, detected {}", scores, detected);
        self.update_detected(detected)
    }

    /// Hysteresis vote for an externally computed detection
    pub fn update_detected(&mut self, detected: usize) -> Selection {
        if detected != self.last_detected {
            self.last_detected = detected;
            self.counter = 1;
        } else {
            self.counter = self.counter.saturating_add(1);
        }

        let mut switched = false;
        if self.counter >= self.config.hysteresis_frames && detected != self.active {
            info!("switching layout {} -> {}", self.active, detected);
            self.active = detected;
            self.counter = 0;
            switched = true;
        }

        Selection {
            active: self.active,
            detected,
            switched,
        }
    }

    pub fn reset(&mut self) {
        self.active = 0;
        self.last_detected = 0;
        self.counter = 0;
    }
}
