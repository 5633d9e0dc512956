//! Temporal smoothing of per-patch classifications
//!
//! A patch keeps a short buffer of accepted labels and a moving average of its
//! fill ratio. A frame that reads as empty (no dominant color, or too little
//! color) wipes both, so a removed piece disappears immediately while a newly
//! placed one needs a majority of the buffer to show up.

use crate::classifier::ClassificationResult;
use crate::config::StabilizerConfig;
use mosaicfill_common::ColorLabel;
use std::collections::VecDeque;

/// Bounded buffer of accepted labels with a majority vote
#[derive(Debug, Clone)]
pub struct PatchHistory {
    labels: VecDeque<ColorLabel>,
    capacity: usize,
}

impl PatchHistory {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            labels: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a label, evicting the oldest once the buffer is full
    pub fn add_color(&mut self, label: ColorLabel) {
        if self.labels.len() == self.capacity {
            self.labels.pop_front();
        }
        self.labels.push_back(label);
    }

    pub fn clear(&mut self) {
        self.labels.clear();
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Most frequent label in the buffer.
    ///
    /// Among labels sharing the top count, the one seen most recently wins.
    pub fn stable_color(&self) -> Option<ColorLabel> {
        let mut counts = [0usize; 6];
        let mut last_seen = [0usize; 6];
        for (pos, label) in self.labels.iter().enumerate() {
            counts[label.priority()] += 1;
            last_seen[label.priority()] = pos;
        }

        ColorLabel::PRIORITY
            .into_iter()
            .filter(|label| counts[label.priority()] > 0)
            .max_by_key(|label| (counts[label.priority()], last_seen[label.priority()]))
    }
}

/// Exponential moving average of the fill ratio
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioEma {
    value: f32,
    alpha: f32,
}

impl RatioEma {
    pub fn new(alpha: f32) -> Self {
        Self {
            value: 0.0,
            alpha: alpha.clamp(f32::EPSILON, 1.0),
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    /// Blend a new sample in: `(1 - alpha) * old + alpha * sample`
    pub fn accept(&mut self, sample: f32) -> f32 {
        let sample = sample.clamp(0.0, 1.0);
        self.value = ((1.0 - self.alpha) * self.value + self.alpha * sample).clamp(0.0, 1.0);
        self.value
    }

    pub fn reset(&mut self) {
        self.value = 0.0;
    }
}

/// Label history plus fill-ratio average for one patch of one layout
#[derive(Debug, Clone)]
pub struct PatchTracker {
    history: PatchHistory,
    ratio: RatioEma,
    floor: f32,
}

impl PatchTracker {
    pub fn new(config: &StabilizerConfig) -> Self {
        Self {
            history: PatchHistory::new(config.history_depth),
            ratio: RatioEma::new(config.ratio_ema_alpha),
            floor: config.fill_ratio_floor,
        }
    }

    /// Feed one raw classification, returning the stabilized label and ratio
    pub fn observe(&mut self, raw: ClassificationResult) -> (Option<ColorLabel>, f32) {
        match raw.label {
            Some(label) if raw.fill_ratio >= self.floor => {
                self.history.add_color(label);
                self.ratio.accept(raw.fill_ratio);
            }
            _ => self.reset(),
        }
        (self.history.stable_color(), self.ratio.value())
    }

    pub fn stable_color(&self) -> Option<ColorLabel> {
        self.history.stable_color()
    }

    pub fn fill_ratio(&self) -> f32 {
        self.ratio.value()
    }

    pub fn history(&self) -> &PatchHistory {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.ratio.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(label: Option<ColorLabel>, fill_ratio: f32) -> ClassificationResult {
        ClassificationResult { label, fill_ratio }
    }

    #[test]
    fn test_capacity_is_bounded() {
        let mut history = PatchHistory::new(7);
        for _ in 0..10 {
            history.add_color(ColorLabel::Green);
        }
        assert_eq!(history.len(), 7);
        assert_eq!(history.stable_color(), Some(ColorLabel::Green));
    }

    #[test]
    fn test_clear_forgets_everything() {
        let mut history = PatchHistory::new(7);
        for _ in 0..8 {
            history.add_color(ColorLabel::Blue);
        }
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.stable_color(), None);
    }

    #[test]
    fn test_majority_vote() {
        let mut history = PatchHistory::new(7);
        for label in [ColorLabel::Red, ColorLabel::Red, ColorLabel::Blue, ColorLabel::Red, ColorLabel::Blue] {
            history.add_color(label);
        }
        assert_eq!(history.stable_color(), Some(ColorLabel::Red));
    }

    #[test]
    fn test_tie_goes_to_most_recent() {
        let mut history = PatchHistory::new(7);
        history.add_color(ColorLabel::Red);
        history.add_color(ColorLabel::Blue);
        assert_eq!(history.stable_color(), Some(ColorLabel::Blue));
        history.add_color(ColorLabel::Red);
        history.add_color(ColorLabel::Blue);
        assert_eq!(history.stable_color(), Some(ColorLabel::Blue));
        history.add_color(ColorLabel::Red);
        assert_eq!(history.stable_color(), Some(ColorLabel::Red));
    }

    #[test]
    fn test_eviction_changes_majority() {
        let mut history = PatchHistory::new(3);
        history.add_color(ColorLabel::Yellow);
        history.add_color(ColorLabel::Yellow);
        history.add_color(ColorLabel::Orange);
        assert_eq!(history.stable_color(), Some(ColorLabel::Yellow));
        history.add_color(ColorLabel::Orange);
        assert_eq!(history.stable_color(), Some(ColorLabel::Orange));
    }

    #[test]
    fn test_ema_stays_between_old_and_sample() {
        let mut ema = RatioEma::new(0.3);
        assert_relative_eq!(ema.accept(1.0), 0.3);
        assert_relative_eq!(ema.accept(0.5), 0.36, epsilon = 1e-6);
        for sample in [0.0, 0.9, 0.2, 1.0, 0.15] {
            let old = ema.value();
            let new = ema.accept(sample);
            assert!(new >= old.min(sample) - 1e-6 && new <= old.max(sample) + 1e-6);
            assert!((0.0..=1.0).contains(&new));
        }
        ema.reset();
        assert_eq!(ema.value(), 0.0);
    }

    #[test]
    fn test_tracker_rejects_below_floor() {
        let mut tracker = PatchTracker::new(&StabilizerConfig::default());
        let (label, ratio) = tracker.observe(raw(Some(ColorLabel::Purple), 0.8));
        assert_eq!(label, Some(ColorLabel::Purple));
        assert_relative_eq!(ratio, 0.24, epsilon = 1e-6);

        let (label, ratio) = tracker.observe(raw(Some(ColorLabel::Purple), 0.1));
        assert_eq!(label, None);
        assert_eq!(ratio, 0.0);
    }

    #[test]
    fn test_tracker_clears_on_empty_frame() {
        let mut tracker = PatchTracker::new(&StabilizerConfig::default());
        for _ in 0..7 {
            tracker.observe(raw(Some(ColorLabel::Red), 1.0));
        }
        assert_eq!(tracker.stable_color(), Some(ColorLabel::Red));
        let (label, ratio) = tracker.observe(raw(None, 0.9));
        assert_eq!(label, None);
        assert_eq!(ratio, 0.0);
        assert!(tracker.history().is_empty());
    }

    #[test]
    fn test_floor_is_inclusive() {
        let mut tracker = PatchTracker::new(&StabilizerConfig::default());
        let (label, _) = tracker.observe(raw(Some(ColorLabel::Green), 0.15));
        assert_eq!(label, Some(ColorLabel::Green));
    }
}
