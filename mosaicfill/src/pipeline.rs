// Per-frame orchestration: rotation -> layout selection -> classification -> stabilization -> render

use crate::classifier::PatchColorClassifier;
use crate::color::to_hsv;
use crate::config::MosaicConfig;
use crate::error::MosaicError;
use crate::history::PatchTracker;
use crate::layout::{PatchMask, TemplateLayout};
use crate::render::Renderer;
use crate::rotation::{rotate_inverse, MarkerCorners, RotationEstimator};
use crate::selector::TemplateSelector;
use image::RgbImage;
use log::{debug, info};
use mosaicfill_common::{PatchState, Rotation};

/// One rectified frame and the reference marker seen in it, if any
#[derive(Debug, Clone)]
pub struct FrameInput {
    pub frame: RgbImage,
    pub marker: Option<MarkerCorners>,
}

impl FrameInput {
    pub fn new(frame: RgbImage, marker: Option<MarkerCorners>) -> Self {
        Self { frame, marker }
    }
}

/// Everything produced for one frame
#[derive(Debug, Clone)]
pub struct FrameOutput {
    /// Zero-based position of the frame in the stream
    pub index: u64,
    pub rotation: Rotation,
    pub active_layout: usize,
    pub layout_name: String,
    /// The active layout changed on this frame
    pub layout_switched: bool,
    pub patches: Vec<PatchState>,
    /// Rendered result in the physical orientation of the input frame
    pub composite: RgbImage,
}

pub struct MosaicPipeline {
    config: MosaicConfig,
    layouts: Vec<TemplateLayout>,
    classifier: PatchColorClassifier,
    rotation: RotationEstimator,
    selector: TemplateSelector,
    /// One tracker per patch, per layout
    trackers: Vec<Vec<PatchTracker>>,
    /// Interior masks per layout, for the last normalized frame size seen with it
    masks: Vec<Option<((u32, u32), Vec<PatchMask>)>>,
    renderer: Renderer,
    frames_seen: u64,
}

impl MosaicPipeline {
    pub fn new(config: MosaicConfig, layouts: Vec<TemplateLayout>) -> Result<Self, MosaicError> {
        if layouts.is_empty() {
            return Err(MosaicError::NoLayouts);
        }
        config
            .validate()
            .map_err(|message| MosaicError::InvalidConfig { message })?;
        let renderer = Renderer::new(config.render.clone(), config.stabilizer.fill_ratio_floor)?;
        let trackers = layouts
            .iter()
            .map(|layout| {
                layout
                    .patches()
                    .iter()
                    .map(|_| PatchTracker::new(&config.stabilizer))
                    .collect()
            })
            .collect();

        info!(
            "pipeline ready with {} layout(s): {}",
            layouts.len(),
            layouts.iter().map(|l| l.name()).collect::<Vec<_>>().join(", ")
        );

        Ok(Self {
            classifier: PatchColorClassifier::new(config.classifier.clone()),
            rotation: RotationEstimator::new(&config.rotation),
            selector: TemplateSelector::new(config.selector.clone()),
            trackers,
            masks: vec![None; layouts.len()],
            renderer,
            frames_seen: 0,
            layouts,
            config,
        })
    }

    pub fn config(&self) -> &MosaicConfig {
        &self.config
    }

    pub fn layouts(&self) -> &[TemplateLayout] {
        &self.layouts
    }

    pub fn active_layout(&self) -> usize {
        self.selector.active()
    }

    pub fn rotation(&self) -> Rotation {
        self.rotation.state()
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Current stabilized states of the active layout, without consuming a frame
    pub fn patch_states(&self) -> Vec<PatchState> {
        let active = self.selector.active();
        self.layouts[active]
            .patches()
            .iter()
            .zip(&self.trackers[active])
            .map(|(patch, tracker)| PatchState {
                id: patch.id,
                label: tracker.stable_color(),
                fill_ratio: tracker.fill_ratio(),
                centroid: patch.centroid,
            })
            .collect()
    }

    /// Run one frame through the whole pipeline
    pub fn process(&mut self, input: &FrameInput) -> FrameOutput {
        let index = self.frames_seen;
        self.frames_seen += 1;

        let rotation = self.rotation.update(input.marker.as_ref());
        let normalized = rotate_inverse(&input.frame, rotation);
        let frame_size = normalized.dimensions();

        let selection = self.selector.update(&normalized, &self.layouts);
        let active = selection.active;
        if selection.switched && self.config.selector.reset_histories_on_switch {
            self.trackers[active].iter_mut().for_each(PatchTracker::reset);
        }

        let layout = &self.layouts[active];
        let inset = self.config.layout.mask_inset_px;
        let cached = &mut self.masks[active];
        if cached.as_ref().map(|(size, _)| *size) != Some(frame_size) {
            debug!(
                "building {} patch masks for '{}' at {}x{}",
                layout.patches().len(),
                layout.name(),
                frame_size.0,
                frame_size.1
            );
            *cached = Some((frame_size, layout.patch_masks(frame_size, inset)));
        }
        let masks: &[PatchMask] = cached.as_ref().map(|(_, masks)| masks.as_slice()).unwrap_or(&[]);

        let hsv = to_hsv(&normalized);
        let mut patches = Vec::with_capacity(layout.patches().len());
        for ((patch, mask), tracker) in layout
            .patches()
            .iter()
            .zip(masks.iter())
            .zip(self.trackers[active].iter_mut())
        {
            let raw = self.classifier.classify(&normalized, &hsv, mask);
            let (label, fill_ratio) = tracker.observe(raw);
            patches.push(PatchState {
                id: patch.id,
                label,
                fill_ratio,
                centroid: patch.centroid,
            });
        }

        debug!(
            "frame {}: rotation {}, layout {} ({}), {} of {} patches labelled",
            index,
            rotation,
            active,
            layout.name(),
            patches.iter().filter(|p| p.label.is_some()).count(),
            patches.len()
        );

        let composite = self.renderer.render(layout, &patches, frame_size, rotation);

        FrameOutput {
            index,
            rotation,
            active_layout: active,
            layout_name: layout.name().to_string(),
            layout_switched: selection.switched,
            patches,
            composite,
        }
    }

    /// Forget every patch history and fill-ratio average, in all layouts
    pub fn reset(&mut self) {
        info!("resetting patch histories");
        for tracker in self.trackers.iter_mut().flatten() {
            tracker.reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::Patch;
    use image::{GrayImage, Rgb};
    use mosaicfill_common::{ColorLabel, Point2D};

    fn single_square_layout() -> TemplateLayout {
        let square = Patch::new(
            0,
            vec![
                Point2D::new(10.0, 10.0),
                Point2D::new(50.0, 10.0),
                Point2D::new(50.0, 50.0),
                Point2D::new(10.0, 50.0),
            ],
        );
        TemplateLayout::from_parts("square", (60, 60), vec![square], GrayImage::new(60, 60)).unwrap()
    }

    fn solid(color: [u8; 3]) -> FrameInput {
        FrameInput::new(RgbImage::from_pixel(60, 60, Rgb(color)), None)
    }

    #[test]
    fn test_requires_a_layout() {
        assert!(matches!(
            MosaicPipeline::new(MosaicConfig::default(), Vec::new()),
            Err(MosaicError::NoLayouts)
        ));
    }

    #[test]
    fn test_rejects_out_of_range_config() {
        let mut config = MosaicConfig::default();
        config.selector.hysteresis_frames = 0;
        assert!(matches!(
            MosaicPipeline::new(config, vec![single_square_layout()]),
            Err(MosaicError::InvalidConfig { .. })
        ));

        let mut config = MosaicConfig::default();
        config.stabilizer.ratio_ema_alpha = 0.0;
        assert!(MosaicPipeline::new(config, vec![single_square_layout()]).is_err());
    }

    #[test]
    fn test_mask_cache_keeps_one_size_per_layout() {
        let mut pipeline = MosaicPipeline::new(MosaicConfig::default(), vec![single_square_layout()]).unwrap();
        pipeline.process(&solid([40, 200, 60]));
        assert_eq!(pipeline.masks.len(), 1);
        assert_eq!(pipeline.masks[0].as_ref().map(|(size, _)| *size), Some((60, 60)));

        let big = FrameInput::new(RgbImage::from_pixel(120, 120, Rgb([40, 200, 60])), None);
        let out = pipeline.process(&big);
        assert_eq!(pipeline.masks.len(), 1);
        let (size, masks) = pipeline.masks[0].as_ref().unwrap();
        assert_eq!(*size, (120, 120));
        assert_eq!(masks.len(), 1);
        assert_eq!(out.patches[0].label, Some(ColorLabel::Green));
    }

    #[test]
    fn test_stable_label_and_reset() {
        let mut pipeline = MosaicPipeline::new(MosaicConfig::default(), vec![single_square_layout()]).unwrap();
        let out = pipeline.process(&solid([40, 200, 60]));
        assert_eq!(out.index, 0);
        assert_eq!(out.patches[0].label, Some(ColorLabel::Green));
        assert!((out.patches[0].fill_ratio - 0.3).abs() < 1e-5);
        assert_eq!(out.patches[0].centroid, Point2D::new(30.0, 30.0));
        assert_eq!(*out.composite.get_pixel(30, 30), Rgb([0, 255, 0]));

        pipeline.reset();
        assert_eq!(pipeline.patch_states()[0].label, None);
        assert_eq!(pipeline.patch_states()[0].fill_ratio, 0.0);
    }

    #[test]
    fn test_single_bad_frame_clears_patch() {
        let mut pipeline = MosaicPipeline::new(MosaicConfig::default(), vec![single_square_layout()]).unwrap();
        for _ in 0..5 {
            pipeline.process(&solid([200, 40, 40]));
        }
        let out = pipeline.process(&solid([255, 255, 255]));
        assert_eq!(out.patches[0].label, None);
        assert_eq!(out.patches[0].fill_ratio, 0.0);
        assert_eq!(*out.composite.get_pixel(30, 30), Rgb([255, 255, 255]));
        assert_eq!(pipeline.frames_seen(), 6);
    }
}
