// Composite rendering of stabilized patch states
// Patches filled with their display color, boundary lines on top, fill-ratio labels last

use crate::color::rgb_from_bgr;
use crate::config::RenderConfig;
use crate::error::MosaicError;
use crate::layout::TemplateLayout;
use crate::rotation::{forward_point, rotate_forward};
use ab_glyph::{FontVec, PxScale};
use image::imageops::{self, FilterType};
use image::RgbImage;
use imageproc::drawing::{draw_polygon_mut, draw_text_mut, text_size};
use log::warn;
use mosaicfill_common::{PatchState, Point2D, Rotation};
use std::fs;

/// Percentage labels for every state at or above `floor`, with their centres in
/// the physical (re-rotated) output.
pub fn ratio_labels(
    layout: &TemplateLayout,
    states: &[PatchState],
    frame_size: (u32, u32),
    rotation: Rotation,
    floor: f32,
) -> Vec<(String, Point2D)> {
    let (fw, fh) = (frame_size.0.max(1), frame_size.1.max(1));
    let native = layout.size();
    states
        .iter()
        .filter(|s| s.fill_ratio >= floor)
        .filter_map(|state| {
            let patch = layout.patches().get(state.id)?;
            let center = forward_point(patch.frame_centroid(native, (fw, fh)), rotation, fw, fh);
            let label = format!("{}%", (state.fill_ratio * 100.0).round() as u32);
            Some((label, center))
        })
        .collect()
}

pub struct Renderer {
    config: RenderConfig,
    font: Option<FontVec>,
    label_floor: f32,
}

impl Renderer {
    /// `label_floor` is the smallest fill ratio that gets a percentage label
    pub fn new(config: RenderConfig, label_floor: f32) -> Result<Self, MosaicError> {
        let font = match &config.font_path {
            Some(path) => {
                let data = fs::read(path).map_err(|e| MosaicError::Config {
                    path: path.clone(),
                    message: format!("cannot read font: {e}"),
                })?;
                let font = FontVec::try_from_vec(data).map_err(|e| MosaicError::Config {
                    path: path.clone(),
                    message: format!("invalid font: {e}"),
                })?;
                Some(font)
            }
            None => {
                warn!("no font configured, fill-ratio labels will not be drawn");
                None
            }
        };
        Ok(Self {
            config,
            font,
            label_floor,
        })
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `states` over `layout` on a canvas of the normalized frame size, then
    /// turn the result back to the physical orientation.
    pub fn render(
        &self,
        layout: &TemplateLayout,
        states: &[PatchState],
        frame_size: (u32, u32),
        rotation: Rotation,
    ) -> RgbImage {
        let (fw, fh) = (frame_size.0.max(1), frame_size.1.max(1));
        let native = layout.size();
        let empty = rgb_from_bgr(self.config.empty_bgr);
        let mut canvas = RgbImage::from_pixel(fw, fh, empty);

        for state in states {
            let Some(patch) = layout.patches().get(state.id) else {
                continue;
            };
            let Some(polygon) = patch.frame_polygon(native, (fw, fh)) else {
                continue;
            };
            let color = match state.label {
                Some(label) => rgb_from_bgr(label.display_bgr()),
                None => empty,
            };
            draw_polygon_mut(&mut canvas, &polygon, color);
        }

        let boundary = rgb_from_bgr(self.config.boundary_bgr);
        let lines = if layout.line_mask().dimensions() == (fw, fh) {
            layout.line_mask().clone()
        } else {
            imageops::resize(layout.line_mask(), fw, fh, FilterType::Nearest)
        };
        for (px, line) in canvas.pixels_mut().zip(lines.pixels()) {
            if line[0] > 0 {
                *px = boundary;
            }
        }

        let mut composite = rotate_forward(&canvas, rotation);

        if let Some(font) = &self.font {
            let scale = PxScale::from(self.config.text_scale);
            let text_color = rgb_from_bgr(self.config.text_bgr);
            for (label, center) in ratio_labels(layout, states, (fw, fh), rotation, self.label_floor) {
                let (tw, th) = text_size(scale, font, &label);
                let x = center.x.round() as i32 - tw as i32 / 2;
                let y = center.y.round() as i32 - th as i32 / 2;
                draw_text_mut(&mut composite, text_color, x, y, scale, font, &label);
            }
        }

        composite
    }
}
