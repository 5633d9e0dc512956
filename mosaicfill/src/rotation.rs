// Surface orientation from the reference marker, debounced over frames
// Also holds the quarter-turn image transforms used to normalize and re-rotate frames

use crate::config::RotationConfig;
use image::{imageops, RgbImage};
use log::{debug, info};
use mosaicfill_common::{Point2D, Rotation};

/// The four ordered corners of the reference marker in rectified frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarkerCorners(pub [Point2D; 4]);

impl MarkerCorners {
    pub fn new(corners: [Point2D; 4]) -> Self {
        Self(corners)
    }

    pub fn centroid(&self) -> Point2D {
        let (sx, sy) = self
            .0
            .iter()
            .fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point2D::new(sx / 4.0, sy / 4.0)
    }

    /// Angle of the centroid -> first corner vector in degrees, in [0, 360).
    /// Image coordinates, so positive angles turn clockwise on screen.
    pub fn heading_degrees(&self) -> f32 {
        let c = self.centroid();
        let first = self.0[0];
        let angle = (first.y - c.y).atan2(first.x - c.x).to_degrees();
        angle.rem_euclid(360.0)
    }
}

/// Debounced rotation state
#[derive(Debug, Clone)]
pub struct RotationEstimator {
    state: Rotation,
    counter: u32,
    hysteresis_frames: u32,
}

impl RotationEstimator {
    pub fn new(config: &RotationConfig) -> Self {
        Self {
            state: Rotation::Deg0,
            counter: 0,
            hysteresis_frames: config.hysteresis_frames.max(1),
        }
    }

    pub fn state(&self) -> Rotation {
        self.state
    }

    /// Consecutive frames whose estimate differed from the current state
    pub fn counter(&self) -> u32 {
        self.counter
    }

    /// Per-frame orientation of a marker, before debouncing.
    ///
    /// The first corner of an upright marker points up-left from its centre
    /// (heading in [180, 270)); every further quarter turn of the surface
    /// moves it one quadrant.
    pub fn raw_estimate(marker: &MarkerCorners) -> Rotation {
        let heading = marker.heading_degrees();
        if heading < 90.0 {
            Rotation::Deg180
        } else if heading < 180.0 {
            Rotation::Deg270
        } else if heading < 270.0 {
            Rotation::Deg0
        } else {
            Rotation::Deg90
        }
    }

    /// Update from this frame's marker; frames without one leave the state alone
    pub fn update(&mut self, marker: Option<&MarkerCorners>) -> Rotation {
        match marker {
            Some(marker) => self.update_raw(Self::raw_estimate(marker)),
            None => self.state,
        }
    }

    /// Feed a raw estimate through the hysteresis vote.
    ///
    /// Every estimate that differs from the current state counts toward a
    /// change; the estimate of the frame that fills the count becomes the new
    /// state. An estimate agreeing with the current state clears the count.
    pub fn update_raw(&mut self, raw: Rotation) -> Rotation {
        if raw == self.state {
            self.counter = 0;
            return self.state;
        }

        self.counter += 1;
        debug!("rotation estimate {} differs for {} frame(s)", raw, self.counter);

        if self.counter >= self.hysteresis_frames {
            info!("rotation changed {} -> {}", self.state, raw);
            self.state = raw;
            self.counter = 0;
        }
        self.state
    }

    pub fn reset(&mut self) {
        self.state = Rotation::Deg0;
        self.counter = 0;
    }
}

/// Rotate an image clockwise by `rotation`
pub fn rotate_forward(image: &RgbImage, rotation: Rotation) -> RgbImage {
    match rotation {
        Rotation::Deg0 => image.clone(),
        Rotation::Deg90 => imageops::rotate90(image),
        Rotation::Deg180 => imageops::rotate180(image),
        Rotation::Deg270 => imageops::rotate270(image),
    }
}

/// Undo [`rotate_forward`]
pub fn rotate_inverse(image: &RgbImage, rotation: Rotation) -> RgbImage {
    rotate_forward(image, rotation.inverse())
}

/// Map a continuous point of a `width` x `height` image through [`rotate_forward`]
pub fn forward_point(p: Point2D, rotation: Rotation, width: u32, height: u32) -> Point2D {
    let (w, h) = (width as f32, height as f32);
    match rotation {
        Rotation::Deg0 => p,
        Rotation::Deg90 => Point2D::new(h - p.y, p.x),
        Rotation::Deg180 => Point2D::new(w - p.x, h - p.y),
        Rotation::Deg270 => Point2D::new(p.y, w - p.x),
    }
}
