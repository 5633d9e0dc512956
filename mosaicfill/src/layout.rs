// Layout ingestion: patch polygons and the boundary-line mask from a reference image
// Patch interiors are rasterized per frame size into small bounding-box masks

use crate::config::LayoutConfig;
use crate::error::MosaicError;
use image::imageops::{self, FilterType};
use image::{GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType};
use imageproc::contrast::{threshold, ThresholdType};
use imageproc::distance_transform::Norm;
use imageproc::drawing::draw_polygon_mut;
use imageproc::geometry::contour_area;
use imageproc::morphology::{dilate, erode};
use imageproc::point::Point;
use log::{debug, info, warn};
use mosaicfill_common::Point2D;
use std::path::Path;

/// One fillable region of a layout
#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
    pub id: usize,
    /// Open polygon in layout-native pixel coordinates
    pub polygon: Vec<Point2D>,
    pub centroid: Point2D,
}

impl Patch {
    pub fn new(id: usize, polygon: Vec<Point2D>) -> Self {
        let centroid = polygon_centroid(&polygon);
        Self { id, polygon, centroid }
    }

    pub fn area(&self) -> f32 {
        polygon_area(&self.polygon)
    }

    /// Polygon scaled from `native_size` to `frame_size` as an open path of integer
    /// vertices, ready for filling. `None` when fewer than three distinct vertices remain.
    pub fn frame_polygon(&self, native_size: (u32, u32), frame_size: (u32, u32)) -> Option<Vec<Point<i32>>> {
        let (fw, fh) = frame_size;
        if fw == 0 || fh == 0 || native_size.0 == 0 || native_size.1 == 0 {
            return None;
        }
        let sx = fw as f32 / native_size.0 as f32;
        let sy = fh as f32 / native_size.1 as f32;

        let mut points: Vec<Point<i32>> = Vec::with_capacity(self.polygon.len());
        for p in &self.polygon {
            let q = Point::new(
                ((p.x * sx).round() as i32).clamp(0, fw as i32 - 1),
                ((p.y * sy).round() as i32).clamp(0, fh as i32 - 1),
            );
            if points.last() != Some(&q) {
                points.push(q);
            }
        }
        // A closed path would make the fill panic
        while points.len() > 1 && points.first() == points.last() {
            points.pop();
        }
        (points.len() >= 3).then_some(points)
    }

    /// Centroid scaled from `native_size` to `frame_size`
    pub fn frame_centroid(&self, native_size: (u32, u32), frame_size: (u32, u32)) -> Point2D {
        let sx = frame_size.0 as f32 / native_size.0.max(1) as f32;
        let sy = frame_size.1 as f32 / native_size.1.max(1) as f32;
        Point2D::new(self.centroid.x * sx, self.centroid.y * sy)
    }
}

/// Shoelace area of an open polygon
pub fn polygon_area(points: &[Point2D]) -> f32 {
    signed_area(points).abs() as f32
}

fn signed_area(points: &[Point2D]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut area = 0.0f64;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x as f64 * points[j].y as f64;
        area -= points[j].x as f64 * points[i].y as f64;
    }
    area / 2.0
}

/// Area-weighted centroid, falling back to the vertex mean for degenerate polygons
pub fn polygon_centroid(points: &[Point2D]) -> Point2D {
    if points.is_empty() {
        return Point2D::default();
    }
    let a = signed_area(points);
    if a.abs() < 1e-9 {
        let n = points.len() as f32;
        let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        return Point2D::new(sx / n, sy / n);
    }

    let n = points.len();
    let (mut cx, mut cy) = (0.0f64, 0.0f64);
    for i in 0..n {
        let j = (i + 1) % n;
        let (xi, yi) = (points[i].x as f64, points[i].y as f64);
        let (xj, yj) = (points[j].x as f64, points[j].y as f64);
        let cross = xi * yj - xj * yi;
        cx += (xi + xj) * cross;
        cy += (yi + yj) * cross;
    }
    Point2D::new((cx / (6.0 * a)) as f32, (cy / (6.0 * a)) as f32)
}

/// Drop vertices lying on the straight segment between their neighbours
fn drop_collinear(points: &[Point<i32>]) -> Vec<Point<i32>> {
    let n = points.len();
    if n < 4 {
        return points.to_vec();
    }
    (0..n)
        .filter(|&i| {
            let prev = points[(i + n - 1) % n];
            let cur = points[i];
            let next = points[(i + 1) % n];
            let cross = (cur.x - prev.x) * (next.y - cur.y) - (cur.y - prev.y) * (next.x - cur.x);
            cross != 0
        })
        .map(|i| points[i])
        .collect()
}

/// Patches plus boundary-line mask of one physical template, at its native size
#[derive(Debug, Clone)]
pub struct TemplateLayout {
    name: String,
    width: u32,
    height: u32,
    patches: Vec<Patch>,
    line_mask: GrayImage,
}

impl TemplateLayout {
    /// Load a layout from a reference drawing: dark outlines on a light background
    pub fn from_reference_image(
        path: &Path,
        name: impl Into<String>,
        config: &LayoutConfig,
    ) -> Result<Self, MosaicError> {
        let name = name.into();
        let gray = image::open(path)
            .map_err(|source| MosaicError::LayoutLoad {
                path: path.to_path_buf(),
                source,
            })?
            .to_luma8();
        let layout = Self::from_gray(name, &gray, config)?;
        info!(
            "loaded layout '{}' from {} ({}x{}, {} patches)",
            layout.name,
            path.display(),
            layout.width,
            layout.height,
            layout.patches.len()
        );
        Ok(layout)
    }

    /// Extract patches and line mask from an already decoded grayscale reference
    pub fn from_gray(
        name: impl Into<String>,
        gray: &GrayImage,
        config: &LayoutConfig,
    ) -> Result<Self, MosaicError> {
        let name = name.into();
        let (width, height) = gray.dimensions();

        let lines = threshold(gray, config.line_threshold, ThresholdType::BinaryInverted);
        let line_mask = if config.line_dilate_radius > 0 {
            dilate(&lines, Norm::LInf, config.line_dilate_radius)
        } else {
            lines
        };

        let mut regions = line_mask.clone();
        imageops::invert(&mut regions);

        let max_area = config.max_patch_area_fraction * (width as f32 * height as f32);
        let mut patches = Vec::new();
        for contour in find_contours::<i32>(&regions) {
            if contour.border_type != BorderType::Outer {
                continue;
            }
            let area = contour_area(&contour.points) as f32;
            if area < config.min_patch_area || area > max_area {
                debug!("layout '{}': skipping region of area {:.0}", name, area);
                continue;
            }
            let polygon = drop_collinear(&contour.points)
                .into_iter()
                .map(|p| Point2D::new(p.x as f32, p.y as f32))
                .collect();
            patches.push(Patch::new(patches.len(), polygon));
        }

        Self::from_parts(name, (width, height), patches, line_mask)
    }

    /// Assemble a layout from known geometry
    pub fn from_parts(
        name: impl Into<String>,
        size: (u32, u32),
        patches: Vec<Patch>,
        line_mask: GrayImage,
    ) -> Result<Self, MosaicError> {
        let name = name.into();
        if patches.is_empty() {
            return Err(MosaicError::EmptyLayout { name });
        }
        let (width, height) = (size.0.max(1), size.1.max(1));
        let line_mask = if line_mask.dimensions() == (width, height) {
            line_mask
        } else {
            imageops::resize(&line_mask, width, height, FilterType::Nearest)
        };
        Ok(Self {
            name,
            width,
            height,
            patches,
            line_mask,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn patches(&self) -> &[Patch] {
        &self.patches
    }

    /// Boundary pixels are 255, everything else 0
    pub fn line_mask(&self) -> &GrayImage {
        &self.line_mask
    }

    /// Interior masks of every patch for a frame of `frame_size`
    pub fn patch_masks(&self, frame_size: (u32, u32), inset: u8) -> Vec<PatchMask> {
        self.patches
            .iter()
            .map(|patch| PatchMask::rasterize(patch, self.size(), frame_size, inset))
            .collect()
    }
}

/// Patch interior at frame resolution, stored as a bounding-box-local mask
#[derive(Debug, Clone, PartialEq)]
pub struct PatchMask {
    /// Top-left corner of `mask` in frame coordinates
    pub origin: (u32, u32),
    pub mask: GrayImage,
}

impl PatchMask {
    pub fn empty() -> Self {
        Self {
            origin: (0, 0),
            mask: GrayImage::new(0, 0),
        }
    }

    /// Scale a patch polygon to the frame, fill it and shave `inset` pixels off its edge
    pub fn rasterize(patch: &Patch, native_size: (u32, u32), frame_size: (u32, u32), inset: u8) -> Self {
        let (fw, fh) = frame_size;
        let Some(points) = patch.frame_polygon(native_size, frame_size) else {
            warn!("patch {} is degenerate at {}x{}, skipping", patch.id, fw, fh);
            return Self::empty();
        };

        let pad = inset as i32 + 1;
        let min_x = points.iter().map(|p| p.x).min().unwrap_or(0);
        let min_y = points.iter().map(|p| p.y).min().unwrap_or(0);
        let max_x = points.iter().map(|p| p.x).max().unwrap_or(0);
        let max_y = points.iter().map(|p| p.y).max().unwrap_or(0);
        let x0 = (min_x - pad).max(0);
        let y0 = (min_y - pad).max(0);
        let x1 = (max_x + pad).min(fw as i32 - 1);
        let y1 = (max_y + pad).min(fh as i32 - 1);

        let local: Vec<Point<i32>> = points.iter().map(|p| Point::new(p.x - x0, p.y - y0)).collect();
        let mut mask = GrayImage::new((x1 - x0 + 1) as u32, (y1 - y0 + 1) as u32);
        draw_polygon_mut(&mut mask, &local, Luma([255u8]));
        if inset > 0 {
            mask = erode(&mask, Norm::LInf, inset);
        }

        Self {
            origin: (x0 as u32, y0 as u32),
            mask,
        }
    }

    pub fn pixel_count(&self) -> usize {
        self.mask.pixels().filter(|p| p[0] > 0).count()
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        let (ox, oy) = self.origin;
        x >= ox
            && y >= oy
            && x - ox < self.mask.width()
            && y - oy < self.mask.height()
            && self.mask.get_pixel(x - ox, y - oy)[0] > 0
    }
}
