#![allow(dead_code)]

use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::drawing::draw_polygon_mut;
use mosaicfill::config::LayoutConfig;
use mosaicfill::TemplateLayout;

/// Side of the square reference sheets and frames
pub const SHEET: u32 = 200;
const MARGIN: u32 = 20;
const LINE: u32 = 3;

pub const RED: [u8; 3] = [200, 40, 40];
pub const BLUE: [u8; 3] = [30, 60, 200];
pub const GREEN: [u8; 3] = [40, 200, 60];

/// White sheet with a `cols` x `rows` grid of black 3px outlines
pub fn grid_sheet(cols: u32, rows: u32) -> GrayImage {
    assert!(cols > 0 && rows > 0, "grid must have at least one cell");
    let span = SHEET - 2 * MARGIN;
    let xs: Vec<u32> = (0..=cols).map(|k| MARGIN + k * span / cols).collect();
    let ys: Vec<u32> = (0..=rows).map(|k| MARGIN + k * span / rows).collect();
    let end = MARGIN + span + LINE;

    GrayImage::from_fn(SHEET, SHEET, |x, y| {
        let inside = (MARGIN..end).contains(&x) && (MARGIN..end).contains(&y);
        let on = |v: u32, lines: &[u32]| lines.iter().any(|&l| v >= l && v < l + LINE);
        if inside && (on(x, &xs) || on(y, &ys)) {
            Luma([0])
        } else {
            Luma([255])
        }
    })
}

pub fn layout_from_sheet(name: &str, sheet: &GrayImage) -> TemplateLayout {
    TemplateLayout::from_gray(name, sheet, &LayoutConfig::default()).expect("synthetic sheet has patches")
}

/// Rectified camera view of `sheet` with some patches filled in
pub fn paint_frame(sheet: &GrayImage, layout: &TemplateLayout, fills: &[(usize, [u8; 3])]) -> RgbImage {
    let mut frame = RgbImage::from_fn(sheet.width(), sheet.height(), |x, y| {
        let v = sheet.get_pixel(x, y)[0];
        Rgb([v, v, v])
    });
    for &(id, rgb) in fills {
        let patch = &layout.patches()[id];
        if let Some(polygon) = patch.frame_polygon(layout.size(), frame.dimensions()) {
            draw_polygon_mut(&mut frame, &polygon, Rgb(rgb));
        }
    }
    frame
}
