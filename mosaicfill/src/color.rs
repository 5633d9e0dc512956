// Color space helpers
// 8-bit HSV with hue stored as degrees / 2, so the full circle fits in 0..=180

use image::{ImageBuffer, Rgb, RgbImage};

/// HSV image stored in an `Rgb<u8>` buffer.
///
/// Channel 0 is hue (0..=180), channel 1 saturation and channel 2 value
/// (both 0..=255).
pub type HsvImage = ImageBuffer<Rgb<u8>, Vec<u8>>;

/// One pixel observation with both its color channels and its HSV triple
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorSample {
    pub b: u8,
    pub g: u8,
    pub r: u8,
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl ColorSample {
    pub fn new(bgr: [u8; 3], hsv: [u8; 3]) -> Self {
        let [b, g, r] = bgr;
        let [h, s, v] = hsv;
        Self { b, g, r, h, s, v }
    }

    /// Build a sample from an RGB pixel, deriving its HSV triple
    pub fn from_rgb(rgb: [u8; 3]) -> Self {
        let [r, g, b] = rgb;
        Self::new([b, g, r], rgb_to_hsv(r, g, b))
    }
}

/// Convert one pixel to 8-bit HSV.
///
/// Follows the OpenCV `COLOR_BGR2HSV` convention: V = max channel,
/// S = 255 * (max - min) / max, H = hue in degrees / 2, rounded.
#[inline]
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (ri, gi, bi) = (r as i32, g as i32, b as i32);
    let v = ri.max(gi).max(bi);
    let min = ri.min(gi).min(bi);
    let diff = v - min;

    let s = if v == 0 {
        0
    } else {
        (255.0 * diff as f32 / v as f32 + 0.5).floor() as i32
    };

    let h = if diff == 0 {
        0
    } else {
        let sector = if v == ri {
            gi - bi
        } else if v == gi {
            bi - ri + 2 * diff
        } else {
            ri - gi + 4 * diff
        };
        let mut h = (30.0 * sector as f32 / diff as f32 + 0.5).floor() as i32;
        if h < 0 {
            h += 180;
        }
        h
    };

    [h.clamp(0, 180) as u8, s.clamp(0, 255) as u8, v as u8]
}

/// Convert a whole frame to HSV
pub fn to_hsv(image: &RgbImage) -> HsvImage {
    let mut out = HsvImage::new(image.width(), image.height());
    for (src, dst) in image.pixels().zip(out.pixels_mut()) {
        let [r, g, b] = src.0;
        *dst = Rgb(rgb_to_hsv(r, g, b));
    }
    out
}

/// `image::Rgb` pixel for a (B, G, R) triple
#[inline]
pub fn rgb_from_bgr(bgr: [u8; 3]) -> Rgb<u8> {
    Rgb([bgr[2], bgr[1], bgr[0]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_hues() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(255, 0, 255), [150, 255, 255]);
        assert_eq!(rgb_to_hsv(255, 255, 0), [30, 255, 255]);
    }

    #[test]
    fn test_grays_have_no_saturation() {
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
        assert_eq!(rgb_to_hsv(255, 255, 255), [0, 0, 255]);
    }

    #[test]
    fn test_reddish_magenta_wraps_high() {
        // Red is max and blue exceeds green: hue lands just below 180
        let [h, _, _] = rgb_to_hsv(200, 20, 60);
        assert!(h >= 170, "hue {h}");
    }

    #[test]
    fn test_frame_conversion_matches_pixelwise() {
        let img = RgbImage::from_fn(4, 2, |x, y| Rgb([(x * 60) as u8, (y * 100) as u8, 30]));
        let hsv = to_hsv(&img);
        for (x, y, px) in img.enumerate_pixels() {
            assert_eq!(hsv.get_pixel(x, y).0, rgb_to_hsv(px[0], px[1], px[2]));
        }
    }
}
