//! segmentation — RGB frame → binary marker mask
//!
//! Pixels are converted to 8-bit HSV, tested against two inclusive colour
//! bands, and the union is cleaned up with a median blur (speckle removal)
//! followed by a square dilation (gap closing).

use image::{GrayImage, Luma};
use imageproc::distance_transform::Norm;
use imageproc::filter::median_filter;
use imageproc::morphology::dilate;
use serde::{Deserialize, Serialize};

use crate::video::RgbFrame;

/// Single-channel mask: 255 where the marker is, 0 elsewhere.
pub type Mask = GrayImage;

pub const MASK_ON: u8 = 255;

// ── HSV bands ────────────────────────────────────────────────────────────────

/// Inclusive band in 8-bit HSV space (`H ∈ [0, 180)`, `S, V ∈ [0, 255]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HueRange {
    pub lower: [u8; 3],
    pub upper: [u8; 3],
}

impl HueRange {
    pub const fn new(lower: [u8; 3], upper: [u8; 3]) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| self.lower[c] <= hsv[c] && hsv[c] <= self.upper[c])
    }

    /// True when no channel has its lower bound above its upper bound.
    pub fn is_well_formed(&self) -> bool {
        (0..3).all(|c| self.lower[c] <= self.upper[c])
    }
}

/// Blue marker band.
pub const DEFAULT_HUE_RANGE: HueRange = HueRange::new([80, 90, 100], [120, 255, 255]);

/// Convert one RGB pixel to 8-bit HSV with the hue halved to fit a byte.
pub fn rgb_to_hsv(r: u8, g: u8, b: u8) -> [u8; 3] {
    let (rf, gf, bf) = (r as f32, g as f32, b as f32);
    let max = rf.max(gf).max(bf);
    let min = rf.min(gf).min(bf);
    let delta = max - min;

    let v = max;
    let s = if max > 0.0 { delta * 255.0 / max } else { 0.0 };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == rf {
        60.0 * (gf - bf) / delta
    } else if max == gf {
        120.0 + 60.0 * (bf - rf) / delta
    } else {
        240.0 + 60.0 * (rf - gf) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    let h = (h / 2.0).round() as u32 % 180;
    [h as u8, s.round() as u8, v as u8]
}

// ── Segmenter ────────────────────────────────────────────────────────────────

/// Stateless colour segmenter; identical frames always give identical masks.
#[derive(Debug, Clone)]
pub struct ColorSegmenter {
    bands: [HueRange; 2],
    median_radius: u32,
    dilate_radius: u8,
}

impl ColorSegmenter {
    /// `median_kernel` and `dilate_kernel` are full window sides (odd).
    pub fn new(bands: [HueRange; 2], median_kernel: u32, dilate_kernel: u32) -> Self {
        Self {
            bands,
            median_radius: median_kernel / 2,
            dilate_radius: (dilate_kernel / 2).min(u8::MAX as u32) as u8,
        }
    }

    /// Raw band test without denoising.
    pub fn threshold(&self, frame: &RgbFrame) -> Mask {
        let mut mask = GrayImage::new(frame.width, frame.height);
        for (dst, px) in mask.pixels_mut().zip(frame.data.chunks_exact(3)) {
            let hsv = rgb_to_hsv(px[0], px[1], px[2]);
            // Saturating add of two 0/255 masks.
            let hits = self.bands.iter().filter(|band| band.contains(hsv)).count();
            *dst = Luma([if hits > 0 { MASK_ON } else { 0 }]);
        }
        mask
    }

    /// Full segmentation: threshold, median blur, dilate.
    ///
    /// Callers must not pass a zero-sized frame.
    pub fn segment(&self, frame: &RgbFrame) -> Mask {
        let raw = self.threshold(frame);
        let blurred = if self.median_radius > 0 {
            median_filter(&raw, self.median_radius, self.median_radius)
        } else {
            raw
        };
        if self.dilate_radius > 0 {
            dilate(&blurred, Norm::LInf, self.dilate_radius)
        } else {
            blurred
        }
    }
}

impl Default for ColorSegmenter {
    fn default() -> Self {
        Self::new([DEFAULT_HUE_RANGE, DEFAULT_HUE_RANGE], 27, 9)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> RgbFrame {
        RgbFrame {
            data: rgb.repeat((width * height) as usize),
            width,
            height,
            pts: 0,
        }
    }

    fn paint_square(frame: &mut RgbFrame, x0: u32, y0: u32, side: u32, rgb: [u8; 3]) {
        for y in y0..y0 + side {
            for x in x0..x0 + side {
                let i = ((y * frame.width + x) * 3) as usize;
                frame.data[i..i + 3].copy_from_slice(&rgb);
            }
        }
    }

    #[test]
    fn test_hsv_primaries() {
        assert_eq!(rgb_to_hsv(255, 0, 0), [0, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 255, 0), [60, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 255), [120, 255, 255]);
        assert_eq!(rgb_to_hsv(0, 0, 0), [0, 0, 0]);
        assert_eq!(rgb_to_hsv(128, 128, 128), [0, 0, 128]);
    }

    #[test]
    fn test_band_is_inclusive() {
        let band = DEFAULT_HUE_RANGE;
        assert!(band.contains([80, 90, 100]));
        assert!(band.contains([120, 255, 255]));
        assert!(!band.contains([79, 200, 200]));
        assert!(!band.contains([121, 200, 200]));
        assert!(band.is_well_formed());
        assert!(!HueRange::new([10, 0, 0], [5, 255, 255]).is_well_formed());
    }

    #[test]
    fn test_no_marker_pixels_gives_empty_mask() {
        let frame = solid(64, 48, [200, 40, 40]);
        let mask = ColorSegmenter::default().segment(&frame);
        assert!(mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_either_band_marks_pixel() {
        let red = HueRange::new([0, 100, 100], [10, 255, 255]);
        let seg = ColorSegmenter::new([DEFAULT_HUE_RANGE, red], 1, 1);
        let mut frame = solid(4, 1, [255, 255, 255]);
        frame.data[0..3].copy_from_slice(&[220, 20, 20]);
        frame.data[3..6].copy_from_slice(&[20, 80, 200]);
        let mask = seg.threshold(&frame);
        let row: Vec<u8> = mask.pixels().map(|p| p.0[0]).collect();
        assert_eq!(row, vec![MASK_ON, MASK_ON, 0, 0]);
    }

    #[test]
    fn test_blur_removes_speckle_and_keeps_blob() {
        let mut frame = solid(120, 100, [240, 240, 240]);
        paint_square(&mut frame, 40, 30, 40, [20, 80, 200]);
        // Isolated marker-coloured speck far from the blob.
        paint_square(&mut frame, 5, 5, 2, [20, 80, 200]);

        let mask = ColorSegmenter::default().segment(&frame);
        assert_eq!(mask.get_pixel(60, 50).0[0], MASK_ON);
        assert_eq!(mask.get_pixel(6, 6).0[0], 0);
        // Dilation grows the blob past its painted edge.
        assert_eq!(mask.get_pixel(60, 27).0[0], MASK_ON);
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let mut frame = solid(96, 80, [250, 250, 250]);
        paint_square(&mut frame, 20, 20, 36, [20, 80, 200]);
        let seg = ColorSegmenter::default();
        assert_eq!(seg.segment(&frame), seg.segment(&frame));
    }
}
