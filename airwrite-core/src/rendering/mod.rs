//! rendering — visual feedback overlay
//!
//! Draws the marker outline, the pen tip and the in-progress trail directly
//! into the frame buffer.  Nothing here is persisted and nothing can fail:
//! a frame whose buffer does not match its dimensions is left untouched.

use image::{GenericImage, ImageBuffer, Luma, Pixel, Rgb};
use imageproc::drawing::{
    draw_antialiased_line_segment_mut, draw_filled_circle_mut, draw_line_segment_mut,
};
use imageproc::pixelops::interpolate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::contour::{Contour, Point};
use crate::segmentation::{Mask, MASK_ON};
use crate::video::RgbFrame;

/// Outline colour of the marker contour.
pub const CONTOUR_COLOR: [u8; 3] = [0, 255, 0];
/// Fill colour of the tip dot and the trail.
pub const TRAIL_COLOR: [u8; 3] = [255, 255, 0];
/// Tip dot radius in pixels.
const TIP_RADIUS: i32 = 4;
/// Trail and stroke-mask line thickness in pixels.
pub const LINE_THICKNESS: i32 = 4;

/// Independent toggles for the two overlay layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Contour outline and tip dot.
    pub marker: bool,
    /// Connected in-progress path.
    pub trails: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            marker: true,
            trails: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StrokeRenderer {
    options: RenderOptions,
}

impl StrokeRenderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    /// Overlay `contour`, `tip` and `path` onto `frame` in place.
    pub fn render(
        &self,
        frame: &mut RgbFrame,
        contour: Option<&Contour>,
        tip: Option<Point>,
        path: &[Point],
    ) {
        let (width, height) = (frame.width, frame.height);
        // Borrow the existing buffer; no copy, writes land in `frame.data`.
        let Some(mut img) =
            ImageBuffer::<Rgb<u8>, &mut [u8]>::from_raw(width, height, frame.data.as_mut_slice())
        else {
            warn!(width, height, "frame buffer does not match its dimensions; skipping overlay");
            return;
        };

        if self.options.marker {
            if let Some(contour) = contour {
                draw_closed_outline(&mut img, contour.points(), Rgb(CONTOUR_COLOR));
            }
            if let Some(tip) = tip {
                draw_filled_circle_mut(&mut img, (tip.x, tip.y), TIP_RADIUS, Rgb(TRAIL_COLOR));
            }
        }
        if self.options.trails {
            draw_thick_polyline(&mut img, path, Rgb(TRAIL_COLOR), LINE_THICKNESS);
        }
    }
}

/// Blank single-channel image with `path` drawn as connected thick
/// anti-aliased segments.  Used as the per-stroke connectivity mask.
pub fn stroke_mask(path: &[Point], width: u32, height: u32) -> Mask {
    let mut mask = Mask::new(width, height);
    draw_thick_polyline(&mut mask, path, Luma([MASK_ON]), LINE_THICKNESS);
    mask
}

fn draw_closed_outline<I>(img: &mut I, points: &[Point], color: I::Pixel)
where
    I: GenericImage,
{
    match points {
        [] => {}
        [only] => {
            if in_bounds(img, *only) {
                img.put_pixel(only.x as u32, only.y as u32, color);
            }
        }
        _ => {
            let closing = points.last().copied().zip(points.first().copied());
            let edges = points.windows(2).map(|w| (w[0], w[1])).chain(closing);
            for (a, b) in edges {
                draw_line_segment_mut(
                    img,
                    (a.x as f32, a.y as f32),
                    (b.x as f32, b.y as f32),
                    color,
                );
            }
        }
    }
}

/// Thick anti-aliased polyline built from parallel one-pixel segments offset
/// across the minor axis of each segment.
fn draw_thick_polyline<I>(img: &mut I, points: &[Point], color: I::Pixel, thickness: i32)
where
    I: GenericImage,
    I::Pixel: Pixel<Subpixel = u8>,
{
    let lo = -(thickness - 1) / 2;
    let hi = lo + thickness - 1;
    for pair in points.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let steep = a.y.abs_diff(b.y) > a.x.abs_diff(b.x);
        for offset in lo..=hi {
            let (ox, oy) = if steep { (offset, 0) } else { (0, offset) };
            draw_antialiased_line_segment_mut(
                img,
                (a.x + ox, a.y + oy),
                (b.x + ox, b.y + oy),
                color,
                interpolate,
            );
        }
    }
}

fn in_bounds<I: GenericImage>(img: &I, p: Point) -> bool {
    p.x >= 0 && p.y >= 0 && (p.x as u32) < img.width() && (p.y as u32) < img.height()
}
