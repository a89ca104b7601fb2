//! locator — largest marker region and its pen tip

use tracing::debug;

use crate::contour::{Contour, ContourExtractor, ContourMode, Point};
use crate::segmentation::Mask;

/// Result of locating the marker in one mask.  `contour` and `tip` are either
/// both present or both absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkerDetection {
    pub contour: Option<Contour>,
    pub tip: Option<Point>,
}

impl MarkerDetection {
    pub fn absent() -> Self {
        Self::default()
    }

    pub fn is_present(&self) -> bool {
        self.tip.is_some()
    }
}

pub struct MarkerLocator {
    extractor: Box<dyn ContourExtractor>,
}

impl MarkerLocator {
    pub fn new(mode: ContourMode) -> Self {
        Self {
            extractor: mode.extractor(),
        }
    }

    pub fn with_extractor(extractor: Box<dyn ContourExtractor>) -> Self {
        Self { extractor }
    }

    /// Pick the largest contour and its topmost point.  An empty mask is the
    /// normal "marker absent" case.
    pub fn locate(&self, mask: &Mask) -> MarkerDetection {
        let contours = self.extractor.extract_contours(mask);
        let count = contours.len();

        let Some(marker) = largest(contours) else {
            return MarkerDetection::absent();
        };
        let Some(tip) = marker.topmost() else {
            return MarkerDetection::absent();
        };

        debug!(contours = count, tip_x = tip.x, tip_y = tip.y, "marker located");
        MarkerDetection {
            contour: Some(marker),
            tip: Some(tip),
        }
    }
}

impl Default for MarkerLocator {
    fn default() -> Self {
        Self::new(ContourMode::default())
    }
}

/// First contour of maximal area, in extraction order.
fn largest(contours: Vec<Contour>) -> Option<Contour> {
    let mut best: Option<(f64, Contour)> = None;
    for contour in contours {
        if contour.is_empty() {
            continue;
        }
        let area = contour.area();
        if best.as_ref().is_none_or(|(a, _)| area > *a) {
            best = Some((area, contour));
        }
    }
    best.map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    struct Fixed(Vec<Contour>);

    impl ContourExtractor for Fixed {
        fn extract_contours(&self, _mask: &Mask) -> Vec<Contour> {
            self.0.clone()
        }
    }

    #[test]
    fn test_empty_mask_is_absent() {
        let detection = MarkerLocator::default().locate(&GrayImage::new(32, 32));
        assert_eq!(detection, MarkerDetection::absent());
        assert!(!detection.is_present());
    }

    #[test]
    fn test_picks_largest_region() {
        let mut mask = GrayImage::new(100, 100);
        fill(&mut mask, 5, 5, 6, 6);
        fill(&mut mask, 40, 30, 30, 40);

        let detection = MarkerLocator::default().locate(&mask);
        let tip = detection.tip.expect("tip");
        assert_eq!(tip.y, 30);
        assert!((40..70).contains(&tip.x));
        let contour = detection.contour.expect("contour");
        assert!(contour.points().iter().all(|p| p.x >= 40 && p.y >= 30));
    }

    #[test]
    fn test_tip_is_topmost_point() {
        let mut mask = GrayImage::new(60, 60);
        // An upside-down "T": a tall stem rising out of a wide base.
        fill(&mut mask, 10, 40, 40, 10);
        fill(&mut mask, 27, 12, 6, 30);

        let tip = MarkerLocator::default().locate(&mask).tip.expect("tip");
        assert_eq!(tip.y, 12);
        assert!((27..33).contains(&tip.x));
    }

    #[test]
    fn test_equal_areas_keep_first() {
        let square = |x: i32| {
            Contour::new(vec![
                Point::new(x, 0),
                Point::new(x + 4, 0),
                Point::new(x + 4, 4),
                Point::new(x, 4),
            ])
        };
        let locator = MarkerLocator::with_extractor(Box::new(Fixed(vec![square(10), square(0)])));
        let detection = locator.locate(&GrayImage::new(1, 1));
        assert_eq!(detection.tip, Some(Point::new(10, 0)));
    }
}
