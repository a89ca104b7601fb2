//! Pipeline configuration

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::contour::ContourMode;
use crate::persistence::{DEFAULT_DATASET_DIR, DEFAULT_MIN_STROKE_LEN};
use crate::rendering::RenderOptions;
use crate::segmentation::{HueRange, DEFAULT_HUE_RANGE};
use crate::trajectory::TrajectoryConfig;

/// Everything the pipeline needs, fixed at construction.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub segmentation: SegmentationConfig,
    pub tracking: TrajectoryConfig,
    pub dataset: DatasetConfig,
    pub render: RenderOptions,
}

/// Colour bands and mask clean-up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Two bands, OR-ed together.
    pub hue_bands: [HueRange; 2],
    /// Median blur window side (odd).
    pub median_kernel: u32,
    /// Dilation structuring element side.
    pub dilate_kernel: u32,
    /// Which borders the locator considers.
    pub contour_mode: ContourMode,
}

/// Where and when strokes are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    pub dir: PathBuf,
    /// Strokes with this many points or fewer are discarded.
    pub min_stroke_len: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            hue_bands: [DEFAULT_HUE_RANGE, DEFAULT_HUE_RANGE],
            median_kernel: 27,
            dilate_kernel: 9,
            contour_mode: ContourMode::Tree,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(DEFAULT_DATASET_DIR),
            min_stroke_len: DEFAULT_MIN_STROKE_LEN,
        }
    }
}

impl PipelineConfig {
    /// Read a JSON config file.  Omitted sections and fields keep their
    /// defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        let seg = &self.segmentation;
        for (i, band) in seg.hue_bands.iter().enumerate() {
            ensure!(
                band.is_well_formed(),
                "hue band {i} has a lower bound above its upper bound: {band:?}"
            );
        }
        ensure!(
            seg.median_kernel % 2 == 1,
            "median_kernel must be odd, got {}",
            seg.median_kernel
        );
        ensure!(seg.dilate_kernel > 0, "dilate_kernel must be positive");

        let tracking = &self.tracking;
        ensure!(tracking.fps > 0, "fps must be positive");
        ensure!(tracking.max_points > 0, "max_points must be positive");
        ensure!(
            tracking.min_velocity.is_finite() && tracking.min_velocity >= 0.0,
            "min_velocity must be a non-negative number, got {}",
            tracking.min_velocity
        );
        Ok(())
    }
}
