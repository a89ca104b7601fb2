use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::config::PipelineConfig;
use crate::contour::Point;
use crate::locator::{MarkerDetection, MarkerLocator};
use crate::persistence::StrokeStore;
use crate::rendering::StrokeRenderer;
use crate::segmentation::ColorSegmenter;
use crate::trajectory::{FinishReason, TrajectorySession, TrajectoryTracker};
use crate::video::RgbFrame;

/// Frames between timing reports.
const TIMING_REPORT_INTERVAL: u64 = 300;

/// What happened on one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Tip located on this frame.
    pub tip: Option<Point>,
    /// Length of the in-progress path after this frame.
    pub path_len: usize,
    /// Dataset file written on this frame.
    pub saved: Option<PathBuf>,
}

#[derive(Default)]
struct StageTimings {
    frames: u64,
    segment: Duration,
    locate: Duration,
    track: Duration,
    render: Duration,
}

impl StageTimings {
    fn report_if_due(&self) {
        if self.frames == 0 || self.frames % TIMING_REPORT_INTERVAL != 0 {
            return;
        }
        let per_frame =
            |d: Duration| format!("{:.2}", d.as_secs_f64() * 1000.0 / self.frames as f64);
        tracing::info!(
            frames = self.frames,
            segment_ms_per_frame = per_frame(self.segment),
            locate_ms_per_frame = per_frame(self.locate),
            track_ms_per_frame = per_frame(self.track),
            render_ms_per_frame = per_frame(self.render),
            "pipeline timings"
        );
    }
}

/// Segment → locate → track → persist → render, one frame at a time.
///
/// Owns the single tracking session; calls must be serialised by the caller.
pub struct Pipeline {
    segmenter: ColorSegmenter,
    locator: MarkerLocator,
    tracker: TrajectoryTracker,
    session: TrajectorySession,
    store: StrokeStore,
    renderer: StrokeRenderer,
    timings: StageTimings,
    strokes_saved: usize,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate().context("invalid pipeline configuration")?;

        let seg = &config.segmentation;
        let tracker = TrajectoryTracker::new(config.tracking);
        let session = tracker.new_session();
        Ok(Self {
            segmenter: ColorSegmenter::new(seg.hue_bands, seg.median_kernel, seg.dilate_kernel),
            locator: MarkerLocator::new(seg.contour_mode),
            tracker,
            session,
            store: StrokeStore::new(&config.dataset.dir, config.dataset.min_stroke_len),
            renderer: StrokeRenderer::new(config.render),
            timings: StageTimings::default(),
            strokes_saved: 0,
        })
    }

    /// Process one frame in place.  The overlay is drawn into `frame`; a
    /// failed stroke write is returned as an error.
    pub fn run_inference(&mut self, frame: &mut RgbFrame) -> Result<FrameReport> {
        let start = Instant::now();
        let mask = self.segmenter.segment(frame);
        let segmented = Instant::now();

        let mut detection = self.locator.locate(&mask);
        let located = Instant::now();

        let update = self.tracker.update(
            &mut self.session,
            detection.tip,
            (frame.width, frame.height),
        );
        let mut saved = None;
        if let Some(finished) = update.finished {
            if finished.reason == FinishReason::Rest {
                // The frame that ends a stroke at rest shows no marker.
                detection = MarkerDetection::absent();
            }
            saved = self
                .store
                .persist(&finished.stroke)
                .context("failed to persist finished stroke")?;
            if saved.is_some() {
                self.strokes_saved += 1;
            }
        }
        let tracked = Instant::now();

        self.renderer.render(
            frame,
            detection.contour.as_ref(),
            detection.tip,
            self.session.path(),
        );
        let rendered = Instant::now();

        self.timings.frames += 1;
        self.timings.segment += segmented - start;
        self.timings.locate += located - segmented;
        self.timings.track += tracked - located;
        self.timings.render += rendered - tracked;
        self.timings.report_if_due();

        Ok(FrameReport {
            tip: detection.tip,
            path_len: self.session.path().len(),
            saved,
        })
    }

    /// Stop tracking.  The in-progress stroke is dropped, not saved; returns
    /// how many points were discarded.
    pub fn stop(&mut self) -> usize {
        let dropped = self.session.path().len();
        if dropped > 0 {
            tracing::info!(points = dropped, "tracking stopped; in-progress stroke discarded");
        }
        self.session.reset();
        dropped
    }

    pub fn session(&self) -> &TrajectorySession {
        &self.session
    }

    pub fn store(&self) -> &StrokeStore {
        &self.store
    }

    /// Strokes written since construction.
    pub fn strokes_saved(&self) -> usize {
        self.strokes_saved
    }
}
