//! trajectory — tip points → discrete strokes
//!
//! A [`TrajectorySession`] accumulates accepted tip points into the stroke in
//! progress.  Two independent gates shape it:
//!
//! * spatial: a tip becomes a path vertex only when it moved more than
//!   `min_change` pixels along x or y since the previous frame;
//! * behavioural: once the smoothed per-frame displacement drops below
//!   `min_velocity` on both axes while a path exists, the stroke is finished
//!   even though the marker is still visible.
//!
//! Losing the marker also finishes the stroke.  Every finish resets the whole
//! session in one step.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::contour::Point;
use crate::rendering::stroke_mask;
use crate::segmentation::Mask;

// ── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrajectoryConfig {
    /// Length of the velocity smoothing window, in frames.
    pub fps: usize,
    /// Capacity of the in-progress path.
    pub max_points: usize,
    /// Minimum per-axis displacement (px) for a tip to become a path vertex.
    pub min_change: u32,
    /// Smoothed velocity (px/frame) under which a visible marker is at rest.
    pub min_velocity: f32,
}

impl Default for TrajectoryConfig {
    fn default() -> Self {
        Self {
            fps: 20,
            max_points: 400,
            min_change: 10,
            min_velocity: 2.0,
        }
    }
}

// ── Stroke ───────────────────────────────────────────────────────────────────

/// Finished, immutable sequence of tip points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stroke {
    points: Vec<Point>,
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Why a stroke was finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// The marker left the frame.
    MarkerLost,
    /// The marker came to rest while still visible.
    Rest,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedStroke {
    pub stroke: Stroke,
    pub reason: FinishReason,
}

// ── Session ──────────────────────────────────────────────────────────────────

/// Mutable per-run tracking state.  Owned by the caller and handed to
/// [`TrajectoryTracker::update`] once per frame; not meant to be shared
/// between threads.
#[derive(Debug, Clone)]
pub struct TrajectorySession {
    last_position: Option<Point>,
    dx_history: VecDeque<u32>,
    dy_history: VecDeque<u32>,
    velocity_x: f32,
    velocity_y: f32,
    path: VecDeque<Point>,
    history_capacity: usize,
    path_capacity: usize,
}

impl TrajectorySession {
    pub fn new(config: &TrajectoryConfig) -> Self {
        Self {
            last_position: None,
            dx_history: VecDeque::with_capacity(config.fps),
            dy_history: VecDeque::with_capacity(config.fps),
            velocity_x: 0.0,
            velocity_y: 0.0,
            path: VecDeque::with_capacity(config.max_points),
            history_capacity: config.fps,
            path_capacity: config.max_points,
        }
    }

    /// Return every field to its idle value.
    pub fn reset(&mut self) {
        self.last_position = None;
        self.dx_history.clear();
        self.dy_history.clear();
        self.velocity_x = 0.0;
        self.velocity_y = 0.0;
        self.path.clear();
    }

    /// True when no marker is being followed.
    pub fn is_idle(&self) -> bool {
        self.last_position.is_none() && self.path.is_empty() && self.dx_history.is_empty()
    }

    pub fn last_position(&self) -> Option<Point> {
        self.last_position
    }

    /// Smoothed `(vx, vy)` in pixels per frame.
    pub fn velocity(&self) -> (f32, f32) {
        (self.velocity_x, self.velocity_y)
    }

    pub fn history_len(&self) -> usize {
        self.dx_history.len()
    }

    /// In-progress stroke, oldest vertex first.
    pub fn path(&self) -> &[Point] {
        // `push_point` keeps the deque contiguous.
        self.path.as_slices().0
    }

    fn push_displacement(&mut self, dx: u32, dy: u32) {
        if self.dx_history.len() >= self.history_capacity {
            self.dx_history.pop_front();
        }
        if self.dy_history.len() >= self.history_capacity {
            self.dy_history.pop_front();
        }
        self.dx_history.push_back(dx);
        self.dy_history.push_back(dy);
    }

    fn push_point(&mut self, point: Point) {
        if self.path.len() >= self.path_capacity {
            self.path.pop_front();
        }
        self.path.push_back(point);
        self.path.make_contiguous();
    }

    fn recompute_velocity(&mut self) {
        self.velocity_x = smoothed(&self.dx_history);
        self.velocity_y = smoothed(&self.dy_history);
    }

    /// Hand the current path out as a stroke and go idle.
    fn finish(&mut self, reason: FinishReason) -> FinishedStroke {
        let stroke = Stroke::new(self.path.drain(..).collect());
        self.reset();
        FinishedStroke { stroke, reason }
    }
}

/// `floor(mean)` of the displacement window.
fn smoothed(history: &VecDeque<u32>) -> f32 {
    if history.is_empty() {
        return 0.0;
    }
    let sum: u64 = history.iter().map(|&d| d as u64).sum();
    (sum / history.len() as u64) as f32
}

// ── Tracker ──────────────────────────────────────────────────────────────────

/// Output of one [`TrajectoryTracker::update`] call.
#[derive(Debug, Clone, Default)]
pub struct TrackUpdate {
    /// Connectivity mask of the path, present once it has two or more points.
    pub stroke_mask: Option<Mask>,
    /// Stroke finished on this frame, if any.
    pub finished: Option<FinishedStroke>,
}

#[derive(Debug, Clone, Default)]
pub struct TrajectoryTracker {
    config: TrajectoryConfig,
}

impl TrajectoryTracker {
    pub fn new(config: TrajectoryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrajectoryConfig {
        &self.config
    }

    pub fn new_session(&self) -> TrajectorySession {
        TrajectorySession::new(&self.config)
    }

    /// Advance `session` by one frame.  `frame_size` is `(width, height)` of
    /// the source frame and sizes the stroke mask.
    pub fn update(
        &self,
        session: &mut TrajectorySession,
        tip: Option<Point>,
        frame_size: (u32, u32),
    ) -> TrackUpdate {
        let Some(tip) = tip else {
            let finished = (!session.path.is_empty())
                .then(|| session.finish(FinishReason::MarkerLost));
            if let Some(f) = &finished {
                info!(points = f.stroke.len(), "marker lost; stroke finished");
            }
            session.reset();
            return TrackUpdate {
                stroke_mask: None,
                finished,
            };
        };

        let last = *session.last_position.get_or_insert(tip);
        let (dx, dy) = tip.abs_delta(last);
        session.push_displacement(dx, dy);
        if dx > self.config.min_change || dy > self.config.min_change {
            session.push_point(tip);
        }
        session.last_position = Some(tip);
        session.recompute_velocity();

        let (vx, vy) = session.velocity();
        debug!(
            x = tip.x,
            y = tip.y,
            dx,
            dy,
            vx,
            vy,
            path_len = session.path.len(),
            "tip tracked"
        );

        let path = session.path();
        if path.len() < 2 {
            return TrackUpdate::default();
        }
        let (width, height) = frame_size;
        let stroke_mask = Some(stroke_mask(path, width, height));

        let at_rest = vx < self.config.min_velocity && vy < self.config.min_velocity;
        let finished = at_rest.then(|| {
            let f = session.finish(FinishReason::Rest);
            info!(points = f.stroke.len(), vx, vy, "marker at rest; stroke finished");
            f
        });

        TrackUpdate {
            stroke_mask,
            finished,
        }
    }
}
