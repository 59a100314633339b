//! Scripted headless session
//!
//! Drives a grid the way a user would: a long diagonal scroll with the finger
//! lifted every few steps, then a pinch in and a pinch out. Between phases it
//! waits for outstanding tile loads to settle.

use std::thread;
use std::time::{Duration, Instant};

use tilegrid_cache::{CachingLoader, ContentSource};
use tilegrid_core::{EngineStats, GridController, Point, ScrollViewport, ZoomOutcome};

use crate::profiler::{SessionPhase, SessionProfiler};

pub type DemoController<S> = GridController<CachingLoader<S>, ScrollViewport>;

#[derive(Debug, Clone, PartialEq)]
pub struct SessionScript {
    /// Number of scroll events
    pub scroll_steps: usize,
    /// Offset change per scroll event
    pub scroll_step: Point,
    /// Scroll events per drag; the grid recenters after each drag
    pub steps_per_drag: usize,
    /// Per-update scale factors of the first pinch
    pub pinch_in: Vec<f64>,
    /// Per-update scale factors of the second pinch
    pub pinch_out: Vec<f64>,
    /// How long to wait for loads to settle after each phase
    pub settle_timeout: Duration,
}

impl Default for SessionScript {
    fn default() -> Self {
        Self {
            scroll_steps: 600,
            scroll_step: Point::new(37.0, 53.0),
            steps_per_drag: 20,
            pinch_in: vec![1.08; 12],
            pinch_out: vec![0.85; 20],
            settle_timeout: Duration::from_secs(5),
        }
    }
}

/// What happened during a session
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionReport {
    pub engine: EngineStats,
    pub clamped_updates: usize,
    pub unsettled_phases: usize,
    pub final_tile_size: f64,
}

/// Run `script` against `controller`
pub fn run<S: ContentSource>(
    controller: &mut DemoController<S>,
    script: &SessionScript,
    profiler: &mut SessionProfiler,
) -> SessionReport {
    let mut report = SessionReport::default();

    profiler.begin();
    settle(controller, script.settle_timeout, &mut report);
    profiler.end(SessionPhase::Startup);

    profiler.begin();
    let steps_per_drag = script.steps_per_drag.max(1);
    for step in 1..=script.scroll_steps {
        let delta = script.scroll_step;
        controller.viewport_mut().scroll_by(delta.x, delta.y);
        controller.refresh();
        controller.apply_completions();

        if step % steps_per_drag == 0 {
            // Alternate between a flick that coasts and a drag that stops dead.
            let decelerating = (step / steps_per_drag) % 2 == 0;
            controller.on_drag_ended(decelerating);
            if decelerating {
                controller.on_deceleration_ended();
            }
            controller.engine().loader().purge_cancelled();
        }
    }
    controller.on_drag_ended(false);
    profiler.end(SessionPhase::Scroll);

    profiler.begin();
    settle(controller, script.settle_timeout, &mut report);
    profiler.end(SessionPhase::Drain);

    for (phase, scales) in [
        (SessionPhase::PinchIn, &script.pinch_in),
        (SessionPhase::PinchOut, &script.pinch_out),
    ] {
        profiler.begin();
        pinch(controller, scales, &mut report);
        profiler.end(phase);

        profiler.begin();
        settle(controller, script.settle_timeout, &mut report);
        profiler.end(SessionPhase::Drain);
    }

    report.engine = controller.engine().stats();
    report.final_tile_size = controller.engine().tile_size();
    report
}

fn pinch<S: ContentSource>(
    controller: &mut DemoController<S>,
    scales: &[f64],
    report: &mut SessionReport,
) {
    for &scale in scales {
        if let ZoomOutcome::Clamped { tile_size } = controller.on_gesture_update(scale) {
            report.clamped_updates += 1;
            tracing::info!(tile_size, "pinch hit the zoom limit");
        }
        controller.apply_completions();
    }
    controller.on_gesture_ended();
}

/// Apply completions until every presenting tile has finished loading
fn settle<S: ContentSource>(
    controller: &mut DemoController<S>,
    timeout: Duration,
    report: &mut SessionReport,
) {
    let deadline = Instant::now() + timeout;
    loop {
        controller.apply_completions();
        let loading = controller
            .engine()
            .tiles()
            .filter(|(_, tile)| tile.is_loading())
            .count();
        if loading == 0 {
            return;
        }
        if Instant::now() >= deadline {
            report.unsettled_phases += 1;
            tracing::warn!(loading, "tiles still loading after settle timeout");
            return;
        }
        thread::sleep(Duration::from_millis(2));
    }
}
