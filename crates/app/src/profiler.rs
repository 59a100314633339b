//! Session Profiler
//!
//! Records how long each phase of the scripted session took and logs a
//! summary at the end.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Scripted session phases, in the order they run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionPhase {
    /// Initial layout and first batch of loads
    Startup,
    /// Long scroll with periodic recentering
    Scroll,
    PinchIn,
    PinchOut,
    /// Letting outstanding fetches settle
    Drain,
}

impl SessionPhase {
    pub const ALL: [SessionPhase; 5] = [
        SessionPhase::Startup,
        SessionPhase::Scroll,
        SessionPhase::PinchIn,
        SessionPhase::PinchOut,
        SessionPhase::Drain,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SessionPhase::Startup => "startup",
            SessionPhase::Scroll => "scroll",
            SessionPhase::PinchIn => "pinch in",
            SessionPhase::PinchOut => "pinch out",
            SessionPhase::Drain => "drain",
        }
    }
}

#[derive(Debug)]
pub struct SessionProfiler {
    start_time: Instant,
    phase_start: Instant,
    /// Accumulated time spent in each phase
    phase_times: HashMap<SessionPhase, Duration>,
}

impl Default for SessionProfiler {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionProfiler {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            start_time: now,
            phase_start: now,
            phase_times: HashMap::new(),
        }
    }

    /// Start timing a new phase
    pub fn begin(&mut self) {
        self.phase_start = Instant::now();
    }

    /// Close the phase started by the last [`begin`](SessionProfiler::begin)
    ///
    /// Repeated phases accumulate.
    pub fn end(&mut self, phase: SessionPhase) -> Duration {
        let elapsed = self.phase_start.elapsed();
        *self.phase_times.entry(phase).or_default() += elapsed;
        tracing::debug!(
            phase = phase.name(),
            ms = elapsed.as_secs_f64() * 1000.0,
            "session phase finished"
        );
        elapsed
    }

    pub fn phase_time(&self, phase: SessionPhase) -> Option<Duration> {
        self.phase_times.get(&phase).copied()
    }

    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn log_summary(&self) {
        for phase in SessionPhase::ALL {
            if let Some(time) = self.phase_time(phase) {
                tracing::info!(
                    phase = phase.name(),
                    ms = format_args!("{:.2}", time.as_secs_f64() * 1000.0),
                    "phase time"
                );
            }
        }
        tracing::info!(
            ms = format_args!("{:.2}", self.elapsed().as_secs_f64() * 1000.0),
            "session total"
        );
    }
}
