//! Scroll and pinch event handling
//!
//! [`GridController`] owns an engine and its viewport and turns host events
//! into engine calls: every offset change runs a layout pass, scrolling that
//! comes to rest recenters, and pinch updates rescale within the limits of a
//! [`ZoomPolicy`].

use crate::config::GridConfig;
use crate::engine::{GridEngine, LayoutChange};
use crate::geometry::Point;
use crate::loader::ContentLoader;
use crate::viewport::Viewport;

/// Tile size limits enforced on pinch updates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomPolicy {
    pub min_tile_size: f64,
    pub max_tile_size: f64,
}

impl ZoomPolicy {
    pub fn new(min_tile_size: f64, max_tile_size: f64) -> Self {
        Self {
            min_tile_size,
            max_tile_size,
        }
    }

    /// Between 25 tiles and 2.5 tiles per screen height
    pub fn for_viewport_height(height: f64) -> Self {
        Self::new(height / 25.0, height / 2.5)
    }

    /// Factor to apply to `current` so the result stays within limits
    ///
    /// The second value is `true` when the requested factor had to be
    /// adjusted. A tile size already outside the range is pulled back in.
    /// Results within rounding error of `current` come back as exactly 1.0.
    pub fn clamp_factor(&self, current: f64, scale: f64) -> (f64, bool) {
        let target = current * scale;
        let clamped = target.max(self.min_tile_size).min(self.max_tile_size);
        let factor = if (clamped - current).abs() <= current.abs() * 1e-9 {
            1.0
        } else {
            clamped / current
        };
        (factor, clamped != target)
    }
}

/// What a pinch update did to the tile size
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomOutcome {
    /// Factor was 1.0 or unusable; nothing changed
    Unchanged,
    Applied { tile_size: f64 },
    /// Factor was limited by the policy; the embedder may want to tell the user
    Clamped { tile_size: f64 },
}

pub struct GridController<L, V> {
    engine: GridEngine<L>,
    viewport: V,
    policy: ZoomPolicy,
    gesture_active: bool,
}

impl<L: ContentLoader, V: Viewport> GridController<L, V> {
    /// Wrap `engine` and run the initial layout pass
    pub fn new(mut engine: GridEngine<L>, viewport: V, policy: ZoomPolicy) -> Self {
        engine.update_layout(&viewport);
        Self {
            engine,
            viewport,
            policy,
            gesture_active: false,
        }
    }

    /// Build engine and policy from `config`
    pub fn from_config(config: &GridConfig, loader: L, viewport: V) -> Self {
        let policy = config.zoom_policy(viewport.visible_size().height);
        let tile_size = config
            .initial_tile_size
            .max(policy.min_tile_size)
            .min(policy.max_tile_size);
        Self::new(GridEngine::new(tile_size, loader), viewport, policy)
    }

    pub fn engine(&self) -> &GridEngine<L> {
        &self.engine
    }

    pub fn viewport(&self) -> &V {
        &self.viewport
    }

    /// Mutable access for hosts that scroll the viewport themselves
    ///
    /// Follow up with [`refresh`](GridController::refresh) so the grid
    /// catches up.
    pub fn viewport_mut(&mut self) -> &mut V {
        &mut self.viewport
    }

    pub fn policy(&self) -> ZoomPolicy {
        self.policy
    }

    pub fn is_gesture_active(&self) -> bool {
        self.gesture_active
    }

    /// The scroll offset moved
    pub fn on_viewport_changed(&mut self, offset: Point) -> Option<LayoutChange> {
        self.viewport.set_offset(offset);
        self.refresh()
    }

    /// Re-run layout against the viewport's current state
    pub fn refresh(&mut self) -> Option<LayoutChange> {
        self.engine.update_layout(&self.viewport)
    }

    /// The user lifted their finger
    ///
    /// Recenters right away unless the scroll keeps decelerating, in which
    /// case [`on_deceleration_ended`](GridController::on_deceleration_ended)
    /// will follow.
    pub fn on_drag_ended(&mut self, will_decelerate: bool) -> bool {
        if will_decelerate {
            return false;
        }
        self.engine.realign(&mut self.viewport)
    }

    pub fn on_deceleration_ended(&mut self) -> bool {
        self.engine.realign(&mut self.viewport)
    }

    /// One pinch update, `scale` relative to the previous update
    pub fn on_gesture_update(&mut self, scale: f64) -> ZoomOutcome {
        self.gesture_active = true;
        if !scale.is_finite() || scale <= 0.0 {
            tracing::warn!(scale, "ignoring unusable pinch scale");
            return ZoomOutcome::Unchanged;
        }

        let current = self.engine.tile_size();
        let (factor, clamped) = self.policy.clamp_factor(current, scale);
        if factor == 1.0 {
            if clamped {
                tracing::debug!(tile_size = current, "zoom limit reached");
                return ZoomOutcome::Clamped { tile_size: current };
            }
            return ZoomOutcome::Unchanged;
        }

        self.engine.zoom(factor, &mut self.viewport);
        let tile_size = self.engine.tile_size();
        if clamped {
            tracing::warn!(
                requested = current * scale,
                tile_size,
                "zoom clamped to limits"
            );
            ZoomOutcome::Clamped { tile_size }
        } else {
            ZoomOutcome::Applied { tile_size }
        }
    }

    /// The pinch finished; make sure the grid is recentered
    pub fn on_gesture_ended(&mut self) -> bool {
        self.gesture_active = false;
        self.engine.update_layout(&self.viewport);
        self.engine.realign(&mut self.viewport)
    }

    pub fn apply_completions(&mut self) -> usize {
        self.engine.apply_completions()
    }
}
