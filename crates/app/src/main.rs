//! tilegrid demo
//!
//! Runs a scripted headless session against a procedural tile source and logs
//! what the grid did. Configuration comes from `TILEGRID_*` environment
//! variables, layered over the TOML file named by `TILEGRID_CONFIG` if set.

mod logging;
mod profiler;
mod session;

use std::sync::Arc;

use anyhow::Context;
use tilegrid_cache::{CachingLoader, ContentCache, PatternSource};
use tilegrid_core::{GridConfig, GridController, ScrollViewport, Size};
use tilegrid_scheduler::WorkerPoolConfig;

use profiler::SessionProfiler;
use session::SessionScript;

/// Path of an optional TOML config file
const CONFIG_PATH_VAR: &str = "TILEGRID_CONFIG";

/// A portrait phone screen, in points
const SCREEN: Size = Size {
    width: 390.0,
    height: 844.0,
};

fn load_config() -> anyhow::Result<GridConfig> {
    match std::env::var_os(CONFIG_PATH_VAR) {
        Some(path) => {
            let config = GridConfig::from_file(&path)
                .with_context(|| format!("loading {}", path.to_string_lossy()))?;
            Ok(config.apply_env()?)
        }
        None => Ok(GridConfig::from_env()?),
    }
}

fn main() -> anyhow::Result<()> {
    logging::init_logging()?;
    let mut profiler = SessionProfiler::new();

    let config = load_config().context("invalid tilegrid configuration")?;
    tracing::info!(?config, "starting tilegrid demo");

    let cache = Arc::new(ContentCache::new(config.cache_size_bytes()));
    let loader = CachingLoader::new(
        PatternSource::new(),
        Arc::clone(&cache),
        WorkerPoolConfig::new(config.loader_workers),
    )
    .context("starting fetch workers")?;

    // The grid surface is screen sized and floats in a sea of scroll slack.
    let viewport = ScrollViewport::centered(SCREEN, SCREEN, config.surface_inset(SCREEN.height));
    let mut controller = GridController::from_config(&config, loader, viewport);
    tracing::info!(
        tile_size = controller.engine().tile_size(),
        min = controller.policy().min_tile_size,
        max = controller.policy().max_tile_size,
        presenting = controller.engine().presenting_count(),
        "grid ready"
    );

    let report = session::run(&mut controller, &SessionScript::default(), &mut profiler);

    let engine = report.engine;
    tracing::info!(
        layout_passes = engine.layout_passes,
        constructed = engine.tiles_constructed,
        reused = engine.tiles_reused,
        evicted = engine.tiles_evicted,
        realignments = engine.realignments,
        zooms = engine.zooms,
        "engine stats"
    );
    tracing::info!(
        started = engine.loads_started,
        applied = engine.loads_applied,
        failed = engine.loads_failed,
        stale = engine.stale_completions,
        clamped_updates = report.clamped_updates,
        final_tile_size = report.final_tile_size,
        "load stats"
    );

    let grid_engine = controller.engine();
    let loader_stats = grid_engine.loader().stats();
    let cache_stats = cache.stats();
    tracing::info!(
        requests = loader_stats.requests,
        cache_hits = loader_stats.cache_hits,
        refetches = loader_stats.refetches,
        fetched = loader_stats.fetched,
        cancelled = loader_stats.cancelled,
        entries = cache_stats.entry_count,
        memory_mb = cache_stats.memory_used / (1024 * 1024),
        hit_rate = format_args!("{:.1}%", cache_stats.hit_rate() * 100.0),
        "content stats"
    );
    tracing::info!(
        tiles = grid_engine.constructed_count(),
        presenting = grid_engine.presenting_count(),
        free = grid_engine.free_count(),
        "tile pool"
    );

    profiler.log_summary();
    if report.unsettled_phases > 0 {
        tracing::warn!(
            phases = report.unsettled_phases,
            "some phases ended with tiles still loading"
        );
    }
    Ok(())
}
