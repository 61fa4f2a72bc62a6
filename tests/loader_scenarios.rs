//! End-to-end scenarios driving the tile engine the way a host would:
//! viewport events in, frame ticks, fetch completions resolved by hand.

use rasterlet::{
    web_mercator_to_wgs84, wgs84_to_web_mercator, Clock, DefaultSizeEstimator, GeoBounds,
    TileCoord, TileEngine, TileFetcher, TileLoadHandle, TileLoader, TileLoaderConfig, TileState,
};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct ManualClock(AtomicU64);

impl ManualClock {
    fn advance(&self, ms: u64) {
        self.0.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

/// Captures fetch handles so the test decides when and how each load ends.
#[derive(Clone, Default)]
struct CapturingFetcher {
    handles: Arc<Mutex<Vec<TileLoadHandle<Vec<u8>>>>>,
}

impl CapturingFetcher {
    fn take_all(&self) -> Vec<TileLoadHandle<Vec<u8>>> {
        std::mem::take(&mut *self.handles.lock().unwrap())
    }

    fn count(&self) -> usize {
        self.handles.lock().unwrap().len()
    }
}

impl TileFetcher<Vec<u8>> for CapturingFetcher {
    fn fetch(&mut self, _coord: TileCoord, _generation: u64, handle: TileLoadHandle<Vec<u8>>) {
        self.handles.lock().unwrap().push(handle);
    }
}

/// Resolves every fetch synchronously and counts invocations.
#[derive(Clone, Default)]
struct InstantFetcher {
    calls: Arc<AtomicUsize>,
}

impl TileFetcher<Vec<u8>> for InstantFetcher {
    fn fetch(&mut self, _coord: TileCoord, _generation: u64, handle: TileLoadHandle<Vec<u8>>) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        handle.resolve(vec![0u8; 64]);
    }
}

fn engine_with(
    config: TileLoaderConfig,
) -> (TileEngine<Vec<u8>>, CapturingFetcher, Arc<ManualClock>) {
    let fetcher = CapturingFetcher::default();
    let clock = Arc::new(ManualClock::default());
    let loader = TileLoader::with_parts(
        Box::new(fetcher.clone()),
        config,
        Box::new(DefaultSizeEstimator),
        clock.clone(),
    );
    (TileEngine::from_loader(loader), fetcher, clock)
}

fn square_bounds() -> GeoBounds {
    GeoBounds::new(-10.0, 10.0, 10.0, -10.0)
}

/// Settles a view change: fires the debounce and runs one frame.
fn settle(engine: &mut TileEngine<Vec<u8>>, clock: &ManualClock, bounds: GeoBounds, zoom: u8) {
    engine.viewport_changed(bounds, zoom);
    clock.advance(151);
    engine.frame();
}

/// Ticks frames and resolves every outstanding fetch until quiet.
fn drain_to_loaded(engine: &mut TileEngine<Vec<u8>>, fetcher: &CapturingFetcher) {
    for _ in 0..32 {
        for handle in fetcher.take_all() {
            handle.resolve(vec![0u8; 64]);
        }
        engine.frame();
        let stats = engine.loading_stats();
        if stats.queued == 0 && stats.loading == 0 && fetcher.count() == 0 {
            break;
        }
    }
}

#[test]
fn scenario_generation_invalidation_on_zoom() {
    let (mut engine, fetcher, clock) = engine_with(TileLoaderConfig::default());
    settle(&mut engine, &clock, square_bounds(), 5);
    drain_to_loaded(&mut engine, &fetcher);

    let stats = engine.cache_stats();
    assert!(stats.entries > 0, "tiles should be cached after draining");
    let generation = engine.loading_stats().generation;

    // zoom bump invalidates synchronously, before any debounce fires
    engine.viewport_changed(square_bounds(), 6);
    assert_eq!(engine.loading_stats().generation, generation + 1);
    assert_eq!(engine.cache_stats().entries, 0);
}

#[test]
fn scenario_stale_load_discarded_after_zoom() {
    let (mut engine, fetcher, clock) = engine_with(TileLoaderConfig::default());
    settle(&mut engine, &clock, square_bounds(), 5);

    let handle = fetcher.take_all().remove(0);
    let key = handle.coord().key();

    // zoom while the load is outstanding, then let it "succeed"
    engine.viewport_changed(square_bounds(), 6);
    handle.resolve(vec![1, 2, 3]);
    clock.advance(151);
    engine.frame();

    match engine.get_tile(&key) {
        Some(record) => assert_ne!(record.state, TileState::Loaded),
        None => {}
    }
    let cache = engine.cache_stats();
    assert_eq!(cache.entries, 0, "stale success must not be admitted");
}

#[test]
fn scenario_center_tile_loads_first() {
    let (mut engine, fetcher, clock) = engine_with(TileLoaderConfig::default());
    let bounds = square_bounds();
    settle(&mut engine, &clock, bounds, 4);

    let handles = fetcher.take_all();
    assert!(!handles.is_empty());
    assert_eq!(
        handles[0].coord(),
        rasterlet::viewport_center_tile(&bounds, 4)
    );
}

#[test]
fn scenario_projection_round_trip() {
    let (lng, lat) = (-73.9857, 40.7484);
    let (x, y) = wgs84_to_web_mercator(lng, lat);
    let (lng2, lat2) = web_mercator_to_wgs84(x, y);
    assert!((lng2 - lng).abs() < 1e-7);
    assert!((lat2 - lat).abs() < 1e-7);
}

#[test]
fn scenario_debounced_pan_commits_latest_bounds_once() {
    let (mut engine, fetcher, clock) = engine_with(TileLoaderConfig::default());

    // park the view somewhere far away and let everything finish
    let parked = GeoBounds::new(-100.0, -90.0, -20.0, -40.0);
    settle(&mut engine, &clock, parked, 4);
    drain_to_loaded(&mut engine, &fetcher);

    let first = square_bounds();
    let second = GeoBounds::new(60.0, 80.0, 10.0, -10.0);

    // two pan updates 20 ms apart; nothing may fire before the debounce
    engine.viewport_changed(first, 4);
    clock.advance(20);
    engine.frame();
    engine.viewport_changed(second, 4);
    clock.advance(30);
    engine.frame();
    let stats = engine.loading_stats();
    assert_eq!(stats.queued + stats.loading, 0, "debounce must still hold");

    // ~50 ms after the second call it fires, with the second bounds
    clock.advance(21);
    engine.frame();
    let stats = engine.loading_stats();
    let expected: Vec<TileCoord> = rasterlet::visible_tiles(&second, 4);
    assert_eq!(stats.queued + stats.loading, expected.len());

    drain_to_loaded(&mut engine, &fetcher);
    let first_tiles = rasterlet::visible_tiles(&first, 4);
    for coord in first_tiles {
        match engine.get_tile(&coord.key()) {
            Some(record) => assert_ne!(
                record.state,
                TileState::Loaded,
                "first bounds must never have been committed"
            ),
            None => {}
        }
    }
    for coord in rasterlet::visible_tiles(&second, 4) {
        assert_eq!(engine.get_tile(&coord.key()).unwrap().state, TileState::Loaded);
    }
}

#[test]
fn scenario_frame_pacing_caps_starts_per_tick() {
    let fetcher = InstantFetcher::default();
    let clock = Arc::new(ManualClock::default());
    let loader = TileLoader::with_parts(
        Box::new(fetcher.clone()),
        TileLoaderConfig::default(),
        Box::new(DefaultSizeEstimator),
        clock.clone(),
    );
    let mut engine = TileEngine::from_loader(loader);

    // a wide viewport queues well over ten tiles
    let bounds = GeoBounds::new(-20.0, 20.0, 20.0, -20.0);
    engine.viewport_changed(bounds, 6);
    clock.advance(151);
    engine.frame();

    // one tick, two starts, even though completions land instantly
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);

    engine.frame();
    assert_eq!(fetcher.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn scenario_parent_fallback_survives_zoom_in() {
    let (mut engine, fetcher, clock) = engine_with(TileLoaderConfig::default());
    settle(&mut engine, &clock, square_bounds(), 4);
    drain_to_loaded(&mut engine, &fetcher);

    let parent = rasterlet::viewport_center_tile(&square_bounds(), 4);
    assert_eq!(engine.get_tile(&parent.key()).unwrap().state, TileState::Loaded);

    // zoom in; the exact child is not loaded yet, its parent stands in
    engine.viewport_changed(square_bounds(), 5);
    let child = parent.children()[0];
    let fallback = engine.find_loaded_parent(child).unwrap();
    assert_eq!(fallback.coord, parent);

    // once the child itself loads, no fallback is needed for drawing it
    clock.advance(151);
    engine.frame();
    drain_to_loaded(&mut engine, &fetcher);
    let record = engine.get_tile(&child.key());
    assert!(record.is_some());
}

#[test]
fn scenario_loading_stats_track_lifecycle() {
    let (mut engine, fetcher, clock) = engine_with(TileLoaderConfig::default());
    settle(&mut engine, &clock, square_bounds(), 4);

    let stats = engine.loading_stats();
    assert_eq!(stats.loading, 2);
    assert_eq!(stats.queued, 2);
    assert_eq!(stats.loaded, 0);

    let mut handles = fetcher.take_all();
    handles.remove(0).resolve(vec![1]);
    handles.remove(0).reject("offline");
    engine.frame();

    let stats = engine.loading_stats();
    assert_eq!(stats.loaded, 1);
    assert_eq!(stats.errored, 1);

    drain_to_loaded(&mut engine, &fetcher);
    assert_eq!(engine.loaded_tiles().len(), 3);
}
