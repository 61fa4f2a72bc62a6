//! Viewport-driven tile loader.
//!
//! The loader owns the tile lifecycle from enumeration to cache admission:
//! view changes are debounced, visible tiles are enumerated and ordered
//! center-out, loads start under an in-flight cap with per-frame pacing,
//! and results landing after a zoom change are discarded by generation.
//!
//! Scheduling is cooperative and single-threaded. Hosts call
//! [`TileLoader::update_viewport`] on pan/zoom events and
//! [`TileLoader::process_queue`] once per render frame; fetch transports
//! run wherever the host likes and report back through [`TileLoadHandle`].

use crate::core::geo::{GeoBounds, TileCoord};
use crate::tiles::cache::{CacheStats, TileCache};
use crate::tiles::priority::{prioritize_tiles, viewport_center_tile, visible_tiles};
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

/// Monotonic millisecond clock injected into the loader.
///
/// Debounce deadlines and fade ramps are measured against this, so hosts
/// (and tests) control time instead of a process-wide source.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Monotonic clock measured from construction.
#[derive(Debug)]
pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

/// Sizes payloads for cache accounting.
pub trait SizeEstimator<T>: Send {
    fn estimate(&self, payload: &T) -> usize;
}

/// Flat 1 MiB guess for hosts that don't wire a real estimator.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSizeEstimator;

impl<T> SizeEstimator<T> for DefaultSizeEstimator {
    fn estimate(&self, _payload: &T) -> usize {
        1 << 20
    }
}

/// Byte size of a `width × height` texture at `bytes_per_pixel`.
pub fn texture_size_bytes(width: usize, height: usize, bytes_per_pixel: usize) -> usize {
    width * height * bytes_per_pixel
}

/// [`texture_size_bytes`] for the usual RGBA8 case.
pub fn rgba_texture_size_bytes(width: usize, height: usize) -> usize {
    texture_size_bytes(width, height, 4)
}

/// Host-supplied fetch-and-decode seam.
///
/// `fetch` must not block; it starts the work (on whatever transport or
/// runtime the host owns) and eventually resolves or rejects the handle.
/// There is no cancel signal: a fetch whose generation has been superseded
/// keeps running, and its result is silently discarded on delivery.
pub trait TileFetcher<T>: Send {
    fn fetch(&mut self, coord: TileCoord, generation: u64, handle: TileLoadHandle<T>);
}

/// Completion endpoint for one outstanding tile fetch.
pub struct TileLoadHandle<T> {
    key: String,
    coord: TileCoord,
    generation: u64,
    tx: Sender<TileCompletion<T>>,
}

impl<T> TileLoadHandle<T> {
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Delivers a decoded payload back to the loader.
    pub fn resolve(self, payload: T) {
        let _ = self.tx.send(TileCompletion {
            key: self.key,
            generation: self.generation,
            result: Ok(payload),
        });
    }

    /// Reports a failed fetch back to the loader.
    pub fn reject(self, error: impl Into<String>) {
        let _ = self.tx.send(TileCompletion {
            key: self.key,
            generation: self.generation,
            result: Err(error.into()),
        });
    }
}

struct TileCompletion<T> {
    key: String,
    generation: u64,
    result: Result<T, String>,
}

/// Lifecycle of a tracked tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TileState {
    Pending,
    Loading,
    Loaded,
    Error,
}

/// Book-keeping for one tile the loader has seen.
#[derive(Debug, Clone)]
pub struct TileRecord<T> {
    pub coord: TileCoord,
    pub key: String,
    pub state: TileState,
    pub payload: Option<Arc<T>>,
    pub error: Option<String>,
    pub load_time_ms: Option<u64>,
    pub generation: u64,
}

impl<T> TileRecord<T> {
    fn new(coord: TileCoord, generation: u64) -> Self {
        Self {
            coord,
            key: coord.key(),
            state: TileState::Pending,
            payload: None,
            error: None,
            load_time_ms: None,
            generation,
        }
    }
}

/// Tuning knobs for loading behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileLoaderConfig {
    /// Upper bound on simultaneously outstanding fetches.
    pub max_concurrent_loads: usize,
    /// Upper bound on new loads started per `process_queue` tick.
    pub max_starts_per_frame: usize,
    /// Delay before committing a pan-only view change.
    pub pan_debounce_ms: u64,
    /// Delay before committing a zoom change; new starts are suppressed
    /// for this window.
    pub zoom_debounce_ms: u64,
    /// Cache budget in mebibytes.
    pub cache_size_mb: usize,
    /// Divisor for the fade-alpha ramp.
    pub fade_duration_ms: u64,
}

impl Default for TileLoaderConfig {
    fn default() -> Self {
        Self {
            max_concurrent_loads: 4,
            max_starts_per_frame: 2,
            pan_debounce_ms: 50,
            zoom_debounce_ms: 150,
            cache_size_mb: 50,
            fade_duration_ms: 250,
        }
    }
}

/// Snapshot of loader occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LoadingStats {
    pub queued: usize,
    pub loading: usize,
    pub loaded: usize,
    pub errored: usize,
    pub generation: u64,
}

#[derive(Debug, Clone, Copy)]
struct PendingView {
    bounds: GeoBounds,
    zoom: u8,
    deadline_ms: u64,
}

/// The tile loading engine.
///
/// Owns the record map, the pending queue, the in-flight set and the
/// payload cache; nothing outside the loader mutates them.
pub struct TileLoader<T> {
    config: TileLoaderConfig,
    cache: TileCache<Arc<T>>,
    records: HashMap<String, TileRecord<T>>,
    queue: VecDeque<String>,
    in_flight: HashSet<String>,
    load_generation: u64,
    last_zoom: Option<u8>,
    is_zooming: bool,
    pending_view: Option<PendingView>,
    fetcher: Box<dyn TileFetcher<T>>,
    estimator: Box<dyn SizeEstimator<T>>,
    clock: Arc<dyn Clock>,
    completion_tx: Sender<TileCompletion<T>>,
    completion_rx: Receiver<TileCompletion<T>>,
}

impl<T> TileLoader<T> {
    /// Creates a loader with default configuration, estimator and clock.
    pub fn new(fetcher: Box<dyn TileFetcher<T>>) -> Self {
        Self::with_config(fetcher, TileLoaderConfig::default())
    }

    pub fn with_config(fetcher: Box<dyn TileFetcher<T>>, config: TileLoaderConfig) -> Self {
        Self::with_parts(
            fetcher,
            config,
            Box::new(DefaultSizeEstimator),
            Arc::new(SystemClock::new()),
        )
    }

    /// Fully injected constructor; tests drive a manual clock through here.
    pub fn with_parts(
        fetcher: Box<dyn TileFetcher<T>>,
        config: TileLoaderConfig,
        estimator: Box<dyn SizeEstimator<T>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (completion_tx, completion_rx) = unbounded();
        Self {
            cache: TileCache::new(config.cache_size_mb),
            records: HashMap::new(),
            queue: VecDeque::new(),
            in_flight: HashSet::new(),
            load_generation: 0,
            last_zoom: None,
            is_zooming: false,
            pending_view: None,
            config,
            fetcher,
            estimator,
            clock,
            completion_tx,
            completion_rx,
        }
    }

    /// Ingests a pan/zoom event.
    ///
    /// Zoom changes take effect immediately (generation bump, queue and
    /// cache invalidation); the enumeration itself is debounced so a
    /// gesture in progress settles before tiles are requested.
    pub fn update_viewport(&mut self, bounds: GeoBounds, zoom: u8) {
        let zoom_changed = self.last_zoom != Some(zoom);
        if zoom_changed {
            self.handle_zoom_change(zoom);
            self.is_zooming = true;
        }

        let delay = if zoom_changed {
            self.config.zoom_debounce_ms
        } else {
            self.config.pan_debounce_ms
        };

        // one slot: rearming cancels whichever timer was pending
        self.pending_view = Some(PendingView {
            bounds,
            zoom,
            deadline_ms: self.clock.now_ms() + delay,
        });
    }

    /// Drains completions and starts queued loads, honoring the in-flight
    /// cap and the per-frame start budget. Call once per render frame.
    pub fn process_queue(&mut self) {
        self.poll_debounce();
        self.drain_completions();

        if self.is_zooming {
            return;
        }

        let mut starts = 0;
        while self.in_flight.len() < self.config.max_concurrent_loads
            && starts < self.config.max_starts_per_frame
        {
            let Some(key) = self.queue.pop_front() else {
                break;
            };

            // stale or vanished entries fall out without consuming a start
            let current = self.load_generation;
            let Some(record) = self.records.get_mut(&key) else {
                continue;
            };
            if record.generation != current {
                continue;
            }

            record.state = TileState::Loading;
            let coord = record.coord;
            self.in_flight.insert(key.clone());

            log::debug!("starting load for {} (generation {})", coord, current);
            let handle = TileLoadHandle {
                key,
                coord,
                generation: current,
                tx: self.completion_tx.clone(),
            };
            self.fetcher.fetch(coord, current, handle);
            starts += 1;
        }
    }

    /// Looks a tile up for rendering, preferring the cache.
    ///
    /// A cache hit is reflected back into the record map (creating a thin
    /// record if the tile was never tracked this generation).
    pub fn get_tile(&mut self, key: &str) -> Option<&TileRecord<T>> {
        let cached = self.cache.get(key).cloned();
        if let Some(payload) = cached {
            let coord = match self.records.get(key) {
                Some(record) => record.coord,
                None => TileCoord::parse_key(key)?,
            };
            let generation = self.load_generation;
            let record = self
                .records
                .entry(key.to_string())
                .or_insert_with(|| TileRecord::new(coord, generation));
            record.state = TileState::Loaded;
            record.payload = Some(payload);
            return self.records.get(key);
        }

        self.records.get(key)
    }

    /// Every record currently in `Loaded` state.
    pub fn get_loaded_tiles(&self) -> Vec<&TileRecord<T>> {
        self.records
            .values()
            .filter(|record| record.state == TileState::Loaded)
            .collect()
    }

    /// Walks the parent chain and returns the nearest loaded ancestor.
    ///
    /// Lets the renderer draw a lower-resolution ancestor while the exact
    /// tile streams in.
    pub fn find_loaded_parent(&self, coord: TileCoord) -> Option<&TileRecord<T>> {
        let mut current = coord;
        while let Some(parent) = current.parent() {
            if let Some(record) = self.records.get(&parent.key()) {
                if record.state == TileState::Loaded {
                    return Some(record);
                }
            }
            current = parent;
        }
        None
    }

    /// Fade-in alpha for a record, ramping 0 → 1 over the configured fade
    /// duration. Purely advisory.
    pub fn tile_fade_alpha(&self, record: &TileRecord<T>) -> f32 {
        match record.load_time_ms {
            None => 1.0,
            Some(loaded_at) => {
                let elapsed = self.clock.now_ms().saturating_sub(loaded_at) as f32;
                (elapsed / self.config.fade_duration_ms as f32).min(1.0)
            }
        }
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn get_loading_stats(&self) -> LoadingStats {
        let mut loaded = 0;
        let mut errored = 0;
        for record in self.records.values() {
            match record.state {
                TileState::Loaded => loaded += 1,
                TileState::Error => errored += 1,
                _ => {}
            }
        }
        LoadingStats {
            queued: self.queue.len(),
            loading: self.in_flight.len(),
            loaded,
            errored,
            generation: self.load_generation,
        }
    }

    /// Drops all records, queued work and cached payloads.
    ///
    /// The generation is bumped so results from loads still in flight are
    /// discarded instead of resurrecting cleared records.
    pub fn clear(&mut self) {
        self.load_generation += 1;
        self.records.clear();
        self.queue.clear();
        self.in_flight.clear();
        self.cache.clear();
        self.pending_view = None;
        self.is_zooming = false;
        self.last_zoom = None;
    }

    pub fn config(&self) -> &TileLoaderConfig {
        &self.config
    }

    pub fn generation(&self) -> u64 {
        self.load_generation
    }

    pub fn is_zooming(&self) -> bool {
        self.is_zooming
    }

    /// Commits the zoom change: new generation, queue cleared, old cache
    /// generations invalidated, stale flights reset to `Pending`.
    ///
    /// Outstanding fetches keep running; their results are discarded on
    /// delivery by the generation check.
    fn handle_zoom_change(&mut self, new_zoom: u8) {
        self.load_generation += 1;
        self.last_zoom = Some(new_zoom);
        self.queue.clear();
        self.cache.invalidate_old_generations(self.load_generation);

        let current = self.load_generation;
        let stale: Vec<String> = self
            .in_flight
            .iter()
            .filter(|key| {
                self.records
                    .get(*key)
                    .map_or(true, |record| record.generation < current)
            })
            .cloned()
            .collect();
        for key in stale {
            self.in_flight.remove(&key);
            if let Some(record) = self.records.get_mut(&key) {
                record.state = TileState::Pending;
            }
        }

        log::debug!("zoom change to {}, generation now {}", new_zoom, current);
    }

    /// Enumerates the settled viewport and queues missing tiles in
    /// center-out order.
    fn process_view_change(&mut self, bounds: &GeoBounds, zoom: u8) {
        let visible = visible_tiles(bounds, zoom);
        let center = viewport_center_tile(bounds, zoom);
        let ordered = prioritize_tiles(visible, center);

        let generation = self.load_generation;
        for coord in ordered {
            let key = coord.key();
            if self.cache.has(&key) || self.in_flight.contains(&key) || self.queue.contains(&key)
            {
                continue;
            }

            let record = self
                .records
                .entry(key.clone())
                .or_insert_with(|| TileRecord::new(coord, generation));
            record.generation = generation;
            record.state = TileState::Pending;
            record.payload = None;
            record.error = None;
            record.load_time_ms = None;

            self.queue.push_back(key);
        }

        log::debug!(
            "view change at zoom {}: {} queued, generation {}",
            zoom,
            self.queue.len(),
            generation
        );
    }

    fn poll_debounce(&mut self) {
        let now = self.clock.now_ms();
        let due = matches!(self.pending_view, Some(pending) if now >= pending.deadline_ms);
        if !due {
            return;
        }

        if let Some(pending) = self.pending_view.take() {
            self.is_zooming = false;
            self.process_view_change(&pending.bounds, pending.zoom);
        }
    }

    fn drain_completions(&mut self) {
        while let Ok(completion) = self.completion_rx.try_recv() {
            self.apply_completion(completion);
        }
    }

    fn apply_completion(&mut self, completion: TileCompletion<T>) {
        let TileCompletion {
            key,
            generation,
            result,
        } = completion;

        if generation != self.load_generation {
            // the flight entry was dropped when the zoom changed; it must
            // only be removed here if the key was not restarted under the
            // current generation
            if self.records.get(&key).map(|r| r.generation) == Some(generation) {
                self.in_flight.remove(&key);
            }
            log::debug!("discarding stale result for {} (generation {})", key, generation);
            return;
        }

        self.in_flight.remove(&key);
        let Some(record) = self.records.get_mut(&key) else {
            return;
        };

        match result {
            Ok(payload) => {
                let size = self.estimator.estimate(&payload);
                let payload = Arc::new(payload);
                record.payload = Some(Arc::clone(&payload));
                record.state = TileState::Loaded;
                record.load_time_ms = Some(self.clock.now_ms());
                record.error = None;
                self.cache.set(key, payload, size, generation);
            }
            Err(message) => {
                log::warn!("tile {} failed to load: {}", key, message);
                record.state = TileState::Error;
                record.error = Some(message);
            }
        }
    }
}
