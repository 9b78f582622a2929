//! Heatmap control panel state: visibility, cycle offset, overlay and
//! navigation.
//!
//! Fetches run on worker threads and report back over a channel; the UI loop
//! drains completions with [`HeatmapController::process_completed`]. Each
//! request carries a generation number and only the newest one is applied,
//! so an older response arriving late can never replace a newer overlay.

use crate::client::{FetchError, HeatmapSource};
use crate::config::AirlineContext;
use crate::heatmap::{cycle_label, HeatmapOverlay, HeatmapResponse, NavDirection, NavState};
use crate::map::{MapWidget, OverlayHandle};
use chrono::{DateTime, Local};
use std::sync::{mpsc, Arc};

struct FetchOutcome {
    generation: u64,
    airline_id: i64,
    cycle_delta: i64,
    result: Result<HeatmapResponse, FetchError>,
}

/// Snapshot taken by `update_nav_state` after a successful render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RenderedNav {
    airline_id: i64,
    cycle_offset: i64,
    min_delta_count: i64,
    nav: NavState,
}

pub struct HeatmapController<S: HeatmapSource, M: MapWidget> {
    source: Arc<S>,
    map: M,
    airlines: AirlineContext,

    visible: bool,
    cycle_offset: i64,
    current_overlay: Option<OverlayHandle>,
    rendered: Option<RenderedNav>,

    generation: u64,
    /// Generation of the newest request not yet applied
    pending: Option<u64>,
    tx: mpsc::Sender<FetchOutcome>,
    rx: mpsc::Receiver<FetchOutcome>,

    last_error: Option<String>,
    last_updated: Option<DateTime<Local>>,
}

impl<S: HeatmapSource, M: MapWidget> HeatmapController<S, M> {
    pub fn new(source: Arc<S>, map: M, airlines: AirlineContext) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            source,
            map,
            airlines,
            visible: false,
            cycle_offset: 0,
            current_overlay: None,
            rendered: None,
            generation: 0,
            pending: None,
            tx,
            rx,
            last_error: None,
            last_updated: None,
        }
    }

    /// Entry point bound to the heatmap button
    pub fn toggle(&mut self) {
        if self.visible {
            self.close();
        } else {
            self.open();
        }
    }

    pub fn open(&mut self) {
        self.cycle_offset = 0;
        self.rendered = None;
        self.last_error = None;
        self.visible = true;

        let Some(airline_id) = self.airlines.resolve_airline_id() else {
            log::info!("Heatmap opened without an airline, nothing to fetch");
            return;
        };
        log::info!("Heatmap opened for airline {}", airline_id);
        self.fetch_and_render(airline_id);
    }

    pub fn close(&mut self) {
        if let Some(handle) = self.current_overlay.take() {
            self.map.detach(handle);
        }
        // Responses still in flight belong to the closed session
        if self.pending.take().is_some() {
            self.generation += 1;
        }
        self.visible = false;
    }

    /// Start one background request for the current offset and return
    /// immediately
    pub fn fetch_and_render(&mut self, airline_id: i64) {
        self.generation += 1;
        self.pending = Some(self.generation);

        let generation = self.generation;
        let cycle_delta = self.cycle_offset;
        let source = Arc::clone(&self.source);
        let tx = self.tx.clone();

        log::debug!(
            "Fetching heatmap #{} airline={} cycleDelta={}",
            generation,
            airline_id,
            cycle_delta
        );
        std::thread::spawn(move || {
            let result = source.fetch(airline_id, cycle_delta);
            // Receiver gone means the app is shutting down
            let _ = tx.send(FetchOutcome {
                generation,
                airline_id,
                cycle_delta,
                result,
            });
        });
    }

    /// Apply every finished request. Returns true when visible state changed.
    pub fn process_completed(&mut self) -> bool {
        let mut changed = false;
        while let Ok(outcome) = self.rx.try_recv() {
            changed |= self.apply(outcome);
        }
        changed
    }

    fn apply(&mut self, outcome: FetchOutcome) -> bool {
        if outcome.generation != self.generation {
            log::debug!(
                "Dropping stale heatmap response #{} (latest #{})",
                outcome.generation,
                self.generation
            );
            return false;
        }
        self.pending = None;

        match outcome.result {
            Ok(response) => {
                if let Some(old) = self.current_overlay.take() {
                    self.map.detach(old);
                }
                let overlay = HeatmapOverlay::from_response(&response);
                log::info!(
                    "Heatmap airline={} cycleDelta={}: {} points, maxIntensity={}, minDeltaCount={}",
                    outcome.airline_id,
                    outcome.cycle_delta,
                    overlay.locations.len(),
                    response.max_intensity,
                    response.min_delta_count
                );
                self.current_overlay = Some(self.map.attach(overlay));
                self.last_error = None;
                self.last_updated = Some(Local::now());
                self.update_nav_state(response.min_delta_count, outcome.airline_id);
                true
            }
            Err(e) => {
                log::error!(
                    "Heatmap fetch failed for airline {} (cycleDelta={}): {}",
                    outcome.airline_id,
                    outcome.cycle_delta,
                    e
                );
                self.last_error = Some(e.to_string());
                // Keep the offset consistent with what is on screen
                if let Some(rendered) = self.rendered {
                    self.cycle_offset = rendered.cycle_offset;
                }
                true
            }
        }
    }

    pub fn update_nav_state(&mut self, min_delta_count: i64, airline_id: i64) {
        let nav = NavState::compute(self.cycle_offset, min_delta_count);
        self.rendered = Some(RenderedNav {
            airline_id,
            cycle_offset: self.cycle_offset,
            min_delta_count,
            nav,
        });
    }

    /// Move the offset by the direction's delta and re-fetch. Returns false
    /// (and does nothing) when the direction is currently disabled.
    pub fn step(&mut self, direction: NavDirection) -> bool {
        if !self.visible {
            return false;
        }
        let Some(rendered) = self.rendered else {
            return false;
        };
        // Check against the live offset so repeated input during a fetch
        // cannot run past the bounds
        if !NavState::compute(self.cycle_offset, rendered.min_delta_count).allows(direction) {
            return false;
        }
        self.cycle_offset += direction.delta();
        self.fetch_and_render(rendered.airline_id);
        true
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn cycle_offset(&self) -> i64 {
        self.cycle_offset
    }

    /// Enabled controls as of the last successful render
    pub fn nav_state(&self) -> NavState {
        self.rendered.map(|r| r.nav).unwrap_or(NavState::DISABLED)
    }

    pub fn cycle_label(&self) -> i64 {
        cycle_label(self.rendered.map_or(self.cycle_offset, |r| r.cycle_offset))
    }

    pub fn current_overlay(&self) -> Option<OverlayHandle> {
        self.current_overlay
    }

    pub fn map(&self) -> &M {
        &self.map
    }

    pub fn airlines(&self) -> &AirlineContext {
        &self.airlines
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn last_updated(&self) -> Option<DateTime<Local>> {
        self.last_updated
    }

    /// True while the newest request is outstanding; superseded requests
    /// don't count
    pub fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    /// Block until the newest request has been applied
    #[cfg(test)]
    fn settle(&mut self) {
        while self.pending.is_some() {
            let outcome = self
                .rx
                .recv_timeout(std::time::Duration::from_secs(5))
                .expect("fetch did not complete");
            self.apply(outcome);
        }
    }
}
