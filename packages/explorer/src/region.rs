//! Region selection: the picked location and its geodesic buffer.
//!
//! The selector is the sole owner of the Location / Radius / SearchRegion
//! triple. The buffer polygon is derived eagerly on every location or
//! radius change, so it is never read stale, and the invariant holds that
//! a region exists exactly when a location does. Interactive picking is a
//! mode: activation subscribes the click / pointer-move / drag handlers
//! on the event hub under one [`SubscriptionSet`]; deactivation disposes
//! them atomically and clears the selection.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use geo::{Point, Polygon};
use tree_map_spatial::{LengthUnit, geodesic_buffer};

use crate::input::{DragAction, EventHub, InputEvent, SubscriptionSet};
use crate::view::{CursorStyle, MapSurface};

/// Callback fired after every search-region change, with the new region.
pub type RegionChanged = Box<dyn Fn(Option<Polygon<f64>>) + Send + Sync>;

struct RegionState {
    location: Option<Point<f64>>,
    radius_miles: f64,
    region: Option<Polygon<f64>>,
}

/// Owns the picked location and its derived search region.
pub struct RegionSelector {
    map: Arc<dyn MapSurface>,
    hub: Arc<EventHub>,
    state: Mutex<RegionState>,
    subscriptions: Mutex<SubscriptionSet>,
    active: AtomicBool,
    on_change: RegionChanged,
    /// Self-reference handed to gesture handler closures on activation.
    weak_self: Weak<Self>,
}

impl RegionSelector {
    /// Creates an inactive selector with no location.
    ///
    /// `on_change` is invoked synchronously after every region change —
    /// including clears — with the new region.
    #[must_use]
    pub fn new(
        map: Arc<dyn MapSurface>,
        hub: Arc<EventHub>,
        default_radius_miles: f64,
        on_change: RegionChanged,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak_self| Self {
            map,
            hub,
            state: Mutex::new(RegionState {
                location: None,
                radius_miles: default_radius_miles,
                region: None,
            }),
            subscriptions: Mutex::new(SubscriptionSet::new()),
            active: AtomicBool::new(false),
            on_change,
            weak_self: weak_self.clone(),
        })
    }

    /// The current location, if one is picked.
    #[must_use]
    pub fn location(&self) -> Option<Point<f64>> {
        self.state.lock().expect("region state poisoned").location
    }

    /// The current search region, if a location is picked.
    #[must_use]
    pub fn region(&self) -> Option<Polygon<f64>> {
        self.state
            .lock()
            .expect("region state poisoned")
            .region
            .clone()
    }

    /// The current buffer radius in miles.
    #[must_use]
    pub fn radius_miles(&self) -> f64 {
        self.state
            .lock()
            .expect("region state poisoned")
            .radius_miles
    }

    /// Whether interactive picking is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Sets or clears the location, rederiving the search region.
    pub fn set_location(&self, location: Option<Point<f64>>) {
        let region = {
            let mut state = self.state.lock().expect("region state poisoned");
            state.location = location;
            state.region = location
                .map(|point| geodesic_buffer(point, state.radius_miles, LengthUnit::Miles));
            state.region.clone()
        };

        self.map.set_location_marker(location);
        self.map.set_buffer_outline(region.clone());
        (self.on_change)(region);
    }

    /// Updates the buffer radius.
    ///
    /// The region is rederived only when a location exists; with no
    /// location this only stores the radius for the next pick. A
    /// non-positive radius is rejected as a no-op.
    pub fn set_radius(&self, miles: f64) {
        if miles <= 0.0 {
            log::warn!("Ignoring non-positive search radius: {miles}");
            return;
        }

        let (location, region) = {
            let mut state = self.state.lock().expect("region state poisoned");
            state.radius_miles = miles;
            state.region = state
                .location
                .map(|point| geodesic_buffer(point, miles, LengthUnit::Miles));
            (state.location, state.region.clone())
        };

        if location.is_some() {
            self.map.set_buffer_outline(region.clone());
            (self.on_change)(region);
        }
    }

    /// Toggles interactive location picking.
    ///
    /// Activation subscribes the three gesture handlers and switches the
    /// cursor to a crosshair. Deactivation disposes the subscriptions
    /// atomically, restores the cursor, and clears the selection — which
    /// in turn clears the summary and invalidates in-flight queries
    /// downstream.
    pub fn set_active(&self, active: bool) {
        let was_active = self.active.swap(active, Ordering::SeqCst);
        if was_active == active {
            return;
        }

        if active {
            self.map.set_cursor(CursorStyle::Crosshair);
            self.subscribe_gestures();
        } else {
            self.subscriptions
                .lock()
                .expect("region subscriptions poisoned")
                .clear();
            self.map.set_cursor(CursorStyle::Default);
            self.set_location(None);
        }
    }

    fn subscribe_gestures(&self) {
        // The selector is always constructed behind an Arc, so the weak
        // self-reference upgrades for as long as anyone can call this.
        let Some(this) = self.weak_self.upgrade() else {
            return;
        };

        let mut subscriptions = self
            .subscriptions
            .lock()
            .expect("region subscriptions poisoned");

        let click = {
            let selector = Arc::clone(&this);
            self.hub.subscribe(move |event| {
                if let InputEvent::Click { point } = event {
                    selector.set_location(Some(*point));
                    return true;
                }
                false
            })
        };

        let hover = {
            let selector = Arc::clone(&this);
            self.hub.subscribe(move |event| {
                if let InputEvent::PointerMove { x, y } = event {
                    let cursor = if selector.map.hit_test_location(*x, *y) {
                        CursorStyle::Move
                    } else {
                        CursorStyle::Crosshair
                    };
                    selector.map.set_cursor(cursor);
                }
                false
            })
        };

        let drag = {
            let selector = Arc::clone(&this);
            self.hub.subscribe(move |event| {
                let InputEvent::Drag { action, x, y } = event else {
                    return false;
                };
                if *action == DragAction::Update
                    && let Some(point) = selector.map.to_map(*x, *y)
                {
                    selector.set_location(Some(point));
                }
                // Every drag phase is consumed while picking is active so
                // the host's own drag handling (map panning) stays off.
                true
            })
        };

        subscriptions.add(click);
        subscriptions.add(hover);
        subscriptions.add(drag);
    }
}
