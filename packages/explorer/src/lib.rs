#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Interactive spatial-filter-and-summary pipeline.
//!
//! Wires a street-tree feature layer to interactive exploration: a
//! [`region::RegionSelector`] turns clicks, drags, and address-search
//! results into a geodesic search buffer; a
//! [`summary::SummaryController`] keeps a debounced three-statistic
//! summary of the buffer in sync; a [`histogram::HistogramController`]
//! owns the trunk-diameter/species attribute filter applied to the
//! rendered layer; and a [`species::SpeciesCatalog`] lists the most
//! common species. [`TreeExplorer`] assembles them over one event hub.
//!
//! All display side effects go through the boundary traits in [`view`];
//! the pipeline itself renders nothing. Spawned summary refreshes
//! require a tokio runtime.

pub mod histogram;
pub mod input;
pub mod queries;
pub mod region;
pub mod species;
pub mod summary;
pub mod view;

use std::sync::Arc;

use geo::Point;
use tree_map_dispatch::Debounced;
use tree_map_query::{FeatureLayer, HistogramSource};

use crate::histogram::{HistogramConfig, HistogramController};
use crate::input::{EventHub, InputEvent};
use crate::region::{RegionChanged, RegionSelector};
use crate::species::SpeciesCatalog;
use crate::summary::SummaryController;
use crate::view::{
    ErrorSink, HistogramView, LayerEffects, MapSurface, SpeciesListView, SummaryView,
};

pub use crate::summary::fetch_summary;

/// Tunables of the exploration pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct ExplorerConfig {
    /// Initial buffer radius in miles.
    pub default_radius_miles: f64,
    /// Number of species shown in the catalog.
    pub top_species: usize,
    /// Histogram domain.
    pub histogram: HistogramConfig,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            default_radius_miles: 0.5,
            top_species: 10,
            histogram: HistogramConfig::default(),
        }
    }
}

/// The display surfaces the pipeline renders through.
pub struct ExplorerViews {
    /// Map canvas (cursor, markers, coordinate conversion).
    pub map: Arc<dyn MapSurface>,
    /// Summary panel.
    pub summary: Arc<dyn SummaryView>,
    /// Top-species list.
    pub species: Arc<dyn SpeciesListView>,
    /// Histogram slider.
    pub histogram: Arc<dyn HistogramView>,
    /// Rendered layer's visual filter.
    pub effects: Arc<dyn LayerEffects>,
    /// Application-level error display.
    pub errors: Arc<dyn ErrorSink>,
}

/// The assembled exploration pipeline.
pub struct TreeExplorer {
    /// Gesture event hub the host shell feeds.
    pub hub: Arc<EventHub>,
    /// Location / radius / search-region owner.
    pub region: Arc<RegionSelector>,
    /// Buffer summary presenter.
    pub summary: Arc<SummaryController>,
    /// Top-species list loader.
    pub catalog: SpeciesCatalog,
    /// Attribute filter and histogram driver.
    pub histogram: Arc<HistogramController>,
    errors: Arc<dyn ErrorSink>,
}

impl TreeExplorer {
    /// Assembles the pipeline over `layer` and `bins`.
    ///
    /// Region changes trigger summary refreshes on spawned tasks, so the
    /// explorer must live inside a tokio runtime.
    #[must_use]
    pub fn new(
        layer: Arc<dyn FeatureLayer>,
        bins: Arc<dyn HistogramSource>,
        views: ExplorerViews,
        config: ExplorerConfig,
    ) -> Arc<Self> {
        let hub = EventHub::new();

        let summary = Arc::new(SummaryController::new(
            Arc::clone(&layer),
            Arc::new(Debounced::new()),
            views.summary,
            Arc::clone(&views.map),
            Arc::clone(&views.errors),
        ));

        let histogram = Arc::new(HistogramController::new(
            bins,
            views.effects,
            views.histogram,
            Arc::clone(&views.errors),
            config.histogram,
        ));

        let on_change: RegionChanged = {
            let summary = Arc::clone(&summary);
            let histogram = Arc::clone(&histogram);
            Box::new(move |region| {
                if region.is_none() {
                    // Clear synchronously so in-flight bundles are stale
                    // before this callback returns.
                    summary.clear();
                    return;
                }
                let summary = Arc::clone(&summary);
                let histogram = Arc::clone(&histogram);
                tokio::spawn(async move {
                    let filter = histogram.current_filter();
                    summary.update(region.as_ref(), &filter).await;
                });
            })
        };

        let region = RegionSelector::new(
            Arc::clone(&views.map),
            Arc::clone(&hub),
            config.default_radius_miles,
            on_change,
        );

        let catalog = SpeciesCatalog::new(layer, views.species, config.top_species);

        Arc::new(Self {
            hub,
            region,
            summary,
            catalog,
            histogram,
            errors: views.errors,
        })
    }

    /// Loads the initial species list and histogram bins.
    pub async fn start(&self) {
        if let Err(error) = self.catalog.refresh().await {
            self.errors
                .display_error("Top species query failed", &error);
        }
        self.histogram.initialize().await;
    }

    /// Toggles interactive location picking.
    pub fn set_search_active(&self, active: bool) {
        self.region.set_active(active);
    }

    /// Forwards a host gesture; returns `true` if it was consumed.
    #[must_use]
    pub fn handle_input(&self, event: &InputEvent) -> bool {
        self.hub.dispatch(event)
    }

    /// Places the buffer at a geocoded search result.
    pub fn search_result(&self, point: Point<f64>) {
        self.region.set_location(Some(point));
    }

    /// Clears the buffer after an emptied search box.
    pub fn search_cleared(&self) {
        self.region.set_location(None);
    }

    /// Updates the buffer radius from its slider.
    pub fn radius_changed(&self, miles: f64) {
        self.region.set_radius(miles);
    }

    /// Updates the histogram range from its slider thumbs.
    pub fn slider_changed(&self, min: f64, max: f64) {
        self.histogram.set_range(min, max);
    }

    /// Resets the histogram range to the full domain.
    pub fn reset_histogram(&self) {
        self.histogram.reset_range();
    }

    /// Selects (or with `None` clears) a species from the catalog.
    ///
    /// Refreshes the histogram bins under the new selection, and — when a
    /// search region exists — recomputes the summary so the displayed
    /// statistics respect the new filter.
    pub async fn select_species(&self, species: Option<&str>) {
        self.histogram.set_species(species).await;

        if let Some(region) = self.region.region() {
            let filter = self.histogram.current_filter();
            self.summary.update(Some(&region), &filter).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use serde_json::json;
    use tree_map_query::filter::Predicate;
    use tree_map_query::memory::MemoryLayer;
    use tree_map_query::{Feature, QueryError};
    use tree_map_tree_models::{BiggestTree, HistogramBin, SpeciesCount, fields};

    use super::*;
    use crate::input::DragAction;
    use crate::view::CursorStyle;

    #[derive(Default)]
    struct TestViews {
        average: Mutex<Vec<Option<f64>>>,
        most_common: Mutex<Vec<Option<SpeciesCount>>>,
        biggest: Mutex<Vec<Option<BiggestTree>>>,
        species: Mutex<Vec<Vec<SpeciesCount>>>,
        bins: Mutex<Vec<Vec<HistogramBin>>>,
        filters: Mutex<Vec<String>>,
        errors: Mutex<Vec<String>>,
    }

    impl SummaryView for TestViews {
        fn show_average(&self, average: Option<f64>) {
            self.average.lock().unwrap().push(average);
        }
        fn show_most_common(&self, most_common: Option<&SpeciesCount>) {
            self.most_common.lock().unwrap().push(most_common.cloned());
        }
        fn show_biggest(&self, biggest: Option<&BiggestTree>) {
            self.biggest.lock().unwrap().push(biggest.cloned());
        }
    }

    impl SpeciesListView for TestViews {
        fn show_species(&self, species: &[SpeciesCount]) {
            self.species.lock().unwrap().push(species.to_vec());
        }
    }

    impl HistogramView for TestViews {
        fn show_bins(&self, bins: &[HistogramBin]) {
            self.bins.lock().unwrap().push(bins.to_vec());
        }
        fn show_range(&self, _min: f64, _max: f64) {}
    }

    impl LayerEffects for TestViews {
        fn apply_filter(&self, filter: &Predicate) {
            self.filters.lock().unwrap().push(filter.to_sql());
        }
    }

    impl ErrorSink for TestViews {
        fn display_error(&self, context: &str, _error: &QueryError) {
            self.errors.lock().unwrap().push(context.to_string());
        }
    }

    struct TestSurface;

    impl MapSurface for TestSurface {
        fn set_cursor(&self, _cursor: CursorStyle) {}
        fn set_location_marker(&self, _location: Option<Point<f64>>) {}
        fn set_buffer_outline(&self, _region: Option<geo::Polygon<f64>>) {}
        fn set_biggest_marker(&self, _location: Option<Point<f64>>) {}
        fn to_map(&self, x: f64, y: f64) -> Option<Point<f64>> {
            Some(Point::new(x, y))
        }
        fn hit_test_location(&self, _x: f64, _y: f64) -> bool {
            false
        }
    }

    fn tree(id: u64, species: &str, dbh: f64, lng: f64, lat: f64) -> Feature {
        Feature {
            attributes: [
                (fields::OBJECT_ID.to_string(), json!(id)),
                (fields::SPECIES.to_string(), json!(species)),
                (fields::SPECIES_LATIN.to_string(), json!("Latin name")),
                (fields::TRUNK_DIAMETER.to_string(), json!(dbh)),
                (fields::ADDRESS.to_string(), json!(format!("{id} Main St"))),
            ]
            .into_iter()
            .collect::<BTreeMap<_, _>>(),
            geometry: Some(Point::new(lng, lat)),
        }
    }

    fn explorer_with(
        features: Vec<Feature>,
    ) -> (Arc<TreeExplorer>, Arc<TestViews>) {
        let layer = Arc::new(MemoryLayer::new(features));
        let views = Arc::new(TestViews::default());
        let explorer = TreeExplorer::new(
            Arc::clone(&layer) as Arc<dyn FeatureLayer>,
            layer as Arc<dyn HistogramSource>,
            ExplorerViews {
                map: Arc::new(TestSurface),
                summary: Arc::clone(&views) as Arc<dyn SummaryView>,
                species: Arc::clone(&views) as Arc<dyn SpeciesListView>,
                histogram: Arc::clone(&views) as Arc<dyn HistogramView>,
                effects: Arc::clone(&views) as Arc<dyn LayerEffects>,
                errors: Arc::clone(&views) as Arc<dyn ErrorSink>,
            },
            ExplorerConfig::default(),
        );
        (explorer, views)
    }

    /// Lets spawned summary refreshes run to completion.
    async fn settle() {
        for _ in 0..32 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn start_loads_species_and_bins() {
        let (explorer, views) = explorer_with(vec![
            tree(1, "pin oak", 30.0, -73.99, 40.73),
            tree(2, "pin oak", 8.0, -73.9895, 40.7302),
            tree(3, "red maple", 12.0, -73.9902, 40.7299),
        ]);

        explorer.start().await;

        let species = views.species.lock().unwrap();
        assert_eq!(species.len(), 1);
        assert_eq!(species[0][0].species, "pin oak");
        assert_eq!(species[0][0].count, 2);

        assert_eq!(views.bins.lock().unwrap().len(), 1);
        assert!(views.errors.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn click_while_active_produces_a_buffer_summary() {
        let (explorer, views) = explorer_with(vec![
            tree(1, "red maple", 12.0, -73.99, 40.73),
            tree(2, "pin oak", 30.0, -73.9895, 40.7302),
        ]);

        explorer.set_search_active(true);
        let consumed = explorer.handle_input(&InputEvent::Click {
            point: Point::new(-73.99, 40.73),
        });
        assert!(consumed);
        settle().await;

        let average = views.average.lock().unwrap().last().cloned().flatten();
        assert_eq!(average, Some(21.0));
        let biggest = views.biggest.lock().unwrap().last().cloned().flatten().unwrap();
        assert_eq!(biggest.species, "pin oak");
    }

    #[tokio::test]
    async fn deactivation_clears_the_summary() {
        let (explorer, views) = explorer_with(vec![tree(1, "pin oak", 30.0, -73.99, 40.73)]);

        explorer.set_search_active(true);
        let _ = explorer.handle_input(&InputEvent::Click {
            point: Point::new(-73.99, 40.73),
        });
        settle().await;
        assert!(views.average.lock().unwrap().last().cloned().flatten().is_some());

        explorer.set_search_active(false);
        settle().await;

        assert_eq!(views.average.lock().unwrap().last(), Some(&None));
        assert!(views.biggest.lock().unwrap().last().unwrap().is_none());
    }

    #[tokio::test]
    async fn search_result_places_the_buffer_without_activation() {
        let (explorer, views) = explorer_with(vec![tree(1, "ginkgo", 44.0, -73.99, 40.73)]);

        explorer.search_result(Point::new(-73.99, 40.73));
        settle().await;

        let biggest = views.biggest.lock().unwrap().last().cloned().flatten().unwrap();
        assert_eq!(biggest.species, "ginkgo");

        explorer.search_cleared();
        settle().await;
        assert!(views.biggest.lock().unwrap().last().unwrap().is_none());
    }

    #[tokio::test]
    async fn species_selection_filters_the_summary() {
        let (explorer, views) = explorer_with(vec![
            tree(1, "red maple", 12.0, -73.99, 40.73),
            tree(2, "pin oak", 30.0, -73.9895, 40.7302),
            tree(3, "pin oak", 20.0, -73.9902, 40.7299),
        ]);

        explorer.search_result(Point::new(-73.99, 40.73));
        settle().await;

        explorer.select_species(Some("red maple")).await;
        settle().await;

        // Summary now reflects only red maples inside the buffer.
        let average = views.average.lock().unwrap().last().cloned().flatten();
        assert_eq!(average, Some(12.0));
        let biggest = views.biggest.lock().unwrap().last().cloned().flatten().unwrap();
        assert_eq!(biggest.species, "red maple");

        // And the layer filter carries the species fragment.
        assert!(
            views
                .filters
                .lock()
                .unwrap()
                .last()
                .unwrap()
                .contains("red maple")
        );
    }

    #[tokio::test]
    async fn drag_updates_move_the_summary_with_the_buffer() {
        let (explorer, views) = explorer_with(vec![
            tree(1, "pin oak", 30.0, -73.99, 40.73),
            tree(2, "ginkgo", 44.0, -73.90, 40.80),
        ]);

        explorer.set_search_active(true);
        let _ = explorer.handle_input(&InputEvent::Click {
            point: Point::new(-73.99, 40.73),
        });
        settle().await;
        let biggest = views.biggest.lock().unwrap().last().cloned().flatten().unwrap();
        assert_eq!(biggest.species, "pin oak");

        // Drag the marker to the ginkgo's neighborhood.
        let consumed = explorer.handle_input(&InputEvent::Drag {
            action: DragAction::Update,
            x: -73.90,
            y: 40.80,
        });
        assert!(consumed);
        settle().await;

        let biggest = views.biggest.lock().unwrap().last().cloned().flatten().unwrap();
        assert_eq!(biggest.species, "ginkgo");
    }

    #[tokio::test]
    async fn radius_growth_pulls_in_more_trees() {
        let (explorer, views) = explorer_with(vec![
            tree(1, "pin oak", 30.0, -73.99, 40.73),
            // ~1.6 km east: outside 0.5 mi, inside 2 mi.
            tree(2, "ginkgo", 44.0, -73.971, 40.73),
        ]);

        explorer.search_result(Point::new(-73.99, 40.73));
        settle().await;
        let biggest = views.biggest.lock().unwrap().last().cloned().flatten().unwrap();
        assert_eq!(biggest.species, "pin oak");

        explorer.radius_changed(2.0);
        settle().await;
        let biggest = views.biggest.lock().unwrap().last().cloned().flatten().unwrap();
        assert_eq!(biggest.species, "ginkgo");
    }
}
