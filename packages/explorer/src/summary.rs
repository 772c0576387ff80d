//! Buffer summary statistics.
//!
//! One `update` is one logical bundle of three aggregate queries —
//! average trunk diameter, most common species, biggest tree — issued
//! concurrently and gated together through the [`Debounced`] dispatcher.
//! Each query's result updates only its own display segment: a failed
//! average never blanks the biggest-tree panel, and vice versa. A
//! superseded bundle updates nothing at all.

use std::sync::Arc;

use geo::{Point, Polygon};
use tree_map_dispatch::{Debounced, Outcome};
use tree_map_query::filter::Predicate;
use tree_map_query::{FeatureLayer, QueryError};
use tree_map_tree_models::{BiggestTree, SpeciesCount, TreeSummary};

use crate::queries;
use crate::view::{ErrorSink, MapSurface, SummaryView};

/// Issues the summary query bundle and presents its results.
pub struct SummaryController {
    layer: Arc<dyn FeatureLayer>,
    dispatch: Arc<Debounced>,
    view: Arc<dyn SummaryView>,
    map: Arc<dyn MapSurface>,
    errors: Arc<dyn ErrorSink>,
}

impl SummaryController {
    /// Creates a controller presenting through `view` and `map`.
    #[must_use]
    pub fn new(
        layer: Arc<dyn FeatureLayer>,
        dispatch: Arc<Debounced>,
        view: Arc<dyn SummaryView>,
        map: Arc<dyn MapSurface>,
        errors: Arc<dyn ErrorSink>,
    ) -> Self {
        Self {
            layer,
            dispatch,
            view,
            map,
            errors,
        }
    }

    /// The dispatcher gating this controller's updates.
    #[must_use]
    pub fn dispatcher(&self) -> Arc<Debounced> {
        Arc::clone(&self.dispatch)
    }

    /// Recomputes the summary for `region` under `filter`.
    ///
    /// With no region this is the clear path: in-flight bundles are
    /// invalidated and every segment is reset to its empty state, so a
    /// stale result arriving later can never repopulate the display.
    pub async fn update(&self, region: Option<&Polygon<f64>>, filter: &Predicate) {
        let Some(region) = region else {
            self.clear();
            return;
        };

        let bundle = async {
            futures::join!(
                self.fetch_average(region, filter),
                self.fetch_most_common(region, filter),
                self.fetch_biggest(region, filter),
            )
        };

        match self.dispatch.run(bundle).await {
            Outcome::Completed((average, most_common, biggest)) => {
                self.apply_average(average);
                self.apply_most_common(most_common);
                self.apply_biggest(biggest);
            }
            Outcome::Superseded => {}
        }
    }

    /// Resets every display segment to its explicit empty state.
    pub fn clear(&self) {
        self.dispatch.invalidate();
        self.view.show_average(None);
        self.view.show_most_common(None);
        self.view.show_biggest(None);
        self.map.set_biggest_marker(None);
    }

    async fn fetch_average(
        &self,
        region: &Polygon<f64>,
        filter: &Predicate,
    ) -> Result<Option<f64>, QueryError> {
        let set = self
            .layer
            .query_features(&queries::average_size(Some(region), filter))
            .await?;
        Ok(queries::parse_average(&set))
    }

    async fn fetch_most_common(
        &self,
        region: &Polygon<f64>,
        filter: &Predicate,
    ) -> Result<Option<SpeciesCount>, QueryError> {
        let set = self
            .layer
            .query_features(&queries::most_common_species(Some(region), filter))
            .await?;
        Ok(queries::parse_most_common(&set))
    }

    async fn fetch_biggest(
        &self,
        region: &Polygon<f64>,
        filter: &Predicate,
    ) -> Result<Option<BiggestTree>, QueryError> {
        let set = self
            .layer
            .query_features(&queries::biggest_tree(Some(region), filter))
            .await?;
        Ok(queries::parse_biggest(&set))
    }

    fn apply_average(&self, result: Result<Option<f64>, QueryError>) {
        match result {
            Ok(average) => self.view.show_average(average),
            Err(error) => {
                self.errors.display_error("Average tree size query failed", &error);
                self.view.show_average(None);
            }
        }
    }

    fn apply_most_common(&self, result: Result<Option<SpeciesCount>, QueryError>) {
        match result {
            Ok(most_common) => self.view.show_most_common(most_common.as_ref()),
            Err(error) => {
                self.errors
                    .display_error("Most common species query failed", &error);
                self.view.show_most_common(None);
            }
        }
    }

    fn apply_biggest(&self, result: Result<Option<BiggestTree>, QueryError>) {
        match result {
            Ok(biggest) => {
                self.map.set_biggest_marker(
                    biggest
                        .as_ref()
                        .and_then(|tree| tree.location)
                        .map(|(lng, lat)| Point::new(lng, lat)),
                );
                self.view.show_biggest(biggest.as_ref());
            }
            Err(error) => {
                self.errors.display_error("Biggest tree query failed", &error);
                self.view.show_biggest(None);
                self.map.set_biggest_marker(None);
            }
        }
    }
}

/// Runs the summary bundle once, outside the interactive pipeline.
///
/// Used by the HTTP API and CLI, which have no incremental display to
/// keep consistent: per-segment failures collapse into one error.
///
/// # Errors
///
/// Returns the first [`QueryError`] any segment produced.
pub async fn fetch_summary(
    layer: &dyn FeatureLayer,
    region: &Polygon<f64>,
    filter: &Predicate,
) -> Result<TreeSummary, QueryError> {
    let (average, most_common, biggest) = futures::join!(
        async {
            layer
                .query_features(&queries::average_size(Some(region), filter))
                .await
                .map(|set| queries::parse_average(&set))
        },
        async {
            layer
                .query_features(&queries::most_common_species(Some(region), filter))
                .await
                .map(|set| queries::parse_most_common(&set))
        },
        async {
            layer
                .query_features(&queries::biggest_tree(Some(region), filter))
                .await
                .map(|set| queries::parse_biggest(&set))
        },
    );

    Ok(TreeSummary {
        average_size: average?,
        most_common: most_common?,
        biggest: biggest?,
    })
}
