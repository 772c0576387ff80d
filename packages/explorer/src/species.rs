//! Top-species catalog.
//!
//! Fetches the layer's most numerous species (common and Latin names with
//! counts) and renders them through [`SpeciesListView`]. Selecting a tile
//! from the rendered list feeds the histogram controller; this module
//! only owns the list itself.

use std::sync::Arc;

use tree_map_query::{FeatureLayer, QueryError};
use tree_map_tree_models::SpeciesCount;

use crate::queries;
use crate::view::SpeciesListView;

/// Loads and presents the top-N species list.
pub struct SpeciesCatalog {
    layer: Arc<dyn FeatureLayer>,
    view: Arc<dyn SpeciesListView>,
    num: usize,
}

impl SpeciesCatalog {
    /// Creates a catalog showing the `num` most common species.
    #[must_use]
    pub fn new(layer: Arc<dyn FeatureLayer>, view: Arc<dyn SpeciesListView>, num: usize) -> Self {
        Self { layer, view, num }
    }

    /// Fetches the list and pushes it to the view.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the group-by query fails; the view is
    /// left untouched in that case.
    pub async fn refresh(&self) -> Result<Vec<SpeciesCount>, QueryError> {
        let set = self
            .layer
            .query_features(&queries::top_species(self.num))
            .await?;
        let species = queries::parse_species_counts(&set);
        self.view.show_species(&species);
        Ok(species)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use serde_json::json;
    use tree_map_query::Feature;
    use tree_map_query::memory::MemoryLayer;
    use tree_map_tree_models::fields;

    use super::*;

    #[derive(Default)]
    struct RecordingList {
        shown: Mutex<Vec<Vec<SpeciesCount>>>,
    }

    impl SpeciesListView for RecordingList {
        fn show_species(&self, species: &[SpeciesCount]) {
            self.shown.lock().unwrap().push(species.to_vec());
        }
    }

    fn tree(species: Option<&str>, latin: &str) -> Feature {
        Feature {
            attributes: [
                (
                    fields::SPECIES.to_string(),
                    species.map_or(json!(null), |s| json!(s)),
                ),
                (fields::SPECIES_LATIN.to_string(), json!(latin)),
            ]
            .into_iter()
            .collect::<BTreeMap<_, _>>(),
            geometry: Some(geo::Point::new(-73.99, 40.73)),
        }
    }

    #[tokio::test]
    async fn refresh_shows_species_ordered_by_count() {
        let layer = Arc::new(MemoryLayer::new(vec![
            tree(Some("pin oak"), "Quercus palustris"),
            tree(Some("pin oak"), "Quercus palustris"),
            tree(Some("red maple"), "Acer rubrum"),
            // Null species are excluded by the query's filter.
            tree(None, "Unknown"),
        ]));
        let view = Arc::new(RecordingList::default());
        let catalog = SpeciesCatalog::new(layer, Arc::clone(&view) as Arc<dyn SpeciesListView>, 10);

        let species = catalog.refresh().await.unwrap();

        assert_eq!(species.len(), 2);
        assert_eq!(species[0].species, "pin oak");
        assert_eq!(species[0].count, 2);
        assert_eq!(species[0].latin.as_deref(), Some("Quercus palustris"));
        assert_eq!(species[1].species, "red maple");

        let shown = view.shown.lock().unwrap();
        assert_eq!(shown.len(), 1);
        assert_eq!(shown[0], species);
    }

    #[tokio::test]
    async fn refresh_honors_the_limit() {
        let layer = Arc::new(MemoryLayer::new(vec![
            tree(Some("pin oak"), "Quercus palustris"),
            tree(Some("red maple"), "Acer rubrum"),
            tree(Some("ginkgo"), "Ginkgo biloba"),
        ]));
        let view = Arc::new(RecordingList::default());
        let catalog = SpeciesCatalog::new(layer, view as Arc<dyn SpeciesListView>, 2);

        let species = catalog.refresh().await.unwrap();
        assert_eq!(species.len(), 2);
    }
}
