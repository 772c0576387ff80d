//! Trunk-diameter histogram filtering.
//!
//! Owns the [`FilterComposer`] and with it the layer's attribute filter.
//! Range-slider changes are visual-only: the composed predicate is
//! re-applied to the display layer in a single assignment, no query runs.
//! Species selection is heavier: it replaces the categorical fragment,
//! refreshes the slider's background bins under the new species (a
//! dispatcher-gated query, since tile clicks can storm), and then
//! re-applies the filter.

use std::sync::{Arc, Mutex};

use tree_map_dispatch::{Debounced, Outcome};
use tree_map_query::filter::{FilterComposer, Predicate};
use tree_map_query::{HistogramParams, HistogramSource};
use tree_map_tree_models::fields;

use crate::view::{ErrorSink, HistogramView, LayerEffects};

/// Histogram domain configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramConfig {
    /// Numeric field the histogram runs over.
    pub field: String,
    /// Lower bound of the domain (and of the reset range).
    pub min_value: f64,
    /// Upper bound of the domain (and of the reset range).
    pub max_value: f64,
    /// Number of equal-width bins.
    pub num_bins: usize,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            field: fields::TRUNK_DIAMETER.to_string(),
            min_value: 0.0,
            max_value: 50.0,
            num_bins: 50,
        }
    }
}

/// Drives the histogram slider and the layer's attribute filter.
pub struct HistogramController {
    source: Arc<dyn HistogramSource>,
    effects: Arc<dyn LayerEffects>,
    view: Arc<dyn HistogramView>,
    errors: Arc<dyn ErrorSink>,
    dispatch: Debounced,
    composer: Mutex<FilterComposer>,
    config: HistogramConfig,
}

impl HistogramController {
    /// Creates a controller with no fragments active.
    #[must_use]
    pub fn new(
        source: Arc<dyn HistogramSource>,
        effects: Arc<dyn LayerEffects>,
        view: Arc<dyn HistogramView>,
        errors: Arc<dyn ErrorSink>,
        config: HistogramConfig,
    ) -> Self {
        let composer = FilterComposer::new(&config.field, fields::SPECIES);
        Self {
            source,
            effects,
            view,
            errors,
            dispatch: Debounced::new(),
            composer: Mutex::new(composer),
            config,
        }
    }

    /// The currently composed attribute filter.
    #[must_use]
    pub fn current_filter(&self) -> Predicate {
        self.composer.lock().expect("composer poisoned").compose()
    }

    /// The currently selected species, if any.
    #[must_use]
    pub fn selected_species(&self) -> Option<String> {
        self.composer
            .lock()
            .expect("composer poisoned")
            .category()
            .map(ToString::to_string)
    }

    /// Loads the initial full-range bins and applies the match-all filter.
    pub async fn initialize(&self) {
        self.view
            .show_range(self.config.min_value, self.config.max_value);
        self.set_species(None).await;
    }

    /// Replaces the numeric-range fragment from the slider thumbs and
    /// re-applies the filter. Visual only; no query runs.
    pub fn set_range(&self, min: f64, max: f64) {
        self.composer
            .lock()
            .expect("composer poisoned")
            .set_range(min, max);
        self.apply_effect();
    }

    /// Restores the slider to the configured full range.
    pub fn reset_range(&self) {
        {
            let mut composer = self.composer.lock().expect("composer poisoned");
            composer.set_range(self.config.min_value, self.config.max_value);
        }
        self.view
            .show_range(self.config.min_value, self.config.max_value);
        self.apply_effect();
    }

    /// Replaces the categorical fragment and refreshes the bins under it.
    ///
    /// The bins reflect only the species fragment — the range fragment is
    /// what the slider selects *within* those bins. The refresh runs
    /// through the controller's dispatcher; a superseded refresh leaves
    /// the slider untouched.
    pub async fn set_species(&self, species: Option<&str>) {
        let species_filter = {
            let mut composer = self.composer.lock().expect("composer poisoned");
            composer.set_category(species);
            species.map_or(Predicate::All, |value| Predicate::Equals {
                field: fields::SPECIES.to_string(),
                value: value.to_string(),
            })
        };

        let params = HistogramParams {
            field: self.config.field.clone(),
            num_bins: self.config.num_bins,
            min_value: self.config.min_value,
            max_value: self.config.max_value,
            filter: species_filter,
        };

        match self.dispatch.run(self.source.histogram(&params)).await {
            Outcome::Completed(Ok(bins)) => self.view.show_bins(&bins),
            Outcome::Completed(Err(error)) => {
                self.errors.display_error("Histogram refresh failed", &error);
            }
            Outcome::Superseded => return,
        }

        self.apply_effect();
    }

    /// Applies the fully composed filter to the display layer in one
    /// assignment.
    fn apply_effect(&self) {
        self.effects.apply_filter(&self.current_filter());
    }
}
