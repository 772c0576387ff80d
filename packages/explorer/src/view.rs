//! UI-shell boundary traits.
//!
//! The pipeline never touches a widget toolkit directly; every display
//! side effect goes through one of these traits. A host shell (map
//! canvas, DOM, terminal) implements them; tests substitute recording
//! fakes.

use geo::{Point, Polygon};
use tree_map_query::QueryError;
use tree_map_query::filter::Predicate;
use tree_map_tree_models::{BiggestTree, HistogramBin, SpeciesCount};

/// Pointer cursor shown over the map surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorStyle {
    /// The host's default cursor.
    #[default]
    Default,
    /// Crosshair, shown while location picking is active.
    Crosshair,
    /// Move cursor, shown while hovering the location marker.
    Move,
}

/// The map canvas: cursor, analysis graphics, and coordinate conversion.
pub trait MapSurface: Send + Sync {
    /// Sets the pointer cursor.
    fn set_cursor(&self, cursor: CursorStyle);

    /// Places or clears the picked-location marker.
    fn set_location_marker(&self, location: Option<Point<f64>>);

    /// Places or clears the buffer outline polygon.
    fn set_buffer_outline(&self, region: Option<Polygon<f64>>);

    /// Places or clears the biggest-tree marker.
    fn set_biggest_marker(&self, location: Option<Point<f64>>);

    /// Converts screen coordinates to a map point, if on the map.
    fn to_map(&self, x: f64, y: f64) -> Option<Point<f64>>;

    /// Returns `true` if the screen position hits the location marker.
    fn hit_test_location(&self, x: f64, y: f64) -> bool;
}

/// The summary panel. Each segment is updated independently; `None`
/// means the segment's explicit empty state.
pub trait SummaryView: Send + Sync {
    /// Average trunk diameter segment.
    fn show_average(&self, average: Option<f64>);

    /// Most-common-species segment.
    fn show_most_common(&self, most_common: Option<&SpeciesCount>);

    /// Biggest-tree segment.
    fn show_biggest(&self, biggest: Option<&BiggestTree>);
}

/// The top-species list.
pub trait SpeciesListView: Send + Sync {
    /// Replaces the displayed species tiles.
    fn show_species(&self, species: &[SpeciesCount]);
}

/// The histogram range slider.
pub trait HistogramView: Send + Sync {
    /// Replaces the slider's background bins.
    fn show_bins(&self, bins: &[HistogramBin]);

    /// Moves the slider thumbs to the given range.
    fn show_range(&self, min: f64, max: f64);
}

/// The rendered layer's visual filter.
///
/// Writes are last-writer-wins; callers always pass the fully composed
/// predicate so the layer never observes a partial filter.
pub trait LayerEffects: Send + Sync {
    /// Replaces the layer's display filter.
    fn apply_filter(&self, filter: &Predicate);
}

/// Application-level error display.
pub trait ErrorSink: Send + Sync {
    /// Reports a genuine (non-superseded) query failure.
    fn display_error(&self, context: &str, error: &QueryError);
}

/// An [`ErrorSink`] that forwards to the `log` facade.
pub struct LogErrorSink;

impl ErrorSink for LogErrorSink {
    fn display_error(&self, context: &str, error: &QueryError) {
        log::error!("{context}: {error}");
    }
}

/// A [`MapSurface`] for hosts without a map canvas (tests, terminals).
///
/// Ignores graphics, reports every hit test as a miss, and converts no
/// coordinates.
pub struct NullMapSurface;

impl MapSurface for NullMapSurface {
    fn set_cursor(&self, _cursor: CursorStyle) {}
    fn set_location_marker(&self, _location: Option<Point<f64>>) {}
    fn set_buffer_outline(&self, _region: Option<Polygon<f64>>) {}
    fn set_biggest_marker(&self, _location: Option<Point<f64>>) {}
    fn to_map(&self, _x: f64, _y: f64) -> Option<Point<f64>> {
        None
    }
    fn hit_test_location(&self, _x: f64, _y: f64) -> bool {
        false
    }
}
