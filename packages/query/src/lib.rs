#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Feature-layer query contract.
//!
//! Defines the parameter object ([`FeatureQuery`]) and result shapes
//! ([`Feature`], [`FeatureSet`]) of the remote feature-query capability,
//! the structured filter expression ([`filter::Predicate`]) with its
//! [`filter::FilterComposer`], and the async boundary traits implemented
//! by concrete layers: [`FeatureLayer`] for attribute/spatial/statistics
//! queries and [`HistogramSource`] for frequency histograms.
//!
//! Two implementations live in the workspace: the `tree_map_arcgis` REST
//! client and [`memory::MemoryLayer`], an in-process layer used by tests
//! and offline demos.

pub mod filter;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use geo::{Point, Polygon};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display};
use tree_map_tree_models::HistogramBin;

use crate::filter::Predicate;

/// Errors from feature-layer operations.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// The request never produced a usable response (connection, timeout).
    #[error("Transport error: {message}")]
    Transport {
        /// Description of the transport failure.
        message: String,
    },

    /// The feature service answered with an error envelope.
    #[error("Feature service error: {message}")]
    Backend {
        /// Error detail reported by the service.
        message: String,
    },

    /// The response arrived but could not be interpreted.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },
}

/// How a result set is ordered on one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    /// Smallest first.
    Ascending,
    /// Largest first.
    Descending,
}

/// One entry of a query's `order_by` list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    /// Attribute (or statistic output) field to order on.
    pub field: String,
    /// Sort direction.
    pub order: SortOrder,
}

impl OrderBy {
    /// Ascending order on `field`.
    #[must_use]
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Ascending,
        }
    }

    /// Descending order on `field`.
    #[must_use]
    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            order: SortOrder::Descending,
        }
    }

    /// Renders the `"field ASC"` / `"field DESC"` clause form.
    #[must_use]
    pub fn to_clause(&self) -> String {
        match self.order {
            SortOrder::Ascending => format!("{} ASC", self.field),
            SortOrder::Descending => format!("{} DESC", self.field),
        }
    }
}

/// Aggregate function applied by an output statistic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum StatisticKind {
    /// Number of records with a non-null value.
    Count,
    /// Arithmetic mean.
    Avg,
    /// Smallest value.
    Min,
    /// Largest value.
    Max,
    /// Sum of values.
    Sum,
}

/// One output statistic of an aggregate query.
///
/// Serializes to the feature service's wire form
/// (`statisticType` / `onStatisticField` / `outStatisticFieldName`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistic {
    /// Aggregate function.
    pub statistic_type: StatisticKind,
    /// Field the function is computed over.
    pub on_statistic_field: String,
    /// Name of the output attribute carrying the result.
    pub out_statistic_field_name: String,
}

impl Statistic {
    /// Creates a statistic definition.
    #[must_use]
    pub fn new(kind: StatisticKind, on_field: &str, out_name: &str) -> Self {
        Self {
            statistic_type: kind,
            on_statistic_field: on_field.to_string(),
            out_statistic_field_name: out_name.to_string(),
        }
    }
}

/// Parameters of one feature-layer query.
///
/// Mirrors the configurable query object of the feature-query capability:
/// an optional spatial filter, an attribute filter, and either a plain
/// record fetch (`out_fields` / `return_geometry`) or an aggregate fetch
/// (`group_by` / `statistics`). `num` caps the number of returned rows in
/// both shapes.
#[derive(Debug, Clone, Default)]
pub struct FeatureQuery {
    /// Spatial filter: only features intersecting this polygon match.
    pub geometry: Option<Polygon<f64>>,
    /// Attribute filter applied before any aggregation.
    pub filter: Predicate,
    /// Attribute fields to return for plain record fetches.
    pub out_fields: Vec<String>,
    /// Group-by fields for aggregate fetches.
    pub group_by: Vec<String>,
    /// Result ordering, applied after aggregation.
    pub order_by: Vec<OrderBy>,
    /// Output statistics; non-empty switches the query to aggregate form.
    pub statistics: Vec<Statistic>,
    /// Maximum number of rows to return.
    pub num: Option<usize>,
    /// Whether record geometry is returned for plain fetches.
    pub return_geometry: bool,
}

impl FeatureQuery {
    /// Renders `order_by` as the service's comma-joined clause list.
    #[must_use]
    pub fn order_by_clause(&self) -> String {
        let mut clause = String::new();
        for (i, order) in self.order_by.iter().enumerate() {
            if i > 0 {
                clause.push(',');
            }
            let _ = write!(clause, "{}", order.to_clause());
        }
        clause
    }
}

/// One record returned by a query: an attribute map plus optional point
/// geometry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Feature {
    /// Attribute values keyed by field name.
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// Record location, when geometry was requested.
    pub geometry: Option<Point<f64>>,
}

impl Feature {
    /// Returns the raw attribute value, if present.
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&serde_json::Value> {
        self.attributes.get(name)
    }

    /// Returns a string attribute, if present and a string.
    #[must_use]
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr(name).and_then(serde_json::Value::as_str)
    }

    /// Returns a numeric attribute as `f64`, if present and numeric.
    #[must_use]
    pub fn attr_f64(&self, name: &str) -> Option<f64> {
        self.attr(name).and_then(serde_json::Value::as_f64)
    }

    /// Returns a numeric attribute as `u64`, if present and numeric.
    ///
    /// Counts arrive as integers from some services and as floats from
    /// others; both are accepted.
    #[must_use]
    pub fn attr_u64(&self, name: &str) -> Option<u64> {
        let value = self.attr(name)?;
        value
            .as_u64()
            .or_else(|| value.as_f64().map(|f| f.max(0.0).round() as u64))
    }
}

/// An ordered set of features returned by one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureSet {
    /// The matching records, in query order.
    pub features: Vec<Feature>,
}

/// A queryable feature layer.
///
/// Implementations own transport and evaluation; callers only assemble
/// [`FeatureQuery`] parameter objects.
#[async_trait]
pub trait FeatureLayer: Send + Sync {
    /// Executes `query` and returns the matching features.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the query cannot be executed or its
    /// response cannot be interpreted.
    async fn query_features(&self, query: &FeatureQuery) -> Result<FeatureSet, QueryError>;
}

/// Parameters of a frequency-histogram request.
#[derive(Debug, Clone, PartialEq)]
pub struct HistogramParams {
    /// Numeric field the histogram is computed over.
    pub field: String,
    /// Number of equal-width bins between `min_value` and `max_value`.
    pub num_bins: usize,
    /// Lower bound of the histogram domain.
    pub min_value: f64,
    /// Upper bound of the histogram domain.
    pub max_value: f64,
    /// Attribute filter restricting which records are counted.
    pub filter: Predicate,
}

/// A provider of frequency histograms over a layer's numeric field.
#[async_trait]
pub trait HistogramSource: Send + Sync {
    /// Computes the bin counts for `params`.
    ///
    /// # Errors
    ///
    /// Returns [`QueryError`] if the underlying queries fail.
    async fn histogram(&self, params: &HistogramParams) -> Result<Vec<HistogramBin>, QueryError>;
}
