#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Canonical street-tree field names and summary result types.
//!
//! This crate defines the attribute schema of the street tree census layer
//! (common/Latin species name, trunk diameter, address) and the result
//! shapes produced by the aggregate queries built on top of it. Every other
//! crate in the workspace shares these definitions instead of re-spelling
//! field names inline.

use serde::{Deserialize, Serialize};

/// Attribute field names of the street tree census layer.
///
/// These match the NYC 2015 street tree census schema; a layer with a
/// different schema can be adapted by constructing queries against its own
/// field names.
pub mod fields {
    /// Common species name (e.g., "red maple").
    pub const SPECIES: &str = "spc_common";
    /// Latin species name (e.g., "Acer rubrum").
    pub const SPECIES_LATIN: &str = "spc_latin";
    /// Trunk diameter at breast height, in inches.
    pub const TRUNK_DIAMETER: &str = "tree_dbh";
    /// Nearest street address to the tree.
    pub const ADDRESS: &str = "address";
    /// Stable record identifier, used as a deterministic tie-breaker.
    pub const OBJECT_ID: &str = "OBJECTID";
}

/// A species with its occurrence count, as returned by group-by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesCount {
    /// Common species name.
    pub species: String,
    /// Latin species name, when the query grouped on it.
    pub latin: Option<String>,
    /// Number of trees of this species matching the query.
    pub count: u64,
}

/// The single largest tree (by trunk diameter) matching a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BiggestTree {
    /// Common species name.
    pub species: String,
    /// Nearest street address, when recorded.
    pub address: Option<String>,
    /// Trunk diameter at breast height, in inches.
    pub diameter: f64,
    /// Tree location as `(longitude, latitude)`, when geometry was requested.
    pub location: Option<(f64, f64)>,
}

/// Summary statistics for the trees inside a search region.
///
/// Each segment is independently optional: a segment is `None` both when
/// the region contains no matching trees and when that segment's query
/// failed, so a partial failure never blanks a sibling segment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TreeSummary {
    /// Average trunk diameter, in inches.
    pub average_size: Option<f64>,
    /// Most common species with its count.
    pub most_common: Option<SpeciesCount>,
    /// The largest tree in the region.
    pub biggest: Option<BiggestTree>,
}

impl TreeSummary {
    /// Returns `true` if every segment is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.average_size.is_none() && self.most_common.is_none() && self.biggest.is_none()
    }
}

/// A single bar of a frequency histogram over a numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    /// Inclusive lower bound of the bin.
    pub min_value: f64,
    /// Exclusive upper bound of the bin (inclusive for the last bin).
    pub max_value: f64,
    /// Number of records falling in the bin.
    pub count: u64,
}
