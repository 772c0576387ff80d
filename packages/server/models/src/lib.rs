#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the tree map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the internal result types in `tree_map_tree_models` to allow
//! independent evolution of the API contract.

use serde::{Deserialize, Serialize};
use tree_map_tree_models::{BiggestTree, HistogramBin, SpeciesCount, TreeSummary};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// A species entry as returned by the species endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpeciesCount {
    /// Common species name.
    pub species: String,
    /// Latin species name, when known.
    pub latin: Option<String>,
    /// Number of trees of this species.
    pub count: u64,
}

impl From<SpeciesCount> for ApiSpeciesCount {
    fn from(count: SpeciesCount) -> Self {
        Self {
            species: count.species,
            latin: count.latin,
            count: count.count,
        }
    }
}

/// The biggest tree of a buffer as returned by the summary endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiBiggestTree {
    /// Common species name.
    pub species: String,
    /// Nearest street address, when recorded.
    pub address: Option<String>,
    /// Trunk diameter at breast height, in inches.
    pub diameter: f64,
    /// Longitude of the tree, when geometry was available.
    pub longitude: Option<f64>,
    /// Latitude of the tree, when geometry was available.
    pub latitude: Option<f64>,
}

impl From<BiggestTree> for ApiBiggestTree {
    fn from(tree: BiggestTree) -> Self {
        Self {
            species: tree.species,
            address: tree.address,
            diameter: tree.diameter,
            longitude: tree.location.map(|(lng, _)| lng),
            latitude: tree.location.map(|(_, lat)| lat),
        }
    }
}

/// Buffer summary response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSummary {
    /// Average trunk diameter in inches, `null` for an empty buffer.
    pub average_size: Option<f64>,
    /// Most common species in the buffer.
    pub most_common: Option<ApiSpeciesCount>,
    /// Largest tree in the buffer.
    pub biggest: Option<ApiBiggestTree>,
}

impl From<TreeSummary> for ApiSummary {
    fn from(summary: TreeSummary) -> Self {
        Self {
            average_size: summary.average_size,
            most_common: summary.most_common.map(ApiSpeciesCount::from),
            biggest: summary.biggest.map(ApiBiggestTree::from),
        }
    }
}

/// One histogram bar as returned by the histogram endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHistogramBin {
    /// Inclusive lower bound of the bin.
    pub min_value: f64,
    /// Upper bound of the bin.
    pub max_value: f64,
    /// Number of trees in the bin.
    pub count: u64,
}

impl From<HistogramBin> for ApiHistogramBin {
    fn from(bin: HistogramBin) -> Self {
        Self {
            min_value: bin.min_value,
            max_value: bin.max_value,
            count: bin.count,
        }
    }
}

/// Query parameters for the species endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeciesQueryParams {
    /// Number of species to return (default 10).
    pub num: Option<usize>,
}

/// Query parameters for the summary endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryQueryParams {
    /// Buffer center longitude (WGS84).
    pub lng: f64,
    /// Buffer center latitude (WGS84).
    pub lat: f64,
    /// Buffer radius in miles (default 0.5).
    pub radius: Option<f64>,
    /// Restrict the summary to one species.
    pub species: Option<String>,
    /// Lower trunk-diameter bound in inches.
    pub min_dbh: Option<f64>,
    /// Upper trunk-diameter bound in inches.
    pub max_dbh: Option<f64>,
}

/// Query parameters for the histogram endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramQueryParams {
    /// Restrict the histogram to one species.
    pub species: Option<String>,
    /// Number of bins (default 50).
    pub bins: Option<usize>,
}
