#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `ArcGIS` `FeatureServer` REST implementation of the feature-layer
//! traits.
//!
//! Translates [`FeatureQuery`] objects into the layer's `query` operation
//! (`where` / `outFields` / `groupByFieldsForStatistics` /
//! `orderByFields` / `outStatistics` / esri polygon geometry) and parses
//! the `features` envelope back, including the service's error envelope
//! which arrives with HTTP 200.
//!
//! Histograms are computed as one count query per bin, fanned out
//! concurrently — the remote engine does all counting; this client only
//! assembles the bin ranges.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use geo::{Point, Polygon};
use tree_map_query::filter::Predicate;
use tree_map_query::{
    Feature, FeatureLayer, FeatureQuery, FeatureSet, HistogramParams, HistogramSource,
    QueryError, Statistic, StatisticKind,
};
use tree_map_tree_models::HistogramBin;

/// Output name of the per-bin count statistic.
const BIN_COUNT: &str = "bin_count";

/// A street-tree layer behind an `ArcGIS` `FeatureServer` REST endpoint.
pub struct ArcGisTreeLayer {
    client: reqwest::Client,
    query_url: String,
}

impl ArcGisTreeLayer {
    /// Creates a layer client for a `FeatureServer` layer URL
    /// (e.g., `https://host/arcgis/rest/services/Trees/FeatureServer/0`).
    #[must_use]
    pub fn new(layer_url: &str) -> Self {
        Self::with_client(reqwest::Client::new(), layer_url)
    }

    /// Creates a layer client reusing an existing HTTP client.
    #[must_use]
    pub fn with_client(client: reqwest::Client, layer_url: &str) -> Self {
        Self {
            client,
            query_url: format!("{}/query", layer_url.trim_end_matches('/')),
        }
    }

    async fn execute(&self, params: Vec<(String, String)>) -> Result<FeatureSet, QueryError> {
        // The 72-vertex buffer geometry pushes the request well past safe
        // URL lengths, so the query always goes as a form POST.
        let response = self
            .client
            .post(&self.query_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| QueryError::Transport {
                message: e.to_string(),
            })?;

        let body: serde_json::Value =
            response.json().await.map_err(|e| QueryError::Transport {
                message: e.to_string(),
            })?;

        parse_feature_set(&body)
    }
}

#[async_trait]
impl FeatureLayer for ArcGisTreeLayer {
    async fn query_features(&self, query: &FeatureQuery) -> Result<FeatureSet, QueryError> {
        self.execute(query_params(query)).await
    }
}

#[async_trait]
impl HistogramSource for ArcGisTreeLayer {
    async fn histogram(&self, params: &HistogramParams) -> Result<Vec<HistogramBin>, QueryError> {
        if params.num_bins == 0 || params.max_value <= params.min_value {
            return Err(QueryError::Parse {
                message: format!(
                    "Degenerate histogram domain: {} bins over [{}, {}]",
                    params.num_bins, params.min_value, params.max_value
                ),
            });
        }

        let width = (params.max_value - params.min_value) / params.num_bins as f64;
        let ranges: Vec<(f64, f64)> = (0..params.num_bins)
            .map(|i| {
                let lo = (i as f64).mul_add(width, params.min_value);
                let hi = ((i + 1) as f64).mul_add(width, params.min_value);
                (lo, hi)
            })
            .collect();

        log::debug!(
            "Histogram over {}: {} count queries of width {width}",
            params.field,
            ranges.len(),
        );

        let counts = futures::future::try_join_all(ranges.iter().enumerate().map(
            |(i, &(lo, hi))| {
                let filter = bin_filter(params, i, lo, hi);
                async move {
                    let set = self
                        .execute(query_params(&FeatureQuery {
                            filter,
                            statistics: vec![Statistic::new(
                                StatisticKind::Count,
                                &params.field,
                                BIN_COUNT,
                            )],
                            ..FeatureQuery::default()
                        }))
                        .await?;
                    Ok::<u64, QueryError>(
                        set.features
                            .first()
                            .and_then(|f| f.attr_u64(BIN_COUNT))
                            .unwrap_or(0),
                    )
                }
            },
        ))
        .await?;

        Ok(ranges
            .into_iter()
            .zip(counts)
            .map(|((min_value, max_value), count)| HistogramBin {
                min_value,
                max_value,
                count,
            })
            .collect())
    }
}

/// The half-open `[lo, hi)` bin filter, closed at the top for the last
/// bin so the domain maximum is not dropped.
fn bin_filter(params: &HistogramParams, index: usize, lo: f64, hi: f64) -> Predicate {
    let range = if index + 1 == params.num_bins {
        Predicate::Range {
            field: params.field.clone(),
            min: lo,
            max: hi,
        }
    } else {
        Predicate::And(vec![
            Predicate::GreaterEq {
                field: params.field.clone(),
                value: lo,
            },
            Predicate::LessThan {
                field: params.field.clone(),
                value: hi,
            },
        ])
    };

    match &params.filter {
        Predicate::All => range,
        other => Predicate::And(vec![other.clone(), range]),
    }
}

/// Assembles the `query` operation's form parameters.
fn query_params(query: &FeatureQuery) -> Vec<(String, String)> {
    let mut params = vec![
        ("f".to_string(), "json".to_string()),
        ("where".to_string(), query.filter.to_sql()),
        ("outSR".to_string(), "4326".to_string()),
        (
            "returnGeometry".to_string(),
            query.return_geometry.to_string(),
        ),
    ];

    let out_fields = if query.out_fields.is_empty() {
        "*".to_string()
    } else {
        query.out_fields.join(",")
    };
    params.push(("outFields".to_string(), out_fields));

    if !query.group_by.is_empty() {
        params.push((
            "groupByFieldsForStatistics".to_string(),
            query.group_by.join(","),
        ));
    }
    if !query.order_by.is_empty() {
        params.push(("orderByFields".to_string(), query.order_by_clause()));
    }
    if !query.statistics.is_empty() {
        let stats = serde_json::to_string(&query.statistics)
            .expect("statistic definitions always serialize");
        params.push(("outStatistics".to_string(), stats));
    }
    if let Some(num) = query.num {
        params.push(("resultRecordCount".to_string(), num.to_string()));
    }
    if let Some(polygon) = &query.geometry {
        params.push(("geometry".to_string(), polygon_json(polygon)));
        params.push((
            "geometryType".to_string(),
            "esriGeometryPolygon".to_string(),
        ));
        params.push((
            "spatialRel".to_string(),
            "esriSpatialRelIntersects".to_string(),
        ));
        params.push(("inSR".to_string(), "4326".to_string()));
    }

    params
}

/// Renders a polygon as esri geometry JSON (`rings` + WGS84 reference).
fn polygon_json(polygon: &Polygon<f64>) -> String {
    let mut rings = String::from("[[");
    for (i, coord) in polygon.exterior().coords().enumerate() {
        if i > 0 {
            rings.push(',');
        }
        let _ = write!(rings, "[{},{}]", coord.x, coord.y);
    }
    rings.push_str("]]");

    format!("{{\"rings\":{rings},\"spatialReference\":{{\"wkid\":4326}}}}")
}

/// Parses the `query` operation's response envelope.
///
/// The service reports failures as an `error` object with HTTP 200, so
/// the envelope is checked before the feature array.
fn parse_feature_set(body: &serde_json::Value) -> Result<FeatureSet, QueryError> {
    if let Some(error) = body.get("error") {
        let message = error
            .get("message")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("unspecified error");
        let details = error
            .get("details")
            .and_then(serde_json::Value::as_array)
            .map(|d| {
                d.iter()
                    .filter_map(serde_json::Value::as_str)
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();

        return Err(QueryError::Backend {
            message: if details.is_empty() {
                message.to_string()
            } else {
                format!("{message} ({details})")
            },
        });
    }

    let features = body
        .get("features")
        .and_then(serde_json::Value::as_array)
        .ok_or_else(|| QueryError::Parse {
            message: "Response has no feature array".to_string(),
        })?;

    let features = features
        .iter()
        .map(|feature| {
            let attributes: BTreeMap<String, serde_json::Value> = feature
                .get("attributes")
                .and_then(serde_json::Value::as_object)
                .map(|obj| obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default();

            let geometry = feature.get("geometry").and_then(|geom| {
                let x = geom.get("x")?.as_f64()?;
                let y = geom.get("y")?.as_f64()?;
                Some(Point::new(x, y))
            });

            Feature {
                attributes,
                geometry,
            }
        })
        .collect();

    Ok(FeatureSet { features })
}
