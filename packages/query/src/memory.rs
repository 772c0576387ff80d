//! In-process feature layer.
//!
//! Holds a point dataset behind an R-tree and evaluates [`FeatureQuery`]
//! objects structurally: envelope pre-filter, polygon containment, then
//! the [`Predicate`] tree, then grouping/statistics/ordering. Used by
//! tests and offline demos anywhere a remote layer would otherwise be
//! needed; also serves as the reference semantics for the aggregate query
//! shapes.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use geo::{BoundingRect, Contains};
use rstar::{AABB, RTree, RTreeObject};
use tree_map_tree_models::HistogramBin;

use crate::{
    Feature, FeatureLayer, FeatureQuery, FeatureSet, HistogramParams, HistogramSource,
    QueryError, SortOrder, StatisticKind,
};

/// A feature stored in the R-tree with its point envelope.
struct IndexedFeature {
    feature: Feature,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedFeature {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// An in-memory, R-tree-indexed feature layer.
pub struct MemoryLayer {
    index: RTree<IndexedFeature>,
    /// Features without geometry; they can never match a spatial filter
    /// but participate in attribute-only queries.
    unlocated: Vec<Feature>,
}

impl MemoryLayer {
    /// Builds the layer from a set of features.
    #[must_use]
    pub fn new(features: Vec<Feature>) -> Self {
        let mut indexed = Vec::new();
        let mut unlocated = Vec::new();

        for feature in features {
            match feature.geometry {
                Some(point) => indexed.push(IndexedFeature {
                    envelope: AABB::from_point([point.x(), point.y()]),
                    feature,
                }),
                None => unlocated.push(feature),
            }
        }

        Self {
            index: RTree::bulk_load(indexed),
            unlocated,
        }
    }

    /// Features passing the spatial and attribute filters, in insertion-
    /// independent (but deterministic after sorting) order.
    fn matching(&self, query: &FeatureQuery) -> Vec<&Feature> {
        let mut out: Vec<&Feature> = Vec::new();

        if let Some(polygon) = &query.geometry {
            if let Some(rect) = polygon.bounding_rect() {
                let envelope = AABB::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                );
                for entry in self.index.locate_in_envelope_intersecting(&envelope) {
                    // Indexed features always carry a point.
                    let Some(point) = entry.feature.geometry else {
                        continue;
                    };
                    if polygon.contains(&point) && query.filter.matches(&entry.feature.attributes)
                    {
                        out.push(&entry.feature);
                    }
                }
            }
        } else {
            for entry in self.index.iter() {
                if query.filter.matches(&entry.feature.attributes) {
                    out.push(&entry.feature);
                }
            }
            for feature in &self.unlocated {
                if query.filter.matches(&feature.attributes) {
                    out.push(feature);
                }
            }
        }

        out
    }
}

#[async_trait::async_trait]
impl FeatureLayer for MemoryLayer {
    async fn query_features(&self, query: &FeatureQuery) -> Result<FeatureSet, QueryError> {
        let rows = self.matching(query);

        let mut features = if query.statistics.is_empty() {
            project_records(&rows, query)
        } else {
            aggregate(&rows, query)
        };

        sort_features(&mut features, query);

        if let Some(num) = query.num {
            features.truncate(num);
        }

        Ok(FeatureSet { features })
    }
}

#[async_trait::async_trait]
impl HistogramSource for MemoryLayer {
    async fn histogram(&self, params: &HistogramParams) -> Result<Vec<HistogramBin>, QueryError> {
        if params.num_bins == 0 || params.max_value <= params.min_value {
            return Err(QueryError::Parse {
                message: format!(
                    "Degenerate histogram domain: {} bins over [{}, {}]",
                    params.num_bins, params.min_value, params.max_value
                ),
            });
        }

        let query = FeatureQuery {
            filter: params.filter.clone(),
            ..FeatureQuery::default()
        };
        let width = (params.max_value - params.min_value) / params.num_bins as f64;
        let mut counts = vec![0_u64; params.num_bins];

        for feature in self.matching(&query) {
            let Some(value) = feature.attr_f64(&params.field) else {
                continue;
            };
            if value < params.min_value || value > params.max_value {
                continue;
            }
            let idx = (((value - params.min_value) / width) as usize).min(params.num_bins - 1);
            counts[idx] += 1;
        }

        Ok(counts
            .into_iter()
            .enumerate()
            .map(|(i, count)| HistogramBin {
                min_value: (i as f64).mul_add(width, params.min_value),
                max_value: ((i + 1) as f64).mul_add(width, params.min_value),
                count,
            })
            .collect())
    }
}

/// Plain record fetch: project `out_fields` and honor `return_geometry`.
fn project_records(rows: &[&Feature], query: &FeatureQuery) -> Vec<Feature> {
    rows.iter()
        .map(|feature| {
            let attributes = if query.out_fields.is_empty()
                || query.out_fields.iter().any(|f| f == "*")
            {
                feature.attributes.clone()
            } else {
                query
                    .out_fields
                    .iter()
                    .filter_map(|field| {
                        feature
                            .attributes
                            .get(field)
                            .map(|value| (field.clone(), value.clone()))
                    })
                    .collect()
            };
            Feature {
                attributes,
                geometry: if query.return_geometry {
                    feature.geometry
                } else {
                    None
                },
            }
        })
        .collect()
}

/// Aggregate fetch: group rows and compute each output statistic.
///
/// With an empty `group_by` the whole match set forms a single group, and
/// exactly one row is returned even when nothing matched — statistics over
/// an empty set come back null, matching the remote engine's behavior.
fn aggregate(rows: &[&Feature], query: &FeatureQuery) -> Vec<Feature> {
    let mut groups: BTreeMap<Vec<String>, Vec<&Feature>> = BTreeMap::new();

    if query.group_by.is_empty() {
        groups.insert(Vec::new(), rows.to_vec());
    } else {
        for feature in rows {
            let key: Vec<String> = query
                .group_by
                .iter()
                .map(|field| {
                    feature
                        .attr(field)
                        .map_or_else(String::new, render_group_key)
                })
                .collect();
            groups.entry(key).or_default().push(feature);
        }
    }

    groups
        .into_iter()
        .map(|(key, members)| {
            let mut attributes = BTreeMap::new();

            for (field, value) in query.group_by.iter().zip(key) {
                attributes.insert(field.clone(), serde_json::Value::String(value));
            }
            for statistic in &query.statistics {
                attributes.insert(
                    statistic.out_statistic_field_name.clone(),
                    compute_statistic(statistic.statistic_type, &statistic.on_statistic_field, &members),
                );
            }

            Feature {
                attributes,
                geometry: None,
            }
        })
        .collect()
}

fn render_group_key(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn compute_statistic(
    kind: StatisticKind,
    on_field: &str,
    members: &[&Feature],
) -> serde_json::Value {
    if kind == StatisticKind::Count {
        let count = members
            .iter()
            .filter(|f| f.attr(on_field).is_some_and(|v| !v.is_null()))
            .count();
        return serde_json::Value::from(count as u64);
    }

    let values: Vec<f64> = members.iter().filter_map(|f| f.attr_f64(on_field)).collect();
    if values.is_empty() {
        return serde_json::Value::Null;
    }

    let result = match kind {
        StatisticKind::Avg => values.iter().sum::<f64>() / values.len() as f64,
        StatisticKind::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        StatisticKind::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        StatisticKind::Sum => values.iter().sum(),
        StatisticKind::Count => unreachable!("handled above"),
    };
    serde_json::Value::from(result)
}

/// Stable multi-key sort honoring the query's `order_by` list.
///
/// Values compare numerically when both sides are numbers, otherwise as
/// strings; the underlying sort is stable, so equal keys keep their
/// (deterministic) group order.
fn sort_features(features: &mut [Feature], query: &FeatureQuery) {
    if query.order_by.is_empty() {
        return;
    }

    features.sort_by(|a, b| {
        for order in &query.order_by {
            let ordering = compare_attr(a.attr(&order.field), b.attr(&order.field));
            let ordering = match order.order {
                SortOrder::Ascending => ordering,
                SortOrder::Descending => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

fn compare_attr(a: Option<&serde_json::Value>, b: Option<&serde_json::Value>) -> Ordering {
    match (a.and_then(serde_json::Value::as_f64), b.and_then(serde_json::Value::as_f64)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => {
            let x = a.and_then(serde_json::Value::as_str).unwrap_or_default();
            let y = b.and_then(serde_json::Value::as_str).unwrap_or_default();
            x.cmp(y)
        }
    }
}

#[cfg(test)]
mod tests {
    use geo::Point;
    use serde_json::json;
    use tree_map_spatial::{LengthUnit, geodesic_buffer};
    use tree_map_tree_models::fields;

    use super::*;
    use crate::filter::Predicate;
    use crate::{OrderBy, Statistic};

    fn tree(id: u64, species: &str, dbh: f64, lng: f64, lat: f64) -> Feature {
        Feature {
            attributes: [
                (fields::OBJECT_ID.to_string(), json!(id)),
                (fields::SPECIES.to_string(), json!(species)),
                (fields::TRUNK_DIAMETER.to_string(), json!(dbh)),
                (fields::ADDRESS.to_string(), json!(format!("{id} Main St"))),
            ]
            .into_iter()
            .collect(),
            geometry: Some(Point::new(lng, lat)),
        }
    }

    fn sample_layer() -> MemoryLayer {
        MemoryLayer::new(vec![
            tree(1, "red maple", 12.0, -73.99, 40.73),
            tree(2, "pin oak", 30.0, -73.9895, 40.7302),
            tree(3, "pin oak", 8.0, -73.9905, 40.7298),
            // Far outside any half-mile buffer around (-73.99, 40.73).
            tree(4, "ginkgo", 44.0, -73.90, 40.80),
        ])
    }

    #[tokio::test]
    async fn spatial_filter_keeps_only_buffered_trees() {
        let layer = sample_layer();
        let buffer = geodesic_buffer(Point::new(-73.99, 40.73), 0.5, LengthUnit::Miles);

        let result = layer
            .query_features(&FeatureQuery {
                geometry: Some(buffer),
                ..FeatureQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(result.features.len(), 3);
        assert!(
            result
                .features
                .iter()
                .all(|f| f.attr_str(fields::SPECIES) != Some("ginkgo"))
        );
    }

    #[tokio::test]
    async fn average_statistic_over_buffer() {
        let layer = MemoryLayer::new(vec![
            tree(1, "red maple", 12.0, -73.99, 40.73),
            tree(2, "pin oak", 30.0, -73.9895, 40.7302),
        ]);
        let buffer = geodesic_buffer(Point::new(-73.99, 40.73), 0.5, LengthUnit::Miles);

        let result = layer
            .query_features(&FeatureQuery {
                geometry: Some(buffer),
                statistics: vec![Statistic::new(
                    StatisticKind::Avg,
                    fields::TRUNK_DIAMETER,
                    "avg_size",
                )],
                ..FeatureQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(result.features.len(), 1);
        let avg = result.features[0].attr_f64("avg_size").unwrap();
        assert!((avg - 21.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn statistics_over_empty_set_return_one_null_row() {
        let layer = MemoryLayer::new(vec![]);

        let result = layer
            .query_features(&FeatureQuery {
                statistics: vec![Statistic::new(
                    StatisticKind::Avg,
                    fields::TRUNK_DIAMETER,
                    "avg_size",
                )],
                ..FeatureQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(result.features.len(), 1);
        assert!(result.features[0].attr("avg_size").unwrap().is_null());
    }

    #[tokio::test]
    async fn group_by_counts_and_orders_descending() {
        let layer = sample_layer();

        let result = layer
            .query_features(&FeatureQuery {
                filter: Predicate::NotNull {
                    field: fields::SPECIES.to_string(),
                },
                group_by: vec![fields::SPECIES.to_string()],
                statistics: vec![Statistic::new(
                    StatisticKind::Count,
                    fields::SPECIES,
                    "species_count",
                )],
                order_by: vec![
                    OrderBy::desc("species_count"),
                    OrderBy::asc(fields::SPECIES),
                ],
                num: Some(2),
                ..FeatureQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(result.features.len(), 2);
        assert_eq!(result.features[0].attr_str(fields::SPECIES), Some("pin oak"));
        assert_eq!(result.features[0].attr_u64("species_count"), Some(2));
        // "ginkgo" beats "red maple" on the alphabetical tie-break.
        assert_eq!(result.features[1].attr_str(fields::SPECIES), Some("ginkgo"));
    }

    #[tokio::test]
    async fn biggest_record_ties_break_on_object_id() {
        let layer = MemoryLayer::new(vec![
            tree(7, "pin oak", 30.0, -73.99, 40.73),
            tree(2, "red maple", 30.0, -73.9895, 40.7302),
            tree(5, "ginkgo", 12.0, -73.9905, 40.7298),
        ]);

        let result = layer
            .query_features(&FeatureQuery {
                order_by: vec![
                    OrderBy::desc(fields::TRUNK_DIAMETER),
                    OrderBy::asc(fields::OBJECT_ID),
                ],
                num: Some(1),
                return_geometry: true,
                ..FeatureQuery::default()
            })
            .await
            .unwrap();

        assert_eq!(result.features.len(), 1);
        assert_eq!(result.features[0].attr_u64(fields::OBJECT_ID), Some(2));
        assert!(result.features[0].geometry.is_some());
    }

    #[tokio::test]
    async fn out_fields_projects_attributes() {
        let layer = sample_layer();

        let result = layer
            .query_features(&FeatureQuery {
                out_fields: vec![fields::SPECIES.to_string()],
                num: Some(1),
                ..FeatureQuery::default()
            })
            .await
            .unwrap();

        let feature = &result.features[0];
        assert!(feature.attr(fields::SPECIES).is_some());
        assert!(feature.attr(fields::TRUNK_DIAMETER).is_none());
        assert!(feature.geometry.is_none());
    }

    #[tokio::test]
    async fn histogram_bins_count_matching_trees() {
        let layer = sample_layer();

        let bins = layer
            .histogram(&HistogramParams {
                field: fields::TRUNK_DIAMETER.to_string(),
                num_bins: 5,
                min_value: 0.0,
                max_value: 50.0,
                filter: Predicate::All,
            })
            .await
            .unwrap();

        assert_eq!(bins.len(), 5);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u64>(), 4);
        // dbh 8 falls in [0,10); 12 in [10,20); 30 in [30,40); 44 in [40,50].
        assert_eq!(bins[0].count, 1);
        assert_eq!(bins[1].count, 1);
        assert_eq!(bins[3].count, 1);
        assert_eq!(bins[4].count, 1);
    }

    #[tokio::test]
    async fn histogram_respects_category_filter() {
        let layer = sample_layer();

        let bins = layer
            .histogram(&HistogramParams {
                field: fields::TRUNK_DIAMETER.to_string(),
                num_bins: 5,
                min_value: 0.0,
                max_value: 50.0,
                filter: Predicate::Equals {
                    field: fields::SPECIES.to_string(),
                    value: "pin oak".to_string(),
                },
            })
            .await
            .unwrap();

        assert_eq!(bins.iter().map(|b| b.count).sum::<u64>(), 2);
    }

    #[tokio::test]
    async fn degenerate_histogram_domain_is_an_error() {
        let layer = sample_layer();

        let result = layer
            .histogram(&HistogramParams {
                field: fields::TRUNK_DIAMETER.to_string(),
                num_bins: 0,
                min_value: 0.0,
                max_value: 50.0,
                filter: Predicate::All,
            })
            .await;

        assert!(matches!(result, Err(QueryError::Parse { .. })));
    }
}
