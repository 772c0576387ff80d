//! Canonical aggregate query shapes and their result parsers.
//!
//! Every surface (interactive pipeline, HTTP API, CLI) assembles its
//! tree-layer queries through these functions, so there is exactly one
//! spelling of each aggregate. The most-common-species aggregate groups
//! on the common name with an explicit count statistic ordered
//! descending; the biggest-tree fetch breaks diameter ties on the stable
//! record id so results are deterministic for a fixed dataset.

use geo::Polygon;
use tree_map_query::filter::Predicate;
use tree_map_query::{FeatureQuery, FeatureSet, OrderBy, Statistic, StatisticKind};
use tree_map_tree_models::{BiggestTree, SpeciesCount, fields};

/// Output name of the average-diameter statistic.
pub const AVG_SIZE: &str = "avg_size";
/// Output name of the per-species count statistic.
pub const SPECIES_COUNT: &str = "species_count";

/// Top-`num` species by tree count, with Latin names.
#[must_use]
pub fn top_species(num: usize) -> FeatureQuery {
    FeatureQuery {
        filter: Predicate::NotNull {
            field: fields::SPECIES.to_string(),
        },
        out_fields: vec![fields::SPECIES.to_string()],
        group_by: vec![fields::SPECIES.to_string(), fields::SPECIES_LATIN.to_string()],
        statistics: vec![Statistic::new(
            StatisticKind::Count,
            fields::SPECIES,
            SPECIES_COUNT,
        )],
        order_by: vec![OrderBy::desc(SPECIES_COUNT), OrderBy::asc(fields::SPECIES)],
        num: Some(num),
        ..FeatureQuery::default()
    }
}

/// Average trunk diameter of the trees matching `region` and `filter`.
#[must_use]
pub fn average_size(region: Option<&Polygon<f64>>, filter: &Predicate) -> FeatureQuery {
    FeatureQuery {
        geometry: region.cloned(),
        filter: filter.clone(),
        statistics: vec![Statistic::new(
            StatisticKind::Avg,
            fields::TRUNK_DIAMETER,
            AVG_SIZE,
        )],
        ..FeatureQuery::default()
    }
}

/// The single most common species matching `region` and `filter`.
#[must_use]
pub fn most_common_species(region: Option<&Polygon<f64>>, filter: &Predicate) -> FeatureQuery {
    FeatureQuery {
        geometry: region.cloned(),
        filter: Predicate::And(vec![
            Predicate::NotNull {
                field: fields::SPECIES.to_string(),
            },
            filter.clone(),
        ]),
        group_by: vec![fields::SPECIES.to_string()],
        statistics: vec![Statistic::new(
            StatisticKind::Count,
            fields::SPECIES,
            SPECIES_COUNT,
        )],
        order_by: vec![OrderBy::desc(SPECIES_COUNT), OrderBy::asc(fields::SPECIES)],
        num: Some(1),
        ..FeatureQuery::default()
    }
}

/// The largest tree (by trunk diameter) matching `region` and `filter`.
#[must_use]
pub fn biggest_tree(region: Option<&Polygon<f64>>, filter: &Predicate) -> FeatureQuery {
    FeatureQuery {
        geometry: region.cloned(),
        filter: filter.clone(),
        out_fields: vec![
            fields::SPECIES.to_string(),
            fields::ADDRESS.to_string(),
            fields::TRUNK_DIAMETER.to_string(),
            fields::OBJECT_ID.to_string(),
        ],
        order_by: vec![
            OrderBy::desc(fields::TRUNK_DIAMETER),
            OrderBy::asc(fields::OBJECT_ID),
        ],
        num: Some(1),
        return_geometry: true,
        ..FeatureQuery::default()
    }
}

/// Parses a [`top_species`] / [`most_common_species`] result set.
#[must_use]
pub fn parse_species_counts(set: &FeatureSet) -> Vec<SpeciesCount> {
    set.features
        .iter()
        .filter_map(|feature| {
            Some(SpeciesCount {
                species: feature.attr_str(fields::SPECIES)?.to_string(),
                latin: feature
                    .attr_str(fields::SPECIES_LATIN)
                    .map(ToString::to_string),
                count: feature.attr_u64(SPECIES_COUNT).unwrap_or(0),
            })
        })
        .collect()
}

/// Parses an [`average_size`] result set.
///
/// Statistics over an empty region come back as a null attribute, which
/// maps to `None` here.
#[must_use]
pub fn parse_average(set: &FeatureSet) -> Option<f64> {
    set.features.first()?.attr_f64(AVG_SIZE)
}

/// Parses a [`most_common_species`] result set down to its single row.
#[must_use]
pub fn parse_most_common(set: &FeatureSet) -> Option<SpeciesCount> {
    parse_species_counts(set).into_iter().next()
}

/// Parses a [`biggest_tree`] result set.
#[must_use]
pub fn parse_biggest(set: &FeatureSet) -> Option<BiggestTree> {
    let feature = set.features.first()?;
    let diameter = feature.attr_f64(fields::TRUNK_DIAMETER)?;

    Some(BiggestTree {
        species: feature
            .attr_str(fields::SPECIES)
            .unwrap_or_default()
            .to_string(),
        address: feature.attr_str(fields::ADDRESS).map(ToString::to_string),
        diameter,
        location: feature.geometry.map(|p| (p.x(), p.y())),
    })
}
