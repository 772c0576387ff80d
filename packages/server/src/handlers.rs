//! HTTP handler functions for the tree map API.

use actix_web::{HttpResponse, web};
use geo::Point;
use tree_map_explorer::{fetch_summary, queries};
use tree_map_query::filter::FilterComposer;
use tree_map_query::{FeatureLayer, HistogramParams, HistogramSource};
use tree_map_server_models::{
    ApiHealth, ApiHistogramBin, ApiSpeciesCount, ApiSummary, HistogramQueryParams,
    SpeciesQueryParams, SummaryQueryParams,
};
use tree_map_spatial::{LengthUnit, geodesic_buffer};
use tree_map_tree_models::fields;

use crate::AppState;

/// `GET /api/health`
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(ApiHealth {
        healthy: true,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// `GET /api/species`
///
/// Returns the layer's most numerous species with counts.
pub async fn species(
    state: web::Data<AppState>,
    params: web::Query<SpeciesQueryParams>,
) -> HttpResponse {
    let num = params.num.unwrap_or(state.config.top_species);

    match state
        .layer
        .query_features(&queries::top_species(num))
        .await
    {
        Ok(set) => {
            let species: Vec<ApiSpeciesCount> = queries::parse_species_counts(&set)
                .into_iter()
                .map(ApiSpeciesCount::from)
                .collect();
            HttpResponse::Ok().json(species)
        }
        Err(e) => {
            log::error!("Failed to query top species: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to query top species"
            }))
        }
    }
}

/// `GET /api/summary`
///
/// Computes the biggest tree, most common species, and average trunk
/// diameter inside a geodesic buffer around the given point, under the
/// optional species / trunk-diameter filter.
pub async fn summary(
    state: web::Data<AppState>,
    params: web::Query<SummaryQueryParams>,
) -> HttpResponse {
    let radius = params.radius.unwrap_or(state.config.default_radius_miles);
    if radius <= 0.0 {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "radius must be positive"
        }));
    }

    let center = Point::new(params.lng, params.lat);
    let region = geodesic_buffer(center, radius, LengthUnit::Miles);

    let mut composer = FilterComposer::new(&state.config.histogram.field, fields::SPECIES);
    if params.min_dbh.is_some() || params.max_dbh.is_some() {
        composer.set_range(
            params.min_dbh.unwrap_or(state.config.histogram.min_value),
            params.max_dbh.unwrap_or(state.config.histogram.max_value),
        );
    }
    composer.set_category(params.species.as_deref());

    match fetch_summary(state.layer.as_ref(), &region, &composer.compose()).await {
        Ok(summary) => HttpResponse::Ok().json(ApiSummary::from(summary)),
        Err(e) => {
            log::error!("Failed to query buffer summary: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to query buffer summary"
            }))
        }
    }
}

/// `GET /api/histogram`
///
/// Returns trunk-diameter bin counts over the configured domain,
/// optionally restricted to one species.
pub async fn histogram(
    state: web::Data<AppState>,
    params: web::Query<HistogramQueryParams>,
) -> HttpResponse {
    let mut composer = FilterComposer::new(&state.config.histogram.field, fields::SPECIES);
    composer.set_category(params.species.as_deref());

    let request = HistogramParams {
        field: state.config.histogram.field.clone(),
        num_bins: params.bins.unwrap_or(state.config.histogram.num_bins),
        min_value: state.config.histogram.min_value,
        max_value: state.config.histogram.max_value,
        filter: composer.compose(),
    };

    match state.layer.histogram(&request).await {
        Ok(bins) => {
            let bins: Vec<ApiHistogramBin> =
                bins.into_iter().map(ApiHistogramBin::from).collect();
            HttpResponse::Ok().json(bins)
        }
        Err(e) => {
            log::error!("Failed to compute histogram: {e}");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Failed to compute histogram"
            }))
        }
    }
}
