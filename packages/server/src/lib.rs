#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web API server for the tree map application.
//!
//! Serves the REST API over a live street-tree feature layer: the top
//! species list, buffer summary statistics, and trunk-diameter histogram
//! bins. Every query is proxied through the layer's own query engine —
//! the server holds no data of its own.

mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use tree_map_arcgis::ArcGisTreeLayer;
use tree_map_explorer::ExplorerConfig;

/// Shared application state.
pub struct AppState {
    /// The street-tree feature layer.
    pub layer: Arc<ArcGisTreeLayer>,
    /// Pipeline defaults (radius, histogram domain, species count).
    pub config: ExplorerConfig,
}

/// Starts the tree map API server.
///
/// Reads the layer URL from `TREES_LAYER_URL` and the bind address from
/// `BIND_ADDR` / `PORT`. This is a regular async function — the caller
/// provides the runtime (e.g. via `#[actix_web::main]`).
///
/// # Errors
///
/// Returns an `std::io::Result` error if the HTTP server fails to bind
/// or encounters a runtime error.
///
/// # Panics
///
/// Panics if `TREES_LAYER_URL` is not set.
pub async fn run_server() -> std::io::Result<()> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let layer_url = std::env::var("TREES_LAYER_URL")
        .expect("TREES_LAYER_URL must point at a street-tree FeatureServer layer");
    log::info!("Using tree layer at {layer_url}");

    let state = web::Data::new(AppState {
        layer: Arc::new(ArcGisTreeLayer::new(&layer_url)),
        config: ExplorerConfig::default(),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(
                web::scope("/api")
                    .route("/health", web::get().to(handlers::health))
                    .route("/species", web::get().to(handlers::species))
                    .route("/summary", web::get().to(handlers::summary))
                    .route("/histogram", web::get().to(handlers::histogram)),
            )
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
