#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Command-line explorer for the street tree layer.
//!
//! Runs the same aggregate queries as the interactive pipeline against a
//! live `FeatureServer` layer: top species, buffer summaries around a
//! point, and trunk-diameter histogram bins.

use clap::{Parser, Subcommand};
use geo::Point;
use tree_map_arcgis::ArcGisTreeLayer;
use tree_map_explorer::{fetch_summary, queries};
use tree_map_query::filter::FilterComposer;
use tree_map_query::{FeatureLayer, HistogramParams, HistogramSource};
use tree_map_spatial::{LengthUnit, geodesic_buffer};
use tree_map_tree_models::fields;

/// Upper end of the trunk-diameter domain, matching the histogram.
const DBH_DOMAIN_MAX: f64 = 50.0;

#[derive(Parser)]
#[command(name = "tree_map_cli", about = "Street tree exploration tool")]
struct Cli {
    /// FeatureServer layer URL; defaults to the `TREES_LAYER_URL`
    /// environment variable.
    #[arg(long)]
    layer_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the most common species on the layer
    Species {
        /// Number of species to show
        #[arg(long, default_value_t = 10)]
        num: usize,
    },
    /// Summarize the trees inside a buffer around a point
    Summary {
        /// Buffer center longitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
        /// Buffer center latitude (WGS84)
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        /// Buffer radius in miles
        #[arg(long, default_value_t = 0.5)]
        radius: f64,
        /// Restrict the summary to one species
        #[arg(long)]
        species: Option<String>,
        /// Lower trunk-diameter bound in inches
        #[arg(long)]
        min_dbh: Option<f64>,
        /// Upper trunk-diameter bound in inches
        #[arg(long)]
        max_dbh: Option<f64>,
    },
    /// Show trunk-diameter histogram bins
    Histogram {
        /// Restrict the histogram to one species
        #[arg(long)]
        species: Option<String>,
        /// Number of bins
        #[arg(long, default_value_t = 50)]
        bins: usize,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_custom_env("RUST_LOG");

    let cli = Cli::parse();

    let layer_url = cli
        .layer_url
        .or_else(|| std::env::var("TREES_LAYER_URL").ok())
        .ok_or("Pass --layer-url or set TREES_LAYER_URL")?;
    let layer = ArcGisTreeLayer::new(&layer_url);

    match cli.command {
        Commands::Species { num } => run_species(&layer, num).await?,
        Commands::Summary {
            lng,
            lat,
            radius,
            species,
            min_dbh,
            max_dbh,
        } => run_summary(&layer, lng, lat, radius, species.as_deref(), min_dbh, max_dbh).await?,
        Commands::Histogram { species, bins } => {
            run_histogram(&layer, species.as_deref(), bins).await?;
        }
    }

    Ok(())
}

async fn run_species(
    layer: &ArcGisTreeLayer,
    num: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let set = layer.query_features(&queries::top_species(num)).await?;
    let species = queries::parse_species_counts(&set);

    println!("Top {} species:", species.len());
    for (i, entry) in species.iter().enumerate() {
        let latin = entry.latin.as_deref().unwrap_or("-");
        println!(
            "{:>3}. {:<24} {:<28} {:>8} trees",
            i + 1,
            entry.species,
            latin,
            entry.count
        );
    }

    Ok(())
}

async fn run_summary(
    layer: &ArcGisTreeLayer,
    lng: f64,
    lat: f64,
    radius: f64,
    species: Option<&str>,
    min_dbh: Option<f64>,
    max_dbh: Option<f64>,
) -> Result<(), Box<dyn std::error::Error>> {
    if radius <= 0.0 {
        return Err("radius must be positive".into());
    }

    let region = geodesic_buffer(Point::new(lng, lat), radius, LengthUnit::Miles);

    let mut composer = FilterComposer::new(fields::TRUNK_DIAMETER, fields::SPECIES);
    if min_dbh.is_some() || max_dbh.is_some() {
        composer.set_range(min_dbh.unwrap_or(0.0), max_dbh.unwrap_or(DBH_DOMAIN_MAX));
    }
    composer.set_category(species);

    let summary = fetch_summary(layer, &region, &composer.compose()).await?;

    println!("Trees within {radius} mi of ({lat}, {lng}):");
    match summary.average_size {
        Some(avg) => println!("  average trunk diameter: {avg:.1} in"),
        None => println!("  average trunk diameter: (no trees)"),
    }
    match &summary.most_common {
        Some(common) => println!(
            "  most common species:    {} ({} trees)",
            common.species, common.count
        ),
        None => println!("  most common species:    (no trees)"),
    }
    match &summary.biggest {
        Some(biggest) => {
            let address = biggest.address.as_deref().unwrap_or("unknown address");
            println!(
                "  biggest tree:           {} at {} ({:.1} in)",
                biggest.species, address, biggest.diameter
            );
        }
        None => println!("  biggest tree:           (no trees)"),
    }

    Ok(())
}

async fn run_histogram(
    layer: &ArcGisTreeLayer,
    species: Option<&str>,
    bins: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut composer = FilterComposer::new(fields::TRUNK_DIAMETER, fields::SPECIES);
    composer.set_category(species);

    let bins = layer
        .histogram(&HistogramParams {
            field: fields::TRUNK_DIAMETER.to_string(),
            num_bins: bins,
            min_value: 0.0,
            max_value: DBH_DOMAIN_MAX,
            filter: composer.compose(),
        })
        .await?;

    let max_count = bins.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    for bin in &bins {
        let width = (bin.count * 40 / max_count) as usize;
        println!(
            "{:>5.0}-{:<5.0} {:>8} {}",
            bin.min_value,
            bin.max_value,
            bin.count,
            "#".repeat(width)
        );
    }

    Ok(())
}
