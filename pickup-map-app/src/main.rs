use anyhow::Context;
use clap::{Parser, Subcommand};
use pickup_map::{
    api::HttpBackend,
    core::config::{HttpBackendConfig, MountContext, SelectorConfig},
    map::headless::HeadlessMapService,
    notify::LogNotifier,
    selection::CitySuggestions,
    PickupSelector, SelectionView,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Drives the pickup point selector against a live shop backend, with the
/// map rendered headlessly.
#[derive(Debug, Parser)]
#[command(name = "pickup-map-app")]
#[command(about = "Pickup point selector driver")]
struct Cli {
    /// Shop base URL, e.g. https://shop.example.com
    #[arg(long, env = "PICKUP_MAP_BASE_URL")]
    base_url: String,

    /// Selector configuration as JSON; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Carrier id of the pickup delivery method
    #[arg(long, env = "PICKUP_MAP_CARRIER_ID")]
    carrier_id: i64,

    /// Order to save the chosen point on
    #[arg(long, env = "PICKUP_MAP_ORDER_ID")]
    order_id: Option<i64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print city suggestions for a query
    Cities { query: String },
    /// Choose a city, list its points, and optionally pick one
    Pick {
        /// City query; the top suggestion is used
        #[arg(long)]
        city: String,
        /// Narrow the list by name, address, or code
        #[arg(long)]
        filter: Option<String>,
        /// Point code to select and save
        #[arg(long)]
        select: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pickup_map::runtime::init_logging("info");

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => SelectorConfig::from_json_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => SelectorConfig::default(),
    };

    let backend = Arc::new(HttpBackend::new(&HttpBackendConfig::new(cli.base_url.clone()))?);
    let map_service = HeadlessMapService::new().with_size(config.viewport.map_size);
    let context = MountContext {
        order_id: cli.order_id,
        carrier_id: Some(cli.carrier_id),
        ..Default::default()
    };

    let selector = PickupSelector::mount(
        context,
        backend,
        Some(&map_service),
        Arc::new(LogNotifier),
        config,
    )
    .await?;
    log::info!("map: {:?}", selector.map_status());

    match cli.command {
        Commands::Cities { query } => {
            if let CitySuggestions::Suggestions(cities) = selector.input_search(&query).await {
                for city in cities {
                    println!("{}\t{}", city.code, city.display_label());
                }
            }
        }
        Commands::Pick {
            city,
            filter,
            select,
        } => {
            let top = match selector.input_search(&city).await {
                CitySuggestions::Suggestions(cities) => cities.into_iter().next(),
                _ => None,
            }
            .with_context(|| format!("no city matches {city:?}"))?;

            selector.choose_suggestion(top).await?;
            selector.settle_map().await;

            if let Some(filter) = filter {
                selector.set_filter(&filter);
            }
            print_points(&selector.view());

            if let Some(code) = select {
                let outcome = selector.choose_point(&code).await?;
                println!("selected {code}: {outcome:?}");
            }

            if let Some(map) = map_service.last_map() {
                println!(
                    "map center {:.5},{:.5} zoom {}, {} clusters",
                    map.center().lat,
                    map.center().lng,
                    map.zoom(),
                    map.clusters().len()
                );
            }
        }
    }

    selector.unmount();
    Ok(())
}

fn print_points(view: &SelectionView) {
    if let Some(message) = view.empty_message() {
        println!("{message}");
        return;
    }
    println!("{} of {} points", view.points.len(), view.total_points);
    for point in &view.points {
        let mark = if view.is_selected(&point.code) { "*" } else { " " };
        println!("{mark} {}\t{}\t{}", point.code, point.name, point.full_address());
    }
}
