//! geocode: command-line front end for the geofacade service.
//!
//! Prints JSON to stdout. API keys come from `~/.geofacade/secrets.toml`
//! or `GEOFACADE_<PROVIDER>_API_KEY`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::debug;

use geofacade::config::Secrets;
use geofacade::{
    AutocompleteOptions, Coordinates, GeocodingError, GeocodingOptions, GeocodingService,
    GeocodingSettings, NetworkState, ReverseGeocodingOptions,
};

/// Geocoding facade CLI
#[derive(Parser)]
#[command(name = "geocode")]
#[command(version)]
#[command(about = "Geocode, reverse geocode and autocomplete through the geofacade service")]
struct Args {
    /// Path to configuration file.
    #[arg(short, long, env = "GEOFACADE_CONFIG")]
    config: Option<PathBuf>,

    /// Treat the network as unreachable (serve cached results only).
    #[arg(long)]
    offline: bool,

    /// Provider to try first.
    #[arg(short, long)]
    provider: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Forward geocode an address
    Search {
        address: String,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        language: Option<String>,
        /// ISO 3166-1 alpha-2 code; may be repeated
        #[arg(long = "country")]
        countries: Vec<String>,
    },

    /// Resolve coordinates to an address
    Reverse {
        #[arg(allow_negative_numbers = true)]
        latitude: f64,
        #[arg(allow_negative_numbers = true)]
        longitude: f64,
        #[arg(long)]
        language: Option<String>,
        #[arg(long)]
        zoom: Option<u8>,
    },

    /// Type-ahead suggestions
    Suggest {
        query: String,
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show search mode, providers, quotas and cache state
    Status,
}

#[derive(Serialize)]
struct Status {
    available: bool,
    search: geofacade::SearchCapabilities,
    providers: Vec<geofacade::ProviderStatus>,
    cache: geofacade::CacheStats,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Default: warn for CLI; override with RUST_LOG.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            if let Some(code) = e.code() {
                eprintln!("code: {code}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> geofacade::Result<()> {
    let mut settings = GeocodingSettings::load_or_default(args.config.as_deref())?;
    if args.offline {
        settings.search.offline_mode = true;
    }
    let secrets = Secrets::load()?;

    let mut builder = GeocodingService::builder()
        .network_status(Arc::new(NetworkState::new(!args.offline)));
    for provider in &settings.providers {
        if let Some(key) = secrets.api_key(&provider.name) {
            debug!(provider = %provider.name, "api key found");
            builder = builder.api_key(&provider.name, key);
        }
    }
    let service = builder.settings(settings).build()?;
    let preferred = args.provider;

    match args.command {
        Command::Search {
            address,
            limit,
            language,
            countries,
        } => {
            let options = GeocodingOptions {
                limit,
                language,
                country_codes: countries,
                bounds: None,
                provider: preferred,
            };
            print_json(&service.geocode(&address, &options).await?)
        }

        Command::Reverse {
            latitude,
            longitude,
            language,
            zoom,
        } => {
            let options = ReverseGeocodingOptions {
                language,
                zoom,
                provider: preferred,
            };
            let result = service
                .reverse_geocode(Coordinates::new(latitude, longitude), &options)
                .await?;
            print_json(&result)
        }

        Command::Suggest { query, limit } => {
            let options = AutocompleteOptions {
                limit,
                provider: preferred,
                ..AutocompleteOptions::default()
            };
            print_json(&service.autocomplete(&query, &options).await)
        }

        Command::Status => print_json(&Status {
            available: service.is_available(),
            search: service.search_capabilities(preferred.as_deref()),
            providers: service.provider_status(),
            cache: service.cache_stats(),
        }),
    }
}

fn print_json<T: Serialize>(value: &T) -> geofacade::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(GeocodingError::from)?;
    println!("{json}");
    Ok(())
}
