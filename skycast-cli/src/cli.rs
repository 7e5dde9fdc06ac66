use anyhow::{Context, Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Password, PasswordDisplayMode, Select};
use skycast_core::{
    BackgroundRefresh, Config, Coordinates, Dashboard, Database, GeocodingLocationService,
    LocationService, Place, ProviderId, SavedLocationStore, WeatherService, WeatherUiState,
    sources_from_config,
};
use std::{io, sync::Arc, time::Duration};
use tracing::{debug, warn};

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "skycast", version, about = "Multi-provider weather from the command line")]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Configure credentials for a specific provider.
    Configure {
        /// Provider short name, e.g. "openweather" or "weatherapi".
        provider: String,

        /// Per-request timeout in seconds for this provider.
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Show weather for coordinates, a saved location, or the device position.
    Show {
        #[arg(allow_negative_numbers = true, requires = "longitude")]
        latitude: Option<f64>,

        #[arg(allow_negative_numbers = true)]
        longitude: Option<f64>,

        /// Name of a saved location instead of coordinates.
        #[arg(long, conflicts_with_all = ["latitude", "here"])]
        saved: Option<String>,

        /// Use the configured device position.
        #[arg(long, conflicts_with = "latitude")]
        here: bool,

        /// Skip the cache and ask the providers.
        #[arg(long)]
        refresh: bool,
    },

    /// Search places by name.
    Search {
        query: String,
    },

    /// Manage saved locations.
    Locations {
        #[command(subcommand)]
        action: LocationsAction,
    },

    /// Current conditions for every saved location.
    Dashboard {
        #[arg(long)]
        refresh: bool,
    },

    /// Force-refresh every saved location once and sweep old cache entries.
    Refresh,

    /// Refresh every saved location periodically until interrupted.
    Watch {
        /// Minutes between refresh passes.
        #[arg(long, default_value_t = 60)]
        interval: u64,
    },

    /// Delete cache entries older than the retention window.
    Sweep,

    /// Delete all cached weather.
    ClearCache,
}

#[derive(Debug, Subcommand)]
pub enum LocationsAction {
    /// List saved locations in display order.
    List,

    /// Search by name and save the chosen match.
    Add { query: String },

    /// Remove a saved location by id.
    Remove { id: i64 },

    /// Put the given ids first, in that order.
    Move {
        #[arg(required = true)]
        ids: Vec<i64>,
    },

    /// Store the device position as the current location.
    Current,
}

/// Everything a command needs, built from the config file.
struct App {
    config: Config,
    db: Database,
    service: WeatherService,
}

impl App {
    async fn open() -> Result<Self> {
        let config = Config::load()?;
        let db_path = config.database_path()?;
        debug!(path = %db_path.display(), "opening database");

        let db = Database::open(&db_path)
            .await
            .with_context(|| format!("Failed to open database: {}", db_path.display()))?;
        let sources = sources_from_config(&config)?;
        let service = WeatherService::new(sources, Arc::new(db.cache_store()));

        Ok(Self { config, db, service })
    }

    fn location_service(&self) -> Result<GeocodingLocationService> {
        Ok(GeocodingLocationService::new(self.config.device.clone())?)
    }

    fn saved(&self) -> SavedLocationStore {
        self.db.location_store()
    }

    fn dashboard(&self) -> Result<Dashboard> {
        Ok(Dashboard::new(
            self.service.clone(),
            self.saved(),
            Arc::new(self.location_service()?),
        ))
    }
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure { provider, timeout } => configure(&provider, timeout)?,
            Command::Show { latitude, longitude, saved, here, refresh } => {
                let app = App::open().await?;
                show(&app, latitude.zip(longitude), saved, here, refresh).await?;
            }
            Command::Search { query } => {
                let app = App::open().await?;
                let places = app.location_service()?.search_by_name(&query).await?;
                print_places(&query, &places);
            }
            Command::Locations { action } => {
                let app = App::open().await?;
                locations(&app, action).await?;
            }
            Command::Dashboard { refresh } => {
                let app = App::open().await?;
                let mut dashboard = app.dashboard()?;
                let views = dashboard.refresh_all(refresh).await?;
                if views.is_empty() {
                    println!("No saved locations. Add one with `skycast locations add <name>`.");
                }
                for view in views {
                    println!("{}", output::render_view(view));
                }
            }
            Command::Refresh => {
                let app = App::open().await?;
                let summary = BackgroundRefresh::new(app.service.clone(), app.saved())
                    .run_once()
                    .await?;
                println!(
                    "Refreshed {} location(s), {} failed, {} old cache entr(ies) removed.",
                    summary.refreshed, summary.failed, summary.swept
                );
            }
            Command::Watch { interval } => {
                if interval == 0 {
                    bail!("--interval must be at least 1 minute");
                }
                let app = App::open().await?;
                let job = BackgroundRefresh::new(app.service.clone(), app.saved());
                println!("Refreshing every {interval} minute(s). Press Ctrl+C to stop.");
                job.run_periodic(
                    Duration::from_secs(interval * 60),
                    until_signal(tokio::signal::ctrl_c()),
                )
                .await;
            }
            Command::Sweep => {
                let app = App::open().await?;
                let removed = app.service.sweep_expired(Utc::now()).await?;
                println!("Removed {removed} cache entr(ies) older than the retention window.");
            }
            Command::ClearCache => {
                let app = App::open().await?;
                app.service.clear_cache().await?;
                println!("Weather cache cleared.");
            }
        }

        Ok(())
    }
}

/// Resolves when `signal` fires. If the listener cannot be installed this never resolves,
/// so the caller keeps running until the process is killed.
async fn until_signal(signal: impl Future<Output = io::Result<()>>) {
    if let Err(e) = signal.await {
        warn!(error = %e, "cannot listen for Ctrl+C, stop the process to end watching");
        std::future::pending::<()>().await;
    }
}

fn configure(provider: &str, timeout: Option<u64>) -> Result<()> {
    let id = ProviderId::try_from(provider)?;
    let mut config = Config::load()?;

    if id.requires_api_key() {
        let key = Password::new(&format!("API key for {id}:"))
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .prompt()
            .context("Failed to read API key")?;
        let key = key.trim();
        if key.is_empty() {
            bail!("API key must not be empty");
        }
        config.upsert_provider_api_key(id, key.to_string());
    } else {
        println!("{id} needs no API key.");
        if timeout.is_none() {
            return Ok(());
        }
        config.upsert_provider_api_key(id, String::new());
    }

    if let (Some(secs), Some(provider_cfg)) = (timeout, config.providers.get_mut(id.as_str())) {
        provider_cfg.timeout_secs = Some(secs);
    }

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

async fn show(
    app: &App,
    coords: Option<(f64, f64)>,
    saved: Option<String>,
    here: bool,
    refresh: bool,
) -> Result<()> {
    let coords = if let Some((lat, lon)) = coords {
        let coords = Coordinates::new(lat, lon);
        if !coords.is_valid() {
            bail!("Coordinates out of range: {coords}");
        }
        coords
    } else if let Some(name) = saved {
        find_saved(&app.saved(), &name).await?
    } else if here {
        let view = app.dashboard()?.load_current_location(refresh).await;
        match &view.state {
            WeatherUiState::Success { weather, origin } => {
                println!("{}", output::render_weather(weather, *origin));
            }
            _ => println!("{}", output::render_view(&view)),
        }
        return Ok(());
    } else {
        bail!("Give coordinates (`skycast show 52.52 13.41`), --saved <name> or --here");
    };

    let retrieved = app.service.retrieve(coords, refresh).await?;
    println!("{}", output::render_weather(&retrieved.weather, retrieved.origin));
    Ok(())
}

async fn find_saved(store: &SavedLocationStore, name: &str) -> Result<Coordinates> {
    let needle = name.to_lowercase();
    store
        .list()
        .await?
        .into_iter()
        .find(|l| l.city_name.to_lowercase() == needle || l.display_name().to_lowercase() == needle)
        .map(|l| l.coordinates())
        .with_context(|| format!("No saved location named '{name}'"))
}

fn print_places(query: &str, places: &[Place]) {
    if places.is_empty() {
        println!("No places found for '{query}' (queries need at least 3 characters).");
        return;
    }
    for place in places {
        println!("{}", output::render_place(place));
    }
}

/// Picks by position, so matches that render the same stay distinct.
fn take_choice(places: Vec<Place>, index: usize) -> Result<Place> {
    places.into_iter().nth(index).context("selection out of range")
}

async fn locations(app: &App, action: LocationsAction) -> Result<()> {
    let store = app.saved();

    match action {
        LocationsAction::List => {
            let saved = store.list().await?;
            if saved.is_empty() {
                println!("No saved locations.");
            }
            for location in &saved {
                println!("{}", output::render_saved(location));
            }
        }
        LocationsAction::Add { query } => {
            let places = app.location_service()?.search_by_name(&query).await?;
            let place = match places.len() {
                0 => {
                    print_places(&query, &places);
                    return Ok(());
                }
                1 => places.into_iter().next().context("search result vanished")?,
                _ => {
                    let options: Vec<String> = places.iter().map(output::render_place).collect();
                    let choice = Select::new("Which place?", options)
                        .raw_prompt()
                        .context("Failed to read selection")?;
                    take_choice(places, choice.index)?
                }
            };
            let saved = store.add(&place).await?;
            println!("Saved {}", output::render_saved(&saved));
        }
        LocationsAction::Remove { id } => {
            if store.remove(id).await? {
                println!("Removed location {id}.");
            } else {
                println!("No saved location with id {id}.");
            }
        }
        LocationsAction::Move { ids } => {
            store.reorder(&ids).await?;
            for location in store.list().await? {
                println!("{}", output::render_saved(&location));
            }
        }
        LocationsAction::Current => {
            let service = app.location_service()?;
            let coords = service.current_coordinates().await?;
            let place = service.reverse_geocode(coords).await.unwrap_or_else(|e| {
                debug!(error = %e, "reverse geocoding failed");
                Place {
                    latitude: coords.latitude,
                    longitude: coords.longitude,
                    city_name: coords.to_string(),
                    country: String::new(),
                }
            });
            let saved = store.set_current_location(&place).await?;
            println!("Current location: {}", output::render_saved(&saved));
        }
    }

    Ok(())
}
