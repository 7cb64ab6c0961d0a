use std::io;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Utc;
use clap::{ArgAction, Parser, Subcommand, ValueHint};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use strava_maps::activity::{self, ACTIVITIES_FILE};
use strava_maps::config::Config;
use strava_maps::mapbox::{self, MapboxClient, MapboxConfig};
use strava_maps::maps::{self, MapJobOptions};
use strava_maps::static_map::{self, StaticMapOptions};
use strava_maps::strava::{self, ACTIVITY_READ_ALL, StravaClient, StravaConfig};
use strava_maps::sync::{self, SyncOptions};
use strava_maps::traits::StravaSession;

#[derive(Parser, Debug)]
#[command(author, version, about = "Strava activity sync and static map generation", long_about = None)]
struct Cli {
    /// Activity JSON directory (overrides STRAVA_DATA_DIR)
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    data_dir: Option<PathBuf>,

    /// Rendered map directory (overrides STRAVA_MAPS_DIR)
    #[arg(long, global = true, value_hint = ValueHint::DirPath)]
    maps_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch all activities and recent activity details from Strava
    Sync(SyncArgs),
    /// Render static maps for activities with GPS data
    Maps(MapsArgs),
    /// Print the Strava authorization URL for a new refresh token
    AuthUrl(AuthUrlArgs),
    /// Exchange an authorization code for a refresh token
    ExchangeToken(ExchangeArgs),
    /// Verify Strava credentials, scopes and endpoints
    CheckStrava,
    /// Verify the Mapbox token and static image rendering
    CheckMapbox,
    /// Print the static map URL for an encoded polyline
    Url(UrlArgs),
}

#[derive(Parser, Debug)]
struct SyncArgs {
    /// Fetch details for activities started within this many days
    #[arg(long, default_value_t = 30)]
    detail_days: i64,

    /// Milliseconds to wait between Strava calls
    #[arg(long, default_value_t = 500)]
    delay_ms: u64,
}

#[derive(Parser, Debug)]
struct MapsArgs {
    /// Only render this activity
    #[arg(long)]
    activity: Option<u64>,

    #[arg(long, default_value_t = 400)]
    width: u32,

    #[arg(long, default_value_t = 300)]
    height: u32,

    /// Milliseconds to wait between renders
    #[arg(long, default_value_t = 100)]
    delay_ms: u64,

    /// Keep maps whose activity is no longer in the activities file
    #[arg(long, action = ArgAction::SetTrue)]
    no_cleanup: bool,
}

#[derive(Parser, Debug)]
struct AuthUrlArgs {
    /// Strava client id (defaults to STRAVA_CLIENT_ID)
    #[arg(long)]
    client_id: Option<String>,
}

#[derive(Parser, Debug)]
struct ExchangeArgs {
    /// `code` parameter from the authorization redirect
    code: String,
}

#[derive(Parser, Debug)]
struct UrlArgs {
    /// Google encoded polyline
    polyline: String,

    /// Start point as `lat,lng`
    #[arg(long)]
    start: LatLng,

    /// End point as `lat,lng`
    #[arg(long)]
    end: Option<LatLng>,

    #[arg(long, default_value_t = 400)]
    width: u32,

    #[arg(long, default_value_t = 300)]
    height: u32,
}

#[derive(Debug, Clone, Copy)]
struct LatLng(f64, f64);

impl FromStr for LatLng {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lng) = s
            .split_once(',')
            .ok_or_else(|| format!("expected lat,lng, got {:?}", s))?;
        let lat = lat.trim().parse().map_err(|e| format!("latitude: {}", e))?;
        let lng = lng.trim().parse().map_err(|e| format!("longitude: {}", e))?;
        Ok(LatLng(lat, lng))
    }
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut config = Config::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(dir) = cli.maps_dir {
        config.maps_dir = dir;
    }

    match cli.command {
        Command::Sync(args) => handle_sync(&config, args),
        Command::Maps(args) => handle_maps(&config, args),
        Command::AuthUrl(args) => handle_auth_url(&config, args),
        Command::ExchangeToken(args) => handle_exchange(&config, args),
        Command::CheckStrava => handle_check_strava(&config),
        Command::CheckMapbox => handle_check_mapbox(&config),
        Command::Url(args) => handle_url(&config, args),
    }
}

fn handle_sync(config: &Config, args: SyncArgs) -> Result<()> {
    let credentials = match config.strava_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            warn!(error = %err, "Strava credentials not configured, skipping sync");
            return Ok(());
        }
    };

    let client = StravaClient::new(StravaConfig::default())?;
    let token = client
        .refresh_access_token(&credentials)
        .context("failed to refresh Strava access token")?;
    info!("access token refreshed");

    let session = StravaSession::new(&client, token.access_token);
    let options = SyncOptions {
        detail_window: chrono::Duration::days(args.detail_days),
        delay: Duration::from_millis(args.delay_ms),
        ..SyncOptions::default()
    };
    let report = sync::sync_activities(&session, &config.data_dir, &options, Utc::now())
        .context("Strava sync failed")?;

    info!(
        activities = report.activities,
        pages = report.pages,
        detailed = report.detailed,
        detail_failures = report.detail_failures,
        "Strava sync completed"
    );
    Ok(())
}

fn handle_maps(config: &Config, args: MapsArgs) -> Result<()> {
    let token = match config.require_mapbox_token() {
        Ok(token) => token,
        Err(err) => {
            warn!(error = %err, "skipping map generation");
            return Ok(());
        }
    };

    let activities_path = config.data_dir.join(ACTIVITIES_FILE);
    let activities = activity::load_activities(&activities_path)?;
    info!(count = activities.len(), "loaded activities");

    let client = MapboxClient::new(MapboxConfig::default())?;
    let options = MapJobOptions {
        static_map: StaticMapOptions {
            width: args.width,
            height: args.height,
            ..StaticMapOptions::default()
        },
        delay: Duration::from_millis(args.delay_ms),
        target: args.activity,
    };

    let summary = maps::generate_maps(&client, &activities, &config.maps_dir, &options, token)?;
    info!(
        generated = summary.generated,
        skipped = summary.skipped,
        failed = summary.failed,
        total_files = summary.total_files,
        "map generation summary"
    );

    if !args.no_cleanup && args.activity.is_none() {
        maps::cleanup_orphaned_maps(&config.maps_dir, &activities)?;
    }
    Ok(())
}

fn handle_auth_url(config: &Config, args: AuthUrlArgs) -> Result<()> {
    let client_id = match args.client_id {
        Some(id) => id,
        None => config.require_client_id()?.to_string(),
    };

    println!("{}", strava::authorization_url(&StravaConfig::default(), &client_id));
    println!();
    println!("Open the URL, authorize the app, then copy the `code` parameter from the");
    println!("http://localhost redirect and run `strava-maps exchange-token <code>`.");
    println!("The granted scope must include {}.", ACTIVITY_READ_ALL);
    Ok(())
}

fn handle_exchange(config: &Config, args: ExchangeArgs) -> Result<()> {
    let client_id = config.require_client_id()?;
    let client_secret = config
        .client_secret
        .as_deref()
        .ok_or_else(|| anyhow!("missing required setting STRAVA_CLIENT_SECRET"))?;

    let client = StravaClient::new(StravaConfig::default())?;
    let token = client
        .exchange_code(client_id, client_secret, &args.code)
        .context("token exchange failed")?;

    let refresh_token = token
        .refresh_token
        .as_deref()
        .ok_or_else(|| anyhow!("Strava response did not include a refresh token"))?;
    println!("refresh token: {}", refresh_token);
    println!("scope: {}", token.scope.as_deref().unwrap_or("NOT PRESENT"));

    match token.has_scope(ACTIVITY_READ_ALL) {
        Some(true) => info!("token has {}", ACTIVITY_READ_ALL),
        _ => warn!("token is missing {}", ACTIVITY_READ_ALL),
    }
    Ok(())
}

fn handle_check_strava(config: &Config) -> Result<()> {
    let credentials = config.strava_credentials()?;
    let client = StravaClient::new(StravaConfig::default())?;

    let token = client
        .refresh_access_token(&credentials)
        .context("failed to refresh access token")?;
    info!(
        token_type = token.token_type.as_deref().unwrap_or("N/A"),
        expires_at = ?token.expires_at,
        scope = token.scope.as_deref().unwrap_or("N/A"),
        "access token refreshed"
    );
    if token.has_scope(ACTIVITY_READ_ALL) == Some(false) {
        bail!("token is missing {}; re-authorize with `auth-url`", ACTIVITY_READ_ALL);
    }

    let athlete = client
        .athlete(&token.access_token)
        .context("athlete endpoint failed")?;
    info!(id = athlete.id, name = %athlete.display_name(), country = ?athlete.country, "athlete endpoint accessible");

    match client.activities_page(&token.access_token, 1, 1) {
        Ok(activities) => match activities.first() {
            Some(latest) => info!(
                name = %latest.name,
                kind = latest.kind.as_deref().unwrap_or("Unknown"),
                start_date = ?latest.start_date,
                "activities endpoint accessible"
            ),
            None => info!("activities endpoint accessible, no activities found"),
        },
        Err(err) => {
            if err.is_unauthorized() {
                warn!(
                    "401 means the refresh token lacks {}; authorize again at {}",
                    ACTIVITY_READ_ALL,
                    strava::authorization_url(client.config(), &credentials.client_id)
                );
            }
            return Err(err).context("activities endpoint failed");
        }
    }

    info!("all Strava checks passed");
    Ok(())
}

fn handle_check_mapbox(config: &Config) -> Result<()> {
    let token = config.require_mapbox_token()?;
    let client = MapboxClient::new(MapboxConfig::default())?;

    if let Err(err) = client.check_token(token) {
        if let Some(hint) = err.hint() {
            warn!("{}", hint);
        }
        return Err(err).context("Mapbox token check failed");
    }
    info!("Mapbox API accessible, token is valid");

    let url = mapbox::check_map_url(&StaticMapOptions::default(), token);
    match client.download_image(&url) {
        Ok(bytes) => info!(bytes = bytes.len(), "static map rendered as PNG"),
        Err(err) => {
            if let Some(hint) = err.hint() {
                warn!("{}", hint);
            }
            return Err(err).context("static map generation failed");
        }
    }

    info!("all Mapbox checks passed");
    Ok(())
}

fn handle_url(config: &Config, args: UrlArgs) -> Result<()> {
    let token = config.require_mapbox_token()?;
    let options = StaticMapOptions {
        width: args.width,
        height: args.height,
        ..StaticMapOptions::default()
    };
    let LatLng(start_lat, start_lng) = args.start;
    let end = args.end.map(|LatLng(lat, lng)| (lat, lng));

    let url = static_map::build_static_map_url(
        &args.polyline,
        (start_lat, start_lng),
        end,
        &options,
        token,
    )?;
    println!("{}", url);
    Ok(())
}
