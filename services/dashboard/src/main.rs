//! Smart-home hub dashboard service.
//!
//! Every cycle:
//! - Refreshes the snapshot from the hub (REST + WebSocket), field by field
//! - Renders the 1-bit dashboard
//! - Hands the frame to the display sink (a PNG file)

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dashboard::{DashboardConfig, PngFileSink, Schedule, Scheduler};
use hub_client::Updater;
use renderer::{IconCatalog, Renderer, Rotation, RustTypeFace, DEFAULT_FONT_SIZE};
use tokio::sync::broadcast;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "dashboard")]
#[command(about = "Render smart-home hub metrics to a monochrome panel")]
struct Args {
    /// YAML configuration file (entities, forecast source, panel, timeouts)
    #[arg(short, long, env = "DASHBOARD_CONFIG")]
    config: Option<PathBuf>,

    /// Hub REST API root, e.g. http://homeassistant.local:8123/api
    #[arg(long, env = "HA_URL")]
    url: Option<String>,

    /// Long-lived access token
    #[arg(long, env = "HA_API_KEY", hide_env_values = true)]
    token: Option<String>,

    /// Where the rendered PNG is written
    #[arg(short, long, env = "DASHBOARD_OUTPUT", default_value = "dashboard.png")]
    output: PathBuf,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,

    /// Seconds between successful cycles
    #[arg(long, default_value = "300")]
    interval_secs: u64,

    /// Seconds before retrying a failed cycle
    #[arg(long, default_value = "60")]
    retry_secs: u64,

    /// TrueType font for all labels
    #[arg(
        long,
        env = "DASHBOARD_FONT",
        default_value = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf"
    )]
    font: PathBuf,

    /// Icon directory with icons-meta.json and <name>.svg (default: built-in set)
    #[arg(long, env = "DASHBOARD_ICONS_DIR")]
    icons_dir: Option<PathBuf>,

    /// Panel rotation in degrees (0, 90, 180, 270); overrides the config file
    #[arg(long)]
    rotation: Option<Rotation>,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting hub dashboard");

    let mut config = DashboardConfig::load_or_default(args.config.as_deref())?;
    config.apply_overrides(args.url.clone(), args.token.clone(), args.rotation);
    if config.hub.access_token.is_empty() {
        warn!("No access token configured (set HA_API_KEY); the hub will reject requests");
    }

    let face = RustTypeFace::from_file(&args.font, DEFAULT_FONT_SIZE)
        .with_context(|| format!("Failed to load font {}", args.font.display()))?;
    let catalog = match &args.icons_dir {
        Some(dir) => IconCatalog::from_dir(dir)?,
        None => IconCatalog::builtin()?,
    };
    let (width, height) = config.display.canvas_size();
    let renderer = Renderer::with_canvas(face, catalog, width, height)?;

    let updater = Updater::new(config.hub.clone())?;
    let sink = PngFileSink::new(&args.output);
    let schedule = Schedule {
        interval: Duration::from_secs(args.interval_secs),
        retry: Duration::from_secs(args.retry_secs),
    };

    info!(
        base_url = %config.hub.base_url(),
        websocket_url = %config.hub.websocket_url(),
        forecast_source = ?config.hub.forecast_source,
        output = %args.output.display(),
        rotation = config.display.rotation.degrees(),
        "Configured"
    );

    let mut scheduler = Scheduler::new(updater, renderer, sink, config.display.rotation, schedule);

    if args.once {
        let status = scheduler.run_cycle().await?;
        info!(?status, "Single cycle complete");
        return Ok(());
    }

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received shutdown signal");
        shutdown_tx.send(()).ok();
    });

    scheduler.run_forever(shutdown_rx).await
}
