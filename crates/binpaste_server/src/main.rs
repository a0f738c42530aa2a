//! binpaste API server entrypoint.

use binpaste_core::DEFAULT_PORT;
use binpaste_server::{
    config::{env_flag_enabled, Config},
    db::Database,
    reaper::{Reaper, ReaperScheduler},
    serve_router,
    tracking::{TrackingSettings, TrackingWorker},
    AppState, PasteService,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct CliFlags {
    help: bool,
    sweep: bool,
}

fn parse_cli_flags(args: &[String]) -> anyhow::Result<CliFlags> {
    let mut flags = CliFlags::default();
    for arg in args.iter().skip(1) {
        match arg.as_str() {
            "--help" => flags.help = true,
            "--sweep" => flags.sweep = true,
            value if value.starts_with('-') => {
                anyhow::bail!(
                    "Unknown option: '{}'. Use --help to see supported options.",
                    value
                );
            }
            value => {
                anyhow::bail!(
                    "Unexpected positional argument: '{}'. Use --help to see supported options.",
                    value
                );
            }
        }
    }
    Ok(flags)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "binpaste=info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let cli_flags = parse_cli_flags(&args)?;

    if cli_flags.help {
        print_help();
        return Ok(());
    }

    let config = Config::from_env();
    let database = Database::new(&config.db_path)?;
    let reaper = Reaper::new(database.pastes.clone(), config.retention());

    if cli_flags.sweep {
        let report = reaper.run_once(chrono::Utc::now());
        println!(
            "Soft-expired: {}, purged: {}",
            describe_count(report.soft_expired),
            describe_count(report.purged)
        );
        return Ok(());
    }

    let (worker, sender) = TrackingWorker::spawn(
        database.pastes.clone(),
        database.tracking.clone(),
        TrackingSettings::from_config(&config),
    )?;
    let scheduler = ReaperScheduler::start(reaper, config.reaper_interval())?;
    let service = PasteService::from_database(&database, sender, &config);
    let state = AppState::new(config.clone(), service);

    let allow_public = env_flag_enabled("ALLOW_PUBLIC_ACCESS");
    if allow_public {
        tracing::warn!("Public access enabled - server will accept requests from any origin");
    }

    let bind_addr = binpaste_server::resolve_bind_address(&config, allow_public);
    if !bind_addr.ip().is_loopback() {
        tracing::warn!(
            "Binding to non-localhost address: {} - ensure proper security measures are in place",
            bind_addr
        );
    }

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let actual_addr = listener.local_addr().unwrap_or(bind_addr);
    tracing::info!("binpaste running at http://{}", actual_addr);

    let serve_result = serve_router(listener, state, allow_public, shutdown_signal()).await;

    scheduler.stop();
    worker.shutdown();
    tracing::info!("Background jobs stopped");

    serve_result?;

    Ok(())
}

fn describe_count(count: Option<usize>) -> String {
    count.map_or_else(|| "failed".to_string(), |count| count.to_string())
}

fn print_help() {
    println!("binpaste server\n");
    println!("Usage: binpaste [OPTIONS]\n");
    println!("Options:");
    println!("  --sweep           Run the expiry and purge sweeps once, then exit");
    println!("  --help            Show this help message");
    println!("\nEnvironment variables:");
    println!("  DB_PATH           Database path (default: ~/.cache/binpaste/db)");
    println!(
        "  PORT              Server port (default: {})",
        DEFAULT_PORT
    );
    println!("  MAX_PASTE_SIZE    Maximum paste size in bytes (default: 4096)");
    println!("  RETENTION_DAYS    Days soft-deleted pastes are kept (default: 180)");
    println!("  REAPER_INTERVAL_SECS       Seconds between sweeps (default: 86400)");
    println!("  TRACKING_POLL_INTERVAL_MS  View-tracking poll interval (default: 1000)");
    println!("  TRACKING_MAX_REDELIVERIES  Redeliveries before a view is dropped (default: 5)");
    println!("  ALLOW_PUBLIC_ACCESS  Allow CORS from any origin");
    println!(
        "  BIND              Override bind address (e.g. 0.0.0.0:{})",
        DEFAULT_PORT
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
}
