use std::{path::PathBuf, sync::Arc};

use {
    clap::Parser,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    scraperd_browser::SessionManager,
    scraperd_gateway::{AppState, start_server},
};

#[derive(Parser)]
#[command(name = "scraperd", about = "scraperd — headless-browser scrape API")]
struct Cli {
    /// Address to bind to (overrides config value).
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on (overrides config value).
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Path to a config file (skips the standard discovery order).
    #[arg(long, env = "SCRAPERD_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, default_value_t = false)]
    json_logs: bool,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "scraperd starting");

    let config = match cli.config {
        Some(ref path) => {
            let mut config = scraperd_config::load_config(path)?;
            scraperd_config::apply_env_overrides(&mut config);
            config
        },
        None => scraperd_config::discover_and_load(),
    };

    // CLI args win over config values.
    let bind = cli.bind.unwrap_or(config.server.bind.clone());
    let port = cli.port.unwrap_or(config.server.port);

    let session = Arc::new(SessionManager::new((&config.browser).into()));

    // Warm the browser up in the background so the first scrape does not
    // pay the launch cost. A failure here is recorded in session state and
    // retried on demand.
    let warmup = Arc::clone(&session);
    tokio::spawn(async move { warmup.initialize().await });

    let state = AppState::new(Arc::clone(&session));

    tokio::select! {
        result = start_server(&bind, port, state) => {
            if let Err(e) = result {
                warn!(error = %e, "server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received");
        }
    }

    session.shutdown().await;
    Ok(())
}
