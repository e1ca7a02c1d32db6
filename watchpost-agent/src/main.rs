//! Watchpost - liveness monitor entry point
//!
//! Loads the YAML config, then checks every target on a fixed schedule and
//! alerts when one is down. Silent unless `-o` is given; a configuration
//! error always aborts with a non-zero exit code.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;
use watchpost_agent::config::DEFAULT_CONFIG_PATH;
use watchpost_agent::{Monitor, MonitorConfig};

#[derive(Debug, Parser)]
#[command(name = "watchpost", version, about = "Process, TCP and HTTP liveness monitor")]
struct Args {
    /// Config file path
    #[arg(short = 'f', long = "config", env = "WATCHPOST_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Write status lines to the console
    #[arg(short = 'o', long = "output")]
    output: bool,

    /// Validate the config, print the resolved settings and exit
    #[arg(long)]
    check: bool,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("watchpost_agent=info,watchpost=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn print_settings(config: &MonitorConfig) {
    println!("Targets:");
    for target in &config.targets {
        println!("  - {} ({})", target, target.kind());
    }
    println!("ServerNiceName        {}", config.server_nice_name);
    println!("DefaultTTLSeconds     {}", config.default_ttl.as_secs());
    println!("CheckFrequencySeconds {}", config.check_frequency.as_secs());
    println!("CheckTimeoutSeconds   {}", config.check_timeout.as_secs());
    println!("ProcessSource         {:?}", config.process_source);
    match &config.message_bird {
        Some(bird) => {
            println!("MessageBirdSender     {}", bird.sender);
            println!("Recipients            {}", bird.recipients);
            println!("MessageBirdEndpoint   {}", bird.endpoint);
        }
        None => println!("Notifications         log only (no messageBirdToken)"),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Optional .env (e.g. WATCHPOST_CONFIG, RUST_LOG)
    dotenvy::dotenv().ok();

    let args = Args::parse();
    if args.output {
        init_logging();
    }

    let config = MonitorConfig::load(&args.config)
        .await
        .with_context(|| format!("Invalid configuration in {}", args.config.display()))?;

    if args.check {
        print_settings(&config);
        return Ok(());
    }

    info!("Watchpost starting with {}", args.config.display());

    let monitor = Monitor::new(config).context("Failed to create monitor")?;
    monitor
        .run_until(shutdown_signal())
        .await
        .context("Monitor execution failed")?;

    Ok(())
}
