use std::error::Error;
use tokio::io::AsyncReadExt;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use obsquery::config::Config;
use obsquery::metrics;
use obsquery::query::{ExecutionConfig, ObsRequest, QueryExecutor};
use obsquery::storage::postgres::PgRowSource;

/// Reads the request from the file named by the first argument, or from stdin
async fn read_request() -> Result<ObsRequest, Box<dyn Error>> {
    let raw = match std::env::args().nth(1) {
        Some(path) => tokio::fs::read_to_string(&path).await?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin().read_to_string(&mut raw).await?;
            raw
        }
    };
    Ok(serde_json::from_str(&raw)?)
}

async fn run() -> Result<(), Box<dyn Error>> {
    let config = Config::from_env()?;

    if let Some(addr) = config.metrics_addr {
        if let Err(e) = metrics::init_metrics(addr) {
            error!("Failed to initialize metrics: {}", e);
        } else {
            info!("Metrics server listening on {}", addr);
        }
    }

    let request = read_request().await?;
    let store = PgRowSource::connect(config.connect_options.clone(), config.max_connections).await?;
    let executor = QueryExecutor::new(
        store,
        ExecutionConfig {
            valid_time: config.valid_time,
        },
    );

    let response = executor.execute(&request).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    // stdout carries the response
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_ansi(false)
        .init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}
