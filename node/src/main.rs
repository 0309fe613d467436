// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Banklink Node
//!
//! Entry point for the `banklink-node` binary: loads the bank settings,
//! opens the record store and serves the HTTP API.
//!
//! Subcommands:
//!
//! - `serve`       : run the HTTP host
//! - `check-config`: validate settings and keys, list the banks
//! - `reference`   : print a 7-3-1 reference number
//! - `version`     : print build version information

mod api;
mod cli;
mod logging;
mod metrics;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;

use banklink::checksum::reference_number;
use banklink::config::{IPIZZA_VERSION, NORDEA_VERSION};
use banklink::storage::SledStore;
use banklink::{BankConfigRegistry, Gateway};

use cli::{BanklinkNodeCli, Commands};
use logging::LogFormat;
use metrics::NodeMetrics;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BanklinkNodeCli::parse();

    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::CheckConfig(args) => check_config(args),
        Commands::Reference(args) => print_reference(args.number),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Runs the HTTP host until SIGINT or SIGTERM.
async fn serve(args: cli::ServeArgs) -> Result<()> {
    logging::init_logging(logging::DEFAULT_FILTER, args.log_format);

    tracing::info!(
        port = args.port,
        config = %args.config.display(),
        data_dir = %args.data_dir.display(),
        in_memory = args.in_memory,
        "starting banklink-node"
    );

    let gateway = build_gateway(&args.config, &args.data_dir, args.in_memory)?;
    gateway
        .preload_keys()
        .context("failed to load bank keys")?;

    let node_metrics = Arc::new(NodeMetrics::new().context("failed to register metrics")?);
    gateway.notifications().subscribe(node_metrics.clone());

    let base_url = args
        .base_url
        .unwrap_or_else(|| format!("http://127.0.0.1:{}", args.port));
    let app_state = api::AppState {
        gateway,
        metrics: node_metrics,
        base_url: base_url.clone(),
    };

    let router = api::create_router(app_state);
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", addr))?;
    tracing::info!(%base_url, "listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    tracing::info!("banklink-node stopped");
    Ok(())
}

/// Loads the registry and wires it to a sled store under `data_dir`, or to
/// memory when `in_memory` is set.
fn build_gateway(config: &Path, data_dir: &Path, in_memory: bool) -> Result<Gateway> {
    let registry = Arc::new(
        BankConfigRegistry::from_file(config)
            .with_context(|| format!("invalid bank settings in {}", config.display()))?,
    );
    tracing::info!(banks = registry.len(), "bank settings loaded");

    if in_memory {
        tracing::warn!("records are kept in memory and lost on exit");
        return Ok(Gateway::in_memory(registry));
    }

    let db_path = data_dir.join("db");
    std::fs::create_dir_all(&db_path)
        .with_context(|| format!("failed to create database directory: {}", db_path.display()))?;
    let store = SledStore::open(&db_path)
        .with_context(|| format!("failed to open database at {}", db_path.display()))?;
    tracing::info!(path = %db_path.display(), "database opened");

    Ok(Gateway::with_sled(registry, store))
}

/// Loads settings and keys without serving anything.
fn check_config(args: cli::CheckConfigArgs) -> Result<()> {
    logging::init_logging("warn", LogFormat::Pretty);

    let registry = Arc::new(
        BankConfigRegistry::from_file(&args.config)
            .with_context(|| format!("invalid bank settings in {}", args.config.display()))?,
    );
    let keys = Gateway::in_memory(registry.clone())
        .preload_keys()
        .context("failed to load bank keys")?;

    println!("Settings OK: {} banks, {} keys.", registry.len(), keys);
    for bank in registry.banks() {
        println!(
            "  {:<16} {:<8} order {:<4} {}",
            bank.name, bank.protocol, bank.order, bank.request_url
        );
    }
    Ok(())
}

fn print_reference(number: u64) -> Result<()> {
    match reference_number(number) {
        Some(reference) => {
            println!("{}", reference);
            Ok(())
        }
        None => bail!("{} is too large for a reference number", number),
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("banklink-node {}", env!("CARGO_PKG_VERSION"));
    println!("ipizza        {}", IPIZZA_VERSION);
    println!("nordea        {}", NORDEA_VERSION);
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../protocol/tests/fixtures")
            .join(name)
    }

    fn write_settings(dir: &Path) -> PathBuf {
        let settings = format!(
            r#"
[banks.swedbank]
request_url = "https://banklink.example/swedbank"
client_id = "uid100052"
bank_id = "HP"
private_key = "{}"
public_key = "{}"
"#,
            fixture("merchant_key.pem").display(),
            fixture("bank_pub.pem").display(),
        );
        let path = dir.join("banks.toml");
        std::fs::write(&path, settings).unwrap();
        path
    }

    #[test]
    fn gateway_opens_sled_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_settings(dir.path());

        let gateway = build_gateway(&config, &dir.path().join("data"), false).unwrap();
        assert_eq!(gateway.registry().len(), 1);
        assert_eq!(gateway.preload_keys().unwrap(), 1);
        assert!(dir.path().join("data").join("db").is_dir());
    }

    #[test]
    fn in_memory_gateway_skips_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let config = write_settings(dir.path());

        build_gateway(&config, &dir.path().join("data"), true).unwrap();
        assert!(!dir.path().join("data").exists());
    }

    #[test]
    fn broken_settings_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("banks.toml");
        std::fs::write(&config, "[banks.swedbank]\nclient_id = \"x\"\n").unwrap();

        let err = build_gateway(&config, dir.path(), true).unwrap_err();
        assert!(err.to_string().contains("invalid bank settings"));
    }

    #[test]
    fn reference_numbers() {
        assert!(print_reference(100052).is_ok());
        assert!(print_reference(u64::MAX).is_err());
    }
}
