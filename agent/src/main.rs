//! Site agent - Entry Point
//!
//! `siteagent serve` fronts one site's scheduler with a tenant-checking
//! gateway; `siteagent deploy` drives one deployment record onto its site.

use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use siteagent::app::deploy::run_deployment;
use siteagent::app::options::{AppOptions, DeployerOptions};
use siteagent::app::run::run;
use siteagent::cli::{Cli, Command, DeployArgs};
use siteagent::logs::{init_logging, LogOptions};
use siteagent::storage::settings::Settings;
use siteagent::utils::version_info;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Print version and exit
    if let Command::Version = cli.command {
        return match serde_json::to_string_pretty(&version_info()) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("siteagent: {}", e);
                ExitCode::FAILURE
            }
        };
    }

    let mut settings = match load_settings(cli.config.as_deref()).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("siteagent: {:#}", e);
            return ExitCode::FAILURE;
        }
    };
    cli.logging.apply(&mut settings);

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            None
        }
    };

    let result = match &cli.command {
        Command::Serve(args) => {
            args.apply(&mut settings);
            serve(&settings).await
        }
        Command::Deploy(args) => {
            args.apply(&mut settings);
            deploy(&settings, args).await
        }
        Command::Version => Ok(()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("siteagent: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Ok(Settings::load(path).await?),
        None => Ok(Settings::default()),
    }
}

async fn serve(settings: &Settings) -> anyhow::Result<()> {
    let options = AppOptions::from_settings(settings);
    info!("Running site agent with options: {:?}", options);
    run(options, await_shutdown_signal(), None)
        .await
        .context("site agent failed")
}

async fn deploy(settings: &Settings, args: &DeployArgs) -> anyhow::Result<()> {
    let options =
        DeployerOptions::from_settings(settings, args.namespace.clone(), args.name.clone());

    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        await_shutdown_signal().await;
        token.cancel();
    });

    let report = run_deployment(options, cancel)
        .await
        .with_context(|| format!("deployment {}/{} failed", args.namespace, args.name))?;
    println!("{}", report);
    Ok(())
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(mut sigterm), Ok(mut sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => {
                        info!("SIGTERM received, shutting down...");
                    }
                    _ = sigint.recv() => {
                        info!("SIGINT received, shutting down...");
                    }
                }
            }
            (Err(e), _) | (_, Err(e)) => {
                warn!("Unable to install signal handlers ({}), using Ctrl+C only", e);
                await_ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    await_ctrl_c().await;
}

async fn await_ctrl_c() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Ctrl+C received, shutting down..."),
        Err(e) => {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
