//! Command-line front end for cofacade.

use anyhow::Context;
use clap::Parser;
use clap::Subcommand;
use cofacade_core::Config;
use cofacade_core::CoroutineFacade;
use cofacade_core::CoroutineId;
use cofacade_core::FailureReporter;
use cofacade_core::WatcherConfig;
use std::path::PathBuf;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Parser)]
#[command(name = "cofacade", version, about = "Coroutine facade utilities")]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long, short = 'c', default_value = "cofacade.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the resolved file-watcher configuration as JSON.
    WatchConfig,
    /// Run one coroutine through the facade and report what happened.
    Smoke {
        /// Make the coroutine fail after its cleanup is registered.
        #[arg(long)]
        fail: bool,
    },
}

/// Outcome of the smoke scenario.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmokeReport {
    pub id: CoroutineId,
    pub parent: CoroutineId,
    pub cleanup_ran: bool,
}

pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}

pub fn watch_config_json(watcher: &WatcherConfig) -> anyhow::Result<String> {
    serde_json::to_string_pretty(watcher).context("failed to serialize watcher config")
}

/// Spawns a coroutine that defers a cleanup, sleeps briefly and optionally
/// fails, then waits for the cleanup to run.
pub async fn smoke(config: &Config, fail: bool) -> anyhow::Result<SmokeReport> {
    let engine = config.engine.build(Handle::current());
    let facade = CoroutineFacade::new(engine).with_reporter(FailureReporter::tracing());

    let (started_tx, started_rx) = oneshot::channel();
    let (cleanup_tx, cleanup_rx) = oneshot::channel::<()>();
    let inner = facade.clone();
    let id = facade.create(async move {
        inner.defer(move || {
            tracing::info!("cleanup running");
            let _ = cleanup_tx.send(());
            Ok(())
        })?;
        let _ = started_tx.send(inner.parent_id(None)?);
        inner.sleep(0.01).await;
        if fail {
            anyhow::bail!("smoke coroutine failed on purpose");
        }
        Ok(())
    });
    if id == CoroutineId::NONE {
        anyhow::bail!("engine refused to create the smoke coroutine");
    }
    tracing::info!(coroutine = %id, "smoke coroutine created");

    let parent = started_rx
        .await
        .context("smoke coroutine exited before reporting its parent")?;
    let cleanup_ran = cleanup_rx.await.is_ok();
    Ok(SmokeReport {
        id,
        parent,
        cleanup_ran,
    })
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load(&cli.config)?;
    match cli.command {
        Command::WatchConfig => {
            println!("{}", watch_config_json(&config.watcher)?);
        }
        Command::Smoke { fail } => {
            let report = smoke(&config, fail).await?;
            println!(
                "coroutine {} (parent {}) finished, cleanup ran: {}",
                report.id, report.parent, report.cleanup_ran
            );
        }
    }
    Ok(())
}
