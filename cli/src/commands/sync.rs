use std::path::Path;

use anyhow::{Context, Result};

use weightsync_core::schedule::{Schedule, SystemClock, ThreadSleeper};
use weightsync_core::sync::{SyncMode, SyncService, SyncSettings};

use crate::config::{Config, Credentials};
use crate::garmin::GarminClient;

type GarminSync = SyncService<GarminClient, SystemClock, ThreadSleeper>;

/// Credentials are checked before anything touches the network or the store.
fn build_service(config: &Config, rt: &tokio::runtime::Runtime) -> Result<GarminSync> {
    let credentials = Credentials::from_env()?;
    tracing::debug!(?credentials, "loaded credentials");
    let client = GarminClient::new(
        credentials,
        rt.handle().clone(),
        Some(config.session_path.clone()),
    )?;
    Ok(SyncService::new(
        client,
        SystemClock,
        ThreadSleeper,
        SyncSettings::default(),
    ))
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}

pub(crate) fn cmd_sync(config: &Config, mode: SyncMode) -> Result<()> {
    let rt = runtime()?;
    let mut service = build_service(config, &rt)?;
    let report = run_once(&mut service, mode, &config.db_path)?;
    println!("{}", report.summary());
    Ok(())
}

fn run_once(
    service: &mut GarminSync,
    mode: SyncMode,
    db_path: &Path,
) -> Result<weightsync_core::models::SyncReport> {
    service
        .run_pass(mode, db_path)
        .with_context(|| format!("Sync into {} failed", db_path.display()))
}

pub(crate) fn cmd_schedule(config: &Config, schedule: Schedule) -> Result<()> {
    let rt = runtime()?;
    let mut service = build_service(config, &rt)?;
    println!(
        "Syncing the last {} days every day at {}",
        schedule.lookback_days,
        schedule.at.format("%H:%M")
    );
    service.run_schedule(&schedule, &config.db_path, |result| match result {
        Ok(report) => println!("{}", report.summary()),
        Err(e) => eprintln!("Sync failed: {e}"),
    })
}
