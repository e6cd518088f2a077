use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{info, warn};

use dispenser_agent::{
    AgentSettings, Database, DispenserClient, LogNotifier, MonitorController, ScheduleMonitor,
};

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = std::env::var("DISPENSER_AGENT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("dispenser-agent.json"));
    let settings = AgentSettings::load(&config_path)
        .with_context(|| format!("failed to load settings from {}", config_path.display()))?;

    let db = Database::new(settings.db_path())?;
    let client = DispenserClient::new(&settings.device_url, settings.fetch_timeout())?;

    match client.device_info().await {
        Ok(device) => info!(
            "connected to {} at {} (firmware {})",
            device.name, device.ip_address, device.firmware_version
        ),
        Err(err) => warn!("device not reachable yet, polling will retry: {err}"),
    }

    let monitor = Arc::new(ScheduleMonitor::new(
        Arc::new(client),
        Arc::new(LogNotifier),
        db,
        settings.timezone(),
        settings.medicine_names.clone(),
    ));

    let mut controller = MonitorController::new();
    controller.start(monitor, settings.poll_interval())?;
    info!(
        "polling {} every {}s",
        settings.device_url, settings.poll_interval_secs
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown requested");
    controller.stop().await?;

    Ok(())
}
