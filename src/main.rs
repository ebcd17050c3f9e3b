//! Reactor Telemetry Simulator - Main Entry Point
//!
//! Runs the tick loop and the advisory poller until Ctrl-C, logging what a
//! dashboard would render.

use std::sync::Arc;

use reactor_telemetry_lib::advisory::{run_advisory, AdvisoryBridge, HttpAdvisoryClient};
use reactor_telemetry_lib::clock::SystemClock;
use reactor_telemetry_lib::events::{EventBus, SimEvent};
use reactor_telemetry_lib::{run_simulation, SimConfig, Simulator};
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = SimConfig::from_env()?;
    log::info!(
        "starting: tick {:?}, history {}, advisory every {:?}",
        config.tick_period,
        config.history_capacity,
        config.advisory.interval
    );

    let events = EventBus::default();
    let simulator = Arc::new(Simulator::from_config(&config, Arc::new(SystemClock), events.clone()));

    let bridge = match &config.advisory.url {
        Some(url) => {
            let mut client =
                HttpAdvisoryClient::new(url.clone(), config.advisory.envelope, config.advisory.timeout);
            if let Some(key) = &config.advisory.api_key {
                client = client.with_api_key(key.clone());
            }
            log::info!("advisory endpoint {} ({} envelope)", client.url(), config.advisory.envelope);
            AdvisoryBridge::new(Arc::new(client), config.advisory.timeout, events.clone())
        }
        None => {
            log::warn!("ADVISORY_URL not set, advisory will stay offline");
            AdvisoryBridge::disconnected(events.clone())
        }
    };
    let bridge = Arc::new(bridge);

    let cancel = CancellationToken::new();
    let presenter = tokio::spawn(present(events.clone(), cancel.clone()));
    let ticker = tokio::spawn(run_simulation(simulator.clone(), config.tick_period, cancel.clone()));
    let advisor = tokio::spawn(run_advisory(
        bridge,
        simulator.snapshots(),
        config.advisory.interval,
        cancel.clone(),
    ));

    tokio::signal::ctrl_c().await?;
    log::info!("shutting down");
    cancel.cancel();

    ticker.await?;
    advisor.await?;
    presenter.await?;
    Ok(())
}

/// Console stand-in for the dashboard
async fn present(events: EventBus, cancel: CancellationToken) {
    let mut rx = events.subscribe();
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => event,
        };
        match event {
            Ok(SimEvent::Tick(report)) => {
                let r = &report.reading;
                log::info!(
                    "[{}] T {:.1}°C  P {:.1} Bar  Flux {:.1} μSv/h  Air {:.1} kPa  Flow {:.1} m³/s  Δ {:.2}  {}",
                    r.sequence,
                    r.temperature,
                    r.pressure,
                    r.radiation,
                    r.air,
                    r.coolant_flow,
                    report.anomaly,
                    report.badge.text
                );
            }
            Ok(SimEvent::Lockdown(event)) => log::error!("{}", event.notice()),
            Ok(SimEvent::Advisory { text, offline }) => {
                if offline {
                    log::warn!("advisory: {text}");
                } else {
                    log::info!("advisory: {text}");
                }
            }
            Err(RecvError::Lagged(skipped)) => log::debug!("presenter skipped {skipped} events"),
            Err(RecvError::Closed) => break,
        }
    }
}
