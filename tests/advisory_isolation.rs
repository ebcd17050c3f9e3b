use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use httpmock::prelude::*;
use reactor_telemetry_lib::advisory::{
    run_advisory, AdvisoryBridge, AdvisoryService, AdvisorySnapshot, Envelope, HttpAdvisoryClient,
};
use reactor_telemetry_lib::clock::SystemClock;
use reactor_telemetry_lib::commands;
use reactor_telemetry_lib::error::AdvisoryError;
use reactor_telemetry_lib::events::EventBus;
use reactor_telemetry_lib::{run_simulation, SimConfig, Simulator, OFFLINE_ADVISORY};
use tokio_util::sync::CancellationToken;

/// Service that never answers
struct BlackHole;

#[async_trait]
impl AdvisoryService for BlackHole {
    async fn request_advisory(&self, _: &AdvisorySnapshot) -> Result<String, AdvisoryError> {
        std::future::pending().await
    }
}

fn simulator(events: EventBus) -> Arc<Simulator> {
    let config = SimConfig {
        seed: Some(77),
        ..SimConfig::default()
    };
    Arc::new(Simulator::from_config(&config, Arc::new(SystemClock), events))
}

#[tokio::test(start_paused = true)]
async fn hung_advisory_does_not_stall_ticks() {
    let events = EventBus::default();
    let sim = simulator(events.clone());
    let bridge = Arc::new(AdvisoryBridge::new(
        Arc::new(BlackHole),
        Duration::from_secs(4),
        events,
    ));

    let cancel = CancellationToken::new();
    let ticker = tokio::spawn(run_simulation(sim.clone(), Duration::from_secs(1), cancel.clone()));
    let advisor = tokio::spawn(run_advisory(
        bridge.clone(),
        sim.snapshots(),
        Duration::from_secs(10),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(12_500)).await;
    cancel.cancel();
    ticker.await.unwrap();
    advisor.await.unwrap();

    assert_eq!(sim.latest().sequence, 12);
    let advisory = commands::get_advisory(&bridge);
    assert!(advisory.offline);
    assert_eq!(advisory.text, OFFLINE_ADVISORY);
}

#[tokio::test]
async fn http_500_keeps_simulation_on_schedule() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/ai");
            then.status(500)
                .json_body(serde_json::json!({ "error": { "message": "Gemini backend failed" } }));
        })
        .await;

    let events = EventBus::default();
    let sim = simulator(events.clone());
    let client = HttpAdvisoryClient::new(server.url("/ai"), Envelope::Gemini, Duration::from_secs(2));
    let bridge = Arc::new(AdvisoryBridge::new(Arc::new(client), Duration::from_secs(2), events));

    let cancel = CancellationToken::new();
    let ticker = tokio::spawn(run_simulation(sim.clone(), Duration::from_millis(50), cancel.clone()));
    let advisor = tokio::spawn(run_advisory(
        bridge.clone(),
        sim.snapshots(),
        Duration::from_millis(100),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(600)).await;
    cancel.cancel();
    ticker.await.unwrap();
    advisor.await.unwrap();

    assert!(mock.hits_async().await >= 1);
    assert!(bridge.latest().offline);
    // ~11 ticks expected; leave slack for a loaded machine
    assert!(sim.latest().sequence >= 5, "only {} ticks", sim.latest().sequence);
}

#[tokio::test]
async fn advisory_text_reaches_presentation_only() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/ai");
            then.status(200).json_body(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "Insert rods to 60%." }] } }]
            }));
        })
        .await;

    let events = EventBus::default();
    let sim = simulator(events.clone());
    sim.tick();
    let before = commands::get_status(&commands::SimulatorState(sim.clone()));

    let client = HttpAdvisoryClient::new(server.url("/ai"), Envelope::Gemini, Duration::from_secs(2));
    let bridge = AdvisoryBridge::new(Arc::new(client), Duration::from_secs(2), events);
    let advisory = bridge.poll_once(&sim.snapshot()).await;

    assert!(!advisory.offline);
    assert_eq!(advisory.text, "Insert rods to 60%.");
    let after = commands::get_status(&commands::SimulatorState(sim.clone()));
    assert_eq!(before.assessment, after.assessment);
    assert_eq!(before.escalation, after.escalation);
}
