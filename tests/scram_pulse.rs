use std::sync::Arc;
use std::time::Duration;

use reactor_telemetry_lib::clock::SystemClock;
use reactor_telemetry_lib::commands::{self, SimulatorState};
use reactor_telemetry_lib::events::EventBus;
use reactor_telemetry_lib::reactor::constants::SCRAM_RISE;
use reactor_telemetry_lib::{SimConfig, Simulator};

#[tokio::test(start_paused = true)]
async fn scram_reverts_after_window() {
    let config = SimConfig {
        seed: Some(3),
        ..SimConfig::default()
    };
    let sim = Arc::new(Simulator::from_config(&config, Arc::new(SystemClock), EventBus::default()));
    let handle = SimulatorState(sim.clone());

    commands::set_flow_power(&handle, 20.0).unwrap();
    commands::set_rod_insertion(&handle, 10.0).unwrap();
    let warm = commands::simulation_step(&handle).report.reading;

    let view = commands::scram(&handle).unwrap();
    assert!(view.scram_active);
    assert_eq!((view.flow_power, view.rod_insertion), (100.0, 100.0));

    let cooled = commands::simulation_step(&handle).report;
    assert!(cooled.controls.scram);
    let expected = warm.temperature + SCRAM_RISE * 0.25;
    assert!((cooled.reading.temperature - expected).abs() <= 0.5);

    tokio::time::sleep(Duration::from_secs(5)).await;
    // No operator input and no tick needed for the latch to drop
    assert!(!commands::get_controls(&handle).scram_active);

    let after = commands::simulation_step(&handle).report;
    assert!(!after.controls.scram);
    assert_eq!(after.controls.flow_power, 100.0);
    assert_eq!(after.controls.rod_insertion, 100.0);

    // Sliders are back under operator control
    let view = commands::set_flow_power(&handle, 60.0).unwrap();
    assert_eq!(view.flow_power, 60.0);
}
