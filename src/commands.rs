//! Operator commands for the telemetry simulator
//!
//! These are the calls a front end makes: two sliders, the SCRAM button and
//! the read-only views used to draw the dashboard. Slider values are clamped
//! to [0, 100]; once containment lockdown is in effect every mutating command
//! is refused.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::advisory::{Advisory, AdvisoryBridge};
use crate::classifier::{Assessment, StatusBadge};
use crate::error::ControlError;
use crate::escalation::EscalationState;
use crate::history::Channel;
use crate::reactor::{ControlInputs, Reading};
use crate::simulation::{Simulator, TickReport};

/// Simulator handle shared with the command surface
#[derive(Clone)]
pub struct SimulatorState(pub Arc<Simulator>);

/// Controls as shown to the operator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControlsView {
    pub flow_power: f64,
    pub rod_insertion: f64,
    pub scram_active: bool,
    /// False once lockdown has disabled the panel
    pub enabled: bool,
}

/// Response for a simulation step
#[derive(Debug, Clone, Serialize)]
pub struct SimulationResponse {
    pub report: TickReport,
    pub controls: ControlsView,
}

/// One chart dataset
#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub channel: Channel,
    pub label: &'static str,
    pub data: Vec<f64>,
}

/// Chart payload: shared x-axis labels plus one series per channel
#[derive(Debug, Clone, Serialize)]
pub struct ChartData {
    pub labels: Vec<u64>,
    pub series: Vec<ChartSeries>,
}

/// Status panel payload
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub reading: Reading,
    pub assessment: Assessment,
    pub report: String,
    pub badge: StatusBadge,
    pub escalation: EscalationState,
}

fn view(inputs: ControlInputs, escalation: EscalationState) -> ControlsView {
    ControlsView {
        flow_power: inputs.flow_power,
        rod_insertion: inputs.rod_insertion,
        scram_active: inputs.scram,
        enabled: escalation == EscalationState::Monitoring,
    }
}

fn respond(report: TickReport) -> SimulationResponse {
    SimulationResponse {
        controls: view(report.controls, report.escalation),
        report,
    }
}

/// Get current controls
pub fn get_controls(simulator: &SimulatorState) -> ControlsView {
    let (inputs, escalation) = simulator.0.panel();
    view(inputs, escalation)
}

// A mutation only succeeds while the plant is still monitoring, so the
// panel it returns is enabled.

/// Set coolant pump power [%]
pub fn set_flow_power(simulator: &SimulatorState, percent: f64) -> Result<ControlsView, ControlError> {
    let inputs = simulator.0.set_flow_power(percent)?;
    Ok(view(inputs, EscalationState::Monitoring))
}

/// Set control rod insertion [%]
pub fn set_rod_insertion(
    simulator: &SimulatorState,
    percent: f64,
) -> Result<ControlsView, ControlError> {
    let inputs = simulator.0.set_rod_insertion(percent)?;
    Ok(view(inputs, EscalationState::Monitoring))
}

/// Initiate emergency SCRAM
pub fn scram(simulator: &SimulatorState) -> Result<ControlsView, ControlError> {
    let inputs = simulator.0.scram()?;
    Ok(view(inputs, EscalationState::Monitoring))
}

/// Perform one simulation step outside the periodic loop
pub fn simulation_step(simulator: &SimulatorState) -> SimulationResponse {
    respond(simulator.0.tick())
}

/// Run multiple simulation steps
pub fn simulation_run(simulator: &SimulatorState, steps: usize) -> Option<SimulationResponse> {
    let mut last = None;
    for _ in 0..steps {
        last = Some(simulator.0.tick());
    }
    last.map(respond)
}

/// Latest reading
pub fn get_reading(simulator: &SimulatorState) -> Reading {
    simulator.0.latest()
}

/// History in chart form
pub fn get_chart_data(simulator: &SimulatorState) -> ChartData {
    simulator.0.with_history(|history| {
        let matrix = history.as_matrix();
        let series = Channel::ALL
            .iter()
            .enumerate()
            .map(|(col, &channel)| ChartSeries {
                channel,
                label: channel.label(),
                data: matrix.column(col).to_vec(),
            })
            .collect();
        ChartData {
            labels: history.labels(),
            series,
        }
    })
}

/// Status panel: tier, fixed texts, badge, escalation state
pub fn get_status(simulator: &SimulatorState) -> StatusResponse {
    let (reading, escalation) = simulator.0.status();
    let assessment = crate::classifier::classify(&reading);
    StatusResponse {
        reading,
        report: assessment.report(),
        badge: StatusBadge::from(assessment.tier),
        assessment,
        escalation,
    }
}

pub fn escalation_status(simulator: &SimulatorState) -> EscalationState {
    simulator.0.escalation_state()
}

/// Latest advisory text (or the offline message)
pub fn get_advisory(bridge: &AdvisoryBridge) -> Advisory {
    bridge.latest()
}

/// Reset simulation to the baseline plant
pub fn reset_simulation(simulator: &SimulatorState) -> Result<Reading, ControlError> {
    simulator.0.reset()
}
