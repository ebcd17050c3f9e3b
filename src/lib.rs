//! Reactor Telemetry Simulator Library
//!
//! A coarse reactor physics approximation driving bounded telemetry history,
//! a three-tier severity classifier and a sustained hyper-critical lockdown,
//! with an optional advisory bridge to an external text-generation service.

pub mod advisory;
pub mod classifier;
pub mod clock;
pub mod commands;
pub mod config;
pub mod error;
pub mod escalation;
pub mod events;
pub mod history;
pub mod reactor;
pub mod simulation;

pub use advisory::{AdvisoryBridge, AdvisorySnapshot, HttpAdvisoryClient, OFFLINE_ADVISORY};
pub use classifier::{classify, Assessment, SeverityTier};
pub use commands::SimulatorState;
pub use config::SimConfig;
pub use escalation::{EscalationMonitor, EscalationState};
pub use history::HistoryBuffer;
pub use reactor::{Controls, Reading};
pub use simulation::{run_simulation, SimulationState, Simulator, TickReport};
