//! Simulation state and the periodic tick loop.
//!
//! `SimulationState` owns everything a tick touches: controls, history,
//! escalation monitor and the physics RNG. `Simulator` puts it behind one
//! mutex so the tick task, the advisory task and operator commands can share
//! it; a tick holds the lock from reading the controls to the escalation
//! check, so it never sees a half-applied operator action.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::advisory::AdvisorySnapshot;
use crate::classifier::{classify, Assessment, StatusBadge};
use crate::clock::Clock;
use crate::config::SimConfig;
use crate::error::ControlError;
use crate::escalation::{EscalationMonitor, EscalationPolicy, EscalationState, LockdownEvent};
use crate::events::{EventBus, SimEvent};
use crate::history::HistoryBuffer;
use crate::reactor::{self, ControlInputs, Controls, Reading};

/// Everything presentation needs to render one tick
#[derive(Debug, Clone, Serialize)]
pub struct TickReport {
    pub reading: Reading,
    pub controls: ControlInputs,
    pub assessment: Assessment,
    pub badge: StatusBadge,
    /// |Δ temperature| against the previous reading
    pub anomaly: f64,
    pub escalation: EscalationState,
    /// True on the tick where an expired SCRAM pulse was released
    pub scram_released: bool,
}

pub struct SimulationState {
    controls: Controls,
    history: HistoryBuffer,
    escalation: EscalationMonitor,
    rng: StdRng,
    scram_window: Duration,
}

impl SimulationState {
    pub fn new(
        history_capacity: usize,
        policy: EscalationPolicy,
        rng: StdRng,
        scram_window: Duration,
    ) -> Self {
        Self {
            controls: Controls::default(),
            history: HistoryBuffer::seeded(history_capacity),
            escalation: EscalationMonitor::new(policy),
            rng,
            scram_window,
        }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(
            config.history_capacity,
            EscalationPolicy::default(),
            rng,
            config.scram_window,
        )
    }

    pub fn controls(&self) -> &Controls {
        &self.controls
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn escalation(&self) -> &EscalationMonitor {
        &self.escalation
    }

    pub fn latest(&self) -> Reading {
        self.history.latest().copied().unwrap_or_else(Reading::baseline)
    }

    /// Run one tick at `now`: controls, physics, history, classifier,
    /// escalation, in that order.
    pub fn tick(&mut self, now: Instant) -> (TickReport, Option<LockdownEvent>) {
        let scram_released = self.controls.release_expired_scram(now);
        let inputs = self.controls.inputs(now);

        let previous = self.latest();
        let reading = reactor::step(&previous, &inputs, &mut self.rng);
        self.history.push(reading);

        let assessment = classify(&reading);
        let lockdown = self.escalation.observe(&reading, now);

        let report = TickReport {
            reading,
            controls: inputs,
            badge: StatusBadge::from(assessment.tier),
            assessment,
            anomaly: reactor::anomaly_score(&previous, &reading),
            escalation: self.escalation.state(),
            scram_released,
        };
        (report, lockdown)
    }

    fn ensure_unlocked(&self) -> Result<(), ControlError> {
        if self.escalation.is_locked_down() {
            return Err(ControlError::LockedDown);
        }
        Ok(())
    }

    pub fn set_flow_power(&mut self, percent: f64) -> Result<(), ControlError> {
        self.ensure_unlocked()?;
        self.controls.set_flow_power(percent);
        Ok(())
    }

    pub fn set_rod_insertion(&mut self, percent: f64) -> Result<(), ControlError> {
        self.ensure_unlocked()?;
        self.controls.set_rod_insertion(percent);
        Ok(())
    }

    pub fn trigger_scram(&mut self, now: Instant) -> Result<(), ControlError> {
        self.ensure_unlocked()?;
        self.controls.trigger_scram(now, self.scram_window);
        Ok(())
    }

    /// Back to the baseline plant with default controls. The sequence keeps
    /// counting up and the escalation monitor is left untouched.
    pub fn reset(&mut self) -> Result<(), ControlError> {
        self.ensure_unlocked()?;
        let next_sequence = self.latest().sequence + 1;
        self.controls = Controls::default();
        self.history.clear();
        self.history.push(Reading {
            sequence: next_sequence,
            ..Reading::baseline()
        });
        Ok(())
    }

    pub fn snapshot(&self, now: Instant) -> AdvisorySnapshot {
        AdvisorySnapshot::new(
            &self.latest(),
            self.history.previous(),
            &self.controls.inputs(now),
        )
    }
}

/// Shared, thread-safe simulation handle
pub struct Simulator {
    state: Mutex<SimulationState>,
    clock: Arc<dyn Clock>,
    events: EventBus,
    snapshot: watch::Sender<AdvisorySnapshot>,
}

impl Simulator {
    pub fn new(state: SimulationState, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        let initial = state.snapshot(clock.now());
        Self {
            state: Mutex::new(state),
            clock,
            events,
            snapshot: watch::channel(initial).0,
        }
    }

    pub fn from_config(config: &SimConfig, clock: Arc<dyn Clock>, events: EventBus) -> Self {
        Self::new(SimulationState::from_config(config), clock, events)
    }

    fn lock(&self) -> MutexGuard<'_, SimulationState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Receiver for the "latest snapshot" cell read by the advisory poller
    pub fn snapshots(&self) -> watch::Receiver<AdvisorySnapshot> {
        self.snapshot.subscribe()
    }

    /// Run one tick and notify presentation
    pub fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let (report, lockdown) = {
            let mut state = self.lock();
            let result = state.tick(now);
            self.snapshot.send_replace(state.snapshot(now));
            result
        };

        if report.scram_released {
            log::info!("SCRAM pulse released at seq {}", report.reading.sequence);
        }
        log::debug!(
            "tick {}: {:.1}°C {:.1} Bar {:.1} μSv/h -> {}",
            report.reading.sequence,
            report.reading.temperature,
            report.reading.pressure,
            report.reading.radiation,
            report.assessment.tier
        );

        self.events.publish(SimEvent::Tick(report.clone()));
        if let Some(event) = lockdown {
            log::error!("{}", event.notice());
            self.events.publish(SimEvent::Lockdown(event));
        }
        report
    }

    /// Apply an operator action under the lock, republish the snapshot and
    /// read the result back before the lock is released
    fn operate<F, R, T>(&self, action: F, read: R) -> Result<T, ControlError>
    where
        F: FnOnce(&mut SimulationState, Instant) -> Result<(), ControlError>,
        R: FnOnce(&SimulationState, Instant) -> T,
    {
        let now = self.clock.now();
        let mut state = self.lock();
        if let Err(err) = action(&mut state, now) {
            log::warn!("operator action rejected: {err}");
            return Err(err);
        }
        self.snapshot.send_replace(state.snapshot(now));
        Ok(read(&state, now))
    }

    fn inputs_of(state: &SimulationState, now: Instant) -> ControlInputs {
        state.controls().inputs(now)
    }

    pub fn set_flow_power(&self, percent: f64) -> Result<ControlInputs, ControlError> {
        self.operate(|state, _| state.set_flow_power(percent), Self::inputs_of)
    }

    pub fn set_rod_insertion(&self, percent: f64) -> Result<ControlInputs, ControlError> {
        self.operate(|state, _| state.set_rod_insertion(percent), Self::inputs_of)
    }

    pub fn scram(&self) -> Result<ControlInputs, ControlError> {
        let inputs = self.operate(|state, now| state.trigger_scram(now), Self::inputs_of)?;
        log::warn!("SCRAM initiated");
        Ok(inputs)
    }

    pub fn reset(&self) -> Result<Reading, ControlError> {
        let reading = self.operate(|state, _| state.reset(), |state, _| state.latest())?;
        log::info!("simulation reset to baseline");
        Ok(reading)
    }

    pub fn controls(&self) -> ControlInputs {
        let now = self.clock.now();
        self.lock().controls().inputs(now)
    }

    /// Current controls and escalation state, read under one lock
    pub fn panel(&self) -> (ControlInputs, EscalationState) {
        let now = self.clock.now();
        let state = self.lock();
        (state.controls().inputs(now), state.escalation().state())
    }

    /// Latest reading and escalation state, read under one lock
    pub fn status(&self) -> (Reading, EscalationState) {
        let state = self.lock();
        (state.latest(), state.escalation().state())
    }

    pub fn latest(&self) -> Reading {
        self.lock().latest()
    }

    pub fn escalation_state(&self) -> EscalationState {
        self.lock().escalation().state()
    }

    pub fn snapshot(&self) -> AdvisorySnapshot {
        let now = self.clock.now();
        self.lock().snapshot(now)
    }

    /// Run `f` against the history without copying it out
    pub fn with_history<T>(&self, f: impl FnOnce(&HistoryBuffer) -> T) -> T {
        f(self.lock().history())
    }
}

/// Tick every `period` until cancelled. The first tick fires one period
/// after start.
pub async fn run_simulation(sim: Arc<Simulator>, period: Duration, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                sim.tick();
            }
        }
    }
    log::info!("simulation loop stopped");
}
