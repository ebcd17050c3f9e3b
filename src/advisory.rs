//! Advisory bridge to the external text-generation service.
//!
//! The advisory is an annotation for the operator and nothing else: the
//! classifier and the escalation monitor never see it. Every failure mode of
//! the service collapses into the fixed offline message, and the poller runs
//! on its own task so a slow request cannot hold up a tick.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::error::AdvisoryError;
use crate::events::{EventBus, SimEvent};
use crate::reactor::{ControlInputs, Reading};

/// Shown whenever the advisory service cannot be reached or answers garbage
pub const OFFLINE_ADVISORY: &str =
    "AI CO-PILOT OFFLINE: advisory service unreachable. Rely on instrument readings and standard procedures.";

/// Latest readings and controls, as sent to the advisory service
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdvisorySnapshot {
    pub temperature: f64,
    pub pressure: f64,
    pub radiation: f64,
    pub air: f64,
    pub coolant_flow: f64,
    pub flow_power: f64,
    pub rod_insertion: f64,
    pub scrammed: bool,
    /// Core temperature change over the last tick [°C/tick]
    pub temperature_slope: f64,
}

impl AdvisorySnapshot {
    pub fn new(latest: &Reading, previous: Option<&Reading>, controls: &ControlInputs) -> Self {
        Self {
            temperature: latest.temperature,
            pressure: latest.pressure,
            radiation: latest.radiation,
            air: latest.air,
            coolant_flow: latest.coolant_flow,
            flow_power: controls.flow_power,
            rod_insertion: controls.rod_insertion,
            scrammed: controls.scram,
            temperature_slope: previous.map_or(0.0, |p| latest.temperature - p.temperature),
        }
    }

    /// Natural-language prompt embedding every snapshot field
    pub fn prompt(&self) -> String {
        format!(
            "Reactor telemetry: core {:.1}°C, primary pressure {:.1} Bar, neutron flux {:.1} μSv/h, \
             containment {:.1} kPa, coolant flow {:.1} m³/s. Pump power {:.0}%, rod insertion {:.0}%, \
             SCRAM {}. Core temperature trend {:+.2}°C per tick. \
             Provide one concise technical instruction for the operator.",
            self.temperature,
            self.pressure,
            self.radiation,
            self.air,
            self.coolant_flow,
            self.flow_power,
            self.rod_insertion,
            if self.scrammed { "active" } else { "inactive" },
            self.temperature_slope,
        )
    }
}

impl Default for AdvisorySnapshot {
    fn default() -> Self {
        Self::new(
            &Reading::baseline(),
            None,
            &ControlInputs {
                flow_power: crate::reactor::constants::BALANCED_FLOW_PERCENT,
                rod_insertion: crate::reactor::constants::BALANCED_ROD_PERCENT,
                scram: false,
            },
        )
    }
}

/// Request body shape expected by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Envelope {
    /// Snapshot fields as a flat JSON object
    Raw,
    /// `generateContent` style: `{"contents":[{"parts":[{"text": prompt}]}]}`
    Gemini,
}

impl Envelope {
    pub fn body(self, snapshot: &AdvisorySnapshot) -> Value {
        match self {
            Envelope::Raw => json!(snapshot),
            Envelope::Gemini => json!({
                "contents": [{ "parts": [{ "text": snapshot.prompt() }] }]
            }),
        }
    }
}

impl FromStr for Envelope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "raw" => Ok(Envelope::Raw),
            "gemini" => Ok(Envelope::Gemini),
            other => Err(format!("unknown envelope {other:?}, expected raw or gemini")),
        }
    }
}

impl fmt::Display for Envelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Envelope::Raw => f.write_str("raw"),
            Envelope::Gemini => f.write_str("gemini"),
        }
    }
}

/// Opaque text-in/text-out oracle
#[async_trait]
pub trait AdvisoryService: Send + Sync + 'static {
    async fn request_advisory(&self, snapshot: &AdvisorySnapshot) -> Result<String, AdvisoryError>;
}

/// Pull the advisory text out of a service response.
///
/// Accepts `{"analysis": ..}`, `{"text": ..}` and the `generateContent`
/// candidate layout. A non-success status, an empty body, invalid JSON, an
/// `{"error": ..}` envelope or a missing/blank text are all failures.
pub fn parse_response(status: u16, body: &str) -> Result<String, AdvisoryError> {
    if !(200..300).contains(&status) {
        log::debug!("advisory error body: {}", body.trim());
        return Err(AdvisoryError::Status(status));
    }
    if body.trim().is_empty() {
        return Err(AdvisoryError::EmptyBody);
    }

    let value: Value = serde_json::from_str(body).map_err(AdvisoryError::malformed)?;

    if let Some(err) = value.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(AdvisoryError::Service(message));
    }

    let text = value
        .get("analysis")
        .and_then(Value::as_str)
        .or_else(|| value.get("text").and_then(Value::as_str))
        .or_else(|| value.pointer("/candidates/0/content/parts/0/text").and_then(Value::as_str))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AdvisoryError::MissingText)?;

    Ok(text.to_string())
}

/// HTTP implementation of [`AdvisoryService`]
#[derive(Debug, Clone)]
pub struct HttpAdvisoryClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    envelope: Envelope,
    timeout: Duration,
}

impl HttpAdvisoryClient {
    pub fn new(url: impl Into<String>, envelope: Envelope, timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            api_key: None,
            envelope,
            timeout,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AdvisoryService for HttpAdvisoryClient {
    async fn request_advisory(&self, snapshot: &AdvisorySnapshot) -> Result<String, AdvisoryError> {
        let mut request = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .json(&self.envelope.body(snapshot));
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }

        let response = request.send().await.map_err(|e| self.map_error(e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| self.map_error(e))?;
        parse_response(status, &body)
    }
}

impl HttpAdvisoryClient {
    fn map_error(&self, err: reqwest::Error) -> AdvisoryError {
        if err.is_timeout() {
            AdvisoryError::Timeout(self.timeout.as_millis() as u64)
        } else {
            AdvisoryError::from(err)
        }
    }
}

/// Latest advisory text and whether it is the offline fallback
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Advisory {
    pub text: String,
    pub offline: bool,
}

impl Advisory {
    pub fn offline() -> Self {
        Self {
            text: OFFLINE_ADVISORY.to_string(),
            offline: true,
        }
    }
}

/// Polls the advisory service and publishes the result.
///
/// Writes go to a dedicated "latest advisory" cell that only presentation
/// reads.
pub struct AdvisoryBridge {
    service: Option<Arc<dyn AdvisoryService>>,
    timeout: Duration,
    latest: watch::Sender<Advisory>,
    events: EventBus,
}

impl AdvisoryBridge {
    pub fn new(service: Arc<dyn AdvisoryService>, timeout: Duration, events: EventBus) -> Self {
        Self {
            service: Some(service),
            timeout,
            latest: watch::channel(Advisory::offline()).0,
            events,
        }
    }

    /// Bridge with no service behind it; every poll yields the offline text
    pub fn disconnected(events: EventBus) -> Self {
        Self {
            service: None,
            timeout: Duration::ZERO,
            latest: watch::channel(Advisory::offline()).0,
            events,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<Advisory> {
        self.latest.subscribe()
    }

    pub fn latest(&self) -> Advisory {
        self.latest.borrow().clone()
    }

    async fn fetch(&self, snapshot: &AdvisorySnapshot) -> Result<String, AdvisoryError> {
        let service = self.service.as_ref().ok_or(AdvisoryError::NotConfigured)?;
        match tokio::time::timeout(self.timeout, service.request_advisory(snapshot)).await {
            Ok(result) => result,
            Err(_) => Err(AdvisoryError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// One request. Never fails: errors are logged and replaced by the
    /// offline message.
    pub async fn poll_once(&self, snapshot: &AdvisorySnapshot) -> Advisory {
        let advisory = match self.fetch(snapshot).await {
            Ok(text) => {
                log::debug!("advisory received ({} chars)", text.len());
                Advisory { text, offline: false }
            }
            Err(AdvisoryError::NotConfigured) => Advisory::offline(),
            Err(err) => {
                log::warn!("advisory request failed: {err}");
                Advisory::offline()
            }
        };

        self.latest.send_replace(advisory.clone());
        self.events.publish(SimEvent::Advisory {
            text: advisory.text.clone(),
            offline: advisory.offline,
        });
        advisory
    }
}

/// Poll immediately, then every `period`, until cancelled.
///
/// Reads the latest snapshot from the simulation's watch cell at each poll.
pub async fn run_advisory(
    bridge: Arc<AdvisoryBridge>,
    snapshots: watch::Receiver<AdvisorySnapshot>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let snapshot = *snapshots.borrow();
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = bridge.poll_once(&snapshot) => {}
        }
    }
    log::info!("advisory poller stopped");
}
