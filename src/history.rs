//! Bounded telemetry history feeding the charts.

use ndarray::Array2;
use serde::Serialize;
use std::collections::VecDeque;

use crate::reactor::Reading;

/// Default number of ticks kept for charting
pub const DEFAULT_CAPACITY: usize = 30;
/// Largest window a buffer will hold
pub const MAX_CAPACITY: usize = 10_000;

/// Chart channels in matrix column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Temperature,
    Pressure,
    Radiation,
    Air,
    CoolantFlow,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::Temperature,
        Channel::Pressure,
        Channel::Radiation,
        Channel::Air,
        Channel::CoolantFlow,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Channel::Temperature => "Temp (°C)",
            Channel::Pressure => "Pressure (Bar)",
            Channel::Radiation => "Neutron Flux (μSv/h)",
            Channel::Air => "Containment Pressure (kPa)",
            Channel::CoolantFlow => "Flow Rate (m³/s)",
        }
    }

    pub fn value(self, reading: &Reading) -> f64 {
        match self {
            Channel::Temperature => reading.temperature,
            Channel::Pressure => reading.pressure,
            Channel::Radiation => reading.radiation,
            Channel::Air => reading.air,
            Channel::CoolantFlow => reading.coolant_flow,
        }
    }
}

/// Sliding window over the most recent readings.
///
/// Appending past capacity evicts the oldest entry, so iteration always
/// yields the newest `capacity` readings oldest-first.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl HistoryBuffer {
    /// Capacity is clamped to [1, `MAX_CAPACITY`]; the lower bound keeps the
    /// latest reading available.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Buffer seeded with the plant baseline
    pub fn seeded(capacity: usize) -> Self {
        let mut buffer = Self::new(capacity);
        buffer.push(Reading::baseline());
        buffer
    }

    pub fn push(&mut self, reading: Reading) {
        self.readings.push_back(reading);
        while self.readings.len() > self.capacity {
            self.readings.pop_front();
        }
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// The reading before the latest one, if any
    pub fn previous(&self) -> Option<&Reading> {
        let len = self.readings.len();
        if len < 2 {
            return None;
        }
        self.readings.get(len - 2)
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.readings.clear();
    }

    /// Sequence numbers, used as chart x-axis labels
    pub fn labels(&self) -> Vec<u64> {
        self.readings.iter().map(|r| r.sequence).collect()
    }

    pub fn series(&self, channel: Channel) -> Vec<f64> {
        self.readings.iter().map(|r| channel.value(r)).collect()
    }

    /// All channels as a (ticks x channels) matrix, columns in `Channel::ALL` order
    pub fn as_matrix(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.readings.len(), Channel::ALL.len()), |(row, col)| {
            Channel::ALL[col].value(&self.readings[row])
        })
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::seeded(DEFAULT_CAPACITY)
    }
}
