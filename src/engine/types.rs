// src/engine/types.rs
// Value types shared between the batch engine and its consumers

use std::fmt;
use std::time::Duration;

use serde::Serialize;

/// Half-open numeric range `[low, high)` processed as one batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Range {
    pub low: u64,
    pub high: u64,
}

impl Range {
    pub fn len(&self) -> u64 {
        self.high - self.low
    }

    pub fn is_empty(&self) -> bool {
        self.high <= self.low
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.low, self.high)
    }
}

/// Totals for the current run; only the engine mutates these
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunningStats {
    pub total_primes: u64,
    pub max_digit_count: u32,
    pub batch_index: u64,
}

/// Snapshot published once per completed batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchResult {
    pub batch_index: u64,
    pub range: Range,
    pub primes_found_in_batch: u64,
    pub total_primes: u64,
    pub max_digit_count: u32,
    pub batch_duration: Duration,
}

/// Why the engine stopped without an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// A stop was requested through a [`super::StopHandle`]
    Cancelled,
    /// The configured upper bound was reached
    LimitReached,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::LimitReached => write!(f, "limit reached"),
        }
    }
}

/// Engine lifecycle: `Initializing -> Running -> (Stopped | Faulted)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Initializing,
    Running,
    Stopped(StopReason),
    Faulted,
}

/// Outcome of a single [`super::BatchEngine::step`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Batch(BatchResult),
    Stopped(StopReason),
}

/// Final summary returned when a run ends cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineReport {
    pub stats: RunningStats,
    pub reason: StopReason,
    /// First value the next run will test
    pub next_value: u64,
    /// Last value in the store
    pub resume_point: u64,
}
