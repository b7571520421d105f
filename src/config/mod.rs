// src/config/mod.rs
// Run configuration: defaults, then environment, then command-line flags

pub mod env;

use std::path::PathBuf;

use crate::error::{PrimeError, Result};
use crate::events::MAX_CAPACITY;
pub use env::EnvOverrides;

pub const DEFAULT_BATCH_SIZE: u64 = 1_000_000;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
pub const DEFAULT_STORE_PATH: &str = "primes.txt";
pub const DEFAULT_REPORT_EVERY: u64 = 1;

/// Batches above this allocate more than ~1 GiB of markers per batch
const LARGE_BATCH_WARNING: u64 = 1 << 30;

/// One marker byte per number; past this a batch needs over 16 GiB
pub const MAX_BATCH_SIZE: u64 = 1 << 34;

/// Everything needed to start a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunConfig {
    /// Width of each `[low, high)` range
    pub batch_size: u64,
    /// Exclusive upper bound; `None` runs until stopped
    pub limit: Option<u64>,
    /// Path of the append-only prime log
    pub store_path: PathBuf,
    /// Events buffered per subscriber before the oldest are dropped
    pub channel_capacity: usize,
    /// Progress reporter logs every Nth batch
    pub report_every: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            limit: None,
            store_path: PathBuf::from(DEFAULT_STORE_PATH),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            report_every: DEFAULT_REPORT_EVERY,
        }
    }
}

impl RunConfig {
    /// Defaults overlaid with `PRIMERUN_*` environment variables
    pub fn from_env() -> Self {
        Self::default().apply(EnvOverrides::from_env())
    }

    /// Overlay every value that is set in `overrides`
    pub fn apply(mut self, overrides: EnvOverrides) -> Self {
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if overrides.limit.is_some() {
            self.limit = overrides.limit;
        }
        if let Some(path) = overrides.store_path {
            self.store_path = path;
        }
        if let Some(capacity) = overrides.channel_capacity {
            self.channel_capacity = capacity;
        }
        if let Some(every) = overrides.report_every {
            self.report_every = every;
        }
        self
    }

    /// Check the configuration before a run
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::default();

        if self.batch_size == 0 {
            validation.add_error("batch size must be positive");
        } else if self.batch_size > MAX_BATCH_SIZE || usize::try_from(self.batch_size).is_err() {
            validation.add_error(format!(
                "batch size {} exceeds the maximum of {}",
                self.batch_size,
                MAX_BATCH_SIZE.min(usize::MAX as u64)
            ));
        } else if self.batch_size > LARGE_BATCH_WARNING {
            validation.add_warning(format!(
                "batch size {} allocates over 1 GiB per batch",
                self.batch_size
            ));
        }
        if self.channel_capacity == 0 {
            validation.add_error("channel capacity must be positive");
        } else if self.channel_capacity > MAX_CAPACITY {
            validation.add_error(format!(
                "channel capacity {} exceeds the maximum of {}",
                self.channel_capacity, MAX_CAPACITY
            ));
        }
        if self.report_every == 0 {
            validation.add_error("report interval must be positive");
        }
        if matches!(self.limit, Some(limit) if limit <= 2) {
            validation.add_warning("limit of 2 or less finds no primes");
        }

        validation
    }

    /// Validate and turn the first error into a [`PrimeError::Config`]
    pub fn validated(self) -> Result<Self> {
        let validation = self.validate();
        for warning in &validation.warnings {
            tracing::warn!("Config: {}", warning);
        }
        match validation.errors.first() {
            Some(err) => Err(PrimeError::Config(err.clone())),
            None => Ok(self),
        }
    }

    /// Get a human-readable summary of the configuration
    pub fn summary(&self) -> String {
        format!(
            "Run Config:\n\
            - Store: {}\n\
            - Batch size: {}\n\
            - Limit: {}\n\
            - Channel capacity: {}\n\
            - Report every: {} batch(es)",
            self.store_path.display(),
            self.batch_size,
            self.limit
                .map(|l| l.to_string())
                .unwrap_or_else(|| "none (continuous)".to_string()),
            self.channel_capacity,
            self.report_every,
        )
    }
}

/// Configuration validation result
#[derive(Debug, Default)]
pub struct ConfigValidation {
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ConfigValidation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }
}
