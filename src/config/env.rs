// src/config/env.rs
// Environment-based configuration - single source of truth for all env vars

use std::path::PathBuf;
use std::str::FromStr;

use tracing::{debug, warn};

pub const ENV_BATCH_SIZE: &str = "PRIMERUN_BATCH_SIZE";
pub const ENV_LIMIT: &str = "PRIMERUN_LIMIT";
pub const ENV_OUTPUT: &str = "PRIMERUN_OUTPUT";
pub const ENV_CHANNEL_CAPACITY: &str = "PRIMERUN_CHANNEL_CAPACITY";
pub const ENV_REPORT_EVERY: &str = "PRIMERUN_REPORT_EVERY";

/// Values found in the environment; `None` means "not set or unusable"
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub batch_size: Option<u64>,
    pub limit: Option<u64>,
    pub store_path: Option<PathBuf>,
    pub channel_capacity: Option<usize>,
    pub report_every: Option<u64>,
}

impl EnvOverrides {
    /// Load overrides from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load overrides through an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let overrides = Self {
            batch_size: parse_var(&lookup, ENV_BATCH_SIZE),
            limit: parse_var(&lookup, ENV_LIMIT),
            store_path: lookup(ENV_OUTPUT)
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            channel_capacity: parse_var(&lookup, ENV_CHANNEL_CAPACITY),
            report_every: parse_var(&lookup, ENV_REPORT_EVERY),
        };
        debug!(?overrides, "Environment overrides loaded");
        overrides
    }
}

/// Parse a variable, ignoring trailing `# comments` and whitespace.
/// Unparsable values are logged and treated as unset.
fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    let clean = raw.split('#').next().unwrap_or("").trim().replace('_', "");
    if clean.is_empty() {
        return None;
    }
    match clean.parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "Unparsable environment value, ignoring");
            None
        }
    }
}
