// src/engine/mod.rs
// Batch engine: advances through the number line one segment at a time
//
// Each batch sieves `[current, current + batch_size)`, appends the primes to
// the store, publishes a BatchResult and moves the cursor. A stop request is
// only looked at between batches, so an appended batch is always published.

mod types;

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::RunConfig;
use crate::error::{PrimeError, Result};
use crate::events::EventChannel;
use crate::sieve::{digit_count, segment_sieve, sieve};
use crate::store::{PrimeStore, next_value};

pub use types::{BatchResult, EngineReport, EngineState, Range, RunningStats, Step, StopReason};

/// Upper bound for cached base primes; isqrt(u64::MAX) + 1 fits below it
const MAX_BASE_BOUND: u64 = 1 << 32;

/// Requests a clean stop; the engine finishes its current batch first
#[derive(Clone)]
pub struct StopHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Base primes up to some bound, regrown only when a batch needs more
struct BasePrimes {
    bound: u64,
    primes: Vec<u64>,
}

impl BasePrimes {
    fn new() -> Self {
        Self {
            bound: 0,
            primes: Vec::new(),
        }
    }

    /// Primes covering every p <= sqrt(high)
    fn covering(&mut self, high: u64) -> &[u64] {
        let needed = high.isqrt() + 1;
        if needed > self.bound {
            // Headroom so the sieve is redone only when `high` roughly quadruples
            let bound = needed.saturating_mul(2).min(MAX_BASE_BOUND).max(needed);
            debug!("Regrowing base primes to {}", bound);
            self.primes = sieve(bound);
            self.bound = bound;
        }
        &self.primes
    }
}

/// Single producer of batch results
pub struct BatchEngine {
    store: PrimeStore,
    events: EventChannel,
    stop: watch::Receiver<bool>,
    stop_sender: Arc<watch::Sender<bool>>,
    batch_size: u64,
    limit: Option<u64>,
    current: u64,
    stats: RunningStats,
    state: EngineState,
    base: BasePrimes,
}

impl BatchEngine {
    /// Build an engine resuming one past the store's last value
    pub fn new(
        store: PrimeStore,
        events: EventChannel,
        batch_size: u64,
        limit: Option<u64>,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(PrimeError::Config("batch size must be positive".to_string()));
        }

        let current = next_value(store.resume_point())?;
        let (stop_sender, stop) = watch::channel(false);

        info!(
            "Engine initializing at {} (batch size {}, limit {})",
            current,
            batch_size,
            limit.map_or_else(|| "none".to_string(), |l| l.to_string())
        );

        Ok(Self {
            store,
            events,
            stop,
            stop_sender: Arc::new(stop_sender),
            batch_size,
            limit,
            current,
            stats: RunningStats::default(),
            state: EngineState::Initializing,
            base: BasePrimes::new(),
        })
    }

    /// Open the configured store and build an engine publishing on `events`
    pub fn from_config(config: &RunConfig, events: EventChannel) -> Result<Self> {
        let store = PrimeStore::open(&config.store_path)?;
        Self::new(store, events, config.batch_size, config.limit)
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            sender: self.stop_sender.clone(),
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn stats(&self) -> RunningStats {
        self.stats
    }

    /// Next value to be tested
    pub fn cursor(&self) -> u64 {
        self.current
    }

    /// Run one transition of the state machine.
    ///
    /// Returns the published batch, or the stop reason once the engine is
    /// stopped. Errors move the engine to `Faulted`; later calls return
    /// [`PrimeError::Faulted`].
    pub fn step(&mut self) -> Result<Step> {
        match self.state {
            EngineState::Stopped(reason) => return Ok(Step::Stopped(reason)),
            EngineState::Faulted => return Err(PrimeError::Faulted),
            EngineState::Initializing => {
                self.state = EngineState::Running;
                info!("Engine running from {}", self.current);
            }
            EngineState::Running => {}
        }

        if *self.stop.borrow() {
            return Ok(self.finish(StopReason::Cancelled));
        }

        let range = match self.next_range() {
            Ok(Some(range)) => range,
            Ok(None) => return Ok(self.finish(StopReason::LimitReached)),
            Err(e) => return Err(self.fault(e)),
        };

        match self.run_batch(range) {
            Ok(result) => {
                self.events.publish(result.clone());
                Ok(Step::Batch(result))
            }
            Err(e) => Err(self.fault(e)),
        }
    }

    /// Step until stopped, limit reached or faulted
    pub fn run(mut self) -> Result<EngineReport> {
        loop {
            if let Step::Stopped(reason) = self.step()? {
                return Ok(self.report(reason));
            }
        }
    }

    /// Run on tokio's blocking pool
    pub fn spawn(self) -> JoinHandle<Result<EngineReport>> {
        tokio::task::spawn_blocking(move || self.run())
    }

    fn next_range(&self) -> Result<Option<Range>> {
        if matches!(self.limit, Some(limit) if self.current >= limit) {
            return Ok(None);
        }

        let high = match (self.current.checked_add(self.batch_size), self.limit) {
            (Some(high), Some(limit)) => high.min(limit),
            (Some(high), None) => high,
            (None, Some(limit)) => limit,
            (None, None) => {
                return Err(PrimeError::RangeExhausted {
                    current: self.current,
                });
            }
        };

        Ok(Some(Range {
            low: self.current,
            high,
        }))
    }

    fn run_batch(&mut self, range: Range) -> Result<BatchResult> {
        let started = Instant::now();

        let base = self.base.covering(range.high);
        let segment = segment_sieve(range.low, range.high, base);

        if let Some(&largest) = segment.last() {
            self.store.append(&segment)?;
            self.stats.max_digit_count = self.stats.max_digit_count.max(digit_count(largest));
        }

        let found = segment.len() as u64;
        self.stats.total_primes += found;
        self.stats.batch_index += 1;
        self.current = range.high;

        let result = BatchResult {
            batch_index: self.stats.batch_index,
            range,
            primes_found_in_batch: found,
            total_primes: self.stats.total_primes,
            max_digit_count: self.stats.max_digit_count,
            batch_duration: started.elapsed(),
        };
        debug!(
            "Batch {} {}: {} primes in {:?}",
            result.batch_index, range, found, result.batch_duration
        );
        Ok(result)
    }

    fn finish(&mut self, reason: StopReason) -> Step {
        self.state = EngineState::Stopped(reason);
        self.events.close();
        info!(
            "Engine stopped ({}) after {} batches, {} primes, next value {}",
            reason, self.stats.batch_index, self.stats.total_primes, self.current
        );
        Step::Stopped(reason)
    }

    fn fault(&mut self, err: PrimeError) -> PrimeError {
        self.state = EngineState::Faulted;
        self.events.close();
        error!("Engine faulted at {}: {}", self.current, err);
        err
    }

    fn report(&self, reason: StopReason) -> EngineReport {
        EngineReport {
            stats: self.stats,
            reason,
            next_value: self.current,
            resume_point: self.store.resume_point(),
        }
    }
}
