// src/lib.rs
// primerun - resumable segmented-sieve prime search

#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod reporter;
pub mod sieve;
pub mod store;
pub mod verify;

pub use engine::{BatchEngine, BatchResult, EngineReport, StopHandle};
pub use error::{PrimeError, Result};
pub use events::{EventChannel, Subscription};
pub use store::PrimeStore;
