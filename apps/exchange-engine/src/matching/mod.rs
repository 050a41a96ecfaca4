//! Matching Engine (C4)
//!
//! Each user's simulated replay runs behind one [`Engine`] handle backed by
//! a single coordinator task: `place`, `cancel`, queries, and tick events
//! all funnel through one command channel, so the coordinator never needs
//! an explicit lock to serialize mutations. A second task (the tick
//! driver) paces ticks at `1/multiplier` wall seconds and feeds them into
//! the same channel; tests can bypass it entirely via
//! [`Engine::drive_tick`].

mod candle_store;
mod engine;
mod resolution;
mod statistics;

pub use candle_store::{CandleStore, InMemoryCandleStore};
pub use engine::{ClockConfig, Engine, EngineMeta};
pub use resolution::{resolve, Resolution};
pub use statistics::{Journal, Statistics};
