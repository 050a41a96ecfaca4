//! Exchange Engine - Rust Core Library
//!
//! Multi-user crypto exchange backtesting simulator: each user gets a
//! time-accelerated replay of historical candles, an order-matching
//! engine running against that replay, and a balance ledger tracking
//! cash/asset positions. Exposed over HTTP.
//!
//! # Architecture (Clean Architecture + DDD)
//!
//! - **Domain** (`domain`): orders, users, candles, shared value objects —
//!   no external dependencies.
//! - **Ledger** (`ledger`, C3): per-user cash/asset balances with
//!   block/unblock/settle accounting.
//! - **Matching** (`matching`, C4): one coordinator task per running
//!   engine; admits orders, drives the simulated clock, resolves fills.
//! - **Manager** (`manager`, C5): the `user_id → engine` registry and the
//!   idle-eviction reaper.
//! - **Persistence** (`persistence`): durable user identities and engine
//!   snapshots, backed by Turso.
//! - **Server** (`server`, C6): the HTTP façade — authenticates, resolves
//!   a user's engine, and translates engine results to JSON. Owns no
//!   business logic of its own.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

/// Configuration loading.
pub mod config;
/// Domain layer - core business logic with no external dependencies.
pub mod domain;
/// API-facing error taxonomy.
pub mod error;
/// Per-user balance ledger (C3).
pub mod ledger;
/// Multi-tenant exchange registry and idle-eviction reaper (C5).
pub mod manager;
/// Matching engine and simulated clock (C4).
pub mod matching;
/// Durable user/snapshot storage.
pub mod persistence;
/// HTTP API façade (C6).
pub mod server;
/// Tracing setup.
pub mod telemetry;

pub use error::ApiError;
pub use manager::ExchangeManager;
pub use server::{create_router, ApiServer};
