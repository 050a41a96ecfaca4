//! Domain Layer
//!
//! The innermost layer containing business logic with zero infrastructure
//! dependencies. This layer defines:
//!
//! - **Aggregates**: Consistency boundaries with invariants
//! - **Value Objects**: Immutable domain types with equality by value
//! - **Repository Traits**: Persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`order_execution`]: Order creation and the tagged-union order model
//! - [`user`]: User accounts and API-key authentication
//! - [`candle`]: Read-only OHLCV candle types
//! - [`shared`]: Value objects and errors shared across all contexts

pub mod candle;
pub mod order_execution;
pub mod shared;
pub mod user;
