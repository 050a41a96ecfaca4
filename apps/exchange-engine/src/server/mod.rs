//! Server implementation.
//!
//! HTTP/JSON is the only transport the exchange exposes — one façade
//! (C6) sitting in front of the [`crate::manager::ExchangeManager`].

mod http;

pub use http::{create_router, ApiServer};
