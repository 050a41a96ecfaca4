//! Order Execution Bounded Context
//!
//! Models a placed order as a tagged union (market/limit/stop-limit, plus
//! linked OCO pairs) and validates placement requests. Lifecycle beyond
//! creation — admission, triggering, and settlement — lives in the
//! matching engine, which owns the balance ledger interactions.

pub mod aggregate;
pub mod value_objects;

pub use aggregate::{create, BlockedAmount, CreatedOrder, Order, OrderKind, PlaceOrderRequest};
pub use value_objects::{OrderSide, OrderType};
