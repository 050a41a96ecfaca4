//! User Bounded Context
//!
//! A user is an identity minted with an API key; it is never destroyed.
//! Balances live in the [`crate::ledger`] module, which is keyed by
//! [`UserId`](crate::domain::shared::UserId) rather than embedded here, so
//! that the ledger can be persisted and locked independently of user
//! identity lookups.

mod account;

pub use account::User;
