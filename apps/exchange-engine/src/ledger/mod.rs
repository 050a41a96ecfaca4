//! Balance Ledger (C3)
//!
//! Per-user cash and per-asset balances with block/unblock accounting.
//! Blocking rules: BUY blocks `quantity × execution_price × (1 + commission)`
//! of cash; SELL blocks `quantity` of the target asset. Settlement replaces
//! the blocked amount with the realized fill.

mod in_memory;

pub use in_memory::InMemoryBalanceLedger;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::domain::order_execution::{BlockedAmount, Order, OrderSide};
use crate::domain::shared::{Asset, DomainError, Money, Quantity, UserId};

/// A user's cash and per-asset balances, split into free and blocked
/// portions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountBalances {
    cash: Money,
    blocked_cash: Money,
    assets: HashMap<Asset, Quantity>,
    blocked_assets: HashMap<Asset, Quantity>,
}

impl AccountBalances {
    /// Seed a new account with a starting cash balance and no assets.
    #[must_use]
    pub fn with_cash(cash: Money) -> Self {
        Self {
            cash,
            ..Self::default()
        }
    }

    /// Total cash, including the blocked portion.
    #[must_use]
    pub const fn cash(&self) -> Money {
        self.cash
    }

    /// Cash available to back a new order.
    #[must_use]
    pub fn free_cash(&self) -> Money {
        self.cash - self.blocked_cash
    }

    /// Total held of an asset, including the blocked portion.
    #[must_use]
    pub fn asset(&self, asset: &Asset) -> Quantity {
        self.assets.get(asset).copied().unwrap_or(Quantity::ZERO)
    }

    /// Units of an asset available to back a new order.
    #[must_use]
    pub fn free_asset(&self, asset: &Asset) -> Quantity {
        self.asset(asset) - self.blocked_assets.get(asset).copied().unwrap_or(Quantity::ZERO)
    }

    /// All assets with a nonzero total balance.
    #[must_use]
    pub fn assets(&self) -> &HashMap<Asset, Quantity> {
        &self.assets
    }

    fn credit_cash(&mut self, amount: Money) {
        self.cash = self.cash + amount;
    }

    fn debit_cash(&mut self, amount: Money) {
        self.cash = self.cash - amount;
    }

    fn credit_asset(&mut self, asset: &Asset, amount: Quantity) {
        let entry = self.assets.entry(asset.clone()).or_insert(Quantity::ZERO);
        *entry = *entry + amount;
    }

    fn debit_asset(&mut self, asset: &Asset, amount: Quantity) {
        let entry = self.assets.entry(asset.clone()).or_insert(Quantity::ZERO);
        *entry = *entry - amount;
    }
}

/// Per-user cash and asset accounting with block/unblock/settle semantics.
///
/// Implementations must serialize mutations per user so that block/settle
/// pairs cannot interleave with a concurrent block from another order.
#[async_trait]
pub trait BalanceLedger: Send + Sync {
    /// Read a snapshot of a user's balances. Creates a zero balance on
    /// first access.
    async fn get(&self, user: &UserId) -> AccountBalances;

    /// Reserve funds for `order`, failing if the user lacks sufficient
    /// free balance.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::BusinessRuleViolation`] (insufficient funds)
    /// if the block would drive cash or the asset balance negative.
    async fn block(&self, user: &UserId, order: &Order) -> Result<BlockedAmount, DomainError>;

    /// Release funds previously reserved by [`Self::block`] without a fill.
    async fn unblock(&self, user: &UserId, order: &Order);

    /// Realize a fill at `fill_price`, replacing the blocked amount with
    /// the settled cash/asset movement and applying `commission`.
    async fn settle(&self, user: &UserId, order: &Order, fill_price: Money, commission: Decimal);

    /// Credit a user's cash balance with no corresponding debit — used once,
    /// to fund a freshly minted user's starting balance. Not part of the
    /// block/settle accounting cycle.
    async fn seed_cash(&self, user: &UserId, cash: Money);
}

/// Compute the cash amount a BUY blocks: `quantity × price × (1 + commission)`.
#[must_use]
pub fn buy_block_amount(quantity: Quantity, price: Money, commission: Decimal) -> Money {
    price * quantity.amount() * (Decimal::ONE + commission)
}

/// Determine what a not-yet-admitted order would block, given its side and
/// kind-specific reference price.
///
/// BUY blocks cash sized off `reference_price`; SELL blocks the raw
/// quantity of the base asset.
#[must_use]
pub fn worst_case_block(
    side: OrderSide,
    quantity: Quantity,
    reference_price: Money,
    commission: Decimal,
) -> BlockedAmount {
    match side {
        OrderSide::Buy => BlockedAmount::Cash(buy_block_amount(quantity, reference_price, commission)),
        OrderSide::Sell => BlockedAmount::Asset(quantity),
    }
}
