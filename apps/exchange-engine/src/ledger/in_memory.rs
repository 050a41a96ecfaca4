//! In-memory balance ledger backed by a per-user mutex map.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::domain::order_execution::{BlockedAmount, Order, OrderSide};
use crate::domain::shared::{DomainError, Money, UserId};

use super::{AccountBalances, BalanceLedger};

/// A [`BalanceLedger`] that keeps all state in memory behind a single
/// `RwLock`. Suitable as the default store and for tests; the turso-backed
/// ledger wraps the same accounting rules over durable rows.
#[derive(Debug, Default)]
pub struct InMemoryBalanceLedger {
    accounts: RwLock<HashMap<UserId, AccountBalances>>,
}

impl InMemoryBalanceLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a user's starting cash balance (used by tests and by the
    /// manager's bootstrap for freshly minted users). Delegates to the
    /// trait method so callers holding the concrete type need not import
    /// [`BalanceLedger`].
    pub async fn seed_cash(&self, user: &UserId, cash: Money) {
        BalanceLedger::seed_cash(self, user, cash).await;
    }
}

#[async_trait]
impl BalanceLedger for InMemoryBalanceLedger {
    async fn get(&self, user: &UserId) -> AccountBalances {
        let accounts = self.accounts.read().await;
        accounts.get(user).cloned().unwrap_or_default()
    }

    async fn block(&self, user: &UserId, order: &Order) -> Result<BlockedAmount, DomainError> {
        let amount = order
            .blocked_amount()
            .expect("caller computes the blocked amount before calling block");

        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(user.clone()).or_default();

        match amount {
            BlockedAmount::Cash(cash) => {
                if account.free_cash() < cash {
                    return Err(DomainError::BusinessRuleViolation {
                        rule: "insufficient_funds".to_string(),
                        message: format!(
                            "user {user} has {} free cash, needs {cash}",
                            account.free_cash()
                        ),
                    });
                }
                account.blocked_cash = account.blocked_cash + cash;
            }
            BlockedAmount::Asset(qty) => {
                let free = account.free_asset(order.base_asset());
                if free < qty {
                    return Err(DomainError::BusinessRuleViolation {
                        rule: "insufficient_funds".to_string(),
                        message: format!(
                            "user {user} has {free} free {}, needs {qty}",
                            order.base_asset()
                        ),
                    });
                }
                let entry = account
                    .blocked_assets
                    .entry(order.base_asset().clone())
                    .or_default();
                *entry = *entry + qty;
            }
        }

        Ok(amount)
    }

    async fn unblock(&self, user: &UserId, order: &Order) {
        let Some(amount) = order.blocked_amount() else {
            return;
        };
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(user.clone()).or_default();

        match amount {
            BlockedAmount::Cash(cash) => {
                account.blocked_cash = account.blocked_cash - cash;
            }
            BlockedAmount::Asset(qty) => {
                if let Some(entry) = account.blocked_assets.get_mut(order.base_asset()) {
                    *entry = *entry - qty;
                }
            }
        }
    }

    async fn seed_cash(&self, user: &UserId, cash: Money) {
        let mut accounts = self.accounts.write().await;
        accounts.entry(user.clone()).or_default().credit_cash(cash);
    }

    async fn settle(&self, user: &UserId, order: &Order, fill_price: Money, commission: Decimal) {
        let Some(amount) = order.blocked_amount() else {
            return;
        };
        let mut accounts = self.accounts.write().await;
        let account = accounts.entry(user.clone()).or_default();

        match (order.side(), amount) {
            (OrderSide::Buy, BlockedAmount::Cash(blocked)) => {
                account.blocked_cash = account.blocked_cash - blocked;
                let cost = super::buy_block_amount(order.quantity(), fill_price, commission);
                account.debit_cash(cost);
                account.credit_asset(order.base_asset(), order.quantity());
            }
            (OrderSide::Sell, BlockedAmount::Asset(blocked)) => {
                if let Some(entry) = account.blocked_assets.get_mut(order.base_asset()) {
                    *entry = *entry - blocked;
                }
                account.debit_asset(order.base_asset(), order.quantity());
                let proceeds =
                    fill_price * order.quantity().amount() * (Decimal::ONE - commission);
                account.credit_cash(proceeds);
            }
            _ => {
                // A SELL blocking cash (or BUY blocking an asset) never
                // happens; `block` always matches side to amount kind.
            }
        }
    }
}
