//! Trading statistics (`get_statistics`).
//!
//! `get_statistics` has no defined behavior; this module implements the
//! fixed schema called for: `pnl`, `realized_pnl`, `unrealized_pnl`,
//! `open_orders`, `closed_orders`, `win_rate`, computed from a
//! weighted-average cost-basis journal of fills plus the current ledger.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::order_execution::OrderSide;
use crate::domain::shared::{Asset, Money, Quantity};

/// Statistics returned by `GET /playground/exchange/trade/statistics`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// `realized_pnl + unrealized_pnl`.
    pub pnl: Money,
    /// Profit locked in by closed (fully sold) positions.
    pub realized_pnl: Money,
    /// Mark-to-market profit on currently held positions.
    pub unrealized_pnl: Money,
    /// Number of orders still open.
    pub open_orders: usize,
    /// Number of fills recorded so far.
    pub closed_orders: usize,
    /// Fraction of closing fills that were profitable, in `[0, 1]`.
    pub win_rate: f64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self {
            pnl: Money::ZERO,
            realized_pnl: Money::ZERO,
            unrealized_pnl: Money::ZERO,
            open_orders: 0,
            closed_orders: 0,
            win_rate: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Position {
    quantity: Quantity,
    avg_cost: Money,
}

/// Tracks average cost basis per asset across fills, so realized/unrealized
/// PnL and win rate can be derived without replaying full order history.
#[derive(Debug, Default)]
pub struct Journal {
    positions: HashMap<Asset, Position>,
    realized_pnl: Money,
    fills: usize,
    closing_fills: usize,
    wins: usize,
}

impl Journal {
    /// Create an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fill: a BUY grows the position at a blended average cost; a
    /// SELL realizes `quantity × (fill_price − avg_cost)` against it.
    pub fn record_fill(&mut self, asset: &Asset, side: OrderSide, quantity: Quantity, fill_price: Money) {
        self.fills += 1;
        let position = self.positions.entry(asset.clone()).or_default();

        match side {
            OrderSide::Buy => {
                let prior_cost = position.avg_cost.amount() * position.quantity.amount();
                let added_cost = fill_price.amount() * quantity.amount();
                let new_quantity = position.quantity + quantity;
                position.avg_cost = if new_quantity.is_zero() {
                    Money::ZERO
                } else {
                    Money::new((prior_cost + added_cost) / new_quantity.amount())
                };
                position.quantity = new_quantity;
            }
            OrderSide::Sell => {
                let realized = (fill_price - position.avg_cost) * quantity.amount();
                self.realized_pnl = self.realized_pnl + realized;
                self.closing_fills += 1;
                if realized.is_positive() {
                    self.wins += 1;
                }
                position.quantity = position.quantity - quantity;
            }
        }
    }

    /// Compute the fixed statistics schema against the current mark price
    /// for every held asset and the number of currently open orders.
    #[must_use]
    pub fn statistics(&self, open_orders: usize, mark_prices: &HashMap<Asset, Money>) -> Statistics {
        let mut unrealized = Money::ZERO;
        for (asset, position) in &self.positions {
            if position.quantity.is_zero() {
                continue;
            }
            let Some(&mark) = mark_prices.get(asset) else {
                continue;
            };
            unrealized = unrealized + (mark - position.avg_cost) * position.quantity.amount();
        }

        let win_rate = if self.wins == 0 {
            0.0
        } else {
            f64_ratio(self.wins, self.closing_fills)
        };

        Statistics {
            pnl: self.realized_pnl + unrealized,
            realized_pnl: self.realized_pnl,
            unrealized_pnl: unrealized,
            open_orders,
            closed_orders: self.fills,
            win_rate,
        }
    }
}

fn f64_ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        Decimal::from(numerator as u64)
            .checked_div(Decimal::from(denominator as u64))
            .and_then(|d| d.to_string().parse().ok())
            .unwrap_or(0.0)
    }
}
