//! Per-tick resolution rule for a single open order against one candle.
//!
//! Pure and synchronous: given an order and the most recent candle for its
//! symbol, decide whether the candle's close triggers a fill or a
//! stop-to-limit promotion. Balance movement and sibling cancellation are
//! the engine's responsibility, not this function's.

use crate::domain::candle::Candle;
use crate::domain::order_execution::{Order, OrderKind, OrderSide};
use crate::domain::shared::Money;

/// Outcome of checking one order against one candle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The order fills at `price`. The caller settles and removes it.
    Filled {
        /// The price to settle at.
        price: Money,
    },
    /// A STOP_LIMIT order's stop triggered; its kind has already been
    /// rewritten to `Limit` in place by [`resolve`]. The caller keeps the
    /// order open under its new kind.
    Promoted,
    /// No trigger condition was met; the order stays open unchanged.
    Pending,
}

/// Check `order` against `candle` and, for a triggered STOP_LIMIT, promote
/// it to a LIMIT in place.
///
/// Matches the resolution table:
/// - MARKET always fills at the candle's close.
/// - LIMIT BUY fills when `close <= execution_price`; SELL when
///   `close >= execution_price`.
/// - STOP_LIMIT BUY promotes to LIMIT when `close >= stop_price`; SELL
///   when `close <= stop_price`.
#[must_use]
pub fn resolve(order: &mut Order, candle: &Candle) -> Resolution {
    let close = Money::new(candle.close);

    match order.kind() {
        OrderKind::Market { .. } => Resolution::Filled { price: close },
        OrderKind::Limit { execution_price } => {
            if crosses(order.side(), close, execution_price) {
                Resolution::Filled {
                    price: execution_price,
                }
            } else {
                Resolution::Pending
            }
        }
        OrderKind::StopLimit {
            stop_price,
            execution_price,
        } => {
            if triggers(order.side(), close, stop_price) {
                order.set_kind(OrderKind::Limit { execution_price });
                Resolution::Promoted
            } else {
                Resolution::Pending
            }
        }
    }
}

/// A LIMIT crosses in the direction that favors the order's owner: a BUY
/// wants the price to fall to or below the limit, a SELL wants it to rise
/// to or above.
fn crosses(side: OrderSide, close: Money, execution_price: Money) -> bool {
    match side {
        OrderSide::Buy => close <= execution_price,
        OrderSide::Sell => close >= execution_price,
    }
}

/// A STOP_LIMIT's stop triggers in the breakout direction: a BUY stop
/// triggers on a rise through the stop, a SELL stop on a drop through it.
fn triggers(side: OrderSide, close: Money, stop_price: Money) -> bool {
    match side {
        OrderSide::Buy => close >= stop_price,
        OrderSide::Sell => close <= stop_price,
    }
}
