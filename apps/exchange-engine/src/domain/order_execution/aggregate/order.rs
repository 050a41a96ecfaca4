//! Order Aggregate Root
//!
//! An order is a tagged union over four kinds (market, limit, stop-limit,
//! one-cancels-other) sharing a common identity and blocking contract.

use serde::{Deserialize, Serialize};

use crate::domain::order_execution::value_objects::{OrderSide, OrderType};
use crate::domain::shared::{Asset, DomainError, Money, OrderId, Quantity, Timestamp, UserId};

/// The amount withheld from a user's balance while an order is open.
///
/// A BUY blocks cash; a SELL blocks units of the target asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlockedAmount {
    /// Cash withheld (BUY orders).
    Cash(Money),
    /// Asset units withheld (SELL orders).
    Asset(Quantity),
}

impl BlockedAmount {
    /// Get the cash amount, if this blocks cash.
    #[must_use]
    pub const fn as_cash(&self) -> Option<Money> {
        match self {
            Self::Cash(m) => Some(*m),
            Self::Asset(_) => None,
        }
    }

    /// Get the asset quantity, if this blocks an asset.
    #[must_use]
    pub const fn as_asset(&self) -> Option<Quantity> {
        match self {
            Self::Asset(q) => Some(*q),
            Self::Cash(_) => None,
        }
    }
}

/// Kind-specific fields for an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "order_type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    /// Realized at the next candle's close; `execution_price` is a hint only.
    Market {
        /// Indicative price supplied by the caller; not used for settlement.
        execution_price: Money,
    },
    /// Fills once the close crosses `execution_price`.
    Limit {
        /// Trigger price.
        execution_price: Money,
    },
    /// Becomes a LIMIT once the close crosses `stop_price`.
    StopLimit {
        /// Activation price.
        stop_price: Money,
        /// Price of the limit order placed once activated.
        execution_price: Money,
    },
}

impl OrderKind {
    /// The wire-level order type this kind corresponds to.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        match self {
            Self::Market { .. } => OrderType::Market,
            Self::Limit { .. } => OrderType::Limit,
            Self::StopLimit { .. } => OrderType::StopLimit,
        }
    }
}

/// Request to create one order, as received from the placement endpoint.
///
/// Untyped at the wire level: `order_type` selects which of the
/// kind-specific fields are required.
#[derive(Debug, Clone)]
pub struct PlaceOrderRequest {
    /// Requested order type, including `OCO` for a linked pair.
    pub order_type: OrderType,
    /// Owning user.
    pub owner: UserId,
    /// Asset being bought or sold.
    pub base_asset: Asset,
    /// Asset the base asset is priced in.
    pub target_asset: Asset,
    /// Buy or sell.
    pub side: OrderSide,
    /// Quantity of the base asset.
    pub quantity: Quantity,
    /// Required for LIMIT, STOP_LIMIT, and the limit leg of an OCO.
    pub execution_price: Option<Money>,
    /// Required for STOP_LIMIT and the stop-limit leg of an OCO.
    pub stop_price: Option<Money>,
    /// For OCO, the limit leg's execution price (the `execution_price`
    /// field above is then used for the stop-limit leg).
    pub oco_limit_price: Option<Money>,
}

/// A freshly created order, not yet admitted by the matching engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    created_at: Timestamp,
    owner: UserId,
    base_asset: Asset,
    target_asset: Asset,
    side: OrderSide,
    quantity: Quantity,
    blocked_amount: Option<BlockedAmount>,
    kind: OrderKind,
    sibling_id: Option<OrderId>,
}

impl Order {
    /// Construct an order directly (used by the factory and by
    /// reconstitution from storage).
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: OrderId,
        created_at: Timestamp,
        owner: UserId,
        base_asset: Asset,
        target_asset: Asset,
        side: OrderSide,
        quantity: Quantity,
        blocked_amount: Option<BlockedAmount>,
        kind: OrderKind,
        sibling_id: Option<OrderId>,
    ) -> Self {
        Self {
            id,
            created_at,
            owner,
            base_asset,
            target_asset,
            side,
            quantity,
            blocked_amount,
            kind,
            sibling_id,
        }
    }

    /// Order identifier.
    #[must_use]
    pub fn id(&self) -> &OrderId {
        &self.id
    }

    /// Creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Owning user.
    #[must_use]
    pub fn owner(&self) -> &UserId {
        &self.owner
    }

    /// Base asset (what is being traded).
    #[must_use]
    pub fn base_asset(&self) -> &Asset {
        &self.base_asset
    }

    /// Target asset (what the price is denominated in).
    #[must_use]
    pub fn target_asset(&self) -> &Asset {
        &self.target_asset
    }

    /// Buy or sell.
    #[must_use]
    pub const fn side(&self) -> OrderSide {
        self.side
    }

    /// Quantity of the base asset.
    #[must_use]
    pub const fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Funds currently withheld for this order, if already admitted.
    #[must_use]
    pub const fn blocked_amount(&self) -> Option<BlockedAmount> {
        self.blocked_amount
    }

    /// Record the amount blocked for this order at admission time.
    pub fn set_blocked_amount(&mut self, amount: BlockedAmount) {
        self.blocked_amount = Some(amount);
    }

    /// The kind-specific fields.
    #[must_use]
    pub const fn kind(&self) -> OrderKind {
        self.kind
    }

    /// Replace the kind in place (a STOP_LIMIT promoted to its LIMIT leg
    /// keeps its id and blocked amount).
    pub fn set_kind(&mut self, kind: OrderKind) {
        self.kind = kind;
    }

    /// The wire-level order type.
    #[must_use]
    pub const fn order_type(&self) -> OrderType {
        self.kind.order_type()
    }

    /// The sibling order id, if this order is one leg of an OCO pair.
    #[must_use]
    pub fn sibling_id(&self) -> Option<&OrderId> {
        self.sibling_id.as_ref()
    }

    /// True if this order is one leg of an OCO pair.
    #[must_use]
    pub fn is_oco_leg(&self) -> bool {
        self.sibling_id.is_some()
    }
}

/// The result of admitting a `PlaceOrderRequest`: either a single order or
/// a linked OCO pair (limit leg, stop-limit leg).
#[derive(Debug, Clone)]
pub enum CreatedOrder {
    /// A MARKET, LIMIT, or STOP_LIMIT order.
    Single(Order),
    /// An OCO pair: (limit leg, stop-limit leg).
    Oco(Box<Order>, Box<Order>),
}

/// Validates an untyped placement request and stamps a fresh order.
///
/// Does not check balances; admission (balance blocking) is the matching
/// engine's responsibility.
///
/// # Errors
///
/// Returns error if `order_type` is unrecognized or a required
/// kind-specific field is missing.
pub fn create(request: PlaceOrderRequest) -> Result<CreatedOrder, DomainError> {
    request.base_asset.validate()?;
    request.target_asset.validate()?;
    request.quantity.validate_for_order()?;

    match request.order_type {
        OrderType::Market => {
            let execution_price = request
                .execution_price
                .unwrap_or(request.oco_limit_price.unwrap_or(Money::ZERO));
            Ok(CreatedOrder::Single(new_order(
                &request,
                OrderKind::Market { execution_price },
                None,
            )))
        }
        OrderType::Limit => {
            let execution_price = require_price(request.execution_price, "execution_price")?;
            Ok(CreatedOrder::Single(new_order(
                &request,
                OrderKind::Limit { execution_price },
                None,
            )))
        }
        OrderType::StopLimit => {
            let stop_price = require_price(request.stop_price, "stop_price")?;
            let execution_price = require_price(request.execution_price, "execution_price")?;
            Ok(CreatedOrder::Single(new_order(
                &request,
                OrderKind::StopLimit {
                    stop_price,
                    execution_price,
                },
                None,
            )))
        }
        OrderType::Oco => {
            let limit_price = require_price(request.oco_limit_price, "oco_limit_price")?;
            let stop_price = require_price(request.stop_price, "stop_price")?;
            let stop_execution_price = require_price(request.execution_price, "execution_price")?;

            let limit_id = OrderId::generate();
            let stop_id = OrderId::generate();

            let limit_leg = new_order_with_id(
                &request,
                limit_id.clone(),
                OrderKind::Limit {
                    execution_price: limit_price,
                },
                Some(stop_id.clone()),
            );
            let stop_leg = new_order_with_id(
                &request,
                stop_id,
                OrderKind::StopLimit {
                    stop_price,
                    execution_price: stop_execution_price,
                },
                Some(limit_id),
            );

            Ok(CreatedOrder::Oco(Box::new(limit_leg), Box::new(stop_leg)))
        }
    }
}

fn require_price(price: Option<Money>, field: &str) -> Result<Money, DomainError> {
    let price = price.ok_or_else(|| DomainError::InvalidValue {
        field: field.to_string(),
        message: format!("{field} is required for this order type"),
    })?;
    price.validate_balance()?;
    Ok(price)
}

fn new_order(request: &PlaceOrderRequest, kind: OrderKind, sibling_id: Option<OrderId>) -> Order {
    new_order_with_id(request, OrderId::generate(), kind, sibling_id)
}

fn new_order_with_id(
    request: &PlaceOrderRequest,
    id: OrderId,
    kind: OrderKind,
    sibling_id: Option<OrderId>,
) -> Order {
    Order {
        id,
        created_at: Timestamp::now(),
        owner: request.owner.clone(),
        base_asset: request.base_asset.clone(),
        target_asset: request.target_asset.clone(),
        side: request.side,
        quantity: request.quantity,
        blocked_amount: None,
        kind,
        sibling_id,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn base_request(order_type: OrderType) -> PlaceOrderRequest {
        PlaceOrderRequest {
            order_type,
            owner: UserId::new("user-1"),
            base_asset: Asset::new("btc"),
            target_asset: Asset::new("usdt"),
            side: OrderSide::Buy,
            quantity: Quantity::new(dec!(1)),
            execution_price: None,
            stop_price: None,
            oco_limit_price: None,
        }
    }

    #[test]
    fn market_order_does_not_require_a_price() {
        let request = base_request(OrderType::Market);
        let created = match create(request) {
            Ok(c) => c,
            Err(e) => panic!("should admit market order: {e}"),
        };
        match created {
            CreatedOrder::Single(order) => {
                assert_eq!(order.order_type(), OrderType::Market);
                assert!(!order.is_oco_leg());
            }
            CreatedOrder::Oco(..) => panic!("expected a single order"),
        }
    }

    #[test]
    fn limit_order_requires_execution_price() {
        let request = base_request(OrderType::Limit);
        assert!(create(request).is_err());
    }

    #[test]
    fn limit_order_with_price_is_admitted() {
        let mut request = base_request(OrderType::Limit);
        request.execution_price = Some(Money::usd(100.0));
        let created = match create(request) {
            Ok(c) => c,
            Err(e) => panic!("should admit limit order: {e}"),
        };
        match created {
            CreatedOrder::Single(order) => match order.kind() {
                OrderKind::Limit { execution_price } => {
                    assert_eq!(execution_price, Money::usd(100.0));
                }
                other => panic!("expected Limit kind, got {other:?}"),
            },
            CreatedOrder::Oco(..) => panic!("expected a single order"),
        }
    }

    #[test]
    fn stop_limit_requires_both_prices() {
        let mut request = base_request(OrderType::StopLimit);
        request.stop_price = Some(Money::usd(190.0));
        assert!(create(request).is_err());
    }

    #[test]
    fn stop_limit_with_both_prices_is_admitted() {
        let mut request = base_request(OrderType::StopLimit);
        request.stop_price = Some(Money::usd(190.0));
        request.execution_price = Some(Money::usd(185.0));
        let created = match create(request) {
            Ok(c) => c,
            Err(e) => panic!("should admit stop-limit order: {e}"),
        };
        assert!(matches!(created, CreatedOrder::Single(_)));
    }

    #[test]
    fn oco_creates_two_linked_legs() {
        let mut request = base_request(OrderType::Oco);
        request.oco_limit_price = Some(Money::usd(185.0));
        request.stop_price = Some(Money::usd(190.0));
        request.execution_price = Some(Money::usd(188.0));

        let created = match create(request) {
            Ok(c) => c,
            Err(e) => panic!("should admit OCO order: {e}"),
        };

        match created {
            CreatedOrder::Oco(limit_leg, stop_leg) => {
                assert_eq!(limit_leg.sibling_id(), Some(stop_leg.id()));
                assert_eq!(stop_leg.sibling_id(), Some(limit_leg.id()));
                assert!(matches!(limit_leg.kind(), OrderKind::Limit { .. }));
                assert!(matches!(stop_leg.kind(), OrderKind::StopLimit { .. }));
            }
            CreatedOrder::Single(_) => panic!("expected an OCO pair"),
        }
    }

    #[test]
    fn invalid_asset_is_rejected() {
        let mut request = base_request(OrderType::Market);
        request.base_asset = Asset::new("BTC-PERP");
        assert!(create(request).is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let mut request = base_request(OrderType::Market);
        request.quantity = Quantity::ZERO;
        assert!(create(request).is_err());
    }

    #[test]
    fn order_serde_roundtrip() {
        let mut request = base_request(OrderType::Limit);
        request.execution_price = Some(Money::usd(100.0));
        let created = match create(request) {
            Ok(c) => c,
            Err(e) => panic!("should admit order: {e}"),
        };
        let CreatedOrder::Single(order) = created else {
            panic!("expected a single order")
        };

        let json = match serde_json::to_string(&order) {
            Ok(j) => j,
            Err(e) => panic!("should serialize order: {e}"),
        };
        let parsed: Order = match serde_json::from_str(&json) {
            Ok(p) => p,
            Err(e) => panic!("should deserialize order: {e}"),
        };
        assert_eq!(parsed.id(), order.id());
        assert_eq!(parsed.kind(), order.kind());
    }
}
