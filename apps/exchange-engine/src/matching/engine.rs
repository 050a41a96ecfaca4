//! Matching Engine (C4) — one coordinator task per user.
//!
//! The engine owns its state and never shares a lock with the outside
//! world: callers send commands over an mpsc channel and a single
//! coordinator task applies them one at a time, so `place`, `cancel`, and
//! tick resolution can never interleave. `last_activity`, `multiplier`, and
//! `commission` are mirrored into a small `Arc<RwLock<_>>` snapshot the
//! manager can read without going through the channel, per the contract
//! that engines never hold a back-reference to the manager.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{mpsc, oneshot, RwLock};
use tracing::debug;

use crate::domain::candle::Timeframe;
use crate::domain::order_execution::{create, CreatedOrder, Order, OrderSide, PlaceOrderRequest};
use crate::domain::shared::{Asset, DomainError, Money, OrderId, Timestamp, UserId};
use crate::ledger::{worst_case_block, AccountBalances, BalanceLedger};

use super::candle_store::CandleStore;
use super::resolution::{resolve, Resolution};
use super::statistics::{Journal, Statistics};

/// Readable engine metadata the manager consults without entering the
/// coordinator's command channel.
#[derive(Debug, Clone, Copy)]
pub struct EngineMeta {
    /// Wall-clock time of the last `place`/`cancel`/tick.
    pub last_activity: Timestamp,
    /// Wall-time speedup factor for the simulated clock.
    pub multiplier: f64,
    /// Commission rate applied to every fill.
    pub commission: Decimal,
}

/// One simulated step of the replay clock, derived from the configured
/// timeframe: `tick_budget` candles of that timeframe are available to
/// replay, starting `tick_budget` ticks before the newest candle on record
/// for `seed_asset`.
#[derive(Debug, Clone)]
pub struct ClockConfig {
    /// The timeframe driving the simulated clock.
    pub timeframe: Timeframe,
    /// Number of candles the replay is sized for.
    pub ticks_for_test: i64,
    /// The asset whose latest candle anchors the clock seek on start.
    pub seed_asset: Asset,
}

impl ClockConfig {
    /// Duration, in seconds, of one simulated tick at this timeframe.
    #[must_use]
    pub const fn one_tick_secs(&self) -> i64 {
        self.timeframe.duration_secs()
    }

    /// Total simulated seconds the replay window spans.
    #[must_use]
    pub const fn tick_budget_secs(&self) -> i64 {
        self.one_tick_secs() * self.ticks_for_test
    }
}

enum Command {
    Place {
        request: PlaceOrderRequest,
        reply: oneshot::Sender<Result<Vec<OrderId>, DomainError>>,
    },
    Cancel {
        order_id: OrderId,
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    ListOrders {
        reply: oneshot::Sender<Vec<Order>>,
    },
    GetOrder {
        order_id: OrderId,
        reply: oneshot::Sender<Option<Order>>,
    },
    GetBalance {
        reply: oneshot::Sender<AccountBalances>,
    },
    GetStatistics {
        reply: oneshot::Sender<Statistics>,
    },
    SetMultiplier {
        multiplier: f64,
    },
    SetCommission {
        commission: Decimal,
    },
    Tick,
    Stop {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running engine's coordinator task.
///
/// Cloning shares the same coordinator; dropping every handle (and letting
/// the tick driver's sender drop too) lets the coordinator task exit.
#[derive(Clone)]
pub struct Engine {
    commands: mpsc::Sender<Command>,
    meta: Arc<RwLock<EngineMeta>>,
    running: Arc<AtomicBool>,
}

impl Engine {
    /// Start a fresh engine for `owner`: spawns the coordinator and
    /// tick-driver tasks. Does not touch the ledger — seeding starting cash
    /// is the caller's responsibility.
    pub fn start(
        owner: UserId,
        ledger: Arc<dyn BalanceLedger>,
        candles: Arc<dyn CandleStore>,
        clock: ClockConfig,
        multiplier: f64,
        commission: Decimal,
    ) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let running = Arc::new(AtomicBool::new(true));
        let meta = Arc::new(RwLock::new(EngineMeta {
            last_activity: Timestamp::now(),
            multiplier,
            commission,
        }));

        let coordinator = Coordinator {
            commands: rx,
            owner,
            ledger,
            candles,
            clock,
            current_time: Timestamp::now_second_aligned(), // overwritten by seed_clock() before the first command

            open_orders: Vec::new(),
            latest_candles: HashMap::new(),
            journal: Journal::new(),
            meta: meta.clone(),
            running: running.clone(),
        };
        tokio::spawn(coordinator.run());

        let tick_sender = tx.clone();
        let tick_running = running.clone();
        let tick_meta = meta.clone();
        tokio::spawn(async move {
            loop {
                if !tick_running.load(AtomicOrdering::Acquire) {
                    break;
                }
                let multiplier = tick_meta.read().await.multiplier.max(0.000_001);
                tokio::time::sleep(std::time::Duration::from_secs_f64(1.0 / multiplier)).await;
                if tick_sender.send(Command::Tick).await.is_err() {
                    break;
                }
            }
        });

        Self {
            commands: tx,
            meta,
            running,
        }
    }

    /// Admit an order. Returns the id(s) assigned — one for a single order,
    /// two for an OCO pair (limit leg, stop-limit leg).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] on malformed requests or insufficient funds.
    pub async fn place(&self, request: PlaceOrderRequest) -> Result<Vec<OrderId>, DomainError> {
        self.call(|reply| Command::Place { request, reply }).await
    }

    /// Cancel an open order (and its OCO sibling, if any).
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::NotFound`] if no such order is open.
    pub async fn cancel(&self, order_id: OrderId) -> Result<(), DomainError> {
        self.call(|reply| Command::Cancel { order_id, reply }).await
    }

    /// List every open order.
    pub async fn list_orders(&self) -> Vec<Order> {
        self.call_infallible(|reply| Command::ListOrders { reply }).await
    }

    /// Look up a single open order by id.
    pub async fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.call_infallible(|reply| Command::GetOrder { order_id, reply }).await
    }

    /// Current cash/asset balances.
    pub async fn get_balance(&self) -> AccountBalances {
        self.call_infallible(|reply| Command::GetBalance { reply }).await
    }

    /// Fixed-schema trading statistics.
    pub async fn get_statistics(&self) -> Statistics {
        self.call_infallible(|reply| Command::GetStatistics { reply }).await
    }

    /// Change the wall-time speedup factor.
    pub async fn set_multiplier(&self, multiplier: f64) {
        let _ = self.commands.send(Command::SetMultiplier { multiplier }).await;
    }

    /// Change the commission rate applied to future fills.
    pub async fn set_commission(&self, commission: Decimal) {
        let _ = self.commands.send(Command::SetCommission { commission }).await;
    }

    /// Feed one tick directly, bypassing the wall-clock sleep. Intended for
    /// tests that want to drive the resolver deterministically.
    pub async fn drive_tick(&self) {
        let _ = self.commands.send(Command::Tick).await;
    }

    /// Stop the engine. Idempotent: a second call on an already-stopped
    /// engine is a no-op.
    pub async fn stop(&self) {
        if !self.running.swap(false, AtomicOrdering::AcqRel) {
            return;
        }
        let (reply, rx) = oneshot::channel();
        if self.commands.send(Command::Stop { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    /// A readable snapshot of `last_activity`/`multiplier`/`commission`.
    pub async fn meta(&self) -> EngineMeta {
        *self.meta.read().await
    }

    /// Whether the engine is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(AtomicOrdering::Acquire)
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<Result<T, DomainError>>) -> Command) -> Result<T, DomainError> {
        let (reply, rx) = oneshot::channel();
        self.commands.send(make(reply)).await.map_err(|_| DomainError::InvalidStateTransition {
            entity: "Engine".to_string(),
            from: "RUNNING".to_string(),
            to: "STOPPED".to_string(),
            reason: "engine coordinator has shut down".to_string(),
        })?;
        rx.await.map_err(|_| DomainError::InvalidStateTransition {
            entity: "Engine".to_string(),
            from: "RUNNING".to_string(),
            to: "STOPPED".to_string(),
            reason: "engine coordinator dropped the reply channel".to_string(),
        })?
    }

    async fn call_infallible<T: Default>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Command) -> T {
        let (reply, rx) = oneshot::channel();
        if self.commands.send(make(reply)).await.is_err() {
            return T::default();
        }
        rx.await.unwrap_or_default()
    }
}

struct Coordinator {
    commands: mpsc::Receiver<Command>,
    owner: UserId,
    ledger: Arc<dyn BalanceLedger>,
    candles: Arc<dyn CandleStore>,
    clock: ClockConfig,
    current_time: Timestamp,
    open_orders: Vec<Order>,
    latest_candles: HashMap<Asset, crate::domain::candle::Candle>,
    journal: Journal,
    meta: Arc<RwLock<EngineMeta>>,
    running: Arc<AtomicBool>,
}

impl Coordinator {
    async fn run(mut self) {
        self.seed_clock().await;
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Place { request, reply } => {
                    let _ = reply.send(self.handle_place(request).await);
                }
                Command::Cancel { order_id, reply } => {
                    let _ = reply.send(self.handle_cancel(&order_id).await);
                }
                Command::ListOrders { reply } => {
                    let _ = reply.send(self.open_orders.clone());
                }
                Command::GetOrder { order_id, reply } => {
                    let _ = reply.send(self.open_orders.iter().find(|o| *o.id() == order_id).cloned());
                }
                Command::GetBalance { reply } => {
                    let _ = reply.send(self.ledger.get(&self.owner).await);
                }
                Command::GetStatistics { reply } => {
                    let marks = self
                        .latest_candles
                        .iter()
                        .map(|(asset, candle)| (asset.clone(), Money::new(candle.close)))
                        .collect();
                    let _ = reply.send(self.journal.statistics(self.open_orders.len(), &marks));
                }
                Command::SetMultiplier { multiplier } => {
                    self.meta.write().await.multiplier = multiplier;
                }
                Command::SetCommission { commission } => {
                    self.meta.write().await.commission = commission;
                }
                Command::Tick => {
                    self.advance_tick().await;
                }
                Command::Stop { reply } => {
                    let _ = reply.send(());
                    break;
                }
            }
            if !self.running.load(AtomicOrdering::Acquire) {
                break;
            }
        }
    }

    /// Seek `current_time` to `last_timestamp(seed_asset, timeframe) −
    /// tick_budget`, so the replay has exactly `ticks_for_test` ticks left
    /// to run before it reaches the newest candle on record (§4.4). Falls
    /// back to the wall clock, second-aligned, when no candle exists yet
    /// for `seed_asset` — there is nothing to seek against.
    async fn seed_clock(&mut self) {
        let last = self
            .candles
            .last_timestamp(&self.clock.seed_asset, self.clock.timeframe)
            .await;
        self.current_time = match last {
            Some(ts) => Timestamp::new(ts.as_datetime() - chrono::Duration::seconds(self.clock.tick_budget_secs())),
            None => Timestamp::now_second_aligned(),
        };
    }

    async fn touch_activity(&self) {
        self.meta.write().await.last_activity = Timestamp::now();
    }

    async fn current_commission(&self) -> Decimal {
        self.meta.read().await.commission
    }

    async fn handle_place(&mut self, request: PlaceOrderRequest) -> Result<Vec<OrderId>, DomainError> {
        self.touch_activity().await;
        let owner = request.owner.clone();
        let commission = self.current_commission().await;
        let reference_price = request
            .execution_price
            .or(request.oco_limit_price)
            .unwrap_or(Money::ZERO);

        let created = create(request)?;
        match created {
            CreatedOrder::Single(mut order) => {
                let blocked = worst_case_block(order.side(), order.quantity(), reference_price, commission);
                order.set_blocked_amount(blocked);
                self.ledger.block(&owner, &order).await?;
                let id = order.id().clone();
                self.open_orders.push(order);
                Ok(vec![id])
            }
            CreatedOrder::Oco(mut limit_leg, mut stop_leg) => {
                let limit_block = worst_case_block(limit_leg.side(), limit_leg.quantity(), reference_price, commission);
                let stop_block = worst_case_block(stop_leg.side(), stop_leg.quantity(), reference_price, commission);
                let max_block = max_blocked(limit_block, stop_block);

                // The reservation is shared between the two legs but recorded
                // only once. Leaving `stop_leg.blocked_amount` as `None` makes
                // its later unblock/settle a no-op instead of a second release.
                limit_leg.set_blocked_amount(max_block);
                self.ledger.block(&owner, &limit_leg).await?;

                let ids = vec![limit_leg.id().clone(), stop_leg.id().clone()];
                self.open_orders.push(*limit_leg);
                self.open_orders.push(*stop_leg);
                Ok(ids)
            }
        }
    }

    async fn handle_cancel(&mut self, order_id: &OrderId) -> Result<(), DomainError> {
        self.touch_activity().await;
        let Some(index) = self.open_orders.iter().position(|o| o.id() == order_id) else {
            return Err(DomainError::NotFound {
                entity_type: "Order".to_string(),
                id: order_id.to_string(),
            });
        };
        let order = self.open_orders.remove(index);
        self.ledger.unblock(order.owner(), &order).await;

        if let Some(sibling_id) = order.sibling_id() {
            if let Some(sibling_index) = self.open_orders.iter().position(|o| o.id() == sibling_id) {
                let sibling = self.open_orders.remove(sibling_index);
                self.ledger.unblock(sibling.owner(), &sibling).await;
            }
        }
        Ok(())
    }

    async fn advance_tick(&mut self) {
        self.current_time = Timestamp::new(
            self.current_time.as_datetime() + chrono::Duration::seconds(self.clock.one_tick_secs()),
        );
        self.touch_activity().await;

        let assets: Vec<Asset> = self
            .open_orders
            .iter()
            .map(|o| o.base_asset().clone())
            .collect::<std::collections::BTreeSet<_>>()
            .into_iter()
            .collect();

        for asset in assets {
            match self
                .candles
                .get_by_time(&asset, self.clock.timeframe, self.current_time)
                .await
            {
                Some(candle) => {
                    self.latest_candles.insert(asset, candle);
                }
                None => {
                    debug!(%asset, "no candle at current tick, keeping last known candle");
                }
            }
        }

        self.resolve_open_orders().await;
    }

    async fn resolve_open_orders(&mut self) {
        let commission = self.current_commission().await;
        let mut filled_ids = Vec::new();
        let mut promoted_ids = Vec::new();

        for order in &mut self.open_orders {
            let Some(candle) = self.latest_candles.get(order.base_asset()).cloned() else {
                continue;
            };
            match resolve(order, &candle) {
                Resolution::Pending => {}
                Resolution::Promoted => promoted_ids.push(order.id().clone()),
                Resolution::Filled { price } => filled_ids.push((order.id().clone(), price)),
            }
        }

        for (order_id, price) in filled_ids {
            self.settle_and_remove(&order_id, price, commission).await;
        }

        if !promoted_ids.is_empty() {
            debug!(count = promoted_ids.len(), "stop-limit order(s) promoted to limit");
        }
    }

    async fn settle_and_remove(&mut self, order_id: &OrderId, price: Money, commission: Decimal) {
        let Some(index) = self.open_orders.iter().position(|o| o.id() == order_id) else {
            return;
        };
        let order = self.open_orders.remove(index);
        self.ledger.settle(order.owner(), &order, price, commission).await;
        self.journal.record_fill(order.base_asset(), order.side(), order.quantity(), price);

        if let Some(sibling_id) = order.sibling_id() {
            if let Some(sibling_index) = self.open_orders.iter().position(|o| o.id() == sibling_id) {
                let sibling = self.open_orders.remove(sibling_index);
                self.ledger.unblock(sibling.owner(), &sibling).await;
            }
        }
    }
}

/// Both OCO legs carry the request's single side, so their blocks are
/// always the same kind (both cash or both asset); take the larger amount.
fn max_blocked(
    a: crate::domain::order_execution::BlockedAmount,
    b: crate::domain::order_execution::BlockedAmount,
) -> crate::domain::order_execution::BlockedAmount {
    use crate::domain::order_execution::BlockedAmount;
    match (a, b) {
        (BlockedAmount::Cash(x), BlockedAmount::Cash(y)) => BlockedAmount::Cash(x.max(y)),
        (BlockedAmount::Asset(x), BlockedAmount::Asset(y)) => BlockedAmount::Asset(x.max(y)),
        (cash @ BlockedAmount::Cash(_), _) | (_, cash @ BlockedAmount::Cash(_)) => cash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order_execution::OrderType;
    use crate::domain::shared::{Quantity, UserId};
    use crate::ledger::InMemoryBalanceLedger;
    use crate::matching::candle_store::InMemoryCandleStore;
    use rust_decimal_macros::dec;

    fn clock() -> ClockConfig {
        ClockConfig {
            timeframe: Timeframe::OneHour,
            ticks_for_test: 1,
            seed_asset: Asset::new("BTC"),
        }
    }

    async fn seeded_engine(cash: Money) -> (Engine, Arc<InMemoryBalanceLedger>, Arc<InMemoryCandleStore>, UserId) {
        let ledger = Arc::new(InMemoryBalanceLedger::new());
        let candles = Arc::new(InMemoryCandleStore::new());
        let user = UserId::new("user-1");
        ledger.seed_cash(&user, cash).await;

        let engine = Engine::start(
            user.clone(),
            ledger.clone(),
            candles.clone(),
            clock(),
            1.0,
            dec!(0.001),
        );
        (engine, ledger, candles, user)
    }

    fn market_buy(owner: &UserId, quantity: Decimal) -> PlaceOrderRequest {
        PlaceOrderRequest {
            order_type: OrderType::Market,
            owner: owner.clone(),
            base_asset: Asset::new("BTC"),
            target_asset: Asset::new("USDT"),
            side: OrderSide::Buy,
            quantity: Quantity::new(quantity),
            execution_price: Some(Money::usd(100.0)),
            stop_price: None,
            oco_limit_price: None,
        }
    }

    #[tokio::test]
    async fn market_buy_settles_on_next_tick() {
        let (engine, ledger, candles, user) = seeded_engine(Money::usd(100_000.0)).await;
        let anchor = Timestamp::now_second_aligned();
        candles.insert(crate::domain::candle::Candle::new(
            Asset::new("BTC"),
            Timeframe::OneHour,
            anchor,
            dec!(100),
            dec!(100),
            dec!(100),
            dec!(100),
            dec!(1),
        ));

        let ids = match engine.place(market_buy(&user, dec!(10))).await {
            Ok(ids) => ids,
            Err(e) => panic!("should admit market buy: {e}"),
        };
        assert_eq!(ids.len(), 1);
        assert_eq!(engine.list_orders().await.len(), 1);

        engine.drive_tick().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(engine.list_orders().await.len(), 0);
        let balances = ledger.get(&user).await;
        assert_eq!(balances.cash(), Money::usd(98_999.0));
        assert_eq!(balances.asset(&Asset::new("BTC")), Quantity::new(dec!(10)));
    }

    #[tokio::test]
    async fn cancel_restores_balances_exactly() {
        let (engine, ledger, _candles, user) = seeded_engine(Money::usd(1000.0)).await;
        let request = PlaceOrderRequest {
            order_type: OrderType::Limit,
            owner: user.clone(),
            base_asset: Asset::new("BTC"),
            target_asset: Asset::new("USDT"),
            side: OrderSide::Buy,
            quantity: Quantity::new(dec!(1)),
            execution_price: Some(Money::usd(500.0)),
            stop_price: None,
            oco_limit_price: None,
        };

        let ids = match engine.place(request).await {
            Ok(ids) => ids,
            Err(e) => panic!("should admit limit buy: {e}"),
        };
        assert_eq!(ledger.get(&user).await.free_cash(), Money::usd(1000.0) - Money::usd(500.5));

        match engine.cancel(ids[0].clone()).await {
            Ok(()) => {}
            Err(e) => panic!("should cancel: {e}"),
        }
        assert_eq!(ledger.get(&user).await.free_cash(), Money::usd(1000.0));
        assert_eq!(engine.list_orders().await.len(), 0);
    }

    #[tokio::test]
    async fn insufficient_funds_is_rejected_without_side_effects() {
        let (engine, ledger, _candles, user) = seeded_engine(Money::usd(100.0)).await;
        let request = PlaceOrderRequest {
            order_type: OrderType::Limit,
            owner: user.clone(),
            base_asset: Asset::new("BTC"),
            target_asset: Asset::new("USDT"),
            side: OrderSide::Buy,
            quantity: Quantity::new(dec!(1)),
            execution_price: Some(Money::usd(200.0)),
            stop_price: None,
            oco_limit_price: None,
        };

        assert!(engine.place(request).await.is_err());
        assert_eq!(ledger.get(&user).await.free_cash(), Money::usd(100.0));
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let (engine, _ledger, _candles, _user) = seeded_engine(Money::usd(1.0)).await;
        engine.stop().await;
        engine.stop().await;
        assert!(!engine.is_running());
    }
}
