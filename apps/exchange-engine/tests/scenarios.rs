//! End-to-end replay scenarios driven through the public `Engine`/`ExchangeManager`
//! surface, one per literal example in the trading semantics section.

use std::sync::Arc;
use std::time::Duration;

use exchange_engine::domain::candle::{Candle, Timeframe};
use exchange_engine::domain::order_execution::{OrderSide, OrderType, PlaceOrderRequest};
use exchange_engine::domain::shared::{Asset, Money, Quantity, Timestamp, UserId};
use exchange_engine::ledger::{BalanceLedger, InMemoryBalanceLedger};
use exchange_engine::manager::{ExchangeManager, DEFAULT_COMMISSION};
use exchange_engine::matching::{ClockConfig, Engine, InMemoryCandleStore};
use exchange_engine::persistence::{InMemorySnapshotStore, InMemoryUserStore, UserStore};
use rust_decimal_macros::dec;

fn clock() -> ClockConfig {
    clock_n(1)
}

/// A clock seeking `n` ticks before the newest BTC candle on record, so a
/// test can insert exactly `n` candles (oldest first, one per tick) and
/// expect them to resolve on ticks 1..=n in order.
fn clock_n(n: i64) -> ClockConfig {
    ClockConfig {
        timeframe: Timeframe::OneHour,
        ticks_for_test: n,
        seed_asset: Asset::new("BTC"),
    }
}

fn candle_at(asset: &str, ts: Timestamp, close: rust_decimal::Decimal) -> Candle {
    Candle::new(Asset::new(asset), Timeframe::OneHour, ts, close, close, close, close, dec!(1))
}

async fn settle(engine: &Engine) {
    engine.drive_tick().await;
    tokio::time::sleep(Duration::from_millis(20)).await;
}

fn request(
    order_type: OrderType,
    side: OrderSide,
    owner: &UserId,
    quantity: rust_decimal::Decimal,
    execution_price: Option<Money>,
    stop_price: Option<Money>,
) -> PlaceOrderRequest {
    PlaceOrderRequest {
        order_type,
        owner: owner.clone(),
        base_asset: Asset::new("BTC"),
        target_asset: Asset::new("USDT"),
        side,
        quantity: Quantity::new(quantity),
        execution_price,
        stop_price,
        oco_limit_price: None,
    }
}

/// Limit buy triggers on the third candle's dip, not the first two.
#[tokio::test]
async fn limit_buy_triggers_on_a_dip_after_two_pending_ticks() {
    let ledger = Arc::new(InMemoryBalanceLedger::new());
    let candles = Arc::new(InMemoryCandleStore::new());
    let user = UserId::new("user-1");
    ledger.seed_cash(&user, Money::usd(10_000.0)).await;

    let engine = Engine::start(user.clone(), ledger.clone(), candles.clone(), clock_n(3), 1.0, dec!(0.001));

    let anchor = Timestamp::now_second_aligned();
    candles.insert(candle_at("BTC", Timestamp::new(anchor.as_datetime() - chrono::Duration::hours(2)), dec!(120)));
    candles.insert(candle_at("BTC", Timestamp::new(anchor.as_datetime() - chrono::Duration::hours(1)), dec!(110)));
    candles.insert(candle_at("BTC", anchor, dec!(95)));

    let req = request(OrderType::Limit, OrderSide::Buy, &user, dec!(5), Some(Money::usd(100.0)), None);
    if let Err(e) = engine.place(req).await {
        panic!("should admit limit buy: {e}");
    }

    settle(&engine).await;
    assert_eq!(engine.list_orders().await.len(), 1, "tick 1 (close 120) must not fill");
    assert_eq!(ledger.get(&user).await.free_cash(), Money::usd(9_499.5));

    settle(&engine).await;
    assert_eq!(engine.list_orders().await.len(), 1, "tick 2 (close 110) must not fill");

    settle(&engine).await;
    assert_eq!(engine.list_orders().await.len(), 0, "tick 3 (close 95 <= 100) must fill");

    let balances = ledger.get(&user).await;
    assert_eq!(balances.cash(), Money::usd(9_499.5));
    assert_eq!(balances.asset(&Asset::new("BTC")), Quantity::new(dec!(5)));
}

/// A stop-limit sell promotes to a limit once the stop triggers, then
/// stays open because the limit leg has not yet crossed.
#[tokio::test]
async fn stop_limit_sell_promotes_then_waits_on_its_limit_leg() {
    let ledger = Arc::new(InMemoryBalanceLedger::new());
    let candles = Arc::new(InMemoryCandleStore::new());
    let user = UserId::new("user-1");
    ledger.seed_cash(&user, Money::usd(1_000.0)).await;
    {
        // Seed a BTC holding directly through settlement of a market buy so the
        // SELL below has something to block.
        let setup_candles = Arc::new(InMemoryCandleStore::new());
        let setup_anchor = Timestamp::now_second_aligned();
        setup_candles.insert(candle_at("BTC", setup_anchor, dec!(1)));
        let setup_engine = Engine::start(user.clone(), ledger.clone(), setup_candles, clock_n(1), 1.0, dec!(0.0));
        let req = request(OrderType::Market, OrderSide::Buy, &user, dec!(3), Some(Money::usd(1.0)), None);
        if let Err(e) = setup_engine.place(req).await {
            panic!("should admit setup market buy: {e}");
        }
        settle(&setup_engine).await;
        setup_engine.stop().await;
    }

    let engine = Engine::start(user.clone(), ledger.clone(), candles.clone(), clock_n(3), 1.0, dec!(0.0));
    let anchor = Timestamp::now_second_aligned();
    candles.insert(candle_at("BTC", Timestamp::new(anchor.as_datetime() - chrono::Duration::hours(2)), dec!(200)));
    candles.insert(candle_at("BTC", Timestamp::new(anchor.as_datetime() - chrono::Duration::hours(1)), dec!(180)));
    candles.insert(candle_at("BTC", anchor, dec!(170)));

    let req = request(
        OrderType::StopLimit,
        OrderSide::Sell,
        &user,
        dec!(3),
        Some(Money::usd(185.0)),
        Some(Money::usd(190.0)),
    );
    if let Err(e) = engine.place(req).await {
        panic!("should admit stop-limit sell: {e}");
    }

    settle(&engine).await;
    assert_eq!(engine.list_orders().await.len(), 1, "tick 1 (close 200) is inactive");

    settle(&engine).await;
    assert_eq!(engine.list_orders().await.len(), 1, "tick 2 (close 180 <= 190) promotes, stays open");

    settle(&engine).await;
    assert_eq!(
        engine.list_orders().await.len(),
        1,
        "tick 3 (close 170 < limit 185) must not trigger a SELL limit"
    );

    let balances = ledger.get(&user).await;
    assert_eq!(balances.free_asset(&Asset::new("BTC")), Quantity::ZERO, "all 3 BTC remain blocked");
}

/// The reaper stops an idle engine; the next `place` call re-hydrates it
/// transparently via the manager, without the caller calling `start` again.
#[tokio::test]
async fn idle_eviction_then_place_rehydrates_the_engine() {
    let ledger = Arc::new(InMemoryBalanceLedger::new());
    let manager = Arc::new(ExchangeManager::new(
        ledger.clone(),
        Arc::new(InMemoryCandleStore::new()),
        Arc::new(InMemorySnapshotStore::new()),
        clock(),
    ));
    let user = UserId::new("user-1");

    manager.start(&user).await;
    manager.set_multiplier(&user, 2.0).await;
    assert!(manager.get(&user).await.is_some());

    let far_future = Timestamp::new(chrono::Utc::now() + chrono::Duration::minutes(10));
    manager.evict_idle(far_future).await;
    assert!(manager.get(&user).await.is_none(), "idle engine must be evicted");

    let rehydrated = manager.start(&user).await;
    assert!(rehydrated.is_running());
    assert_eq!(rehydrated.meta().await.multiplier, 2.0, "snapshot carries the persisted multiplier");
    assert_eq!(rehydrated.meta().await.commission, DEFAULT_COMMISSION);

    let req = request(OrderType::Market, OrderSide::Buy, &user, dec!(1), Some(Money::usd(100.0)), None);
    if let Err(e) = rehydrated.place(req).await {
        panic!("rehydrated engine should admit orders: {e}");
    }
}

/// Smoke-tests the full minted-user bootstrap: a fresh user gets the
/// documented starting cash the moment their engine first starts.
#[tokio::test]
async fn fresh_user_starts_with_the_default_cash_balance() {
    let ledger = Arc::new(InMemoryBalanceLedger::new());
    let users = Arc::new(InMemoryUserStore::new());
    let manager = Arc::new(ExchangeManager::new(
        ledger.clone(),
        Arc::new(InMemoryCandleStore::new()),
        Arc::new(InMemorySnapshotStore::new()),
        clock(),
    ));

    let user = exchange_engine::domain::user::User::mint();
    if let Err(e) = users.insert(&user).await {
        panic!("should insert user: {e}");
    }

    manager.start(user.id()).await;
    assert_eq!(
        ledger.get(user.id()).await.cash(),
        exchange_engine::manager::DEFAULT_STARTING_CASH
    );
}
