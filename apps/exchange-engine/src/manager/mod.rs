//! Exchange Manager (C5)
//!
//! Owns the `user_id → engine` map. At most one live [`Engine`] exists per
//! user at any moment; every map mutation is serialized behind a single
//! mutex. A background reaper evicts engines idle for more than 5
//! wall-clock minutes, persisting their snapshot first so a later `start`
//! rehydrates transparently.

mod reaper;

pub use reaper::spawn_reaper;

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::candle::Timeframe;
use crate::domain::shared::{Money, UserId};
use crate::ledger::BalanceLedger;
use crate::matching::{CandleStore, ClockConfig, Engine};
use crate::persistence::{ExchangeSnapshot, SnapshotStore};

/// Default starting cash for a user whose snapshot has never been persisted.
pub const DEFAULT_STARTING_CASH: Money = Money::new(Decimal::from_parts(100_000, 0, 0, false, 0));
/// Default commission rate for a freshly hydrated engine.
pub const DEFAULT_COMMISSION: Decimal = Decimal::from_parts(1, 0, 0, false, 3); // 0.001
/// An engine idle longer than this (wall-clock) is evicted by the reaper.
pub const IDLE_EVICTION_SECONDS: i64 = 5 * 60;

/// Multi-tenant registry of running engines.
pub struct ExchangeManager {
    engines: Mutex<HashMap<UserId, Engine>>,
    ledger: Arc<dyn BalanceLedger>,
    candles: Arc<dyn CandleStore>,
    snapshots: Arc<dyn SnapshotStore>,
    clock: ClockConfig,
}

impl ExchangeManager {
    /// Construct a manager with no running engines.
    #[must_use]
    pub fn new(
        ledger: Arc<dyn BalanceLedger>,
        candles: Arc<dyn CandleStore>,
        snapshots: Arc<dyn SnapshotStore>,
        clock: ClockConfig,
    ) -> Self {
        Self {
            engines: Mutex::new(HashMap::new()),
            ledger,
            candles,
            snapshots,
            clock,
        }
    }

    /// Return the running engine for `user`, starting (or rehydrating) one
    /// if none is running yet.
    pub async fn start(&self, user: &UserId) -> Engine {
        let mut engines = self.engines.lock().await;
        if let Some(engine) = engines.get(user) {
            return engine.clone();
        }

        let existing_snapshot = self.snapshots.load(user).await;
        if existing_snapshot.is_none() {
            self.ledger.seed_cash(user, DEFAULT_STARTING_CASH).await;
        }
        let snapshot = existing_snapshot.unwrap_or_else(|| ExchangeSnapshot {
            user_id: user.clone(),
            last_used: crate::domain::shared::Timestamp::now(),
            multiplier: 1.0,
            commission: DEFAULT_COMMISSION,
        });

        let engine = Engine::start(
            user.clone(),
            self.ledger.clone(),
            self.candles.clone(),
            self.clock.clone(),
            snapshot.multiplier,
            snapshot.commission,
        );
        engines.insert(user.clone(), engine.clone());
        info!(%user, "engine started");
        engine
    }

    /// Return the running engine for `user` without implicitly starting
    /// one — used by operations that should fail with *not found* rather
    /// than auto-hydrate (the spec reserves auto-rehydration for `place`).
    pub async fn get(&self, user: &UserId) -> Option<Engine> {
        self.engines.lock().await.get(user).cloned()
    }

    /// Stop and persist the snapshot for `user`'s engine, if running.
    /// Idempotent: stopping an absent engine is a no-op.
    pub async fn stop(&self, user: &UserId) {
        let mut engines = self.engines.lock().await;
        let Some(engine) = engines.remove(user) else {
            return;
        };
        self.persist_and_stop(user, &engine).await;
    }

    /// Change the wall-time speedup factor on the live engine and persist
    /// it for the next hydration.
    pub async fn set_multiplier(&self, user: &UserId, multiplier: f64) {
        if let Some(engine) = self.get(user).await {
            engine.set_multiplier(multiplier).await;
            self.persist_live_meta(user, &engine).await;
        }
    }

    /// Change the commission rate on the live engine and persist it.
    pub async fn set_commission(&self, user: &UserId, commission: Decimal) {
        if let Some(engine) = self.get(user).await {
            engine.set_commission(commission).await;
            self.persist_live_meta(user, &engine).await;
        }
    }

    /// Evict every engine idle longer than [`IDLE_EVICTION_SECONDS`],
    /// persisting each one's snapshot first. Called by the reaper task.
    pub async fn evict_idle(&self, now: crate::domain::shared::Timestamp) {
        let idle_users: Vec<UserId> = {
            let engines = self.engines.lock().await;
            let mut idle = Vec::new();
            for (user, engine) in engines.iter() {
                let meta = engine.meta().await;
                let idle_secs = now.unix_seconds() - meta.last_activity.unix_seconds();
                if idle_secs > IDLE_EVICTION_SECONDS {
                    idle.push(user.clone());
                }
            }
            idle
        };

        for user in idle_users {
            info!(%user, "evicting idle engine");
            self.stop(&user).await;
        }
    }

    async fn persist_and_stop(&self, user: &UserId, engine: &Engine) {
        self.persist_live_meta(user, engine).await;
        engine.stop().await;
    }

    async fn persist_live_meta(&self, user: &UserId, engine: &Engine) {
        let meta = engine.meta().await;
        let snapshot = ExchangeSnapshot {
            user_id: user.clone(),
            last_used: crate::domain::shared::Timestamp::now(),
            multiplier: meta.multiplier,
            commission: meta.commission,
        };
        // A persistence failure here must not prevent the in-memory stop:
        // the engine is already gone from the map by the time the caller
        // observes the result, so the user is never locked into a ghost
        // engine even if this retry also fails.
        if self.snapshots.save(&snapshot).await.is_err() {
            let _ = self.snapshots.save(&snapshot).await;
        }
    }
}
