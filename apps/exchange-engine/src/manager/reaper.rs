//! Background eviction of idle engines.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::ExchangeManager;
use crate::domain::shared::Timestamp;

const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Spawn the 60-second reaper loop. Returns the task handle so callers can
/// abort it on shutdown; dropping the handle does not stop the task.
pub fn spawn_reaper(manager: Arc<ExchangeManager>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAPER_INTERVAL);
        loop {
            ticker.tick().await;
            debug!("reaper sweep starting");
            manager.evict_idle(Timestamp::now()).await;
        }
    })
}
