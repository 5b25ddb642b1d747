use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::ttl::TtlCache;

/// Run [`TtlCache::sweep`] every `period` until `shutdown` is cancelled.
///
/// The first sweep happens one full period after spawning. Must be called from
/// within a tokio runtime.
pub fn spawn_sweeper<V>(
    cache: Arc<TtlCache<V>>,
    period: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()>
where
    V: Clone + Send + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(period_secs = period.as_secs(), "Cache sweeper started");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let removed = cache.sweep();
                    debug!(removed, "Periodic cache sweep finished");
                }
            }
        }
        info!("Cache sweeper stopped");
    })
}
