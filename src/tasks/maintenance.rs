//! Cache Maintenance Task
//!
//! Background task that periodically evicts aged images from the cache.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::ImageCache;

/// Spawns a background task that evicts cache entries older than
/// `max_age_secs` every `interval_secs`.
///
/// The returned handle is aborted during graceful shutdown.
///
/// # Example
/// ```ignore
/// let cache = Arc::new(RwLock::new(ImageCache::open(store)));
/// let handle = spawn_maintenance_task(cache.clone(), 604_800, 3600);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_maintenance_task(
    cache: Arc<RwLock<ImageCache>>,
    max_age_secs: u64,
    interval_secs: u64,
) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs);
    let max_age_ms = max_age_secs.saturating_mul(1000);

    tokio::spawn(async move {
        info!(
            "Starting cache maintenance task: interval {}s, max age {}s",
            interval_secs, max_age_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut cache_guard = cache.write().await;
                cache_guard.evict_older_than(max_age_ms)
            };

            if removed > 0 {
                info!("Cache maintenance: evicted {} aged images", removed);
            } else {
                debug!("Cache maintenance: nothing to evict");
            }
        }
    })
}
