//! Debounced background flush of the resource property cache
//!
//! One worker task per project coalesces bursts of dirty signals into a
//! single disk write. The state machine is IDLE → PENDING → IDLE: the first
//! dirty signal arms a deadline measured from that signal, further signals
//! before the deadline are absorbed, and the flush runs on a blocking thread
//! once the deadline passes. Signals arriving while a flush is in progress
//! stay queued in the channel and re-arm the worker afterwards, so the final
//! in-memory state always reaches disk.

use crate::error::HealthMonitor;
use crate::event::{EventBus, StoreEvent};
use crate::metadata::{FlushOutcome, ResourcePropertyCache};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Configuration for the sync worker
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Quiet period between the first dirty signal of a burst and the flush
    pub flush_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_delay: Duration::from_millis(100),
        }
    }
}

enum SyncCommand {
    Dirty,
    Shutdown,
}

/// Handle to a project's flush worker
pub struct SyncScheduler {
    tx: mpsc::UnboundedSender<SyncCommand>,
    disposed: AtomicBool,
}

impl SyncScheduler {
    /// Spawn the worker task. Must be called within a Tokio runtime.
    pub(crate) fn start(
        cache: Arc<ResourcePropertyCache>,
        events: EventBus,
        health: Arc<HealthMonitor>,
        config: SyncConfig,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_worker(rx, cache, events, health, config.flush_delay));
        Self {
            tx,
            disposed: AtomicBool::new(false),
        }
    }

    /// Signal that cache content changed and needs an eventual flush.
    ///
    /// Ignored after disposal has begun.
    pub fn mark_dirty(&self) {
        if self.disposed.load(Ordering::Acquire) {
            return;
        }
        let _ = self.tx.send(SyncCommand::Dirty);
    }

    /// Stop accepting dirty signals and let any pending flush complete
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        let _ = self.tx.send(SyncCommand::Shutdown);
    }
}

async fn run_worker(
    mut rx: mpsc::UnboundedReceiver<SyncCommand>,
    cache: Arc<ResourcePropertyCache>,
    events: EventBus,
    health: Arc<HealthMonitor>,
    delay: Duration,
) {
    loop {
        // IDLE: wait for the first dirty signal of a burst
        match rx.recv().await {
            Some(SyncCommand::Dirty) => {}
            Some(SyncCommand::Shutdown) | None => break,
        }

        // PENDING: the delay is measured from that first signal; later
        // signals in the burst are absorbed without re-arming
        let deadline = tokio::time::Instant::now() + delay;
        let mut shutting_down = false;
        loop {
            tokio::select! {
                _ = tokio::time::sleep_until(deadline) => break,
                cmd = rx.recv() => match cmd {
                    Some(SyncCommand::Dirty) => {}
                    Some(SyncCommand::Shutdown) | None => {
                        // A pending flush still runs to completion
                        shutting_down = true;
                        break;
                    }
                }
            }
        }

        flush_once(&cache, &events, &health).await;

        if shutting_down {
            break;
        }
    }
    debug!("Metadata sync worker stopped");
}

async fn flush_once(
    cache: &Arc<ResourcePropertyCache>,
    events: &EventBus,
    health: &Arc<HealthMonitor>,
) {
    let cache = Arc::clone(cache);
    match tokio::task::spawn_blocking(move || cache.flush_to_disk()).await {
        Ok(Ok(FlushOutcome::Written { resources })) => {
            events.publish(StoreEvent::MetadataFlushed { resources });
        }
        Ok(Ok(FlushOutcome::Skipped)) => {
            debug!("Metadata flush skipped, nothing to write");
        }
        Ok(Err(e)) => {
            // In-memory state is untouched; the next dirty signal retries
            warn!(error = %e, "Failed to flush resource metadata");
            health.record("metadata.flush", e.to_string());
            events.publish(StoreEvent::FlushFailed(e.to_string()));
        }
        Err(e) => {
            warn!(error = %e, "Metadata flush task failed to run");
            health.record("metadata.flush", e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::ProjectLayout;
    use crate::value::PropertyValue;
    use tokio::sync::broadcast::error::TryRecvError;

    fn test_cache(root: &std::path::Path, events: EventBus) -> Arc<ResourcePropertyCache> {
        Arc::new(ResourcePropertyCache::new(
            ProjectLayout::new(root),
            false,
            Arc::new(HealthMonitor::new()),
            events,
        ))
    }

    async fn wait_for_flush(rx: &mut tokio::sync::broadcast::Receiver<StoreEvent>) -> usize {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match rx.recv().await {
                    Ok(StoreEvent::MetadataFlushed { resources }) => return resources,
                    Ok(_) => {}
                    Err(e) => panic!("event bus closed: {}", e),
                }
            }
        })
        .await
        .expect("flush did not happen in time")
    }

    fn drain_flush_count(rx: &mut tokio::sync::broadcast::Receiver<StoreEvent>) -> usize {
        let mut count = 0;
        loop {
            match rx.try_recv() {
                Ok(StoreEvent::MetadataFlushed { .. }) => count += 1,
                Ok(_) => {}
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return count,
                Err(TryRecvError::Lagged(_)) => {}
            }
        }
    }

    #[tokio::test]
    async fn test_burst_coalesces_into_one_flush() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::default_capacity();
        let mut rx = events.subscribe();
        let cache = test_cache(dir.path(), events.clone());
        let scheduler = SyncScheduler::start(
            Arc::clone(&cache),
            events,
            Arc::new(HealthMonitor::new()),
            SyncConfig {
                flush_delay: Duration::from_millis(50),
            },
        );

        for i in 0..5 {
            cache.set_property("res", &format!("p{}", i), Some(PropertyValue::Number(i as f64)));
            scheduler.mark_dirty();
        }

        let resources = wait_for_flush(&mut rx).await;
        assert_eq!(resources, 1);

        // No trailing flushes after the burst settled
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(drain_flush_count(&mut rx), 0);

        let content =
            std::fs::read_to_string(ProjectLayout::new(dir.path()).metadata_file()).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(doc["resources"]["res"].as_object().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_dirty_after_flush_rearms() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::default_capacity();
        let mut rx = events.subscribe();
        let cache = test_cache(dir.path(), events.clone());
        let scheduler = SyncScheduler::start(
            Arc::clone(&cache),
            events,
            Arc::new(HealthMonitor::new()),
            SyncConfig {
                flush_delay: Duration::from_millis(20),
            },
        );

        cache.set_property("a", "x", Some(PropertyValue::from("1")));
        scheduler.mark_dirty();
        wait_for_flush(&mut rx).await;

        cache.set_property("a", "x", Some(PropertyValue::from("2")));
        scheduler.mark_dirty();
        wait_for_flush(&mut rx).await;

        let content =
            std::fs::read_to_string(ProjectLayout::new(dir.path()).metadata_file()).unwrap();
        assert!(content.contains("\"2\""));
    }

    #[tokio::test]
    async fn test_pending_flush_completes_on_dispose() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::default_capacity();
        let mut rx = events.subscribe();
        let cache = test_cache(dir.path(), events.clone());
        let scheduler = SyncScheduler::start(
            Arc::clone(&cache),
            events,
            Arc::new(HealthMonitor::new()),
            SyncConfig {
                flush_delay: Duration::from_secs(60),
            },
        );

        cache.set_property("a", "x", Some(PropertyValue::from("1")));
        scheduler.mark_dirty();
        // Disposal cuts the quiet period short but still persists
        scheduler.dispose();

        let resources = wait_for_flush(&mut rx).await;
        assert_eq!(resources, 1);
    }

    #[tokio::test]
    async fn test_no_flush_scheduled_after_dispose() {
        let dir = tempfile::tempdir().unwrap();
        let events = EventBus::default_capacity();
        let mut rx = events.subscribe();
        let cache = test_cache(dir.path(), events.clone());
        let scheduler = SyncScheduler::start(
            Arc::clone(&cache),
            events,
            Arc::new(HealthMonitor::new()),
            SyncConfig {
                flush_delay: Duration::from_millis(10),
            },
        );

        scheduler.dispose();
        cache.set_property("a", "x", Some(PropertyValue::from("1")));
        scheduler.mark_dirty();

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(drain_flush_count(&mut rx), 0);
        assert!(!ProjectLayout::new(dir.path()).metadata_file().exists());
    }
}
