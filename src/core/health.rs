//! Background liveness polling.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::api::AnsweringBackend;

/// Polls `health_check()` on a fixed interval and publishes the latest
/// result. `None` until the first check finishes. The task stops when the
/// monitor is dropped.
pub struct HealthMonitor {
    receiver: watch::Receiver<Option<bool>>,
    task: JoinHandle<()>,
}

impl HealthMonitor {
    pub fn spawn(backend: Arc<dyn AnsweringBackend>, interval: Duration) -> Self {
        let (sender, receiver) = watch::channel(None);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let healthy = backend.health_check().await;
                let changed = sender.send_if_modified(|current| {
                    let changed = *current != Some(healthy);
                    *current = Some(healthy);
                    changed
                });
                if changed {
                    debug!(healthy, "backend health changed");
                }
                if sender.is_closed() {
                    break;
                }
            }
        });
        Self { receiver, task }
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<bool>> {
        self.receiver.clone()
    }

    pub fn latest(&self) -> Option<bool> {
        *self.receiver.borrow()
    }
}

impl Drop for HealthMonitor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::StubBackend;

    #[tokio::test]
    async fn publishes_each_transition() {
        let backend = StubBackend::new().health_sequence(&[true, false]);
        let monitor = HealthMonitor::spawn(Arc::new(backend), Duration::from_millis(50));
        let mut receiver = monitor.subscribe();
        assert_eq!(*receiver.borrow(), None);

        receiver.changed().await.expect("first check");
        assert_eq!(*receiver.borrow_and_update(), Some(true));
        receiver.changed().await.expect("second check");
        assert_eq!(*receiver.borrow_and_update(), Some(false));
        assert!(monitor.latest().is_some());
    }

    #[tokio::test]
    async fn dropping_the_monitor_stops_polling() {
        let backend = Arc::new(StubBackend::new());
        let monitor = HealthMonitor::spawn(backend.clone(), Duration::from_millis(5));
        let mut receiver = monitor.subscribe();
        receiver.changed().await.expect("first check");
        drop(monitor);

        tokio::time::sleep(Duration::from_millis(20)).await;
        let checks = backend.check_count();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(backend.check_count(), checks);
    }
}
