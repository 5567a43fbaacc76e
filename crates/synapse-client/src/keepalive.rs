//! Periodic keepalive while the event connection is up.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use synapse_training::{ConnectionStatus, Keepalive};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::connection::EventConnection;

/// Something keepalives can be sent through.
pub trait KeepaliveSink: Send + Sync + 'static {
    fn watch_status(&self) -> watch::Receiver<ConnectionStatus>;
    fn emit_keepalive(&self, payload: Keepalive);
}

impl KeepaliveSink for EventConnection {
    fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
        Self::watch_status(self)
    }

    fn emit_keepalive(&self, payload: Keepalive) {
        Self::emit_keepalive(self, payload);
    }
}

/// Sends `keepalive {timestamp}` every interval while connected. Pauses on
/// disconnect and resumes, with a fresh interval, on reconnect.
pub struct KeepaliveMonitor {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl KeepaliveMonitor {
    pub fn spawn<S: KeepaliveSink>(sink: Arc<S>, interval: Duration) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(sink, interval, cancel.clone()));
        Self { cancel, task }
    }

    /// Stop sending keepalives.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        let _ = (&mut self.task).await;
    }
}

impl Drop for KeepaliveMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<S: KeepaliveSink>(sink: Arc<S>, period: Duration, cancel: CancellationToken) {
    let mut status = sink.watch_status();

    loop {
        while !status.borrow_and_update().connected {
            tokio::select! {
                () = cancel.cancelled() => return,
                changed = status.changed() => if changed.is_err() { return },
            }
        }

        debug!(interval_secs = period.as_secs(), "Keepalive started");
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = cancel.cancelled() => return,
                _ = ticker.tick() => {
                    let payload = Keepalive { timestamp: Utc::now().timestamp_millis() };
                    trace!(timestamp = payload.timestamp, "Sending keepalive");
                    sink.emit_keepalive(payload);
                }
                changed = status.changed() => {
                    if changed.is_err() {
                        return;
                    }
                    if !status.borrow_and_update().connected {
                        debug!("Keepalive paused, connection lost");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeSink {
        status: watch::Sender<ConnectionStatus>,
        sent: Mutex<Vec<Keepalive>>,
    }

    impl FakeSink {
        fn new() -> Arc<Self> {
            let (status, _) = watch::channel(ConnectionStatus::disconnected());
            Arc::new(Self { status, sent: Mutex::new(Vec::new()) })
        }

        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl KeepaliveSink for FakeSink {
        fn watch_status(&self) -> watch::Receiver<ConnectionStatus> {
            self.status.subscribe()
        }

        fn emit_keepalive(&self, payload: Keepalive) {
            self.sent.lock().unwrap().push(payload);
        }
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_while_disconnected() {
        let sink = FakeSink::new();
        let monitor = KeepaliveMonitor::spawn(Arc::clone(&sink), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(95)).await;
        assert_eq!(sink.sent(), 0);
        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_while_connected_and_pauses_on_disconnect() {
        let sink = FakeSink::new();
        let monitor = KeepaliveMonitor::spawn(Arc::clone(&sink), Duration::from_secs(30));
        settle().await;

        sink.status.send_replace(ConnectionStatus::connected(Some("s1".to_string())));
        settle().await;
        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;
        assert_eq!(sink.sent(), 2);

        sink.status.send_replace(ConnectionStatus::disconnected());
        settle().await;
        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(sink.sent(), 2);

        sink.status.send_replace(ConnectionStatus::connected(Some("s2".to_string())));
        settle().await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(sink.sent(), 3);

        monitor.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_ticks() {
        let sink = FakeSink::new();
        sink.status.send_replace(ConnectionStatus::connected(None));
        let monitor = KeepaliveMonitor::spawn(Arc::clone(&sink), Duration::from_secs(30));
        settle().await;
        monitor.stop().await;

        tokio::time::sleep(Duration::from_secs(90)).await;
        assert_eq!(sink.sent(), 0);
    }
}
