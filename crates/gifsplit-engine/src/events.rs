//! Per-job progress event delivery.
//!
//! One broadcast channel per live execution, registered when the job
//! launches and released right after its terminal event. Publishing never
//! depends on a consumer being attached; subscribers receive events from
//! attachment onward only.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tracing::warn;

use gifsplit_models::{JobEvent, JobId};

/// Buffered events per channel before a slow subscriber starts lagging.
const CHANNEL_CAPACITY: usize = 256;

/// Registry of live per-job event channels.
pub struct EventHub {
    channels: Mutex<HashMap<JobId, broadcast::Sender<JobEvent>>>,
    keepalive: Duration,
}

impl EventHub {
    pub fn new(keepalive: Duration) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            keepalive,
        }
    }

    /// Open the channel for a job about to execute.
    pub async fn register(&self, id: &JobId) {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        self.channels.lock().await.insert(id.clone(), tx);
    }

    /// Publish an event to a job's channel, if one is live.
    ///
    /// A send error only means nobody is attached right now; execution never
    /// cares.
    pub async fn publish(&self, id: &JobId, event: JobEvent) {
        if let Some(tx) = self.channels.lock().await.get(id) {
            let _ = tx.send(event);
        }
    }

    /// Drop a job's channel.
    ///
    /// Called after the terminal event is published; attached subscribers
    /// still drain everything already sent before they observe the close.
    pub async fn release(&self, id: &JobId) {
        self.channels.lock().await.remove(id);
    }

    /// Subscribe to a live job's events. `None` when no execution is live.
    pub async fn subscribe(&self, id: &JobId) -> Option<EventStream> {
        let channels = self.channels.lock().await;
        channels.get(id).map(|tx| EventStream {
            rx: tx.subscribe(),
            keepalive: self.keepalive,
            done: false,
        })
    }
}

/// One subscriber's ordered view of a job's events.
///
/// Yields `keepalive` when the channel stays quiet for the idle interval and
/// ends after the terminal event (or after the channel closes underneath a
/// subscriber that attached mid-drain).
pub struct EventStream {
    rx: broadcast::Receiver<JobEvent>,
    keepalive: Duration,
    done: bool,
}

impl EventStream {
    /// Next event, or `None` once the stream is finished.
    pub async fn next(&mut self) -> Option<JobEvent> {
        if self.done {
            return None;
        }
        loop {
            match tokio::time::timeout(self.keepalive, self.rx.recv()).await {
                Ok(Ok(event)) => {
                    if event.is_terminal() {
                        self.done = true;
                    }
                    return Some(event);
                }
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "Event subscriber lagged; continuing");
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => {
                    self.done = true;
                    return None;
                }
                Err(_) => return Some(JobEvent::Keepalive),
            }
        }
    }
}
