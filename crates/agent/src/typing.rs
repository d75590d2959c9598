//! Periodic partial-message refresh while a reply is streaming.
//!
//! Runs beside the stream consumer and only ever reads the shared buffer
//! under its lock, so chunk accumulation is never blocked for longer than
//! one copy.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use crate::reply::ReplySink;

pub struct TypingRefresher {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl TypingRefresher {
    /// Every `every`, push the buffer to `sink` if it grew by at least
    /// `min_growth` bytes since the last push; otherwise refresh the typing
    /// indicator.
    pub fn spawn(buffer: Arc<Mutex<String>>, sink: Arc<dyn ReplySink>, every: Duration, min_growth: usize) -> Self {
        let (stop, mut stopped) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut flushed = 0usize;

            loop {
                tokio::select! {
                    _ = &mut stopped => break,
                    _ = ticker.tick() => {
                        let snapshot = {
                            let buf = buffer.lock().await;
                            let grown = buf.len().saturating_sub(flushed);
                            (grown > 0 && grown >= min_growth).then(|| buf.clone())
                        };

                        let result = match snapshot {
                            Some(text) => {
                                flushed = text.len();
                                sink.partial(&text).await
                            }
                            None => sink.typing().await,
                        };
                        if let Err(e) = result {
                            debug!(error = %e, "Typing refresh failed");
                        }
                    }
                }
            }
        });

        Self { stop, handle }
    }

    /// Stop refreshing and wait for the task to exit.
    pub async fn stop(self) {
        let _ = self.stop.send(());
        let _ = self.handle.await;
    }
}
