//! Checkpoint Task
//!
//! Flush-owner task that debounces persistence requests for one cache.
//!
//! The task is either idle or holds a pending deadline. Every `Schedule`
//! command (re)starts the deadline; when it passes, exactly one checkpoint runs
//! no matter how many requests arrived in the window. The task is the only
//! owner of the cache's [`Persistence`] layer, so flushes never overlap.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::cache::CacheStore;
use crate::persistence::{Persistence, SaveOutcome};
use crate::persistent::lock_store;

/// Messages accepted by the checkpoint task.
#[derive(Debug)]
pub enum CheckpointCommand {
    /// State changed; flush once things go quiet
    Schedule,
    /// Store was cleared; drop the shadow state and flush right away
    Reset,
    /// Flush right away and report the outcome
    Flush(oneshot::Sender<SaveOutcome>),
}

/// Debounce window for a store holding `size` entries.
///
/// Grows by 100ms per hundred entries, bounded by `min` and `max`.
pub fn debounce_window(size: usize, min: Duration, max: Duration) -> Duration {
    let scaled = Duration::from_millis(size as u64);
    scaled.clamp(min, max)
}

/// Spawns the checkpoint task for `store`.
///
/// The task exits once every sender is dropped, flushing first if a
/// checkpoint was pending.
pub fn spawn_checkpoint_task(
    store: Arc<Mutex<CacheStore>>,
    mut persistence: Persistence,
    mut commands: mpsc::UnboundedReceiver<CheckpointCommand>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(record = %persistence.record_key(), "Checkpoint task started");
        let mut deadline: Option<Instant> = None;

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(CheckpointCommand::Schedule) => {
                        let window = {
                            let guard = lock_store(&store);
                            let config = guard.config();
                            debounce_window(guard.len(), config.debounce_min, config.debounce_max)
                        };
                        deadline = Some(Instant::now() + window);
                    }
                    Some(CheckpointCommand::Reset) => {
                        deadline = None;
                        persistence.reset();
                        checkpoint(&store, &mut persistence).await;
                    }
                    Some(CheckpointCommand::Flush(reply)) => {
                        deadline = None;
                        let outcome = checkpoint(&store, &mut persistence).await;
                        let _ = reply.send(outcome);
                    }
                    None => {
                        if deadline.is_some() {
                            checkpoint(&store, &mut persistence).await;
                        }
                        break;
                    }
                },
                _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = None;
                    checkpoint(&store, &mut persistence).await;
                }
            }
        }

        debug!(record = %persistence.record_key(), "Checkpoint task stopped");
    })
}

async fn checkpoint(store: &Mutex<CacheStore>, persistence: &mut Persistence) -> SaveOutcome {
    let view = lock_store(store).entries_view();
    persistence.checkpoint(view).await
}
