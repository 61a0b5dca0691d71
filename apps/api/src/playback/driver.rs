use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::playback::sync::{SyncAction, SyncPlanner};

pub const SYNC_INTERVAL: Duration = Duration::from_millis(100);

/// A player the sync loop can observe and steer.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Current video time, or `None` while nothing is playing.
    async fn video_time(&self) -> Option<f64>;

    /// Current position of each stem track, keyed by stem id.
    async fn track_positions(&self) -> HashMap<String, f64>;

    async fn apply(&self, action: SyncAction) -> anyhow::Result<()>;
}

async fn apply_all(backend: &dyn PlaybackBackend, actions: Vec<SyncAction>) {
    for action in actions {
        debug!("sync action: {action:?}");
        if let Err(e) = backend.apply(action).await {
            warn!("Playback action failed: {e:#}");
        }
    }
}

/// Running sync loop. Dropping the handle stops the loop.
pub struct SyncHandle {
    task: JoinHandle<()>,
    planner: Arc<Mutex<SyncPlanner>>,
    backend: Arc<dyn PlaybackBackend>,
}

impl SyncHandle {
    pub fn planner(&self) -> Arc<Mutex<SyncPlanner>> {
        Arc::clone(&self.planner)
    }

    pub fn stop(&self) {
        self.task.abort();
    }

    /// Stops the loop and silences any segment that was playing.
    pub async fn pause(&self) {
        self.stop();
        let actions = self.planner.lock().await.stop_all();
        apply_all(self.backend.as_ref(), actions).await;
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Restarts a stopped or paused loop on the same planner and backend.
    /// Segments under the video clock start again on the next tick.
    pub fn resume(&mut self) {
        if self.is_running() {
            return;
        }
        self.task = run_loop(Arc::clone(&self.planner), Arc::clone(&self.backend));
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn run_loop(
    planner: Arc<Mutex<SyncPlanner>>,
    backend: Arc<dyn PlaybackBackend>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SYNC_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            let Some(video_time) = backend.video_time().await else {
                continue;
            };
            let positions = backend.track_positions().await;
            let actions = planner.lock().await.tick(video_time, &positions);
            apply_all(backend.as_ref(), actions).await;
        }
    })
}

pub fn spawn_sync_loop(planner: SyncPlanner, backend: Arc<dyn PlaybackBackend>) -> SyncHandle {
    spawn_shared_sync_loop(Arc::new(Mutex::new(planner)), backend)
}

/// Runs the loop on a planner the caller keeps a handle to, so stems and
/// segments can be changed while it plays.
pub fn spawn_shared_sync_loop(
    planner: Arc<Mutex<SyncPlanner>>,
    backend: Arc<dyn PlaybackBackend>,
) -> SyncHandle {
    let task = run_loop(Arc::clone(&planner), Arc::clone(&backend));
    SyncHandle {
        task,
        planner,
        backend,
    }
}
