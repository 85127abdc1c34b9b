//! Shared server state: the workflow controller and the live sessions

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sop_engine::{SopSession, WorkflowController};
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

pub type SessionHandle = Arc<Mutex<SopSession>>;

/// Sessions untouched for this long are dropped
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(60 * 60);

struct Entry {
    handle: SessionHandle,
    last_access: Instant,
}

/// In-memory sessions keyed by id
///
/// Each session has its own lock, so events for one session run one at a
/// time while other sessions proceed independently. Every lookup refreshes
/// the session's last-access time; [`SessionStore::evict_idle`] drops the
/// ones left alone for too long.
#[derive(Clone, Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, Entry>>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self) -> (Uuid, SessionHandle) {
        let id = Uuid::new_v4();
        let handle = Arc::new(Mutex::new(SopSession::new()));
        let count = {
            let mut sessions = self.sessions.write().await;
            sessions.insert(
                id,
                Entry {
                    handle: Arc::clone(&handle),
                    last_access: Instant::now(),
                },
            );
            sessions.len()
        };
        info!("Created session {} ({} active)", id, count);
        (id, handle)
    }

    pub async fn get(&self, id: &Uuid) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions.get_mut(id)?;
        entry.last_access = Instant::now();
        Some(Arc::clone(&entry.handle))
    }

    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            info!("Ended session {}", id);
        }
        removed
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Drop every session idle for at least `ttl`; returns how many went
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|id, entry| {
            let keep = entry.last_access.elapsed() < ttl;
            if !keep {
                debug!("Session {} idle for {:?}, evicting", id, entry.last_access.elapsed());
            }
            keep
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            info!("Evicted {} idle session(s) ({} active)", evicted, sessions.len());
        }
        evicted
    }

    /// Spawn the eviction loop. Runs until the handle is aborted.
    pub fn spawn_eviction_loop(&self, ttl: Duration, every: Duration) -> JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                store.evict_idle(ttl).await;
            }
        })
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub sessions: SessionStore,
    pub workflow: Arc<WorkflowController>,
}

impl AppState {
    pub fn new(workflow: WorkflowController) -> Self {
        Self {
            sessions: SessionStore::new(),
            workflow: Arc::new(workflow),
        }
    }
}
