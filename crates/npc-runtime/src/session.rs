//! Per-session tool declarations with idle expiry.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use npc_config::SessionConfig;
use npc_core::{NpcError, Result, ToolDeclaration};
use tokio::sync::RwLock;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A game session and the extra tools it declared.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub tools: BTreeMap<String, ToolDeclaration>,
    pub created_at: Instant,
    pub last_used: Instant,
}

impl Session {
    fn new(id: &str) -> Self {
        let now = Instant::now();
        Self {
            id: id.to_string(),
            tools: BTreeMap::new(),
            created_at: now,
            last_used: now,
        }
    }

    fn is_expired(&self, now: Instant, expiration: Duration) -> bool {
        now.duration_since(self.last_used) > expiration
    }
}

/// Owns all sessions behind one lock.
///
/// Cloning is cheap and every clone sees the same sessions.
#[derive(Clone)]
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    expiration: Duration,
    sweeper: CancellationToken,
}

impl SessionManager {
    /// A manager without a background sweeper. Call [`sweep_expired`](Self::sweep_expired)
    /// to expire sessions manually.
    pub fn new(expiration: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            expiration,
            sweeper: CancellationToken::new(),
        }
    }

    /// A manager whose sweeper runs every `sweep_interval_secs` until
    /// [`shutdown`](Self::shutdown). Must be called inside a tokio runtime.
    pub fn with_sweeper(config: &SessionConfig) -> Self {
        let manager = Self::new(config.expiration());
        manager.spawn_sweeper(config.sweep_interval());
        manager
    }

    fn spawn_sweeper(&self, every: Duration) {
        if every.is_zero() {
            warn!("session sweep interval is zero, sweeper disabled");
            return;
        }
        let manager = self.clone();
        let token = self.sweeper.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("session sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        manager.sweep_expired().await;
                    }
                }
            }
        });
        info!(
            interval_secs = every.as_secs(),
            expiration_secs = self.expiration.as_secs(),
            "session sweeper started"
        );
    }

    /// Stop the background sweeper, if any.
    pub fn shutdown(&self) {
        self.sweeper.cancel();
    }

    pub fn expiration(&self) -> Duration {
        self.expiration
    }

    /// Create the session or merge `tools` into it by name (last write wins).
    /// Always refreshes the session's last-used time.
    pub async fn register_session(&self, id: &str, tools: Vec<ToolDeclaration>) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.entry(id.to_string()).or_insert_with(|| Session::new(id));
        session.last_used = Instant::now();
        for tool in tools {
            session.tools.insert(tool.name.clone(), tool);
        }
        debug!(session = %id, tools = session.tools.len(), "session registered");
        Ok(())
    }

    /// Copy of the session's declarations. Refreshes last-used time.
    pub async fn get_session_tools(&self, id: &str) -> Result<Vec<ToolDeclaration>> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| NpcError::SessionNotFound(id.to_string()))?;
        session.last_used = Instant::now();
        Ok(session.tools.values().cloned().collect())
    }

    /// Snapshot of one session without touching it.
    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn delete_session(&self, id: &str) -> Result<()> {
        self.sessions
            .write()
            .await
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| NpcError::SessionNotFound(id.to_string()))
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Remove every session idle for longer than the expiration window.
    /// Returns how many were removed.
    pub async fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, s| !s.is_expired(now, self.expiration));
        let removed = before - sessions.len();
        if removed > 0 {
            info!(removed, remaining = sessions.len(), "expired sessions swept");
        }
        removed
    }
}
