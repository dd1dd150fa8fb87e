// src/session/mod.rs
// Session manager: a mutex-guarded map of transient tracking records plus
// a background reaper task that evicts entries past their TTL. No I/O happens while the lock
// is held — every store/backend call happens before or after the critical section.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use contextd_types::SessionRecord;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SessionConfig;
use crate::error::{ContextdError, Result};

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, SessionRecord>,
}

pub struct SessionManager {
    inner: Mutex<Inner>,
    ttl_seconds: u64,
}

impl SessionManager {
    pub fn new(cfg: SessionConfig) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner::default()),
            ttl_seconds: cfg.ttl_seconds,
        })
    }

    /// Spawns the TTL reaper as a background task. Returns its `JoinHandle` so callers can
    /// keep it alive for the process lifetime (dropping it would abort the task).
    pub fn spawn_reaper(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                manager.reap_expired().await;
            }
        })
    }

    async fn reap_expired(&self) {
        let now = Utc::now();
        let ttl = self.ttl_seconds as i64;
        let mut inner = self.inner.lock().await;
        let before = inner.sessions.len();
        inner
            .sessions
            .retain(|_, record| (now - record.last_activity).num_seconds() < ttl);
        let reaped = before - inner.sessions.len();
        drop(inner);
        if reaped > 0 {
            info!(reaped, "session reaper evicted expired sessions");
        }
    }

    pub async fn start_or_resume(&self, project_id: &str, session_id: &str) -> SessionRecord {
        let mut inner = self.inner.lock().await;
        let now = Utc::now();
        let record = inner
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionRecord {
                session_id: session_id.to_string(),
                project_id: project_id.to_string(),
                tokens_used: 0,
                usage_percent: 0.0,
                threshold_70_hit: false,
                threshold_90_hit: false,
                checkpoint_count: 0,
                tokens_saved: 0,
                created_at: now,
                last_activity: now,
            });
        record.last_activity = now;
        record.clone()
    }

    pub async fn get(&self, session_id: &str) -> Result<SessionRecord> {
        let inner = self.inner.lock().await;
        inner
            .sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| ContextdError::NotFound(format!("session '{session_id}' not found")))
    }

    /// Updates usage percent and returns which threshold (if any) was newly crossed this call
    /// — callers use this to decide whether to trigger checkpoint-prompt behavior without
    /// re-triggering on every subsequent call past the same threshold.
    pub async fn record_usage(&self, session_id: &str, percent: f32) -> Result<Option<u8>> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ContextdError::NotFound(format!("session '{session_id}' not found")))?;
        record.usage_percent = percent;
        record.last_activity = Utc::now();

        let mut crossed = None;
        if percent >= 90.0 && !record.threshold_90_hit {
            record.threshold_90_hit = true;
            crossed = Some(90);
        } else if percent >= 70.0 && !record.threshold_70_hit {
            record.threshold_70_hit = true;
            crossed = Some(70);
        }
        Ok(crossed)
    }

    pub async fn record_checkpoint(&self, session_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let record = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| ContextdError::NotFound(format!("session '{session_id}' not found")))?;
        record.checkpoint_count += 1;
        record.last_activity = Utc::now();
        Ok(())
    }

    pub async fn end(&self, session_id: &str) -> Result<SessionRecord> {
        let mut inner = self.inner.lock().await;
        inner
            .sessions
            .remove(session_id)
            .ok_or_else(|| ContextdError::NotFound(format!("session '{session_id}' not found")))
    }

    pub async fn active_count(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> Arc<SessionManager> {
        SessionManager::new(SessionConfig {
            ttl_seconds: 3600,
            reap_interval_seconds: 300,
        })
    }

    #[tokio::test]
    async fn start_or_resume_creates_new_session() {
        let m = manager();
        let record = m.start_or_resume("proj", "s1").await;
        assert_eq!(record.session_id, "s1");
        assert_eq!(record.tokens_used, 0);
    }

    #[tokio::test]
    async fn start_or_resume_is_idempotent_for_same_id() {
        let m = manager();
        m.start_or_resume("proj", "s1").await;
        m.record_checkpoint("s1").await.unwrap();
        let resumed = m.start_or_resume("proj", "s1").await;
        assert_eq!(resumed.checkpoint_count, 1);
    }

    #[tokio::test]
    async fn record_usage_crosses_70_then_90_once_each() {
        let m = manager();
        m.start_or_resume("proj", "s1").await;
        let first = m.record_usage("s1", 72.0).await.unwrap();
        assert_eq!(first, Some(70));
        let second = m.record_usage("s1", 75.0).await.unwrap();
        assert_eq!(second, None);
        let third = m.record_usage("s1", 95.0).await.unwrap();
        assert_eq!(third, Some(90));
    }

    #[tokio::test]
    async fn end_removes_session() {
        let m = manager();
        m.start_or_resume("proj", "s1").await;
        m.end("s1").await.unwrap();
        assert!(m.get("s1").await.is_err());
    }

    #[tokio::test]
    async fn get_missing_session_is_not_found() {
        let m = manager();
        let err = m.get("missing").await.unwrap_err();
        assert!(matches!(err, ContextdError::NotFound(_)));
    }

    #[tokio::test]
    async fn reaper_evicts_sessions_past_ttl() {
        let m = Arc::new(SessionManager {
            inner: Mutex::new(Inner::default()),
            ttl_seconds: 0,
        });
        m.start_or_resume("proj", "s1").await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        m.reap_expired().await;
        assert_eq!(m.active_count().await, 0);
    }
}
