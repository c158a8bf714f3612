//! Browser session acquisition and scoped release.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use sitecheck_core::JobId;
use thiserror::Error;

/// Future type returned by session operations.
pub type SessionFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// A live browser session held by exactly one job.
#[derive(Debug, Clone)]
pub struct BrowserSession {
    /// Provider-assigned session id.
    pub id: String,
    /// When the session was acquired.
    pub acquired_at: DateTime<Utc>,
}

/// Errors from the session provider.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to acquire session: {0}")]
    Acquire(String),

    #[error("failed to release session {0}: {1}")]
    Release(String, String),
}

/// Provider of browser sessions.
///
/// Implementations talk to whatever infrastructure hosts the browser; the
/// engine only needs acquire and release. Releasing an already-released
/// session must succeed.
pub trait SessionClient: Send + Sync + 'static {
    /// Acquire a session for a job.
    fn acquire(&self, job_id: JobId) -> SessionFuture<Result<BrowserSession, SessionError>>;

    /// Release a session. Must be idempotent.
    fn release(&self, session: &BrowserSession) -> SessionFuture<Result<(), SessionError>>;
}

/// Scoped ownership of one job's session.
///
/// The runner releases the guard explicitly before publishing a terminal
/// status. Dropping a guard that is still held releases in the background
/// and logs, so no exit path leaks the session.
pub struct SessionGuard {
    client: Arc<dyn SessionClient>,
    session: Option<BrowserSession>,
}

impl SessionGuard {
    /// Acquire a session for the given job.
    pub async fn acquire(
        client: Arc<dyn SessionClient>,
        job_id: JobId,
    ) -> Result<Self, SessionError> {
        let session = client.acquire(job_id).await?;
        tracing::debug!(job_id = %job_id, session_id = %session.id, "Acquired browser session");
        Ok(Self {
            client,
            session: Some(session),
        })
    }

    /// The held session, if not yet released.
    pub fn session(&self) -> Option<&BrowserSession> {
        self.session.as_ref()
    }

    /// Release the session. Safe to call more than once.
    pub async fn release(&mut self) -> Result<(), SessionError> {
        match self.session.take() {
            Some(session) => {
                let result = self.client.release(&session).await;
                if result.is_ok() {
                    tracing::debug!(session_id = %session.id, "Released browser session");
                }
                result
            }
            None => Ok(()),
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            let session_id = session.id.clone();
            tracing::warn!(
                session_id = %session_id,
                "Session guard dropped while held; releasing in background"
            );
            let client = self.client.clone();
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    if let Err(e) = client.release(&session).await {
                        tracing::warn!(
                            session_id = %session_id,
                            error = %e,
                            "Background session release failed"
                        );
                    }
                });
            }
        }
    }
}

/// In-process session provider used when no external browser
/// infrastructure is configured. Allocates ids and tracks the active set.
#[derive(Default)]
pub struct EphemeralSessions {
    counter: AtomicU64,
    active: Mutex<HashSet<String>>,
}

impl EphemeralSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions currently held.
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

impl SessionClient for EphemeralSessions {
    fn acquire(&self, job_id: JobId) -> SessionFuture<Result<BrowserSession, SessionError>> {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        let id = format!("ephemeral-{job_id}-{n}");
        self.active.lock().unwrap().insert(id.clone());
        Box::pin(async move {
            Ok(BrowserSession {
                id,
                acquired_at: Utc::now(),
            })
        })
    }

    fn release(&self, session: &BrowserSession) -> SessionFuture<Result<(), SessionError>> {
        // Unknown or already-released sessions are fine.
        self.active.lock().unwrap().remove(&session.id);
        Box::pin(async move { Ok(()) })
    }
}
