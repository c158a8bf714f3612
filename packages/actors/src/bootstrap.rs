//! Engine assembly and startup.

use std::path::PathBuf;
use std::sync::Arc;

use db::DbConfig;
use storage::{ReportStore, StorageConfig, StorageError};
use thiserror::Error;

use crate::agent::AgentRegistry;
use crate::service::JobService;
use crate::session::{EphemeralSessions, SessionClient};
use crate::sink::{DbReportSink, ReportSink};
use crate::status_store::StatusStore;
use crate::supervisor::{EngineDeps, start_supervisor};

/// Errors during engine startup.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("database error: {0}")]
    Db(#[from] db::DbError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("failed to spawn supervisor: {0}")]
    Spawn(#[from] ractor::SpawnErr),

    #[error("no agents registered")]
    NoAgents,
}

/// Configuration for the engine.
pub struct EngineConfig {
    pub db: DbConfig,
    pub storage: StorageConfig,
    pub agents: AgentRegistry,
    /// Session provider; an in-process ephemeral provider when absent.
    pub sessions: Option<Arc<dyn SessionClient>>,
    /// Report sink; the record-store + blob sink when absent.
    pub sink: Option<Arc<dyn ReportSink>>,
}

impl EngineConfig {
    /// In-memory config with the given agents.
    pub fn in_memory(agents: AgentRegistry) -> Self {
        Self {
            db: DbConfig::memory(),
            storage: StorageConfig::memory(),
            agents,
            sessions: None,
            sink: None,
        }
    }

    /// Build a config from the environment.
    ///
    /// With `SITECHECK_DATA_DIR` set, job records and report bodies are
    /// persisted under it; otherwise everything stays in memory.
    pub fn from_env(agents: AgentRegistry) -> Self {
        let (db, storage) = match std::env::var("SITECHECK_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => {
                let root = PathBuf::from(dir);
                (
                    DbConfig::rocksdb(root.join("db").to_string_lossy().into_owned()),
                    StorageConfig::filesystem(root.join("reports")),
                )
            }
            _ => (DbConfig::memory(), StorageConfig::memory()),
        };

        Self {
            db,
            storage,
            agents,
            sessions: None,
            sink: None,
        }
    }
}

/// A running engine.
pub struct JobEngine {
    service: JobService,
    handle: tokio::task::JoinHandle<()>,
}

impl JobEngine {
    /// The caller-facing service handle.
    pub fn service(&self) -> JobService {
        self.service.clone()
    }

    /// Stop the supervisor and wait for it to exit. In-flight runners
    /// finish on their own.
    pub async fn shutdown(self) {
        self.service.shutdown();
        let _ = self.handle.await;
    }
}

/// Initialize collaborators and start the supervisor.
pub async fn start_engine(config: EngineConfig) -> Result<JobEngine, EngineError> {
    if config.agents.is_empty() {
        return Err(EngineError::NoAgents);
    }

    db::init(config.db).await?;

    let sink: Arc<dyn ReportSink> = match config.sink {
        Some(sink) => sink,
        None => {
            let store = ReportStore::new(config.storage).await?;
            Arc::new(DbReportSink::new(store))
        }
    };
    let sessions = config
        .sessions
        .unwrap_or_else(|| Arc::new(EphemeralSessions::new()));
    let store = StatusStore::new();

    let deps = EngineDeps {
        agents: Arc::new(config.agents),
        sessions,
        sink,
        store: store.clone(),
    };
    let (supervisor, handle) = start_supervisor(deps).await?;

    Ok(JobEngine {
        service: JobService::new(supervisor, store),
        handle,
    })
}
