//! Actor system for the analysis job engine.
//!
//! # Architecture
//!
//! - `Supervisor` - accepts submissions and starts one runner per job
//! - runner task - drives the agent under a deadline with scoped cleanup
//! - `StatusStore` - concurrency-safe job status snapshots
//! - `JobService` - the caller-facing submission/query handle
//!
//! # Usage
//!
//! ```ignore
//! use actors::{AgentRegistry, EngineConfig, start_engine};
//!
//! let mut agents = AgentRegistry::new();
//! agents.register(my_browser_agent());
//!
//! let engine = start_engine(EngineConfig::in_memory(agents)).await?;
//! let id = engine.service().submit(request).await?;
//! let job = engine.service().status(id).await?;
//! ```

mod agent;
mod bootstrap;
mod messages;
mod runner;
mod service;
mod session;
mod sink;
mod status_store;
mod supervisor;
mod telemetry;

pub use agent::{AgentFuture, AgentRegistry, AgentResult, AnalysisAgent, FnAgent};
pub use bootstrap::{EngineConfig, EngineError, JobEngine, start_engine};
pub use messages::SupervisorMessage;
pub use service::JobService;
pub use session::{
    BrowserSession, EphemeralSessions, SessionClient, SessionError, SessionFuture, SessionGuard,
};
pub use sink::{DbReportSink, ReportSink, SinkError, SinkFuture};
pub use status_store::StatusStore;
pub use supervisor::{EngineDeps, Supervisor, start_supervisor};
pub use telemetry::{TelemetryCollector, TelemetryHandle};

/// Re-export ractor types for convenience.
pub use ractor::{Actor, ActorRef, RpcReplyPort, concurrency};

/// Re-export the cancellation token type handed to agents.
pub use tokio_util::sync::CancellationToken;
