//! Core domain types for the sitecheck analysis engine.
//!
//! This crate contains shared types used across all packages:
//! - Job and JobState for tracked analysis runs
//! - AnalysisRequest for submissions
//! - Telemetry accumulation and best-effort report synthesis
//! - Events for real-time updates

mod error;
mod events;
mod job;
mod request;
mod telemetry;

pub use error::{StatusError, SubmitError};
pub use events::JobEvent;
pub use job::{FailureKind, Job, JobId, JobResult, JobState, Report};
pub use request::{
    AgentSettings, AnalysisRequest, DEFAULT_DEADLINE_SECS, MAX_STEPS, MIN_STEPS, ModelProvider,
    ModelSettings,
};
pub use telemetry::{PartialResult, ProgressNote, TelemetrySignal};
