//! Message types for actor communication.

use ractor::RpcReplyPort;
use sitecheck_core::{AnalysisRequest, Job, JobEvent, JobId, SubmitError};
use tokio::sync::broadcast;

/// Messages for the Supervisor.
#[derive(Debug)]
pub enum SupervisorMessage {
    /// Submit a new analysis job.
    Submit {
        request: AnalysisRequest,
        reply: RpcReplyPort<Result<Job, SubmitError>>,
    },

    /// A runner reached a terminal state for its job.
    JobFinished { job_id: JobId },

    /// Subscribe to engine events.
    Subscribe {
        sender: broadcast::Sender<JobEvent>,
    },

    /// Periodic tick for housekeeping.
    Tick,

    /// Shutdown the supervisor gracefully.
    Shutdown,
}
