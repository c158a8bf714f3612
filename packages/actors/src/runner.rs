//! Per-job execution: the deadline race, telemetry, and guaranteed cleanup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::FutureExt;
use ractor::ActorRef;
use sitecheck_core::{Job, JobEvent, JobResult, JobState, PartialResult, Report};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::agent::AgentRegistry;
use crate::messages::SupervisorMessage;
use crate::session::{SessionClient, SessionGuard};
use crate::sink::ReportSink;
use crate::status_store::StatusStore;
use crate::telemetry::TelemetryCollector;

/// Everything a runner needs to execute one job.
pub(crate) struct RunnerDeps {
    pub store: StatusStore,
    pub agents: Arc<AgentRegistry>,
    pub sessions: Arc<dyn SessionClient>,
    pub sink: Arc<dyn ReportSink>,
    pub events: broadcast::Sender<JobEvent>,
    pub supervisor: ActorRef<SupervisorMessage>,
}

/// How the race between the agent and the deadline resolved.
enum RunOutcome {
    /// The agent finished and returned a report body.
    Finished(String),
    /// The agent returned an error, or its future panicked.
    Errored(String),
    /// The deadline elapsed first; the in-flight run was cancelled.
    DeadlineElapsed,
}

/// Execute one job to a terminal state.
///
/// Exactly one terminal transition is recorded. The browser session is
/// released on every exit path, and release completes before the terminal
/// snapshot is published.
pub(crate) async fn run_job(deps: RunnerDeps, mut job: Job) {
    let job_id = job.id;

    job.mark_running();
    mirror(&job).await;
    deps.store.put(job.clone());
    let _ = deps.events.send(JobEvent::JobStarted {
        job_id,
        timestamp: Utc::now(),
    });

    let collector = TelemetryCollector::new(job_id, deps.events.clone());

    let outcome = match SessionGuard::acquire(deps.sessions.clone(), job_id).await {
        Ok(mut guard) => {
            let outcome = drive_agent(&deps, &job, &collector).await;
            // Cleanup before publish: the session must be gone before any
            // reader can observe a terminal state.
            if let Err(e) = guard.release().await {
                tracing::warn!(
                    job_id = %job_id,
                    error = %e,
                    "Session cleanup failed; job outcome unchanged"
                );
            }
            outcome
        }
        Err(e) => RunOutcome::Errored(format!("could not acquire a browser session: {e}")),
    };

    finalize(&mut job, outcome, collector.snapshot());

    mirror(&job).await;
    deps.store.put(job.clone());
    emit_terminal_event(&deps, &job);

    match deps.sink.persist(&job).await {
        Ok(location) => {
            tracing::info!(job_id = %job_id, location = %location, "Report persisted");
            let _ = deps.events.send(JobEvent::ReportPersisted {
                job_id,
                location,
                timestamp: Utc::now(),
            });
        }
        Err(e) => {
            // The terminal outcome is already decided; the sink failure is
            // surfaced as a secondary note only.
            tracing::warn!(job_id = %job_id, error = %e, "Failed to persist report");
            job.note = Some(format!("report persistence failed: {e}"));
            deps.store.put(job.clone());
            mirror(&job).await;
            let _ = deps.events.send(JobEvent::SinkWriteFailed {
                job_id,
                error: e.to_string(),
                timestamp: Utc::now(),
            });
        }
    }

    let _ = deps
        .supervisor
        .send_message(SupervisorMessage::JobFinished { job_id });
}

/// Race the agent against the job's deadline.
async fn drive_agent(
    deps: &RunnerDeps,
    job: &Job,
    collector: &TelemetryCollector,
) -> RunOutcome {
    let agent = match deps.agents.resolve(job.input.agent_kind.as_deref()) {
        Some(agent) => agent,
        None => {
            let kind = job.input.agent_kind.as_deref().unwrap_or("default");
            return RunOutcome::Errored(format!("no agent registered for kind: {kind}"));
        }
    };

    let cancel = CancellationToken::new();
    let deadline = Duration::from_secs(job.input.deadline_secs);
    let attempt = std::panic::AssertUnwindSafe(agent.run(
        &job.input,
        collector.handle(),
        cancel.child_token(),
    ))
    .catch_unwind();

    tokio::select! {
        result = attempt => match result {
            Ok(Ok(content)) => RunOutcome::Finished(content),
            Ok(Err(error)) => RunOutcome::Errored(error),
            Err(panic) => RunOutcome::Errored(panic_message(panic)),
        },
        _ = tokio::time::sleep(deadline) => {
            // Whichever side loses the race is suppressed; the token tells
            // any work the agent spawned to stop.
            cancel.cancel();
            RunOutcome::DeadlineElapsed
        }
    }
}

/// Turn the outcome plus the telemetry snapshot into the terminal record.
fn finalize(job: &mut Job, outcome: RunOutcome, partial: PartialResult) {
    let deadline_secs = job.input.deadline_secs;
    match outcome {
        RunOutcome::Finished(content) => {
            if content.trim().is_empty() {
                // A completed job must still carry some result.
                let body = partial.render(&format!("Best-effort report for {}", job.input.target));
                job.mark_completed(Report::synthesized(body));
            } else {
                job.mark_completed(Report::new(content));
            }
        }
        RunOutcome::Errored(error) => {
            let report = partial_report(&partial, job, "Partial findings before failure");
            job.mark_failed(error, report);
        }
        RunOutcome::DeadlineElapsed => {
            let report = partial_report(&partial, job, "Partial findings before timeout");
            job.mark_timed_out(deadline_secs, report);
        }
    }
}

fn partial_report(partial: &PartialResult, job: &Job, heading: &str) -> Option<Report> {
    if partial.is_empty() {
        return None;
    }
    let body = partial.render(&format!("{heading}: {}", job.input.target));
    Some(Report::synthesized(body))
}

fn emit_terminal_event(deps: &RunnerDeps, job: &Job) {
    let timestamp = Utc::now();
    let event = match job.state {
        JobState::Completed => {
            let duration_ms = match (job.started_at, job.finished_at) {
                (Some(started), Some(finished)) => {
                    (finished - started).num_milliseconds().max(0) as u64
                }
                _ => 0,
            };
            JobEvent::JobCompleted {
                job_id: job.id,
                duration_ms,
                timestamp,
            }
        }
        JobState::TimedOut => JobEvent::JobTimedOut {
            job_id: job.id,
            deadline_secs: job.input.deadline_secs,
            timestamp,
        },
        JobState::Failed => {
            let error = match &job.result {
                Some(JobResult::Error { message, .. }) => message.clone(),
                _ => job.message.clone(),
            };
            JobEvent::JobFailed {
                job_id: job.id,
                error,
                timestamp,
            }
        }
        JobState::Pending | JobState::Running => return,
    };
    tracing::debug!("{}", event.description());
    let _ = deps.events.send(event);
}

/// Best-effort durable mirror of the snapshot.
async fn mirror(job: &Job) {
    if let Err(e) = db::repositories::JobRepository::update(job).await {
        tracing::warn!(job_id = %job.id, error = %e, "Failed to mirror job record");
    }
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    let detail = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("agent panicked: {detail}")
}
