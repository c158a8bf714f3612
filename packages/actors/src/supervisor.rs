//! Supervisor actor: accepts submissions and starts job runners.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use sitecheck_core::{Job, JobEvent, SubmitError};
use tokio::sync::broadcast;

use crate::agent::AgentRegistry;
use crate::messages::SupervisorMessage;
use crate::runner::{self, RunnerDeps};
use crate::session::SessionClient;
use crate::sink::ReportSink;
use crate::status_store::StatusStore;

/// Collaborators handed to the supervisor at spawn time.
pub struct EngineDeps {
    pub agents: Arc<AgentRegistry>,
    pub sessions: Arc<dyn SessionClient>,
    pub sink: Arc<dyn ReportSink>,
    pub store: StatusStore,
}

/// State for the supervisor actor.
pub struct SupervisorState {
    deps: EngineDeps,
    event_tx: broadcast::Sender<JobEvent>,
    /// Jobs currently owned by a runner task.
    active: usize,
    /// Jobs accepted since startup.
    accepted: u64,
}

/// Supervisor actor that owns the submission side of the engine.
pub struct Supervisor;

impl Actor for Supervisor {
    type Msg = SupervisorMessage;
    type State = SupervisorState;
    type Arguments = EngineDeps;

    async fn pre_start(
        &self,
        myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        tracing::info!("Starting analysis job supervisor");

        // Periodic housekeeping tick
        let myself_clone = myself.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(30));
            loop {
                interval.tick().await;
                if myself_clone.send_message(SupervisorMessage::Tick).is_err() {
                    break;
                }
            }
        });

        let (event_tx, _) = broadcast::channel(1024);
        Ok(SupervisorState {
            deps: args,
            event_tx,
            active: 0,
            accepted: 0,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            SupervisorMessage::Submit { request, reply } => {
                if let Err(e) = request.validate() {
                    let _ = reply.send(Err(e));
                    return Ok(());
                }
                if state
                    .deps
                    .agents
                    .resolve(request.agent_kind.as_deref())
                    .is_none()
                {
                    let kind = request.agent_kind.as_deref().unwrap_or("default");
                    let _ = reply.send(Err(SubmitError::InvalidInput(format!(
                        "no agent registered for kind: {kind}"
                    ))));
                    return Ok(());
                }

                let job = Job::new(request);

                // The durable mirror is best-effort; in-memory state stays
                // authoritative.
                if let Err(e) = db::repositories::JobRepository::create(&job).await {
                    tracing::warn!(job_id = %job.id, error = %e, "Failed to mirror job record");
                }

                state.deps.store.put(job.clone());
                let _ = state.event_tx.send(JobEvent::JobSubmitted {
                    job: job.clone(),
                    timestamp: Utc::now(),
                });

                let deps = RunnerDeps {
                    store: state.deps.store.clone(),
                    agents: state.deps.agents.clone(),
                    sessions: state.deps.sessions.clone(),
                    sink: state.deps.sink.clone(),
                    events: state.event_tx.clone(),
                    supervisor: myself.clone(),
                };
                state.active += 1;
                state.accepted += 1;
                tokio::spawn(runner::run_job(deps, job.clone()));

                tracing::info!(
                    job_id = %job.id,
                    target = %job.input.target,
                    deadline_secs = job.input.deadline_secs,
                    "Job accepted"
                );
                let _ = reply.send(Ok(job));
            }

            SupervisorMessage::JobFinished { job_id } => {
                state.active = state.active.saturating_sub(1);
                tracing::debug!(job_id = %job_id, active = state.active, "Runner finished");
            }

            SupervisorMessage::Subscribe { sender } => {
                // Forward from our channel into the subscriber's.
                let mut rx = state.event_tx.subscribe();
                tokio::spawn(async move {
                    while let Ok(event) = rx.recv().await {
                        if sender.send(event).is_err() {
                            break;
                        }
                    }
                });
            }

            SupervisorMessage::Tick => {
                tracing::debug!(
                    active = state.active,
                    running = state.deps.store.running_count(),
                    tracked = state.deps.store.len(),
                    accepted = state.accepted,
                    "Supervisor heartbeat"
                );
            }

            SupervisorMessage::Shutdown => {
                tracing::info!("Shutting down supervisor");
                myself.stop(None);
                return Ok(());
            }
        }

        Ok(())
    }
}

/// Start the supervisor with the given collaborators.
pub async fn start_supervisor(
    deps: EngineDeps,
) -> Result<(ActorRef<SupervisorMessage>, tokio::task::JoinHandle<()>), ractor::SpawnErr> {
    let (actor, handle) = Actor::spawn(None, Supervisor, deps).await?;
    Ok((actor, handle))
}
