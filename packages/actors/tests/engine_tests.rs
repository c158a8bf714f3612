//! End-to-end tests for the job engine: submission, the deadline race,
//! cleanup ordering, and the status-query contract.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::Instant;

use actors::{
    AgentFuture, AgentRegistry, AnalysisAgent, BrowserSession, EngineConfig, FnAgent, JobEngine,
    ReportSink, SessionClient, SessionError, SessionFuture, SinkError, SinkFuture,
};
use sitecheck_core::{
    AnalysisRequest, FailureKind, Job, JobEvent, JobId, JobResult, JobState, StatusError,
    SubmitError, TelemetrySignal,
};

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Agent that completes quickly with a fixed artifact.
fn quick_agent(artifact: &'static str) -> impl AnalysisAgent {
    FnAgent::new("browser", move |_request: &AnalysisRequest, telemetry, _cancel| {
        Box::pin(async move {
            telemetry.record(TelemetrySignal::Progress {
                step: 1,
                note: "loaded the page".into(),
            });
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(artifact.to_string())
        }) as AgentFuture
    })
}

/// Agent that emits one note and then never returns.
fn stalled_agent() -> impl AnalysisAgent {
    FnAgent::new("browser", |_request: &AnalysisRequest, telemetry, _cancel| {
        Box::pin(async move {
            telemetry.record(TelemetrySignal::Progress {
                step: 1,
                note: "started crawling".into(),
            });
            let result: Result<String, String> = {
                std::future::pending::<()>().await;
                unreachable!("pending never resolves")
            };
            result
        }) as AgentFuture
    })
}

/// Agent that emits two notes and then fails.
fn crashing_agent() -> impl AnalysisAgent {
    FnAgent::new("browser", |_request: &AnalysisRequest, telemetry, _cancel| {
        Box::pin(async move {
            telemetry.record(TelemetrySignal::Progress {
                step: 1,
                note: "opened landing page".into(),
            });
            telemetry.record(TelemetrySignal::Progress {
                step: 2,
                note: "submitted the signup form".into(),
            });
            tokio::time::sleep(Duration::from_millis(20)).await;
            Err("agent crashed mid-run".to_string())
        }) as AgentFuture
    })
}

/// Agent that finishes cleanly but with an empty artifact.
fn empty_handed_agent() -> impl AnalysisAgent {
    FnAgent::new("browser", |_request: &AnalysisRequest, telemetry, _cancel| {
        Box::pin(async move {
            telemetry.record(TelemetrySignal::Progress {
                step: 1,
                note: "measured load time".into(),
            });
            telemetry.record(TelemetrySignal::Capture {
                name: "load_time_ms".into(),
                value: serde_json::json!(840),
            });
            Ok(String::new())
        }) as AgentFuture
    })
}

fn registry_with(agent: impl AnalysisAgent) -> AgentRegistry {
    let mut agents = AgentRegistry::new();
    agents.register(agent);
    agents
}

/// Session provider that records which sessions were released.
#[derive(Default)]
struct RecordingSessions {
    active: Mutex<HashSet<String>>,
    released: Mutex<Vec<String>>,
}

impl RecordingSessions {
    fn session_id(job_id: JobId) -> String {
        format!("sess-{job_id}")
    }

    fn is_released(&self, job_id: JobId) -> bool {
        self.released
            .lock()
            .unwrap()
            .contains(&Self::session_id(job_id))
    }

    fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

impl SessionClient for RecordingSessions {
    fn acquire(&self, job_id: JobId) -> SessionFuture<Result<BrowserSession, SessionError>> {
        let id = Self::session_id(job_id);
        self.active.lock().unwrap().insert(id.clone());
        Box::pin(async move {
            Ok(BrowserSession {
                id,
                acquired_at: chrono::Utc::now(),
            })
        })
    }

    fn release(&self, session: &BrowserSession) -> SessionFuture<Result<(), SessionError>> {
        self.active.lock().unwrap().remove(&session.id);
        self.released.lock().unwrap().push(session.id.clone());
        Box::pin(async move { Ok(()) })
    }
}

/// Sink that always rejects the artifact.
struct FailingSink;

impl ReportSink for FailingSink {
    fn persist(&self, _job: &Job) -> SinkFuture<Result<String, SinkError>> {
        Box::pin(async { Err(SinkError::Db(db::DbError::Query("sink offline".into()))) })
    }
}

async fn start_test_engine(config: EngineConfig) -> JobEngine {
    init_logging();
    actors::start_engine(config).await.expect("engine starts")
}

async fn wait_for_terminal(engine: &JobEngine, id: JobId, timeout: Duration) -> Job {
    let service = engine.service();
    let deadline = Instant::now() + timeout;
    loop {
        let job = service.status(id).await.expect("job is known");
        if job.is_terminal() {
            return job;
        }
        assert!(
            Instant::now() < deadline,
            "job {id} still {} after {timeout:?}",
            job.state
        );
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

#[tokio::test]
async fn completed_job_returns_the_agents_artifact() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent(
        "OK: 3 checks passed",
    ))))
    .await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com").with_deadline(30))
        .await
        .expect("submission accepted");

    let job = wait_for_terminal(&engine, id, Duration::from_secs(5)).await;
    assert_eq!(job.state, JobState::Completed);
    assert!(job.started_at.is_some());
    assert!(job.created_at <= job.started_at.unwrap());
    assert!(job.started_at.unwrap() <= job.finished_at.unwrap());

    match job.result.as_ref().expect("terminal job has a result") {
        JobResult::Report { artifact } => {
            assert_eq!(artifact.content, "OK: 3 checks passed");
            assert!(!artifact.best_effort);
        }
        other => panic!("expected a report, got {other:?}"),
    }
}

#[tokio::test]
async fn deadline_is_enforced_with_partial_telemetry() {
    let engine =
        start_test_engine(EngineConfig::in_memory(registry_with(stalled_agent()))).await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com").with_deadline(1))
        .await
        .expect("submission accepted");

    let job = wait_for_terminal(&engine, id, Duration::from_secs(5)).await;
    assert_eq!(job.state, JobState::TimedOut);

    // Terminal within the deadline plus a bounded grace period.
    let elapsed = job.finished_at.unwrap() - job.started_at.unwrap();
    assert!(elapsed.num_seconds() >= 1, "finished before the deadline");
    assert!(elapsed.num_seconds() <= 3, "took too long: {elapsed}");

    match job.result.as_ref().expect("terminal job has a result") {
        JobResult::Error {
            kind,
            message,
            report,
        } => {
            assert_eq!(*kind, FailureKind::DeadlineExceeded);
            assert!(message.contains("1s"));
            let report = report.as_ref().expect("partial telemetry preserved");
            assert!(report.best_effort);
            assert!(report.content.contains("started crawling"));
        }
        other => panic!("expected an error result, got {other:?}"),
    }
}

#[tokio::test]
async fn failure_preserves_progress_notes() {
    let engine =
        start_test_engine(EngineConfig::in_memory(registry_with(crashing_agent()))).await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");

    let job = wait_for_terminal(&engine, id, Duration::from_secs(5)).await;
    assert_eq!(job.state, JobState::Failed);

    match job.result.as_ref().expect("terminal job has a result") {
        JobResult::Error {
            kind,
            message,
            report,
        } => {
            assert_eq!(*kind, FailureKind::ExecutionFailure);
            assert!(message.contains("agent crashed mid-run"));
            let report = report.as_ref().expect("partial telemetry preserved");
            assert!(report.content.contains("opened landing page"));
            assert!(report.content.contains("submitted the signup form"));
        }
        other => panic!("expected an error result, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent("ok"))))
        .await;
    let service = engine.service();

    let missing = service.status(JobId::new()).await;
    assert!(matches!(missing, Err(StatusError::NotFound(_))));

    // After shutdown, submissions surface as unavailable instead of
    // panicking or hanging.
    engine.shutdown().await;
    let err = service
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, SubmitError::Unavailable(_)));
}

#[tokio::test]
async fn concurrent_jobs_have_independent_deadlines() {
    let engine =
        start_test_engine(EngineConfig::in_memory(registry_with(stalled_agent()))).await;
    let service = engine.service();

    let fast = service
        .submit(AnalysisRequest::new("https://example.com").with_deadline(1))
        .await
        .expect("submission accepted");
    let slow = service
        .submit(AnalysisRequest::new("https://example.org").with_deadline(3))
        .await
        .expect("submission accepted");

    let fast_job = wait_for_terminal(&engine, fast, Duration::from_millis(2500)).await;
    assert_eq!(fast_job.state, JobState::TimedOut);

    // The short job terminated strictly before the long one.
    let slow_job = service.status(slow).await.unwrap();
    assert_eq!(slow_job.state, JobState::Running);

    let slow_job = wait_for_terminal(&engine, slow, Duration::from_secs(5)).await;
    assert_eq!(slow_job.state, JobState::TimedOut);

    // Neither entry was corrupted by the other's writes.
    assert_eq!(fast_job.input.target, "https://example.com");
    assert_eq!(fast_job.input.deadline_secs, 1);
    assert_eq!(slow_job.input.target, "https://example.org");
    assert_eq!(slow_job.input.deadline_secs, 3);
}

#[tokio::test]
async fn sessions_are_released_before_terminal_status_is_visible() {
    let sessions = Arc::new(RecordingSessions::default());
    let mut config = EngineConfig::in_memory(registry_with(quick_agent("done")));
    config.sessions = Some(sessions.clone());
    let engine = start_test_engine(config).await;

    let id = engine
        .service()
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");

    // At the first observation of a terminal state, the session must
    // already be gone.
    wait_for_terminal(&engine, id, Duration::from_secs(5)).await;
    assert!(sessions.is_released(id));
    assert_eq!(sessions.active_count(), 0);
}

#[tokio::test]
async fn timed_out_jobs_also_release_their_session() {
    let sessions = Arc::new(RecordingSessions::default());
    let mut config = EngineConfig::in_memory(registry_with(stalled_agent()));
    config.sessions = Some(sessions.clone());
    let engine = start_test_engine(config).await;

    let id = engine
        .service()
        .submit(AnalysisRequest::new("https://example.com").with_deadline(1))
        .await
        .expect("submission accepted");

    wait_for_terminal(&engine, id, Duration::from_secs(5)).await;
    assert!(sessions.is_released(id));
    assert_eq!(sessions.active_count(), 0);
}

#[tokio::test]
async fn invalid_submissions_create_no_job() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent("ok"))))
        .await;
    let service = engine.service();

    for request in [
        AnalysisRequest::new("not a url"),
        AnalysisRequest::new("ftp://example.com"),
        AnalysisRequest::new("https://example.com").with_deadline(0),
        AnalysisRequest::new("https://example.com").with_agent_kind("no-such-agent"),
    ] {
        let err = service.submit(request).await.unwrap_err();
        assert!(matches!(err, SubmitError::InvalidInput(_)), "got {err:?}");
    }
}

#[tokio::test]
async fn repeated_status_queries_are_byte_identical() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent("ok"))))
        .await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");
    wait_for_terminal(&engine, id, Duration::from_secs(5)).await;

    // Wait out the asynchronous sink hand-off so no further note updates
    // can land between the two reads.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let first = serde_json::to_string(&service.status(id).await.unwrap()).unwrap();
    let second = serde_json::to_string(&service.status(id).await.unwrap()).unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn sink_failure_never_reverts_the_terminal_state() {
    let mut config = EngineConfig::in_memory(registry_with(quick_agent("all good")));
    config.sink = Some(Arc::new(FailingSink));
    let engine = start_test_engine(config).await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");
    let job = wait_for_terminal(&engine, id, Duration::from_secs(5)).await;
    assert_eq!(job.state, JobState::Completed);

    // The sink note lands after the terminal publish.
    let deadline = Instant::now() + Duration::from_secs(2);
    let noted = loop {
        let job = service.status(id).await.unwrap();
        if job.note.is_some() {
            break job;
        }
        assert!(Instant::now() < deadline, "sink note never surfaced");
        tokio::time::sleep(Duration::from_millis(25)).await;
    };

    assert_eq!(noted.state, JobState::Completed);
    assert_eq!(noted.result, job.result);
    assert!(noted.note.unwrap().contains("report persistence failed"));
}

#[tokio::test]
async fn empty_artifacts_get_a_best_effort_report() {
    let engine =
        start_test_engine(EngineConfig::in_memory(registry_with(empty_handed_agent()))).await;

    let id = engine
        .service()
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");
    let job = wait_for_terminal(&engine, id, Duration::from_secs(5)).await;

    assert_eq!(job.state, JobState::Completed);
    match job.result.as_ref().expect("terminal job has a result") {
        JobResult::Report { artifact } => {
            assert!(artifact.best_effort);
            assert!(artifact.content.contains("measured load time"));
            assert!(artifact.content.contains("load_time_ms"));
        }
        other => panic!("expected a report, got {other:?}"),
    }
}

#[tokio::test]
async fn observed_states_never_go_backwards() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent("ok"))))
        .await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");

    fn rank(state: JobState) -> u8 {
        match state {
            JobState::Pending => 0,
            JobState::Running => 1,
            JobState::Completed | JobState::Failed | JobState::TimedOut => 2,
        }
    }

    let mut observed = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let job = service.status(id).await.unwrap();
        observed.push(job.state);
        if job.is_terminal() {
            break;
        }
        assert!(Instant::now() < deadline, "job never terminated");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    for pair in observed.windows(2) {
        assert!(
            rank(pair[0]) <= rank(pair[1]),
            "state went backwards: {observed:?}"
        );
    }
    assert_eq!(rank(*observed.last().unwrap()), 2);
}

#[tokio::test]
async fn evicted_jobs_fall_back_to_the_durable_record() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent(
        "archived result",
    ))))
    .await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");
    wait_for_terminal(&engine, id, Duration::from_secs(5)).await;

    assert!(service.evict(id));

    // Served from the record store now, with the same terminal outcome.
    let job = service.status(id).await.expect("durable fallback");
    assert_eq!(job.id, id);
    assert_eq!(job.state, JobState::Completed);
    match job.result.as_ref().expect("result survives the round trip") {
        JobResult::Report { artifact } => assert_eq!(artifact.content, "archived result"),
        other => panic!("expected a report, got {other:?}"),
    }

    // Evicting again (or a running job) is refused.
    assert!(!service.evict(id));
}

#[tokio::test]
async fn running_jobs_cannot_be_evicted() {
    let engine =
        start_test_engine(EngineConfig::in_memory(registry_with(stalled_agent()))).await;
    let service = engine.service();

    let id = service
        .submit(AnalysisRequest::new("https://example.com").with_deadline(3))
        .await
        .expect("submission accepted");

    // Wait until the runner claims it.
    let deadline = Instant::now() + Duration::from_secs(2);
    loop {
        let job = service.status(id).await.unwrap();
        if job.state == JobState::Running {
            break;
        }
        assert!(Instant::now() < deadline, "job never started");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert!(!service.evict(id));
    assert!(service.status(id).await.is_ok());
}

#[tokio::test]
async fn reports_are_persisted_and_linked_to_the_job() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent(
        "persisted body",
    ))))
    .await;

    let id = engine
        .service()
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");
    wait_for_terminal(&engine, id, Duration::from_secs(5)).await;

    // The sink hand-off happens after the terminal publish; poll the
    // record store for the report row.
    let deadline = Instant::now() + Duration::from_secs(2);
    let rows = loop {
        let rows = db::repositories::ReportRepository::get_for_job(id)
            .await
            .expect("record store reachable");
        if !rows.is_empty() {
            break rows;
        }
        assert!(Instant::now() < deadline, "report row never appeared");
        tokio::time::sleep(Duration::from_millis(25)).await;
    };

    assert_eq!(rows[0].state, "completed");
    assert_eq!(
        rows[0].storage_key.as_deref(),
        Some(format!("reports/{id}.md").as_str())
    );
}

#[tokio::test]
async fn events_trace_the_job_lifecycle() {
    let engine = start_test_engine(EngineConfig::in_memory(registry_with(quick_agent("ok"))))
        .await;
    let service = engine.service();

    let mut events = service.subscribe();
    let id = service
        .submit(AnalysisRequest::new("https://example.com"))
        .await
        .expect("submission accepted");

    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if event.job_id() != id {
                        continue;
                    }
                    let done = matches!(event, JobEvent::ReportPersisted { .. });
                    seen.push(event);
                    if done {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => continue,
                Err(e) => panic!("event stream closed early: {e}"),
            }
        }
    })
    .await;
    assert!(result.is_ok(), "missing lifecycle events; saw {seen:?}");

    assert!(seen.iter().any(|e| matches!(e, JobEvent::JobSubmitted { .. })));
    assert!(seen.iter().any(|e| matches!(e, JobEvent::JobStarted { .. })));
    assert!(seen.iter().any(|e| matches!(e, JobEvent::JobProgress { .. })));
    assert!(seen.iter().any(|e| matches!(e, JobEvent::JobCompleted { .. })));
}
