//! Per-job telemetry collection.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use sitecheck_core::{JobEvent, JobId, PartialResult, TelemetrySignal};
use tokio::sync::broadcast;

/// Accumulates telemetry for one job while its agent runs.
///
/// The collector is passive: recording folds a signal into the in-memory
/// accumulator and returns. It performs no I/O and never blocks the
/// execution it observes.
pub struct TelemetryCollector {
    shared: Arc<Shared>,
}

struct Shared {
    job_id: JobId,
    partial: Mutex<PartialResult>,
    events: broadcast::Sender<JobEvent>,
}

/// Cloneable recording handle passed to the agent's progress callbacks.
#[derive(Clone)]
pub struct TelemetryHandle {
    shared: Arc<Shared>,
}

impl TelemetryCollector {
    pub fn new(job_id: JobId, events: broadcast::Sender<JobEvent>) -> Self {
        Self {
            shared: Arc::new(Shared {
                job_id,
                partial: Mutex::new(PartialResult::default()),
                events,
            }),
        }
    }

    /// A recording handle for the agent.
    pub fn handle(&self) -> TelemetryHandle {
        TelemetryHandle {
            shared: self.shared.clone(),
        }
    }

    /// Read-only copy of everything collected so far. Usable at any
    /// point, including mid-execution.
    pub fn snapshot(&self) -> PartialResult {
        self.shared.partial.lock().unwrap().clone()
    }
}

impl TelemetryHandle {
    /// Fold one signal into the accumulator.
    pub fn record(&self, signal: TelemetrySignal) {
        if let TelemetrySignal::Progress { step, note } = &signal {
            // Send errors just mean nobody is listening.
            let _ = self.shared.events.send(JobEvent::JobProgress {
                job_id: self.shared.job_id,
                step: *step,
                note: note.clone(),
                timestamp: Utc::now(),
            });
        }
        self.shared.partial.lock().unwrap().apply(signal);
    }
}
