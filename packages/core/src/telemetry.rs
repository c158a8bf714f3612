//! Telemetry accumulation for in-flight analysis runs.
//!
//! The agent reports intermediate signals while it works; they are folded
//! into a [`PartialResult`] that can be rendered into a best-effort report
//! at any point, including after a timeout or failure.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One intermediate signal reported during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TelemetrySignal {
    /// A step finished with a short note on what happened.
    Progress { step: u32, note: String },
    /// An anomaly detected on the target site.
    Anomaly { description: String },
    /// A named captured artifact (metrics, network data, ...). Later
    /// captures with the same name replace earlier ones.
    Capture {
        name: String,
        value: serde_json::Value,
    },
    /// The agent's current draft of the final report.
    Draft { content: String },
}

/// A timestamped progress note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressNote {
    pub step: u32,
    pub note: String,
    pub at: DateTime<Utc>,
}

/// Everything collected so far for one job.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PartialResult {
    /// Highest step number reported so far.
    pub steps_completed: u32,
    /// Most recent progress note.
    pub latest_note: Option<String>,
    /// All progress notes in arrival order.
    pub progress: Vec<ProgressNote>,
    /// Detected anomalies in arrival order.
    pub anomalies: Vec<String>,
    /// Captured artifacts by name.
    pub captures: BTreeMap<String, serde_json::Value>,
    /// Latest report draft, if the agent produced one.
    pub draft: Option<String>,
}

impl PartialResult {
    /// Fold one signal into the accumulated state.
    pub fn apply(&mut self, signal: TelemetrySignal) {
        match signal {
            TelemetrySignal::Progress { step, note } => {
                self.steps_completed = self.steps_completed.max(step);
                self.latest_note = Some(note.clone());
                self.progress.push(ProgressNote {
                    step,
                    note,
                    at: Utc::now(),
                });
            }
            TelemetrySignal::Anomaly { description } => {
                self.anomalies.push(description);
            }
            TelemetrySignal::Capture { name, value } => {
                self.captures.insert(name, value);
            }
            TelemetrySignal::Draft { content } => {
                self.draft = Some(content);
            }
        }
    }

    /// True when nothing has been collected yet.
    pub fn is_empty(&self) -> bool {
        self.progress.is_empty()
            && self.anomalies.is_empty()
            && self.captures.is_empty()
            && self.draft.is_none()
    }

    /// Render a markdown best-effort report from whatever was collected.
    pub fn render(&self, heading: &str) -> String {
        let mut out = format!("# {heading}\n");

        if self.is_empty() {
            out.push_str("\nNo telemetry was collected before the run ended.\n");
            return out;
        }

        if !self.progress.is_empty() {
            out.push_str(&format!(
                "\n## Progress ({} steps)\n\n",
                self.steps_completed
            ));
            for note in &self.progress {
                out.push_str(&format!("- [step {}] {}\n", note.step, note.note));
            }
        }

        if !self.captures.is_empty() {
            out.push_str("\n## Captured data\n\n");
            for (name, value) in &self.captures {
                out.push_str(&format!("- {name}: {value}\n"));
            }
        }

        if !self.anomalies.is_empty() {
            out.push_str("\n## Anomalies\n\n");
            for anomaly in &self.anomalies {
                out.push_str(&format!("- {anomaly}\n"));
            }
        }

        if let Some(draft) = &self.draft {
            out.push_str("\n## Draft findings\n\n");
            out.push_str(draft);
            out.push('\n');
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_appends_and_tracks_latest() {
        let mut partial = PartialResult::default();
        partial.apply(TelemetrySignal::Progress {
            step: 1,
            note: "loaded the landing page".into(),
        });
        partial.apply(TelemetrySignal::Progress {
            step: 2,
            note: "checked navigation links".into(),
        });

        assert_eq!(partial.steps_completed, 2);
        assert_eq!(partial.progress.len(), 2);
        assert_eq!(
            partial.latest_note.as_deref(),
            Some("checked navigation links")
        );
    }

    #[test]
    fn captures_are_last_value_wins() {
        let mut partial = PartialResult::default();
        partial.apply(TelemetrySignal::Capture {
            name: "load_time_ms".into(),
            value: serde_json::json!(1200),
        });
        partial.apply(TelemetrySignal::Capture {
            name: "load_time_ms".into(),
            value: serde_json::json!(900),
        });

        assert_eq!(partial.captures.len(), 1);
        assert_eq!(partial.captures["load_time_ms"], serde_json::json!(900));
    }

    #[test]
    fn render_includes_every_section() {
        let mut partial = PartialResult::default();
        partial.apply(TelemetrySignal::Progress {
            step: 1,
            note: "opened page".into(),
        });
        partial.apply(TelemetrySignal::Anomaly {
            description: "console error on load".into(),
        });
        partial.apply(TelemetrySignal::Draft {
            content: "Page loads but logs errors.".into(),
        });

        let report = partial.render("Partial analysis");
        assert!(report.contains("# Partial analysis"));
        assert!(report.contains("[step 1] opened page"));
        assert!(report.contains("console error on load"));
        assert!(report.contains("Page loads but logs errors."));
    }

    #[test]
    fn render_of_empty_telemetry_says_so() {
        let report = PartialResult::default().render("Partial analysis");
        assert!(report.contains("No telemetry was collected"));
    }
}
