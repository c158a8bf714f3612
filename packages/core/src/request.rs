//! Submission request types for analysis jobs.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SubmitError;

/// Lower bound for the agent step budget.
pub const MIN_STEPS: u32 = 10;
/// Upper bound for the agent step budget.
pub const MAX_STEPS: u32 = 150;
/// Default execution deadline when the caller does not set one.
pub const DEFAULT_DEADLINE_SECS: u64 = 300;

const DEFAULT_MAX_STEPS: u32 = 125;

/// Model provider backing the agent's LLM calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelProvider {
    #[default]
    AzureOpenai,
    Openai,
    Anthropic,
    Gemini,
    Deepseek,
}

/// Model parameters forwarded to the agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    /// Which provider to use.
    pub provider: ModelProvider,
    /// Provider-specific model name; provider default when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature, 0.0..=1.0.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens per model call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Execution limits for the agent run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    /// Maximum number of agent steps before it must wrap up.
    pub max_steps: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
        }
    }
}

/// A caller-supplied analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// URL of the site to analyze.
    pub target: String,
    /// Extra instructions appended to the analysis task.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    /// Registered agent kind to run; engine default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_kind: Option<String>,
    /// Model parameters.
    #[serde(default)]
    pub model: ModelSettings,
    /// Agent execution limits.
    #[serde(default)]
    pub settings: AgentSettings,
    /// Execution deadline in seconds.
    #[serde(default = "default_deadline")]
    pub deadline_secs: u64,
}

fn default_deadline() -> u64 {
    DEFAULT_DEADLINE_SECS
}

impl AnalysisRequest {
    /// Create a request for the given target with default settings.
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            instructions: None,
            agent_kind: None,
            model: ModelSettings::default(),
            settings: AgentSettings::default(),
            deadline_secs: DEFAULT_DEADLINE_SECS,
        }
    }

    /// Set extra instructions for the agent.
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Select a specific registered agent kind.
    pub fn with_agent_kind(mut self, kind: impl Into<String>) -> Self {
        self.agent_kind = Some(kind.into());
        self
    }

    /// Set the model parameters.
    pub fn with_model(mut self, model: ModelSettings) -> Self {
        self.model = model;
        self
    }

    /// Set the agent step budget.
    pub fn with_max_steps(mut self, max_steps: u32) -> Self {
        self.settings.max_steps = max_steps;
        self
    }

    /// Set the execution deadline.
    pub fn with_deadline(mut self, deadline_secs: u64) -> Self {
        self.deadline_secs = deadline_secs;
        self
    }

    /// The task description handed to the agent.
    pub fn task_description(&self) -> String {
        let base = format!(
            "Analyze the website at {} and provide a detailed report.",
            self.target
        );
        match &self.instructions {
            Some(extra) => format!("{base} {extra}"),
            None => base,
        }
    }

    /// Validate the request before a job is created for it.
    pub fn validate(&self) -> Result<(), SubmitError> {
        let url = Url::parse(&self.target)
            .map_err(|e| SubmitError::InvalidInput(format!("target is not a valid URL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SubmitError::InvalidInput(format!(
                "target must use http or https, got {}",
                url.scheme()
            )));
        }
        if url.host_str().is_none() {
            return Err(SubmitError::InvalidInput(
                "target URL has no host".to_string(),
            ));
        }
        if self.deadline_secs == 0 {
            return Err(SubmitError::InvalidInput(
                "deadline must be at least one second".to_string(),
            ));
        }
        if !(MIN_STEPS..=MAX_STEPS).contains(&self.settings.max_steps) {
            return Err(SubmitError::InvalidInput(format!(
                "max_steps must be between {MIN_STEPS} and {MAX_STEPS}, got {}",
                self.settings.max_steps
            )));
        }
        if let Some(temperature) = self.model.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err(SubmitError::InvalidInput(format!(
                    "temperature must be between 0.0 and 1.0, got {temperature}"
                )));
            }
        }
        Ok(())
    }
}
