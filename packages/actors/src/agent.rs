//! The analysis agent collaborator contract.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use sitecheck_core::AnalysisRequest;
use tokio_util::sync::CancellationToken;

use crate::telemetry::TelemetryHandle;

/// Result of an agent run: the final report body, or an error description.
pub type AgentResult = Result<String, String>;

/// Future type for agent runs.
pub type AgentFuture = Pin<Box<dyn Future<Output = AgentResult> + Send>>;

/// An autonomous agent that drives a browser session to analyze a site.
///
/// Implementations report intermediate signals through the telemetry
/// handle and must stop promptly once the cancellation token fires.
pub trait AnalysisAgent: Send + Sync + 'static {
    /// The agent kind this implementation registers under.
    fn kind(&self) -> &str;

    /// Run the analysis to completion.
    fn run(
        &self,
        request: &AnalysisRequest,
        telemetry: TelemetryHandle,
        cancel: CancellationToken,
    ) -> AgentFuture;
}

/// Registry of available agents by kind.
#[derive(Default)]
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn AnalysisAgent>>,
    default_kind: Option<String>,
}

impl AgentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent. The first registration becomes the default kind.
    pub fn register<A: AnalysisAgent>(&mut self, agent: A) {
        let kind = agent.kind().to_string();
        if self.default_kind.is_none() {
            self.default_kind = Some(kind.clone());
        }
        self.agents.insert(kind, Arc::new(agent));
    }

    /// Make the given kind the default for requests that name none.
    pub fn set_default(&mut self, kind: impl Into<String>) {
        self.default_kind = Some(kind.into());
    }

    /// Resolve a requested kind, falling back to the default.
    pub fn resolve(&self, kind: Option<&str>) -> Option<Arc<dyn AnalysisAgent>> {
        let kind = kind.or(self.default_kind.as_deref())?;
        self.agents.get(kind).cloned()
    }

    /// Check if a kind is registered.
    pub fn has_kind(&self, kind: &str) -> bool {
        self.agents.contains_key(kind)
    }

    /// List all registered kinds.
    pub fn kinds(&self) -> Vec<&str> {
        self.agents.keys().map(|s| s.as_str()).collect()
    }

    /// True when no agents are registered.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// A simple function-based agent.
pub struct FnAgent<F>
where
    F: Fn(&AnalysisRequest, TelemetryHandle, CancellationToken) -> AgentFuture
        + Send
        + Sync
        + 'static,
{
    kind: String,
    run: F,
}

impl<F> FnAgent<F>
where
    F: Fn(&AnalysisRequest, TelemetryHandle, CancellationToken) -> AgentFuture
        + Send
        + Sync
        + 'static,
{
    /// Create a new function-based agent.
    pub fn new(kind: impl Into<String>, run: F) -> Self {
        Self {
            kind: kind.into(),
            run,
        }
    }
}

impl<F> AnalysisAgent for FnAgent<F>
where
    F: Fn(&AnalysisRequest, TelemetryHandle, CancellationToken) -> AgentFuture
        + Send
        + Sync
        + 'static,
{
    fn kind(&self) -> &str {
        &self.kind
    }

    fn run(
        &self,
        request: &AnalysisRequest,
        telemetry: TelemetryHandle,
        cancel: CancellationToken,
    ) -> AgentFuture {
        (self.run)(request, telemetry, cancel)
    }
}
