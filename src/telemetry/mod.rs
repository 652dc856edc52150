//! Observability: per-call traces exported to a Langfuse-compatible backend, and the
//! `tracing` subscriber setup.
//!
//! Every [`Agent::respond`](crate::agent::Agent::respond) call gets a fresh
//! [`TraceHandler`]; its trace id is returned with the reply whether or not the events
//! are exported. Export needs both keys of [`ObservabilityConfig`].

pub mod langfuse;
pub mod logging;
pub mod tracer;

pub use langfuse::{ObservabilityClient, ObservabilityError, INGESTION_PATH};
pub use logging::{init_logging, LoggingConfig, LoggingGuard};
pub use tracer::TraceHandler;

use serde::{Deserialize, Serialize};

/// Default Langfuse host
pub const DEFAULT_OBSERVABILITY_HOST: &str = "http://localhost:3000";

/// Trace name used for agent calls
pub const DEFAULT_TRACE_NAME: &str = "burger-agent";

/// Observability settings
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Open a trace per call; trace ids are only returned when enabled
    pub enabled: bool,
    pub host: String,
    pub public_key: Option<String>,
    pub secret_key: Option<String>,
    pub trace_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: DEFAULT_OBSERVABILITY_HOST.to_string(),
            public_key: None,
            secret_key: None,
            trace_name: DEFAULT_TRACE_NAME.to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Both keys present and non-empty
    pub fn has_credentials(&self) -> bool {
        matches!(
            (&self.public_key, &self.secret_key),
            (Some(public), Some(secret)) if !public.is_empty() && !secret.is_empty()
        )
    }
}

impl std::fmt::Debug for ObservabilityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObservabilityConfig")
            .field("enabled", &self.enabled)
            .field("host", &self.host)
            .field("public_key", &self.public_key)
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("trace_name", &self.trace_name)
            .finish()
    }
}
