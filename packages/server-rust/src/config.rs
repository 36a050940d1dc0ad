use serde::Deserialize;

/// Registration-phase configuration for the subscription registry.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Reject a second registration of an already registered field instead of
    /// keeping the first descriptor and discarding the new one.
    pub reject_duplicates: bool,
}

/// Logging configuration for the `tracing` subscriber.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// `EnvFilter` directive string, e.g. `"info,subfield_core=debug"`.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}
