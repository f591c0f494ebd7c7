//! Logging and trace export settings (`[telemetry]`).

use serde::Deserialize;

/// Settings consumed by [`crate::infrastructure::telemetry::Telemetry::init`].
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetrySettings {
    /// `service.name` reported with exported spans.
    pub service_name: String,
    /// Log filter directive, used only when `RUST_LOG` is unset.
    pub log_level: String,
    /// OTLP collector; spans are not exported when absent.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,
    /// Fraction of root traces sampled, clamped to `0.0..=1.0`.
    pub sampling_ratio: f64,
}
