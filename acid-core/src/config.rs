//! Orchestrator configuration.
//!
//! Handles loading configuration from environment variables with sensible defaults.

use std::time::Duration;

/// Default production trust-service endpoint.
pub const DEFAULT_BASE_URL: &str = "https://kyc.cloudspacetechs.com/api/v1";

/// Base URL used when `ACID_ENV=local` is set (development backend).
pub const LOCAL_BASE_URL: &str = "http://localhost:9088/api/v1";

/// Configuration for one verification session.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Trust-service base URL, e.g. `https://kyc.example.com/api/v1`.
    pub base_url: String,
    /// Per-request timeout applied at the HTTP client level. A stalled
    /// backend call fails the request and the method degrades like any other
    /// transport error instead of hanging forever.
    pub request_timeout: Duration,
    /// Face-liveness capture parameters.
    pub face: FaceCaptureConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            face: FaceCaptureConfig::default(),
        }
    }
}

impl OrchestratorConfig {
    /// Load configuration from environment variables.
    ///
    /// `ACID_BASE_URL` overrides the endpoint directly; `ACID_ENV=local`
    /// selects the development backend. `ACID_TIMEOUT_SECS` bounds each
    /// network request.
    pub fn from_env() -> Self {
        let base_url = std::env::var("ACID_BASE_URL").ok().unwrap_or_else(|| {
            match std::env::var("ACID_ENV").as_deref() {
                Ok("local") => LOCAL_BASE_URL.to_string(),
                _ => DEFAULT_BASE_URL.to_string(),
            }
        });

        let request_timeout = std::env::var("ACID_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(30));

        Self {
            base_url,
            request_timeout,
            face: FaceCaptureConfig::default(),
        }
    }
}

/// Timing and sizing parameters for the face-liveness capture loop.
///
/// Defaults: 1.5 s warm-up, 8 frames at 150 ms spacing, JPEG quality 75,
/// two retries after the first classification attempt, 500 ms between
/// attempts.
#[derive(Debug, Clone)]
pub struct FaceCaptureConfig {
    /// Delay between acquiring the camera and the first frame.
    pub warmup: Duration,
    /// Spacing between consecutive frames within a burst.
    pub frame_interval: Duration,
    /// Frames per burst.
    pub frame_count: usize,
    /// JPEG encode quality (1-100).
    pub jpeg_quality: u8,
    /// Additional classification attempts after the first (total = this + 1).
    pub max_retries: u32,
    /// Delay before restarting a failed burst.
    pub retry_backoff: Duration,
}

impl Default for FaceCaptureConfig {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(1500),
            frame_interval: Duration::from_millis(150),
            frame_count: 8,
            jpeg_quality: 75,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl FaceCaptureConfig {
    /// A configuration with no delays, for driving the capture loop in tests.
    pub fn immediate() -> Self {
        Self {
            warmup: Duration::ZERO,
            frame_interval: Duration::ZERO,
            retry_backoff: Duration::ZERO,
            ..Self::default()
        }
    }
}
