//! AcidCheck core - client-side identity verification orchestrator.
//!
//! This crate drives a per-session verification flow against the AcidCheck
//! trust service: an initial trust check decides whether any challenge is
//! needed; if so, the user picks a factor (platform passkey, face-liveness
//! capture, time-based one-time code, or trusted-party code) and the matching
//! controller runs that protocol to completion. Success reports the outcome,
//! with the accumulated telemetry, back to the service.
//!
//! Everything platform-specific sits behind a trait: the presentation
//! surface, the passkey and camera capabilities, geolocation, the passive
//! telemetry recorder, and the backend itself. The state machine is fully
//! drivable without a browser, which is also how the test suite runs it.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use acid_core::{HttpBackend, Method, Orchestrator, OrchestratorConfig, State};
//!
//! # async fn example() -> acid_core::Result<()> {
//! let config = OrchestratorConfig::from_env();
//! let backend = Arc::new(HttpBackend::new(&config)?);
//!
//! let mut orchestrator = Orchestrator::builder(config, backend, "acid-42").build();
//!
//! if orchestrator.start().await? == State::MethodSelection {
//!     // present choices, then:
//!     orchestrator.select_method(Method::Totp).await?;
//!     orchestrator.submit_code("123456").await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod camera;
pub mod challenge;
pub mod codec;
pub mod config;
pub mod error;
pub mod method;
pub mod orchestrator;
pub mod passkey;
pub mod position;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod testing;
pub mod trust;
pub mod ui;

// Re-export main types for convenience
pub use api::types::MethodAvailability;
pub use api::{Backend, HttpBackend};
pub use camera::{CameraFeed, CameraProvider, RawFrame};
pub use challenge::{Challenge, ChallengeCache, ChallengeKind};
pub use config::{FaceCaptureConfig, OrchestratorConfig};
pub use error::{AcidError, Result};
pub use method::{Method, MethodController, MethodCtx, MethodOutcome, RetryState};
pub use orchestrator::{AwaitingInput, CancelHandle, Orchestrator, OrchestratorBuilder, State};
pub use passkey::{CreatedCredential, PasskeyProvider};
pub use position::{DevicePosition, Geolocator};
pub use session::{AttemptResult, Session, VerificationAttempt};
pub use store::{DeviceTrustStore, FileTrustStore, MemoryTrustStore};
pub use telemetry::{StaticTelemetry, TelemetryCollector, TelemetrySnapshot};
pub use trust::TrustDecision;
pub use ui::{NullUi, UiSurface};
