//! Initial trust evaluation.
//!
//! One backend round-trip decides whether the device/session is already
//! trusted enough to skip further challenge. Failure here is non-fatal: the
//! orchestrator falls back to offering every method rather than failing
//! closed or open.

use tracing::{debug, info, warn};

use crate::api::types::{MethodAvailability, TelemetryData, TrustCheckRequest};
use crate::api::Backend;
use crate::position::{resolve_position, Geolocator};
use crate::session::Session;
use crate::store::DeviceTrustStore;
use crate::telemetry::TelemetryCollector;

/// Outcome of the initial trust check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrustDecision {
    /// `challenge == 0`: no further verification required.
    Trusted,
    /// A challenge is required; carry the per-factor enrollment hints.
    ChallengeRequired { availability: MethodAvailability },
    /// The trust endpoint could not be consulted.
    Unreachable { detail: String },
}

/// Assemble the telemetry bundle, submit the trust check, and seed the
/// session from the response.
///
/// Side effects on success: a returned session id is adopted; a returned
/// device-trust token is persisted when none was supplied; a bearer token is
/// adopted when the device is fully trusted.
pub async fn evaluate(
    backend: &dyn Backend,
    collector: &dyn TelemetryCollector,
    geolocator: &dyn Geolocator,
    store: &dyn DeviceTrustStore,
    session: &mut Session,
) -> TrustDecision {
    let position = resolve_position(geolocator).await;
    let stored_token = store.load();
    let snapshot = collector.snapshot();

    debug!(
        subject = %session.subject_id,
        has_device_token = stored_token.is_some(),
        position_known = !position.is_unknown(),
        "Running trust check"
    );

    let request = TrustCheckRequest {
        data: TelemetryData {
            fingerprint: snapshot.fingerprint,
            events: snapshot.events,
        },
        acid: session.subject_id.clone(),
        token: stored_token.clone(),
        position,
        injected_links: snapshot.injected_links,
        injected_scripts: snapshot.injected_scripts,
    };

    let response = match backend.check_identity(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(error = %e, "Trust check unreachable, falling back to method selection");
            return TrustDecision::Unreachable { detail: e.to_string() };
        }
    };

    session.set_session_id(response.login_aid.clone());

    if stored_token.is_none() {
        if let Some(device_token) = &response.device_token {
            if let Err(e) = store.save(device_token) {
                warn!(error = %e, "Failed to persist device trust token");
            }
        }
    }

    if response.challenge == 0 {
        info!(subject = %session.subject_id, "Device fully trusted, skipping challenge");
        session.set_auth_token(response.login_token.clone());
        TrustDecision::Trusted
    } else {
        debug!(challenge = response.challenge, "Challenge required");
        TrustDecision::ChallengeRequired {
            availability: MethodAvailability::from(&response),
        }
    }
}
