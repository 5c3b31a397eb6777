//! Best-effort device geolocation.
//!
//! The trust check wants a position but must never be blocked by a denied or
//! missing geolocation capability: any failure degrades to the `"unknown"`
//! sentinel pair.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Sentinel used when no position can be obtained.
pub const UNKNOWN_COORDINATE: &str = "unknown";

/// Latitude/longitude pair as submitted to the trust check.
///
/// Coordinates are strings on the wire so the sentinel and real values share
/// one representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePosition {
    pub latitude: String,
    pub longitude: String,
}

impl DevicePosition {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude: latitude.to_string(),
            longitude: longitude.to_string(),
        }
    }

    /// The fallback pair reported when geolocation is denied or unavailable.
    pub fn unknown() -> Self {
        Self {
            latitude: UNKNOWN_COORDINATE.to_string(),
            longitude: UNKNOWN_COORDINATE.to_string(),
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.latitude == UNKNOWN_COORDINATE
    }
}

/// Geolocation capability provider.
///
/// Implementations report a denied or absent capability through `Err`; the
/// orchestrator maps every failure to [`DevicePosition::unknown`].
#[async_trait]
pub trait Geolocator: Send + Sync {
    /// Current position as `(latitude, longitude)`.
    async fn locate(&self) -> crate::Result<(f64, f64)>;
}

/// Geolocator for hosts without any geolocation capability.
pub struct NoGeolocation;

#[async_trait]
impl Geolocator for NoGeolocation {
    async fn locate(&self) -> crate::Result<(f64, f64)> {
        Err(crate::AcidError::Capability("no geolocation capability on this host".into()))
    }
}

/// Resolve the device position, falling back to the sentinel pair.
///
/// This never returns an error and never panics regardless of what the
/// capability does.
pub async fn resolve_position(geolocator: &dyn Geolocator) -> DevicePosition {
    match geolocator.locate().await {
        Ok((latitude, longitude)) => DevicePosition::new(latitude, longitude),
        Err(e) => {
            debug!(error = %e, "Geolocation unavailable, using sentinel position");
            DevicePosition::unknown()
        }
    }
}
