//! Passive telemetry collaborator interface.
//!
//! The recorder itself (event capture, fingerprinting, DOM observation) lives
//! outside the core; this module defines the snapshot shape the core submits
//! to the backend and the trait it pulls snapshots through. Fingerprint and
//! event payloads are opaque to the core and pass through unmodified.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Immutable telemetry bundle assembled at trust-check and finalize time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    /// Device/browser fingerprint: user agent, screen metrics, permission
    /// states, capability availability. Opaque to the core.
    pub fingerprint: Value,
    /// Passive interaction event stream (opaque recorder events).
    pub events: Vec<Value>,
    /// Sources of scripts injected into the page since load.
    pub injected_scripts: Vec<String>,
    /// Stylesheet URLs injected into the page since load.
    pub injected_links: Vec<String>,
}

/// Producer of telemetry snapshots.
///
/// The collector owns the recording; each call returns the accumulated state
/// at that instant. The core never mutates what it receives.
pub trait TelemetryCollector: Send + Sync {
    fn snapshot(&self) -> TelemetrySnapshot;
}

/// Collector returning a fixed snapshot.
///
/// Suits hosts without a live recorder (headless drivers, tests): the
/// fingerprint is supplied up front and the event stream stays empty.
pub struct StaticTelemetry {
    snapshot: TelemetrySnapshot,
}

impl StaticTelemetry {
    pub fn new(fingerprint: Value) -> Self {
        Self {
            snapshot: TelemetrySnapshot {
                fingerprint,
                ..TelemetrySnapshot::default()
            },
        }
    }

    pub fn with_snapshot(snapshot: TelemetrySnapshot) -> Self {
        Self { snapshot }
    }
}

impl TelemetryCollector for StaticTelemetry {
    fn snapshot(&self) -> TelemetrySnapshot {
        self.snapshot.clone()
    }
}
