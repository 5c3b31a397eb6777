//! Verification method controllers.
//!
//! One controller per factor behind the common [`MethodController`]
//! interface. The orchestrator guarantees that exactly one controller is
//! active at a time; controllers own their protocol and report back through
//! [`MethodOutcome`].

mod biometric;
mod face;
mod totp;
mod tpn;

pub use biometric::BiometricController;
pub use face::{FaceController, RetryState};
pub use totp::TotpController;
pub use tpn::{mask_destination, TpnController};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::Backend;
use crate::camera::CameraProvider;
use crate::challenge::ChallengeCache;
use crate::config::FaceCaptureConfig;
use crate::error::{AcidError, Result};
use crate::passkey::PasskeyProvider;
use crate::session::Session;
use crate::store::DeviceTrustStore;
use crate::ui::UiSurface;

/// The verification factors a user can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Method {
    /// Platform passkey / device biometrics.
    Biometric,
    /// Face-liveness capture.
    Face,
    /// Time-based one-time code.
    Totp,
    /// Trusted-party out-of-band code.
    TrustedParty,
}

impl Method {
    pub const ALL: [Method; 4] =
        [Method::Biometric, Method::Face, Method::Totp, Method::TrustedParty];
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::Biometric => "biometric",
            Method::Face => "face-liveness",
            Method::Totp => "totp",
            Method::TrustedParty => "trusted-party",
        };
        f.write_str(name)
    }
}

/// What a controller invocation produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodOutcome {
    /// Protocol completed; the orchestrator finalizes the session.
    Success,
    /// Controller is set up and waits for a code submission.
    AwaitingCode { destination: Option<String> },
    /// Controller waits for a trusted-party destination (enrollment).
    AwaitingDestination,
    /// Server rejected the submission; the message is shown verbatim and the
    /// method stays active for resubmission.
    Rejected { message: String },
    /// This method cannot run here; activate the given method instead.
    Redirected(Method),
    /// Unrecoverable for this activation; return to method selection.
    Suspended { reason: String },
    /// The method's retry budget ran out; return to method selection.
    Exhausted { reason: String },
}

/// Cancellation token scoped to one method activation.
///
/// The orchestrator bumps a shared epoch on every activation switch or
/// explicit cancel; a token created before the bump observes it at the next
/// suspension point and turns the remaining continuation into a no-op.
#[derive(Clone)]
pub struct CancelToken {
    epoch: Arc<AtomicU64>,
    seen: u64,
}

impl CancelToken {
    pub(crate) fn new(epoch: Arc<AtomicU64>) -> Self {
        let seen = epoch.load(Ordering::SeqCst);
        Self { epoch, seen }
    }

    /// A token that can never be cancelled (for driving controllers directly
    /// in tests).
    pub fn detached() -> Self {
        Self::new(Arc::new(AtomicU64::new(0)))
    }

    pub fn is_cancelled(&self) -> bool {
        self.epoch.load(Ordering::SeqCst) != self.seen
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(AcidError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Shared collaborators handed to a controller for one call.
pub struct MethodCtx<'a> {
    pub session: &'a mut Session,
    pub challenges: &'a mut ChallengeCache,
    pub backend: &'a dyn Backend,
    pub store: &'a dyn DeviceTrustStore,
    pub ui: &'a dyn UiSurface,
    pub passkey: &'a dyn PasskeyProvider,
    pub camera: &'a dyn CameraProvider,
    pub face_config: &'a FaceCaptureConfig,
    pub cancel: CancelToken,
}

/// Common driving interface over the four controllers.
///
/// `start` runs the protocol as far as it can without user input. The code
/// and destination submissions are rejected by default; controllers that
/// accept them override.
#[async_trait]
pub trait MethodController: Send {
    fn method(&self) -> Method;

    async fn start(&mut self, ctx: &mut MethodCtx<'_>) -> Result<MethodOutcome>;

    async fn submit_code(&mut self, ctx: &mut MethodCtx<'_>, code: &str) -> Result<MethodOutcome> {
        let _ = (ctx, code);
        Err(AcidError::InvalidState(format!(
            "{} does not accept code submissions",
            self.method()
        )))
    }

    async fn submit_destination(
        &mut self,
        ctx: &mut MethodCtx<'_>,
        destination: &str,
    ) -> Result<MethodOutcome> {
        let _ = (ctx, destination);
        Err(AcidError::InvalidState(format!(
            "{} does not accept a destination",
            self.method()
        )))
    }

    /// Release anything held between calls. Controllers holding no state
    /// between awaits keep the default.
    fn cancel(&mut self) {}
}
