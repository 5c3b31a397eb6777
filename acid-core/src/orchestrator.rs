//! The verification state machine.
//!
//! One orchestrator instance owns one verification session: it runs the
//! trust check, offers method choices, drives the selected controller, and
//! finalizes by reporting the session outcome. All state lives on the
//! instance; nothing survives it except the device trust store.
//!
//! The machine is driven by explicit host calls (`start`, `select_method`,
//! `submit_code`, `submit_trusted_number`, `cancel_method`) so it is fully
//! testable without any rendering surface.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::api::types::{FinishSessionRequest, MethodAvailability};
use crate::api::Backend;
use crate::camera::{CameraProvider, UnavailableCamera};
use crate::challenge::ChallengeCache;
use crate::config::OrchestratorConfig;
use crate::error::{AcidError, Result};
use crate::method::{
    BiometricController, CancelToken, FaceController, Method, MethodController, MethodCtx,
    MethodOutcome, TotpController, TpnController,
};
use crate::passkey::{PasskeyProvider, UnsupportedPasskey};
use crate::position::{Geolocator, NoGeolocation};
use crate::session::{Session, VerificationAttempt};
use crate::store::{DeviceTrustStore, MemoryTrustStore};
use crate::telemetry::{StaticTelemetry, TelemetryCollector};
use crate::trust::{self, TrustDecision};
use crate::ui::{NullUi, UiSurface};

/// Orchestrator lifecycle states.
///
/// `Done` is terminal: driving calls after it fail with an invalid-state
/// error, and a new verification session needs a new instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    TrustChecking,
    MethodSelection,
    MethodActive(Method),
    Finalizing,
    Done,
}

/// Which input the active method is waiting on, for hosts driving the
/// machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AwaitingInput {
    /// A 6-digit code; `destination` names the masked delivery target when
    /// one is known.
    Code { destination: Option<String> },
    /// A trusted-party destination number (enrollment).
    Destination,
}

/// Cancels the active method from outside the driving call.
///
/// Bumping the shared epoch makes any pending continuation of the active
/// method a no-op at its next suspension point; held hardware (the camera)
/// is released before that continuation returns.
#[derive(Clone)]
pub struct CancelHandle {
    epoch: Arc<AtomicU64>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    backend: Arc<dyn Backend>,
    collector: Arc<dyn TelemetryCollector>,
    geolocator: Arc<dyn Geolocator>,
    store: Arc<dyn DeviceTrustStore>,
    ui: Arc<dyn UiSurface>,
    passkey: Arc<dyn PasskeyProvider>,
    camera: Arc<dyn CameraProvider>,
    session: Session,
    challenges: ChallengeCache,
    state: State,
    active: Option<Box<dyn MethodController>>,
    availability: MethodAvailability,
    awaiting: Option<AwaitingInput>,
    attempts: Vec<VerificationAttempt>,
    last_error: Option<String>,
    epoch: Arc<AtomicU64>,
}

impl Orchestrator {
    /// Start building an orchestrator for one subject.
    ///
    /// Collaborators default to capability-less implementations: no passkey,
    /// no camera, no geolocation, in-memory trust store, silent UI. Hosts
    /// plug in what they actually have.
    pub fn builder(
        config: OrchestratorConfig,
        backend: Arc<dyn Backend>,
        subject_id: impl Into<String>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder {
            config,
            backend,
            subject_id: subject_id.into(),
            update_mode: false,
            collector: Arc::new(StaticTelemetry::new(serde_json::Value::Null)),
            geolocator: Arc::new(NoGeolocation),
            store: Arc::new(MemoryTrustStore::new()),
            ui: Arc::new(NullUi),
            passkey: Arc::new(UnsupportedPasskey),
            camera: Arc::new(UnavailableCamera),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The most recent rejection or suspension message, for the UI layer.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Enrollment hints from the trust check.
    pub fn availability(&self) -> MethodAvailability {
        self.availability
    }

    /// The input the active method is waiting on, if any.
    pub fn awaiting(&self) -> Option<&AwaitingInput> {
        self.awaiting.as_ref()
    }

    /// Controller invocations made this session, in order.
    pub fn attempts(&self) -> &[VerificationAttempt] {
        &self.attempts
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle { epoch: self.epoch.clone() }
    }

    /// Run the trust check and either finalize (fully trusted) or present
    /// the method choices.
    pub async fn start(&mut self) -> Result<State> {
        if self.state != State::Init {
            return Err(AcidError::InvalidState(format!(
                "start called in {:?}",
                self.state
            )));
        }
        self.state = State::TrustChecking;

        if self.session.update_mode {
            // update flows never trust-short-circuit the re-enrollment
            debug!("Update mode, presenting method choices directly");
            self.to_method_selection();
            return Ok(self.state);
        }

        let decision = trust::evaluate(
            self.backend.as_ref(),
            self.collector.as_ref(),
            self.geolocator.as_ref(),
            self.store.as_ref(),
            &mut self.session,
        )
        .await;

        match decision {
            TrustDecision::Trusted => self.finalize().await,
            TrustDecision::ChallengeRequired { availability } => {
                self.availability = availability;
                self.to_method_selection();
            }
            TrustDecision::Unreachable { detail } => {
                warn!(detail = %detail, "Trust check failed, offering all methods");
                self.availability = MethodAvailability::default();
                self.to_method_selection();
            }
        }
        Ok(self.state)
    }

    /// Activate a verification method, stopping any previously active one
    /// first. Exactly one method is active at a time.
    pub async fn select_method(&mut self, method: Method) -> Result<State> {
        match self.state {
            State::MethodSelection | State::MethodActive(_) => {}
            state => {
                return Err(AcidError::InvalidState(format!(
                    "cannot select a method in {state:?}"
                )))
            }
        }

        self.cancel_active();
        self.last_error = None;
        self.state = State::MethodActive(method);
        let attempt_number =
            self.attempts.iter().filter(|a| a.method == method).count() as u32 + 1;
        self.attempts.push(VerificationAttempt::started(method, attempt_number));
        self.ui.method_activated(method, self.session.update_mode);
        info!(%method, attempt_number, update_mode = self.session.update_mode, "Method activated");

        let mut controller = Self::controller_for(method);
        let outcome = {
            let mut ctx = self.method_ctx();
            controller.start(&mut ctx).await?
        };
        self.apply_outcome(controller, outcome).await
    }

    /// Submit a completed one-time code to the active method.
    pub async fn submit_code(&mut self, code: &str) -> Result<State> {
        let mut controller = self.take_active("submit a code")?;
        let outcome = {
            let mut ctx = self.method_ctx();
            controller.submit_code(&mut ctx, code).await
        };
        match outcome {
            Ok(outcome) => self.apply_outcome(controller, outcome).await,
            Err(e) => {
                self.active = Some(controller);
                Err(e)
            }
        }
    }

    /// Submit a trusted-party destination (enrollment).
    pub async fn submit_trusted_number(&mut self, number: &str) -> Result<State> {
        let mut controller = self.take_active("submit a destination")?;
        let outcome = {
            let mut ctx = self.method_ctx();
            controller.submit_destination(&mut ctx, number).await
        };
        match outcome {
            Ok(outcome) => self.apply_outcome(controller, outcome).await,
            Err(e) => {
                self.active = Some(controller);
                Err(e)
            }
        }
    }

    /// Cancel the active method and restore the method selection.
    pub fn cancel_method(&mut self) -> Result<State> {
        match self.state {
            State::MethodActive(method) => {
                info!(%method, "Method cancelled");
                self.cancel_active();
                self.to_method_selection();
                Ok(self.state)
            }
            State::MethodSelection => Ok(self.state),
            state => Err(AcidError::InvalidState(format!("cannot cancel in {state:?}"))),
        }
    }

    /// Tear the session down without finalizing (host page is going away).
    pub fn teardown(&mut self) {
        self.cancel_active();
        self.challenges.clear();
        self.session.clear();
        self.state = State::Done;
    }

    fn take_active(&mut self, action: &str) -> Result<Box<dyn MethodController>> {
        match self.state {
            State::MethodActive(_) => self.active.take().ok_or_else(|| {
                AcidError::InvalidState(format!("no controller is awaiting input to {action}"))
            }),
            state => Err(AcidError::InvalidState(format!("cannot {action} in {state:?}"))),
        }
    }

    async fn apply_outcome(
        &mut self,
        controller: Box<dyn MethodController>,
        outcome: MethodOutcome,
    ) -> Result<State> {
        let method = controller.method();
        match outcome {
            MethodOutcome::Success => {
                info!(%method, "Method succeeded");
                if let Some(attempt) = self.attempts.last_mut() {
                    attempt.succeed();
                }
                self.awaiting = None;
                self.ui.show_success(method, self.session.update_mode);
                self.finalize().await;
            }
            MethodOutcome::AwaitingCode { destination } => {
                self.awaiting = Some(AwaitingInput::Code { destination });
                self.active = Some(controller);
            }
            MethodOutcome::AwaitingDestination => {
                self.awaiting = Some(AwaitingInput::Destination);
                self.active = Some(controller);
            }
            MethodOutcome::Rejected { message } => {
                debug!(%method, message = %message, "Submission rejected, input re-enabled");
                if let Some(attempt) = self.attempts.last_mut() {
                    attempt.fail(message.clone());
                }
                self.last_error = Some(message);
                self.active = Some(controller);
            }
            MethodOutcome::Redirected(next) => {
                info!(from = %method, to = %next, "Capability missing, redirecting");
                if let Some(attempt) = self.attempts.last_mut() {
                    attempt.fail("capability unavailable, redirected");
                }
                return Box::pin(self.select_method(next)).await;
            }
            MethodOutcome::Suspended { reason } => {
                warn!(%method, reason = %reason, "Method suspended");
                if let Some(attempt) = self.attempts.last_mut() {
                    attempt.fail(reason.clone());
                }
                self.awaiting = None;
                self.last_error = Some(reason);
                self.to_method_selection();
            }
            MethodOutcome::Exhausted { reason } => {
                warn!(%method, reason = %reason, "Retry budget exhausted");
                if let Some(attempt) = self.attempts.last_mut() {
                    attempt.exhaust(reason.clone());
                }
                self.awaiting = None;
                self.last_error = Some(reason);
                self.to_method_selection();
            }
        }
        Ok(self.state)
    }

    /// Report the outcome with the final telemetry bundle. Best-effort: the
    /// authentication result is already determined by the method's success.
    async fn finalize(&mut self) {
        self.state = State::Finalizing;
        let snapshot = self.collector.snapshot();
        let request = FinishSessionRequest {
            acid: self.session.subject_id.clone(),
            session_id: self.session.session_id.clone(),
            token: self.session.auth_token.clone(),
            events: snapshot.events,
        };
        if let Err(e) = self.backend.finish_session(request).await {
            warn!(error = %e, "Session finish report failed");
        }
        self.challenges.clear();
        self.state = State::Done;
        info!(subject = %self.session.subject_id, "Verification session complete");
        self.ui.session_complete();
    }

    fn to_method_selection(&mut self) {
        self.state = State::MethodSelection;
        self.ui
            .show_method_selection(self.session.update_mode, self.availability);
    }

    fn cancel_active(&mut self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.awaiting = None;
        if let Some(mut controller) = self.active.take() {
            controller.cancel();
        }
    }

    fn controller_for(method: Method) -> Box<dyn MethodController> {
        match method {
            Method::Biometric => Box::new(BiometricController::new()),
            Method::Face => Box::new(FaceController::new()),
            Method::Totp => Box::new(TotpController::new()),
            Method::TrustedParty => Box::new(TpnController::new()),
        }
    }

    fn method_ctx(&mut self) -> MethodCtx<'_> {
        MethodCtx {
            session: &mut self.session,
            challenges: &mut self.challenges,
            backend: self.backend.as_ref(),
            store: self.store.as_ref(),
            ui: self.ui.as_ref(),
            passkey: self.passkey.as_ref(),
            camera: self.camera.as_ref(),
            face_config: &self.config.face,
            cancel: CancelToken::new(self.epoch.clone()),
        }
    }
}

pub struct OrchestratorBuilder {
    config: OrchestratorConfig,
    backend: Arc<dyn Backend>,
    subject_id: String,
    update_mode: bool,
    collector: Arc<dyn TelemetryCollector>,
    geolocator: Arc<dyn Geolocator>,
    store: Arc<dyn DeviceTrustStore>,
    ui: Arc<dyn UiSurface>,
    passkey: Arc<dyn PasskeyProvider>,
    camera: Arc<dyn CameraProvider>,
}

impl OrchestratorBuilder {
    /// Run the enrollment/update flow instead of login.
    pub fn update_mode(mut self, update_mode: bool) -> Self {
        self.update_mode = update_mode;
        self
    }

    pub fn telemetry(mut self, collector: Arc<dyn TelemetryCollector>) -> Self {
        self.collector = collector;
        self
    }

    pub fn geolocator(mut self, geolocator: Arc<dyn Geolocator>) -> Self {
        self.geolocator = geolocator;
        self
    }

    pub fn trust_store(mut self, store: Arc<dyn DeviceTrustStore>) -> Self {
        self.store = store;
        self
    }

    pub fn ui(mut self, ui: Arc<dyn UiSurface>) -> Self {
        self.ui = ui;
        self
    }

    pub fn passkey(mut self, passkey: Arc<dyn PasskeyProvider>) -> Self {
        self.passkey = passkey;
        self
    }

    pub fn camera(mut self, camera: Arc<dyn CameraProvider>) -> Self {
        self.camera = camera;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            config: self.config,
            backend: self.backend,
            collector: self.collector,
            geolocator: self.geolocator,
            store: self.store,
            ui: self.ui,
            passkey: self.passkey,
            camera: self.camera,
            session: Session::new(self.subject_id, self.update_mode),
            challenges: ChallengeCache::new(),
            state: State::Init,
            active: None,
            availability: MethodAvailability::default(),
            awaiting: None,
            attempts: Vec::new(),
            last_error: None,
            epoch: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaceCaptureConfig;
    use crate::testing::{MockBackend, MockCamera, MockPasskey, RecordingUi};
    use serde_json::json;

    struct Rig {
        backend: Arc<MockBackend>,
        ui: Arc<RecordingUi>,
        store: Arc<MemoryTrustStore>,
        camera: Arc<MockCamera>,
        orchestrator: Orchestrator,
    }

    impl Rig {
        fn new(update_mode: bool) -> Self {
            let backend = Arc::new(MockBackend::new());
            let ui = Arc::new(RecordingUi::new());
            let store = Arc::new(MemoryTrustStore::new());
            let camera = Arc::new(MockCamera::new());
            let config = OrchestratorConfig {
                face: FaceCaptureConfig::immediate(),
                ..OrchestratorConfig::default()
            };
            let orchestrator = Orchestrator::builder(config, backend.clone(), "acid-1")
                .update_mode(update_mode)
                .ui(ui.clone())
                .trust_store(store.clone())
                .camera(camera.clone())
                .passkey(Arc::new(MockPasskey::new()))
                .build();
            Self { backend, ui, store, camera, orchestrator }
        }
    }

    #[tokio::test]
    async fn test_trusted_device_skips_method_selection() {
        let mut rig = Rig::new(false);
        rig.backend
            .set_trust_response(json!({"challenge": 0, "loginToken": "tok123"}));

        let state = rig.orchestrator.start().await.unwrap();

        assert_eq!(state, State::Done);
        assert_eq!(rig.orchestrator.session().auth_token.as_deref(), Some("tok123"));
        assert_eq!(rig.ui.selection_count(), 0);
        assert_eq!(rig.backend.calls("/sessions/finish"), 1);
        assert!(rig.ui.completed());
    }

    #[tokio::test]
    async fn test_untrusted_device_presents_methods() {
        let mut rig = Rig::new(false);
        rig.backend.set_trust_response(json!({"challenge": 2}));

        let state = rig.orchestrator.start().await.unwrap();

        assert_eq!(state, State::MethodSelection);
        assert_eq!(rig.ui.selection_count(), 1);
        assert_eq!(rig.backend.calls("/sessions/finish"), 0);
    }

    #[tokio::test]
    async fn test_trust_failure_falls_back_to_selection() {
        let mut rig = Rig::new(false);
        rig.backend.fail_endpoint("/identity");

        let state = rig.orchestrator.start().await.unwrap();

        assert_eq!(state, State::MethodSelection);
        assert_eq!(rig.ui.selection_count(), 1);
    }

    #[tokio::test]
    async fn test_update_mode_skips_trust_check() {
        let mut rig = Rig::new(true);

        let state = rig.orchestrator.start().await.unwrap();

        assert_eq!(state, State::MethodSelection);
        assert_eq!(rig.backend.calls("/identity"), 0);
    }

    #[tokio::test]
    async fn test_start_is_not_reentrant() {
        let mut rig = Rig::new(false);
        rig.orchestrator.start().await.unwrap();

        let err = rig.orchestrator.start().await.unwrap_err();
        assert!(matches!(err, AcidError::InvalidState(_)));
    }

    #[tokio::test]
    async fn test_rejected_code_keeps_method_active() {
        let mut rig = Rig::new(false);
        rig.backend
            .push_response("/verify-totp", json!({"success": false, "error": "bad code"}));
        rig.backend
            .push_response("/verify-totp", json!({"success": true, "loginToken": "tok-t"}));

        rig.orchestrator.start().await.unwrap();
        let state = rig.orchestrator.select_method(Method::Totp).await.unwrap();
        assert_eq!(state, State::MethodActive(Method::Totp));

        let state = rig.orchestrator.submit_code("111111").await.unwrap();
        assert_eq!(state, State::MethodActive(Method::Totp));
        assert_eq!(rig.orchestrator.last_error(), Some("bad code"));

        let state = rig.orchestrator.submit_code("222222").await.unwrap();
        assert_eq!(state, State::Done);
        assert_eq!(rig.orchestrator.session().auth_token.as_deref(), Some("tok-t"));
    }

    #[tokio::test]
    async fn test_finalize_failure_still_reaches_done() {
        let mut rig = Rig::new(false);
        rig.backend.set_trust_response(json!({"challenge": 0}));
        rig.backend.fail_endpoint("/sessions/finish");

        let state = rig.orchestrator.start().await.unwrap();

        assert_eq!(state, State::Done);
    }

    #[tokio::test]
    async fn test_driving_after_done_is_invalid() {
        let mut rig = Rig::new(false);
        rig.backend.set_trust_response(json!({"challenge": 0}));
        rig.orchestrator.start().await.unwrap();

        assert!(rig.orchestrator.select_method(Method::Totp).await.is_err());
        assert!(rig.orchestrator.submit_code("123456").await.is_err());
        assert!(rig.orchestrator.cancel_method().is_err());
    }

    #[tokio::test]
    async fn test_cancel_restores_method_selection() {
        let mut rig = Rig::new(false);
        rig.orchestrator.start().await.unwrap();
        rig.orchestrator.select_method(Method::Totp).await.unwrap();

        let state = rig.orchestrator.cancel_method().unwrap();

        assert_eq!(state, State::MethodSelection);
        assert_eq!(rig.ui.selection_count(), 2);
        // the method can be re-entered afterwards
        let state = rig.orchestrator.select_method(Method::Totp).await.unwrap();
        assert_eq!(state, State::MethodActive(Method::Totp));
    }

    #[tokio::test]
    async fn test_suspended_biometric_returns_to_selection() {
        let mut rig = Rig::new(false);
        rig.backend.fail_endpoint("/credentials/verify");

        rig.orchestrator.start().await.unwrap();
        let state = rig.orchestrator.select_method(Method::Biometric).await.unwrap();

        assert_eq!(state, State::MethodSelection);
        assert!(rig.orchestrator.last_error().is_some());
    }

    #[tokio::test]
    async fn test_face_success_finalizes() {
        let mut rig = Rig::new(false);
        rig.backend.set_trust_response(json!({"challenge": 1, "loginAID": "aid-1"}));
        rig.backend.set_response(
            "/upload",
            json!({"result": {"countSurprised": 2}, "loginToken": "tok-f"}),
        );

        rig.orchestrator.start().await.unwrap();
        let state = rig.orchestrator.select_method(Method::Face).await.unwrap();

        assert_eq!(state, State::Done);
        assert_eq!(rig.camera.active_feeds(), 0);
        assert_eq!(rig.backend.calls("/sessions/finish"), 1);
        let upload = rig.backend.last_request("/upload").unwrap();
        assert_eq!(upload["loginAID"], "aid-1");
    }

    #[tokio::test]
    async fn test_attempt_log_tracks_invocations() {
        use crate::session::AttemptResult;

        let mut rig = Rig::new(false);
        for _ in 0..3 {
            rig.backend.push_response("/upload", json!({"result": {"countSurprised": 0}}));
        }
        rig.backend.push_response("/upload", json!({"result": {"countSurprised": 1}}));

        rig.orchestrator.start().await.unwrap();
        rig.orchestrator.select_method(Method::Face).await.unwrap();
        let state = rig.orchestrator.select_method(Method::Face).await.unwrap();
        assert_eq!(state, State::Done);

        let attempts = rig.orchestrator.attempts();
        assert_eq!(attempts.len(), 2);
        assert_eq!(attempts[0].attempt_number, 1);
        assert_eq!(attempts[0].result, AttemptResult::Exhausted);
        assert!(attempts[0].error_detail.is_some());
        assert_eq!(attempts[1].attempt_number, 2);
        assert_eq!(attempts[1].result, AttemptResult::Success);
    }

    #[tokio::test]
    async fn test_teardown_clears_session() {
        let mut rig = Rig::new(false);
        rig.backend.set_trust_response(json!({"challenge": 1, "loginAID": "aid-1"}));
        rig.orchestrator.start().await.unwrap();

        rig.orchestrator.teardown();

        assert_eq!(rig.orchestrator.state(), State::Done);
        assert!(rig.orchestrator.session().session_id.is_none());
    }
}
