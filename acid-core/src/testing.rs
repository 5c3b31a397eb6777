//! Mock collaborators for driving the orchestrator without a browser, a
//! camera, or a network.
//!
//! WARNING: Testing only. Responses are deterministic and credentials are
//! fabricated.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::types::*;
use crate::api::Backend;
use crate::camera::{CameraFeed, CameraProvider, RawFrame};
use crate::challenge::ChallengeCache;
use crate::codec;
use crate::config::FaceCaptureConfig;
use crate::error::{AcidError, Result};
use crate::method::{CancelToken, Method, MethodCtx};
use crate::passkey::{CreatedCredential, PasskeyProvider};
use crate::position::Geolocator;
use crate::session::Session;
use crate::store::MemoryTrustStore;
use crate::ui::UiSurface;

pub use crate::telemetry::StaticTelemetry;

// =============================================================================
// Backend
// =============================================================================

#[derive(Default)]
struct BackendState {
    sticky: HashMap<String, Value>,
    queued: HashMap<String, VecDeque<Value>>,
    failing: HashSet<String>,
    calls: HashMap<String, usize>,
    last_request: HashMap<String, Value>,
    upload_frame_counts: Vec<usize>,
}

/// Scriptable in-memory backend.
///
/// Responses are JSON values per endpoint path: `push_response` queues
/// one-shot responses consumed in order, `set_response` installs a sticky
/// fallback, and unscripted endpoints answer with a permissive default.
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<BackendState>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sticky response for an endpoint.
    pub fn set_response(&self, path: &str, response: Value) {
        self.state.lock().unwrap().sticky.insert(path.to_string(), response);
    }

    /// Queue a one-shot response; queued responses win over sticky ones.
    pub fn push_response(&self, path: &str, response: Value) {
        self.state
            .lock()
            .unwrap()
            .queued
            .entry(path.to_string())
            .or_default()
            .push_back(response);
    }

    /// Shorthand for scripting `POST /identity`.
    pub fn set_trust_response(&self, response: Value) {
        self.set_response("/identity", response);
    }

    /// Make an endpoint fail with a transport-style error.
    pub fn fail_endpoint(&self, path: &str) {
        self.state.lock().unwrap().failing.insert(path.to_string());
    }

    /// How many times an endpoint was called.
    pub fn calls(&self, path: &str) -> usize {
        *self.state.lock().unwrap().calls.get(path).unwrap_or(&0)
    }

    /// The most recent request body submitted to an endpoint.
    pub fn last_request(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().last_request.get(path).cloned()
    }

    /// The most recent trust-check request body.
    pub fn last_trust_request(&self) -> Option<Value> {
        self.last_request("/identity")
    }

    /// Frame counts of every burst upload, in call order.
    pub fn upload_frame_counts(&self) -> Vec<usize> {
        self.state.lock().unwrap().upload_frame_counts.clone()
    }

    fn respond<R: serde::de::DeserializeOwned>(&self, path: &str, request: Value) -> Result<R> {
        let mut state = self.state.lock().unwrap();
        *state.calls.entry(path.to_string()).or_insert(0) += 1;
        state.last_request.insert(path.to_string(), request);

        if state.failing.contains(path) {
            return Err(AcidError::Api {
                status: 503,
                detail: format!("mock failure for {path}"),
            });
        }

        let value = state
            .queued
            .get_mut(path)
            .and_then(|queue| queue.pop_front())
            .or_else(|| state.sticky.get(path).cloned())
            .unwrap_or_else(|| Self::default_response(path));

        serde_json::from_value(value)
            .map_err(|e| AcidError::Serialization(format!("mock response for {path}: {e}")))
    }

    fn default_response(path: &str) -> Value {
        match path {
            "/identity" => json!({"challenge": 1}),
            "/generate-challenge" => json!({
                "challenge": codec::encode(b"registration-challenge"),
                "user": {"id": codec::encode(b"user-1"), "name": "acid"},
                "rp": {"name": "AcidCheck"},
            }),
            "/generate-login" => json!({
                "challenge": codec::encode(b"assertion-challenge"),
                "allowCredentials": [
                    {"id": codec::encode(b"credential-1"), "type": "public-key"}
                ],
            }),
            "/credentials/register" => json!({"message": "registered"}),
            "/credentials/verify" => json!({"message": "verified"}),
            "/upload" => json!({"result": {"countSurprised": 1}}),
            "/generate-totp" => json!({"qrCodeDataURL": "data:image/png;base64,AAAA"}),
            _ => json!({"success": true}),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn check_identity(&self, request: TrustCheckRequest) -> Result<TrustCheckResponse> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        self.respond("/identity", body)
    }

    async fn registration_challenge(&self, acid: &str) -> Result<CredentialCreationOptions> {
        self.respond("/generate-challenge", json!({"acid": acid}))
    }

    async fn assertion_challenge(&self, acid: &str) -> Result<CredentialRequestOptions> {
        self.respond("/generate-login", json!({"acid": acid}))
    }

    async fn register_credential(
        &self,
        request: RegisterCredentialRequest,
    ) -> Result<CredentialExchangeResponse> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        self.respond("/credentials/register", body)
    }

    async fn verify_credential(
        &self,
        request: VerifyCredentialRequest,
    ) -> Result<CredentialExchangeResponse> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        self.respond("/credentials/verify", body)
    }

    async fn classify_burst(
        &self,
        context: &UploadContext,
        frames: Vec<BurstFrame>,
    ) -> Result<UploadResponse> {
        let body = json!({
            "acid": context.acid,
            "loginAID": context.login_aid,
            "updateToken": context.update_token,
            "frames": frames.iter().map(|f| f.filename.clone()).collect::<Vec<_>>(),
        });
        let result = self.respond("/upload", body);
        self.state.lock().unwrap().upload_frame_counts.push(frames.len());
        result
    }

    async fn totp_provision(&self, acid: &str) -> Result<TotpProvision> {
        self.respond("/generate-totp", json!({"acid": acid}))
    }

    async fn verify_totp(&self, request: VerifyTotpRequest) -> Result<CodeOutcome> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        self.respond("/verify-totp", body)
    }

    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeOutcome> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        self.respond("/send-totp", body)
    }

    async fn register_tpn(&self, request: RegisterTpnRequest) -> Result<CodeOutcome> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        self.respond("/register-tpn", body)
    }

    async fn verify_tpn(&self, request: VerifyTpnRequest) -> Result<CodeOutcome> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        self.respond("/verify-tpn", body)
    }

    async fn finish_session(&self, request: FinishSessionRequest) -> Result<()> {
        let body = serde_json::to_value(&request)
            .map_err(|e| AcidError::Serialization(e.to_string()))?;
        let _: Value = self.respond("/sessions/finish", body)?;
        Ok(())
    }
}

// =============================================================================
// Camera
// =============================================================================

#[derive(Default)]
struct CameraState {
    opens: usize,
    active: usize,
    max_concurrent: usize,
}

/// Camera that always works and tracks how many feeds are live.
#[derive(Default)]
pub struct MockCamera {
    state: Arc<Mutex<CameraState>>,
}

impl MockCamera {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds currently held (0 once everything is released).
    pub fn active_feeds(&self) -> usize {
        self.state.lock().unwrap().active
    }

    /// Total acquisitions, probes included.
    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    /// High-water mark of concurrently held feeds.
    pub fn max_concurrent(&self) -> usize {
        self.state.lock().unwrap().max_concurrent
    }
}

#[async_trait]
impl CameraProvider for MockCamera {
    async fn open(&self) -> Result<Box<dyn CameraFeed>> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        state.active += 1;
        state.max_concurrent = state.max_concurrent.max(state.active);
        Ok(Box::new(MockFeed {
            state: self.state.clone(),
            stopped: false,
            frame_index: 0,
        }))
    }
}

struct MockFeed {
    state: Arc<Mutex<CameraState>>,
    stopped: bool,
    frame_index: u32,
}

impl CameraFeed for MockFeed {
    fn capture(&mut self) -> Result<RawFrame> {
        if self.stopped {
            return Err(AcidError::Capability("feed already stopped".into()));
        }
        self.frame_index += 1;
        let (width, height) = (32u32, 24u32);
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for i in 0..(width * height) {
            let shade = ((i + self.frame_index) % 256) as u8;
            pixels.extend_from_slice(&[shade, shade, 128]);
        }
        Ok(RawFrame::new(width, height, pixels))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.state.lock().unwrap().active -= 1;
        }
    }

    fn is_active(&self) -> bool {
        !self.stopped
    }
}

impl Drop for MockFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Camera capability that is never available (probe fails).
pub struct UnprobeableCamera;

#[async_trait]
impl CameraProvider for UnprobeableCamera {
    async fn open(&self) -> Result<Box<dyn CameraFeed>> {
        Err(AcidError::Capability("no capture device".into()))
    }
}

// =============================================================================
// Passkey
// =============================================================================

#[derive(Default)]
struct PasskeyState {
    reject_next: Option<String>,
    received_challenges: Vec<Vec<u8>>,
}

/// Platform authenticator that fabricates deterministic credentials.
#[derive(Default)]
pub struct MockPasskey {
    state: Mutex<PasskeyState>,
}

impl MockPasskey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next ceremony fail like a dismissed platform prompt.
    pub fn reject_next(&self, reason: &str) {
        self.state.lock().unwrap().reject_next = Some(reason.to_string());
    }

    /// Raw challenge bytes observed by the capability, in call order.
    pub fn received_challenges(&self) -> Vec<Vec<u8>> {
        self.state.lock().unwrap().received_challenges.clone()
    }

    fn check_rejection(&self, challenge: &[u8]) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.received_challenges.push(challenge.to_vec());
        if let Some(reason) = state.reject_next.take() {
            return Err(AcidError::Capability(reason));
        }
        Ok(())
    }
}

#[async_trait]
impl PasskeyProvider for MockPasskey {
    async fn create_credential(
        &self,
        options: CredentialCreationOptions,
    ) -> Result<CreatedCredential> {
        self.check_rejection(options.challenge.as_slice())?;
        let client_data = json!({
            "type": "webauthn.create",
            "challenge": codec::encode(options.challenge.as_slice()),
        });
        Ok(CreatedCredential {
            credential: RegisteredCredential {
                id: "mock-credential".into(),
                raw_id: b"mock-credential".to_vec().into(),
                credential_type: "public-key".into(),
                response: AttestationResponse {
                    client_data_json: client_data.to_string().into_bytes().into(),
                    attestation_object: b"mock-attestation".to_vec().into(),
                },
            },
            authenticator_data: b"mock-authenticator-data".to_vec().into(),
        })
    }

    async fn get_assertion(
        &self,
        options: CredentialRequestOptions,
    ) -> Result<AssertionCredential> {
        self.check_rejection(options.challenge.as_slice())?;
        let client_data = json!({
            "type": "webauthn.get",
            "challenge": codec::encode(options.challenge.as_slice()),
        });
        Ok(AssertionCredential {
            id: "mock-credential".into(),
            raw_id: b"mock-credential".to_vec().into(),
            credential_type: "public-key".into(),
            response: AssertionResponse {
                authenticator_data: b"mock-authenticator-data".to_vec().into(),
                client_data_json: client_data.to_string().into_bytes().into(),
                signature: b"mock-signature".to_vec().into(),
                user_handle: None,
            },
        })
    }
}

// =============================================================================
// Geolocation and UI
// =============================================================================

/// Geolocator behaving like a denied browser permission.
pub struct DenyGeolocator;

#[async_trait]
impl Geolocator for DenyGeolocator {
    async fn locate(&self) -> Result<(f64, f64)> {
        Err(AcidError::Capability("geolocation permission denied".into()))
    }
}

#[derive(Default)]
struct UiLog {
    selections: usize,
    activated: Vec<Method>,
    provisioned: Vec<String>,
    code_prompts: Vec<Method>,
    errors: Vec<String>,
    successes: Vec<Method>,
    completed: usize,
}

/// Surface that records every notification for assertions.
#[derive(Default)]
pub struct RecordingUi {
    log: Mutex<UiLog>,
}

impl RecordingUi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selection_count(&self) -> usize {
        self.log.lock().unwrap().selections
    }

    pub fn activated(&self) -> Vec<Method> {
        self.log.lock().unwrap().activated.clone()
    }

    pub fn provisioned(&self) -> Vec<String> {
        self.log.lock().unwrap().provisioned.clone()
    }

    pub fn code_prompts(&self) -> Vec<Method> {
        self.log.lock().unwrap().code_prompts.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.log.lock().unwrap().errors.clone()
    }

    pub fn successes(&self) -> Vec<Method> {
        self.log.lock().unwrap().successes.clone()
    }

    pub fn completed(&self) -> bool {
        self.log.lock().unwrap().completed > 0
    }
}

impl UiSurface for RecordingUi {
    fn show_method_selection(&self, _update_mode: bool, _availability: MethodAvailability) {
        self.log.lock().unwrap().selections += 1;
    }

    fn method_activated(&self, method: Method, _update_mode: bool) {
        self.log.lock().unwrap().activated.push(method);
    }

    fn show_provisioning(&self, qr_code_data_url: &str) {
        self.log.lock().unwrap().provisioned.push(qr_code_data_url.to_string());
    }

    fn prompt_code(&self, method: Method, _destination: Option<&str>) {
        self.log.lock().unwrap().code_prompts.push(method);
    }

    fn show_error(&self, _method: Option<Method>, message: &str) {
        self.log.lock().unwrap().errors.push(message.to_string());
    }

    fn show_success(&self, method: Method, _update_mode: bool) {
        self.log.lock().unwrap().successes.push(method);
    }

    fn session_complete(&self) {
        self.log.lock().unwrap().completed += 1;
    }
}

// =============================================================================
// Controller test rig
// =============================================================================

/// Bundle of mock collaborators for driving a single controller.
pub struct ControllerRig {
    pub backend: MockBackend,
    pub store: MemoryTrustStore,
    pub ui: RecordingUi,
    pub passkey: MockPasskey,
    pub camera: MockCamera,
    pub session: Session,
    pub challenges: ChallengeCache,
    pub face_config: FaceCaptureConfig,
}

impl ControllerRig {
    /// Fresh rig with zero-delay face timings.
    pub fn new(update_mode: bool) -> Self {
        Self {
            backend: MockBackend::new(),
            store: MemoryTrustStore::new(),
            ui: RecordingUi::new(),
            passkey: MockPasskey::new(),
            camera: MockCamera::new(),
            session: Session::new("acid-1", update_mode),
            challenges: ChallengeCache::new(),
            face_config: FaceCaptureConfig::immediate(),
        }
    }

    pub fn ctx(&mut self) -> MethodCtx<'_> {
        MethodCtx {
            session: &mut self.session,
            challenges: &mut self.challenges,
            backend: &self.backend,
            store: &self.store,
            ui: &self.ui,
            passkey: &self.passkey,
            camera: &self.camera,
            face_config: &self.face_config,
            cancel: CancelToken::detached(),
        }
    }
}
