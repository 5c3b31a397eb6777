//! End-to-end flows over the public API with mock collaborators.

use std::sync::Arc;

use acid_core::testing::{MockBackend, MockCamera, MockPasskey, RecordingUi};
use acid_core::{
    DeviceTrustStore, FaceCaptureConfig, MemoryTrustStore, Method, Orchestrator,
    OrchestratorConfig, State,
};
use serde_json::json;

struct Rig {
    backend: Arc<MockBackend>,
    ui: Arc<RecordingUi>,
    camera: Arc<MockCamera>,
    passkey: Arc<MockPasskey>,
    orchestrator: Orchestrator,
}

fn rig() -> Rig {
    rig_with_store(Arc::new(MemoryTrustStore::new()))
}

fn rig_with_store(store: Arc<MemoryTrustStore>) -> Rig {
    let backend = Arc::new(MockBackend::new());
    let ui = Arc::new(RecordingUi::new());
    let camera = Arc::new(MockCamera::new());
    let passkey = Arc::new(MockPasskey::new());
    let config = OrchestratorConfig {
        face: FaceCaptureConfig::immediate(),
        ..OrchestratorConfig::default()
    };
    let orchestrator = Orchestrator::builder(config, backend.clone(), "acid-1")
        .ui(ui.clone())
        .trust_store(store)
        .camera(camera.clone())
        .passkey(passkey.clone())
        .build();
    Rig { backend, ui, camera, passkey, orchestrator }
}

fn zero_count() -> serde_json::Value {
    json!({"result": {"countSurprised": 0}})
}

/// At most one camera feed is held at any instant, across method switches.
#[tokio::test]
async fn camera_exclusivity_across_method_switches() {
    let mut rig = rig();
    rig.backend.set_trust_response(json!({"challenge": 1}));
    for _ in 0..3 {
        rig.backend.push_response("/upload", zero_count());
    }

    rig.orchestrator.start().await.unwrap();

    // face exhausts its budget, user falls back to totp, then retries face
    let state = rig.orchestrator.select_method(Method::Face).await.unwrap();
    assert_eq!(state, State::MethodSelection);

    rig.orchestrator.select_method(Method::Totp).await.unwrap();

    rig.backend.push_response(
        "/upload",
        json!({"result": {"countSurprised": 1}, "loginToken": "tok"}),
    );
    let state = rig.orchestrator.select_method(Method::Face).await.unwrap();
    assert_eq!(state, State::Done);

    assert_eq!(rig.camera.max_concurrent(), 1);
    assert_eq!(rig.camera.active_feeds(), 0);
}

/// A re-entered passkey ceremony reuses the session's issued challenge:
/// byte-identical payloads, exactly one issuance request.
#[tokio::test]
async fn challenge_reuse_across_passkey_retries() {
    let mut rig = rig();
    rig.backend.set_trust_response(json!({"challenge": 1}));
    rig.orchestrator.start().await.unwrap();

    rig.passkey.reject_next("user dismissed the prompt");
    let state = rig.orchestrator.select_method(Method::Biometric).await.unwrap();
    assert_eq!(state, State::MethodSelection);

    let state = rig.orchestrator.select_method(Method::Biometric).await.unwrap();
    assert_eq!(state, State::Done);

    assert_eq!(rig.backend.calls("/generate-login"), 1);
    let challenges = rig.passkey.received_challenges();
    assert_eq!(challenges.len(), 2);
    assert_eq!(challenges[0], challenges[1]);
}

/// count=0 on tries 1 and 2 and count=1 on try 3: exactly three bursts of
/// eight frames, ending in success.
#[tokio::test]
async fn face_succeeds_on_third_attempt() {
    let mut rig = rig();
    rig.backend.set_trust_response(json!({"challenge": 1}));
    rig.backend.push_response("/upload", zero_count());
    rig.backend.push_response("/upload", zero_count());
    rig.backend.push_response(
        "/upload",
        json!({"result": {"countSurprised": 1}, "loginToken": "tok-f"}),
    );

    rig.orchestrator.start().await.unwrap();
    let state = rig.orchestrator.select_method(Method::Face).await.unwrap();

    assert_eq!(state, State::Done);
    assert_eq!(rig.backend.calls("/upload"), 3);
    assert_eq!(rig.backend.upload_frame_counts(), vec![8, 8, 8]);
    assert_eq!(rig.orchestrator.session().auth_token.as_deref(), Some("tok-f"));
}

/// count=0 on all three tries: the method suspends and no camera track stays
/// active.
#[tokio::test]
async fn face_exhaustion_suspends_and_releases_camera() {
    let mut rig = rig();
    rig.backend.set_trust_response(json!({"challenge": 1}));
    for _ in 0..3 {
        rig.backend.push_response("/upload", zero_count());
    }

    rig.orchestrator.start().await.unwrap();
    let state = rig.orchestrator.select_method(Method::Face).await.unwrap();

    assert_eq!(state, State::MethodSelection);
    assert_eq!(rig.backend.calls("/upload"), 3);
    assert_eq!(rig.camera.active_feeds(), 0);
    assert!(rig.orchestrator.last_error().is_some());
}

/// challenge=0 with a token: the session adopts it and the orchestrator
/// reaches Done without ever presenting method selection.
#[tokio::test]
async fn trusted_device_finalizes_immediately() {
    let mut rig = rig();
    rig.backend
        .set_trust_response(json!({"challenge": 0, "loginToken": "tok123"}));

    let state = rig.orchestrator.start().await.unwrap();

    assert_eq!(state, State::Done);
    assert_eq!(rig.orchestrator.session().auth_token.as_deref(), Some("tok123"));
    assert_eq!(rig.ui.selection_count(), 0);
    assert_eq!(rig.backend.calls("/sessions/finish"), 1);
}

/// A protocol rejection keeps the method active, exposes the server's
/// message verbatim, and permits resubmission.
#[tokio::test]
async fn code_rejection_is_verbatim_and_resubmittable() {
    let mut rig = rig();
    rig.backend.set_trust_response(json!({"challenge": 1}));
    rig.backend
        .push_response("/verify-tpn", json!({"success": false, "error": "bad code"}));
    rig.backend
        .push_response("/verify-tpn", json!({"success": true, "loginToken": "tok-p"}));

    rig.orchestrator.start().await.unwrap();
    rig.orchestrator.select_method(Method::TrustedParty).await.unwrap();

    let state = rig.orchestrator.submit_code("000000").await.unwrap();
    assert_eq!(state, State::MethodActive(Method::TrustedParty));
    assert_eq!(rig.orchestrator.last_error(), Some("bad code"));
    assert_eq!(rig.ui.errors(), vec!["bad code".to_string()]);

    let state = rig.orchestrator.submit_code("123456").await.unwrap();
    assert_eq!(state, State::Done);
}

/// A token persisted by one successful method is supplied on the next
/// session's trust check, with geolocation denial degrading to the sentinel
/// pair.
#[tokio::test]
async fn device_token_round_trip_between_sessions() {
    let store = Arc::new(MemoryTrustStore::new());

    let mut first = rig_with_store(store.clone());
    first.backend.set_trust_response(json!({"challenge": 1}));
    first
        .backend
        .set_response("/verify-tpn", json!({"success": true, "deviceToken": "dev-42"}));
    first.orchestrator.start().await.unwrap();
    first.orchestrator.select_method(Method::TrustedParty).await.unwrap();
    let state = first.orchestrator.submit_code("123456").await.unwrap();
    assert_eq!(state, State::Done);
    assert_eq!(store.load().as_deref(), Some("dev-42"));

    let mut second = rig_with_store(store);
    second.backend.set_trust_response(json!({"challenge": 1}));
    second.orchestrator.start().await.unwrap();

    let submitted = second.backend.last_trust_request().unwrap();
    assert_eq!(submitted["token"], "dev-42");
    assert_eq!(submitted["position"]["latitude"], "unknown");
    assert_eq!(submitted["position"]["longitude"], "unknown");
}

/// Switching methods while one is awaiting input drops the old controller;
/// the new method proceeds normally.
#[tokio::test]
async fn switching_methods_cancels_previous_controller() {
    let mut rig = rig();
    rig.backend.set_trust_response(json!({"challenge": 1}));

    rig.orchestrator.start().await.unwrap();
    rig.orchestrator.select_method(Method::Totp).await.unwrap();

    // switching to trusted-party: the pending totp code entry is gone
    let state = rig.orchestrator.select_method(Method::TrustedParty).await.unwrap();
    assert_eq!(state, State::MethodActive(Method::TrustedParty));

    rig.backend.set_response("/verify-tpn", json!({"success": true}));
    let state = rig.orchestrator.submit_code("123456").await.unwrap();
    assert_eq!(state, State::Done);
    assert_eq!(rig.backend.calls("/verify-totp"), 0);
}

/// A host without a camera still completes: face routes to trusted-party.
#[tokio::test]
async fn face_without_camera_redirects_to_trusted_party() {
    let backend = Arc::new(MockBackend::new());
    backend.set_trust_response(json!({"challenge": 1}));
    let ui = Arc::new(RecordingUi::new());
    let config = OrchestratorConfig {
        face: FaceCaptureConfig::immediate(),
        ..OrchestratorConfig::default()
    };
    // builder default camera is capability-less
    let mut orchestrator = Orchestrator::builder(config, backend.clone(), "acid-1")
        .ui(ui.clone())
        .build();

    orchestrator.start().await.unwrap();
    let state = orchestrator.select_method(Method::Face).await.unwrap();

    assert_eq!(state, State::MethodActive(Method::TrustedParty));
    assert_eq!(ui.activated(), vec![Method::Face, Method::TrustedParty]);
    assert_eq!(backend.calls("/send-totp"), 1);
}
