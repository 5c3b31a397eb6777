//! Wire types for the trust-service protocol.
//!
//! Field names match the backend contract exactly; binary fields use
//! [`Base64UrlData`](crate::codec::Base64UrlData) so decoding happens at the
//! serde boundary.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::Base64UrlData;
use crate::position::DevicePosition;

fn default_true() -> bool {
    true
}

// =============================================================================
// Trust check
// =============================================================================

/// Telemetry bundle nested under `data` in the trust-check request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryData {
    /// Opaque device/browser fingerprint.
    pub fingerprint: Value,
    /// Opaque passive interaction events recorded so far.
    pub events: Vec<Value>,
}

/// `POST /identity` request body.
#[derive(Debug, Clone, Serialize)]
pub struct TrustCheckRequest {
    pub data: TelemetryData,
    pub acid: String,
    /// Existing device-trust token, if one is stored.
    pub token: Option<String>,
    pub position: DevicePosition,
    #[serde(rename = "injectedLinks")]
    pub injected_links: Vec<String>,
    #[serde(rename = "injectedScripts")]
    pub injected_scripts: Vec<String>,
}

/// `POST /identity` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrustCheckResponse {
    /// `0` means fully trusted; any other value requires a challenge.
    #[serde(default)]
    pub challenge: i64,
    #[serde(rename = "loginToken", default)]
    pub login_token: Option<String>,
    #[serde(rename = "deviceToken", default)]
    pub device_token: Option<String>,
    #[serde(rename = "loginAID", default)]
    pub login_aid: Option<String>,
    #[serde(rename = "userFaceCaptured", default)]
    pub user_face_captured: Option<bool>,
    #[serde(rename = "webAuthnCaptured", default)]
    pub web_authn_captured: Option<bool>,
    #[serde(rename = "totpCaptured", default)]
    pub totp_captured: Option<bool>,
}

/// Per-factor enrollment hints from the trust response, surfaced to the
/// presentation layer. Absent hints do not gate the state machine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MethodAvailability {
    pub face_enrolled: Option<bool>,
    pub passkey_enrolled: Option<bool>,
    pub totp_enrolled: Option<bool>,
}

impl From<&TrustCheckResponse> for MethodAvailability {
    fn from(response: &TrustCheckResponse) -> Self {
        Self {
            face_enrolled: response.user_face_captured,
            passkey_enrolled: response.web_authn_captured,
            totp_enrolled: response.totp_captured,
        }
    }
}

// =============================================================================
// Passkey challenges and credential exchange
// =============================================================================

/// Body for both passkey challenge-issuance endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ChallengeRequest {
    pub acid: String,
}

/// User entity inside credential-creation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyUser {
    /// User handle, binary on the authenticator side.
    pub id: Base64UrlData,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "displayName", default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

/// Server-issued options for platform credential creation (enrollment).
///
/// Only the binary fields the capability needs decoded are typed; everything
/// else (rp, algorithms, attestation preferences) passes through untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialCreationOptions {
    pub challenge: Base64UrlData,
    pub user: PublicKeyUser,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Allowed credential descriptor inside assertion options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllowCredential {
    pub id: Base64UrlData,
    #[serde(rename = "type", default)]
    pub credential_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Server-issued options for a platform credential assertion (login).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialRequestOptions {
    pub challenge: Base64UrlData,
    #[serde(rename = "allowCredentials", default)]
    pub allow_credentials: Vec<AllowCredential>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Authenticator attestation output (credential creation).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttestationResponse {
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlData,
    #[serde(rename = "attestationObject")]
    pub attestation_object: Base64UrlData,
}

/// Serialized new credential, transport-safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredCredential {
    pub id: String,
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlData,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub response: AttestationResponse,
}

/// Authenticator assertion output (login).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionResponse {
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: Base64UrlData,
    #[serde(rename = "clientDataJSON")]
    pub client_data_json: Base64UrlData,
    pub signature: Base64UrlData,
    #[serde(rename = "userHandle", default, skip_serializing_if = "Option::is_none")]
    pub user_handle: Option<Base64UrlData>,
}

/// Serialized assertion credential, transport-safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssertionCredential {
    pub id: String,
    #[serde(rename = "rawId")]
    pub raw_id: Base64UrlData,
    #[serde(rename = "type")]
    pub credential_type: String,
    pub response: AssertionResponse,
}

/// `POST /credentials/register` request body.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterCredentialRequest {
    pub acid: String,
    pub payload: RegisteredCredential,
    /// Authenticator data, encoded separately from the attestation payload.
    #[serde(rename = "authenticatorData")]
    pub authenticator_data: Base64UrlData,
}

/// `POST /credentials/verify` request body.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyCredentialRequest {
    pub acid: String,
    pub payload: AssertionCredential,
    #[serde(rename = "loginAID")]
    pub login_aid: Option<String>,
}

/// Response for both credential-exchange endpoints. Success is signaled by a
/// non-empty `message`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialExchangeResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(rename = "loginToken", default)]
    pub login_token: Option<String>,
    #[serde(rename = "deviceToken", default)]
    pub device_token: Option<String>,
}

impl CredentialExchangeResponse {
    pub fn confirmed(&self) -> bool {
        self.message.as_deref().is_some_and(|m| !m.is_empty())
    }
}

// =============================================================================
// Face-liveness upload
// =============================================================================

/// One JPEG-encoded burst frame, in capture order.
#[derive(Debug, Clone)]
pub struct BurstFrame {
    pub filename: String,
    pub jpeg: Vec<u8>,
}

/// Session fields accompanying the multipart image upload.
#[derive(Debug, Clone)]
pub struct UploadContext {
    pub acid: String,
    pub login_aid: Option<String>,
    /// Present in enrollment/update mode only.
    pub update_token: Option<String>,
}

/// Classification verdict nested under `result` in the upload response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassificationResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "countSurprised", default)]
    pub count_surprised: Option<i64>,
}

/// `POST /upload` response body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub result: ClassificationResult,
    #[serde(rename = "loginToken", default)]
    pub login_token: Option<String>,
    #[serde(rename = "deviceToken", default)]
    pub device_token: Option<String>,
}

impl UploadResponse {
    /// The liveness decision rule: a positive surprise count is the only success.
    pub fn is_live(&self) -> bool {
        self.result.error.is_none() && self.result.count_surprised.unwrap_or(0) > 0
    }
}

// =============================================================================
// One-time codes (TOTP and trusted-party)
// =============================================================================

/// `GET /generate-totp` response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TotpProvision {
    /// QR-encodable provisioning payload, displayed by the presentation layer.
    #[serde(rename = "qrCodeDataURL")]
    pub qr_code_data_url: String,
}

/// `POST /verify-totp` request body.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyTotpRequest {
    pub acid: String,
    pub otp: String,
    #[serde(rename = "deviceToken")]
    pub device_token: Option<String>,
    #[serde(rename = "loginAID")]
    pub login_aid: Option<String>,
}

/// `POST /send-totp` request body (out-of-band code dispatch).
#[derive(Debug, Clone, Serialize)]
pub struct SendCodeRequest {
    pub acid: String,
    #[serde(rename = "deviceToken")]
    pub device_token: Option<String>,
    #[serde(rename = "loginAID")]
    pub login_aid: Option<String>,
}

/// `POST /register-tpn` request body.
#[derive(Debug, Clone, Serialize)]
pub struct RegisterTpnRequest {
    pub acid: String,
    pub tpn: String,
}

/// `POST /verify-tpn` request body.
#[derive(Debug, Clone, Serialize)]
pub struct VerifyTpnRequest {
    pub acid: String,
    pub otp: String,
    #[serde(rename = "loginAID")]
    pub login_aid: Option<String>,
}

/// Shared response shape for code verification, registration, and dispatch.
///
/// `success` defaults to true when the server omits it.
#[derive(Debug, Clone, Deserialize)]
pub struct CodeOutcome {
    #[serde(default = "default_true")]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(rename = "loginToken", default)]
    pub login_token: Option<String>,
    #[serde(rename = "deviceToken", default)]
    pub device_token: Option<String>,
}

impl Default for CodeOutcome {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
            login_token: None,
            device_token: None,
        }
    }
}

// =============================================================================
// Finalize
// =============================================================================

/// `POST /sessions/finish` request body.
#[derive(Debug, Clone, Serialize)]
pub struct FinishSessionRequest {
    pub acid: String,
    pub session_id: Option<String>,
    /// Bearer token established during the session, if any.
    pub token: Option<String>,
    /// Accumulated opaque recorder events.
    pub events: Vec<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_trust_request_wire_names() {
        let request = TrustCheckRequest {
            data: TelemetryData {
                fingerprint: json!({"userAgent": "x"}),
                events: vec![],
            },
            acid: "acid-1".into(),
            token: None,
            position: DevicePosition::unknown(),
            injected_links: vec!["l".into()],
            injected_scripts: vec![],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["position"]["latitude"], "unknown");
        assert_eq!(value["injectedLinks"][0], "l");
        assert!(value.get("injected_links").is_none());
    }

    #[test]
    fn test_trust_response_defaults() {
        let response: TrustCheckResponse = serde_json::from_value(json!({"challenge": 2})).unwrap();
        assert_eq!(response.challenge, 2);
        assert!(response.login_token.is_none());
        let availability = MethodAvailability::from(&response);
        assert!(availability.face_enrolled.is_none());
    }

    #[test]
    fn test_creation_options_decode_binary_fields() {
        let options: CredentialCreationOptions = serde_json::from_value(json!({
            "challenge": "AAEC",
            "user": {"id": "_w", "name": "acid-1"},
            "rp": {"name": "AcidCheck"},
            "attestation": "none"
        }))
        .unwrap();
        assert_eq!(options.challenge.as_slice(), &[0, 1, 2]);
        assert_eq!(options.user.id.as_slice(), &[0xff]);
        assert_eq!(options.extra["rp"]["name"], "AcidCheck");
    }

    #[test]
    fn test_assertion_options_decode_allowed_ids() {
        let options: CredentialRequestOptions = serde_json::from_value(json!({
            "challenge": "AAEC",
            "allowCredentials": [{"id": "AAEC", "type": "public-key"}]
        }))
        .unwrap();
        assert_eq!(options.allow_credentials.len(), 1);
        assert_eq!(options.allow_credentials[0].id.as_slice(), &[0, 1, 2]);
    }

    #[test]
    fn test_registered_credential_serializes_base64url() {
        let credential = RegisteredCredential {
            id: "cred".into(),
            raw_id: vec![0xfb, 0xff].into(),
            credential_type: "public-key".into(),
            response: AttestationResponse {
                client_data_json: b"{}".to_vec().into(),
                attestation_object: vec![1, 2, 3].into(),
            },
        };
        let value = serde_json::to_value(&credential).unwrap();
        assert_eq!(value["rawId"], "-_8");
        assert_eq!(value["response"]["attestationObject"], "AQID");
        assert_eq!(value["type"], "public-key");
    }

    #[test]
    fn test_upload_response_decision_rule() {
        let live: UploadResponse =
            serde_json::from_value(json!({"result": {"countSurprised": 3}})).unwrap();
        assert!(live.is_live());

        let zero: UploadResponse =
            serde_json::from_value(json!({"result": {"countSurprised": 0}})).unwrap();
        assert!(!zero.is_live());

        let errored: UploadResponse =
            serde_json::from_value(json!({"result": {"error": "no face", "countSurprised": 4}}))
                .unwrap();
        assert!(!errored.is_live());

        let empty: UploadResponse = serde_json::from_value(json!({})).unwrap();
        assert!(!empty.is_live());
    }

    #[test]
    fn test_code_outcome_defaults_to_success() {
        let outcome: CodeOutcome = serde_json::from_value(json!({})).unwrap();
        assert!(outcome.success);

        let rejected: CodeOutcome =
            serde_json::from_value(json!({"success": false, "error": "bad code"})).unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.error.as_deref(), Some("bad code"));
    }

    #[test]
    fn test_finish_request_uses_snake_session_id() {
        let request = FinishSessionRequest {
            acid: "acid-1".into(),
            session_id: Some("aid".into()),
            token: None,
            events: vec![],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["session_id"], "aid");
    }
}
