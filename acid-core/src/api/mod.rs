//! Trust-service protocol client.
//!
//! [`Backend`] is the network collaborator boundary: every endpoint the
//! orchestrator consumes, defined only by its request/response schema.
//! [`HttpBackend`] is the production implementation over HTTP/JSON.

mod http;
pub mod types;

pub use http::HttpBackend;

use async_trait::async_trait;

use crate::error::Result;
use types::*;

/// The backend risk/trust engine, as seen by the client.
#[async_trait]
pub trait Backend: Send + Sync {
    /// `POST /identity`: initial trust check.
    async fn check_identity(&self, request: TrustCheckRequest) -> Result<TrustCheckResponse>;

    /// `POST /generate-challenge`: passkey registration challenge issuance.
    async fn registration_challenge(&self, acid: &str) -> Result<CredentialCreationOptions>;

    /// `POST /generate-login`: passkey assertion challenge issuance.
    async fn assertion_challenge(&self, acid: &str) -> Result<CredentialRequestOptions>;

    /// `POST /credentials/register`: submit a newly created credential.
    async fn register_credential(
        &self,
        request: RegisterCredentialRequest,
    ) -> Result<CredentialExchangeResponse>;

    /// `POST /credentials/verify`: submit an assertion for verification.
    async fn verify_credential(
        &self,
        request: VerifyCredentialRequest,
    ) -> Result<CredentialExchangeResponse>;

    /// `POST /upload`: multipart face-liveness burst classification.
    async fn classify_burst(
        &self,
        context: &UploadContext,
        frames: Vec<BurstFrame>,
    ) -> Result<UploadResponse>;

    /// `GET /generate-totp`: authenticator provisioning payload.
    async fn totp_provision(&self, acid: &str) -> Result<TotpProvision>;

    /// `POST /verify-totp`: verify a time-based one-time code.
    async fn verify_totp(&self, request: VerifyTotpRequest) -> Result<CodeOutcome>;

    /// `POST /send-totp`: dispatch an out-of-band code to the trusted party.
    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeOutcome>;

    /// `POST /register-tpn`: register a trusted-party number.
    async fn register_tpn(&self, request: RegisterTpnRequest) -> Result<CodeOutcome>;

    /// `POST /verify-tpn`: verify a trusted-party code.
    async fn verify_tpn(&self, request: VerifyTpnRequest) -> Result<CodeOutcome>;

    /// `POST /sessions/finish`: final telemetry and outcome report.
    async fn finish_session(&self, request: FinishSessionRequest) -> Result<()>;
}
