//! HTTP/JSON implementation of the [`Backend`] trait.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::types::*;
use super::Backend;
use crate::config::OrchestratorConfig;
use crate::error::{AcidError, Result};

/// Production trust-service client.
///
/// Every request carries the configured timeout, so a non-responding backend
/// fails the request instead of stalling its method forever.
pub struct HttpBackend {
    client: Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(config: &OrchestratorConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let start = Instant::now();
        let response = self.client.post(self.endpoint(path)).json(body).send().await?;
        Self::read_json(path, start, response).await
    }

    async fn read_json<R: DeserializeOwned>(
        path: &str,
        start: Instant,
        response: reqwest::Response,
    ) -> Result<R> {
        let status = response.status();
        let latency_ms = start.elapsed().as_millis() as u64;

        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(path, status = %status, latency_ms, "Backend returned error status");
            return Err(AcidError::Api {
                status: status.as_u16(),
                detail,
            });
        }

        debug!(path, status = %status, latency_ms, "Backend request completed");
        let parsed = response.json().await?;
        Ok(parsed)
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn check_identity(&self, request: TrustCheckRequest) -> Result<TrustCheckResponse> {
        self.post_json("/identity", &request).await
    }

    async fn registration_challenge(&self, acid: &str) -> Result<CredentialCreationOptions> {
        self.post_json("/generate-challenge", &ChallengeRequest { acid: acid.into() })
            .await
    }

    async fn assertion_challenge(&self, acid: &str) -> Result<CredentialRequestOptions> {
        self.post_json("/generate-login", &ChallengeRequest { acid: acid.into() })
            .await
    }

    async fn register_credential(
        &self,
        request: RegisterCredentialRequest,
    ) -> Result<CredentialExchangeResponse> {
        self.post_json("/credentials/register", &request).await
    }

    async fn verify_credential(
        &self,
        request: VerifyCredentialRequest,
    ) -> Result<CredentialExchangeResponse> {
        self.post_json("/credentials/verify", &request).await
    }

    async fn classify_burst(
        &self,
        context: &UploadContext,
        frames: Vec<BurstFrame>,
    ) -> Result<UploadResponse> {
        let mut form = Form::new();
        for frame in frames {
            let part = Part::bytes(frame.jpeg)
                .file_name(frame.filename)
                .mime_str("image/jpeg")?;
            form = form.part("images", part);
        }
        form = form.text("acid", context.acid.clone());
        if let Some(update_token) = &context.update_token {
            form = form.text("updateToken", update_token.clone());
        }
        if let Some(login_aid) = &context.login_aid {
            form = form.text("loginAID", login_aid.clone());
        }

        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint("/upload"))
            .multipart(form)
            .send()
            .await?;
        Self::read_json("/upload", start, response).await
    }

    async fn totp_provision(&self, acid: &str) -> Result<TotpProvision> {
        let start = Instant::now();
        let response = self
            .client
            .get(self.endpoint("/generate-totp"))
            .query(&[("acid", acid)])
            .send()
            .await?;
        Self::read_json("/generate-totp", start, response).await
    }

    async fn verify_totp(&self, request: VerifyTotpRequest) -> Result<CodeOutcome> {
        self.post_json("/verify-totp", &request).await
    }

    async fn send_code(&self, request: SendCodeRequest) -> Result<CodeOutcome> {
        self.post_json("/send-totp", &request).await
    }

    async fn register_tpn(&self, request: RegisterTpnRequest) -> Result<CodeOutcome> {
        self.post_json("/register-tpn", &request).await
    }

    async fn verify_tpn(&self, request: VerifyTpnRequest) -> Result<CodeOutcome> {
        self.post_json("/verify-tpn", &request).await
    }

    async fn finish_session(&self, request: FinishSessionRequest) -> Result<()> {
        let _: serde_json::Value = self.post_json("/sessions/finish", &request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_normalized() {
        let config = OrchestratorConfig {
            base_url: "http://localhost:9088/api/v1/".into(),
            ..OrchestratorConfig::default()
        };
        let backend = HttpBackend::new(&config).unwrap();
        assert_eq!(backend.endpoint("/identity"), "http://localhost:9088/api/v1/identity");
    }
}
