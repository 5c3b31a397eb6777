//! Platform passkey controller.
//!
//! Enrollment creates a device-bound credential against a registration
//! challenge; login asserts with an existing credential. Both paths fail into
//! suspension (capability rejection, transport error, missing confirmation)
//! and are never retried automatically; the challenge cache guarantees a
//! retried activation reuses the already-issued challenge.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::{Method, MethodController, MethodCtx, MethodOutcome};
use crate::api::types::{RegisterCredentialRequest, VerifyCredentialRequest};
use crate::error::Result;

#[derive(Default)]
pub struct BiometricController;

impl BiometricController {
    pub fn new() -> Self {
        Self
    }

    async fn enroll(&self, ctx: &mut MethodCtx<'_>) -> Result<MethodOutcome> {
        let options = match ctx
            .challenges
            .creation_options(ctx.backend, &ctx.session.subject_id)
            .await
        {
            Ok(options) => options,
            Err(e) => return Ok(self.suspend(ctx, format!("Challenge issuance failed: {e}"))),
        };

        let created = match ctx.passkey.create_credential(options).await {
            Ok(created) => created,
            Err(e) => return Ok(self.suspend(ctx, format!("Credential creation failed: {e}"))),
        };

        let request = RegisterCredentialRequest {
            acid: ctx.session.subject_id.clone(),
            payload: created.credential,
            authenticator_data: created.authenticator_data,
        };

        let response = match ctx.backend.register_credential(request).await {
            Ok(response) => response,
            Err(e) => return Ok(self.suspend(ctx, format!("Registration failed: {e}"))),
        };

        if response.confirmed() {
            info!("Passkey registered");
            Ok(MethodOutcome::Success)
        } else {
            Ok(self.suspend(ctx, "Registration was not confirmed by the server".to_string()))
        }
    }

    async fn login(&self, ctx: &mut MethodCtx<'_>) -> Result<MethodOutcome> {
        let options = match ctx
            .challenges
            .assertion_options(ctx.backend, &ctx.session.subject_id)
            .await
        {
            Ok(options) => options,
            Err(e) => return Ok(self.suspend(ctx, format!("Challenge issuance failed: {e}"))),
        };
        debug!(
            allowed_credentials = options.allow_credentials.len(),
            "Requesting platform assertion"
        );

        let assertion = match ctx.passkey.get_assertion(options).await {
            Ok(assertion) => assertion,
            Err(e) => return Ok(self.suspend(ctx, format!("Assertion failed: {e}"))),
        };

        let request = VerifyCredentialRequest {
            acid: ctx.session.subject_id.clone(),
            payload: assertion,
            login_aid: ctx.session.session_id.clone(),
        };

        let response = match ctx.backend.verify_credential(request).await {
            Ok(response) => response,
            Err(e) => return Ok(self.suspend(ctx, format!("Verification failed: {e}"))),
        };

        if !response.confirmed() {
            return Ok(self.suspend(ctx, "Assertion was not confirmed by the server".to_string()));
        }

        ctx.session.set_auth_token(response.login_token);
        if let Some(device_token) = response.device_token {
            if let Err(e) = ctx.store.save(&device_token) {
                warn!(error = %e, "Failed to persist device trust token");
            }
        }
        info!("Passkey assertion verified");
        Ok(MethodOutcome::Success)
    }

    fn suspend(&self, ctx: &MethodCtx<'_>, reason: String) -> MethodOutcome {
        warn!(method = %self.method(), reason = %reason, "Suspending method");
        ctx.ui.show_error(Some(self.method()), &reason);
        MethodOutcome::Suspended { reason }
    }
}

#[async_trait]
impl MethodController for BiometricController {
    fn method(&self) -> Method {
        Method::Biometric
    }

    async fn start(&mut self, ctx: &mut MethodCtx<'_>) -> Result<MethodOutcome> {
        if ctx.session.update_mode {
            self.enroll(ctx).await
        } else {
            self.login(ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeviceTrustStore;
    use crate::testing::ControllerRig;
    use serde_json::json;

    #[tokio::test]
    async fn test_login_persists_tokens() {
        let mut rig = ControllerRig::new(false);
        rig.backend.set_response(
            "/credentials/verify",
            json!({"message": "ok", "loginToken": "tok-a", "deviceToken": "dev-a"}),
        );

        let outcome = BiometricController::new().start(&mut rig.ctx()).await.unwrap();

        assert_eq!(outcome, MethodOutcome::Success);
        assert_eq!(rig.session.auth_token.as_deref(), Some("tok-a"));
        assert_eq!(rig.store.load().as_deref(), Some("dev-a"));
        assert_eq!(rig.backend.calls("/generate-login"), 1);
    }

    #[tokio::test]
    async fn test_login_missing_confirmation_suspends() {
        let mut rig = ControllerRig::new(false);
        rig.backend.set_response("/credentials/verify", json!({"loginToken": "tok-a"}));

        let outcome = BiometricController::new().start(&mut rig.ctx()).await.unwrap();

        assert!(matches!(outcome, MethodOutcome::Suspended { .. }));
        assert!(rig.session.auth_token.is_none());
        assert_eq!(rig.ui.errors().len(), 1);
    }

    #[tokio::test]
    async fn test_enroll_submits_authenticator_data() {
        let mut rig = ControllerRig::new(true);
        rig.backend.set_response("/credentials/register", json!({"message": "registered"}));

        let outcome = BiometricController::new().start(&mut rig.ctx()).await.unwrap();

        assert_eq!(outcome, MethodOutcome::Success);
        let submitted = rig.backend.last_request("/credentials/register").unwrap();
        assert!(submitted["authenticatorData"].is_string());
        assert!(submitted["payload"]["response"]["attestationObject"].is_string());
        assert_eq!(rig.backend.calls("/generate-challenge"), 1);
    }

    #[tokio::test]
    async fn test_capability_rejection_suspends_without_retry() {
        let mut rig = ControllerRig::new(false);
        rig.passkey.reject_next("user dismissed the prompt");

        let outcome = BiometricController::new().start(&mut rig.ctx()).await.unwrap();

        assert!(matches!(outcome, MethodOutcome::Suspended { .. }));
        // the issued challenge stays cached for a later manual retry
        assert_eq!(rig.backend.calls("/generate-login"), 1);
        assert_eq!(rig.backend.calls("/credentials/verify"), 0);
    }
}
