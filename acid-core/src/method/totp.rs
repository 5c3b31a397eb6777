//! Time-based one-time code controller.
//!
//! Enrollment requests a provisioning payload, shows it, and awaits a
//! confirming 6-digit code; login goes straight to code entry. Rejections
//! surface the server's message verbatim and never consume a budget; the
//! user may resubmit indefinitely.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Method, MethodController, MethodCtx, MethodOutcome};
use crate::api::types::VerifyTotpRequest;
use crate::error::Result;

#[derive(Default)]
pub struct TotpController;

impl TotpController {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MethodController for TotpController {
    fn method(&self) -> Method {
        Method::Totp
    }

    async fn start(&mut self, ctx: &mut MethodCtx<'_>) -> Result<MethodOutcome> {
        if ctx.session.update_mode {
            let provision = match ctx
                .challenges
                .totp_provision(ctx.backend, &ctx.session.subject_id)
                .await
            {
                Ok(provision) => provision,
                Err(e) => {
                    let reason = format!("Provisioning failed: {e}");
                    ctx.ui.show_error(Some(Method::Totp), &reason);
                    return Ok(MethodOutcome::Suspended { reason });
                }
            };
            ctx.ui.show_provisioning(&provision.qr_code_data_url);
        }

        ctx.ui.prompt_code(Method::Totp, None);
        Ok(MethodOutcome::AwaitingCode { destination: None })
    }

    async fn submit_code(&mut self, ctx: &mut MethodCtx<'_>, code: &str) -> Result<MethodOutcome> {
        let request = VerifyTotpRequest {
            acid: ctx.session.subject_id.clone(),
            otp: code.to_string(),
            device_token: ctx.store.load(),
            login_aid: ctx.session.session_id.clone(),
        };

        let outcome = match ctx.backend.verify_totp(request).await {
            Ok(outcome) => outcome,
            Err(e) => {
                let reason = format!("Code verification failed: {e}");
                ctx.ui.show_error(Some(Method::Totp), &reason);
                return Ok(MethodOutcome::Suspended { reason });
            }
        };

        if !outcome.success {
            let message = outcome.error.unwrap_or_else(|| "Invalid code".to_string());
            ctx.ui.show_error(Some(Method::Totp), &message);
            return Ok(MethodOutcome::Rejected { message });
        }

        ctx.session.set_auth_token(outcome.login_token);
        if let Some(device_token) = outcome.device_token {
            if let Err(e) = ctx.store.save(&device_token) {
                warn!(error = %e, "Failed to persist device trust token");
            }
        }
        info!("One-time code verified");
        Ok(MethodOutcome::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DeviceTrustStore;
    use crate::testing::ControllerRig;
    use serde_json::json;

    #[tokio::test]
    async fn test_login_goes_straight_to_code_entry() {
        let mut rig = ControllerRig::new(false);
        let outcome = TotpController::new().start(&mut rig.ctx()).await.unwrap();

        assert_eq!(outcome, MethodOutcome::AwaitingCode { destination: None });
        assert_eq!(rig.backend.calls("/generate-totp"), 0);
        assert_eq!(rig.ui.code_prompts(), vec![Method::Totp]);
    }

    #[tokio::test]
    async fn test_enrollment_shows_provisioning_payload() {
        let mut rig = ControllerRig::new(true);
        rig.backend
            .set_response("/generate-totp", json!({"qrCodeDataURL": "data:image/png;base64,Zm9v"}));

        let outcome = TotpController::new().start(&mut rig.ctx()).await.unwrap();

        assert_eq!(outcome, MethodOutcome::AwaitingCode { destination: None });
        assert_eq!(rig.backend.calls("/generate-totp"), 1);
        assert_eq!(rig.ui.provisioned(), vec!["data:image/png;base64,Zm9v".to_string()]);
    }

    #[tokio::test]
    async fn test_rejection_is_verbatim_and_resubmittable() {
        let mut rig = ControllerRig::new(false);
        rig.backend
            .push_response("/verify-totp", json!({"success": false, "error": "bad code"}));
        rig.backend
            .push_response("/verify-totp", json!({"success": true, "loginToken": "tok-t"}));

        let mut controller = TotpController::new();
        controller.start(&mut rig.ctx()).await.unwrap();

        let rejected = controller.submit_code(&mut rig.ctx(), "111111").await.unwrap();
        assert_eq!(rejected, MethodOutcome::Rejected { message: "bad code".into() });

        let accepted = controller.submit_code(&mut rig.ctx(), "222222").await.unwrap();
        assert_eq!(accepted, MethodOutcome::Success);
        assert_eq!(rig.session.auth_token.as_deref(), Some("tok-t"));
    }

    #[tokio::test]
    async fn test_verify_carries_stored_device_token() {
        let mut rig = ControllerRig::new(false);
        rig.store.save("dev-old").unwrap();
        rig.session.set_session_id(Some("aid-1".into()));
        rig.backend.set_response("/verify-totp", json!({"success": true}));

        let mut controller = TotpController::new();
        controller.start(&mut rig.ctx()).await.unwrap();
        controller.submit_code(&mut rig.ctx(), "123456").await.unwrap();

        let submitted = rig.backend.last_request("/verify-totp").unwrap();
        assert_eq!(submitted["deviceToken"], "dev-old");
        assert_eq!(submitted["loginAID"], "aid-1");
        assert_eq!(submitted["otp"], "123456");
    }
}
