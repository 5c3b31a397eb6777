//! Trusted-party-number controller.
//!
//! Login dispatches an out-of-band code to the registered trusted number and
//! awaits 6-digit entry; a failed dispatch goes straight back to method
//! selection rather than waiting on input the user cannot complete.
//! Enrollment accepts a phone-number-like destination first, then switches
//! to code entry with a masked confirmation naming the destination.

use async_trait::async_trait;
use tracing::{info, warn};

use super::{Method, MethodController, MethodCtx, MethodOutcome};
use crate::api::types::{RegisterTpnRequest, SendCodeRequest, VerifyTpnRequest};
use crate::error::Result;

/// Mask a destination number, keeping the trailing digits.
pub fn mask_destination(number: &str) -> String {
    let digits: Vec<char> = number.chars().collect();
    if digits.len() <= 4 {
        return number.to_string();
    }
    let visible = digits.len() - 4;
    digits
        .iter()
        .enumerate()
        .map(|(i, c)| if i < visible { '*' } else { *c })
        .collect()
}

enum Phase {
    /// Enrollment: waiting for the trusted number.
    Destination,
    /// Waiting for the 6-digit code.
    Code,
}

pub struct TpnController {
    phase: Phase,
}

impl TpnController {
    pub fn new() -> Self {
        Self { phase: Phase::Destination }
    }

    fn suspend(&self, ctx: &MethodCtx<'_>, reason: String) -> MethodOutcome {
        warn!(reason = %reason, "Suspending trusted-party method");
        ctx.ui.show_error(Some(Method::TrustedParty), &reason);
        MethodOutcome::Suspended { reason }
    }
}

impl Default for TpnController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MethodController for TpnController {
    fn method(&self) -> Method {
        Method::TrustedParty
    }

    async fn start(&mut self, ctx: &mut MethodCtx<'_>) -> Result<MethodOutcome> {
        if ctx.session.update_mode {
            self.phase = Phase::Destination;
            return Ok(MethodOutcome::AwaitingDestination);
        }

        // Login: trigger the out-of-band dispatch before revealing code entry.
        let request = SendCodeRequest {
            acid: ctx.session.subject_id.clone(),
            device_token: ctx.store.load(),
            login_aid: ctx.session.session_id.clone(),
        };
        match ctx.backend.send_code(request).await {
            Ok(outcome) if !outcome.success => {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| "Code dispatch was refused".to_string());
                Ok(self.suspend(ctx, reason))
            }
            Ok(_) => {
                self.phase = Phase::Code;
                ctx.ui.prompt_code(Method::TrustedParty, None);
                Ok(MethodOutcome::AwaitingCode { destination: None })
            }
            Err(e) => Ok(self.suspend(ctx, format!("Code dispatch failed: {e}"))),
        }
    }

    async fn submit_destination(
        &mut self,
        ctx: &mut MethodCtx<'_>,
        destination: &str,
    ) -> Result<MethodOutcome> {
        if !matches!(self.phase, Phase::Destination) {
            return Err(crate::AcidError::InvalidState(
                "trusted-party destination already registered".into(),
            ));
        }

        let request = RegisterTpnRequest {
            acid: ctx.session.subject_id.clone(),
            tpn: destination.to_string(),
        };
        let outcome = match ctx.backend.register_tpn(request).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(self.suspend(ctx, format!("Registration failed: {e}"))),
        };

        if !outcome.success {
            let message = outcome
                .error
                .unwrap_or_else(|| "Number was not accepted".to_string());
            ctx.ui.show_error(Some(Method::TrustedParty), &message);
            return Ok(MethodOutcome::Rejected { message });
        }

        let masked = mask_destination(destination);
        info!(destination = %masked, "Trusted number registered, awaiting code");
        self.phase = Phase::Code;
        ctx.ui.prompt_code(Method::TrustedParty, Some(&masked));
        Ok(MethodOutcome::AwaitingCode { destination: Some(masked) })
    }

    async fn submit_code(&mut self, ctx: &mut MethodCtx<'_>, code: &str) -> Result<MethodOutcome> {
        if !matches!(self.phase, Phase::Code) {
            return Err(crate::AcidError::InvalidState(
                "no trusted-party code is pending".into(),
            ));
        }

        let request = VerifyTpnRequest {
            acid: ctx.session.subject_id.clone(),
            otp: code.to_string(),
            login_aid: ctx.session.session_id.clone(),
        };
        let outcome = match ctx.backend.verify_tpn(request).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(self.suspend(ctx, format!("Code verification failed: {e}"))),
        };

        if !outcome.success {
            let message = outcome.error.unwrap_or_else(|| "Invalid code".to_string());
            ctx.ui.show_error(Some(Method::TrustedParty), &message);
            return Ok(MethodOutcome::Rejected { message });
        }

        ctx.session.set_auth_token(outcome.login_token);
        if let Some(device_token) = outcome.device_token {
            if let Err(e) = ctx.store.save(&device_token) {
                warn!(error = %e, "Failed to persist device trust token");
            }
        }
        info!("Trusted-party code verified");
        Ok(MethodOutcome::Success)
    }
}
