//! Face-liveness controller.
//!
//! Probe-and-release availability check, then a capture/classify loop: warm
//! up, capture a fixed burst of frames in strict sequence, upload, and read
//! the liveness signal. Anything short of a positive signal costs a retry;
//! the budget is two retries after the first attempt. The camera is released
//! on every exit path.

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{Method, MethodController, MethodCtx, MethodOutcome};
use crate::api::types::{BurstFrame, UploadContext};
use crate::camera::{encode_jpeg, CameraFeed};
use crate::error::{AcidError, Result};

/// Retry accounting for one face-liveness activation.
///
/// `attempt_count` counts failed classification attempts; the activation is
/// exhausted once it exceeds `max_attempts` (so `max_attempts = 2` allows
/// three bursts in total). Recreated at every fresh activation, so the count
/// always restarts at zero.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempt_count: u32,
    pub max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self { attempt_count: 0, max_attempts }
    }

    pub fn record_failure(&mut self) {
        self.attempt_count += 1;
    }

    pub fn exhausted(&self) -> bool {
        self.attempt_count > self.max_attempts
    }
}

pub struct FaceController {
    retry: RetryState,
}

impl FaceController {
    pub fn new() -> Self {
        Self { retry: RetryState::new(0) }
    }

    pub fn retry_state(&self) -> &RetryState {
        &self.retry
    }

    /// Capture one burst in strict sequence order. Upload never starts on a
    /// partial burst: any capture or encode failure abandons the whole burst.
    async fn capture_burst(
        &self,
        ctx: &MethodCtx<'_>,
        feed: &mut dyn CameraFeed,
    ) -> Result<Vec<BurstFrame>> {
        let config = ctx.face_config;
        let mut frames = Vec::with_capacity(config.frame_count);
        for index in 0..config.frame_count {
            ctx.cancel.ensure_active()?;
            let raw = feed.capture()?;
            let jpeg = encode_jpeg(&raw, config.jpeg_quality)?;
            frames.push(BurstFrame {
                filename: format!("image_{index}.jpg"),
                jpeg,
            });
            if index + 1 < config.frame_count {
                sleep(config.frame_interval).await;
            }
        }
        Ok(frames)
    }

    async fn capture_loop(
        &mut self,
        ctx: &mut MethodCtx<'_>,
        feed: &mut dyn CameraFeed,
    ) -> Result<MethodOutcome> {
        loop {
            if ctx.cancel.is_cancelled() {
                return Ok(MethodOutcome::Suspended { reason: "Cancelled".into() });
            }

            let frames = match self.capture_burst(ctx, feed).await {
                Ok(frames) => frames,
                Err(AcidError::Cancelled) => {
                    return Ok(MethodOutcome::Suspended { reason: "Cancelled".into() })
                }
                Err(e) => return Ok(self.suspend(ctx, format!("Frame capture failed: {e}"))),
            };

            debug!(
                frames = frames.len(),
                attempt = self.retry.attempt_count + 1,
                "Uploading capture burst"
            );

            let context = UploadContext {
                acid: ctx.session.subject_id.clone(),
                login_aid: ctx.session.session_id.clone(),
                update_token: if ctx.session.update_mode {
                    ctx.session.auth_token.clone()
                } else {
                    None
                },
            };

            let failure = match ctx.backend.classify_burst(&context, frames).await {
                Ok(response) if response.is_live() => {
                    ctx.session.set_auth_token(response.login_token);
                    if let Some(device_token) = response.device_token {
                        if let Err(e) = ctx.store.save(&device_token) {
                            warn!(error = %e, "Failed to persist device trust token");
                        }
                    }
                    info!(attempt = self.retry.attempt_count + 1, "Liveness confirmed");
                    return Ok(MethodOutcome::Success);
                }
                Ok(response) => response
                    .result
                    .error
                    .unwrap_or_else(|| "no liveness signal".to_string()),
                Err(e) => e.to_string(),
            };

            self.retry.record_failure();
            warn!(
                attempt = self.retry.attempt_count,
                reason = %failure,
                "Liveness attempt failed"
            );

            if self.retry.exhausted() {
                let reason = format!(
                    "Face verification failed after {} attempts: {failure}",
                    self.retry.attempt_count
                );
                ctx.ui.show_error(Some(Method::Face), &reason);
                return Ok(MethodOutcome::Exhausted { reason });
            }

            sleep(ctx.face_config.retry_backoff).await;
        }
    }

    fn suspend(&self, ctx: &MethodCtx<'_>, reason: String) -> MethodOutcome {
        ctx.ui.show_error(Some(Method::Face), &reason);
        MethodOutcome::Suspended { reason }
    }
}

impl Default for FaceController {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MethodController for FaceController {
    fn method(&self) -> Method {
        Method::Face
    }

    async fn start(&mut self, ctx: &mut MethodCtx<'_>) -> Result<MethodOutcome> {
        // Fresh activation, fresh budget.
        self.retry = RetryState::new(ctx.face_config.max_retries);

        if !ctx.camera.probe().await {
            debug!("Camera unavailable, routing to trusted-party verification");
            return Ok(MethodOutcome::Redirected(Method::TrustedParty));
        }

        let mut feed = match ctx.camera.open().await {
            Ok(feed) => feed,
            Err(e) => return Ok(self.suspend(ctx, format!("Camera acquisition failed: {e}"))),
        };

        sleep(ctx.face_config.warmup).await;

        let result = self.capture_loop(ctx, feed.as_mut()).await;
        // Scoped acquisition: released on success, exhaustion, cancel, and error alike.
        feed.stop();
        result
    }
}
