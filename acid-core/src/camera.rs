//! Camera/media capability boundary and burst frame encoding.
//!
//! Acquisition is scoped: a [`CameraFeed`] owns the underlying capture
//! resource and must be stopped on every exit path. [`CameraFeed::stop`]
//! releases explicitly; `Drop` is the backstop so an early `?` cannot leak a
//! live track.

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;

use crate::error::{AcidError, Result};

/// One uncompressed frame from the capture device, tightly packed RGB8.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl RawFrame {
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self { width, height, pixels }
    }
}

/// A live, exclusive camera feed.
pub trait CameraFeed: Send {
    /// Capture the next frame.
    fn capture(&mut self) -> Result<RawFrame>;

    /// Release the underlying capture resource. Idempotent.
    fn stop(&mut self);

    /// Whether the underlying track is still held.
    fn is_active(&self) -> bool;
}

/// Camera capability provider.
///
/// Availability probing follows the probe-and-release pattern: acquire a
/// feed, confirm it started, release it. [`probe`](CameraProvider::probe)
/// does exactly that and never errors.
#[async_trait]
pub trait CameraProvider: Send + Sync {
    /// Acquire a live feed. Fails if the capability is absent or denied.
    async fn open(&self) -> Result<Box<dyn CameraFeed>>;

    /// Briefly acquire and release the camera to test availability.
    async fn probe(&self) -> bool {
        match self.open().await {
            Ok(mut feed) => {
                feed.stop();
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Camera probe failed");
                false
            }
        }
    }
}

/// Provider for hosts without any capture device.
pub struct UnavailableCamera;

#[async_trait]
impl CameraProvider for UnavailableCamera {
    async fn open(&self) -> Result<Box<dyn CameraFeed>> {
        Err(AcidError::Capability("no capture device on this host".into()))
    }
}

/// Encode a raw frame as a JPEG still at the given quality.
pub fn encode_jpeg(frame: &RawFrame, quality: u8) -> Result<Vec<u8>> {
    let expected = frame.width as usize * frame.height as usize * 3;
    if frame.pixels.len() != expected {
        return Err(AcidError::Encoding(format!(
            "Frame buffer is {} bytes, expected {} for {}x{} RGB8",
            frame.pixels.len(),
            expected,
            frame.width,
            frame.height
        )));
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(&frame.pixels, frame.width, frame.height, ExtendedColorType::Rgb8)
        .map_err(|e| AcidError::Encoding(format!("JPEG encode failed: {e}")))?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient_frame(width: u32, height: u32) -> RawFrame {
        let mut pixels = Vec::with_capacity((width * height * 3) as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push((x % 256) as u8);
                pixels.push((y % 256) as u8);
                pixels.push(128);
            }
        }
        RawFrame::new(width, height, pixels)
    }

    #[test]
    fn test_encode_jpeg_produces_jfif_magic() {
        let jpeg = encode_jpeg(&gradient_frame(64, 48), 75).unwrap();
        assert_eq!(&jpeg[..2], &[0xff, 0xd8], "JPEG SOI marker");
    }

    #[test]
    fn test_encode_jpeg_rejects_short_buffer() {
        let frame = RawFrame::new(64, 48, vec![0; 10]);
        assert!(matches!(encode_jpeg(&frame, 75), Err(AcidError::Encoding(_))));
    }

    #[tokio::test]
    async fn test_unavailable_camera_fails_probe() {
        assert!(!UnavailableCamera.probe().await);
    }
}
