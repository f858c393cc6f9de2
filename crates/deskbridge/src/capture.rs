//! Screen capture with screenshot-to-screen coordinate normalization.
//!
//! Captures are downsized to at most [`MAX_WIDTH`] pixels wide before being
//! handed to a controller, so the controller reasons in screenshot space.
//! [`ScreenScale`] keeps the multiplicative factor that maps those
//! coordinates back onto the real screen for input injection. The service
//! serializes captures and conversions on one mutex; the ratio a conversion
//! reads is always the one left by a fully completed capture.

use crate::platforms::{Capturer, WindowManager};
use crate::AutomationError;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbaImage};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, instrument, warn};

/// Captures wider than this are scaled down proportionally.
pub const MAX_WIDTH: u32 = 1000;

/// Quality for the JPEG artifacts written per capture.
pub const JPEG_QUALITY: u8 = 65;

/// Scale bookkeeping between the real screen and the last capture.
///
/// `scale_ratio` is `screen_width / resized_width` whenever the last capture
/// actually downsized, `1.0` otherwise.
#[derive(Debug, Clone, Copy)]
pub struct ScreenScale {
    scale_ratio: f64,
    screen_width: u32,
    screen_height: u32,
    original_width: u32,
    original_height: u32,
    resized_width: u32,
    resized_height: u32,
    reference_taken: bool,
}

impl Default for ScreenScale {
    fn default() -> Self {
        Self {
            scale_ratio: 1.0,
            screen_width: 0,
            screen_height: 0,
            original_width: 0,
            original_height: 0,
            resized_width: 0,
            resized_height: 0,
            reference_taken: false,
        }
    }
}

impl ScreenScale {
    pub fn record_capture(&mut self, screen: (u32, u32), original: (u32, u32), resized: (u32, u32)) {
        self.scale_ratio = if original.0 > MAX_WIDTH {
            screen.0 as f64 / resized.0 as f64
        } else {
            1.0
        };
        self.screen_width = screen.0;
        self.screen_height = screen.1;
        self.original_width = original.0;
        self.original_height = original.1;
        self.resized_width = resized.0;
        self.resized_height = resized.1;
    }

    /// Map a screenshot-space point to screen space. No clamping: bad input
    /// coordinates produce out-of-screen points, which the input backend is
    /// free to reject.
    pub fn to_screen(&self, x: i32, y: i32) -> (i32, i32) {
        (
            (x as f64 * self.scale_ratio).floor() as i32,
            (y as f64 * self.scale_ratio).floor() as i32,
        )
    }

    pub fn scale_ratio(&self) -> f64 {
        self.scale_ratio
    }

    pub fn screen_size(&self) -> (u32, u32) {
        (self.screen_width, self.screen_height)
    }

    pub fn reference_taken(&self) -> bool {
        self.reference_taken
    }
}

/// Which artifact a capture targets. Active-window captures delegate to
/// region captures and report as such.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CaptureKind {
    Full,
    Reference,
    Region,
}

impl CaptureKind {
    fn artifact(&self) -> &'static str {
        match self {
            CaptureKind::Full => "latest.jpg",
            CaptureKind::Reference => "reference.jpg",
            CaptureKind::Region => "region.jpg",
        }
    }
}

/// Requested region of a region capture, echoed back verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: u32,
    pub h: u32,
}

/// Everything a controller needs to know about a finished capture.
/// Serializes to the wire shape of the `screenshot` action.
#[derive(Debug, Clone, Serialize)]
pub struct CaptureInfo {
    #[serde(rename = "type")]
    pub kind: CaptureKind,
    pub width: u32,
    pub height: u32,
    pub path: String,
    pub size_kb: f64,
    pub scale_ratio: f64,
    pub screen_size: [u32; 2],
    pub pixel_size: [u32; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<Region>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Takes screenshots, maintains the shared [`ScreenScale`], and overwrites
/// one well-known JPEG per capture kind under its artifact directory.
pub struct CaptureService {
    capturer: Arc<dyn Capturer>,
    windows: Arc<dyn WindowManager>,
    dir: PathBuf,
    state: Mutex<ScreenScale>,
}

impl CaptureService {
    pub fn new(
        capturer: Arc<dyn Capturer>,
        windows: Arc<dyn WindowManager>,
        dir: impl Into<PathBuf>,
    ) -> Result<Self, AutomationError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| {
            AutomationError::ExternalFailure(format!(
                "Failed to create screenshot directory {}: {e}",
                dir.display()
            ))
        })?;
        Ok(Self {
            capturer,
            windows,
            dir,
            state: Mutex::new(ScreenScale::default()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Full-screen capture to `latest.jpg`.
    #[instrument(skip(self))]
    pub fn full(&self) -> Result<CaptureInfo, AutomationError> {
        self.capture_frame(CaptureKind::Full)
    }

    /// Full-screen capture to `reference.jpg`; marks the reference as taken.
    #[instrument(skip(self))]
    pub fn reference(&self) -> Result<CaptureInfo, AutomationError> {
        self.capture_frame(CaptureKind::Reference)
    }

    /// Capture a sub-rectangle of the screen to `region.jpg`. The requested
    /// region is echoed back even when it had to be clipped to the frame.
    #[instrument(skip(self))]
    pub fn region(&self, x: i32, y: i32, w: u32, h: u32) -> Result<CaptureInfo, AutomationError> {
        if w == 0 || h == 0 {
            return Err(AutomationError::InvalidInput(
                "Region width and height must be positive".to_string(),
            ));
        }

        let frame = self.capturer.frame()?;
        let screen = self.capturer.screen_size()?;

        let fx = x.clamp(0, frame.width() as i32) as u32;
        let fy = y.clamp(0, frame.height() as i32) as u32;
        let fw = w.min(frame.width().saturating_sub(fx));
        let fh = h.min(frame.height().saturating_sub(fy));
        if fw == 0 || fh == 0 {
            return Err(AutomationError::InvalidInput(format!(
                "Region ({x}, {y}) {w}x{h} lies outside the screen"
            )));
        }
        let cropped = imageops::crop_imm(&frame, fx, fy, fw, fh).to_image();

        let mut state = self.lock_state();
        self.encode(
            cropped,
            screen,
            CaptureKind::Region,
            Some(Region { x, y, w, h }),
            &mut state,
        )
    }

    /// Capture the focused window, resolved through the window manager. When
    /// resolution fails the capture degrades to a full-screen shot carrying a
    /// `warning` instead of failing the command.
    #[instrument(skip(self))]
    pub async fn active_window(&self) -> Result<CaptureInfo, AutomationError> {
        let attempt = match self.windows.foreground_bounds().await {
            Ok(bounds) if bounds.width > 0 && bounds.height > 0 => self.region(
                bounds.x,
                bounds.y,
                bounds.width as u32,
                bounds.height as u32,
            ),
            Ok(bounds) => Err(AutomationError::ExternalFailure(format!(
                "Foreground window reported degenerate bounds {}x{}",
                bounds.width, bounds.height
            ))),
            Err(e) => Err(e),
        };

        match attempt {
            Ok(info) => Ok(info),
            Err(e) => {
                warn!(error = %e, "active window capture failed, falling back to full screen");
                let mut info = self.full()?;
                info.warning = Some(format!("Active window detection failed: {e}"));
                Ok(info)
            }
        }
    }

    /// Convert a screenshot-space point using the ratio of the last capture.
    pub fn to_screen(&self, x: i32, y: i32) -> (i32, i32) {
        self.lock_state().to_screen(x, y)
    }

    pub fn scale_ratio(&self) -> f64 {
        self.lock_state().scale_ratio()
    }

    pub fn reference_taken(&self) -> bool {
        self.lock_state().reference_taken()
    }

    /// Copy of the current scale state, for status reporting.
    pub fn snapshot(&self) -> ScreenScale {
        *self.lock_state()
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ScreenScale> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn capture_frame(&self, kind: CaptureKind) -> Result<CaptureInfo, AutomationError> {
        let frame = self.capturer.frame()?;
        let screen = self.capturer.screen_size()?;
        let mut state = self.lock_state();
        let info = self.encode(frame, screen, kind, None, &mut state)?;
        if kind == CaptureKind::Reference {
            state.reference_taken = true;
        }
        Ok(info)
    }

    /// Downsize, flatten and persist one frame, recording the new scale
    /// ratio. Called with the state lock held so captures stay atomic with
    /// respect to coordinate conversions.
    fn encode(
        &self,
        img: RgbaImage,
        screen: (u32, u32),
        kind: CaptureKind,
        region: Option<Region>,
        state: &mut ScreenScale,
    ) -> Result<CaptureInfo, AutomationError> {
        let (original_w, original_h) = img.dimensions();

        let resized: RgbaImage = if original_w > MAX_WIDTH {
            let new_h = ((original_h as f64) * (MAX_WIDTH as f64 / original_w as f64)) as u32;
            imageops::resize(&img, MAX_WIDTH, new_h.max(1), FilterType::Lanczos3)
        } else {
            img
        };
        let (resized_w, resized_h) = resized.dimensions();

        state.record_capture(screen, (original_w, original_h), (resized_w, resized_h));

        let rgb = DynamicImage::ImageRgba8(resized).to_rgb8();
        let path = self.dir.join(kind.artifact());
        let file = fs::File::create(&path).map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to create {}: {e}", path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        let mut encoder = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY);
        encoder.encode_image(&rgb).map_err(|e| {
            AutomationError::ExternalFailure(format!("JPEG encode failed: {e}"))
        })?;
        writer.flush().map_err(|e| {
            AutomationError::ExternalFailure(format!("Failed to flush {}: {e}", path.display()))
        })?;

        let size = fs::metadata(&path)
            .map_err(|e| {
                AutomationError::ExternalFailure(format!(
                    "Failed to stat {}: {e}",
                    path.display()
                ))
            })?
            .len();

        debug!(
            kind = ?kind,
            width = resized_w,
            height = resized_h,
            ratio = state.scale_ratio(),
            "capture written"
        );

        Ok(CaptureInfo {
            kind,
            width: resized_w,
            height: resized_h,
            path: path.display().to_string(),
            size_kb: round1(size as f64 / 1024.0),
            scale_ratio: round3(state.scale_ratio()),
            screen_size: [screen.0, screen.1],
            pixel_size: [original_w, original_h],
            region,
            warning: None,
        })
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platforms::stub::StubCapturer;
    use crate::WindowBounds;

    struct NoWindows;

    #[async_trait::async_trait]
    impl WindowManager for NoWindows {
        async fn position(&self, app: &str) -> Result<WindowBounds, AutomationError> {
            Err(AutomationError::NotFound(format!("Window not found: {app}")))
        }

        async fn move_window(&self, _: &str, _: i32, _: i32) -> Result<(), AutomationError> {
            Err(AutomationError::Unsupported("move".into()))
        }

        async fn resize_window(&self, _: &str, _: u32, _: u32) -> Result<(), AutomationError> {
            Err(AutomationError::Unsupported("resize".into()))
        }

        async fn list(&self) -> Result<Vec<String>, AutomationError> {
            Ok(vec![])
        }

        async fn foreground_bounds(&self) -> Result<WindowBounds, AutomationError> {
            Err(AutomationError::ExternalFailure(
                "no compositor available".into(),
            ))
        }

        async fn activate(&self, _: &str) -> Result<(), AutomationError> {
            Err(AutomationError::Unsupported("activate".into()))
        }
    }

    fn service_with_frame(frame: (u32, u32), screen: (u32, u32)) -> (CaptureService, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let capturer = Arc::new(StubCapturer::with_dimensions(frame, screen));
        let service =
            CaptureService::new(capturer, Arc::new(NoWindows), dir.path().join("shots")).unwrap();
        (service, dir)
    }

    #[test]
    fn downsizing_capture_records_screen_ratio() {
        let (service, _dir) = service_with_frame((2000, 1200), (2000, 1200));
        let info = service.full().unwrap();

        assert_eq!(info.width, MAX_WIDTH);
        assert_eq!(info.height, 600);
        assert_eq!(info.pixel_size, [2000, 1200]);
        assert_eq!(info.scale_ratio, 2.0);
        assert_eq!(service.to_screen(500, 300), (1000, 600));
    }

    #[test]
    fn small_capture_keeps_unit_ratio() {
        let (service, _dir) = service_with_frame((800, 600), (800, 600));
        let info = service.full().unwrap();

        assert_eq!(info.width, 800);
        assert_eq!(info.scale_ratio, 1.0);
        assert_eq!(service.to_screen(123, 45), (123, 45));
    }

    #[test]
    fn to_screen_floors_fractional_products() {
        // 3024px frame on a 1512pt screen: ratio 1.512 after downsizing.
        let (service, _dir) = service_with_frame((3024, 1964), (1512, 982));
        let info = service.full().unwrap();

        assert_eq!(info.width, MAX_WIDTH);
        assert_eq!(service.scale_ratio(), 1.512);
        assert_eq!(service.to_screen(100, 101), (151, 152));
    }

    #[test]
    fn region_echoes_request_and_crops() {
        let (service, _dir) = service_with_frame((800, 600), (800, 600));
        let info = service.region(0, 0, 100, 50).unwrap();

        assert_eq!(info.kind, CaptureKind::Region);
        assert_eq!(info.width, 100);
        assert_eq!(info.height, 50);
        assert_eq!(info.region, Some(Region { x: 0, y: 0, w: 100, h: 50 }));
        assert!(info.path.ends_with("region.jpg"));
    }

    #[test]
    fn zero_sized_region_is_rejected() {
        let (service, _dir) = service_with_frame((800, 600), (800, 600));
        let err = service.region(10, 10, 0, 50).unwrap_err();
        assert!(matches!(err, AutomationError::InvalidInput(_)));
    }

    #[test]
    fn reference_capture_flips_flag() {
        let (service, _dir) = service_with_frame((800, 600), (800, 600));
        assert!(!service.reference_taken());
        let info = service.reference().unwrap();
        assert!(info.path.ends_with("reference.jpg"));
        assert!(service.reference_taken());
    }

    #[tokio::test]
    async fn active_window_falls_back_to_full_with_warning() {
        let (service, _dir) = service_with_frame((800, 600), (800, 600));
        let info = service.active_window().await.unwrap();

        assert_eq!(info.kind, CaptureKind::Full);
        let warning = info.warning.expect("warning attached");
        assert!(warning.contains("Active window detection failed"));
    }

    #[test]
    fn capture_payload_serializes_wire_shape() {
        let (service, _dir) = service_with_frame((2000, 1200), (2000, 1200));
        let info = service.region(0, 0, 1200, 600).unwrap();
        let value = serde_json::to_value(&info).unwrap();

        assert_eq!(value["type"], "region");
        assert_eq!(value["region"]["w"], 1200);
        assert!(value["width"].as_u64().unwrap() <= MAX_WIDTH as u64);
        assert!(value.get("warning").is_none());
    }
}
