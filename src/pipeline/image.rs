//! Headless-browser rendering: HTML document → PNG screenshot.
//!
//! Every render launches its own Chromium, loads the document built by
//! [`crate::pipeline::document`], sizes the viewport to the content, and
//! captures that viewport as a PNG at the configured device-scale factor. The browser is released on every exit path:
//! explicitly after a capture, and by [`EngineSession`]'s `Drop` when a
//! step fails or the future is cancelled.

use crate::config::{BoardConfig, Layout};
use crate::error::BoardError;
use crate::output::{Artifact, Renderer};
use crate::pipeline::document::build_document;
use crate::table::Matrix;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use image::ImageFormat;
use std::path::{Path, PathBuf};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Viewport height used before the content has been measured.
const INITIAL_VIEWPORT_HEIGHT: u32 = 800;

/// Extra pixels below the measured body so the card border is not clipped.
const HEIGHT_SLACK: f64 = 10.0;

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Renders the table through a headless Chromium.
#[derive(Debug, Clone)]
pub struct ImageRenderer {
    pub layout: Layout,
    pub executable: PathBuf,
}

impl ImageRenderer {
    pub fn new(layout: Layout, executable: impl Into<PathBuf>) -> Self {
        Self {
            layout,
            executable: executable.into(),
        }
    }

    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(config.layout, config.browser_executable.clone())
    }

    async fn render_png(&self, html: &str) -> Result<Vec<u8>, BoardError> {
        let session = EngineSession::launch(&self.executable).await?;
        let captured = session.capture(html, self.layout).await;
        session.release().await;
        let png = captured?;

        let (w, h) = verify_png(&png)?;
        check_width(w, self.layout)?;
        debug!("Captured {}×{} PNG ({} bytes)", w, h, png.len());
        Ok(png)
    }
}

#[async_trait]
impl Renderer for ImageRenderer {
    async fn render(
        &self,
        table: &Matrix,
        title: &str,
        timestamp: &str,
    ) -> Result<Artifact, BoardError> {
        let html = build_document(table, title, timestamp);
        let png = self.render_png(&html).await?;
        Ok(Artifact::Png(png))
    }
}

/// A launched browser plus the task driving its DevTools connection.
struct EngineSession {
    browser: Option<Browser>,
    handler: Option<JoinHandle<()>>,
}

impl EngineSession {
    async fn launch(executable: &Path) -> Result<Self, BoardError> {
        let config = BrowserConfig::builder()
            .chrome_executable(executable)
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-gpu")
            .arg("--hide-scrollbars")
            .build()
            .map_err(|e| BoardError::render(format!("browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            BoardError::render(format!("failed to launch {}: {e}", executable.display()))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        debug!("Launched browser {}", executable.display());

        Ok(Self {
            browser: Some(browser),
            handler: Some(handler),
        })
    }

    async fn capture(&self, html: &str, layout: Layout) -> Result<Vec<u8>, BoardError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| BoardError::Internal("browser already released".into()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BoardError::render(format!("new page: {e}")))?;

        set_viewport(&page, layout, INITIAL_VIEWPORT_HEIGHT).await?;
        page.set_content(html)
            .await
            .map_err(|e| BoardError::render(format!("load document: {e}")))?;

        // Layout is only final once web fonts are in.
        let fonts_ready = EvaluateParams::builder()
            .expression("document.fonts.ready.then(() => true)")
            .await_promise(true)
            .build()
            .map_err(|e| BoardError::render(format!("fonts probe: {e}")))?;
        page.evaluate(fonts_ready)
            .await
            .map_err(|e| BoardError::render(format!("wait for fonts: {e}")))?;

        let body_height: f64 = page
            .evaluate("document.body.getBoundingClientRect().height")
            .await
            .map_err(|e| BoardError::render(format!("measure body: {e}")))?
            .into_value()
            .map_err(|e| BoardError::render(format!("measure body: {e}")))?;
        let height = content_height(body_height);
        debug!("Body measures {body_height}px; viewport height {height}px");

        set_viewport(&page, layout, height).await?;

        // The viewport now spans the content. A full-page capture would reset
        // the device metrics to scale 1, so capture the viewport as-is.
        let params = ScreenshotParams::builder()
            .format(CaptureScreenshotFormat::Png)
            .build();
        page.screenshot(params)
            .await
            .map_err(|e| BoardError::render(format!("screenshot: {e}")))
    }

    /// Close the browser and wait for its process to exit.
    async fn release(mut self) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close failed: {e}");
            }
            if let Err(e) = browser.wait().await {
                warn!("Browser wait failed: {e}");
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
    }
}

impl Drop for EngineSession {
    fn drop(&mut self) {
        // Reached only when `release` did not run; dropping the browser
        // kills its process.
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if self.browser.take().is_some() {
            debug!("Browser dropped without an explicit close");
        }
    }
}

async fn set_viewport(page: &Page, layout: Layout, height: u32) -> Result<(), BoardError> {
    let metrics = SetDeviceMetricsOverrideParams::new(
        i64::from(layout.width),
        i64::from(height),
        layout.device_scale_factor,
        false,
    );
    page.execute(metrics)
        .await
        .map_err(|e| BoardError::render(format!("set viewport: {e}")))?;
    Ok(())
}

/// Viewport height for a measured body: rounded up plus slack, falling back
/// to the initial height when the measurement is unusable.
fn content_height(body_height: f64) -> u32 {
    let h = if body_height.is_finite() && body_height > 0.0 {
        body_height
    } else {
        INITIAL_VIEWPORT_HEIGHT as f64
    };
    (h + HEIGHT_SLACK).ceil() as u32
}

/// Pixel width a capture of `layout` must have.
fn expected_width(layout: Layout) -> u32 {
    (f64::from(layout.width) * layout.device_scale_factor).round() as u32
}

/// Reject captures whose width ignores the device-scale factor.
fn check_width(width: u32, layout: Layout) -> Result<(), BoardError> {
    let expected = expected_width(layout);
    if width != expected {
        return Err(BoardError::render(format!(
            "PNG is {width}px wide, expected {expected}px ({}px × {})",
            layout.width, layout.device_scale_factor
        )));
    }
    Ok(())
}

/// Confirm `bytes` is a decodable PNG and return its dimensions.
pub fn verify_png(bytes: &[u8]) -> Result<(u32, u32), BoardError> {
    if !bytes.starts_with(&PNG_SIGNATURE) {
        return Err(BoardError::render("capture is not a PNG"));
    }
    let img = image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map_err(|e| BoardError::render(format!("capture is not a valid PNG: {e}")))?;
    if img.width() == 0 || img.height() == 0 {
        return Err(BoardError::render("capture is empty"));
    }
    Ok((img.width(), img.height()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbaImage};
    use std::io::Cursor;

    fn encode_png(w: u32, h: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::new(w, h));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn verify_accepts_real_png() {
        let png = encode_png(20, 10);
        assert_eq!(verify_png(&png).unwrap(), (20, 10));
    }

    #[test]
    fn verify_rejects_non_png() {
        assert!(verify_png(b"<html>blocked</html>").is_err());
        assert!(verify_png(&[]).is_err());
    }

    #[test]
    fn verify_rejects_truncated_png() {
        let png = encode_png(20, 10);
        let err = verify_png(&png[..png.len() / 2]).unwrap_err();
        assert!(matches!(err, BoardError::Render { .. }));
    }

    #[test]
    fn content_height_adds_slack_and_rounds_up() {
        assert_eq!(content_height(400.2), 411);
        assert_eq!(content_height(0.0), 810);
        assert_eq!(content_height(f64::NAN), 810);
    }

    #[test]
    fn capture_width_must_include_scale_factor() {
        let layout = Layout::default();
        assert_eq!(expected_width(layout), layout.width * 2);
        assert!(check_width(layout.width * 2, layout).is_ok());

        let err = check_width(layout.width, layout).unwrap_err();
        assert!(matches!(err, BoardError::Render { .. }));
        assert!(err.to_string().contains("expected 1960px"), "got: {err}");
    }

    #[test]
    fn fractional_scale_rounds_width() {
        let layout = Layout {
            width: 333,
            device_scale_factor: 1.5,
        };
        assert_eq!(expected_width(layout), 500);
    }

    #[tokio::test]
    async fn missing_executable_is_a_render_error() {
        let renderer = ImageRenderer::new(Layout::default(), "/nonexistent/chromium-for-tests");
        let table = vec![vec!["Nick".to_string()]];
        let err = renderer.render(&table, "t", "ts").await.unwrap_err();
        assert!(matches!(err, BoardError::Render { .. }), "got: {err:?}");
    }
}
