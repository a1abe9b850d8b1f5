//! Per-request render pipeline
//!
//! Each request gets its own tab on the shared browser: load a minimal
//! document sized to the request, inject the ECharts bundle, build the chart
//! in page context, wait for its canvas to materialize, then screenshot the
//! container element. The tab is closed on every exit path.

use crate::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as Base64Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::{Emulation, Page};
use std::sync::Arc;
use tracing::debug;

/// Bound on the in-page wait for the chart canvas to appear with a non-zero
/// size. Rendering beyond this is treated as stuck.
pub const CANVAS_POLL_TIMEOUT_MS: u64 = 8000;

/// Every page rasterizes at 2x its CSS-pixel size for sharp PNG output.
pub const DEVICE_SCALE_FACTOR: f64 = 2.0;

/// CSS id of the chart container, the exact screenshot target.
const CONTAINER_ID: &str = "chart";

/// A validated render job: the opaque chart option plus page geometry.
#[derive(Debug, Clone)]
pub struct RenderJob {
    /// Caller-supplied ECharts option, passed through verbatim
    pub option: serde_json::Value,
    /// Container width in CSS pixels
    pub width: u32,
    /// Container height in CSS pixels
    pub height: u32,
    /// Page background color (any CSS color string)
    pub background_color: String,
}

/// Closes the tab when dropped so an error anywhere in the pipeline cannot
/// leak a page handle.
struct TabGuard {
    tab: Arc<Tab>,
}

impl Drop for TabGuard {
    fn drop(&mut self) {
        if let Err(e) = self.tab.close(true) {
            debug!("tab close failed: {e}");
        }
    }
}

/// Drive one render job to a PNG on the given tab. Blocking; callers on the
/// async runtime should run this on the blocking pool.
pub fn render(tab: Arc<Tab>, job: &RenderJob, bundle: &str) -> Result<Vec<u8>> {
    let guard = TabGuard { tab };
    let tab = &guard.tab;

    // Viewport emulation is per target, so concurrent renders with different
    // geometry never interfere with each other.
    tab.call_method(Emulation::SetDeviceMetricsOverride {
        width: job.width,
        height: job.height,
        device_scale_factor: DEVICE_SCALE_FACTOR,
        mobile: false,
        scale: None,
        screen_width: None,
        screen_height: None,
        position_x: None,
        position_y: None,
        dont_set_visible_size: None,
        screen_orientation: None,
        viewport: None,
        display_feature: None,
        device_posture: None,
    })
    .map_err(|e| Error::PageOpen(format!("Failed to size viewport: {e}")))?;

    let url = page_data_url(&page_html(job.width, job.height, &job.background_color));
    tab.navigate_to(&url)
        .map_err(|e| Error::PageLoad(format!("Navigation failed: {e}")))?;
    tab.wait_until_navigated()
        .map_err(|e| Error::PageLoad(format!("Wait for navigation failed: {e}")))?;

    tab.evaluate(bundle, false)
        .map_err(|e| Error::ScriptInject(format!("Bundle evaluation failed: {e}")))?;

    let option_json = serde_json::to_string(&job.option)?;
    let outcome = tab
        .evaluate(&chart_script(&option_json), false)
        .map_err(|e| Error::ChartEval(format!("Evaluation failed: {e}")))?;
    expect_ok(outcome.value, Error::ChartEval)?;

    let outcome = tab
        .evaluate(&canvas_poll_script(CANVAS_POLL_TIMEOUT_MS), true)
        .map_err(|e| Error::ChartEval(format!("Canvas poll failed: {e}")))?;
    expect_ok(outcome.value, |detail| {
        if detail == "timeout" {
            Error::CanvasTimeout(CANVAS_POLL_TIMEOUT_MS)
        } else {
            Error::ChartEval(detail)
        }
    })?;

    let container = tab
        .find_element(&format!("#{CONTAINER_ID}"))
        .map_err(|e| Error::Screenshot(format!("#{CONTAINER_ID} not found: {e}")))?;
    container
        .capture_screenshot(Page::CaptureScreenshotFormatOption::Png)
        .map_err(|e| Error::Screenshot(format!("Capture failed: {e}")))
}

/// In-page scripts resolve to the string `"ok"` on success; anything else is
/// surfaced to the caller through `err`.
fn expect_ok<F>(value: Option<serde_json::Value>, err: F) -> Result<()>
where
    F: FnOnce(String) -> Error,
{
    match value {
        Some(serde_json::Value::String(s)) if s == "ok" => Ok(()),
        Some(serde_json::Value::String(s)) => Err(err(s)),
        other => Err(err(format!("unexpected script result: {other:?}"))),
    }
}

/// Minimal host document: zero margin, requested background, one container
/// element sized exactly to the requested CSS-pixel dimensions.
fn page_html(width: u32, height: u32, background_color: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
  <head><meta charset="UTF-8"/></head>
  <body style="margin:0;background:{background_color}">
    <div id="{CONTAINER_ID}" style="width:{width}px;height:{height}px;"></div>
  </body>
</html>"#
    )
}

fn page_data_url(html: &str) -> String {
    format!("data:text/html;base64,{}", BASE64.encode(html))
}

/// Build the chart in page context: canvas renderer, fixed locale, the
/// caller's option applied wholesale (`notMerge`) and immediately
/// (`lazyUpdate:false`), then an explicit resize to the container's layout
/// size. The instance is kept on a page global for debugging; page close
/// reclaims it.
fn chart_script(option_json: &str) -> String {
    format!(
        r#"(function() {{
  try {{
    var container = document.getElementById("{CONTAINER_ID}");
    var chart = echarts.init(container, null, {{ renderer: "canvas", locale: "ZH" }});
    chart.setOption({option_json}, {{ notMerge: true, lazyUpdate: false }});
    chart.resize();
    window.__chart__ = chart;
    return "ok";
  }} catch (e) {{
    return "error: " + String(e);
  }}
}})()"#
    )
}

/// Browser-scheduled poll for a canvas with non-zero dimensions inside the
/// container. Resolves `"ok"` or `"timeout"`, never rejects.
fn canvas_poll_script(timeout_ms: u64) -> String {
    format!(
        r##"new Promise(function(resolve) {{
  var deadline = Date.now() + {timeout_ms};
  (function poll() {{
    var canvas = document.querySelector("#{CONTAINER_ID} canvas");
    if (canvas && canvas.width > 0 && canvas.height > 0) return resolve("ok");
    if (Date.now() >= deadline) return resolve("timeout");
    setTimeout(poll, 16);
  }})();
}})"##
    )
}
