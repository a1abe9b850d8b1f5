//! HTTP listener: one route, `POST /render`
//!
//! The handler validates the request, borrows an admission permit, asks the
//! session worker for a tab and runs the blocking render pipeline on the
//! blocking pool. Success returns raw PNG bytes; every failure becomes a JSON
//! error with the stringified cause.

use crate::config::ServiceConfig;
use crate::render::{self, RenderJob};
use crate::session::{SessionConfig, SessionHandle};
use crate::{Error, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{error, info};

/// Request body ceiling; larger bodies are rejected before the handler runs.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Default container width in CSS pixels
pub const DEFAULT_WIDTH: u32 = 1000;
/// Default container height in CSS pixels
pub const DEFAULT_HEIGHT: u32 = 380;
/// Default page background
pub const DEFAULT_BACKGROUND: &str = "#FFFFFF";

/// Wire shape of `POST /render`.
#[derive(Debug, Deserialize)]
pub struct RenderRequest {
    /// ECharts option; the one required field
    pub option: Option<serde_json::Value>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    #[serde(rename = "backgroundColor")]
    pub background_color: Option<String>,
}

/// Shared service state: the session handle, the charting bundle read once at
/// startup, and the admission-control permits.
#[derive(Clone)]
pub struct AppState {
    session: SessionHandle,
    bundle: Arc<String>,
    render_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(session: SessionHandle, bundle: String, max_concurrent_renders: usize) -> Self {
        Self {
            session,
            bundle: Arc::new(bundle),
            render_permits: Arc::new(Semaphore::new(max_concurrent_renders.max(1))),
        }
    }

    /// Resolve the charting bundle from disk and spawn the session worker.
    pub fn from_config(config: &ServiceConfig) -> Result<Self> {
        let bundle = std::fs::read_to_string(&config.echarts_path).map_err(|e| {
            Error::Config(format!(
                "cannot read charting bundle {}: {e}",
                config.echarts_path.display()
            ))
        })?;
        let session = SessionHandle::spawn(SessionConfig {
            chrome_path: config.chrome_path.clone(),
            ..SessionConfig::default()
        });
        Ok(Self::new(session, bundle, config.max_concurrent_renders))
    }
}

/// Build the service router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/render", post(render_chart))
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

impl TryFrom<RenderRequest> for RenderJob {
    type Error = Error;

    /// Apply the documented defaults; a missing `option` fails fast before
    /// any browser interaction.
    fn try_from(request: RenderRequest) -> Result<Self> {
        Ok(Self {
            option: request.option.ok_or(Error::MissingOption)?,
            width: request.width.unwrap_or(DEFAULT_WIDTH),
            height: request.height.unwrap_or(DEFAULT_HEIGHT),
            background_color: request
                .background_color
                .unwrap_or_else(|| DEFAULT_BACKGROUND.to_string()),
        })
    }
}

async fn render_chart(State(state): State<AppState>, Json(request): Json<RenderRequest>) -> Response {
    let started = Instant::now();
    let job = match RenderJob::try_from(request) {
        Ok(job) => job,
        Err(err) => {
            error!("render failed in {}ms: {err}", started.elapsed().as_millis());
            return err.into_response();
        }
    };
    let (width, height) = (job.width, job.height);

    match handle(state, job).await {
        Ok(png) => {
            info!(
                "render ok {width}x{height} {}B in {}ms",
                png.len(),
                started.elapsed().as_millis()
            );
            ([(header::CONTENT_TYPE, "image/png")], png).into_response()
        }
        Err(err) => {
            error!("render failed in {}ms: {err}", started.elapsed().as_millis());
            err.into_response()
        }
    }
}

async fn handle(state: AppState, job: RenderJob) -> Result<Vec<u8>> {
    let _permit = state
        .render_permits
        .acquire()
        .await
        .map_err(|e| Error::Other(format!("admission queue closed: {e}")))?;

    let tab = state.session.open_tab().await?;
    let bundle = Arc::clone(&state.bundle);
    tokio::task::spawn_blocking(move || render::render(tab, &job, &bundle))
        .await
        .map_err(|e| Error::Other(format!("render task failed: {e}")))?
}
