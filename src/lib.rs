//! ECharts render service
//!
//! A small HTTP service that turns an [Apache ECharts](https://echarts.apache.org)
//! option into a PNG. Chart layout and rasterization are delegated entirely to
//! the ECharts browser bundle running inside one long-lived headless Chrome
//! instance; this crate only manages the browser session, validates requests
//! and marshals between HTTP JSON and in-page JavaScript.
//!
//! # Example
//!
//! ```no_run
//! use echarts_renderd::config::ServiceConfig;
//! use echarts_renderd::server::{app, AppState};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ServiceConfig::from_env();
//! let state = AppState::from_config(&config)?;
//! let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
//! axum::serve(listener, app(state)).await?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub use error::{Error, Result};

// Environment-derived service configuration
pub mod config;

// Single shared browser session, owned by a worker thread
pub mod session;

// Per-request page pipeline: inject bundle, build chart, wait, screenshot
pub mod render;

// HTTP surface (`POST /render`)
pub mod server;
