//! Browser session ownership
//!
//! One headless Chrome process serves every request. The handle is owned by a
//! dedicated worker thread; async tasks talk to it through a command channel,
//! so launch and liveness decisions are serialized and a burst of first
//! requests can never race two launches into existence.

use crate::{Error, Result};
use headless_chrome::browser::tab::Tab;
use headless_chrome::{Browser, LaunchOptions};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::mpsc::{self, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{info, warn};

/// How long the engine lets the browser sit idle before reaping it. A quiet
/// service should not lose its session between requests, so this is generous.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(3600);

enum Command {
    OpenTab(oneshot::Sender<Result<Arc<Tab>>>),
}

/// Launch parameters for the shared browser process.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Explicit browser executable; `None` uses the engine's discovery
    pub chrome_path: Option<PathBuf>,
    /// Idle window after which the engine reaps the browser; the worker
    /// relaunches on the next request
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            idle_timeout: IDLE_BROWSER_TIMEOUT,
        }
    }
}

/// Async-friendly handle to the session worker thread.
///
/// Cloning is cheap; all clones talk to the same worker and therefore the
/// same browser process.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: Sender<Command>,
}

impl SessionHandle {
    /// Spawn the worker thread that owns the browser handle. The browser
    /// itself is not launched until the first tab is requested.
    pub fn spawn(config: SessionConfig) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel::<Command>();

        thread::spawn(move || {
            let mut browser: Option<Browser> = None;

            while let Ok(cmd) = cmd_rx.recv() {
                match cmd {
                    Command::OpenTab(resp) => {
                        let _ = resp.send(open_tab(&mut browser, &config));
                    }
                }
            }
            // Channel closed: dropping the browser ends the child process.
        });

        Self { cmd_tx }
    }

    /// Open a fresh tab on the shared browser, launching or relaunching the
    /// browser first when necessary.
    pub async fn open_tab(&self) -> Result<Arc<Tab>> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(Command::OpenTab(tx))
            .map_err(|_| Error::Other("browser session worker is gone".into()))?;
        rx.await
            .map_err(|e| Error::Other(format!("OpenTab canceled: {e}")))?
    }
}

fn open_tab(browser: &mut Option<Browser>, config: &SessionConfig) -> Result<Arc<Tab>> {
    // A handle that stops answering a version query is dead; drop it so the
    // relaunch below replaces it instead of failing every later request.
    if let Some(handle) = browser {
        if let Err(e) = handle.get_version() {
            warn!("browser session unresponsive ({e}), relaunching");
            *browser = None;
        }
    }

    if browser.is_none() {
        let handle = launch(config)?;
        info!(
            "launched headless browser (executable: {})",
            config
                .chrome_path
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "engine default".into())
        );
        *browser = Some(handle);
    }

    let handle = browser.as_ref().ok_or_else(|| Error::Launch("no browser handle".into()))?;
    handle
        .new_tab()
        .map_err(|e| Error::PageOpen(format!("Failed to create tab: {e}")))
}

fn launch(config: &SessionConfig) -> Result<Browser> {
    let launch_options = LaunchOptions::default_builder()
        .headless(true)
        .path(config.chrome_path.clone())
        .idle_browser_timeout(config.idle_timeout)
        .args(vec![
            // Running unprivileged or containerized denies the OS sandbox the
            // privileges it needs.
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-setuid-sandbox"),
            OsStr::new("--hide-scrollbars"),
            OsStr::new("--disable-gpu"),
            OsStr::new("--disable-dev-shm-usage"),
        ])
        .build()
        .map_err(|e| Error::Launch(format!("Failed to build launch options: {e}")))?;

    Browser::new(launch_options).map_err(|e| Error::Launch(format!("Failed to launch browser: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[ignore] // Requires Chrome to be installed
    fn open_tab_reuses_one_browser() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let session = SessionHandle::spawn(SessionConfig::default());
            let first = session.open_tab().await.expect("first tab");
            let second = session.open_tab().await.expect("second tab");
            // Distinct tabs, same browser process.
            assert_ne!(
                first.get_target_id(),
                second.get_target_id(),
                "expected two distinct tabs"
            );
            let _ = first.close(true);
            let _ = second.close(true);
        });
    }

    #[test]
    fn launch_failure_is_reported_not_fatal() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let session = SessionHandle::spawn(SessionConfig {
                chrome_path: Some(PathBuf::from("/nonexistent/chrome-binary")),
                ..SessionConfig::default()
            });
            let err = session.open_tab().await.map(|_| ()).expect_err("launch should fail");
            assert!(matches!(err, Error::Launch(_)), "unexpected error: {err:?}");
            // The worker survives the failure and reports it again.
            let err = session.open_tab().await.map(|_| ()).expect_err("still failing");
            assert!(matches!(err, Error::Launch(_)));
        });
    }
}
