//! Headless browser sessions.
//!
//! A session is one browser process with one page. It owns the process: dropping
//! a session kills the browser and removes its profile directory, so a request
//! that fails or gets cancelled half way cannot leak a process.
//! [`BrowserSession::release`] is the graceful path and is what callers use when
//! they get the chance.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::error::CdpError;
use futures::StreamExt;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use url::Url;

use crate::data_models::RenderedPage;
use crate::error::ExtractionError;

/// How long `release` waits for the browser to exit before killing it.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Starts a fresh, isolated browser session per call.
pub trait SessionLauncher: Send + Sync + 'static {
    type Session: BrowserSession;

    fn launch(&self) -> impl Future<Output = Result<Self::Session, ExtractionError>> + Send;
}

/// A live browser with one page. Must release everything it holds when dropped.
pub trait BrowserSession: Send {
    /// Navigates to `url`, waits for the initial render and returns the DOM.
    fn render(
        &mut self,
        url: &Url,
    ) -> impl Future<Output = Result<RenderedPage, ExtractionError>> + Send;

    /// Shuts the browser down gracefully.
    fn release(self) -> impl Future<Output = ()> + Send
    where
        Self: Sized;
}

#[derive(Debug, Clone)]
pub struct BrowserSettings {
    /// Chrome/Chromium binary. Detected from the usual install locations when unset.
    pub chrome_executable: Option<PathBuf>,
    /// Upper bound for a single devtools request.
    pub request_timeout: Duration,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        BrowserSettings {
            chrome_executable: None,
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: BrowserSettings) -> ChromiumLauncher {
        ChromiumLauncher { settings }
    }

    fn browser_config(&self, profile: &TempDir) -> Result<BrowserConfig, ExtractionError> {
        let mut builder = BrowserConfig::builder()
            .user_data_dir(profile.path())
            .request_timeout(self.settings.request_timeout)
            .window_size(1366, 768)
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio");

        if let Some(path) = &self.settings.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(ExtractionError::Launch)
    }
}

impl SessionLauncher for ChromiumLauncher {
    type Session = ChromiumSession;

    async fn launch(&self) -> Result<ChromiumSession, ExtractionError> {
        let profile = tempfile::Builder::new()
            .prefix("bookfinder-chrome-")
            .tempdir()
            .map_err(|e| ExtractionError::Launch(format!("creating profile directory: {e}")))?;

        let config = self.browser_config(&profile)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ExtractionError::Launch(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    // Newer Chrome builds send messages chromiumoxide can't decode; those are harmless.
                    if is_connection_error(&e) {
                        log::warn!("browser connection lost: {e}");
                        break;
                    }
                    log::debug!("cdp handler error (continuing): {e}");
                }
            }
        });

        log::info!("launched browser, profile at {}", profile.path().display());

        let mut session = ChromiumSession {
            page: None,
            browser: Some(browser),
            handler,
            profile: Some(profile),
        };

        // From here on the session's Drop cleans up if opening the page fails.
        let page = session
            .browser
            .as_ref()
            .ok_or_else(|| ExtractionError::Launch("browser went away".to_string()))?
            .new_page("about:blank")
            .await
            .map_err(|e| ExtractionError::Launch(format!("opening page: {e}")))?;
        session.page = Some(page);

        Ok(session)
    }
}

fn is_connection_error(e: &CdpError) -> bool {
    let msg = e.to_string().to_lowercase();
    msg.contains("connection closed") || msg.contains("websocket") || msg.contains("io error")
}

pub struct ChromiumSession {
    page: Option<Page>,
    browser: Option<Browser>,
    handler: JoinHandle<()>,
    profile: Option<TempDir>,
}

impl BrowserSession for ChromiumSession {
    async fn render(&mut self, url: &Url) -> Result<RenderedPage, ExtractionError> {
        let nav_err = |reason: String| ExtractionError::Navigation {
            url: url.to_string(),
            reason,
        };

        let page = self
            .page
            .as_ref()
            .ok_or_else(|| nav_err("session has no open page".to_string()))?;

        log::debug!("navigating to {url}");
        // goto resolves once the navigation has finished loading.
        page.goto(url.as_str())
            .await
            .map_err(|e| nav_err(e.to_string()))?;

        let html = page.content().await.map_err(|e| nav_err(e.to_string()))?;
        let final_url = page
            .url()
            .await
            .map_err(|e| nav_err(e.to_string()))?
            .and_then(|u| Url::parse(&u).ok())
            .unwrap_or_else(|| url.clone());

        Ok(RenderedPage::new(final_url, html))
    }

    async fn release(mut self) {
        self.page.take();
        let Some(mut browser) = self.browser.take() else {
            return;
        };

        let graceful = timeout(CLOSE_GRACE, async {
            browser.close().await.map_err(|e| e.to_string())?;
            browser.wait().await.map_err(|e| e.to_string())
        })
        .await;

        match graceful {
            Ok(Ok(_)) => log::debug!("browser closed"),
            Ok(Err(e)) => {
                log::warn!("closing browser failed, killing it: {e}");
                kill(&mut browser).await;
            }
            Err(_) => {
                log::warn!("browser did not exit within {CLOSE_GRACE:?}, killing it");
                kill(&mut browser).await;
            }
        }
    }
}

async fn kill(browser: &mut Browser) {
    if let Some(Err(e)) = browser.kill().await {
        log::error!("failed to kill browser process: {e}");
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler.abort();
        let profile = self.profile.take();

        let Some(mut browser) = self.browser.take() else {
            return;
        };
        log::warn!("browser session dropped before release, killing browser");

        // Without a runtime the future is dropped unpolled and Browser's own Drop kills the child.
        let exited = async move { kill(&mut browser).await };
        if let Some(profile) = profile {
            remove_profile_after(exited, profile);
        }
    }
}

/// Deletes `profile` once `exited` resolves. Chrome's helpers keep writing
/// into the profile until the main process is gone.
fn remove_profile_after<F>(exited: F, profile: TempDir) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => Some(runtime.spawn(async move {
            exited.await;
            if let Err(e) = profile.close() {
                log::warn!("failed to remove browser profile: {e}");
            }
        })),
        Err(_) => {
            log::warn!("no runtime to wait for browser exit, removing profile now");
            drop(profile);
            None
        }
    }
}
