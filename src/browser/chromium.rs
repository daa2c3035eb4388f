//! Chromium-backed sessions over the DevTools protocol

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::network::EventRequestWillBeSent;
use chromiumoxide::layout::Point;
use chromiumoxide::Page;
use futures::StreamExt;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{BrowserLauncher, BrowserSession, FrameBox, RequestStream};
use crate::config::{BrowserConfig, ClickPoint};
use crate::errors::BrowserError;

const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);
const FRAME_SELECTOR: &str = "iframe";

/// Launches one fresh Chromium process per session, each with a throwaway
/// profile directory.
pub struct ChromiumLauncher {
    config: BrowserConfig,
    user_agent: String,
}

impl ChromiumLauncher {
    pub fn new(config: BrowserConfig, user_agent: String) -> Self {
        Self { config, user_agent }
    }

    /// Command-line switches for every launched browser.
    ///
    /// Site isolation is switched off so cross-origin player iframes render
    /// in the page's own process; their requests then surface on the page
    /// target the observer listens to.
    fn launch_args(&self) -> Vec<String> {
        let mut args = vec![format!("--user-agent={}", self.user_agent)];
        args.extend(
            [
                "--disable-features=IsolateOrigins,site-per-process",
                "--disable-site-isolation-trials",
                "--disable-blink-features=AutomationControlled",
                "--disable-dev-shm-usage",
                "--disable-gpu",
                "--disable-extensions",
                "--disable-background-networking",
                "--disable-sync",
                "--no-first-run",
                "--no-default-browser-check",
                "--mute-audio",
                "--autoplay-policy=no-user-gesture-required",
            ]
            .map(String::from),
        );
        args
    }

    fn cdp_config(&self, profile: &TempDir) -> Result<CdpBrowserConfig, BrowserError> {
        let mut builder = CdpBrowserConfig::builder()
            .user_data_dir(profile.path())
            .window_size(self.config.window_width, self.config.window_height)
            .request_timeout(self.config.navigation_timeout)
            .args(self.launch_args());

        if !self.config.headless {
            builder = builder.with_head();
        }
        if self.config.no_sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(executable) = &self.config.executable {
            builder = builder.chrome_executable(executable);
        }

        builder.build().map_err(BrowserError::Launch)
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        let profile = tempfile::Builder::new()
            .prefix("stream-resolver-")
            .tempdir()
            .map_err(|e| BrowserError::Launch(format!("failed to create profile dir: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(self.cdp_config(&profile)?)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("DevTools handler error: {}", e);
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                let _ = browser.close().await;
                let _ = browser.wait().await;
                handler_task.abort();
                return Err(BrowserError::Launch(format!("failed to open page: {e}")));
            }
        };

        debug!("Launched browser with profile {}", profile.path().display());

        Ok(Box::new(ChromiumSession {
            browser,
            page,
            handler_task,
            profile: Some(profile),
            closed: false,
        }))
    }
}

pub struct ChromiumSession {
    browser: Browser,
    page: Page,
    handler_task: JoinHandle<()>,
    profile: Option<TempDir>,
    closed: bool,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn observe_requests(&mut self) -> Result<RequestStream, BrowserError> {
        let events = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        Ok(events.map(|event| event.request.url.clone()).boxed())
    }

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.page
            .goto(url)
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Navigation(e.to_string()))
    }

    async fn find_frame(&mut self) -> Result<Option<FrameBox>, BrowserError> {
        let element = match self.page.find_element(FRAME_SELECTOR).await {
            Ok(element) => element,
            Err(_) => return Ok(None),
        };

        let bounds = element
            .bounding_box()
            .await
            .map_err(|e| BrowserError::Protocol(e.to_string()))?;

        Ok(Some(FrameBox {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
        }))
    }

    async fn click_at(&mut self, point: ClickPoint) -> Result<(), BrowserError> {
        self.page
            .click(Point {
                x: point.x,
                y: point.y,
            })
            .await
            .map(|_| ())
            .map_err(|e| BrowserError::Protocol(e.to_string()))
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        if tokio::time::timeout(CLOSE_TIMEOUT, self.browser.close())
            .await
            .is_err()
        {
            warn!("Browser did not close within {:?}, killing it", CLOSE_TIMEOUT);
            let _ = self.browser.kill().await;
        }
        let _ = tokio::time::timeout(CLOSE_TIMEOUT, self.browser.wait()).await;
        self.handler_task.abort();

        if let Some(profile) = self.profile.take()
            && let Err(e) = profile.close()
        {
            debug!("Failed to remove browser profile: {}", e);
        }
    }
}

impl Drop for ChromiumSession {
    fn drop(&mut self) {
        if !self.closed {
            self.handler_task.abort();
        }
    }
}
