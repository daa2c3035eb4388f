//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use stream_resolver::browser::{BrowserLauncher, BrowserSession, FrameBox, RequestStream};
use stream_resolver::config::ClickPoint;
use stream_resolver::errors::{BrowserError, FetchError, ProcessError};
use stream_resolver::utils::{PageFetcher, ProcessOutput, ProcessRunner};

/// Page fetcher serving canned bodies by URL
#[derive(Default)]
pub struct StaticPages {
    pages: HashMap<String, String>,
    pub calls: AtomicUsize,
}

impl StaticPages {
    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }
}

#[async_trait]
impl PageFetcher for StaticPages {
    async fn fetch_text(&self, url: &str, _referer: Option<String>) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.pages.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

/// Process runner returning one canned result
pub struct CannedProcess {
    output: ProcessOutput,
    pub calls: AtomicUsize,
}

impl CannedProcess {
    pub fn succeeding(stdout: &str) -> Self {
        Self {
            output: ProcessOutput {
                status_code: Some(0),
                success: true,
                stdout: stdout.to_string(),
                stderr: String::new(),
            },
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(stderr: &str) -> Self {
        Self {
            output: ProcessOutput {
                status_code: Some(1),
                success: false,
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ProcessRunner for CannedProcess {
    async fn run(
        &self,
        _program: &str,
        _args: &[String],
        _timeout: Duration,
    ) -> Result<ProcessOutput, ProcessError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// How a fake player reacts once its page is loaded
#[derive(Clone)]
pub enum Player {
    /// Never requests anything
    Silent,
    /// Requests `stream_for(page)` after `delay`, once clicked
    OnClick { delay: Duration },
    /// Requests `stream_for(page)` while the page loads
    Autoplay,
    /// Page load hangs
    Hang,
}

/// Stream URL the fake player requests for `page_url`
pub fn stream_for(page_url: &str) -> String {
    let slug = page_url.rsplit('/').next().unwrap_or("page");
    format!("https://cdn.example.com/{slug}/master.m3u8?t={slug}")
}

#[derive(Default)]
pub struct SessionLedger {
    pub launches: AtomicUsize,
    pub closes: AtomicUsize,
    pub navigations: Mutex<Vec<String>>,
}

pub struct FakeBrowser {
    player: Player,
    pub ledger: Arc<SessionLedger>,
}

impl FakeBrowser {
    pub fn new(player: Player) -> Self {
        Self {
            player,
            ledger: Arc::new(SessionLedger::default()),
        }
    }

    pub fn launches(&self) -> usize {
        self.ledger.launches.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.ledger.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for FakeBrowser {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        self.ledger.launches.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = unbounded();
        Ok(Box::new(FakeSession {
            player: self.player.clone(),
            ledger: Arc::clone(&self.ledger),
            page: None,
            tx: Some(tx),
            rx: Some(rx),
        }))
    }
}

struct FakeSession {
    player: Player,
    ledger: Arc<SessionLedger>,
    page: Option<String>,
    tx: Option<UnboundedSender<String>>,
    rx: Option<UnboundedReceiver<String>>,
}

#[async_trait]
impl BrowserSession for FakeSession {
    async fn observe_requests(&mut self) -> Result<RequestStream, BrowserError> {
        self.rx
            .take()
            .map(|rx| rx.boxed())
            .ok_or_else(|| BrowserError::Protocol("already observed".to_string()))
    }

    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        self.ledger.navigations.lock().unwrap().push(url.to_string());
        self.page = Some(url.to_string());

        if let Some(tx) = &self.tx {
            let _ = tx.unbounded_send(format!("{url}/player.js"));
        }

        match self.player {
            Player::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Player::Autoplay => {
                if let Some(tx) = &self.tx {
                    let _ = tx.unbounded_send(stream_for(url));
                }
            }
            Player::Silent | Player::OnClick { .. } => {}
        }
        Ok(())
    }

    async fn find_frame(&mut self) -> Result<Option<FrameBox>, BrowserError> {
        Ok(None)
    }

    async fn click_at(&mut self, _point: ClickPoint) -> Result<(), BrowserError> {
        if let (Player::OnClick { delay }, Some(tx), Some(page)) =
            (&self.player, &self.tx, &self.page)
        {
            let tx = tx.clone();
            let delay = *delay;
            let page = page.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let _ = tx.unbounded_send(format!("{}/chunklist_b800.m3u8", page));
                let _ = tx.unbounded_send(stream_for(&page));
            });
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.ledger.closes.fetch_add(1, Ordering::SeqCst);
        self.tx = None;
    }
}
