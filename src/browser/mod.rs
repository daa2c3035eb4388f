//! Browser simulation
//!
//! The engine only talks to the [`BrowserLauncher`] / [`BrowserSession`]
//! capability surface. [`chromium`] provides the production implementation
//! on top of the Chrome DevTools Protocol; tests substitute scripted fakes.

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::config::ClickPoint;
use crate::errors::BrowserError;

pub mod chromium;
pub mod engine;
pub mod observer;

pub use chromium::ChromiumLauncher;
pub use engine::{BrowserSimulator, SimulationSettings, SimulationState};
pub use observer::StreamRequestPredicate;

/// URLs of outgoing requests made by the page, in the order they were issued
pub type RequestStream = BoxStream<'static, String>;

/// Layout box of an element in CSS pixels, relative to the top-level viewport
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl FrameBox {
    /// Absolute click position for `offset` inside this box. Offsets past
    /// the far edges are pulled back onto the last interior pixel; a box
    /// too small for that gets its centre.
    pub fn click_point(&self, offset: ClickPoint) -> ClickPoint {
        if self.width < 2.0 || self.height < 2.0 {
            return ClickPoint {
                x: self.x + self.width / 2.0,
                y: self.y + self.height / 2.0,
            };
        }

        ClickPoint {
            x: self.x + offset.x.clamp(0.0, self.width - 1.0),
            y: self.y + offset.y.clamp(0.0, self.height - 1.0),
        }
    }

    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Creates isolated browser sessions. Every call must yield a fresh
/// session that shares no cookies or storage with any other.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError>;
}

/// One disposable browser session with a single page
#[async_trait]
pub trait BrowserSession: Send {
    /// Subscribe to the page's outgoing requests. Must be called before
    /// [`navigate`](Self::navigate) so early requests are not missed.
    async fn observe_requests(&mut self) -> Result<RequestStream, BrowserError>;

    /// Load `url` and wait for the load event
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError>;

    /// Probe once for an embedded frame. `Ok(None)` when there is none yet.
    async fn find_frame(&mut self) -> Result<Option<FrameBox>, BrowserError>;

    /// Dispatch a synthetic pointer click at viewport coordinates
    async fn click_at(&mut self, point: ClickPoint) -> Result<(), BrowserError>;

    /// Tear the session down. Called exactly once by the engine.
    async fn close(&mut self);
}
