//! Browser simulation engine
//!
//! One invocation walks `Init -> Navigating -> Interacting -> Waiting ->
//! Closed`. The session is owned by a dedicated task so that teardown still
//! happens when the caller gives up on the result.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};
use strum::Display;
use tokio::sync::oneshot::error::TryRecvError;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span, debug, info};

use super::observer::{StreamRequestPredicate, spawn_observer};
use super::{BrowserLauncher, BrowserSession, FrameBox};
use crate::config::{BrowserConfig, ClickPoint};
use crate::errors::FailureReason;
use crate::models::{ResolutionRequest, StrategyOutcome};
use crate::strategies::{BROWSER_STRATEGY_ID, Strategy};
use crate::utils::url::UrlUtils;

const FRAME_POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SimulationState {
    Init,
    Navigating,
    Interacting,
    Waiting,
    Closed,
}

/// Timeouts, click targets and request predicate for one simulator
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    pub navigation_timeout: Duration,
    pub frame_probe_timeout: Duration,
    pub observation_timeout: Duration,
    pub budget: Duration,
    pub frame_click_offset: ClickPoint,
    pub body_click: ClickPoint,
    pub predicate: StreamRequestPredicate,
}

impl SimulationSettings {
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout,
            frame_probe_timeout: config.frame_probe_timeout,
            observation_timeout: config.observation_timeout,
            budget: config.budget,
            frame_click_offset: config.frame_click_offset,
            body_click: config.body_click,
            predicate: StreamRequestPredicate::from_config(config),
        }
    }
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}

/// Last-resort strategy: load the page in a real browser, poke the player
/// and wait for it to request a stream.
pub struct BrowserSimulator {
    launcher: Arc<dyn BrowserLauncher>,
    settings: Arc<SimulationSettings>,
}

impl BrowserSimulator {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, settings: SimulationSettings) -> Self {
        Self {
            launcher,
            settings: Arc::new(settings),
        }
    }

    /// Run one simulation against `page_url`.
    ///
    /// Dropping the returned future cancels the simulation; the session is
    /// still closed by the background task.
    pub async fn simulate(&self, page_url: &str) -> StrategyOutcome {
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let task = tokio::spawn(
            run_simulation(
                Arc::clone(&self.launcher),
                Arc::clone(&self.settings),
                page_url.to_string(),
                cancel,
            )
            .instrument(Span::current()),
        );

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => StrategyOutcome::Failed(FailureReason::critical(format!(
                "simulation task failed: {e}"
            ))),
        };

        guard.disarm();
        outcome
    }
}

#[async_trait]
impl Strategy for BrowserSimulator {
    fn id(&self) -> &str {
        BROWSER_STRATEGY_ID
    }

    fn budget(&self) -> Duration {
        self.settings.budget
    }

    async fn attempt(&self, request: &ResolutionRequest) -> StrategyOutcome {
        self.simulate(request.as_str()).await
    }
}

async fn run_simulation(
    launcher: Arc<dyn BrowserLauncher>,
    settings: Arc<SimulationSettings>,
    page_url: String,
    cancel: CancellationToken,
) -> StrategyOutcome {
    debug!(state = %SimulationState::Init, "Launching browser session");

    let mut session = match launcher.launch().await {
        Ok(session) => session,
        Err(e) => return StrategyOutcome::Failed(FailureReason::critical(e.to_string())),
    };

    let outcome = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            debug!("Simulation cancelled by caller");
            StrategyOutcome::Failed(FailureReason::critical("simulation cancelled"))
        }
        outcome = drive(session.as_mut(), &settings, &page_url) => outcome,
    };

    debug!(state = %SimulationState::Closed, "Closing browser session");
    session.close().await;
    outcome
}

async fn drive(
    session: &mut dyn BrowserSession,
    settings: &SimulationSettings,
    page_url: &str,
) -> StrategyOutcome {
    let requests = match session.observe_requests().await {
        Ok(requests) => requests,
        Err(e) => return StrategyOutcome::Failed(FailureReason::critical(e.to_string())),
    };
    let (_observer, mut observed) = spawn_observer(requests, settings.predicate.clone());

    debug!(state = %SimulationState::Navigating, "Loading page");
    match tokio::time::timeout(settings.navigation_timeout, session.navigate(page_url)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return StrategyOutcome::Failed(FailureReason::navigation(e.to_string())),
        Err(_) => {
            return StrategyOutcome::Failed(FailureReason::navigation(format!(
                "page did not finish loading within {}",
                humantime::format_duration(settings.navigation_timeout)
            )));
        }
    }

    match observed.try_recv() {
        Ok(observation) => {
            info!(
                url = %UrlUtils::redact_tokens(&observation.url),
                kind = %observation.kind,
                "Stream request observed while loading"
            );
            return StrategyOutcome::Success(observation.into());
        }
        Err(TryRecvError::Closed) => return observer_stopped(),
        Err(TryRecvError::Empty) => interact(session, settings).await,
    }

    debug!(state = %SimulationState::Waiting, "Waiting for stream request");
    let started = Instant::now();
    match tokio::time::timeout(settings.observation_timeout, observed).await {
        Ok(Ok(observation)) => {
            info!(
                url = %UrlUtils::redact_tokens(&observation.url),
                kind = %observation.kind,
                waited_ms = started.elapsed().as_millis() as u64,
                "Stream request observed"
            );
            StrategyOutcome::Success(observation.into())
        }
        Ok(Err(_)) => observer_stopped(),
        Err(_) => {
            debug!("No stream request before deadline");
            StrategyOutcome::Failed(FailureReason::ObservationTimeout {
                waited: settings.observation_timeout,
            })
        }
    }
}

/// Best-effort click on the player. Failures are logged and swallowed.
async fn interact(session: &mut dyn BrowserSession, settings: &SimulationSettings) {
    debug!(state = %SimulationState::Interacting, "Probing for player frame");

    let target = match probe_frame(session, settings.frame_probe_timeout).await {
        Some(frame) => {
            debug!(
                x = frame.x,
                y = frame.y,
                width = frame.width,
                height = frame.height,
                "Clicking inside player frame"
            );
            frame.click_point(settings.frame_click_offset)
        }
        None => {
            debug!("No player frame found, clicking the document");
            settings.body_click
        }
    };

    if let Err(e) = session.click_at(target).await {
        let reason = FailureReason::InteractionError {
            message: e.to_string(),
        };
        debug!(reason = reason.kind(), "{}", reason);
    }
}

async fn probe_frame(session: &mut dyn BrowserSession, timeout: Duration) -> Option<FrameBox> {
    let probe = async {
        loop {
            match session.find_frame().await {
                Ok(Some(frame)) if frame.is_visible() => return frame,
                Ok(_) => {}
                Err(e) => debug!("Frame probe failed: {}", e),
            }
            tokio::time::sleep(FRAME_POLL_INTERVAL).await;
        }
    };

    tokio::time::timeout(timeout, probe).await.ok()
}

fn observer_stopped() -> StrategyOutcome {
    StrategyOutcome::Failed(FailureReason::critical(
        "request observer stopped before a stream was seen",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::RequestStream;
    use crate::errors::BrowserError;
    use crate::models::{CandidateLink, LinkKind};
    use futures::StreamExt;
    use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone, Default)]
    struct Script {
        fail_launch: bool,
        navigate_delay: Duration,
        navigate_error: bool,
        on_navigate: Vec<String>,
        frame: Option<FrameBox>,
        click_error: bool,
        on_click: Vec<String>,
    }

    #[derive(Default)]
    struct Probe {
        launches: AtomicUsize,
        closes: AtomicUsize,
        clicks: Mutex<Vec<ClickPoint>>,
    }

    struct FakeSession {
        script: Script,
        probe: Arc<Probe>,
        tx: Option<UnboundedSender<String>>,
        rx: Option<UnboundedReceiver<String>>,
    }

    impl FakeSession {
        fn emit(&self, urls: &[String]) {
            if let Some(tx) = &self.tx {
                for url in urls {
                    let _ = tx.unbounded_send(url.clone());
                }
            }
        }
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn observe_requests(&mut self) -> Result<RequestStream, BrowserError> {
            self.rx
                .take()
                .map(|rx| rx.boxed())
                .ok_or_else(|| BrowserError::Protocol("already observed".to_string()))
        }

        async fn navigate(&mut self, _url: &str) -> Result<(), BrowserError> {
            tokio::time::sleep(self.script.navigate_delay).await;
            if self.script.navigate_error {
                return Err(BrowserError::Navigation("net::ERR_NAME_NOT_RESOLVED".to_string()));
            }
            self.emit(&self.script.on_navigate);
            Ok(())
        }

        async fn find_frame(&mut self) -> Result<Option<FrameBox>, BrowserError> {
            Ok(self.script.frame)
        }

        async fn click_at(&mut self, point: ClickPoint) -> Result<(), BrowserError> {
            self.probe.clicks.lock().unwrap().push(point);
            if self.script.click_error {
                return Err(BrowserError::Protocol("click dispatch failed".to_string()));
            }
            self.emit(&self.script.on_click);
            Ok(())
        }

        async fn close(&mut self) {
            self.probe.closes.fetch_add(1, Ordering::SeqCst);
            self.tx = None;
        }
    }

    struct FakeLauncher {
        script: Script,
        probe: Arc<Probe>,
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
            self.probe.launches.fetch_add(1, Ordering::SeqCst);
            if self.script.fail_launch {
                return Err(BrowserError::Launch("no chrome binary".to_string()));
            }
            let (tx, rx) = unbounded();
            Ok(Box::new(FakeSession {
                script: self.script.clone(),
                probe: Arc::clone(&self.probe),
                tx: Some(tx),
                rx: Some(rx),
            }))
        }
    }

    fn fast_settings() -> SimulationSettings {
        SimulationSettings {
            navigation_timeout: Duration::from_millis(500),
            frame_probe_timeout: Duration::from_millis(50),
            observation_timeout: Duration::from_millis(150),
            budget: Duration::from_secs(2),
            ..SimulationSettings::default()
        }
    }

    fn simulator(script: Script) -> (BrowserSimulator, Arc<Probe>) {
        let probe = Arc::new(Probe::default());
        let launcher = FakeLauncher {
            script,
            probe: Arc::clone(&probe),
        };
        (
            BrowserSimulator::new(Arc::new(launcher), fast_settings()),
            probe,
        )
    }

    const PAGE: &str = "https://example.com/watch/123";
    const MASTER: &str = "https://cdn.example.com/master.m3u8?t=xyz";

    #[tokio::test]
    async fn test_request_during_navigation_skips_interaction() {
        let (simulator, probe) = simulator(Script {
            on_navigate: vec![MASTER.to_string()],
            ..Script::default()
        });

        let outcome = simulator.simulate(PAGE).await;

        assert_eq!(
            outcome,
            StrategyOutcome::Success(CandidateLink {
                url: MASTER.to_string(),
                kind: LinkKind::Hls,
            })
        );
        assert!(probe.clicks.lock().unwrap().is_empty());
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_click_inside_frame_triggers_stream() {
        let (simulator, probe) = simulator(Script {
            frame: Some(FrameBox {
                x: 10.0,
                y: 20.0,
                width: 640.0,
                height: 360.0,
            }),
            on_click: vec![
                "https://cdn.example.com/hls/chunklist_b800.m3u8".to_string(),
                MASTER.to_string(),
            ],
            ..Script::default()
        });

        let outcome = simulator.simulate(PAGE).await;

        assert!(outcome.is_success());
        assert_eq!(
            probe.clicks.lock().unwrap().as_slice(),
            &[ClickPoint { x: 210.0, y: 170.0 }]
        );
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_frame_falls_back_to_body_click() {
        let (simulator, probe) = simulator(Script {
            on_click: vec!["https://cdn.example.com/movie.mp4".to_string()],
            ..Script::default()
        });

        let outcome = simulator.simulate(PAGE).await;

        assert_eq!(
            outcome,
            StrategyOutcome::Success(CandidateLink {
                url: "https://cdn.example.com/movie.mp4".to_string(),
                kind: LinkKind::Progressive,
            })
        );
        assert_eq!(
            probe.clicks.lock().unwrap().as_slice(),
            &[ClickPoint { x: 500.0, y: 500.0 }]
        );
    }

    #[tokio::test]
    async fn test_click_failure_is_not_fatal() {
        let (simulator, probe) = simulator(Script {
            click_error: true,
            ..Script::default()
        });

        let outcome = simulator.simulate(PAGE).await;

        assert!(matches!(
            outcome,
            StrategyOutcome::Failed(FailureReason::ObservationTimeout { .. })
        ));
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_error_closes_session() {
        let (simulator, probe) = simulator(Script {
            navigate_error: true,
            ..Script::default()
        });

        let outcome = simulator.simulate(PAGE).await;

        assert!(matches!(
            outcome,
            StrategyOutcome::Failed(FailureReason::NavigationError { .. })
        ));
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_navigation_timeout_is_navigation_error() {
        let (simulator, probe) = simulator(Script {
            navigate_delay: Duration::from_secs(5),
            ..Script::default()
        });

        let outcome = simulator.simulate(PAGE).await;

        assert!(matches!(
            outcome,
            StrategyOutcome::Failed(FailureReason::NavigationError { .. })
        ));
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_critical() {
        let (simulator, probe) = simulator(Script {
            fail_launch: true,
            ..Script::default()
        });

        let outcome = simulator.simulate(PAGE).await;

        assert!(matches!(
            outcome,
            StrategyOutcome::Failed(FailureReason::CriticalAutomationError { .. })
        ));
        assert_eq!(probe.launches.load(Ordering::SeqCst), 1);
        assert_eq!(probe.closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dropped_caller_still_closes_session() {
        let (simulator, probe) = simulator(Script {
            navigate_delay: Duration::from_secs(30),
            ..Script::default()
        });

        let abandoned =
            tokio::time::timeout(Duration::from_millis(50), simulator.simulate(PAGE)).await;
        assert!(abandoned.is_err());

        for _ in 0..100 {
            if probe.closes.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(probe.closes.load(Ordering::SeqCst), 1);
    }
}
