/// Configuration default values
///
/// This module contains all the default values for configuration options,
/// making them easily changeable in one central location.
use std::time::Duration;

// Web server defaults
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

// Page fetch defaults
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_ACCEPT: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_FETCH_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PATTERN_BUDGET: Duration = Duration::from_secs(25);

// External resolver defaults
pub const DEFAULT_RESOLVER_COMMAND: &str = "yt-dlp";
pub const DEFAULT_RESOLVER_FORMAT: &str = "best";
pub const DEFAULT_SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
pub const MAX_SOCKET_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_PROCESS_TIMEOUT: Duration = Duration::from_secs(20);
pub const MAX_PROCESS_TIMEOUT: Duration = Duration::from_secs(20);
pub const DEFAULT_RESOLVER_BUDGET: Duration = Duration::from_secs(25);

// Browser simulation defaults
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const MAX_NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_FRAME_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
pub const MIN_FRAME_PROBE_TIMEOUT: Duration = Duration::from_secs(2);
pub const MAX_FRAME_PROBE_TIMEOUT: Duration = Duration::from_secs(7);
pub const DEFAULT_OBSERVATION_TIMEOUT: Duration = Duration::from_secs(10);
pub const MIN_OBSERVATION_TIMEOUT: Duration = Duration::from_secs(4);
pub const MAX_OBSERVATION_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_BROWSER_BUDGET: Duration = Duration::from_secs(75);
pub const DEFAULT_BODY_CLICK: (f64, f64) = (500.0, 500.0);
pub const DEFAULT_FRAME_CLICK_OFFSET: (f64, f64) = (200.0, 150.0);
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (1280, 720);
pub const DEFAULT_MANIFEST_MARKERS: &[&str] = &[".m3u8"];
pub const DEFAULT_PROGRESSIVE_MARKERS: &[&str] = &[".mp4", ".webm", ".mkv", ".mov", ".m4v"];
pub const DEFAULT_EXCLUDED_MARKERS: &[&str] = &["chunklist"];

// Built-in extraction rule
pub const GOSTREAM_RULE_NAME: &str = "gostream";
pub const GOSTREAM_DOMAIN_MARKER: &str = "gostream";
pub const GOSTREAM_PATTERN: &str =
    r#"(https?:\\?/\\?/hls\d*\.[A-Za-z0-9.-]+\\?/[^"'\s<>]*?master\.m3u8\?t=[^"'\s<>\\]+)"#;
