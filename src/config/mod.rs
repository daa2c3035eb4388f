use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod defaults;
pub mod duration_serde;

use defaults::*;

use crate::errors::{AppError, AppResult};

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "STREAM_RESOLVER_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    /// Declarative extraction rules, evaluated in declaration order
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Browser-identifying header set and timeouts for page fetches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_accept_language")]
    pub accept_language: String,
    /// Per-fetch timeout, applied to every hop
    #[serde(default = "default_fetch_timeout", with = "duration_serde::duration")]
    pub fetch_timeout: Duration,
    /// Total budget for one pattern strategy (all hops)
    #[serde(default = "default_pattern_budget", with = "duration_serde::duration")]
    pub pattern_budget: Duration,
}

/// Out-of-process metadata extractor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Command to execute. Can be a full path or a name looked up on $PATH
    #[serde(default = "default_resolver_command")]
    pub command: String,
    /// Format selector, preferring the best combined audio/video format
    #[serde(default = "default_resolver_format")]
    pub format: String,
    #[serde(default = "default_socket_timeout", with = "duration_serde::duration")]
    pub socket_timeout: Duration,
    #[serde(default = "default_process_timeout", with = "duration_serde::duration")]
    pub process_timeout: Duration,
    #[serde(default = "default_resolver_budget", with = "duration_serde::duration")]
    pub budget: Duration,
}

/// Point in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClickPoint {
    pub x: f64,
    pub y: f64,
}

/// Browser simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Chrome/Chromium executable. Auto-detected when unset
    #[serde(default)]
    pub executable: Option<String>,
    #[serde(default = "default_true")]
    pub headless: bool,
    /// Pass --no-sandbox to Chromium (needed when running as root in containers)
    #[serde(default)]
    pub no_sandbox: bool,
    #[serde(default = "default_window_width")]
    pub window_width: u32,
    #[serde(default = "default_window_height")]
    pub window_height: u32,
    #[serde(default = "default_navigation_timeout", with = "duration_serde::duration")]
    pub navigation_timeout: Duration,
    #[serde(default = "default_frame_probe_timeout", with = "duration_serde::duration")]
    pub frame_probe_timeout: Duration,
    #[serde(default = "default_observation_timeout", with = "duration_serde::duration")]
    pub observation_timeout: Duration,
    #[serde(default = "default_browser_budget", with = "duration_serde::duration")]
    pub budget: Duration,
    /// Click position inside a discovered player frame, relative to its top-left corner
    #[serde(default = "default_frame_click_offset")]
    pub frame_click_offset: ClickPoint,
    /// Fallback click position on the top-level document
    #[serde(default = "default_body_click")]
    pub body_click: ClickPoint,
    #[serde(default = "default_manifest_markers")]
    pub manifest_markers: Vec<String>,
    #[serde(default = "default_progressive_markers")]
    pub progressive_markers: Vec<String>,
    /// Requests containing any of these are never reported (HLS sub-playlists)
    #[serde(default = "default_excluded_markers")]
    pub excluded_markers: Vec<String>,
}

/// One entry of the extraction rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    pub domains: Vec<DomainMatch>,
    pub patterns: Vec<String>,
    /// Patterns locating an intermediate page to fetch before `patterns` apply
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hop_patterns: Vec<String>,
}

/// Domain predicate for a rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DomainMatch {
    /// Host equals the value or is a subdomain of it
    Host(String),
    /// Page URL contains the value anywhere
    Contains(String),
}

fn default_true() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_accept_language() -> String {
    DEFAULT_ACCEPT_LANGUAGE.to_string()
}

fn default_fetch_timeout() -> Duration {
    DEFAULT_FETCH_TIMEOUT
}

fn default_pattern_budget() -> Duration {
    DEFAULT_PATTERN_BUDGET
}

fn default_resolver_command() -> String {
    DEFAULT_RESOLVER_COMMAND.to_string()
}

fn default_resolver_format() -> String {
    DEFAULT_RESOLVER_FORMAT.to_string()
}

fn default_socket_timeout() -> Duration {
    DEFAULT_SOCKET_TIMEOUT
}

fn default_process_timeout() -> Duration {
    DEFAULT_PROCESS_TIMEOUT
}

fn default_resolver_budget() -> Duration {
    DEFAULT_RESOLVER_BUDGET
}

fn default_window_width() -> u32 {
    DEFAULT_WINDOW_SIZE.0
}

fn default_window_height() -> u32 {
    DEFAULT_WINDOW_SIZE.1
}

fn default_navigation_timeout() -> Duration {
    DEFAULT_NAVIGATION_TIMEOUT
}

fn default_frame_probe_timeout() -> Duration {
    DEFAULT_FRAME_PROBE_TIMEOUT
}

fn default_observation_timeout() -> Duration {
    DEFAULT_OBSERVATION_TIMEOUT
}

fn default_browser_budget() -> Duration {
    DEFAULT_BROWSER_BUDGET
}

fn default_frame_click_offset() -> ClickPoint {
    ClickPoint {
        x: DEFAULT_FRAME_CLICK_OFFSET.0,
        y: DEFAULT_FRAME_CLICK_OFFSET.1,
    }
}

fn default_body_click() -> ClickPoint {
    ClickPoint {
        x: DEFAULT_BODY_CLICK.0,
        y: DEFAULT_BODY_CLICK.1,
    }
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn default_manifest_markers() -> Vec<String> {
    to_strings(DEFAULT_MANIFEST_MARKERS)
}

fn default_progressive_markers() -> Vec<String> {
    to_strings(DEFAULT_PROGRESSIVE_MARKERS)
}

fn default_excluded_markers() -> Vec<String> {
    to_strings(DEFAULT_EXCLUDED_MARKERS)
}

fn default_rules() -> Vec<RuleConfig> {
    vec![RuleConfig {
        name: GOSTREAM_RULE_NAME.to_string(),
        domains: vec![DomainMatch::Contains(GOSTREAM_DOMAIN_MARKER.to_string())],
        patterns: vec![GOSTREAM_PATTERN.to_string()],
        hop_patterns: Vec::new(),
    }]
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            accept_language: default_accept_language(),
            fetch_timeout: default_fetch_timeout(),
            pattern_budget: default_pattern_budget(),
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            command: default_resolver_command(),
            format: default_resolver_format(),
            socket_timeout: default_socket_timeout(),
            process_timeout: default_process_timeout(),
            budget: default_resolver_budget(),
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            executable: None,
            headless: true,
            no_sandbox: false,
            window_width: default_window_width(),
            window_height: default_window_height(),
            navigation_timeout: default_navigation_timeout(),
            frame_probe_timeout: default_frame_probe_timeout(),
            observation_timeout: default_observation_timeout(),
            budget: default_browser_budget(),
            frame_click_offset: default_frame_click_offset(),
            body_click: default_body_click(),
            manifest_markers: default_manifest_markers(),
            progressive_markers: default_progressive_markers(),
            excluded_markers: default_excluded_markers(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            web: WebConfig::default(),
            http: HttpConfig::default(),
            resolver: ResolverConfig::default(),
            browser: BrowserConfig::default(),
            rules: default_rules(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment.
    ///
    /// Precedence (lowest to highest): built-in defaults, the TOML file,
    /// `STREAM_RESOLVER_*` variables (nested keys separated by `__`), `PORT`.
    pub fn load(config_file: Option<&Path>) -> AppResult<Self> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));

        if let Some(path) = config_file {
            if path.exists() {
                info!("Loading configuration from {}", path.display());
                figment = figment.merge(Toml::file(path));
            } else {
                info!(
                    "Configuration file {} not found, using defaults",
                    path.display()
                );
            }
        }

        let figment = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Env::raw().only(&["PORT"]).map(|_| "web.port".into()));

        Self::extract(figment)
    }

    /// Parse configuration from a TOML string layered over the defaults
    pub fn from_toml_str(contents: &str) -> AppResult<Self> {
        let figment =
            Figment::from(Serialized::defaults(Config::default())).merge(Toml::string(contents));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> AppResult<Self> {
        let config: Config = figment
            .extract()
            .map_err(|e| AppError::configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every timeout against its allowed range and every rule for shape.
    /// Regex compilation is checked when the rule table is built.
    pub fn validate(&self) -> AppResult<()> {
        check_range("http.fetch_timeout", self.http.fetch_timeout, None, MAX_FETCH_TIMEOUT)?;
        check_range(
            "resolver.socket_timeout",
            self.resolver.socket_timeout,
            None,
            MAX_SOCKET_TIMEOUT,
        )?;
        check_range(
            "resolver.process_timeout",
            self.resolver.process_timeout,
            None,
            MAX_PROCESS_TIMEOUT,
        )?;
        check_range(
            "browser.navigation_timeout",
            self.browser.navigation_timeout,
            None,
            MAX_NAVIGATION_TIMEOUT,
        )?;
        check_range(
            "browser.frame_probe_timeout",
            self.browser.frame_probe_timeout,
            Some(MIN_FRAME_PROBE_TIMEOUT),
            MAX_FRAME_PROBE_TIMEOUT,
        )?;
        check_range(
            "browser.observation_timeout",
            self.browser.observation_timeout,
            Some(MIN_OBSERVATION_TIMEOUT),
            MAX_OBSERVATION_TIMEOUT,
        )?;

        if self.resolver.command.trim().is_empty() {
            return Err(AppError::configuration("resolver.command must not be empty"));
        }

        if self.browser.manifest_markers.is_empty() && self.browser.progressive_markers.is_empty() {
            return Err(AppError::configuration(
                "browser needs at least one manifest or progressive marker",
            ));
        }

        let mut seen = std::collections::HashSet::new();
        for rule in &self.rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(AppError::configuration(format!(
                    "duplicate rule name '{}'",
                    rule.name
                )));
            }
            if rule.domains.is_empty() {
                return Err(AppError::configuration(format!(
                    "rule '{}' declares no domains",
                    rule.name
                )));
            }
            if rule.patterns.is_empty() {
                return Err(AppError::configuration(format!(
                    "rule '{}' declares no patterns",
                    rule.name
                )));
            }
        }

        Ok(())
    }
}

fn check_range(
    field: &str,
    value: Duration,
    min: Option<Duration>,
    max: Duration,
) -> AppResult<()> {
    let min = min.unwrap_or(Duration::from_millis(1));
    if value < min || value > max {
        return Err(AppError::configuration(format!(
            "{field} must be between {} and {}, got {}",
            humantime::format_duration(min),
            humantime::format_duration(max),
            humantime::format_duration(value)
        )));
    }
    Ok(())
}
