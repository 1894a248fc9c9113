//! Runner configuration.
//!
//! Every wait, dwell and bound used by the workflow lives here so that runs can
//! be tuned from a YAML file without touching code. Durations are stored in
//! milliseconds to keep the file format flat.

use crate::engine::WindowRect;
use crate::errors::AutomationError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_DASHBOARD_URL: &str = "https://rewards.microsoft.com/";
pub const DEFAULT_ACCOUNT_URL: &str = "https://account.microsoft.com/account/";
pub const DEFAULT_SEARCH_URL: &str = "https://www.bing.com/";
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Inclusive range a randomized wait is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DurationRange {
    pub min_ms: u64,
    pub max_ms: u64,
}

impl DurationRange {
    pub const fn new(min_ms: u64, max_ms: u64) -> Self {
        Self { min_ms, max_ms }
    }

    pub const fn fixed(ms: u64) -> Self {
        Self::new(ms, ms)
    }

    pub fn lower(&self) -> Duration {
        Duration::from_millis(self.min_ms.min(self.max_ms))
    }

    pub fn upper(&self) -> Duration {
        Duration::from_millis(self.min_ms.max(self.max_ms))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BrowserKind {
    #[default]
    Edge,
    Chrome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub kind: BrowserKind,
    /// Base URL of a running WebDriver server
    pub webdriver_url: String,
    /// Driver executable to spawn; when unset an already running server is expected
    pub driver_binary: Option<PathBuf>,
    /// Persistent profile directory holding the login cookies
    pub profile_dir: PathBuf,
    pub headless: bool,
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            kind: BrowserKind::Edge,
            webdriver_url: DEFAULT_WEBDRIVER_URL.to_string(),
            driver_binary: None,
            profile_dir: default_profile_dir(),
            headless: false,
            extra_args: Vec::new(),
        }
    }
}

fn default_profile_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".questrunner_profile")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Wait after navigating back to the dashboard inside the retry loop
    pub settle_ms: u64,
    /// Wait after a first navigation to a page
    pub initial_settle_ms: u64,
    pub overlay_query_ms: u64,
    pub overlay_settle_ms: u64,
    pub container_ms: u64,
    pub cards_ms: u64,
    pub clickable_ms: u64,
    pub scroll_settle_ms: u64,
    /// How long to watch for a window spawned by a click
    pub new_window_ms: u64,
    pub window_settle_ms: u64,
    /// Dwell after a click that stayed in the same window
    pub in_page_dwell: DurationRange,
    pub retry_backoff_ms: u64,
    pub poll_interval_ms: u64,
    pub points_query_ms: u64,
    pub manual_login_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            settle_ms: 7_000,
            initial_settle_ms: 5_000,
            overlay_query_ms: 2_000,
            overlay_settle_ms: 1_000,
            container_ms: 15_000,
            cards_ms: 10_000,
            clickable_ms: 10_000,
            scroll_settle_ms: 1_000,
            new_window_ms: 2_000,
            window_settle_ms: 3_000,
            in_page_dwell: DurationRange::new(10_000, 15_000),
            retry_backoff_ms: 2_000,
            poll_interval_ms: 250,
            points_query_ms: 10_000,
            manual_login_secs: 300,
        }
    }
}

impl TimingConfig {
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
    pub fn initial_settle(&self) -> Duration {
        Duration::from_millis(self.initial_settle_ms)
    }
    pub fn overlay_query(&self) -> Duration {
        Duration::from_millis(self.overlay_query_ms)
    }
    pub fn overlay_settle(&self) -> Duration {
        Duration::from_millis(self.overlay_settle_ms)
    }
    pub fn container(&self) -> Duration {
        Duration::from_millis(self.container_ms)
    }
    pub fn cards(&self) -> Duration {
        Duration::from_millis(self.cards_ms)
    }
    pub fn clickable(&self) -> Duration {
        Duration::from_millis(self.clickable_ms)
    }
    pub fn scroll_settle(&self) -> Duration {
        Duration::from_millis(self.scroll_settle_ms)
    }
    pub fn new_window(&self) -> Duration {
        Duration::from_millis(self.new_window_ms)
    }
    pub fn window_settle(&self) -> Duration {
        Duration::from_millis(self.window_settle_ms)
    }
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
    pub fn points_query(&self) -> Duration {
        Duration::from_millis(self.points_query_ms)
    }
    pub fn manual_login(&self) -> Duration {
        Duration::from_secs(self.manual_login_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub max_attempts: u32,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self { max_attempts: 3 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngageConfig {
    /// Upper bound on how many interactive elements get clicked
    pub sample_size: usize,
    pub page_load_ms: u64,
    pub initial_wait: DurationRange,
    pub click_timeout_ms: u64,
    pub scroll_pause_ms: u64,
    pub post_click: DurationRange,
    /// Time on page after the clicks, whatever happened
    pub dwell: DurationRange,
}

impl Default for EngageConfig {
    fn default() -> Self {
        Self {
            sample_size: 5,
            page_load_ms: 15_000,
            initial_wait: DurationRange::new(3_000, 6_000),
            click_timeout_ms: 3_000,
            scroll_pause_ms: 500,
            post_click: DurationRange::new(2_000, 4_000),
            dwell: DurationRange::new(5_000, 10_000),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub desktop_count: usize,
    pub mobile_count: usize,
    pub terms: Vec<String>,
    pub mobile_user_agent: String,
    pub mobile_rect: WindowRect,
    pub desktop_rect: WindowRect,
    pub page_load_ms: u64,
    pub box_query_ms: u64,
    pub refind_query_ms: u64,
    pub fallback_query_ms: u64,
    pub typing_pause_ms: u64,
    pub delay: DurationRange,
    pub scroll_pause: DurationRange,
    pub scroll_back_pause: DurationRange,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            desktop_count: 35,
            mobile_count: 25,
            terms: DEFAULT_SEARCH_TERMS.iter().map(|t| t.to_string()).collect(),
            mobile_user_agent: "Mozilla/5.0 (Linux; Android 10; SM-G975F) AppleWebKit/537.36 \
                (KHTML, like Gecko) Chrome/83.0.4103.106 Mobile Safari/537.36 EdgA/45.05.4.5058"
                .to_string(),
            mobile_rect: WindowRect {
                width: 375,
                height: 812,
            },
            desktop_rect: WindowRect {
                width: 1920,
                height: 1080,
            },
            page_load_ms: 5_000,
            box_query_ms: 15_000,
            refind_query_ms: 10_000,
            fallback_query_ms: 5_000,
            typing_pause_ms: 500,
            delay: DurationRange::new(7_000, 12_000),
            scroll_pause: DurationRange::new(1_000, 3_000),
            scroll_back_pause: DurationRange::new(500, 1_500),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub dashboard_url: String,
    pub account_url: String,
    pub search_url: String,
    pub browser: BrowserConfig,
    pub timing: TimingConfig,
    pub executor: ExecutorConfig,
    pub engage: EngageConfig,
    pub search: SearchConfig,
    /// Seed for every random choice of a run; unset means OS entropy
    pub seed: Option<u64>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
            account_url: DEFAULT_ACCOUNT_URL.to_string(),
            search_url: DEFAULT_SEARCH_URL.to_string(),
            browser: BrowserConfig::default(),
            timing: TimingConfig::default(),
            executor: ExecutorConfig::default(),
            engage: EngageConfig::default(),
            search: SearchConfig::default(),
            seed: None,
        }
    }
}

impl RunnerConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, AutomationError> {
        serde_yaml::from_str(yaml)
            .map_err(|e| AutomationError::InvalidArgument(format!("Invalid config: {e}")))
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, AutomationError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::InvalidArgument(format!(
                "Failed to read config {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml_str(&content)
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        if self.executor.max_attempts == 0 {
            return Err(AutomationError::InvalidArgument(
                "executor.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.dashboard_url.trim().is_empty() {
            return Err(AutomationError::InvalidArgument(
                "dashboard_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

const DEFAULT_SEARCH_TERMS: &[&str] = &[
    "weather forecast today",
    "latest news headlines",
    "easy recipe ideas",
    "popular movies to stream",
    "best coffee shops near me",
    "local events this weekend",
    "tech news today",
    "S&P 500 index",
    "cheap vacation destinations",
    "beginner fitness workout",
    "top book recommendations",
    "DIY home improvement projects",
    "simple garden ideas",
    "attractions in London",
    "new music releases",
    "NBA scores",
    "dog grooming tips",
    "basic car maintenance checks",
    "remote job opportunities",
    "free online courses",
    "ancient history facts",
    "recent science discoveries",
    "famous art exhibitions",
    "landscape photography tips",
    "healthy eating advice",
    "current fashion trends",
    "video game reviews",
    "global environmental issues",
    "learn a new language",
    "stock market analysis",
    "famous historical figures",
    "types of clouds",
    "world capital cities",
    "different dog breeds",
    "famous mountains",
    "major rivers of the world",
    "constellations in the night sky",
    "history of the internet",
    "how electricity works",
    "world largest deserts",
    "best coding languages",
    "cybersecurity tips",
    "history of space travel",
    "famous bridges",
    "highest waterfalls",
    "periodic table elements",
    "renaissance art",
    "classical music composers",
    "modern architecture",
    "artificial intelligence explained",
    "renewable energy sources",
    "ocean currents",
    "insect identification",
    "dinosaur names",
    "famous philosophers",
    "types of poetry",
    "painting techniques",
    "healthy breakfast ideas",
    "meditation benefits",
    "marathon training plan",
    "swimming techniques",
    "tennis grand slams",
    "famous explorers",
    "ancient civilizations",
    "board game strategy",
    "famous equations",
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_are_valid() {
        let config = RunnerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.executor.max_attempts, 3);
        assert_eq!(config.engage.sample_size, 5);
        assert_eq!(config.timing.manual_login(), Duration::from_secs(300));
        assert!(config.search.terms.len() >= config.search.desktop_count);
    }

    #[test]
    fn test_default_profile_lives_in_home() {
        let profile = RunnerConfig::default().browser.profile_dir;
        assert!(profile.ends_with(".questrunner_profile"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(profile, home.join(".questrunner_profile"));
        }
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
dashboard_url: "http://localhost:8080/"
executor:
  max_attempts: 5
engage:
  sample_size: 2
  dwell: { min_ms: 10, max_ms: 20 }
browser:
  kind: chrome
seed: 42
"#;
        let config = RunnerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.dashboard_url, "http://localhost:8080/");
        assert_eq!(config.executor.max_attempts, 5);
        assert_eq!(config.engage.sample_size, 2);
        assert_eq!(config.engage.dwell, DurationRange::new(10, 20));
        assert_eq!(config.engage.click_timeout_ms, 3_000);
        assert_eq!(config.browser.kind, BrowserKind::Chrome);
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.timing, TimingConfig::default());
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "timing:\n  settle_ms: 1").unwrap();
        let config = RunnerConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.timing.settle(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_config() {
        assert!(matches!(
            RunnerConfig::from_yaml_str("executor: [1, 2]"),
            Err(AutomationError::InvalidArgument(_))
        ));
        let mut config = RunnerConfig::default();
        config.executor.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_duration_range_bounds() {
        let range = DurationRange::new(30, 10);
        assert_eq!(range.lower(), Duration::from_millis(10));
        assert_eq!(range.upper(), Duration::from_millis(30));
        assert_eq!(DurationRange::fixed(5).lower(), DurationRange::fixed(5).upper());
    }
}
