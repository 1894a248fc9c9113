mod task_tests;

use crate::config::{DurationRange, EngageConfig, RunnerConfig, TimingConfig};
use crate::group::TaskGroupSpec;
use crate::points::default_points_queries;
use fake_engine::{FakeNode, PageTemplate};

pub const DASHBOARD: &str = "https://rewards.test/";
pub const ACCOUNT: &str = "https://account.test/";
pub const SEARCH: &str = "https://search.test/";

// Initialize tracing for tests
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
        )
        .with_target(true)
        .with_test_writer()
        .try_init();
}

/// Defaults with every wait shrunk; tests run on a paused clock anyway.
pub fn test_config() -> RunnerConfig {
    let mut config = RunnerConfig {
        dashboard_url: DASHBOARD.to_string(),
        account_url: ACCOUNT.to_string(),
        search_url: SEARCH.to_string(),
        seed: Some(7),
        ..RunnerConfig::default()
    };
    config.timing = TimingConfig {
        settle_ms: 10,
        initial_settle_ms: 10,
        overlay_query_ms: 0,
        overlay_settle_ms: 0,
        container_ms: 50,
        cards_ms: 50,
        clickable_ms: 50,
        scroll_settle_ms: 0,
        new_window_ms: 50,
        window_settle_ms: 10,
        in_page_dwell: DurationRange::fixed(10),
        retry_backoff_ms: 20,
        poll_interval_ms: 10,
        points_query_ms: 0,
        manual_login_secs: 1,
    };
    config.engage = EngageConfig {
        sample_size: 2,
        page_load_ms: 0,
        initial_wait: DurationRange::fixed(0),
        click_timeout_ms: 0,
        scroll_pause_ms: 0,
        post_click: DurationRange::fixed(0),
        dwell: DurationRange::fixed(10),
    };
    config.search.desktop_count = 2;
    config.search.mobile_count = 1;
    config.search.page_load_ms = 0;
    config.search.box_query_ms = 0;
    config.search.refind_query_ms = 0;
    config.search.fallback_query_ms = 0;
    config.search.typing_pause_ms = 0;
    config.search.delay = DurationRange::fixed(0);
    config.search.scroll_pause = DurationRange::fixed(0);
    config.search.scroll_back_pause = DurationRange::fixed(0);
    config
}

pub fn card(href: &str, title: &str) -> FakeNode {
    FakeNode::new("a").attr("href", href).text(title)
}

/// Dashboard with a balance and a daily set holding `cards` in order.
pub fn dashboard(cards: Vec<(&str, FakeNode)>) -> PageTemplate {
    let daily = TaskGroupSpec::daily_set();
    let keys: Vec<&str> = cards.iter().map(|(k, _)| *k).collect();
    let mut page = PageTemplate::new()
        .node("balance", FakeNode::new("span").text("1,234"))
        .query(None, default_points_queries()[0].selector.clone(), &["balance"])
        .node("daily", FakeNode::new("div").attr("id", "daily-sets"))
        .query(None, daily.container[0].selector.clone(), &["daily"]);
    if !keys.is_empty() {
        page = page.query(Some("daily"), daily.cards[0].selector.clone(), &keys);
    }
    for (key, node) in cards {
        page = page.node(key, node);
    }
    page
}
