//! Desktop and mobile search rounds.

use crate::config::SearchConfig;
use crate::element::WebElement;
use crate::engine::{WebEngine, WindowRect};
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::navigator::Navigator;
use crate::random::Dice;
use crate::selector::{chain, Query, WaitCondition};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// WebDriver key code for Enter
pub const ENTER_KEY: &str = "\u{E007}";

const SCROLL_DOWN_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight * 0.3);";
const SCROLL_TOP_SCRIPT: &str = "window.scrollTo(0, 0);";

pub fn default_search_box_queries() -> Vec<Query> {
    chain(
        [
            "xpath://textarea[@id='sb_form_q']",
            "xpath://input[@id='sb_form_q']",
            "xpath://input[@name='q']",
            "xpath://textarea[@name='q']",
            "xpath://input[contains(@class, 'searchbox')]",
            "xpath://textarea[contains(@class, 'searchbox')]",
        ],
        WaitCondition::Clickable,
    )
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchReport {
    pub desktop: usize,
    pub mobile: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Device {
    Desktop,
    Mobile,
}

pub struct SearchPhase<'a> {
    navigator: &'a Navigator,
    config: &'a SearchConfig,
    search_url: &'a str,
    dice: Arc<Dice>,
    box_queries: Vec<Query>,
}

impl<'a> SearchPhase<'a> {
    pub fn new(
        navigator: &'a Navigator,
        config: &'a SearchConfig,
        search_url: &'a str,
        dice: Arc<Dice>,
    ) -> Self {
        Self {
            navigator,
            config,
            search_url,
            dice,
            box_queries: default_search_box_queries(),
        }
    }

    fn engine(&self) -> &Arc<dyn WebEngine> {
        self.navigator.engine()
    }

    /// Run both rounds. Never fails; problems only shorten the rounds.
    pub async fn run(&self) -> SearchReport {
        let mut report = SearchReport::default();

        if self.config.desktop_count > 0 {
            report.desktop = self
                .round(Device::Desktop, self.config.desktop_count)
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, "desktop searches aborted");
                    0
                });
        }
        if self.config.mobile_count > 0 {
            report.mobile = self
                .round(Device::Mobile, self.config.mobile_count)
                .await
                .unwrap_or_else(|e| {
                    error!(error = %e, "mobile searches aborted");
                    0
                });
            self.restore_desktop().await;
        }

        info!(
            desktop = report.desktop,
            mobile = report.mobile,
            "search phase finished"
        );
        report
    }

    async fn restore_desktop(&self) {
        if let Err(e) = self.engine().override_user_agent(None).await {
            warn!(error = %e, "could not reset user agent");
        }
        if let Err(e) = self.engine().maximize_window().await {
            debug!(error = %e, "could not maximize window");
        }
    }

    async fn prepare(&self, device: Device) {
        let engine = self.engine();
        let rect: WindowRect = match device {
            Device::Desktop => self.config.desktop_rect,
            Device::Mobile => {
                if let Err(e) = engine
                    .override_user_agent(Some(&self.config.mobile_user_agent))
                    .await
                {
                    error!(error = %e, "could not switch to the mobile user agent");
                }
                self.config.mobile_rect
            }
        };
        if let Err(e) = engine.set_window_rect(rect).await {
            warn!(error = %e, ?rect, "could not resize window");
        }
        if device == Device::Desktop {
            if let Err(e) = engine.maximize_window().await {
                debug!(error = %e, "could not maximize window");
            }
        }
    }

    async fn round(&self, device: Device, count: usize) -> Result<usize, AutomationError> {
        info!(?device, count, "starting searches");
        self.prepare(device).await;
        self.navigator
            .goto(self.search_url, Duration::from_millis(self.config.page_load_ms))
            .await?;
        self.navigator.dismiss_overlays().await;

        let mut terms = self.config.terms.clone();
        self.dice.shuffle(&mut terms);
        terms.truncate(count);
        if terms.len() < count {
            warn!(available = terms.len(), count, "fewer search terms than searches");
        }

        let Some((mut preferred, _)) = self
            .find_box(None, Duration::from_millis(self.config.box_query_ms))
            .await?
        else {
            error!(?device, "search box not found");
            return Ok(0);
        };

        let mut done = 0;
        for (i, term) in terms.iter().enumerate() {
            let found = match self
                .find_box(Some(preferred), Duration::from_millis(self.config.refind_query_ms))
                .await?
            {
                Some(found) => Some(found),
                None => {
                    self.find_box(None, Duration::from_millis(self.config.fallback_query_ms))
                        .await?
                }
            };
            let Some((index, search_box)) = found else {
                error!(?device, "search box disappeared, stopping searches");
                break;
            };
            preferred = index;

            let query = format!("{term} {}", self.dice.int(1000, 9999));
            match self.submit(&search_box, &query).await {
                Ok(()) => {
                    done += 1;
                    info!(?device, "search {}/{}: {}", i + 1, terms.len(), query);
                }
                Err(e) => {
                    warn!(?device, error = %e, %query, "search failed");
                    continue;
                }
            }
            sleep(self.dice.duration(self.config.delay)).await;
            self.scroll_results().await;
        }
        Ok(done)
    }

    /// Search box lookup. With `preferred` set only that query is tried.
    async fn find_box(
        &self,
        preferred: Option<usize>,
        wait: Duration,
    ) -> Result<Option<(usize, WebElement)>, AutomationError> {
        let (offset, queries) = match preferred.and_then(|i| self.box_queries.get(i).map(|q| (i, q))) {
            Some((i, query)) => (i, vec![query.clone()]),
            None => (0, self.box_queries.clone()),
        };
        let resolved = Locator::new(self.engine().clone(), queries)
            .set_default_timeout(wait)
            .set_poll_interval(self.navigator.timing().poll_interval())
            .resolve()
            .await?;
        Ok(resolved.and_then(|r| {
            let index = offset + r.query_index;
            r.elements.into_iter().next().map(|e| (index, e))
        }))
    }

    async fn submit(&self, search_box: &WebElement, query: &str) -> Result<(), AutomationError> {
        let pause = Duration::from_millis(self.config.typing_pause_ms);
        search_box.clear().await?;
        sleep(pause).await;
        search_box.send_keys(query).await?;
        sleep(pause).await;
        search_box.send_keys(ENTER_KEY).await
    }

    async fn scroll_results(&self) {
        let engine = self.engine();
        if let Err(e) = engine.execute_script(SCROLL_DOWN_SCRIPT, &[]).await {
            debug!(error = %e, "scroll failed");
            return;
        }
        sleep(self.dice.duration(self.config.scroll_pause)).await;
        if let Err(e) = engine.execute_script(SCROLL_TOP_SCRIPT, &[]).await {
            debug!(error = %e, "scroll back failed");
        }
        sleep(self.dice.duration(self.config.scroll_back_pause)).await;
    }
}
