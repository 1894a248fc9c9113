use crate::config::TimingConfig;
use crate::engine::WebEngine;
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::selector::Query;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, instrument, warn};

/// Close buttons of promos, banners and modal dialogs, most specific first.
pub fn default_overlay_queries() -> Vec<Query> {
    [
        "xpath://promotional-item//button[contains(@aria-label, 'Close')]",
        "xpath://div[contains(@class, 'redeem-banner')]//button[contains(@aria-label, 'Close')]",
        "xpath://button[contains(@aria-label, 'Close')]",
        "xpath://button[text()='Not now']",
        "xpath://button[contains(text(), 'Maybe later')]",
        "xpath://button[contains(@class, 'close-button')]",
        "xpath://div[contains(@id, 'banner')]//button[contains(@class, 'close')]",
        "xpath://div[contains(@role, 'dialog')]//button[contains(@aria-label, 'Close')]",
        "xpath://span[contains(@class, 'close-button')]",
        "xpath://button[contains(@class, 'glif-msft-modal-close')]",
    ]
    .into_iter()
    .map(Query::clickable)
    .collect()
}

/// What a click guarded by [`Navigator::with_new_window`] turned out to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowOutcome {
    /// A second window appeared, was handled, closed, and the original restored
    NewWindow,
    /// Nothing new appeared; the activity happened in the current window
    SameWindow,
}

/// Navigation with settle time, overlay dismissal and spawned-window handling.
pub struct Navigator {
    engine: Arc<dyn WebEngine>,
    timing: TimingConfig,
    overlay_queries: Vec<Query>,
}

impl Navigator {
    pub fn new(engine: Arc<dyn WebEngine>, timing: TimingConfig) -> Self {
        Self {
            engine,
            timing,
            overlay_queries: default_overlay_queries(),
        }
    }

    pub fn with_overlay_queries(mut self, queries: Vec<Query>) -> Self {
        self.overlay_queries = queries;
        self
    }

    pub fn engine(&self) -> &Arc<dyn WebEngine> {
        &self.engine
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub async fn is_on(&self, url: &str) -> Result<bool, AutomationError> {
        let current = self.engine.current_url().await?;
        Ok(current.starts_with(url) || current.contains(url.trim_end_matches('/')))
    }

    /// Navigate to `url` unless the active window already shows it, then settle.
    #[instrument(skip(self))]
    pub async fn ensure_on(&self, url: &str) -> Result<(), AutomationError> {
        if self.is_on(url).await.unwrap_or(false) {
            debug!("already on page");
        } else {
            info!("navigating");
            self.navigate(url).await?;
        }
        sleep(self.timing.initial_settle()).await;
        Ok(())
    }

    /// Navigate unconditionally and wait `settle`. The old page's element
    /// references are invalid afterwards.
    pub async fn goto(&self, url: &str, settle: std::time::Duration) -> Result<(), AutomationError> {
        self.navigate(url).await?;
        sleep(settle).await;
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<(), AutomationError> {
        self.engine.navigate(url).await.map_err(|e| match e {
            AutomationError::Navigation(_) | AutomationError::WindowLost(_) => e,
            other => AutomationError::Navigation(format!("{url}: {other}")),
        })
    }

    /// Click the first dismissible overlay found. At most one overlay is
    /// dismissed per call; finding none is not an error.
    pub async fn dismiss_overlays(&self) -> bool {
        let mut dismissed = false;
        for query in &self.overlay_queries {
            let locator = Locator::new(self.engine.clone(), vec![query.clone()])
                .set_default_timeout(self.timing.overlay_query())
                .set_poll_interval(self.timing.poll_interval());
            let button = match locator.first().await {
                Ok(Some(button)) => button,
                Ok(None) => continue,
                Err(e) => {
                    debug!(selector = %query.selector, error = %e, "overlay lookup failed");
                    continue;
                }
            };
            match button.click().await {
                Ok(()) => {
                    info!(selector = %query.selector, "dismissed overlay");
                    dismissed = true;
                    break;
                }
                Err(e) => {
                    debug!(selector = %query.selector, error = %e, "overlay close click failed, trying next");
                }
            }
        }
        if !dismissed {
            debug!("no dismissible overlay found");
        }
        sleep(self.timing.overlay_settle()).await;
        dismissed
    }

    /// Run `action` (normally a click) and handle any window it spawns.
    ///
    /// If a new window shows up it is switched into, `on_new_window` runs
    /// there, the window is closed and the recorded original window is made
    /// active again. Failing to get back to the original window is reported as
    /// [`AutomationError::WindowLost`]; every other window hiccup is absorbed.
    pub async fn with_new_window<A, H, HF>(
        &self,
        action: A,
        on_new_window: H,
    ) -> Result<WindowOutcome, AutomationError>
    where
        A: Future<Output = Result<(), AutomationError>>,
        H: FnOnce() -> HF,
        HF: Future<Output = ()>,
    {
        let original = self.engine.window_handle().await?;
        let before = self.engine.window_handles().await?;

        action.await?;

        let Some(spawned) = self.wait_for_new_window(&before).await? else {
            return Ok(WindowOutcome::SameWindow);
        };

        if let Err(e) = self.engine.switch_to_window(&spawned).await {
            warn!(error = %e, "could not switch into spawned window");
            self.restore(&original).await?;
            self.discard(&spawned, &original).await?;
            return Ok(WindowOutcome::SameWindow);
        }
        info!("switched to spawned window");

        on_new_window().await;

        if let Err(e) = self.engine.close_window().await {
            warn!(error = %e, "failed to close spawned window");
        }
        self.restore(&original).await?;
        sleep(self.timing.window_settle()).await;
        Ok(WindowOutcome::NewWindow)
    }

    async fn wait_for_new_window(
        &self,
        before: &[String],
    ) -> Result<Option<String>, AutomationError> {
        let deadline = Instant::now() + self.timing.new_window();
        loop {
            let handles = self.engine.window_handles().await?;
            if let Some(fresh) = handles.iter().rev().find(|h| !before.contains(h)) {
                return Ok(Some(fresh.clone()));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(self.timing.poll_interval()).await;
        }
    }

    /// Second try at closing a spawned window that could not be entered.
    async fn discard(&self, spawned: &str, original: &str) -> Result<(), AutomationError> {
        if let Err(e) = self.engine.switch_to_window(spawned).await {
            warn!(window = %spawned, error = %e, "spawned window left open");
            return Ok(());
        }
        if let Err(e) = self.engine.close_window().await {
            warn!(window = %spawned, error = %e, "spawned window left open");
        }
        self.restore(original).await
    }

    async fn restore(&self, original: &str) -> Result<(), AutomationError> {
        self.engine.switch_to_window(original).await.map_err(|e| {
            error!(error = %e, "failed to switch back to the original window");
            AutomationError::WindowLost(format!("cannot return to window {original}: {e}"))
        })
    }
}
