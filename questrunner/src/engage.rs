use crate::config::{EngageConfig, TimingConfig};
use crate::element::WebElement;
use crate::engine::WebEngine;
use crate::errors::AutomationError;
use crate::locator::{wait_for, Locator};
use crate::random::Dice;
use crate::selector::{Query, Selector, WaitCondition};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Generic quiz/poll controls found on activity pages.
pub const INTERACTIVE_ELEMENTS: &str = "xpath://input[@type='radio'] \
    | //div[contains(@class, 'option') or contains(@class, 'choice')] \
    | //button[contains(text(), 'Submit') or contains(text(), 'Next') or contains(text(), 'Play')] \
    | //a[contains(@class, 'btn') or contains(@class, 'button')] \
    | //button \
    | //a[contains(@href, '')] \
    | //div[@tabindex='0' and (contains(@role, 'button') or contains(@role, 'option'))] \
    | //span[contains(@class, 'answer') or contains(@class, 'option')] \
    | //label[contains(@class, 'option')]";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngageReport {
    /// Visible and enabled interactive elements found
    pub candidates: usize,
    /// Elements picked for clicking
    pub sampled: usize,
    /// Clicks that went through
    pub clicked: usize,
}

/// Pokes at a freshly opened activity page so tasks that only need "some
/// interaction" or time on page register.
pub struct ActivityEngager {
    engine: Arc<dyn WebEngine>,
    config: EngageConfig,
    poll_interval: Duration,
    dice: Arc<Dice>,
}

impl ActivityEngager {
    pub fn new(
        engine: Arc<dyn WebEngine>,
        config: EngageConfig,
        timing: &TimingConfig,
        dice: Arc<Dice>,
    ) -> Self {
        Self {
            engine,
            config,
            poll_interval: timing.poll_interval(),
            dice,
        }
    }

    /// Best effort: never fails, and always dwells on the page at the end.
    pub async fn engage(&self) -> EngageReport {
        info!("interacting with activity page");
        let mut report = EngageReport::default();

        let body = Locator::new(self.engine.clone(), vec![Query::presence("css:body")])
            .set_default_timeout(Duration::from_millis(self.config.page_load_ms))
            .set_poll_interval(self.poll_interval);
        if let Err(e) = body.resolve().await {
            debug!(error = %e, "activity page body lookup failed");
        }
        sleep(self.dice.duration(self.config.initial_wait)).await;

        match self.interactable_candidates().await {
            Ok(candidates) if !candidates.is_empty() => {
                report.candidates = candidates.len();
                let picked = self.dice.sample(&candidates, self.config.sample_size);
                report.sampled = picked.len();
                info!(
                    candidates = report.candidates,
                    picked = report.sampled,
                    "clicking random interactive elements"
                );
                for (i, element) in picked.iter().enumerate() {
                    match self.click_one(element).await {
                        Ok(()) => {
                            report.clicked += 1;
                            debug!("clicked interactive element {}/{}", i + 1, picked.len());
                            sleep(self.dice.duration(self.config.post_click)).await;
                        }
                        Err(e) => {
                            debug!(error = %e, "skipping interactive element {}", i + 1);
                        }
                    }
                }
            }
            Ok(_) => info!("no visible interactive elements on activity page"),
            Err(e) => warn!(error = %e, "could not gather interactive elements"),
        }

        info!("staying on activity page");
        sleep(self.dice.duration(self.config.dwell)).await;
        report
    }

    async fn interactable_candidates(&self) -> Result<Vec<WebElement>, AutomationError> {
        let selector = Selector::from(INTERACTIVE_ELEMENTS);
        let ids = self.engine.find_elements(&selector, None).await?;
        let mut usable = Vec::new();
        for id in ids {
            let element = WebElement::new(id, self.engine.clone());
            if element.is_clickable().await.unwrap_or(false) {
                usable.push(element);
            }
        }
        Ok(usable)
    }

    async fn click_one(&self, element: &WebElement) -> Result<(), AutomationError> {
        wait_for(
            element,
            WaitCondition::Clickable,
            Duration::from_millis(self.config.click_timeout_ms),
            self.poll_interval,
        )
        .await?;
        element.scroll_into_view("nearest").await?;
        sleep(Duration::from_millis(self.config.scroll_pause_ms)).await;
        element.click().await
    }
}
