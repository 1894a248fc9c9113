use crate::engine::WebEngine;
use crate::errors::AutomationError;
use crate::locator::Locator;
use crate::navigator::Navigator;
use crate::selector::{chain, Query, WaitCondition};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reported when no balance could be read
pub const UNKNOWN_POINTS: &str = "Unknown";

/// Places the balance has been rendered in across dashboard layouts.
pub fn default_points_queries() -> Vec<Query> {
    chain(
        [
            "xpath://mee-rewards-user-status-banner//p[contains(@class, 'pointsValue')]//span",
            "xpath://mee-rewards-user-status-banner//mee-rewards-counter-animation/span",
            "xpath://div[contains(@class, 'points-package')]//span[contains(@class, 'points-label')]",
            "xpath://p[contains(@class, 'points')] | //span[contains(@class, 'points')]",
            "xpath://div[contains(@class, 'mee-rewards-counter')]//span[string-length(normalize-space()) > 0]",
            "xpath://mee-rewards-user-status-banner//div[contains(@class, 'pointsBalance')]//span",
        ],
        WaitCondition::Visibility,
    )
}

/// Digits with optional thousands separators, e.g. `12,345`
pub fn looks_like_points(value: &str) -> bool {
    let value = value.trim();
    value.chars().any(|c| c.is_ascii_digit())
        && value.chars().all(|c| c.is_ascii_digit() || c == ',')
}

/// Reads the account balance shown on the dashboard.
pub struct PointsReader {
    engine: Arc<dyn WebEngine>,
    queries: Vec<Query>,
    timeout: Duration,
    poll_interval: Duration,
}

impl PointsReader {
    pub fn new(engine: Arc<dyn WebEngine>, timeout: Duration, poll_interval: Duration) -> Self {
        Self {
            engine,
            queries: default_points_queries(),
            timeout,
            poll_interval,
        }
    }

    pub fn with_queries(mut self, queries: Vec<Query>) -> Self {
        self.queries = queries;
        self
    }

    /// Balance on the current page, if any location holds a plausible number.
    /// Each location gets its own wait; a location rendering junk is skipped.
    pub async fn read(&self) -> Option<String> {
        for query in &self.queries {
            match self.read_one(query).await {
                Ok(Some(points)) => {
                    debug!(selector = %query.selector, %points, "read points");
                    return Some(points);
                }
                Ok(None) => {}
                Err(e) => debug!(selector = %query.selector, error = %e, "points lookup failed"),
            }
        }
        None
    }

    async fn read_one(&self, query: &Query) -> Result<Option<String>, AutomationError> {
        let locator = Locator::new(self.engine.clone(), vec![query.clone()])
            .set_default_timeout(self.timeout)
            .set_poll_interval(self.poll_interval);
        let Some(element) = locator.first().await? else {
            return Ok(None);
        };
        if let Some(label) = element.non_empty_attribute("aria-label").await? {
            if looks_like_points(&label) {
                return Ok(Some(label));
            }
        }
        let text = element.text().await?;
        let text = text.trim();
        Ok(looks_like_points(text).then(|| text.to_string()))
    }

    /// Go to the dashboard if needed, clear overlays and read the balance.
    /// Never fails; unreadable balances are [`UNKNOWN_POINTS`].
    pub async fn balance(&self, navigator: &Navigator, dashboard_url: &str) -> String {
        if let Err(e) = navigator.ensure_on(dashboard_url).await {
            warn!(error = %e, "could not open dashboard to read points");
            return UNKNOWN_POINTS.to_string();
        }
        navigator.dismiss_overlays().await;
        match self.read().await {
            Some(points) => {
                info!(%points, "current points");
                points
            }
            None => {
                warn!("could not find points on the dashboard");
                UNKNOWN_POINTS.to_string()
            }
        }
    }
}
