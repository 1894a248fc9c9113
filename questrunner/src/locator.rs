use tracing::{debug, instrument, warn};

use crate::element::WebElement;
use crate::engine::WebEngine;
use crate::errors::AutomationError;
use crate::selector::{Query, Selector, WaitCondition};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};

// Default timeout per query if none is specified on the locator itself
const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Elements produced by the first query of a chain that matched.
#[derive(Debug, Clone)]
pub struct Resolved {
    /// Position of the matching query in the chain
    pub query_index: usize,
    pub selector: Selector,
    pub elements: Vec<WebElement>,
}

/// Resolves an ordered chain of queries against the page or a sub-tree.
///
/// Queries are tried strictly in order, each waiting up to the per-query
/// timeout for its condition. The first query yielding at least one element
/// that satisfies its condition wins; later queries are never evaluated.
/// "Nothing matched" is `Ok(None)`, errors are reserved for the engine failing.
#[derive(Clone)]
pub struct Locator {
    engine: Arc<dyn WebEngine>,
    queries: Vec<Query>,
    timeout: Duration, // Per query
    poll_interval: Duration,
    root: Option<WebElement>,
}

impl Locator {
    pub fn new(engine: Arc<dyn WebEngine>, queries: Vec<Query>) -> Self {
        Self {
            engine,
            queries,
            timeout: DEFAULT_QUERY_TIMEOUT,
            poll_interval: DEFAULT_POLL_INTERVAL,
            root: None,
        }
    }

    /// Set how long each query of the chain may wait for its condition.
    pub fn set_default_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the root element for this locator
    pub fn within(mut self, element: WebElement) -> Self {
        self.root = Some(element);
        self
    }

    pub fn queries(&self) -> &[Query] {
        &self.queries
    }

    #[instrument(level = "debug", skip(self), fields(queries = self.queries.len()))]
    pub async fn resolve(&self) -> Result<Option<Resolved>, AutomationError> {
        for (query_index, query) in self.queries.iter().enumerate() {
            if !query.selector.is_valid() {
                warn!(selector = %query.selector, "skipping invalid selector");
                continue;
            }
            if let Some(elements) = self.wait_for_query(query).await? {
                debug!(
                    selector = %query.selector,
                    matched = elements.len(),
                    "query matched"
                );
                return Ok(Some(Resolved {
                    query_index,
                    selector: query.selector.clone(),
                    elements,
                }));
            }
            debug!(selector = %query.selector, timeout = ?self.timeout, "query did not match");
        }
        Ok(None)
    }

    /// All matching elements of the first successful query, or empty.
    pub async fn all(&self) -> Result<Vec<WebElement>, AutomationError> {
        Ok(self
            .resolve()
            .await?
            .map(|resolved| resolved.elements)
            .unwrap_or_default())
    }

    pub async fn first(&self) -> Result<Option<WebElement>, AutomationError> {
        Ok(self.all().await?.into_iter().next())
    }

    async fn wait_for_query(
        &self,
        query: &Query,
    ) -> Result<Option<Vec<WebElement>>, AutomationError> {
        let deadline = Instant::now() + self.timeout;
        loop {
            match self.try_query(query).await {
                Ok(elements) if !elements.is_empty() => return Ok(Some(elements)),
                Ok(_) => {}
                Err(AutomationError::InvalidSelector(reason)) => {
                    // A variant the live markup does not understand; move on to the next one
                    warn!(selector = %query.selector, %reason, "selector rejected by the browser");
                    return Ok(None);
                }
                Err(e) => return Err(e),
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            sleep(self.poll_interval).await;
        }
    }

    async fn try_query(&self, query: &Query) -> Result<Vec<WebElement>, AutomationError> {
        let root = self.root.as_ref().map(|r| r.id());
        let ids = self.engine.find_elements(&query.selector, root).await?;
        let mut matched = Vec::with_capacity(ids.len());
        for id in ids {
            let element = WebElement::new(id, self.engine.clone());
            match satisfies(&element, query.condition).await {
                Ok(true) => matched.push(element),
                Ok(false) => {}
                // Vanished between lookup and inspection
                Err(AutomationError::StaleElement(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(matched)
    }
}

async fn satisfies(element: &WebElement, condition: WaitCondition) -> Result<bool, AutomationError> {
    match condition {
        WaitCondition::Presence => Ok(true),
        WaitCondition::Visibility => element.is_displayed().await,
        WaitCondition::Clickable => element.is_clickable().await,
    }
}

/// Wait until a single already-located element satisfies `condition`.
pub async fn wait_for(
    element: &WebElement,
    condition: WaitCondition,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<(), AutomationError> {
    let deadline = Instant::now() + timeout;
    loop {
        if satisfies(element, condition).await? {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(AutomationError::Timeout(format!(
                "element {} not {:?} after {:?}",
                element.id(),
                condition,
                timeout
            )));
        }
        sleep(poll_interval).await;
    }
}
