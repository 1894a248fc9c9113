use crate::engine::{ScriptArg, WebEngine};
use crate::errors::AutomationError;
use crate::selector::{Query, Selector};
use crate::Locator;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

const CLICK_SCRIPT: &str = "arguments[0].click();";

/// Represents an element of the currently rendered page.
///
/// This is only a reference: every read goes back to the browser, so once the
/// page re-renders all calls fail with [`AutomationError::StaleElement`] and the
/// element has to be located again.
pub struct WebElement {
    id: String,
    engine: Arc<dyn WebEngine>,
}

impl WebElement {
    pub fn new(id: impl Into<String>, engine: Arc<dyn WebEngine>) -> Self {
        Self {
            id: id.into(),
            engine,
        }
    }

    /// Opaque reference id handed out by the engine
    pub fn id(&self) -> &str {
        &self.id
    }

    pub async fn attribute(&self, name: &str) -> Result<Option<String>, AutomationError> {
        self.engine.element_attribute(&self.id, name).await
    }

    /// Attribute value, treating empty strings as absent
    pub async fn non_empty_attribute(&self, name: &str) -> Result<Option<String>, AutomationError> {
        Ok(self
            .attribute(name)
            .await?
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()))
    }

    pub async fn text(&self) -> Result<String, AutomationError> {
        self.engine.element_text(&self.id).await
    }

    pub async fn tag_name(&self) -> Result<String, AutomationError> {
        self.engine.element_tag(&self.id).await
    }

    pub async fn is_displayed(&self) -> Result<bool, AutomationError> {
        self.engine.is_displayed(&self.id).await
    }

    pub async fn is_enabled(&self) -> Result<bool, AutomationError> {
        self.engine.is_enabled(&self.id).await
    }

    /// Displayed and enabled
    pub async fn is_clickable(&self) -> Result<bool, AutomationError> {
        Ok(self.is_displayed().await? && self.is_enabled().await?)
    }

    /// Elements matching `selector` with this element as the scope. Relative
    /// XPath (`./ancestor::…`) reaches upwards as well as downwards.
    pub async fn find_all(
        &self,
        selector: impl Into<Selector>,
    ) -> Result<Vec<WebElement>, AutomationError> {
        let selector = selector.into();
        let ids = self.engine.find_elements(&selector, Some(&self.id)).await?;
        Ok(ids
            .into_iter()
            .map(|id| WebElement::new(id, self.engine.clone()))
            .collect())
    }

    /// Create a locator scoped to this element
    pub fn locator(&self, queries: Vec<Query>) -> Locator {
        Locator::new(self.engine.clone(), queries).within(self.clone())
    }

    /// Dispatch a click from inside the page. Unlike a native click this is not
    /// blocked by overlays sitting on top of the element.
    pub async fn click(&self) -> Result<(), AutomationError> {
        debug!(element = %self.id, "synthetic click");
        self.engine
            .execute_script(CLICK_SCRIPT, &[ScriptArg::from(self)])
            .await
            .map(|_| ())
    }

    /// Scroll the element into view; `block` is one of `start`, `center`, `end`, `nearest`.
    pub async fn scroll_into_view(&self, block: &str) -> Result<(), AutomationError> {
        let script = format!("arguments[0].scrollIntoView({{block: '{block}'}});");
        self.engine
            .execute_script(&script, &[ScriptArg::from(self)])
            .await
            .map(|_| ())
    }

    pub async fn clear(&self) -> Result<(), AutomationError> {
        self.engine.clear_element(&self.id).await
    }

    pub async fn send_keys(&self, text: &str) -> Result<(), AutomationError> {
        self.engine.send_keys(&self.id, text).await
    }
}

impl fmt::Debug for WebElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebElement").field("id", &self.id).finish()
    }
}

impl PartialEq for WebElement {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for WebElement {}

impl Clone for WebElement {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            engine: self.engine.clone(),
        }
    }
}
