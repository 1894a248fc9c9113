use crate::{AutomationError, Selector, WebElement};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Argument passed to an injected script.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptArg {
    /// Reference to a live element, resolved by the browser to a DOM node
    Element(String),
    Value(Value),
}

impl From<&WebElement> for ScriptArg {
    fn from(element: &WebElement) -> Self {
        ScriptArg::Element(element.id().to_string())
    }
}

impl From<Value> for ScriptArg {
    fn from(value: Value) -> Self {
        ScriptArg::Value(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowRect {
    pub width: u32,
    pub height: u32,
}

/// The common trait every browser backend must implement.
///
/// Element ids are opaque references handed out by `find_elements`; they are
/// only valid for the page render that produced them. Any call made with an id
/// from a previous render must fail with [`AutomationError::StaleElement`].
#[async_trait::async_trait]
pub trait WebEngine: Send + Sync {
    /// Navigate the active window to `url` and wait for the load to return
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    async fn current_url(&self) -> Result<String, AutomationError>;

    /// Find all elements matching a selector, within `root` if given.
    /// Never waits; an empty vector means nothing matched right now.
    async fn find_elements(
        &self,
        selector: &Selector,
        root: Option<&str>,
    ) -> Result<Vec<String>, AutomationError>;

    async fn element_attribute(
        &self,
        element: &str,
        name: &str,
    ) -> Result<Option<String>, AutomationError>;

    /// Rendered text of the element
    async fn element_text(&self, element: &str) -> Result<String, AutomationError>;

    async fn element_tag(&self, element: &str) -> Result<String, AutomationError>;

    async fn is_displayed(&self, element: &str) -> Result<bool, AutomationError>;

    async fn is_enabled(&self, element: &str) -> Result<bool, AutomationError>;

    async fn clear_element(&self, element: &str) -> Result<(), AutomationError>;

    async fn send_keys(&self, element: &str, text: &str) -> Result<(), AutomationError>;

    /// Run a synchronous script in the page. Arguments are exposed as `arguments[i]`.
    async fn execute_script(&self, script: &str, args: &[ScriptArg])
        -> Result<Value, AutomationError>;

    /// Handle of the window currently receiving commands
    async fn window_handle(&self) -> Result<String, AutomationError>;

    async fn window_handles(&self) -> Result<Vec<String>, AutomationError>;

    async fn switch_to_window(&self, handle: &str) -> Result<(), AutomationError>;

    /// Close the window currently receiving commands
    async fn close_window(&self) -> Result<(), AutomationError>;

    async fn set_window_rect(&self, rect: WindowRect) -> Result<(), AutomationError>;

    async fn maximize_window(&self) -> Result<(), AutomationError>;

    /// Override the user agent; `None` restores the browser default
    async fn override_user_agent(&self, user_agent: Option<&str>) -> Result<(), AutomationError>;

    /// End the browser session and release the browser process
    async fn quit(&self) -> Result<(), AutomationError>;
}
