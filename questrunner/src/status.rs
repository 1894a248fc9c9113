use crate::element::WebElement;
use crate::errors::AutomationError;
use crate::selector::Selector;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// State of a task card as rendered right now. Never cached: the remote page
/// is the source of truth and is re-read on every resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskStatus {
    Completed,
    Locked,
    Actionable,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Completed => "completed",
            TaskStatus::Locked => "locked",
            TaskStatus::Actionable => "actionable",
        };
        f.write_str(s)
    }
}

/// One structural signal looked for on a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// `attribute` equals `value` (case-insensitive) on the card, or on any
    /// element reached from it through `scope` (typically an ancestor axis).
    AttributeEquals {
        scope: Option<Selector>,
        attribute: String,
        value: String,
    },
    /// `attribute` contains `needle` on the card or on a scoped element
    AttributeContains {
        scope: Option<Selector>,
        attribute: String,
        needle: String,
    },
    /// An element reached through `selector` is rendered
    Rendered(Selector),
}

impl Signal {
    pub fn equals(scope: Option<&str>, attribute: &str, value: &str) -> Self {
        Signal::AttributeEquals {
            scope: scope.map(Selector::from),
            attribute: attribute.to_string(),
            value: value.to_string(),
        }
    }

    pub fn contains(scope: Option<&str>, attribute: &str, needle: &str) -> Self {
        Signal::AttributeContains {
            scope: scope.map(Selector::from),
            attribute: attribute.to_string(),
            needle: needle.to_string(),
        }
    }

    pub fn rendered(selector: &str) -> Self {
        Signal::Rendered(Selector::from(selector))
    }

    async fn targets(
        element: &WebElement,
        scope: &Option<Selector>,
    ) -> Result<Vec<WebElement>, AutomationError> {
        match scope {
            None => Ok(vec![element.clone()]),
            Some(selector) => element.find_all(selector.clone()).await,
        }
    }

    async fn fires(&self, element: &WebElement) -> Result<bool, AutomationError> {
        match self {
            Signal::AttributeEquals {
                scope,
                attribute,
                value,
            } => {
                for target in Self::targets(element, scope).await? {
                    if let Some(found) = target.attribute(attribute).await? {
                        if found.trim().eq_ignore_ascii_case(value) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Signal::AttributeContains {
                scope,
                attribute,
                needle,
            } => {
                for target in Self::targets(element, scope).await? {
                    if let Some(found) = target.attribute(attribute).await? {
                        if found.contains(needle.as_str()) {
                            return Ok(true);
                        }
                    }
                }
                Ok(false)
            }
            Signal::Rendered(selector) => {
                for target in element.find_all(selector.clone()).await? {
                    if target.is_displayed().await? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}

/// Ordered signal tiers consulted by [`StatusClassifier::classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSignals {
    /// Explicit "complete" markers on the card or a named ancestor
    pub completion_markers: Vec<Signal>,
    /// Completion icons or classes that must also be rendered
    pub completion_icons: Vec<Signal>,
    /// Disabled flags or locked-state classes
    pub locked_markers: Vec<Signal>,
}

impl Default for StatusSignals {
    fn default() -> Self {
        const CARD_CONTAINER: &str =
            "xpath:./ancestor::div[contains(@class, 'rewards-card-container')]";
        Self {
            completion_markers: vec![
                Signal::equals(
                    Some("xpath:./ancestor::mee-rewards-points"),
                    "complete",
                    "true",
                ),
                Signal::equals(None, "state", "complete"),
            ],
            completion_icons: vec![
                Signal::rendered("xpath:.//span[contains(@class, 'mee-icon-SkypeCircleCheck')]"),
                Signal::rendered("xpath:.//*[contains(@class, 'completed')]"),
            ],
            locked_markers: vec![
                Signal::equals(None, "aria-disabled", "true"),
                Signal::equals(None, "disabled", "true"),
                Signal::contains(Some(CARD_CONTAINER), "ng-class", "'locked-card'"),
                Signal::contains(Some(CARD_CONTAINER), "class", "locked-card"),
            ],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusClassifier {
    signals: StatusSignals,
}

impl StatusClassifier {
    pub fn new(signals: StatusSignals) -> Self {
        Self { signals }
    }

    /// Classify the card as currently rendered. Any failure while inspecting
    /// (detached element, odd markup) yields `Actionable`: attempting a task
    /// that turns out to be done costs a click, skipping one loses it.
    pub async fn classify(&self, element: &WebElement) -> TaskStatus {
        match self.try_classify(element).await {
            Ok(status) => status,
            Err(e) => {
                debug!(error = %e, element = element.id(), "status check failed, assuming actionable");
                TaskStatus::Actionable
            }
        }
    }

    async fn try_classify(&self, element: &WebElement) -> Result<TaskStatus, AutomationError> {
        let tiers = [
            (&self.signals.completion_markers, TaskStatus::Completed),
            (&self.signals.completion_icons, TaskStatus::Completed),
            (&self.signals.locked_markers, TaskStatus::Locked),
        ];
        for (signals, status) in tiers {
            for signal in signals.iter() {
                if signal.fires(element).await? {
                    debug!(?signal, %status, "status signal fired");
                    return Ok(status);
                }
            }
        }
        Ok(TaskStatus::Actionable)
    }
}
