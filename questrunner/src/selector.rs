/// Represents ways to locate an element in the rendered page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// CSS selector, e.g. `#daily-sets` or `div.daily-set-item > a`
    Css(String),
    /// XPath expression, absolute (`//button`) or relative to the scope (`./ancestor::div`)
    XPath(String),
    /// Represents an invalid selector string, with a reason.
    Invalid(String),
}

impl Selector {
    /// W3C WebDriver locator strategy name for this selector.
    pub fn strategy(&self) -> &'static str {
        match self {
            Selector::Css(_) => "css selector",
            Selector::XPath(_) => "xpath",
            Selector::Invalid(_) => "invalid",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Selector::Css(v) | Selector::XPath(v) | Selector::Invalid(v) => v,
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Selector::Invalid(_))
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Css(v) => write!(f, "css:{v}"),
            Selector::XPath(v) => write!(f, "xpath:{v}"),
            Selector::Invalid(reason) => write!(f, "invalid:{reason}"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        match s {
            "" => Selector::Invalid("Empty selector".to_string()),
            _ if s.starts_with("xpath:") => Selector::XPath(s["xpath:".len()..].trim().to_string()),
            _ if s.starts_with("css:") => Selector::Css(s["css:".len()..].trim().to_string()),
            // Bare XPath forms
            _ if s.starts_with('/') || s.starts_with("./") || s.starts_with('(') => {
                Selector::XPath(s.to_string())
            }
            _ => Selector::Css(s.to_string()),
        }
    }
}

impl From<String> for Selector {
    fn from(s: String) -> Self {
        Selector::from(s.as_str())
    }
}

/// Condition an element set must satisfy before a query counts as matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitCondition {
    /// At least one element exists in the DOM.
    Presence,
    /// At least one element is rendered.
    #[default]
    Visibility,
    /// At least one element is rendered and enabled.
    Clickable,
}

/// One entry of an ordered fallback chain: a selector plus the condition it must meet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub selector: Selector,
    pub condition: WaitCondition,
}

impl Query {
    pub fn new(selector: impl Into<Selector>, condition: WaitCondition) -> Self {
        Self {
            selector: selector.into(),
            condition,
        }
    }

    pub fn presence(selector: impl Into<Selector>) -> Self {
        Self::new(selector, WaitCondition::Presence)
    }

    pub fn visible(selector: impl Into<Selector>) -> Self {
        Self::new(selector, WaitCondition::Visibility)
    }

    pub fn clickable(selector: impl Into<Selector>) -> Self {
        Self::new(selector, WaitCondition::Clickable)
    }
}

/// Build an ordered chain where every selector shares one wait condition.
pub fn chain<I, S>(selectors: I, condition: WaitCondition) -> Vec<Query>
where
    I: IntoIterator<Item = S>,
    S: Into<Selector>,
{
    selectors
        .into_iter()
        .map(|s| Query::new(s, condition))
        .collect()
}
