//! Identity of an on-screen task card across page renders.
//!
//! Element references die with every reload, so a card is remembered by a
//! handful of weak attributes instead. On the next render the card is looked up
//! by exact attribute match first and by its position second.

use crate::element::WebElement;
use crate::errors::AutomationError;
use serde::Serialize;
use tracing::{debug, warn};

pub const LINK_ATTRIBUTE: &str = "href";
pub const BI_ID_ATTRIBUTE: &str = "data-bi-id";
pub const DATA_M_ATTRIBUTE: &str = "data-m";

/// Labels are cut to this many characters
pub const LABEL_LIMIT: usize = 50;

const LABEL_SELECTOR: &str =
    "xpath:.//h3 | .//div[contains(@class, 'card-title')] | .//*[string-length(normalize-space()) > 0]";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Fingerprint {
    pub link_target: Option<String>,
    pub bi_id: Option<String>,
    pub data_m: Option<String>,
    /// Always populated. Derived from the first weak key, the card text, or a
    /// synthetic `Unknown_<group>_<index>` name.
    pub display_label: String,
}

/// Which tier of [`reacquire`] produced the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Positional,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct WeakKeys {
    link_target: Option<String>,
    bi_id: Option<String>,
    data_m: Option<String>,
}

impl WeakKeys {
    fn is_empty(&self) -> bool {
        self.link_target.is_none() && self.bi_id.is_none() && self.data_m.is_none()
    }
}

impl Fingerprint {
    pub fn has_weak_keys(&self) -> bool {
        !self.keys().is_empty()
    }

    fn keys(&self) -> WeakKeys {
        WeakKeys {
            link_target: self.link_target.clone(),
            bi_id: self.bi_id.clone(),
            data_m: self.data_m.clone(),
        }
    }

    /// Every populated key must be equal on the candidate.
    fn matches_keys(&self, candidate: &WeakKeys) -> bool {
        let field = |mine: &Option<String>, theirs: &Option<String>| match mine {
            Some(value) => theirs.as_ref() == Some(value),
            None => true,
        };
        self.has_weak_keys()
            && field(&self.link_target, &candidate.link_target)
            && field(&self.bi_id, &candidate.bi_id)
            && field(&self.data_m, &candidate.data_m)
    }

    fn is_synthetic(&self) -> bool {
        self.display_label.starts_with("Unknown_")
    }
}

pub fn truncate_label(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > LABEL_LIMIT {
        let cut: String = text.chars().take(LABEL_LIMIT).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}

async fn read_keys(element: &WebElement) -> Result<WeakKeys, AutomationError> {
    Ok(WeakKeys {
        link_target: element.non_empty_attribute(LINK_ATTRIBUTE).await?,
        bi_id: element.non_empty_attribute(BI_ID_ATTRIBUTE).await?,
        data_m: element.non_empty_attribute(DATA_M_ATTRIBUTE).await?,
    })
}

async fn read_text_label(element: &WebElement) -> Result<Option<String>, AutomationError> {
    for candidate in element.find_all(LABEL_SELECTOR).await? {
        let text = candidate.text().await?;
        if !text.trim().is_empty() {
            return Ok(Some(truncate_label(&text)));
        }
    }
    let own = element.text().await?;
    Ok(Some(truncate_label(&own)).filter(|t| !t.is_empty()))
}

/// Snapshot the identity of `element`, the `index`-th visible card of `group`.
/// Never fails: unreadable attributes are simply absent.
pub async fn capture(element: &WebElement, group: &str, index: usize) -> Fingerprint {
    let keys = read_keys(element).await.unwrap_or_else(|e| {
        debug!(error = %e, index, "could not read card attributes");
        WeakKeys::default()
    });

    let display_label = match keys
        .link_target
        .as_ref()
        .or(keys.bi_id.as_ref())
        .or(keys.data_m.as_ref())
    {
        Some(primary) => truncate_label(primary),
        None => {
            let label = read_text_label(element)
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| format!("Unknown_{group}_{index}"));
            warn!(
                index,
                %label,
                "no reliable id (href, data-bi-id, data-m) on card, using fallback label"
            );
            label
        }
    };

    Fingerprint {
        link_target: keys.link_target,
        bi_id: keys.bi_id,
        data_m: keys.data_m,
        display_label,
    }
}

/// Find the element carrying `fingerprint` among freshly resolved `candidates`.
///
/// The first candidate whose populated keys all match wins. Cards without any
/// weak key are matched on their text label instead. Failing that, the
/// candidate at `original_index` is taken when it exists.
pub async fn reacquire(
    fingerprint: &Fingerprint,
    original_index: usize,
    candidates: &[WebElement],
) -> Option<(WebElement, MatchKind)> {
    for candidate in candidates {
        let matched = if fingerprint.has_weak_keys() {
            match read_keys(candidate).await {
                Ok(keys) => fingerprint.matches_keys(&keys),
                Err(_) => false,
            }
        } else if !fingerprint.is_synthetic() {
            matches!(
                read_text_label(candidate).await,
                Ok(Some(label)) if label == fingerprint.display_label
            )
        } else {
            false
        };
        if matched {
            debug!(label = %fingerprint.display_label, "matched card by identity");
            return Some((candidate.clone(), MatchKind::Exact));
        }
    }

    candidates.get(original_index).map(|candidate| {
        debug!(
            label = %fingerprint.display_label,
            original_index, "matched card by position"
        );
        (candidate.clone(), MatchKind::Positional)
    })
}
