//! Browser automation for gamified dashboard task lists
//!
//! Tasks are cards on a page that re-renders after every interaction. The
//! crate never holds on to element references across renders: each card is
//! remembered by a [`Fingerprint`] and looked up again on a fresh render
//! before every attempt, with a bounded retry budget per task.

use std::sync::Arc;
use tracing::{error, info, instrument};

pub mod config;
pub mod coordinator;
pub mod element;
pub mod engage;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod fingerprint;
pub mod group;
pub mod locator;
pub mod login;
pub mod navigator;
pub mod points;
pub mod random;
pub mod search;
pub mod selector;
pub mod status;
#[cfg(test)]
mod tests;
pub mod webdriver;

pub use config::RunnerConfig;
pub use coordinator::{GroupRun, WorkflowCoordinator, WorkflowRun};
pub use element::WebElement;
pub use engine::{ScriptArg, WebEngine, WindowRect};
pub use errors::{AutomationError, FailureKind};
pub use executor::{TaskCandidate, TaskExecutor, TaskOutcome, TaskRunState};
pub use fingerprint::Fingerprint;
pub use group::{DiscoveryOutcome, GroupReport, TaskGroupSpec};
pub use locator::Locator;
pub use selector::{Query, Selector, WaitCondition};
pub use status::{StatusClassifier, TaskStatus};
pub use webdriver::WebDriverEngine;

/// Open a WebDriver session for `config` and run the whole workflow on it.
///
/// Fails only when no browser session could be created; every later problem
/// is reported through the returned [`WorkflowRun`].
#[instrument(skip(config))]
pub async fn run_workflow(
    config: RunnerConfig,
    skip_search: bool,
) -> Result<WorkflowRun, AutomationError> {
    config.validate()?;
    let engine = WebDriverEngine::launch(&config.browser).await.map_err(|e| {
        error!(error = %e, "could not start the browser");
        e
    })?;
    info!("browser ready");
    let run = WorkflowCoordinator::new(Arc::new(engine), config)
        .run_workflow(skip_search)
        .await;
    Ok(run)
}
