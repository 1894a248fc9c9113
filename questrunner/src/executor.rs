//! Per-task retry state machine.
//!
//! Each attempt starts from a fresh dashboard render: navigate, dismiss
//! overlays, re-find the card by fingerprint, classify it and, if there is
//! still work to do, click it and follow wherever the click leads.

use crate::config::{ExecutorConfig, TimingConfig};
use crate::engage::ActivityEngager;
use crate::errors::{AutomationError, FailureKind};
use crate::fingerprint::{self, Fingerprint, MatchKind};
use crate::group::TaskGroupSpec;
use crate::locator::wait_for;
use crate::navigator::{Navigator, WindowOutcome};
use crate::random::Dice;
use crate::selector::WaitCondition;
use crate::status::{StatusClassifier, TaskStatus};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// A task discovered on the dashboard. Only meaningful for the discovery pass
/// that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskCandidate {
    /// Position among the visible cards at discovery time
    pub original_index: usize,
    pub fingerprint: Fingerprint,
}

impl TaskCandidate {
    pub fn label(&self) -> &str {
        &self.fingerprint.display_label
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskOutcome {
    Initial,
    Completed,
    Attempted,
    Failed,
    SkippedNotInteractable,
}

impl TaskOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskOutcome::Initial)
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskOutcome::Initial => "initial",
            TaskOutcome::Completed => "completed",
            TaskOutcome::Attempted => "attempted",
            TaskOutcome::Failed => "failed",
            TaskOutcome::SkippedNotInteractable => "skipped_not_interactable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskRunState {
    pub attempts_used: u32,
    pub outcome: TaskOutcome,
}

impl TaskRunState {
    pub fn new() -> Self {
        Self {
            attempts_used: 0,
            outcome: TaskOutcome::Initial,
        }
    }

    /// Record a terminal outcome. Once terminal the outcome never changes.
    pub fn settle(&mut self, outcome: TaskOutcome) {
        if !self.outcome.is_terminal() {
            self.outcome = outcome;
        }
    }
}

impl Default for TaskRunState {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a single attempt that did not error.
enum Step {
    Settled(TaskOutcome),
    /// The card could not be found on the fresh render; stop retrying
    Lost,
}

pub struct TaskExecutor<'a> {
    navigator: &'a Navigator,
    classifier: &'a StatusClassifier,
    engager: &'a ActivityEngager,
    group: &'a TaskGroupSpec,
    dashboard_url: &'a str,
    config: ExecutorConfig,
    dice: Arc<Dice>,
}

impl<'a> TaskExecutor<'a> {
    pub fn new(
        navigator: &'a Navigator,
        classifier: &'a StatusClassifier,
        engager: &'a ActivityEngager,
        group: &'a TaskGroupSpec,
        dashboard_url: &'a str,
        config: ExecutorConfig,
        dice: Arc<Dice>,
    ) -> Self {
        Self {
            navigator,
            classifier,
            engager,
            group,
            dashboard_url,
            config,
            dice,
        }
    }

    fn timing(&self) -> &TimingConfig {
        self.navigator.timing()
    }

    /// Drive one task to a terminal outcome within the attempt bound.
    ///
    /// Only group- and run-fatal failures are returned as errors; everything
    /// else is folded into the returned state.
    pub async fn run(&self, candidate: &TaskCandidate) -> Result<TaskRunState, AutomationError> {
        let max = self.config.max_attempts.max(1);
        let label = candidate.label();
        let mut state = TaskRunState::new();

        while state.attempts_used < max && !state.outcome.is_terminal() {
            state.attempts_used += 1;
            let attempt = state.attempts_used;
            info!(group = %self.group.name, task = %label, attempt, max, "processing task");

            match self.attempt(candidate).await {
                Ok(Step::Settled(outcome)) => state.settle(outcome),
                Ok(Step::Lost) => {
                    warn!(task = %label, attempt, "could not re-find task card, giving up on it");
                    break;
                }
                Err(e) => match e.failure_kind() {
                    FailureKind::Transient => {
                        warn!(task = %label, attempt, max, error = %e, "transient failure");
                        if attempt >= max {
                            error!(task = %label, "max attempts reached");
                            state.settle(TaskOutcome::Failed);
                        } else {
                            sleep(self.timing().retry_backoff()).await;
                        }
                    }
                    FailureKind::NotInteractable => {
                        warn!(task = %label, error = %e, "task not interactable, skipping");
                        state.settle(TaskOutcome::SkippedNotInteractable);
                    }
                    FailureKind::GroupFatal | FailureKind::RunFatal => {
                        error!(task = %label, error = %e, "unrecoverable failure while processing task");
                        return Err(e);
                    }
                },
            }
        }

        info!(task = %label, outcome = %state.outcome, attempts = state.attempts_used, "finished task");
        Ok(state)
    }

    async fn attempt(&self, candidate: &TaskCandidate) -> Result<Step, AutomationError> {
        let timing = self.timing();
        self.navigator
            .goto(self.dashboard_url, timing.settle())
            .await?;
        self.navigator.dismiss_overlays().await;

        let scan = self
            .group
            .scan(self.navigator.engine(), timing)
            .await?;
        if !scan.container_found && scan.cards.is_empty() {
            return Err(AutomationError::Timeout(format!(
                "{} container not visible",
                self.group.name
            )));
        }

        let Some((card, kind)) = fingerprint::reacquire(
            &candidate.fingerprint,
            candidate.original_index,
            &scan.cards,
        )
        .await
        else {
            return Ok(Step::Lost);
        };
        if kind == MatchKind::Positional {
            debug!(task = %candidate.label(), "using positional match");
        }

        match self.classifier.classify(&card).await {
            TaskStatus::Completed => {
                info!(task = %candidate.label(), "task already completed");
                return Ok(Step::Settled(TaskOutcome::Completed));
            }
            TaskStatus::Locked => {
                info!(task = %candidate.label(), "task is locked");
                return Ok(Step::Settled(TaskOutcome::SkippedNotInteractable));
            }
            TaskStatus::Actionable => {
                info!(task = %candidate.label(), "task is actionable, interacting");
            }
        }

        if let Err(e) = card.scroll_into_view("center").await {
            debug!(error = %e, "scroll to card failed");
        }
        sleep(timing.scroll_settle()).await;
        wait_for(
            &card,
            WaitCondition::Clickable,
            timing.clickable(),
            timing.poll_interval(),
        )
        .await?;

        let outcome = self
            .navigator
            .with_new_window(card.click(), || async {
                self.engager.engage().await;
            })
            .await?;

        if outcome == WindowOutcome::SameWindow {
            info!(task = %candidate.label(), "no new window, treating as in-page activity");
            sleep(self.dice.duration(timing.in_page_dwell)).await;
        }
        Ok(Step::Settled(TaskOutcome::Attempted))
    }
}
