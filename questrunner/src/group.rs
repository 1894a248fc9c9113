//! Task groups: which dashboard section to look in and how to find its cards.

use crate::config::{ExecutorConfig, TimingConfig};
use crate::element::WebElement;
use crate::engage::ActivityEngager;
use crate::engine::WebEngine;
use crate::errors::AutomationError;
use crate::executor::{TaskCandidate, TaskExecutor, TaskOutcome, TaskRunState};
use crate::fingerprint;
use crate::locator::Locator;
use crate::navigator::Navigator;
use crate::random::Dice;
use crate::selector::{chain, Query, WaitCondition};
use crate::status::StatusClassifier;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// Where a group of task cards lives on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroupSpec {
    pub name: String,
    /// Prefix of synthetic labels for cards without any identity
    pub label_prefix: String,
    /// Section holding the cards; first visible match wins
    pub container: Vec<Query>,
    /// Overrides the configured container wait
    pub container_timeout: Option<Duration>,
    /// Card queries scoped to the container
    pub cards: Vec<Query>,
    /// Page-wide card queries used when the container is not rendered at all
    pub page_fallback: Vec<Query>,
}

impl TaskGroupSpec {
    pub fn daily_set() -> Self {
        Self {
            name: "Daily Set".to_string(),
            label_prefix: "DailySet".to_string(),
            container: chain(["xpath://*[@id='daily-sets']"], WaitCondition::Visibility),
            container_timeout: None,
            cards: chain(
                [
                    "xpath:.//div[contains(@class, 'daily-set-item')]/a",
                    "xpath:.//a[contains(@class, 'ds-card-sec')]",
                    "xpath:.//mee-card//a[contains(@href, '')]",
                ],
                WaitCondition::Visibility,
            ),
            page_fallback: Vec::new(),
        }
    }

    pub fn other_activities() -> Self {
        Self {
            name: "Other Activities".to_string(),
            label_prefix: "OtherActivity".to_string(),
            container: chain(["xpath://*[@id='more-activities']"], WaitCondition::Visibility),
            container_timeout: Some(Duration::from_secs(10)),
            cards: chain(
                [
                    "xpath:.//div[contains(@class, 'rewards-card-container')]/a[contains(@class, 'ds-card-sec')]",
                    "xpath:.//div[contains(@class, 'more-earning-card-item')]/a",
                    "xpath:.//a[contains(@class, 'ds-card-sec')]",
                    "xpath:.//div[contains(@class, 'rewards-card')]//mee-card",
                    "xpath:.//div[contains(@class, 'promo-item')]//mee-card",
                    "xpath:.//mee-card//a[contains(@href, '')]",
                ],
                WaitCondition::Visibility,
            ),
            page_fallback: chain(
                [
                    "xpath://div[contains(@class, 'rewards-card-container')]/a[contains(@class, 'ds-card-sec')]",
                    "xpath://div[contains(@class, 'more-earning-card-item')]/a",
                ],
                WaitCondition::Visibility,
            ),
        }
    }

    /// Resolve the container and the visible cards in it as rendered now.
    pub async fn scan(
        &self,
        engine: &Arc<dyn WebEngine>,
        timing: &TimingConfig,
    ) -> Result<CardScan, AutomationError> {
        let container = Locator::new(engine.clone(), self.container.clone())
            .set_default_timeout(self.container_timeout.unwrap_or_else(|| timing.container()))
            .set_poll_interval(timing.poll_interval())
            .first()
            .await?;

        match container {
            Some(container) => {
                let cards = container
                    .locator(self.cards.clone())
                    .set_default_timeout(timing.cards())
                    .set_poll_interval(timing.poll_interval())
                    .all()
                    .await?;
                Ok(CardScan {
                    container_found: true,
                    cards,
                })
            }
            None if !self.page_fallback.is_empty() => {
                warn!(group = %self.name, "container not found, searching the whole page");
                let cards = Locator::new(engine.clone(), self.page_fallback.clone())
                    .set_default_timeout(timing.cards())
                    .set_poll_interval(timing.poll_interval())
                    .all()
                    .await?;
                Ok(CardScan {
                    container_found: false,
                    cards,
                })
            }
            None => Ok(CardScan {
                container_found: false,
                cards: Vec::new(),
            }),
        }
    }
}

/// Visible cards of a group on the current render.
#[derive(Debug, Clone)]
pub struct CardScan {
    pub container_found: bool,
    pub cards: Vec<WebElement>,
}

/// What the discovery pass found. Both empty outcomes are successes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DiscoveryOutcome {
    Tasks(usize),
    /// Container rendered but holds no visible cards
    Empty,
    /// Neither the container nor any page-wide card was found
    ContainerMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub candidate: TaskCandidate,
    pub state: TaskRunState,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    pub group: String,
    pub discovery: DiscoveryOutcome,
    pub tasks: Vec<TaskReport>,
}

impl GroupReport {
    pub fn outcomes(&self) -> Vec<TaskOutcome> {
        self.tasks.iter().map(|t| t.state.outcome).collect()
    }

    pub fn count(&self, outcome: TaskOutcome) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.state.outcome == outcome)
            .count()
    }
}

/// Discovers the tasks of one group and runs each through a [`TaskExecutor`].
pub struct TaskGroupRunner<'a> {
    navigator: &'a Navigator,
    classifier: &'a StatusClassifier,
    engager: &'a ActivityEngager,
    dashboard_url: &'a str,
    config: ExecutorConfig,
    dice: Arc<Dice>,
}

impl<'a> TaskGroupRunner<'a> {
    pub fn new(
        navigator: &'a Navigator,
        classifier: &'a StatusClassifier,
        engager: &'a ActivityEngager,
        dashboard_url: &'a str,
        config: ExecutorConfig,
        dice: Arc<Dice>,
    ) -> Self {
        Self {
            navigator,
            classifier,
            engager,
            dashboard_url,
            config,
            dice,
        }
    }

    /// Snapshot fingerprints of every visible card. Element references from
    /// this pass are dropped before any task runs.
    #[instrument(skip(self, group), fields(group = %group.name))]
    pub async fn discover(
        &self,
        group: &TaskGroupSpec,
    ) -> Result<(DiscoveryOutcome, Vec<TaskCandidate>), AutomationError> {
        let timing = self.navigator.timing();
        self.navigator.ensure_on(self.dashboard_url).await?;
        self.navigator.dismiss_overlays().await;

        let scan = group.scan(self.navigator.engine(), timing).await?;
        if scan.cards.is_empty() {
            let outcome = if scan.container_found {
                info!("no visible task cards in container");
                DiscoveryOutcome::Empty
            } else {
                warn!("task container not found");
                DiscoveryOutcome::ContainerMissing
            };
            return Ok((outcome, Vec::new()));
        }

        let mut candidates = Vec::with_capacity(scan.cards.len());
        for (index, card) in scan.cards.iter().enumerate() {
            let fingerprint = fingerprint::capture(card, &group.label_prefix, index).await;
            candidates.push(TaskCandidate {
                original_index: index,
                fingerprint,
            });
        }
        info!(count = candidates.len(), "discovered tasks");
        Ok((DiscoveryOutcome::Tasks(candidates.len()), candidates))
    }

    /// Run every task of `group` in discovery order. An error means the group
    /// as a whole failed; individual task failures are in the report.
    pub async fn run(&self, group: &TaskGroupSpec) -> Result<GroupReport, AutomationError> {
        info!(group = %group.name, "starting task group");
        let (discovery, candidates) = self.discover(group).await?;

        let executor = TaskExecutor::new(
            self.navigator,
            self.classifier,
            self.engager,
            group,
            self.dashboard_url,
            self.config.clone(),
            self.dice.clone(),
        );

        let total = candidates.len();
        let mut tasks = Vec::with_capacity(total);
        for (i, candidate) in candidates.into_iter().enumerate() {
            info!(group = %group.name, "task {}/{}: {}", i + 1, total, candidate.label());
            let state = executor.run(&candidate).await.map_err(|e| {
                error!(group = %group.name, error = %e, "aborting task group");
                e
            })?;
            tasks.push(TaskReport { candidate, state });
        }

        info!(group = %group.name, tasks = tasks.len(), "finished task group");
        Ok(GroupReport {
            group: group.name.clone(),
            discovery,
            tasks,
        })
    }
}
