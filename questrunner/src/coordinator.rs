//! Top-level run: sign-in, balance, searches, task groups, balance again.

use crate::config::RunnerConfig;
use crate::engage::ActivityEngager;
use crate::engine::WebEngine;
use crate::errors::FailureKind;
use crate::group::{GroupReport, TaskGroupRunner, TaskGroupSpec};
use crate::login::LoginGate;
use crate::navigator::Navigator;
use crate::points::{PointsReader, UNKNOWN_POINTS};
use crate::random::Dice;
use crate::search::{SearchPhase, SearchReport};
use crate::status::StatusClassifier;
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one task group within a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRun {
    pub name: String,
    pub success: bool,
    /// Present when the group ran to the end
    pub report: Option<GroupReport>,
    pub error: Option<String>,
}

impl GroupRun {
    fn failed(name: &str, reason: &str) -> Self {
        Self {
            name: name.to_string(),
            success: false,
            report: None,
            error: Some(reason.to_string()),
        }
    }
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkflowRun {
    pub success: bool,
    pub logged_in: bool,
    pub points_before: String,
    pub points_after: String,
    pub search: Option<SearchReport>,
    pub groups: Vec<GroupRun>,
    /// Set when a run-fatal failure stopped the remaining stages
    pub aborted: Option<String>,
}

impl WorkflowRun {
    fn new() -> Self {
        Self {
            success: false,
            logged_in: false,
            points_before: UNKNOWN_POINTS.to_string(),
            points_after: UNKNOWN_POINTS.to_string(),
            search: None,
            groups: Vec::new(),
            aborted: None,
        }
    }

    pub fn group(&self, name: &str) -> Option<&GroupRun> {
        self.groups.iter().find(|g| g.name == name)
    }
}

/// Owns the browser session for exactly one run.
pub struct WorkflowCoordinator {
    engine: Arc<dyn WebEngine>,
    config: RunnerConfig,
    groups: Vec<TaskGroupSpec>,
    classifier: StatusClassifier,
    dice: Arc<Dice>,
}

impl WorkflowCoordinator {
    pub fn new(engine: Arc<dyn WebEngine>, config: RunnerConfig) -> Self {
        let dice = Arc::new(Dice::new(config.seed));
        Self {
            engine,
            config,
            groups: vec![TaskGroupSpec::daily_set(), TaskGroupSpec::other_activities()],
            classifier: StatusClassifier::default(),
            dice,
        }
    }

    pub fn with_groups(mut self, groups: Vec<TaskGroupSpec>) -> Self {
        self.groups = groups;
        self
    }

    pub fn with_classifier(mut self, classifier: StatusClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Run every stage and release the browser session. Consumes the
    /// coordinator, so the session is released exactly once, including when a
    /// stage panics.
    pub async fn run_workflow(self, skip_search: bool) -> WorkflowRun {
        let this = Arc::new(self);
        let stages = tokio::spawn({
            let this = this.clone();
            async move { this.run_stages(skip_search).await }
        })
        .await;
        this.release().await;

        let run = match stages {
            Ok(run) => run,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(e) => {
                error!(error = %e, "run was cancelled");
                WorkflowRun::new()
            }
        };

        if run.success {
            info!(before = %run.points_before, after = %run.points_after, "run completed");
        } else {
            error!(before = %run.points_before, after = %run.points_after, "run finished with failures");
        }
        run
    }

    async fn release(&self) {
        info!("closing browser session");
        if let Err(e) = self.engine.quit().await {
            warn!(error = %e, "failed to close the browser session cleanly");
        }
    }

    async fn run_stages(&self, skip_search: bool) -> WorkflowRun {
        let config = &self.config;
        let mut run = WorkflowRun::new();

        let navigator = Navigator::new(self.engine.clone(), config.timing.clone());
        let points = PointsReader::new(
            self.engine.clone(),
            config.timing.points_query(),
            config.timing.poll_interval(),
        );
        let login = LoginGate::new(
            &navigator,
            &points,
            &config.dashboard_url,
            &config.account_url,
        );

        run.logged_in = login.establish().await;
        if !run.logged_in {
            error!("not signed in, skipping every stage");
            return run;
        }

        run.points_before = points.balance(&navigator, &config.dashboard_url).await;

        if skip_search {
            info!("skipping searches");
        } else {
            let search = SearchPhase::new(
                &navigator,
                &config.search,
                &config.search_url,
                self.dice.clone(),
            );
            run.search = Some(search.run().await);
        }

        let engager = ActivityEngager::new(
            self.engine.clone(),
            config.engage.clone(),
            &config.timing,
            self.dice.clone(),
        );
        let runner = TaskGroupRunner::new(
            &navigator,
            &self.classifier,
            &engager,
            &config.dashboard_url,
            config.executor.clone(),
            self.dice.clone(),
        );

        for group in &self.groups {
            if let Some(reason) = &run.aborted {
                run.groups.push(GroupRun::failed(&group.name, reason));
                continue;
            }
            match runner.run(group).await {
                Ok(report) => run.groups.push(GroupRun {
                    name: group.name.clone(),
                    success: true,
                    report: Some(report),
                    error: None,
                }),
                Err(e) => {
                    if e.failure_kind() == FailureKind::RunFatal {
                        error!(group = %group.name, error = %e, "session lost, aborting remaining stages");
                        run.aborted = Some(e.to_string());
                    } else {
                        error!(group = %group.name, error = %e, "task group failed");
                    }
                    run.groups.push(GroupRun::failed(&group.name, &e.to_string()));
                }
            }
        }

        if run.aborted.is_none() {
            run.points_after = points.balance(&navigator, &config.dashboard_url).await;
        }
        run.success = run.aborted.is_none() && run.groups.iter().all(|g| g.success);
        run
    }
}
