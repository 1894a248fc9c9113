use super::fake_engine::{ClickEffect, FakeEngine, FakeNode, PageTemplate};
use super::{card, dashboard, init_tracing, test_config, DASHBOARD};
use crate::config::RunnerConfig;
use crate::engage::{ActivityEngager, INTERACTIVE_ELEMENTS};
use crate::engine::WebEngine;
use crate::executor::TaskOutcome;
use crate::group::{DiscoveryOutcome, GroupReport, TaskGroupRunner, TaskGroupSpec};
use crate::errors::FailureKind;
use crate::navigator::{default_overlay_queries, Navigator};
use crate::random::Dice;
use crate::status::StatusClassifier;
use crate::AutomationError;
use std::collections::HashSet;
use std::sync::Arc;

const ACTIVITY: &str = "https://activity.test/poll";

async fn run_group(
    fake: &Arc<FakeEngine>,
    config: &RunnerConfig,
    group: &TaskGroupSpec,
) -> Result<GroupReport, AutomationError> {
    let engine: Arc<dyn WebEngine> = fake.clone();
    let dice = Arc::new(Dice::new(config.seed));
    let navigator = Navigator::new(engine.clone(), config.timing.clone());
    let classifier = StatusClassifier::default();
    let engager = ActivityEngager::new(
        engine,
        config.engage.clone(),
        &config.timing,
        dice.clone(),
    );
    let runner = TaskGroupRunner::new(
        &navigator,
        &classifier,
        &engager,
        &config.dashboard_url,
        config.executor.clone(),
        dice,
    );
    runner.run(group).await
}

fn activity_page() -> PageTemplate {
    PageTemplate::new()
        .node("answer", FakeNode::new("button").text("Next"))
        .query(None, INTERACTIVE_ELEMENTS, &["answer"])
}

#[tokio::test(start_paused = true)]
async fn test_completed_and_actionable_cards() {
    init_tracing();
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![
            ("quiz", card("/quiz", "Quiz").attr("state", "complete")),
            ("poll", card("/poll", "Poll")),
        ])
        .on_click("poll", vec![ClickEffect::OpenWindow(ACTIVITY.to_string())]),
    );
    fake.set_page(ACTIVITY, activity_page());

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.discovery, DiscoveryOutcome::Tasks(2));
    assert_eq!(
        report.outcomes(),
        vec![TaskOutcome::Completed, TaskOutcome::Attempted]
    );
    assert!(report.tasks.iter().all(|t| t.state.attempts_used == 1));
    assert_eq!(fake.clicks_on("quiz"), 0);
    assert_eq!(fake.clicks_on("poll"), 1);
    // The activity page got poked at, then the spawned window went away
    assert_eq!(fake.clicks_on("answer"), 1);
    assert_eq!(fake.open_handles(), vec!["main".to_string()]);
    assert_eq!(fake.current_handle().as_deref(), Some("main"));
}

#[tokio::test(start_paused = true)]
async fn test_in_page_activity() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, dashboard(vec![("read", card("/read", "Read"))]));

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.outcomes(), vec![TaskOutcome::Attempted]);
    assert_eq!(fake.clicks_on("read"), 1);
    assert_eq!(fake.open_handles(), vec!["main".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_exhaust_attempts() {
    init_tracing();
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![("slow", card("/slow", "Slow"))]).on_click(
            "slow",
            vec![ClickEffect::Fail(AutomationError::Timeout("no response".into()))],
        ),
    );
    let config = test_config();

    let report = run_group(&fake, &config, &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    let state = &report.tasks[0].state;
    assert_eq!(state.outcome, TaskOutcome::Failed);
    assert_eq!(state.attempts_used, config.executor.max_attempts);
    assert_eq!(fake.clicks_on("slow"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_attempt_bound_is_configurable() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![("flaky", card("/flaky", "Flaky"))]).on_click(
            "flaky",
            vec![ClickEffect::Fail(AutomationError::ClickIntercepted("banner".into()))],
        ),
    );
    let mut config = test_config();
    config.executor.max_attempts = 1;

    let report = run_group(&fake, &config, &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.tasks[0].state.outcome, TaskOutcome::Failed);
    assert_eq!(report.tasks[0].state.attempts_used, 1);
    assert_eq!(fake.clicks_on("flaky"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_stale_click_is_retried_on_fresh_render() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![("poll", card("/poll", "Poll"))]).on_click(
            "poll",
            vec![
                ClickEffect::Fail(AutomationError::StaleElement("re-rendered".into())),
                ClickEffect::OpenWindow(ACTIVITY.to_string()),
            ],
        ),
    );
    fake.set_page(ACTIVITY, activity_page());

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.tasks[0].state.outcome, TaskOutcome::Attempted);
    assert_eq!(report.tasks[0].state.attempts_used, 2);
    // Each attempt starts from its own dashboard load
    let dashboard_loads = fake.navigations().iter().filter(|u| *u == DASHBOARD).count();
    assert!(dashboard_loads >= 3, "loads: {dashboard_loads}");
}

#[tokio::test(start_paused = true)]
async fn test_not_interactable_is_skipped_without_retry() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![("stuck", card("/stuck", "Stuck"))]).on_click(
            "stuck",
            vec![ClickEffect::Fail(AutomationError::ElementNotInteractable(
                "covered".into(),
            ))],
        ),
    );

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    let state = &report.tasks[0].state;
    assert_eq!(state.outcome, TaskOutcome::SkippedNotInteractable);
    assert_eq!(state.attempts_used, 1);
    assert_eq!(fake.clicks_on("stuck"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_locked_card_is_never_clicked() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![(
            "locked",
            card("/locked", "Locked").attr("aria-disabled", "true"),
        )]),
    );

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.outcomes(), vec![TaskOutcome::SkippedNotInteractable]);
    assert_eq!(report.tasks[0].state.attempts_used, 1);
    assert!(fake.clicked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_empty_group_succeeds() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, dashboard(Vec::new()));

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.discovery, DiscoveryOutcome::Empty);
    assert!(report.tasks.is_empty());
    assert!(fake.clicked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_container_succeeds() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, dashboard(Vec::new()));

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::other_activities())
        .await
        .unwrap();

    assert_eq!(report.discovery, DiscoveryOutcome::ContainerMissing);
    assert!(report.tasks.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_page_wide_fallback_finds_cards() {
    let group = TaskGroupSpec::other_activities();
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(Vec::new())
            .node("promo", card("/promo", "Promo").attr("state", "complete"))
            .query(None, group.page_fallback[0].selector.clone(), &["promo"]),
    );

    let report = run_group(&fake, &test_config(), &group).await.unwrap();

    assert_eq!(report.discovery, DiscoveryOutcome::Tasks(1));
    assert_eq!(report.outcomes(), vec![TaskOutcome::Completed]);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_failure_fails_the_group() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, dashboard(vec![("poll", card("/poll", "Poll"))]));
    let engine: Arc<dyn WebEngine> = fake.clone();
    engine.navigate(DASHBOARD).await.unwrap();
    fake.fail_navigation(DASHBOARD);

    let result = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set()).await;

    assert!(matches!(result, Err(AutomationError::Navigation(_))));
    assert!(fake.clicked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_lost_window_escalates() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![("poll", card("/poll", "Poll"))])
            .on_click("poll", vec![ClickEffect::OpenWindow(ACTIVITY.to_string())]),
    );
    fake.set_page(ACTIVITY, activity_page());
    fake.fail_switch_to("main");

    let result = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set()).await;

    assert!(matches!(result, Err(AutomationError::WindowLost(_))));
    assert_eq!(fake.clicks_on("poll"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_unenterable_window_is_closed_on_second_try() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![("poll", card("/poll", "Poll"))])
            .on_click("poll", vec![ClickEffect::OpenWindow(ACTIVITY.to_string())]),
    );
    fake.set_page(ACTIVITY, activity_page());
    fake.fail_switch_times("win-1", 1);

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.outcomes(), vec![TaskOutcome::Attempted]);
    assert_eq!(fake.clicks_on("answer"), 0);
    assert_eq!(fake.open_handles(), vec!["main".to_string()]);
    assert_eq!(fake.current_handle().as_deref(), Some("main"));
}

#[tokio::test(start_paused = true)]
async fn test_unenterable_window_is_left_behind() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        dashboard(vec![("poll", card("/poll", "Poll"))])
            .on_click("poll", vec![ClickEffect::OpenWindow(ACTIVITY.to_string())]),
    );
    fake.set_page(ACTIVITY, activity_page());
    fake.fail_switch_to("win-1");

    let report = run_group(&fake, &test_config(), &TaskGroupSpec::daily_set())
        .await
        .unwrap();

    assert_eq!(report.outcomes(), vec![TaskOutcome::Attempted]);
    assert_eq!(
        fake.open_handles(),
        vec!["main".to_string(), "win-1".to_string()]
    );
    assert_eq!(fake.current_handle().as_deref(), Some("main"));
}

#[tokio::test(start_paused = true)]
async fn test_lost_session_during_navigation_is_run_fatal() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, dashboard(Vec::new()));
    fake.lose_session_after(0);
    let navigator = Navigator::new(fake.clone(), test_config().timing);

    let err = navigator
        .goto(DASHBOARD, std::time::Duration::ZERO)
        .await
        .unwrap_err();

    assert!(matches!(err, AutomationError::WindowLost(_)));
    assert_eq!(err.failure_kind(), FailureKind::RunFatal);
}

#[tokio::test(start_paused = true)]
async fn test_ensure_on_skips_navigation_when_already_there() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, dashboard(Vec::new()));
    let navigator = Navigator::new(fake.clone(), test_config().timing);

    navigator.ensure_on(DASHBOARD).await.unwrap();
    navigator.ensure_on(DASHBOARD).await.unwrap();
    assert_eq!(fake.navigations(), vec![DASHBOARD.to_string()]);

    navigator.ensure_on(super::ACCOUNT).await.unwrap();
    assert_eq!(
        fake.navigations(),
        vec![DASHBOARD.to_string(), super::ACCOUNT.to_string()]
    );
}

fn overlay_page() -> PageTemplate {
    let overlays = default_overlay_queries();
    PageTemplate::new()
        .node("promo-close", FakeNode::new("button"))
        .node("dialog-close", FakeNode::new("button"))
        .query(None, overlays[0].selector.clone(), &["promo-close"])
        .query(None, overlays[2].selector.clone(), &["dialog-close"])
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_overlays_stops_after_first_dismissal() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, overlay_page());
    let navigator = Navigator::new(fake.clone(), test_config().timing);
    navigator.ensure_on(DASHBOARD).await.unwrap();

    assert!(navigator.dismiss_overlays().await);
    assert_eq!(fake.clicked(), vec!["promo-close".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_overlays_moves_on_when_close_fails() {
    let fake = FakeEngine::new();
    fake.set_page(
        DASHBOARD,
        overlay_page().on_click(
            "promo-close",
            vec![ClickEffect::Fail(AutomationError::ClickIntercepted("animating".into()))],
        ),
    );
    let navigator = Navigator::new(fake.clone(), test_config().timing);
    navigator.ensure_on(DASHBOARD).await.unwrap();

    assert!(navigator.dismiss_overlays().await);
    assert_eq!(
        fake.clicked(),
        vec!["promo-close".to_string(), "dialog-close".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_dismiss_overlays_without_overlay_is_noop() {
    let fake = FakeEngine::new();
    fake.set_page(DASHBOARD, dashboard(Vec::new()));
    let navigator = Navigator::new(fake.clone(), test_config().timing);
    navigator.ensure_on(DASHBOARD).await.unwrap();

    assert!(!navigator.dismiss_overlays().await);
    assert!(fake.clicked().is_empty());
}

async fn engage_on(fake: &Arc<FakeEngine>, page: PageTemplate, config: &RunnerConfig) -> crate::engage::EngageReport {
    fake.set_page(ACTIVITY, page);
    let engine: Arc<dyn WebEngine> = fake.clone();
    engine.navigate(ACTIVITY).await.unwrap();
    ActivityEngager::new(
        engine,
        config.engage.clone(),
        &config.timing,
        Arc::new(Dice::new(config.seed)),
    )
    .engage()
    .await
}

fn options_page(keys: &[&str]) -> PageTemplate {
    let mut page = PageTemplate::new().query(None, INTERACTIVE_ELEMENTS, keys);
    for key in keys {
        page = page.node(key, FakeNode::new("div").attr("class", "option"));
    }
    page
}

#[tokio::test(start_paused = true)]
async fn test_engage_clicks_at_most_sample_size() {
    let fake = FakeEngine::new();
    let keys = ["a", "b", "c", "d", "e", "f", "g", "h"];
    let mut config = test_config();
    config.engage.sample_size = 5;

    let report = engage_on(&fake, options_page(&keys), &config).await;

    assert_eq!(report.candidates, 8);
    assert_eq!(report.sampled, 5);
    assert_eq!(report.clicked, 5);
    let clicked = fake.clicked();
    assert_eq!(clicked.len(), 5);
    assert_eq!(clicked.iter().collect::<HashSet<_>>().len(), 5);
}

#[tokio::test(start_paused = true)]
async fn test_engage_skips_failing_element() {
    let fake = FakeEngine::new();
    let keys = ["first", "broken", "last"];
    let page = options_page(&keys).on_click(
        "broken",
        vec![ClickEffect::Fail(AutomationError::ElementNotInteractable("covered".into()))],
    );
    let mut config = test_config();
    config.engage.sample_size = 3;

    let report = engage_on(&fake, page, &config).await;

    assert_eq!(report.sampled, 3);
    assert_eq!(report.clicked, 2);
    for key in keys {
        assert_eq!(fake.clicks_on(key), 1, "{key}");
    }
}
