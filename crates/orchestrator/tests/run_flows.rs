//! End-to-end run flows against the scripted page double

use std::sync::Arc;
use std::time::Duration;

use app_adapters::default_registry;
use browser_adapter::testkit::{ScriptedElement, ScriptedPage};
use discovery_ladder::{DiscoveryLadder, DiscoveryService};
use heal_engine::SqliteHealHistory;
use orchestrator::{CheckpointStore, Orchestrator, RunOptions};
use readiness::{ProfileDetector, ReadinessConfig};
use run_store::RunStore;
use selector_cache::{SelectorCache, SqliteWarmTier};
use tokio_util::sync::CancellationToken;
use webpilot_core_types::{
    ActionKind, Intent, PlanStep, ProfileSetting, RcaClass, ReqId, RunRequest, StrategyKind,
    Verdict,
};

struct Harness {
    orchestrator: Orchestrator,
    _tmp: tempfile::TempDir,
}

fn harness(max_heal_rounds: u32) -> Harness {
    let tmp = tempfile::tempdir().unwrap();
    let cache = Arc::new(SelectorCache::new(
        true,
        Duration::from_secs(3600),
        Some(Box::new(SqliteWarmTier::open_in_memory().unwrap())),
        0.35,
        7,
    ));
    let discovery = Arc::new(DiscoveryService::new(
        DiscoveryLadder::new(default_registry()),
        cache,
    ));
    let readiness_config = ReadinessConfig {
        dom_idle_timeout: Duration::from_millis(50),
        quiet_window: Duration::from_millis(10),
        element_timeout: Duration::from_millis(100),
        app_ready_script: None,
    };
    let orchestrator = Orchestrator::new(
        discovery,
        default_registry(),
        Arc::new(SqliteHealHistory::open_in_memory().unwrap()),
        readiness_config,
        ProfileDetector::new(ProfileSetting::Auto)
            .with_sample_window(Duration::from_millis(10)),
        Arc::new(CheckpointStore::new(tmp.path().join("checkpoints")).unwrap()),
        Arc::new(RunStore::open_in_memory(tmp.path().join("artifacts")).unwrap()),
        RunOptions {
            max_heal_rounds,
            max_transitions: 100,
            persistent_profiles: false,
        },
    );
    Harness {
        orchestrator,
        _tmp: tmp,
    }
}

fn plan_of(intents: Vec<Intent>) -> Vec<PlanStep> {
    intents.into_iter().map(PlanStep::new).collect()
}

fn wikipedia() -> ScriptedPage {
    ScriptedPage::new("https://en.wikipedia.org")
        .with_skeleton("html|body|form|input!search|button#searchButton")
        .with_elements(vec![
            ScriptedElement::new("input[name=\"search\"]", "input")
                .aria_label("Search Wikipedia")
                .name("search")
                .placeholder("Search Wikipedia")
                .role("searchbox"),
        ])
}

#[tokio::test]
async fn static_search_passes_without_heals() {
    let h = harness(3);
    let page = wikipedia();
    let request = RunRequest::new(
        "https://en.wikipedia.org",
        vec![
            Intent::new("Search Wikipedia", ActionKind::Fill)
                .with_value("Artificial Intelligence"),
            Intent::new("Search Wikipedia", ActionKind::Press).with_value("Enter"),
        ],
    )
    .with_req_id(ReqId::from("static-search"));
    let plan = plan_of(request.intents.clone());

    let record = h
        .orchestrator
        .run(&page, &request, plan, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.verdict, Verdict::Pass);
    assert_eq!(record.verdict.exit_code(), 0);
    assert_eq!(record.steps_executed, 2);
    assert_eq!(record.heal_rounds, 0);
    assert_eq!(record.steps[0].strategy, Some(StrategyKind::AriaLabel));
}

#[tokio::test]
async fn ordinal_click_resolves_positionally() {
    let h = harness(3);
    let page = ScriptedPage::new("https://youtube.com/results")
        .with_skeleton("html|body|input!q|a|a|a")
        .with_elements(vec![
            ScriptedElement::new("input[name=\"q\"]", "input")
                .aria_label("Search")
                .name("q")
                .role("searchbox"),
            ScriptedElement::new("#v1", "a").id("v1").role("link").accessible_name("Result 1"),
            ScriptedElement::new("#v2", "a").id("v2").role("link").accessible_name("Result 2"),
        ]);
    let request = RunRequest::new(
        "https://youtube.com/results",
        vec![
            Intent::new("Search", ActionKind::Fill).with_value("python playwright"),
            Intent::new("Search", ActionKind::Press).with_value("Enter"),
            Intent::new("First Video", ActionKind::Click).with_ordinal(0),
        ],
    )
    .with_req_id(ReqId::from("ordinal-run"));
    let plan = plan_of(request.intents.clone());

    let record = h
        .orchestrator
        .run(&page, &request, plan, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.verdict, Verdict::Pass);
    assert_eq!(record.steps[2].selector.as_deref(), Some("role=link >> nth=0"));
    assert_eq!(record.steps[2].strategy, Some(StrategyKind::Ordinal));
}

#[tokio::test]
async fn blocked_page_short_circuits_with_forensics() {
    let h = harness(3);
    let page = ScriptedPage::new("https://example.org/login?chal_t=xyz")
        .with_body_text("Please complete the security check");
    let request = RunRequest::new(
        "https://example.org/login?chal_t=xyz",
        vec![
            Intent::new("User", ActionKind::Fill).with_value("alice"),
            Intent::new("Submit", ActionKind::Click),
        ],
    )
    .with_req_id(ReqId::from("blocked-run"));
    let plan = plan_of(request.intents.clone());

    let record = h
        .orchestrator
        .run(&page, &request, plan, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.verdict, Verdict::Blocked);
    assert_eq!(record.verdict.exit_code(), 2);
    assert_eq!(record.rca_class, RcaClass::Blocked);
    assert_eq!(record.steps_executed, 0);
    // Screenshot plus HTML snapshot, on top of the generated script.
    let kinds: Vec<&str> = record.artifacts.iter().map(|a| a.kind.name()).collect();
    assert!(kinds.contains(&"screenshot"));
    assert!(kinds.contains(&"html_snapshot"));
}

#[tokio::test]
async fn drifted_selector_heals_in_one_round() {
    let h = harness(3);
    let page = ScriptedPage::new("https://app.example.org/opp")
        .with_skeleton("html|body|form|input!Amount")
        .with_elements(vec![
            ScriptedElement::new("input[name=\"Amount\"]", "input").name("Amount"),
        ]);

    // The plan still carries a selector from an earlier session that no
    // longer exists on the page.
    let request = RunRequest::new(
        "https://app.example.org/opp",
        vec![Intent::new("Amount", ActionKind::Fill).with_value("100000")],
    )
    .with_req_id(ReqId::from("healed-drift"));
    let mut plan = plan_of(request.intents.clone());
    plan[0].selector = Some("#input-339".to_string());
    plan[0].strategy = Some(StrategyKind::LabelFor);
    plan[0].stable = true;

    let record = h
        .orchestrator
        .run(&page, &request, plan, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.verdict, Verdict::Pass);
    assert_eq!(record.heal_rounds, 1);
    assert_eq!(record.steps[0].selector.as_deref(), Some("[name=\"Amount\"]"));
    assert_eq!(record.steps[0].strategy, Some(StrategyKind::NameAttr));
}

#[tokio::test]
async fn missing_element_exhausts_heals_and_fails_as_drift() {
    let h = harness(3);
    let page = ScriptedPage::new("https://example.org").with_skeleton("html|body");
    let request = RunRequest::new(
        "https://example.org",
        vec![Intent::new("Phantom Field", ActionKind::Fill).with_value("x")],
    )
    .with_req_id(ReqId::from("exhausted-run"));
    let plan = plan_of(request.intents.clone());

    let record = h
        .orchestrator
        .run(&page, &request, plan, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.verdict, Verdict::Fail);
    assert_eq!(record.verdict.exit_code(), 1);
    assert_eq!(record.rca_class, RcaClass::SelectorDrift);
    assert_eq!(record.steps_executed, 0);
}

#[tokio::test]
async fn zero_heal_rounds_fails_immediately() {
    let h = harness(0);
    let page = ScriptedPage::new("https://example.org").with_skeleton("html|body");
    let request = RunRequest::new(
        "https://example.org",
        vec![Intent::new("Phantom Field", ActionKind::Fill).with_value("x")],
    )
    .with_req_id(ReqId::from("no-heal-run"));
    let plan = plan_of(request.intents.clone());

    let record = h
        .orchestrator
        .run(&page, &request, plan, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.verdict, Verdict::Fail);
    assert_eq!(record.heal_rounds, 0);
}

#[tokio::test]
async fn select_routes_through_the_autocomplete_adapter() {
    let h = harness(3);
    let page = ScriptedPage::new("https://acme.lightning.force.com/opportunity/new")
        .with_skeleton("html|body|form|input!Amount|combobox")
        .with_elements(vec![
            ScriptedElement::new("input[name=\"Amount\"]", "input").name("Amount"),
            ScriptedElement::new("#stage-combo", "input")
                .id("stage-combo")
                .role("combobox")
                .aria_label("Stage"),
        ]);
    let request = RunRequest::new(
        "https://acme.lightning.force.com/opportunity/new",
        vec![
            Intent::new("Amount", ActionKind::Fill).with_value("100000"),
            Intent::new("Stage", ActionKind::Select).with_value("Prospecting"),
        ],
    )
    .with_req_id(ReqId::from("sf-form"));
    let plan = plan_of(request.intents.clone());

    let record = h
        .orchestrator
        .run(&page, &request, plan, CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(record.verdict, Verdict::Pass);
    assert_eq!(record.steps[0].strategy, Some(StrategyKind::NameAttr));
    assert_eq!(
        record.steps[1].strategy,
        Some(StrategyKind::AppAdapter("autocomplete_first_option".to_string()))
    );
}
