mod common;

use common::{MockDriver, MockNode};
use docshot_core::protocol::{
    Action, ActionDetail, CaptureOptions, Chain, ClickRequest, FillRequest, MouseButton,
    ScreenshotRequest,
};
use docshot_core::selector::{ElementSelector, LocatorQuery, TextQuery};
use docshot_engine::dispatch::{ActionError, Dispatcher};
use docshot_engine::orchestrator::{ChainError, ChainRunner};
use std::time::Duration;
use tempfile::tempdir;
use url::Url;

const SHORT: Duration = Duration::from_millis(300);

fn base_url() -> Url {
    Url::parse("https://app.example.test").unwrap()
}

fn locator(expression: &str) -> ElementSelector {
    ElementSelector::Locator(LocatorQuery::new(expression))
}

fn click(expression: &str) -> Action {
    Action::new(ActionDetail::Click(ClickRequest {
        selector: locator(expression),
        button: MouseButton::default(),
    }))
}

fn dispatcher(output_dir: impl Into<std::path::PathBuf>) -> Dispatcher {
    Dispatcher::new(output_dir).with_resolve_timeout(SHORT)
}

#[tokio::test]
async fn documentation_chain_produces_both_screenshots() {
    let dir = tempdir().unwrap();
    let driver = MockDriver::new(vec![
        MockNode::new("signin")
            .text("Sign in")
            .bounds(5.0, 5.0, 100.0, 40.0),
    ]);
    let page = driver.page();

    let chain = Chain {
        name: "login docs".to_string(),
        url: "/login".to_string(),
        actions: vec![
            Action::new(ActionDetail::Screenshot(ScreenshotRequest {
                filename: "login.png".to_string(),
                target: None,
                padding: 20.0,
                options: CaptureOptions::default(),
            })),
            Action::new(ActionDetail::Screenshot(ScreenshotRequest {
                filename: "signin.png".to_string(),
                target: Some(ElementSelector::Text(TextQuery::exact("Sign in"))),
                padding: 25.0,
                options: CaptureOptions::default(),
            })),
        ],
    };

    let runner = ChainRunner::new(driver.clone(), page, base_url(), dispatcher(dir.path()));
    runner.run_to_completion(&chain).await.unwrap();

    assert!(dir.path().join("login.png").is_file());
    assert!(dir.path().join("signin.png").is_file());
    assert!(driver.closed());
    // The chain url is joined onto the base url for the initial navigation.
    assert!(
        driver
            .log()
            .contains(&"goto:https://app.example.test/login".to_string())
    );
}

#[tokio::test]
async fn failing_step_reports_its_note_and_aborts_the_rest() {
    let driver = MockDriver::new(vec![MockNode::new("menu").expression("#menu")]);
    let page = driver.page();

    let chain = Chain {
        name: "broken".to_string(),
        url: "/settings".to_string(),
        actions: vec![
            click("#menu").with_note("open the menu"),
            click("#missing").with_note("press the broken button"),
            Action::new(ActionDetail::Fill(FillRequest {
                selector: locator("#menu"),
                value: "never typed".to_string(),
            })),
        ],
    };

    let runner = ChainRunner::new(driver.clone(), page, base_url(), dispatcher("unused"));
    let error = runner.run_to_completion(&chain).await.unwrap_err();

    match &error {
        ChainError::Step { index, note, .. } => {
            assert_eq!(*index, 1);
            assert_eq!(note, "press the broken button");
        }
        other => panic!("expected a step error, got {other:?}"),
    }
    assert!(error.to_string().contains("press the broken button"));

    // Steps after the failing one never ran, and teardown still happened.
    let log = driver.log();
    assert!(log.contains(&"click:menu".to_string()));
    assert!(!log.iter().any(|entry| entry.starts_with("fill:")));
    assert!(driver.closed());
}

#[tokio::test]
async fn step_without_note_falls_back_to_the_action_kind() {
    let driver = MockDriver::new(vec![]);
    let page = driver.page();

    let chain = Chain {
        name: "anonymous".to_string(),
        url: "/".to_string(),
        actions: vec![click("#missing")],
    };

    let runner = ChainRunner::new(driver, page, base_url(), dispatcher("unused"));
    match runner.run_to_completion(&chain).await.unwrap_err() {
        ChainError::Step { note, .. } => assert_eq!(note, "click"),
        other => panic!("expected a step error, got {other:?}"),
    }
}

#[tokio::test]
async fn new_page_timeout_aborts_the_chain() {
    let driver = MockDriver::new(vec![MockNode::new("edit").expression("#edit")]);
    let page = driver.page();

    let chain = Chain {
        name: "tab opener".to_string(),
        url: "/deploy".to_string(),
        actions: vec![
            click("#edit")
                .opening_new_page(300)
                .with_note("open the editor tab"),
            click("#edit"),
        ],
    };

    let runner = ChainRunner::new(driver.clone(), page, base_url(), dispatcher("unused"));
    match runner.run_to_completion(&chain).await.unwrap_err() {
        ChainError::Step {
            index,
            note,
            source,
        } => {
            assert_eq!(index, 0);
            assert_eq!(note, "open the editor tab");
            assert!(matches!(source, ActionError::NewPageTimeout(_)));
        }
        other => panic!("expected a step error, got {other:?}"),
    }
    // Only the first click ran.
    assert_eq!(
        driver
            .log()
            .iter()
            .filter(|entry| entry.starts_with("click:"))
            .count(),
        1
    );
    assert!(driver.closed());
}
