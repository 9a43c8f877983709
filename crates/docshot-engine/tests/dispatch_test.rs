mod common;

use common::{MockDriver, MockNode};
use docshot_core::geometry::ClipRect;
use docshot_core::protocol::{
    Action, ActionDetail, CaptureOptions, ClickRequest, DragRequest, FillRequest, MouseButton,
    ScreenshotRequest,
};
use docshot_core::selector::{ElementSelector, LocatorQuery};
use docshot_engine::dispatch::{ActionError, Dispatcher};
use docshot_engine::driver::Page as _;
use std::time::Duration;
use tempfile::tempdir;

const SHORT: Duration = Duration::from_millis(300);

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
async fn click_resolves_and_dispatches() {
    let driver = MockDriver::new(vec![MockNode::new("btn").expression("#go")]);
    let page = driver.page();

    let next = dispatcher("unused")
        .execute(&driver, &page, &click("#go"))
        .await
        .unwrap();

    assert!(next.is_same(&page));
    assert_eq!(driver.log(), vec!["click:btn"]);
}

#[tokio::test]
async fn fill_passes_the_value_through() {
    let driver = MockDriver::new(vec![MockNode::new("name").expression("input#name")]);
    let page = driver.page();

    let action = Action::new(ActionDetail::Fill(FillRequest {
        selector: locator("input#name"),
        value: "Name for test pipeline".to_string(),
    }));
    dispatcher("unused")
        .execute(&driver, &page, &action)
        .await
        .unwrap();

    assert_eq!(driver.log(), vec!["fill:name=Name for test pipeline"]);
}

#[tokio::test]
async fn drag_and_drop_resolves_from_then_to() {
    let driver = MockDriver::new(vec![
        MockNode::new("card").expression("#card"),
        MockNode::new("board").expression("#board"),
    ]);
    let page = driver.page();

    let action = Action::new(ActionDetail::DragAndDrop(DragRequest {
        from: locator("#card"),
        to: locator("#board"),
    }));
    dispatcher("unused")
        .execute(&driver, &page, &action)
        .await
        .unwrap();

    assert_eq!(driver.log(), vec!["drag:card->board"]);
}

#[tokio::test]
async fn failing_selector_surfaces_as_selector_error() {
    let driver = MockDriver::new(vec![]);
    let page = driver.page();

    let result = dispatcher("unused")
        .execute(&driver, &page, &click("#missing"))
        .await;

    assert!(matches!(result, Err(ActionError::Selector(_))));
    assert!(driver.log().is_empty());
}

#[tokio::test]
async fn full_page_screenshot_writes_the_file() {
    let dir = tempdir().unwrap();
    let driver = MockDriver::new(vec![]);
    let page = driver.page();

    let action = Action::new(ActionDetail::Screenshot(ScreenshotRequest {
        filename: "login.png".to_string(),
        target: None,
        padding: 20.0,
        options: CaptureOptions::default(),
    }));
    dispatcher(dir.path())
        .execute(&driver, &page, &action)
        .await
        .unwrap();

    let captures = driver.captures();
    assert_eq!(captures.len(), 1);
    assert!(captures[0].full_page);
    assert!(captures[0].clip.is_none());
    assert!(dir.path().join("login.png").is_file());
}

#[tokio::test]
async fn element_screenshot_clamps_the_clip_at_the_origin() {
    let dir = tempdir().unwrap();
    let driver = MockDriver::new(vec![
        MockNode::new("hero")
            .expression("#hero")
            .bounds(5.0, 5.0, 100.0, 40.0),
    ]);
    let page = driver.page();

    let action = Action::new(ActionDetail::Screenshot(ScreenshotRequest {
        filename: "shots/hero.png".to_string(),
        target: Some(locator("#hero")),
        padding: 20.0,
        options: CaptureOptions::default(),
    }));
    dispatcher(dir.path())
        .execute(&driver, &page, &action)
        .await
        .unwrap();

    let captures = driver.captures();
    assert_eq!(captures.len(), 1);
    assert!(!captures[0].full_page);
    assert_eq!(
        captures[0].clip,
        Some(ClipRect {
            x: 0.0,
            y: 0.0,
            width: 140.0,
            height: 80.0,
        })
    );
    // Subdirectory segments in the filename are created on demand.
    assert!(dir.path().join("shots/hero.png").is_file());
}

#[tokio::test]
async fn explicit_clip_override_wins_over_the_padded_box() {
    let dir = tempdir().unwrap();
    let driver = MockDriver::new(vec![
        MockNode::new("hero")
            .expression("#hero")
            .bounds(50.0, 50.0, 100.0, 40.0),
    ]);
    let page = driver.page();

    let wanted = ClipRect {
        x: 1.0,
        y: 2.0,
        width: 3.0,
        height: 4.0,
    };
    let action = Action::new(ActionDetail::Screenshot(ScreenshotRequest {
        filename: "hero.png".to_string(),
        target: Some(locator("#hero")),
        padding: 20.0,
        options: CaptureOptions {
            clip: Some(wanted),
            ..Default::default()
        },
    }));
    dispatcher(dir.path())
        .execute(&driver, &page, &action)
        .await
        .unwrap();

    assert_eq!(driver.captures()[0].clip, Some(wanted));
}

#[tokio::test]
async fn new_page_handoff_switches_the_active_page() {
    let driver = MockDriver::new(vec![MockNode::new("edit").expression("#edit")]);
    driver
        .state
        .lock()
        .unwrap()
        .pending_pages
        .push((1, "page-1".to_string()));
    let page = driver.page();

    let action = click("#edit").opening_new_page(1_000);
    let next = dispatcher("unused")
        .execute(&driver, &page, &action)
        .await
        .unwrap();

    assert!(!next.is_same(&page));
    assert_eq!(next.id, "page-1");
}

#[tokio::test]
async fn missing_new_page_times_out() {
    let driver = MockDriver::new(vec![MockNode::new("edit").expression("#edit")]);
    let page = driver.page();

    let action = click("#edit").opening_new_page(300);
    let result = dispatcher("unused").execute(&driver, &page, &action).await;

    assert!(matches!(result, Err(ActionError::NewPageTimeout(_))));
    // The interaction itself still ran before the wait gave up.
    assert_eq!(driver.log(), vec!["click:edit"]);
}
