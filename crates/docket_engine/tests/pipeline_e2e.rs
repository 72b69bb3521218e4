mod common;

use std::fs;

use common::{case, pdf_bytes, test_config, FakeAutomation, MemoryCaseStore, PORTAL};
use docket_core::{PortalRoutes, PLACEHOLDER_PAGE, REJECTED_FLAG};
use docket_engine::{AutomationError, EngineError, Notifier, Pipeline};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn listing_url(court: &str, pacer_id: &str) -> String {
    format!("{PORTAL}/ir-documentselect/{court}_{pacer_id}/1.00000")
}

fn anchor_page(href: &str) -> String {
    format!(
        "<html><body><ul class=\"docs\"><li><a id=\"download\" href=\"{href}\">Download all</a></li></ul></body></html>"
    )
}

const NO_LINK_PAGE: &str = "<html><body><p>Documents are restricted.</p></body></html>";

#[tokio::test]
async fn mixed_run_downloads_rejects_and_skips() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    fs::create_dir_all(&config.paths.documents_dir).unwrap();
    fs::write(
        config.paths.documents_dir.join("nysb-24-10003.pdf"),
        pdf_bytes(),
    )
    .unwrap();

    let automation = FakeAutomation::new()
        .with_listing(listing_url("nysb", "10001"), anchor_page("/files/10001/combined.pdf"))
        .with_listing(listing_url("nysb", "10002"), NO_LINK_PAGE)
        .with_download(format!("{PORTAL}/files/10001/combined.pdf"), pdf_bytes());
    let store = MemoryCaseStore::new(vec![
        case("nysb", "10001", "nysb-24-10001"),
        case("nysb", "10002", "nysb-24-10002"),
        case("nysb", "10003", "nysb-24-10003"),
    ]);

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.scraped, 2);
    assert_eq!(summary.downloaded, 1);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(
        summary.to_string(),
        "Success: 1, Rejected: 1, Skipped: 1, Failed: 0 (scraped 2, placeholders 0)"
    );

    let stored = config.paths.documents_dir.join("nysb-24-10001.pdf");
    assert_eq!(fs::read(&stored).unwrap(), pdf_bytes());
    assert_eq!(store.get("nysb-24-10002").unwrap().flag_misc, REJECTED_FLAG);
    assert_eq!(store.get("nysb-24-10001").unwrap().flag_misc, 0);

    let fetched = automation.fetched();
    assert!(!fetched.iter().any(|url| url.contains("10003")));
    assert!(!automation.navigated().iter().any(|url| url.contains("10003")));

    // Listings stay behind for the next run.
    assert!(config.paths.output_dir.join("nysb-24-10001.html").exists());
    assert!(config.paths.output_dir.join("nysb-24-10002.html").exists());
    assert_eq!(automation.closed(), 1);
}

#[tokio::test]
async fn second_run_touches_nothing_already_stored() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let automation = FakeAutomation::new()
        .with_listing(listing_url("nysb", "10001"), anchor_page("/files/10001/combined.pdf"))
        .with_download(format!("{PORTAL}/files/10001/combined.pdf"), pdf_bytes());
    let store = MemoryCaseStore::new(vec![case("nysb", "10001", "nysb-24-10001")]);

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let first = pipeline.run().await.unwrap();
    assert_eq!(first.downloaded, 1);
    let fetches_after_first = automation.fetched().len();
    let navigations_after_first = automation.navigated().len();

    let second = pipeline.run().await.unwrap();
    assert_eq!(second.downloaded, 0);
    assert_eq!(second.scraped, 0);
    // Seen by both phases, counted once.
    assert_eq!(second.skipped, 1);
    assert_eq!(automation.fetched().len(), fetches_after_first);
    assert_eq!(automation.navigated().len(), navigations_after_first);
}

#[tokio::test]
async fn placeholder_listing_is_counted_and_not_saved() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let automation =
        FakeAutomation::new().with_listing(listing_url("nysb", "10001"), PLACEHOLDER_PAGE);
    let store = MemoryCaseStore::new(vec![case("nysb", "10001", "nysb-24-10001")]);

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.scraped, 1);
    assert_eq!(summary.placeholders, 1);
    assert_eq!(summary.rejected, 0);
    assert!(!config.paths.output_dir.join("nysb-24-10001.html").exists());
    assert_eq!(store.get("nysb-24-10001").unwrap().flag_misc, 0);
}

#[tokio::test]
async fn transport_failure_aborts_but_earlier_rejection_stands() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let automation = FakeAutomation::new()
        .with_listing(listing_url("nysb", "10001"), NO_LINK_PAGE)
        .with_listing(listing_url("nysb", "10002"), anchor_page("/files/10002/combined.pdf"))
        .with_navigation_error(
            format!("{PORTAL}/files/10002/combined.pdf"),
            AutomationError::Transport("browser disconnected".into()),
        );
    let store = MemoryCaseStore::new(vec![
        case("nysb", "10001", "nysb-24-10001"),
        case("nysb", "10002", "nysb-24-10002"),
    ]);

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, EngineError::Fatal(AutomationError::Transport(_))));
    assert_eq!(store.get("nysb-24-10001").unwrap().flag_misc, REJECTED_FLAG);
    assert_eq!(automation.closed(), 1);
}

#[tokio::test]
async fn transport_failure_while_scraping_stops_the_run() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let automation = FakeAutomation::new().with_listing_error(
        listing_url("nysb", "10001"),
        AutomationError::Transport("connection reset".into()),
    );
    let store = MemoryCaseStore::new(vec![
        case("nysb", "10001", "nysb-24-10001"),
        case("nysb", "10002", "nysb-24-10002"),
    ]);

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, EngineError::Fatal(_)));
    assert_eq!(automation.fetched().len(), 1);
}

#[tokio::test]
async fn case_local_failures_do_not_stop_the_run() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let automation = FakeAutomation::new()
        .with_listing_error(listing_url("nysb", "10001"), AutomationError::HttpStatus(500))
        .with_listing(listing_url("nysb", "10002"), anchor_page("/files/10002/combined.pdf"))
        .with_listing(listing_url("nysb", "10003"), anchor_page("/files/10003/combined.pdf"))
        .with_download(format!("{PORTAL}/files/10002/combined.pdf"), b"<html>denied</html>".to_vec())
        .with_download(format!("{PORTAL}/files/10003/combined.pdf"), pdf_bytes());
    let store = MemoryCaseStore::new(vec![
        case("nysb", "10001", "nysb-24-10001"),
        case("nysb", "10002", "nysb-24-10002"),
        case("nysb", "10003", "nysb-24-10003"),
    ]);

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.scraped, 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.downloaded, 1);
    assert!(!config.paths.documents_dir.join("nysb-24-10002.pdf").exists());
    assert!(config.paths.documents_dir.join("nysb-24-10003.pdf").exists());
}

#[tokio::test]
async fn listing_without_selected_case_is_left_alone() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    fs::create_dir_all(&config.paths.output_dir).unwrap();
    fs::write(
        config.paths.output_dir.join("nysb-23-09999.html"),
        anchor_page("/files/09999/combined.pdf"),
    )
    .unwrap();
    let automation = FakeAutomation::new();
    let store = MemoryCaseStore::new(Vec::new());

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.downloaded + summary.rejected + summary.failed, 0);
    assert!(automation.navigated().is_empty());
    assert!(config.paths.output_dir.join("nysb-23-09999.html").exists());
}

#[tokio::test]
async fn fresh_listings_clears_leftovers() {
    let temp = TempDir::new().unwrap();
    let mut config = test_config(temp.path());
    config.paths.fresh_listings = true;
    fs::create_dir_all(&config.paths.output_dir).unwrap();
    fs::write(config.paths.output_dir.join("nysb-23-09999.html"), NO_LINK_PAGE).unwrap();
    let automation = FakeAutomation::new();
    let store = MemoryCaseStore::new(Vec::new());

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    pipeline.run().await.unwrap();

    assert!(!config.paths.output_dir.join("nysb-23-09999.html").exists());
    assert!(config.paths.output_dir.is_dir());
}

#[tokio::test]
async fn store_failure_while_rejecting_is_not_fatal() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let automation =
        FakeAutomation::new().with_listing(listing_url("nysb", "10001"), NO_LINK_PAGE);
    let store = MemoryCaseStore::new(vec![case("nysb", "10001", "nysb-24-10001")]).failing_marks();

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let summary = pipeline.run().await.unwrap();

    assert_eq!(summary.rejected, 1);
    assert_eq!(store.get("nysb-24-10001").unwrap().flag_misc, 0);
}

#[tokio::test]
async fn rejected_login_is_run_fatal() {
    let temp = TempDir::new().unwrap();
    let config = test_config(temp.path());
    let automation = FakeAutomation::new().reject_login(AutomationError::LoginRejected);
    let store = MemoryCaseStore::new(vec![case("nysb", "10001", "nysb-24-10001")]);

    let pipeline =
        Pipeline::new(&config, &automation, &store, Notifier::local_only("test")).unwrap();
    let err = pipeline.run().await.unwrap_err();

    assert!(matches!(err, EngineError::Login(AutomationError::LoginRejected)));
    assert!(automation.fetched().is_empty());
}

#[test]
fn listing_urls_match_portal_routes() {
    let routes = PortalRoutes::parse(PORTAL).unwrap();
    let case = case("nysb", "10001", "nysb-24-10001");
    assert_eq!(routes.listing(&case).as_str(), listing_url("nysb", "10001"));
}
