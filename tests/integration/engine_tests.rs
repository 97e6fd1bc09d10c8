//! Integration tests for the crawl task engine
//!
//! These tests use wiremock to create mock HTTP servers and drive the
//! orchestrator end-to-end against an on-disk SQLite database.

use siteprobe::config::Config;
use siteprobe::crawler::{
    build_http_client, CrawlWorker, Orchestrator, SkipReason, TaskRegistry, INTERRUPTED_MESSAGE,
};
use siteprobe::state::ResourceStatus;
use siteprobe::storage::{
    BrokenLink, HeadingRecord, LinkCounts, LinkRecord, NewHeading, NewLink, ResourceRecord,
    SharedStorage, SqliteStorage, Storage, StorageError, StorageResult,
};
use siteprobe::url::resolve_href;
use siteprobe::ResourceId;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

fn test_config(max_concurrent_tasks: u32) -> Config {
    let mut config = Config::default();
    config.engine.max_concurrent_tasks = max_concurrent_tasks;
    config.http.request_timeout_secs = 5;
    config.http.connect_timeout_secs = 2;
    config
}

fn create_orchestrator(dir: &TempDir, max_concurrent_tasks: u32) -> Orchestrator<SqliteStorage> {
    let storage = SqliteStorage::new(&dir.path().join("engine.db")).unwrap();
    Orchestrator::new(
        SharedStorage::new(storage),
        &test_config(max_concurrent_tasks),
    )
    .unwrap()
}

fn add<S: Storage + 'static>(orch: &Orchestrator<S>, url: &str) -> ResourceId {
    orch.storage().with(|s| s.insert_resource(1, url)).unwrap()
}

fn record<S: Storage + 'static>(orch: &Orchestrator<S>, id: ResourceId) -> ResourceRecord {
    orch.storage().with(|s| s.get_resource(id)).unwrap()
}

async fn settle<S: Storage + 'static>(orch: &Orchestrator<S>) {
    tokio::time::timeout(SETTLE_TIMEOUT, orch.wait_idle())
        .await
        .expect("tasks did not settle in time");
}

async fn serve_page(server: &MockServer, route: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn serve_status(server: &MockServer, route: &str, status: u16) {
    Mock::given(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

async fn slow_server(delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(delay))
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_rerun_replaces_headings_and_links() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/page",
        r#"<h1>One</h1><h2>Two</h2><a href="/ok">a</a><a href="/ok#frag">b</a>"#,
    )
    .await;
    serve_status(&server, "/ok", 200).await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, &format!("{}/page", server.uri()));

    let mut counts = Vec::new();
    for _ in 0..2 {
        assert_eq!(orch.start_batch(&[id]).started, vec![id]);
        settle(&orch).await;
        assert_eq!(record(&orch, id).status, ResourceStatus::Done);

        let headings = orch.storage().with(|s| s.list_headings(id)).unwrap().len();
        let links = orch.storage().with(|s| s.list_links(id)).unwrap().len();
        counts.push((headings, links));
    }

    assert_eq!(counts, vec![(2, 2), (2, 2)]);
}

#[tokio::test]
async fn test_every_task_reaches_a_terminal_status() {
    let server = MockServer::start().await;
    serve_page(&server, "/good", "<html><title>Good</title></html>").await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("<title>Gone</title>"))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 2);
    let good = add(&orch, &format!("{}/good", server.uri()));
    let gone = add(&orch, &format!("{}/gone", server.uri()));
    let dead = add(&orch, "http://127.0.0.1:1/");

    let outcome = orch.start_batch(&[good, gone, dead]);
    assert_eq!(outcome.started.len(), 3);
    settle(&orch).await;

    assert_eq!(record(&orch, good).status, ResourceStatus::Done);
    assert_eq!(record(&orch, gone).status, ResourceStatus::Done);
    assert_eq!(record(&orch, gone).title, "Gone");

    let failed = record(&orch, dead);
    assert_eq!(failed.status, ResourceStatus::Error);
    assert!(failed.error_message.is_some());

    for id in [good, gone, dead] {
        assert!(record(&orch, id).status.is_terminal());
    }
    assert!(orch.active_tasks().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_accept_exactly_once() {
    let server = slow_server(Duration::from_secs(30)).await;
    let dir = TempDir::new().unwrap();
    let orch = Arc::new(create_orchestrator(&dir, 64));

    let ids: Vec<ResourceId> = (0..20).map(|_| add(&*orch, &server.uri())).collect();

    for &id in &ids {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let orch = Arc::clone(&orch);
                tokio::spawn(async move { orch.start_batch(&[id]) })
            })
            .collect();

        let mut started = 0;
        for handle in handles {
            let outcome = handle.await.unwrap();
            started += outcome.started.len();
            if let Some(reason) = outcome.skipped.get(&id) {
                assert!(matches!(
                    reason,
                    SkipReason::AlreadyProcessing | SkipReason::AlreadyBeingProcessed
                ));
            }
        }
        assert_eq!(started, 1, "resource {} accepted more than once", id);
    }

    assert_eq!(orch.active_tasks().len(), ids.len());
    orch.stop_all();
    settle(&*orch).await;
}

#[tokio::test]
async fn test_sequential_double_start() {
    let server = slow_server(Duration::from_secs(30)).await;
    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, &server.uri());

    let first = orch.start_batch(&[id]);
    let second = orch.start_batch(&[id]);

    assert_eq!(first.started, vec![id]);
    assert!(second.started.is_empty());
    assert_eq!(second.skipped.get(&id), Some(&SkipReason::AlreadyProcessing));

    orch.stop_all();
    settle(&orch).await;
}

#[test]
fn test_link_resolution_and_classification() {
    let page = url::Url::parse("http://a.example/page").unwrap();

    let internal = resolve_href(&page, "/x");
    assert_eq!(internal.address, "http://a.example/x");
    assert!(internal.is_internal);

    let external = resolve_href(&page, "http://b.example/y");
    assert_eq!(external.address, "http://b.example/y");
    assert!(!external.is_internal);
}

#[tokio::test]
async fn test_links_classified_against_page_host() {
    let site = MockServer::start().await;
    let other = MockServer::start().await;
    serve_status(&site, "/x", 200).await;
    serve_status(&other, "/y", 200).await;
    let body = format!(r#"<a href="/x">in</a><a href="{}/y">out</a>"#, other.uri());
    serve_page(&site, "/page", &body).await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, &format!("{}/page", site.uri()));

    orch.start_batch(&[id]);
    settle(&orch).await;

    let links = orch.storage().with(|s| s.list_links(id)).unwrap();
    assert_eq!(links.len(), 2);
    assert_eq!(links[0].href, format!("{}/x", site.uri()));
    assert!(links[0].is_internal);
    assert_eq!(links[1].href, format!("{}/y", other.uri()));
    assert!(!links[1].is_internal);

    let counts = orch.storage().with(|s| s.link_counts(id)).unwrap();
    assert_eq!(counts, LinkCounts { internal: 1, external: 1 });
}

#[tokio::test]
async fn test_broken_link_accounting() {
    let server = MockServer::start().await;
    serve_status(&server, "/ok", 200).await;
    serve_status(&server, "/missing", 404).await;
    serve_page(
        &server,
        "/page",
        r#"<a href="/ok">ok</a><a href="/missing">missing</a><a href="http://127.0.0.1:1/down">down</a>"#,
    )
    .await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, &format!("{}/page", server.uri()));

    orch.start_batch(&[id]);
    settle(&orch).await;
    assert_eq!(record(&orch, id).status, ResourceStatus::Done);

    let links = orch.storage().with(|s| s.list_links(id)).unwrap();
    let by_suffix = |suffix: &str| -> LinkRecord {
        links
            .iter()
            .find(|l| l.href.ends_with(suffix))
            .cloned()
            .unwrap()
    };

    let ok = by_suffix("/ok");
    assert_eq!((ok.status_code, ok.is_broken), (200, false));
    let missing = by_suffix("/missing");
    assert_eq!((missing.status_code, missing.is_broken), (404, true));
    let down = by_suffix("/down");
    assert_eq!((down.status_code, down.is_broken), (0, true));

    let broken = orch.storage().with(|s| s.broken_links(id)).unwrap();
    assert_eq!(broken.len(), 2);
}

#[tokio::test]
async fn test_heading_extraction() {
    let server = MockServer::start().await;
    serve_page(&server, "/page", "<h1>Title</h1><h2></h2><h3>  Sub  </h3>").await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, &format!("{}/page", server.uri()));

    orch.start_batch(&[id]);
    settle(&orch).await;

    let headings: Vec<(String, String)> = orch
        .storage()
        .with(|s| s.list_headings(id))
        .unwrap()
        .into_iter()
        .map(|h| (h.tag, h.text))
        .collect();
    assert_eq!(
        headings,
        vec![
            ("h1".to_string(), "Title".to_string()),
            ("h3".to_string(), "Sub".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_version_detection_is_stored() {
    let server = MockServer::start().await;
    serve_page(&server, "/html5", "<!doctype HTML><html></html>").await;
    serve_page(
        &server,
        "/xhtml",
        r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Strict//EN" "x.dtd"><html></html>"#,
    )
    .await;
    serve_page(&server, "/plain", "<html><body>hi</body></html>").await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let html5 = add(&orch, &format!("{}/html5", server.uri()));
    let xhtml = add(&orch, &format!("{}/xhtml", server.uri()));
    let plain = add(&orch, &format!("{}/plain", server.uri()));

    orch.start_batch(&[html5, xhtml, plain]);
    settle(&orch).await;

    assert_eq!(record(&orch, html5).html_version, "HTML5");
    assert_eq!(record(&orch, xhtml).html_version, "XHTML 1.0");
    assert_eq!(record(&orch, plain).html_version, "Unknown");
}

#[tokio::test]
async fn test_stop_during_fetch_settles_on_stopped() {
    let server = slow_server(Duration::from_secs(30)).await;
    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, &server.uri());

    orch.start_batch(&[id]);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let outcome = orch.stop_batch(&[id]);
    assert_eq!(outcome.stopped, vec![id]);

    settle(&orch).await;
    let stopped = record(&orch, id);
    assert_eq!(stopped.status, ResourceStatus::Stopped);
    assert!(orch.active_tasks().is_empty());

    let again = orch.stop_batch(&[id]);
    assert_eq!(
        again.skipped.get(&id),
        Some(&SkipReason::NotInProcessingState)
    );
}

#[tokio::test]
async fn test_stop_during_link_checks_settles_on_stopped() {
    let server = MockServer::start().await;
    Mock::given(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(30)))
        .mount(&server)
        .await;
    serve_page(&server, "/page", r#"<h1>Kept?</h1><a href="/slow">slow</a>"#).await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, &format!("{}/page", server.uri()));

    orch.start_batch(&[id]);
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(orch.stop_batch(&[id]).stopped, vec![id]);

    settle(&orch).await;
    assert_eq!(record(&orch, id).status, ResourceStatus::Stopped);
}

#[tokio::test]
async fn test_concurrency_is_bounded() {
    let server = slow_server(Duration::from_secs(30)).await;
    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 2);
    let ids: Vec<ResourceId> = (0..5).map(|_| add(&orch, &server.uri())).collect();

    let outcome = orch.start_batch(&ids);
    assert_eq!(outcome.started.len(), 5);
    tokio::time::sleep(Duration::from_millis(500)).await;

    let received = server.received_requests().await.unwrap_or_default();
    assert_eq!(received.len(), 2);
    for &id in &ids {
        assert_eq!(record(&orch, id).status, ResourceStatus::Processing);
    }

    let stopped = orch.stop_all();
    assert_eq!(stopped.stopped.len(), 5);
    settle(&orch).await;
    for &id in &ids {
        assert_eq!(record(&orch, id).status, ResourceStatus::Stopped);
    }
}

#[tokio::test]
async fn test_recover_interrupted_after_restart() {
    let dir = TempDir::new().unwrap();
    let db = dir.path().join("engine.db");

    let (stale, finished) = {
        let mut storage = SqliteStorage::new(&db).unwrap();
        let stale = storage.insert_resource(1, "http://a.example/").unwrap();
        let finished = storage.insert_resource(1, "http://b.example/").unwrap();
        storage
            .update_status(stale, ResourceStatus::Processing)
            .unwrap();
        storage.update_status(finished, ResourceStatus::Done).unwrap();
        (stale, finished)
    };

    let orch = create_orchestrator(&dir, 4);
    assert_eq!(orch.recover_interrupted().unwrap(), vec![stale]);

    let recovered = record(&orch, stale);
    assert_eq!(recovered.status, ResourceStatus::Error);
    assert_eq!(recovered.error_message.as_deref(), Some(INTERRUPTED_MESSAGE));
    assert_eq!(record(&orch, finished).status, ResourceStatus::Done);
    assert!(orch.recover_interrupted().unwrap().is_empty());
}

/// Storage that rejects selected writes and forwards everything else
struct FlakyStorage {
    inner: SqliteStorage,
    reject_links_containing: Option<String>,
    reject_processing: bool,
}

impl FlakyStorage {
    fn new() -> Self {
        Self {
            inner: SqliteStorage::open_in_memory().unwrap(),
            reject_links_containing: None,
            reject_processing: false,
        }
    }
}

impl Storage for FlakyStorage {
    fn insert_resource(&mut self, user_id: i64, url: &str) -> StorageResult<ResourceId> {
        self.inner.insert_resource(user_id, url)
    }

    fn get_resource(&self, id: ResourceId) -> StorageResult<ResourceRecord> {
        self.inner.get_resource(id)
    }

    fn list_all_resources(&self) -> StorageResult<Vec<ResourceRecord>> {
        self.inner.list_all_resources()
    }

    fn list_resources_by_status(
        &self,
        status: ResourceStatus,
    ) -> StorageResult<Vec<ResourceRecord>> {
        self.inner.list_resources_by_status(status)
    }

    fn update_resource_full(&mut self, record: &ResourceRecord) -> StorageResult<()> {
        self.inner.update_resource_full(record)
    }

    fn update_status(&mut self, id: ResourceId, status: ResourceStatus) -> StorageResult<()> {
        if self.reject_processing && status == ResourceStatus::Processing {
            return Err(StorageError::Database("status write rejected".to_string()));
        }
        self.inner.update_status(id, status)
    }

    fn update_status_with_error(
        &mut self,
        id: ResourceId,
        status: ResourceStatus,
        message: &str,
    ) -> StorageResult<()> {
        self.inner.update_status_with_error(id, status, message)
    }

    fn delete_resource(&mut self, id: ResourceId) -> StorageResult<()> {
        self.inner.delete_resource(id)
    }

    fn delete_headings(&mut self, resource_id: ResourceId) -> StorageResult<u64> {
        self.inner.delete_headings(resource_id)
    }

    fn insert_heading(&mut self, heading: &NewHeading) -> StorageResult<i64> {
        self.inner.insert_heading(heading)
    }

    fn list_headings(&self, resource_id: ResourceId) -> StorageResult<Vec<HeadingRecord>> {
        self.inner.list_headings(resource_id)
    }

    fn delete_links(&mut self, resource_id: ResourceId) -> StorageResult<u64> {
        self.inner.delete_links(resource_id)
    }

    fn insert_link(&mut self, link: &NewLink) -> StorageResult<i64> {
        if let Some(needle) = &self.reject_links_containing {
            if link.href.contains(needle.as_str()) {
                return Err(StorageError::Database("link write rejected".to_string()));
            }
        }
        self.inner.insert_link(link)
    }

    fn list_links(&self, resource_id: ResourceId) -> StorageResult<Vec<LinkRecord>> {
        self.inner.list_links(resource_id)
    }

    fn link_counts(&self, resource_id: ResourceId) -> StorageResult<LinkCounts> {
        self.inner.link_counts(resource_id)
    }

    fn broken_links(&self, resource_id: ResourceId) -> StorageResult<Vec<BrokenLink>> {
        self.inner.broken_links(resource_id)
    }

    fn count_resources_by_status(&self, status: ResourceStatus) -> StorageResult<u64> {
        self.inner.count_resources_by_status(status)
    }
}

#[tokio::test]
async fn test_insert_failures_are_collected() {
    let server = MockServer::start().await;
    serve_status(&server, "/keep", 200).await;
    serve_status(&server, "/reject", 200).await;
    serve_page(
        &server,
        "/page",
        r#"<a href="/keep">a</a><a href="/reject">b</a><a href="/keep?again">c</a>"#,
    )
    .await;

    let mut flaky = FlakyStorage::new();
    flaky.reject_links_containing = Some("/reject".to_string());
    let storage = SharedStorage::new(flaky);
    let id = storage
        .with(|s| s.insert_resource(1, &format!("{}/page", server.uri())))
        .unwrap();

    let registry = Arc::new(TaskRegistry::new());
    let client = build_http_client(&test_config(1).http).unwrap();
    let worker = CrawlWorker::new(storage.clone(), client, Arc::clone(&registry));
    let ticket = registry.try_register(id).unwrap();

    let report = worker.run(&ticket).await.unwrap();

    assert_eq!(report.links_saved, 2);
    assert_eq!(report.insert_failures.len(), 1);
    assert!(report.insert_failures[0].contains("/reject"));
    assert_eq!(storage.with(|s| s.list_links(id)).unwrap().len(), 2);
    assert_eq!(
        storage.with(|s| s.get_resource(id)).unwrap().status,
        ResourceStatus::Done
    );
}

#[tokio::test]
async fn test_failed_processing_write_skips_resource() {
    let mut flaky = FlakyStorage::new();
    flaky.reject_processing = true;
    let orch = Orchestrator::new(SharedStorage::new(flaky), &test_config(2)).unwrap();
    let id = add(&orch, "http://127.0.0.1:1/");

    let outcome = orch.start_batch(&[id]);

    assert!(outcome.started.is_empty());
    assert_eq!(
        outcome.skipped.get(&id),
        Some(&SkipReason::StatusUpdateFailed)
    );
    assert!(orch.active_tasks().is_empty());
    assert_eq!(record(&orch, id).status, ResourceStatus::Queued);
}

#[tokio::test]
async fn test_mixed_batch_outcomes_are_independent() {
    let server = MockServer::start().await;
    serve_page(&server, "/page", "<title>t</title>").await;

    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let fresh = add(&orch, &format!("{}/page", server.uri()));
    let busy = add(&orch, &format!("{}/page", server.uri()));
    orch.storage()
        .with(|s| s.update_status(busy, ResourceStatus::Processing))
        .unwrap();

    let outcome = orch.start_batch(&[404, busy, fresh]);

    assert_eq!(outcome.started, vec![fresh]);
    assert_eq!(outcome.skipped.get(&404), Some(&SkipReason::NotFound));
    assert_eq!(
        outcome.skipped.get(&busy),
        Some(&SkipReason::AlreadyProcessing)
    );
    settle(&orch).await;
    assert_eq!(record(&orch, fresh).status, ResourceStatus::Done);
}

#[tokio::test]
async fn test_restarted_then_stopped_resource_drops_old_error() {
    let server = slow_server(Duration::from_secs(30)).await;
    let dir = TempDir::new().unwrap();
    let orch = create_orchestrator(&dir, 4);
    let id = add(&orch, "http://127.0.0.1:1/");

    orch.start_batch(&[id]);
    settle(&orch).await;
    let failed = record(&orch, id);
    assert_eq!(failed.status, ResourceStatus::Error);
    assert!(failed.error_message.is_some());

    let moved = ResourceRecord {
        url: server.uri(),
        ..failed
    };
    orch.storage()
        .with(|s| s.update_resource_full(&moved))
        .unwrap();

    assert_eq!(orch.start_batch(&[id]).started, vec![id]);
    let running = record(&orch, id);
    assert_eq!(running.status, ResourceStatus::Processing);
    assert!(running.error_message.is_none());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(orch.stop_batch(&[id]).stopped, vec![id]);
    settle(&orch).await;

    let stopped = record(&orch, id);
    assert_eq!(stopped.status, ResourceStatus::Stopped);
    assert!(stopped.error_message.is_none());
}
