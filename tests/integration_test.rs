#![cfg(feature = "http")]

use std::sync::Arc;
use std::time::Duration;
use mockito::Matcher;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;
use remote_resource::{EtagResource, RefreshParameters, ResourceRefresher, ResourceRefresherDelegate, ResourceRetriever, RetrieverError, RetryPolicy};
use remote_resource::storage::{DiskStorage, FileStorage};
use remote_resource::transport::http::ReqwestTransport;

#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct MockData {
    test_number: u32,
    #[serde(default)]
    etag: Option<String>,
}

impl EtagResource for MockData {
    fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }
}

type Refresher = ResourceRefresher<MockData, ReqwestTransport>;

fn retriever(retry_delay: Duration) -> ResourceRetriever<MockData, ReqwestTransport> {
    ResourceRetriever::new(ReqwestTransport::default(), |data, etag| {
        let mut data: MockData = serde_json::from_slice(data).ok()?;
        data.etag = etag.map(str::to_owned);
        Some(data)
    }).with_retry_policy(RetryPolicy {
        max_retries: 5,
        retry_delay,
    })
}

fn init_refresher(url: &str, storage: Arc<dyn DiskStorage>, refresh_interval: Duration) -> Refresher {
    let parameters = RefreshParameters::new("mock_data", url)
        .with_refresh_interval(refresh_interval)
        .with_error_cooldown_base_interval(Some(Duration::from_secs(10)));
    ResourceRefresher::new(retriever(Duration::from_millis(10)), storage, parameters, Handle::current())
}

async fn wait_idle(refresher: &Refresher) {
    while refresher.is_fetching() {
        sleep(Duration::from_millis(5)).await;
    }
}

#[derive(Debug, PartialEq)]
enum Event {
    Loaded(MockData),
    Failed(RetrieverError),
}

struct Delegate {
    events: UnboundedSender<Event>,
}

impl ResourceRefresherDelegate<MockData> for Delegate {
    fn did_load(&self, _id: &str, resource: &MockData) {
        let _ = self.events.send(Event::Loaded(resource.clone()));
    }

    fn did_fail_to_load(&self, _id: &str, error: &RetrieverError) {
        let _ = self.events.send(Event::Failed(*error));
    }
}

fn delegate() -> (Arc<Delegate>, UnboundedReceiver<Event>) {
    let (events, rx) = unbounded_channel();
    (Arc::new(Delegate { events }), rx)
}

const BODY: &str = r#"{"test_number": 999}"#;

fn loaded(etag: &str) -> MockData {
    MockData {
        test_number: 999,
        etag: Some(etag.to_string()),
    }
}

#[tokio::test]
async fn test_refresh_cycle_with_conditional_request() {
    let mut server = mockito::Server::new_async().await;
    let first = server
        .mock("GET", "/mock")
        .match_header("if-none-match", Matcher::Missing)
        .with_header("Content-Type", "application/json")
        .with_header("ETag", "e1")
        .with_body(BODY)
        .expect(1)
        .create_async()
        .await;
    let revalidation = server
        .mock("GET", "/mock")
        .match_header("if-none-match", "e1")
        .with_status(304)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let refresher = init_refresher(&(server.url() + "/mock"), Arc::new(FileStorage::new(dir.path()).unwrap()), Duration::from_secs(1));
    assert_eq!(refresher.read_resource(), None);

    refresher.request_refresh();
    wait_idle(&refresher).await;
    assert_eq!(refresher.read_resource(), Some(loaded("e1")));

    // Interval has not elapsed yet
    refresher.request_refresh();
    assert!(!refresher.is_fetching());

    sleep(Duration::from_millis(1100)).await;
    refresher.request_refresh();
    wait_idle(&refresher).await;

    first.assert_async().await;
    revalidation.assert_async().await;
    // Not modified keeps the cached resource
    assert_eq!(refresher.read_resource(), Some(loaded("e1")));
}

#[tokio::test]
async fn test_cached_resource_survives_restart() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/mock")
        .with_header("ETag", "e1")
        .with_body(BODY)
        .expect(1)
        .create_async()
        .await;
    let url = server.url() + "/mock";
    let dir = tempfile::tempdir().unwrap();

    {
        let refresher = init_refresher(&url, Arc::new(FileStorage::new(dir.path()).unwrap()), Duration::from_secs(3600));
        refresher.request_refresh();
        wait_idle(&refresher).await;
    }

    // A new process: the cache is replayed to a late delegate without any request
    let refresher = init_refresher(&url, Arc::new(FileStorage::new(dir.path()).unwrap()), Duration::from_secs(3600));
    let (delegate, mut events) = delegate();
    refresher.set_delegate(&delegate);

    assert_eq!(events.try_recv().unwrap(), Event::Loaded(loaded("e1")));
    assert_eq!(refresher.last_etag().as_deref(), Some("e1"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_transient_status_is_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/mock")
        .with_status(408)
        .expect(6)
        .create_async()
        .await;

    let result = retriever(Duration::from_millis(5)).get_resource(&(server.url() + "/mock"), Some("e1")).await;

    assert_eq!(result, Err(RetrieverError::NonSuccessStatus(408)));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/mock")
        .with_status(404)
        .expect(1)
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    let refresher = init_refresher(&(server.url() + "/mock"), Arc::new(FileStorage::new(dir.path()).unwrap()), Duration::from_secs(60));
    let (delegate, mut events) = delegate();
    refresher.set_delegate(&delegate);

    refresher.request_refresh();
    assert_eq!(events.recv().await, Some(Event::Failed(RetrieverError::NonSuccessStatus(404))));
    wait_idle(&refresher).await;

    // Not cached and in error cooldown: nothing is sent
    refresher.request_refresh();
    assert!(!refresher.is_fetching());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_undecodable_body() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/mock")
        .with_body("not json")
        .create_async()
        .await;

    let result = retriever(Duration::ZERO).get_resource(&(server.url() + "/mock"), None).await;
    assert_eq!(result, Err(RetrieverError::CouldNotDecode));
}

#[tokio::test]
async fn test_unreachable_host_is_unknown() {
    let retriever = ResourceRetriever::new(ReqwestTransport::default(), |data, _| serde_json::from_slice::<MockData>(data).ok())
        .with_retry_policy(RetryPolicy {
            max_retries: 1,
            retry_delay: Duration::from_millis(5),
        });

    // Port 9 (discard) is essentially never served on loopback
    let result = retriever.get_resource("http://127.0.0.1:9/mock", None).await;
    assert_eq!(result, Err(RetrieverError::Unknown));
}
