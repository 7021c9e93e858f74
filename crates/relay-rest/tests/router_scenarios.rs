//! End-to-end router behavior against a scripted HTTP client.
//!
//! All tests run with paused tokio time, so header-driven delays elapse
//! deterministically.

use async_trait::async_trait;
use chrono::TimeZone;
use relay_rest::{
    routes, ClientRequest, HttpClient, HttpResponse, ResponseFunction, Router, RouterError,
    RouterOptions, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct DispatchRecord {
    uri: String,
    at: Instant,
}

/// Scripted HTTP client: responses are queued per URI and returned in order.
#[derive(Default)]
struct MockHttpClient {
    scripts: Mutex<HashMap<String, VecDeque<HttpResponse>>>,
    log: Mutex<Vec<DispatchRecord>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MockHttpClient {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn script(&self, uri: &str, response: HttpResponse) {
        self.scripts
            .lock()
            .unwrap()
            .entry(uri.to_string())
            .or_default()
            .push_back(response);
    }

    fn dispatches(&self) -> Vec<DispatchRecord> {
        self.log.lock().unwrap().clone()
    }

    fn dispatches_for(&self, uri: &str) -> Vec<DispatchRecord> {
        self.dispatches()
            .into_iter()
            .filter(|r| r.uri == uri)
            .collect()
    }

    fn max_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn execute(&self, request: &ClientRequest) -> Result<HttpResponse, TransportError> {
        let uri = request.uri();
        self.log.lock().unwrap().push(DispatchRecord {
            uri: uri.clone(),
            at: Instant::now(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);
        // hold the request "on the wire" long enough for overlap to show up
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let response = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&uri)
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| HttpResponse::new(200));
        Ok(response)
    }
}

fn rfc2822(millis: i64) -> String {
    chrono::Utc.timestamp_millis_opt(millis).unwrap().to_rfc2822()
}

fn limited_response(remaining: i64, reset_secs: i64, date_millis: i64) -> HttpResponse {
    HttpResponse::new(200)
        .with_header("X-RateLimit-Remaining", remaining.to_string())
        .with_header("X-RateLimit-Reset", reset_secs.to_string())
        .with_header("Date", rfc2822(date_millis))
}

fn message_list(channel: u64) -> ClientRequest {
    ClientRequest::new(routes::MESSAGES_LIST).with_param("channel.id", channel)
}

/// S1: one request, permits left, no delay, status reflects the headers.
#[tokio::test(start_paused = true)]
async fn single_request_completes_and_reports_status() {
    let http = MockHttpClient::new();
    http.script(
        "/channels/1/messages",
        limited_response(4, 1_000_001, 1_000_000_000)
            .with_body(r#"[{"id": "10"}]"#),
    );
    let router = Router::new(http.clone());

    let body: Option<serde_json::Value> = router.exchange(message_list(1)).await.unwrap();
    assert_eq!(body.unwrap()[0]["id"], "10");

    let status = router.status(&message_list(1)).unwrap();
    assert!(!status.is_global_rate_limited());
    assert!(!status.is_rate_limited());
    assert_eq!(status.snapshot().remaining, 4);
}

#[tokio::test(start_paused = true)]
async fn status_fails_for_unknown_bucket() {
    let http = MockHttpClient::new();
    let router = Router::new(http);

    let err = router.status(&message_list(9)).unwrap_err();
    assert!(matches!(err, RouterError::UnknownBucket));
}

/// Invariant 1: same-bucket requests dispatch serially, in submission order.
#[tokio::test(start_paused = true)]
async fn same_bucket_requests_are_serialized_in_order() {
    let http = MockHttpClient::new();
    let router = Arc::new(Router::new(http.clone()));

    let mut futures = Vec::new();
    for id in 0..5 {
        let request = ClientRequest::new(routes::MESSAGE_GET)
            .with_param("channel.id", 1)
            .with_param("message.id", id);
        futures.push(router.enqueue(request).unwrap());
    }
    for rx in futures {
        rx.await.unwrap();
    }

    let uris: Vec<String> = http.dispatches().into_iter().map(|r| r.uri).collect();
    let expected: Vec<String> = (0..5)
        .map(|id| format!("/channels/1/messages/{id}"))
        .collect();
    assert_eq!(uris, expected);
    assert_eq!(http.max_concurrency(), 1);
}

/// S2: an exhausted bucket delays the next dispatch by the reset interval.
#[tokio::test(start_paused = true)]
async fn exhausted_bucket_delays_next_dispatch() {
    let date = 1_000_000_000_000i64;
    let http = MockHttpClient::new();
    http.script("/channels/1/messages", limited_response(0, date / 1000 + 2, date));
    http.script(
        "/channels/1/messages",
        limited_response(0, date / 1000 + 4, date + 2_000),
    );
    let router = Router::new(http.clone());

    let first = router.enqueue(message_list(1)).unwrap();
    let second = router.enqueue(message_list(1)).unwrap();

    // futures complete in submission order
    first.await.unwrap();
    second.await.unwrap();

    let records = http.dispatches_for("/channels/1/messages");
    assert_eq!(records.len(), 2);
    let gap = records[1].at - records[0].at;
    assert!(gap >= Duration::from_secs(2), "gap was {gap:?}");
}

/// S3: a global 429 suspends every bucket until the retry deadline, and the
/// tripping request is retried.
#[tokio::test(start_paused = true)]
async fn global_rate_limit_gates_all_buckets() {
    let http = MockHttpClient::new();
    http.script(
        "/channels/1/messages",
        HttpResponse::new(429)
            .with_header("X-RateLimit-Global", "true")
            .with_header("Retry-After", "3"),
    );
    http.script("/channels/1/messages", HttpResponse::new(200));
    http.script("/channels/2/messages", HttpResponse::new(200));
    let router = Router::new(http.clone());

    let start = Instant::now();
    let first = router.enqueue(message_list(1)).unwrap();

    // wait until the 429 has actually tripped the gate
    loop {
        if let Ok(status) = router.status(&message_list(1)) {
            if status.is_global_rate_limited() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    let second = router.enqueue(message_list(2)).unwrap();
    first.await.unwrap();
    second.await.unwrap();

    let retry = &http.dispatches_for("/channels/1/messages")[1];
    let other = &http.dispatches_for("/channels/2/messages")[0];
    assert!(retry.at - start >= Duration::from_secs(3));
    assert!(other.at - start >= Duration::from_secs(3));
}

/// A bucket-scoped 429 retries the same correlation after the reset, without
/// surfacing an error.
#[tokio::test(start_paused = true)]
async fn bucket_429_requeues_at_head() {
    let date = 2_000_000_000_000i64;
    let http = MockHttpClient::new();
    http.script(
        "/channels/1/messages",
        HttpResponse::new(429)
            .with_header("X-RateLimit-Remaining", "0")
            .with_header("X-RateLimit-Reset", (date / 1000 + 1).to_string())
            .with_header("Date", rfc2822(date)),
    );
    http.script(
        "/channels/1/messages",
        HttpResponse::new(200).with_body(r#"{"ok": true}"#),
    );
    let router = Router::new(http.clone());

    let body: Option<serde_json::Value> = router.exchange(message_list(1)).await.unwrap();
    assert_eq!(body.unwrap()["ok"], true);

    let records = http.dispatches_for("/channels/1/messages");
    assert_eq!(records.len(), 2);
    assert!(records[1].at - records[0].at >= Duration::from_secs(1));
}

/// A second consecutive 429 is surfaced rather than retried forever.
#[tokio::test(start_paused = true)]
async fn repeated_429_surfaces_error() {
    let http = MockHttpClient::new();
    for _ in 0..2 {
        http.script(
            "/channels/1/messages",
            HttpResponse::new(429).with_header("Retry-After", "1"),
        );
    }
    let router = Router::new(http.clone());

    let err = router
        .exchange::<serde_json::Value>(message_list(1))
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(429));
    assert_eq!(http.dispatches_for("/channels/1/messages").len(), 2);
}

/// S4: a 404 under `empty_if_not_found` becomes an empty success.
#[tokio::test(start_paused = true)]
async fn not_found_becomes_empty_success() {
    let http = MockHttpClient::new();
    http.script("/channels/1/messages/7", HttpResponse::new(404));
    let router = Router::with_options(
        http.clone(),
        RouterOptions::new().on_client_response(ResponseFunction::empty_if_not_found()),
    );

    let request = ClientRequest::new(routes::MESSAGE_GET)
        .with_param("channel.id", 1)
        .with_param("message.id", 7);
    let body: Option<serde_json::Value> = router.exchange(request).await.unwrap();

    assert!(body.is_none());
    assert_eq!(http.dispatches().len(), 1);
}

/// Invariant 5: retry-once means exactly two attempts, then the error.
#[tokio::test(start_paused = true)]
async fn retry_once_makes_exactly_two_attempts() {
    let http = MockHttpClient::new();
    http.script("/channels/1/messages", HttpResponse::new(500));
    http.script("/channels/1/messages", HttpResponse::new(500));
    let router = Router::with_options(
        http.clone(),
        RouterOptions::new()
            .on_client_response(ResponseFunction::retry_once_on_error_status([500])),
    );

    let err = router
        .exchange::<serde_json::Value>(message_list(1))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(http.dispatches_for("/channels/1/messages").len(), 2);
}

/// A retried 500 that then succeeds completes normally.
#[tokio::test(start_paused = true)]
async fn retry_once_recovers_on_success() {
    let http = MockHttpClient::new();
    http.script("/channels/1/messages", HttpResponse::new(502));
    http.script(
        "/channels/1/messages",
        HttpResponse::new(200).with_body(r#"{"ok": true}"#),
    );
    let router = Router::with_options(
        http.clone(),
        RouterOptions::new()
            .on_client_response(ResponseFunction::retry_once_on_error_status([500, 502])),
    );

    let body: Option<serde_json::Value> = router.exchange(message_list(1)).await.unwrap();
    assert_eq!(body.unwrap()["ok"], true);
    assert_eq!(http.dispatches_for("/channels/1/messages").len(), 2);
}

/// S5: message deletion lives in its own bucket and may overlap other
/// message routes on the same channel.
#[tokio::test(start_paused = true)]
async fn message_delete_uses_separate_bucket() {
    let http = MockHttpClient::new();
    let router = Arc::new(Router::new(http.clone()));

    let delete = ClientRequest::new(routes::MESSAGE_DELETE)
        .with_param("channel.id", 1)
        .with_param("message.id", 10);
    let get = ClientRequest::new(routes::MESSAGE_GET)
        .with_param("channel.id", 1)
        .with_param("message.id", 10);

    let a = router.enqueue(delete).unwrap();
    let b = router.enqueue(get).unwrap();
    a.await.unwrap();
    b.await.unwrap();

    // two distinct streams: both requests were on the wire at once
    assert_eq!(http.max_concurrency(), 2);
}

/// Transport failures surface directly, without retries.
#[tokio::test(start_paused = true)]
async fn transport_error_surfaces() {
    struct FailingClient;

    #[async_trait]
    impl HttpClient for FailingClient {
        async fn execute(
            &self,
            _request: &ClientRequest,
        ) -> Result<HttpResponse, TransportError> {
            Err(TransportError("connection refused".into()))
        }
    }

    let router = Router::new(Arc::new(FailingClient));
    let err = router
        .exchange::<serde_json::Value>(message_list(1))
        .await
        .unwrap_err();
    assert!(matches!(err, RouterError::Transport(_)));
}

/// Closed routers reject new work.
#[tokio::test(start_paused = true)]
async fn closed_router_rejects_submissions() {
    let http = MockHttpClient::new();
    let router = Router::new(http);
    router.close();

    let err = router.enqueue(message_list(1)).unwrap_err();
    assert!(matches!(err, RouterError::Closed));
}
