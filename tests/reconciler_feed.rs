//! Job stream reconciler integration tests: SSE consumption, ordering,
//! cap enforcement, fallback polling, and read-state commands.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bidwatch::backend::ApiClient;
use bidwatch::config::FeedConfig;
use bidwatch::jobs::JobStreamReconciler;
use bidwatch::notify::NotificationSink;
use bidwatch::types::{HealthSignal, JobFeed, JobRecord, RestartSignal};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct CountingSink {
    batches: Arc<AtomicUsize>,
}

impl NotificationSink for CountingSink {
    fn notify_new_jobs(&self, _jobs: &[JobRecord]) {
        self.batches.fetch_add(1, Ordering::SeqCst);
    }
}

/// Everything a running reconciler test needs to keep alive and drive.
struct Harness {
    feed_rx: watch::Receiver<JobFeed>,
    handle: bidwatch::jobs::JobFeedHandle,
    health_tx: broadcast::Sender<HealthSignal>,
    restart_tx: broadcast::Sender<RestartSignal>,
    _auth_tx: watch::Sender<Option<String>>,
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
    batches: Arc<AtomicUsize>,
}

impl Harness {
    async fn shutdown(self) {
        self.cancel.cancel();
        self.task.await.expect("reconciler task");
    }
}

fn start_reconciler(server: &MockServer, config: FeedConfig) -> Harness {
    let (auth_tx, auth_rx) = watch::channel(Some("tok".to_string()));
    let (health_tx, health_rx) = broadcast::channel(8);
    let (restart_tx, restart_rx) = broadcast::channel(8);
    let cancel = CancellationToken::new();
    let batches = Arc::new(AtomicUsize::new(0));

    let (reconciler, handle) = JobStreamReconciler::new(
        ApiClient::new(&server.uri()).expect("client"),
        config,
        auth_rx,
        health_rx,
        restart_rx,
        Box::new(CountingSink {
            batches: batches.clone(),
        }),
        cancel.clone(),
    );
    let feed_rx = reconciler.subscribe_feed();
    let task = tokio::spawn(reconciler.run());

    Harness {
        feed_rx,
        handle,
        health_tx,
        restart_tx,
        _auth_tx: auth_tx,
        cancel,
        task,
        batches,
    }
}

async fn wait_for_feed(
    rx: &mut watch::Receiver<JobFeed>,
    pred: impl FnMut(&JobFeed) -> bool,
) -> JobFeed {
    tokio::time::timeout(Duration::from_secs(10), rx.wait_for(pred))
        .await
        .expect("timed out waiting for job feed")
        .expect("feed channel closed")
        .clone()
}

fn feed_ids(feed: &JobFeed) -> Vec<&str> {
    feed.jobs.iter().map(|j| j.id.as_str()).collect()
}

#[tokio::test]
async fn stream_snapshot_then_delta_yields_unread_first_order() {
    let server = MockServer::start().await;
    let sse_body = concat!(
        "data: {\"type\": \"snapshot\", \"jobs\": [",
        "{\"id\": \"1\", \"is_read\": false, \"title\": \"Logo\"},",
        "{\"id\": \"2\", \"is_read\": true, \"title\": \"Entry\"}",
        "]}\n\n",
        ": keep-alive\n\n",
        "data: {\"type\": \"new_jobs\", \"jobs\": [",
        "{\"id\": \"3\", \"is_read\": false, \"title\": \"Banner\"}",
        "]}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
        .mount(&server)
        .await;
    // After the stream body ends the reconciler falls back to polling;
    // serve the merged state so the feed is stable
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jobs": [
                {"id": "3", "is_read": false, "title": "Banner"},
                {"id": "1", "is_read": false, "title": "Logo"},
                {"id": "2", "is_read": true, "title": "Entry"}
            ]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let mut h = start_reconciler(&server, FeedConfig::default());

    let feed = wait_for_feed(&mut h.feed_rx, |f| f.jobs.len() == 3).await;
    assert_eq!(feed_ids(&feed), vec!["3", "1", "2"]);
    assert_eq!(feed.unread_count, 2);
    // One batched notification for the delta, none for the snapshot
    assert_eq!(h.batches.load(Ordering::SeqCst), 1);

    h.shutdown().await;
}

#[tokio::test]
async fn cap_overflow_drops_read_records_first() {
    let server = MockServer::start().await;
    let sse_body = concat!(
        "data: {\"type\": \"snapshot\", \"jobs\": [",
        "{\"id\": \"1\", \"is_read\": false},",
        "{\"id\": \"2\", \"is_read\": true}",
        "]}\n\n",
        "data: {\"type\": \"new_jobs\", \"jobs\": [{\"id\": \"3\", \"is_read\": false}]}\n\n",
    );
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jobs": [{"id": "3", "is_read": false}, {"id": "1", "is_read": false}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let config = FeedConfig {
        working_set_cap: 2,
        ..FeedConfig::default()
    };
    let mut h = start_reconciler(&server, config);

    let feed = wait_for_feed(&mut h.feed_rx, |f| feed_ids(f) == ["3", "1"]).await;
    // Record 2, being read, was dropped even though record 1 is older
    assert_eq!(feed.unread_count, 2);

    h.shutdown().await;
}

#[tokio::test]
async fn mark_read_flips_locally_and_persists_to_backend() {
    let server = MockServer::start().await;
    let sse_body =
        "data: {\"type\": \"snapshot\", \"jobs\": [{\"id\": \"a\", \"is_read\": false}, {\"id\": \"b\", \"is_read\": false}]}\n\n";
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
        .mount(&server)
        .await;
    // The fallback mirrors the stream snapshot so its polls are no-ops and
    // the mark-read command is the only thing that can flip the record
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jobs": [{"id": "a", "is_read": false}, {"id": "b", "is_read": false}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/jobs/a/mark-read"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw(r#"{"success": true}"#, "application/json"),
        )
        .expect(1..)
        .mount(&server)
        .await;

    let mut h = start_reconciler(&server, FeedConfig::default());
    wait_for_feed(&mut h.feed_rx, |f| f.jobs.len() == 2).await;

    h.handle.mark_read("a").await;
    let feed = wait_for_feed(&mut h.feed_rx, |f| f.unread_count == 1).await;
    // Unread-first: the read record moved behind the unread one
    assert_eq!(feed_ids(&feed), vec!["b", "a"]);

    // The backend write is fire-and-forget; give it a beat, then verify
    tokio::time::sleep(Duration::from_millis(300)).await;
    h.shutdown().await;
    server.verify().await;
}

#[tokio::test]
async fn mark_all_read_zeroes_the_unread_indicator() {
    let server = MockServer::start().await;
    let sse_body =
        "data: {\"type\": \"snapshot\", \"jobs\": [{\"id\": \"a\", \"is_read\": false}, {\"id\": \"b\", \"is_read\": false}]}\n\n";
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(sse_body, "text/event-stream"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jobs": [{"id": "a", "is_read": false}, {"id": "b", "is_read": false}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let mut h = start_reconciler(&server, FeedConfig::default());
    wait_for_feed(&mut h.feed_rx, |f| f.unread_count == 2).await;

    h.handle.mark_all_read().await;
    let feed = wait_for_feed(&mut h.feed_rx, |f| f.unread_count == 0).await;
    assert_eq!(feed.jobs.len(), 2);
    assert!(feed.jobs.iter().all(|j| j.is_read));

    h.shutdown().await;
}

#[tokio::test]
async fn restart_discards_the_working_set_until_resync() {
    let server = MockServer::start().await;
    // Stream connects but stays silent after the snapshot (long delay)
    let sse_body = "data: {\"type\": \"snapshot\", \"jobs\": [{\"id\": \"a\", \"is_read\": false}]}\n\n";
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(sse_body, "text/event-stream")
                .set_delay(Duration::from_millis(50)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"{"jobs": [{"id": "a", "is_read": false}]}"#,
            "application/json",
        ))
        .mount(&server)
        .await;

    let config = FeedConfig {
        fallback_interval_secs: 1,
        ..FeedConfig::default()
    };
    let mut h = start_reconciler(&server, config);
    wait_for_feed(&mut h.feed_rx, |f| f.jobs.len() == 1).await;

    // Backend restarts: the set is discarded first, then the reconnect's
    // fresh snapshot repopulates it — wholesale replacement tolerates
    // either arrival order
    h.restart_tx
        .send(RestartSignal {
            new_epoch: bidwatch::types::ServerEpoch::new("2000.0"),
        })
        .expect("reconciler listening");

    wait_for_feed(&mut h.feed_rx, |f| f.jobs.is_empty()).await;
    let refilled = wait_for_feed(&mut h.feed_rx, |f| f.jobs.len() == 1).await;
    assert_eq!(feed_ids(&refilled), vec!["a"]);

    h.shutdown().await;
}

#[tokio::test]
async fn recovery_signal_switches_from_fallback_to_stream() {
    let server = MockServer::start().await;
    // The stream endpoint fails at first, forcing the polling fallback
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/jobs/stream"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            "data: {\"type\": \"snapshot\", \"jobs\": [{\"id\": \"s\", \"is_read\": false}, {\"id\": \"p\", \"is_read\": false}]}\n\n",
            "text/event-stream",
        ))
        .mount(&server)
        .await;
    // Slow poll responses keep the stream's snapshot observable after the
    // finite SSE body ends and the reconciler drops back to polling
    Mock::given(method("GET"))
        .and(path("/api/jobs"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw(r#"{"jobs": [{"id": "p", "is_read": false}]}"#, "application/json")
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;

    let mut h = start_reconciler(&server, FeedConfig::default());

    // Fallback polling picked up the single record
    wait_for_feed(&mut h.feed_rx, |f| feed_ids(f) == ["p"]).await;

    // Probe recovery: stop polling, re-establish the stream, take its
    // fresh snapshot
    h.health_tx
        .send(HealthSignal::Changed(true))
        .expect("reconciler listening");

    let feed = wait_for_feed(&mut h.feed_rx, |f| f.jobs.len() == 2).await;
    assert_eq!(feed_ids(&feed), vec!["s", "p"]);

    h.shutdown().await;
}
