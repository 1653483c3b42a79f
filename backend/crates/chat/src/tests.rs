//! Scenario tests for the chat crate

#[cfg(test)]
mod support {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use chrono::{DateTime, TimeZone, Utc};

    use crate::domain::entities::UsageWindow;
    use crate::domain::repository::{CompletionClient, Notifier, UsageStore};
    use crate::error::{ChatError, ChatResult};
    use crate::infra::memory::InMemoryUsageStore;

    pub fn utc(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, d, h, m, s).unwrap()
    }

    /// Completion stub returning a fixed answer or failure
    pub struct StubClient {
        reply: Result<String, String>,
        pub calls: AtomicUsize,
    }

    impl StubClient {
        pub fn replying(reply: &str) -> Self {
            Self {
                reply: Ok(reply.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn failing(detail: &str) -> Self {
            Self {
                reply: Err(detail.to_string()),
                calls: AtomicUsize::new(0),
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CompletionClient for StubClient {
        async fn complete(&self, _system_prompt: &str, _user_message: &str) -> ChatResult<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(detail) => Err(ChatError::Upstream(detail.clone())),
            }
        }
    }

    /// In-memory store whose reads and writes can be made to fail
    #[derive(Default)]
    pub struct FlakyStore {
        pub inner: InMemoryUsageStore,
        pub fail_reads: AtomicBool,
        pub fail_writes: AtomicBool,
    }

    impl FlakyStore {
        pub fn snapshot(&self) -> Option<UsageWindow> {
            self.inner.snapshot()
        }
    }

    impl UsageStore for FlakyStore {
        async fn load(&self) -> ChatResult<Option<UsageWindow>> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(ChatError::Store("disk unreadable".into()));
            }
            self.inner.load().await
        }

        async fn save(&self, window: &UsageWindow) -> ChatResult<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(ChatError::Store("disk full".into()));
            }
            self.inner.save(window).await
        }
    }

    /// Notifier that records every message
    #[derive(Default)]
    pub struct RecordingNotifier {
        pub fail: bool,
        pub sent: Mutex<Vec<String>>,
    }

    impl RecordingNotifier {
        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        async fn notify(&self, text: &str) -> ChatResult<()> {
            self.sent.lock().unwrap().push(text.to_string());
            if self.fail {
                return Err(ChatError::Notification("webhook returned 502".into()));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod usage_counter_tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use chrono::DateTime;

    use super::support::*;
    use crate::application::usage_counter::UsageCounter;
    use crate::domain::entities::UsageWindow;
    use crate::domain::repository::UsageStore;
    use crate::domain::value_objects::ReportSchedule;
    use crate::infra::memory::InMemoryUsageStore;

    fn counter(store: InMemoryUsageStore) -> UsageCounter<InMemoryUsageStore> {
        UsageCounter::new(store, ReportSchedule::utc(18).unwrap())
    }

    fn window(start: &str, prompts: u64) -> UsageWindow {
        UsageWindow {
            window_start_timestamp: DateTime::parse_from_rfc3339(start).unwrap(),
            prompts_in_window: prompts,
        }
    }

    #[tokio::test]
    async fn test_first_read_creates_and_persists_window() {
        let counter = counter(InMemoryUsageStore::new());

        let current = counter.read_or_init(utc(10, 17, 59, 0)).await;
        assert_eq!(current, window("2024-03-09T18:00:00Z", 0));

        let current = counter.read_or_init(utc(10, 18, 0, 1)).await;
        assert_eq!(current, window("2024-03-10T18:00:00Z", 0));
    }

    #[tokio::test]
    async fn test_increment_counts_within_window() {
        let counter = counter(InMemoryUsageStore::new());
        let now = utc(10, 12, 0, 0);

        assert_eq!(counter.increment(now).await.unwrap(), 1);
        assert_eq!(counter.increment(now).await.unwrap(), 2);
        assert_eq!(counter.read_or_init(now).await.prompts_in_window, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_are_not_lost() {
        let counter = Arc::new(counter(InMemoryUsageStore::with_record(window(
            "2024-03-09T18:00:00Z",
            5,
        ))));
        let now = utc(10, 12, 0, 0);

        let handles: Vec<_> = (0..100)
            .map(|_| {
                let counter = counter.clone();
                tokio::spawn(async move { counter.increment(now).await.unwrap() })
            })
            .collect();

        let mut seen = Vec::new();
        for handle in handles {
            seen.push(handle.await.unwrap());
        }
        seen.sort_unstable();

        assert_eq!(seen, (6..=105).collect::<Vec<u64>>());
        assert_eq!(counter.read_or_init(now).await.prompts_in_window, 105);
    }

    #[tokio::test]
    async fn test_stale_record_is_corrected() {
        let store = InMemoryUsageStore::with_record(window("2024-03-08T18:00:00Z", 9));
        let counter = counter(store);

        let current = counter.read_or_init(utc(10, 12, 0, 0)).await;
        assert_eq!(current, window("2024-03-09T18:00:00Z", 0));
    }

    #[tokio::test]
    async fn test_stale_record_is_overwritten_in_store() {
        let store = Arc::new(FlakyStore::default());
        store
            .inner
            .save(&window("2024-03-08T18:00:00Z", 9))
            .await
            .unwrap();

        let counter = UsageCounter::new(store.clone(), ReportSchedule::utc(18).unwrap());
        counter.read_or_init(utc(10, 12, 0, 0)).await;

        assert_eq!(store.snapshot(), Some(window("2024-03-09T18:00:00Z", 0)));
    }

    #[tokio::test]
    async fn test_matching_record_in_other_offset_is_kept() {
        let store = InMemoryUsageStore::with_record(window("2024-03-09T19:00:00+01:00", 4));
        let counter = counter(store);

        let current = counter.read_or_init(utc(10, 12, 0, 0)).await;
        assert_eq!(current.prompts_in_window, 4);
        assert_eq!(current.window_start_timestamp.to_rfc3339(), "2024-03-09T18:00:00+00:00");
    }

    #[tokio::test]
    async fn test_unreadable_store_starts_fresh_window() {
        let store = Arc::new(FlakyStore::default());
        store.fail_reads.store(true, Ordering::SeqCst);
        let counter = UsageCounter::new(store.clone(), ReportSchedule::utc(18).unwrap());

        let current = counter.read_or_init(utc(10, 12, 0, 0)).await;
        assert_eq!(current, window("2024-03-09T18:00:00Z", 0));
        assert_eq!(counter.increment(utc(10, 12, 0, 0)).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_write_failure_is_reported_by_increment() {
        let store = Arc::new(FlakyStore::default());
        store.fail_writes.store(true, Ordering::SeqCst);
        let counter = UsageCounter::new(store.clone(), ReportSchedule::utc(18).unwrap());

        assert!(counter.increment(utc(10, 12, 0, 0)).await.is_err());
        // Read path swallows the write error
        assert_eq!(counter.read_or_init(utc(10, 12, 0, 0)).await.prompts_in_window, 0);
    }

    #[tokio::test]
    async fn test_reset_to() {
        let counter = counter(InMemoryUsageStore::new());
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();

        let start = DateTime::parse_from_rfc3339("2024-03-10T18:00:00Z").unwrap();
        counter.reset_to(start).await.unwrap();

        let current = counter.read_or_init(utc(10, 18, 30, 0)).await;
        assert_eq!(current, window("2024-03-10T18:00:00Z", 0));
    }
}

#[cfg(test)]
mod report_usage_tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::support::*;
    use crate::application::report_usage::UsageReporter;
    use crate::application::usage_counter::UsageCounter;
    use crate::domain::value_objects::ReportSchedule;

    fn setup(
        notifier: RecordingNotifier,
    ) -> (
        Arc<FlakyStore>,
        Arc<UsageCounter<Arc<FlakyStore>>>,
        Arc<RecordingNotifier>,
        UsageReporter<Arc<FlakyStore>, RecordingNotifier>,
    ) {
        let store = Arc::new(FlakyStore::default());
        let counter = Arc::new(UsageCounter::new(
            store.clone(),
            ReportSchedule::utc(18).unwrap(),
        ));
        let notifier = Arc::new(notifier);
        let reporter = UsageReporter::new(counter.clone(), notifier.clone());
        (store, counter, notifier, reporter)
    }

    #[tokio::test]
    async fn test_report_summarises_closed_window_and_resets() {
        let (store, counter, notifier, reporter) = setup(RecordingNotifier::default());
        for _ in 0..3 {
            counter.increment(utc(10, 12, 0, 0)).await.unwrap();
        }

        let outcome = reporter.report(utc(10, 18, 0, 0)).await;

        assert_eq!(outcome.report.prompts, 3);
        assert_eq!(outcome.report.window_start.to_rfc3339(), "2024-03-09T18:00:00+00:00");
        assert_eq!(outcome.report.window_end.to_rfc3339(), "2024-03-10T18:00:00+00:00");
        assert!(outcome.delivered);
        assert!(outcome.reset_persisted);

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("2024-03-09 18:00 to 2024-03-10 18:00"));
        assert!(sent[0].contains("Prompts: 3"));

        let stored = store.snapshot().unwrap();
        assert_eq!(stored.prompts_in_window, 0);
        assert_eq!(stored.window_start_timestamp.to_rfc3339(), "2024-03-10T18:00:00+00:00");
    }

    #[tokio::test]
    async fn test_double_fire_reports_once_with_real_count() {
        let (store, counter, notifier, reporter) = setup(RecordingNotifier::default());
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();

        let first = reporter.report(utc(10, 18, 0, 0)).await;
        let second = reporter.report(utc(10, 18, 0, 0)).await;

        assert_eq!(first.report.prompts, 2);
        assert_eq!(second.report.prompts, 0);
        assert_eq!(notifier.sent().len(), 2);
        assert_eq!(store.snapshot().unwrap().prompts_in_window, 0);
    }

    #[tokio::test]
    async fn test_reset_happens_when_delivery_fails() {
        let (store, counter, notifier, reporter) = setup(RecordingNotifier::failing());
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();

        let outcome = reporter.report(utc(10, 18, 0, 0)).await;

        assert!(!outcome.delivered);
        assert!(outcome.reset_persisted);
        assert_eq!(notifier.sent().len(), 1);
        assert_eq!(store.snapshot().unwrap().prompts_in_window, 0);
    }

    #[tokio::test]
    async fn test_report_still_sent_when_reset_cannot_persist() {
        let (store, counter, notifier, reporter) = setup(RecordingNotifier::default());
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();
        store.fail_writes.store(true, Ordering::SeqCst);

        let outcome = reporter.report(utc(10, 18, 0, 0)).await;

        assert!(outcome.delivered);
        assert!(!outcome.reset_persisted);
        assert_eq!(outcome.report.prompts, 1);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_increment_before_late_wake_up_keeps_closing_count() {
        let (store, counter, notifier, reporter) = setup(RecordingNotifier::default());
        for _ in 0..5 {
            counter.increment(utc(10, 12, 0, 0)).await.unwrap();
        }

        // A request lands after the boundary but before the reporter runs
        assert_eq!(counter.increment(utc(10, 18, 0, 1)).await.unwrap(), 1);

        let outcome = reporter.report(utc(10, 18, 0, 0)).await;

        assert_eq!(outcome.report.prompts, 5);
        assert_eq!(outcome.report.window_start.to_rfc3339(), "2024-03-09T18:00:00+00:00");
        assert!(notifier.sent()[0].contains("Prompts: 5"));

        let stored = store.snapshot().unwrap();
        assert_eq!(stored.window_start_timestamp.to_rfc3339(), "2024-03-10T18:00:00+00:00");
        assert_eq!(stored.prompts_in_window, 1);

        // Firing again reports nothing and still keeps the new window
        let again = reporter.report(utc(10, 18, 0, 0)).await;
        assert_eq!(again.report.prompts, 0);
        assert_eq!(store.snapshot().unwrap().prompts_in_window, 1);
    }

    #[tokio::test]
    async fn test_health_read_after_boundary_keeps_closing_count() {
        let (_store, counter, _notifier, reporter) = setup(RecordingNotifier::default());
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();

        let current = counter.read_or_init(utc(10, 18, 0, 2)).await;
        assert_eq!(current.prompts_in_window, 0);

        assert_eq!(reporter.report(utc(10, 18, 0, 0)).await.report.prompts, 2);
    }

    #[tokio::test]
    async fn test_late_increment_lands_in_new_window() {
        let (_store, counter, _notifier, reporter) = setup(RecordingNotifier::default());
        counter.increment(utc(10, 12, 0, 0)).await.unwrap();
        reporter.report(utc(10, 18, 0, 0)).await;

        assert_eq!(counter.increment(utc(10, 18, 0, 5)).await.unwrap(), 1);
    }
}

#[cfg(test)]
mod send_message_tests {
    use std::sync::Arc;
    use std::sync::atomic::Ordering;

    use super::support::*;
    use crate::application::config::ChatConfig;
    use crate::application::send_message::{SendMessageInput, SendMessageUseCase};
    use crate::application::system_prompt::SystemPromptCache;
    use crate::application::usage_counter::UsageCounter;
    use crate::error::ChatError;
    use platform::rate_limit::LimitScope;

    struct Harness {
        client: Arc<StubClient>,
        store: Arc<FlakyStore>,
        counter: Arc<UsageCounter<Arc<FlakyStore>>>,
        use_case: SendMessageUseCase<StubClient, Arc<FlakyStore>>,
    }

    fn harness(client: StubClient) -> Harness {
        let config = ChatConfig::default();
        let client = Arc::new(client);
        let store = Arc::new(FlakyStore::default());
        let counter = Arc::new(UsageCounter::new(store.clone(), config.report_schedule));
        let use_case = SendMessageUseCase::new(
            client.clone(),
            counter.clone(),
            Arc::new(config.limiter_chain()),
            Arc::new(SystemPromptCache::fixed("Be brief.")),
            Arc::new(config),
        );
        Harness {
            client,
            store,
            counter,
            use_case,
        }
    }

    fn input(message: Option<&str>, caller: &str) -> SendMessageInput {
        SendMessageInput {
            message: message.map(str::to_string),
            caller: caller.to_string(),
        }
    }

    async fn prompts(h: &Harness) -> u64 {
        h.counter.read_or_init(utc(10, 12, 0, 0)).await.prompts_in_window
    }

    #[tokio::test]
    async fn test_successful_reply_is_counted_once() {
        let h = harness(StubClient::replying("Hi there"));

        let output = h
            .use_case
            .execute(input(Some("  hello  "), "10.0.0.1"), utc(10, 12, 0, 0))
            .await
            .unwrap();

        assert_eq!(output.reply, "Hi there");
        assert_eq!(output.prompts_in_window, Some(1));
        assert_eq!(prompts(&h).await, 1);
    }

    #[tokio::test]
    async fn test_validation_failures_are_not_counted_or_charged() {
        let h = harness(StubClient::replying("unused"));
        let now = utc(10, 12, 0, 0);

        let err = h.use_case.execute(input(None, "a"), now).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));

        let err = h.use_case.execute(input(Some("   "), "a"), now).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));

        let err = h
            .use_case
            .execute(input(Some(&"x".repeat(61)), "a"), now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ChatError::MessageTooLong {
                max: 60,
                received: 61
            }
        ));

        assert_eq!(h.client.calls(), 0);
        assert_eq!(prompts(&h).await, 0);

        // Rate budget untouched by the rejected requests
        let ok = h.use_case.execute(input(Some(&"x".repeat(60)), "a"), now).await;
        assert!(ok.is_ok());
    }

    #[tokio::test]
    async fn test_rate_limited_request_is_not_counted() {
        let h = harness(StubClient::replying("ok"));
        let now = utc(10, 12, 0, 0);

        h.use_case.execute(input(Some("one"), "a"), now).await.unwrap();
        let err = h
            .use_case
            .execute(
                input(Some("two"), "a"),
                now + chrono::Duration::milliseconds(1000),
            )
            .await
            .unwrap_err();

        match err {
            ChatError::RateLimited {
                scope,
                retry_after_ms,
            } => {
                assert_eq!(scope, LimitScope::PerCaller);
                assert_eq!(retry_after_ms, 4000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.client.calls(), 1);
        assert_eq!(prompts(&h).await, 1);

        let later = now + chrono::Duration::milliseconds(6000);
        assert!(h.use_case.execute(input(Some("three"), "a"), later).await.is_ok());
    }

    #[tokio::test]
    async fn test_global_limit_applies_across_callers() {
        let h = harness(StubClient::replying("ok"));
        let now = utc(10, 12, 0, 0);

        for i in 0..30 {
            h.use_case
                .execute(input(Some("hi"), &format!("10.0.0.{i}")), now)
                .await
                .unwrap();
        }
        let err = h
            .use_case
            .execute(input(Some("hi"), "10.0.1.1"), now)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ChatError::RateLimited {
                scope: LimitScope::Global,
                ..
            }
        ));
        assert_eq!(prompts(&h).await, 30);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_not_counted() {
        let h = harness(StubClient::failing("connection reset"));

        let err = h
            .use_case
            .execute(input(Some("hello"), "a"), utc(10, 12, 0, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Upstream(_)));
        assert_eq!(prompts(&h).await, 0);
    }

    #[tokio::test]
    async fn test_blank_reply_is_upstream_error() {
        let h = harness(StubClient::replying("  \n"));

        let err = h
            .use_case
            .execute(input(Some("hello"), "a"), utc(10, 12, 0, 0))
            .await
            .unwrap_err();

        assert!(matches!(err, ChatError::Upstream(_)));
        assert_eq!(prompts(&h).await, 0);
    }

    #[tokio::test]
    async fn test_reply_survives_accounting_failure() {
        let h = harness(StubClient::replying("still here"));
        h.store.fail_writes.store(true, Ordering::SeqCst);

        let output = h
            .use_case
            .execute(input(Some("hello"), "a"), utc(10, 12, 0, 0))
            .await
            .unwrap();

        assert_eq!(output.reply, "still here");
        assert_eq!(output.prompts_in_window, None);
    }
}

#[cfg(test)]
mod router_tests {
    use std::net::SocketAddr;
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Body;
    use axum::extract::connect_info::MockConnectInfo;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::support::*;
    use crate::application::config::ChatConfig;
    use crate::application::system_prompt::SystemPromptCache;
    use crate::application::usage_counter::UsageCounter;
    use crate::infra::memory::InMemoryUsageStore;
    use crate::presentation::handlers::ChatAppState;
    use crate::presentation::router::chat_router;

    fn app(client: StubClient) -> Router {
        app_with(client, ChatConfig::default())
    }

    fn app_with(client: StubClient, config: ChatConfig) -> Router {
        let state = ChatAppState::new(
            Arc::new(client),
            Arc::new(UsageCounter::new(
                InMemoryUsageStore::new(),
                config.report_schedule,
            )),
            Arc::new(config.limiter_chain()),
            Arc::new(SystemPromptCache::fixed("Be brief.")),
            Arc::new(config),
        );
        chat_router(state).layer(MockConnectInfo(SocketAddr::from(([10, 0, 0, 1], 40000))))
    }

    fn post_chat(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_health() -> Request<Body> {
        Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_chat_success() {
        let response = app(StubClient::replying("Hello!"))
            .oneshot(post_chat(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "reply": "Hello!" }));
    }

    #[tokio::test]
    async fn test_empty_message_is_400() {
        let response = app(StubClient::replying("unused"))
            .oneshot(post_chat(r#"{"message":"   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["reason"], "empty_message");
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_too_long_message_reports_limits() {
        let message = "a".repeat(61);
        let response = app(StubClient::replying("unused"))
            .oneshot(post_chat(&json!({ "message": message }).to_string()))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["reason"], "message_too_long");
        assert_eq!(body["max"], 60);
        assert_eq!(body["received"], 61);
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() {
        let response = app(StubClient::replying("unused"))
            .oneshot(post_chat("{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["reason"], "invalid_body");
    }

    #[tokio::test]
    async fn test_second_request_is_429_with_retry_after() {
        let app = app(StubClient::replying("ok"));

        let first = app
            .clone()
            .oneshot(post_chat(r#"{"message":"one"}"#))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        let second = app
            .oneshot(post_chat(r#"{"message":"two"}"#))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(second.headers().contains_key(header::RETRY_AFTER));

        let body = json_body(second).await;
        assert_eq!(body["scope"], "caller");
        let retry_after_ms = body["retryAfterMs"].as_i64().unwrap();
        assert!(retry_after_ms > 0 && retry_after_ms <= 5000);
    }

    #[tokio::test]
    async fn test_forwarded_callers_are_limited_separately() {
        let app = app(StubClient::replying("ok"));

        for ip in ["203.0.113.1", "203.0.113.2"] {
            let mut request = post_chat(r#"{"message":"hi"}"#);
            request
                .headers_mut()
                .insert("x-forwarded-for", ip.parse().unwrap());
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_untrusted_forwarded_for_cannot_dodge_caller_limit() {
        let config = ChatConfig {
            trust_forwarded_for: false,
            ..ChatConfig::default()
        };
        let app = app_with(StubClient::replying("ok"), config);

        let mut statuses = Vec::new();
        for ip in ["203.0.113.1", "203.0.113.2"] {
            let mut request = post_chat(r#"{"message":"hi"}"#);
            request
                .headers_mut()
                .insert("x-forwarded-for", ip.parse().unwrap());
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(statuses, [StatusCode::OK, StatusCode::TOO_MANY_REQUESTS]);
    }

    #[tokio::test]
    async fn test_upstream_failure_is_generic_500() {
        let response = app(StubClient::failing("api key sk-secret rejected"))
            .oneshot(post_chat(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = json_body(response).await;
        assert!(!body.to_string().contains("sk-secret"));
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_health_reports_limits_and_usage() {
        let app = app(StubClient::replying("ok"));
        app.clone()
            .oneshot(post_chat(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        let response = app.oneshot(get_health()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["ok"], true);
        assert_eq!(body["limits"]["maxMessageChars"], 60);
        assert_eq!(body["limits"]["perCaller"], json!({ "maxRequests": 1, "windowMs": 5000 }));
        assert_eq!(body["limits"]["global"], json!({ "maxRequests": 30, "windowMs": 60000 }));
        assert_eq!(body["usage"]["promptsInWindow"], 1);
        assert!(body["usage"]["windowStartTimestamp"].is_string());
    }
}

#[cfg(test)]
mod error_tests {
    use axum::http::StatusCode;
    use platform::rate_limit::LimitScope;

    use crate::error::ChatError;
    use kernel::error::kind::ErrorKind;

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ChatError::EmptyMessage.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ChatError::MessageTooLong { max: 60, received: 61 }.status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ChatError::RateLimited {
                scope: LimitScope::Global,
                retry_after_ms: 10
            }
            .status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ChatError::Upstream("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ChatError::Store("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_rate_limited_app_error_carries_retry_after() {
        let err = ChatError::RateLimited {
            scope: LimitScope::PerCaller,
            retry_after_ms: 1500,
        }
        .to_app_error();

        assert_eq!(err.kind(), ErrorKind::TooManyRequests);
        assert_eq!(err.retry_after_secs(), Some(2));
        assert_eq!(err.body()["retryAfterMs"], 1500);
        assert_eq!(err.body()["scope"], "caller");
    }

    #[test]
    fn test_server_errors_hide_detail() {
        let body = ChatError::Store("/var/data/usage.json: permission denied".into())
            .to_app_error()
            .body();
        assert!(!body.to_string().contains("permission denied"));
    }
}
