//! Fetching with rate-limit backoff.
//!
//! [`FetchController`] asks its [`ForumClient`] for the newest posts of a
//! subreddit.  When the client reports a rate limit, the controller waits
//! and asks again; any other failure is logged and yields no posts.
//!
//! ```text
//! Requesting ──► Success
//!     │ ▲
//!     │ └── Sleeping ◄── RateLimited
//!     └───────────────────► Failed
//! ```
//!
//! ## For contributors
//!
//! How the controller waits is a [`Suspend`] strategy, so blocking and
//! cooperative runs share one retry loop:
//!
//! * [`BlockingSleep`] blocks the thread for a fixed delay.
//! * [`CooperativeSleep`] yields to the tokio scheduler for as long as the
//!   server asked, falling back to a fixed delay when it did not say.
//!
//! Retries are unbounded unless [`FetchController::with_max_retries`] is
//! used.  Callers wanting a wall-clock bound wrap [`FetchController::fetch`]
//! in [`tokio::time::timeout`].

use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, warn, Instrument, Span};

use crate::error::FetchError;
use crate::source::{ForumClient, PostRecord};

/// Posts fetched when the caller does not say otherwise.
pub const DEFAULT_LIMIT: u32 = 5;

/// What to fetch: up to `limit` of the newest posts in `resource`.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct FetchRequest {
    resource: String,
    limit: u32,
}

impl FetchRequest {
    pub fn new(resource: impl Into<String>, limit: u32) -> Result<Self, FetchError> {
        let resource = resource.into();
        if resource.trim().is_empty() {
            return Err(FetchError::InvalidResource(resource));
        }
        Ok(Self { resource, limit })
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }
}

/// How the controller waits out a rate limit.
#[async_trait]
pub trait Suspend: Send + Sync {
    /// Pick the wait for a rate-limit signal carrying `hint`.
    fn wait_for(&self, hint: Option<Duration>) -> Duration;

    /// Wait for `duration`.
    async fn suspend(&self, duration: Duration);
}

/// Blocks the whole thread for a fixed delay, ignoring server hints.
#[derive(Debug, Clone, Copy)]
pub struct BlockingSleep {
    delay: Duration,
}

impl BlockingSleep {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl Suspend for BlockingSleep {
    fn wait_for(&self, _hint: Option<Duration>) -> Duration {
        self.delay
    }

    async fn suspend(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Yields to the scheduler for the server-supplied wait.
#[derive(Debug, Clone, Copy)]
pub struct CooperativeSleep {
    fallback: Duration,
}

impl CooperativeSleep {
    pub fn new(fallback: Duration) -> Self {
        Self { fallback }
    }
}

#[async_trait]
impl Suspend for CooperativeSleep {
    fn wait_for(&self, hint: Option<Duration>) -> Duration {
        hint.unwrap_or(self.fallback)
    }

    async fn suspend(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry-on-rate-limit wrapper around a single owned [`ForumClient`].
///
/// All log events are emitted inside the span handed to [`new`](Self::new),
/// which names the component doing the fetching.
pub struct FetchController<C, S> {
    client: C,
    suspend: S,
    max_retries: Option<u32>,
    span: Span,
}

impl<C: ForumClient, S: Suspend> FetchController<C, S> {
    pub fn new(client: C, suspend: S, span: Span) -> Self {
        Self {
            client,
            suspend,
            max_retries: None,
            span,
        }
    }

    /// Give up after `max` rate-limited retries.  `None` retries forever.
    pub fn with_max_retries(mut self, max: Option<u32>) -> Self {
        self.max_retries = max;
        self
    }

    #[cfg(test)]
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Fetch the newest posts for `request`.
    ///
    /// Never fails: errors other than rate limits are logged and produce an
    /// empty list, exactly like a subreddit with no posts.
    pub async fn fetch(&mut self, request: &FetchRequest) -> Vec<PostRecord> {
        let span = self.span.clone();
        self.fetch_with_backoff(request).instrument(span).await
    }

    async fn fetch_with_backoff(&mut self, request: &FetchRequest) -> Vec<PostRecord> {
        let mut retries = 0u32;

        loop {
            let err = match self
                .client
                .list_newest(request.resource(), request.limit())
                .await
            {
                Ok(items) => {
                    let posts: Vec<PostRecord> = items
                        .into_iter()
                        .take(request.limit() as usize)
                        .map(PostRecord::from)
                        .collect();
                    info!(
                        client = self.client.name(),
                        subreddit = request.resource(),
                        count = posts.len(),
                        retries,
                        "fetched posts"
                    );
                    return posts;
                }
                Err(err) => err,
            };

            if !err.is_rate_limit() {
                error!(
                    client = self.client.name(),
                    subreddit = request.resource(),
                    error = %err,
                    "An error occurred while fetching posts"
                );
                return Vec::new();
            }

            if self.max_retries.is_some_and(|max| retries >= max) {
                error!(
                    client = self.client.name(),
                    subreddit = request.resource(),
                    retries,
                    "Rate limit still exceeded after the maximum number of retries"
                );
                return Vec::new();
            }

            let wait = self.suspend.wait_for(err.retry_after());
            warn!(
                subreddit = request.resource(),
                wait_secs = wait.as_secs_f64(),
                "Rate limit exceeded. Sleeping for {} seconds...",
                wait.as_secs_f64()
            );
            self.suspend.suspend(wait).await;
            retries += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use crate::source::RawItem;

    type Reply = Result<Vec<RawItem>, FetchError>;

    /// Replays scripted replies; once exhausted, repeats `fallback`.
    struct ScriptedClient {
        replies: VecDeque<Reply>,
        fallback: fn() -> Reply,
        calls: Vec<(String, u32)>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<Reply>, fallback: fn() -> Reply) -> Self {
            Self {
                replies: replies.into(),
                fallback,
                calls: Vec::new(),
            }
        }
    }

    #[async_trait]
    impl ForumClient for ScriptedClient {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn list_newest(&mut self, resource: &str, limit: u32) -> Reply {
            self.calls.push((resource.to_string(), limit));
            self.replies.pop_front().unwrap_or_else(self.fallback)
        }
    }

    /// Records every wait instead of sleeping.
    #[derive(Clone, Default)]
    struct RecordingSleep {
        fallback: Duration,
        waits: Arc<Mutex<Vec<Duration>>>,
    }

    #[async_trait]
    impl Suspend for RecordingSleep {
        fn wait_for(&self, hint: Option<Duration>) -> Duration {
            hint.unwrap_or(self.fallback)
        }

        async fn suspend(&self, duration: Duration) {
            self.waits.lock().unwrap().push(duration);
        }
    }

    fn raw(title: &str, author: Option<&str>, score: i64) -> RawItem {
        RawItem {
            title: title.to_string(),
            author: author.map(String::from),
            score,
        }
    }

    fn two_items() -> Reply {
        Ok(vec![raw("A", None, 10), raw("B", Some("bob"), 5)])
    }

    fn rate_limited(secs: u64) -> Reply {
        Err(FetchError::RateLimited {
            retry_after: Some(Duration::from_secs(secs)),
        })
    }

    fn always_rate_limited() -> Reply {
        rate_limited(1)
    }

    fn always_failing() -> Reply {
        Err(FetchError::Api {
            status: 500,
            message: "boom".into(),
        })
    }

    fn controller(
        client: ScriptedClient,
    ) -> (FetchController<ScriptedClient, RecordingSleep>, Arc<Mutex<Vec<Duration>>>) {
        let sleep = RecordingSleep {
            fallback: Duration::from_secs(10),
            ..Default::default()
        };
        let waits = sleep.waits.clone();
        (FetchController::new(client, sleep, Span::none()), waits)
    }

    fn request(limit: u32) -> FetchRequest {
        FetchRequest::new("testsub", limit).unwrap()
    }

    // -- request -------------------------------------------------------------

    #[test]
    fn empty_resource_is_rejected() {
        assert!(FetchRequest::new("", 5).is_err());
        assert!(FetchRequest::new("   ", 5).is_err());
        assert_eq!(FetchRequest::new("rust", 5).unwrap().resource(), "rust");
    }

    // -- controller ----------------------------------------------------------

    #[tokio::test]
    async fn normalizes_missing_author() {
        let (mut fetcher, waits) = controller(ScriptedClient::new(vec![], two_items));

        let posts = fetcher.fetch(&request(2)).await;

        assert_eq!(
            posts,
            vec![
                PostRecord { title: "A".into(), author: "Unknown".into(), score: 10 },
                PostRecord { title: "B".into(), author: "bob".into(), score: 5 },
            ]
        );
        assert_eq!(fetcher.client().calls, vec![("testsub".to_string(), 2)]);
        assert!(waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn sleeps_once_then_returns_retry_result() {
        let client = ScriptedClient::new(vec![rate_limited(2)], two_items);
        let (mut fetcher, waits) = controller(client);

        let posts = fetcher.fetch(&request(2)).await;

        assert_eq!(*waits.lock().unwrap(), vec![Duration::from_secs(2)]);
        assert_eq!(fetcher.client().calls.len(), 2);
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, ["A", "B"], "no duplicates, nothing lost");
    }

    #[tokio::test]
    async fn missing_hint_uses_fallback_delay() {
        let client = ScriptedClient::new(
            vec![Err(FetchError::RateLimited { retry_after: None })],
            two_items,
        );
        let (mut fetcher, waits) = controller(client);

        fetcher.fetch(&request(2)).await;

        assert_eq!(*waits.lock().unwrap(), vec![Duration::from_secs(10)]);
    }

    #[tokio::test]
    async fn generic_failure_returns_empty_without_retry() {
        let (mut fetcher, waits) = controller(ScriptedClient::new(vec![], always_failing));

        let posts = fetcher.fetch(&request(5)).await;

        assert!(posts.is_empty());
        assert_eq!(fetcher.client().calls.len(), 1);
        assert!(waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failure_after_rate_limit_is_not_retried() {
        let client = ScriptedClient::new(vec![rate_limited(1)], always_failing);
        let (mut fetcher, waits) = controller(client);

        assert!(fetcher.fetch(&request(5)).await.is_empty());
        assert_eq!(fetcher.client().calls.len(), 2);
        assert_eq!(waits.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zero_limit_yields_empty() {
        let client = ScriptedClient::new(vec![Ok(vec![])], always_failing);
        let (mut fetcher, waits) = controller(client);

        assert!(fetcher.fetch(&request(0)).await.is_empty());
        assert_eq!(fetcher.client().calls, vec![("testsub".to_string(), 0)]);
        assert!(waits.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn result_never_exceeds_limit() {
        // A misbehaving client returning more than asked for.
        let (mut fetcher, _) = controller(ScriptedClient::new(vec![], two_items));
        assert_eq!(fetcher.fetch(&request(1)).await.len(), 1);
    }

    #[tokio::test]
    async fn short_listing_is_not_an_error() {
        let (mut fetcher, _) = controller(ScriptedClient::new(vec![], two_items));
        assert_eq!(fetcher.fetch(&request(50)).await.len(), 2);
    }

    #[tokio::test]
    async fn repeated_fetch_is_idempotent() {
        let (mut fetcher, _) = controller(ScriptedClient::new(vec![], two_items));

        let first = fetcher.fetch(&request(2)).await;
        let second = fetcher.fetch(&request(2)).await;

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn retry_ceiling_gives_up() {
        let (fetcher, waits) = controller(ScriptedClient::new(vec![], always_rate_limited));
        let mut fetcher = fetcher.with_max_retries(Some(3));

        assert!(fetcher.fetch(&request(5)).await.is_empty());
        assert_eq!(waits.lock().unwrap().len(), 3);
        assert_eq!(fetcher.client().calls.len(), 4);
    }

    #[tokio::test]
    async fn unbounded_retry_keeps_going() {
        let replies = (0..20).map(|_| rate_limited(1)).collect();
        let (mut fetcher, waits) = controller(ScriptedClient::new(replies, two_items));

        assert_eq!(fetcher.fetch(&request(2)).await.len(), 2);
        assert_eq!(waits.lock().unwrap().len(), 20);
    }

    #[tokio::test]
    async fn blocking_controller_ignores_server_hint() {
        // An hour-long hint; only the 1 ms fixed delay may be slept.
        let client = ScriptedClient::new(vec![rate_limited(3600)], two_items);
        let sleep = BlockingSleep::new(Duration::from_millis(1));
        let mut fetcher = FetchController::new(client, sleep, Span::none());

        let started = std::time::Instant::now();
        let posts = fetcher.fetch(&request(2)).await;

        assert_eq!(posts.len(), 2);
        assert_eq!(fetcher.client().calls.len(), 2);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    // -- suspension strategies -----------------------------------------------

    #[test]
    fn blocking_sleep_ignores_server_hint() {
        let sleep = BlockingSleep::new(Duration::from_secs(5));
        assert_eq!(sleep.wait_for(Some(Duration::from_secs(60))), Duration::from_secs(5));
        assert_eq!(sleep.wait_for(None), Duration::from_secs(5));
    }

    #[test]
    fn cooperative_sleep_follows_server_hint() {
        let sleep = CooperativeSleep::new(Duration::from_secs(10));
        assert_eq!(sleep.wait_for(Some(Duration::from_secs(2))), Duration::from_secs(2));
        assert_eq!(sleep.wait_for(None), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cooperative_sleep_yields() {
        let sleep = CooperativeSleep::new(Duration::ZERO);
        sleep.suspend(Duration::from_millis(1)).await;
    }
}
