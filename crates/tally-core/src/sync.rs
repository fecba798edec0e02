use std::time::Duration;

use anyhow::Context;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};

use crate::error::{TallyError, TallyResult};
use crate::notify::{Notice, Notifier};

pub const DEFAULT_BASE_URL: &str = "https://jsonplaceholder.typicode.com";
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);

/// Linear backoff: after failed attempt `n` wait `unit_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub unit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            unit_delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.unit_delay.saturating_mul(attempt)
    }
}

/// Runs `op` until it succeeds, the attempts run out, or it fails with a
/// non-transient error. Each swallowed failure is reported as a warning.
pub async fn retry<T, F, Fut>(
    policy: &RetryPolicy,
    notifier: &dyn Notifier,
    mut op: F,
) -> TallyResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = TallyResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                warn!(attempt, max_attempts, error = %err, "API attempt failed");
                if attempt >= max_attempts || !err.is_transient() {
                    return Err(err);
                }
                notifier.notify(&Notice::warning(format!(
                    "API request failed. Retrying... ({attempt}/{max_attempts})"
                )));
                tokio::time::sleep(policy.delay_after(attempt)).await;
                attempt += 1;
            }
        }
    }
}

/// A todo as the remote API reports it. Fields are optional because the
/// payload is not under our control.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteTodo {
    pub id: Option<u64>,
    pub title: Option<String>,
    pub completed: bool,
}

impl RemoteTodo {
    pub fn from_value(value: &Value) -> Self {
        Self {
            id: value.get("id").and_then(Value::as_u64),
            title: value
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string),
            completed: value
                .get("completed")
                .and_then(Value::as_bool)
                .unwrap_or(false),
        }
    }
}

/// Parses a `GET /todos` body; anything but a JSON array is a format error.
pub fn parse_todo_list(body: &str) -> TallyResult<Vec<RemoteTodo>> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| TallyError::Format(err.to_string()))?;
    let items = value
        .as_array()
        .ok_or_else(|| TallyError::Format("Expected array of todos".to_string()))?;
    Ok(items.iter().map(RemoteTodo::from_value).collect())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub retry: RetryPolicy,
    pub probe_timeout: Duration,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            retry: RetryPolicy::default(),
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

/// HTTP client for the demo todo API.
#[derive(Debug, Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    todos_url: String,
    policy: RetryPolicy,
    probe_timeout: Duration,
}

impl SyncClient {
    pub fn new(settings: &ApiSettings) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("tally/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed building HTTP client for todo sync")?;

        Ok(Self {
            http,
            todos_url: format!("{}/todos", settings.base_url.trim_end_matches('/')),
            policy: settings.retry,
            probe_timeout: settings.probe_timeout,
        })
    }

    /// `HEAD /todos?_limit=1`. Never fails; unreachable means `false`.
    #[instrument(skip(self), fields(url = %self.todos_url))]
    pub async fn check_connectivity(&self) -> bool {
        let probe = self
            .http
            .head(format!("{}?_limit=1", self.todos_url))
            .timeout(self.probe_timeout)
            .send()
            .await;

        match probe {
            Ok(response) => {
                let ok = response.status().is_success();
                debug!(status = %response.status(), ok, "connectivity probe answered");
                ok
            }
            Err(err) => {
                warn!(error = %err, "API connectivity check failed");
                false
            }
        }
    }

    #[instrument(skip(self, notifier), fields(url = %self.todos_url))]
    pub async fn fetch_all(&self, notifier: &dyn Notifier) -> TallyResult<Vec<RemoteTodo>> {
        let todos = retry(&self.policy, notifier, || self.fetch_once()).await?;
        info!(count = todos.len(), "fetched remote todos");
        Ok(todos)
    }

    #[instrument(skip(self, notifier), fields(url = %self.todos_url, title_len = title.len()))]
    pub async fn post_one(&self, title: &str, notifier: &dyn Notifier) -> TallyResult<RemoteTodo> {
        let created = retry(&self.policy, notifier, || self.post_once(title)).await?;
        info!(remote_id = ?created.id, "posted todo to API");
        Ok(created)
    }

    async fn fetch_once(&self) -> TallyResult<Vec<RemoteTodo>> {
        let response = self.http.get(&self.todos_url).send().await?;
        let body = read_success_body(response).await?;
        parse_todo_list(&body)
    }

    async fn post_once(&self, title: &str) -> TallyResult<RemoteTodo> {
        let payload = json!({ "title": title, "completed": false, "userId": 1 });
        let body =
            serde_json::to_vec(&payload).map_err(|err| TallyError::Format(err.to_string()))?;

        let response = self
            .http
            .post(&self.todos_url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        let body = read_success_body(response).await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|err| TallyError::Format(err.to_string()))?;
        Ok(RemoteTodo::from_value(&value))
    }
}

async fn read_success_body(response: reqwest::Response) -> TallyResult<String> {
    let status = response.status();
    if !status.is_success() {
        warn!(status = %status, "API returned non-success status");
        return Err(TallyError::Http {
            status: status.as_u16(),
        });
    }
    Ok(response.text().await?)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use super::{RetryPolicy, parse_todo_list, retry};
    use crate::error::TallyError;
    use crate::notify::{Level, RecordingNotifier};

    #[tokio::test(start_paused = true)]
    async fn two_failures_then_success_warns_twice() {
        let notifier = RecordingNotifier::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let started = tokio::time::Instant::now();

        let result = retry(&RetryPolicy::default(), &notifier, move || async move {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(TallyError::Http { status: 500 })
            } else {
                Ok("payload")
            }
        })
        .await;

        assert_eq!(result, Ok("payload"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.count(Level::Warning), 2);
        assert_eq!(
            notifier.notices()[1].message,
            "API request failed. Retrying... (2/3)"
        );
        assert_eq!(started.elapsed(), Duration::from_millis(3000));
    }

    #[tokio::test(start_paused = true)]
    async fn last_failure_is_surfaced() {
        let notifier = RecordingNotifier::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retry(&RetryPolicy::default(), &notifier, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TallyError::Http { status: 429 })
        })
        .await;

        assert_eq!(result, Err(TallyError::Http { status: 429 }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(notifier.count(Level::Warning), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn format_errors_skip_retries() {
        let notifier = RecordingNotifier::new();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<(), _> = retry(&RetryPolicy::default(), &notifier, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TallyError::Format("object".to_string()))
        })
        .await;

        assert!(matches!(result, Err(TallyError::Format(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(notifier.notices().is_empty());
    }

    #[test]
    fn backoff_grows_linearly() {
        let policy = RetryPolicy {
            max_attempts: 5,
            unit_delay: Duration::from_millis(250),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(250));
        assert_eq!(policy.delay_after(3), Duration::from_millis(750));
    }

    #[test]
    fn todo_list_must_be_an_array() {
        let todos = parse_todo_list(r#"[{"id":1,"title":"a","completed":true}]"#)
            .expect("array body");
        assert_eq!(todos.len(), 1);
        assert_eq!(todos[0].title.as_deref(), Some("a"));
        assert!(todos[0].completed);

        assert!(matches!(
            parse_todo_list(r#"{"todos":[]}"#),
            Err(TallyError::Format(_))
        ));
        assert!(matches!(
            parse_todo_list("<html>"),
            Err(TallyError::Format(_))
        ));
    }
}
