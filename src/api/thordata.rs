//! Purpose: Blocking HTTP client for the Thordata Web Scraper task API.
//! Exports: `ThordataClient`, `RetryPolicy`, `TaskState`, `classify_status`.
//! Role: Vendor boundary behind `ScrapeClient`; submit, poll, link, download.
//! Invariants: Vendor envelopes are `{code, msg, data}`; any code other than 200 is a remote error.
//! Invariants: Polling and result-link failures carry a `Task <id>` message prefix.
//! Invariants: Only the result download is retried; submission and polling are not.
//! Invariants: Submit, poll and link calls share one deadline of `max_wait` from submission.
#![allow(clippy::result_large_err)]

use std::error::Error as StdError;
use std::io::{self, Read};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bstr::ByteSlice;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::config::{ClientConfig, Credentials, Endpoints, WaitPolicy};
use super::orchestrator::{ScrapeClient, TaskRequest};
use crate::core::error::{Error, ErrorKind};

type ApiResult<T> = Result<T, Error>;

const VENDOR_OK: i64 = 200;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const READ_TIMEOUT: Duration = Duration::from_secs(60);
const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Clone)]
pub struct ThordataClient {
    inner: Arc<ThordataClientInner>,
}

struct ThordataClientInner {
    credentials: Credentials,
    endpoints: Endpoints,
    agent: ureq::Agent,
    download_retry: RetryPolicy,
}

/// Retry schedule for the result download: `backoff * 2^(attempt-1)` between attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.backoff.saturating_mul(factor)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 5,
            backoff: Duration::from_millis(600),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskState {
    Pending(String),
    Done,
    Failed(String),
}

pub fn classify_status(status: &str) -> TaskState {
    match status.trim().to_ascii_lowercase().as_str() {
        "ready" | "success" | "succeeded" | "finished" => TaskState::Done,
        "failed" | "error" | "cancelled" | "canceled" => TaskState::Failed(status.to_string()),
        _ => TaskState::Pending(status.to_string()),
    }
}

#[derive(Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct CreatedTask {
    task_id: Value,
}

#[derive(Debug, Deserialize)]
struct TaskStatusEntry {
    #[serde(default)]
    task_id: Option<Value>,
    status: String,
}

#[derive(Debug, Deserialize)]
struct DownloadLink {
    download: String,
}

enum Auth {
    Scraper,
    Public,
}

/// Point in time after which no vendor call of the current job may still be running.
#[derive(Clone, Copy, Debug)]
struct Deadline {
    at: Instant,
    max_wait: Duration,
}

impl Deadline {
    fn after(max_wait: Duration) -> Self {
        let now = Instant::now();
        let at = now
            .checked_add(max_wait)
            .unwrap_or_else(|| now + Duration::from_secs(u64::from(u32::MAX)));
        Self { at, max_wait }
    }

    fn remaining(&self) -> Option<Duration> {
        self.at
            .checked_duration_since(Instant::now())
            .filter(|left| !left.is_zero())
    }

    fn expired(&self) -> bool {
        self.remaining().is_none()
    }

    fn exceeded(&self, subject: &str) -> Error {
        Error::new(ErrorKind::Timeout)
            .with_message(format!(
                "{subject} did not complete within {:?}",
                self.max_wait
            ))
            .with_hint("Raise --max-wait, or fetch the result later using the task id.")
    }
}

impl ThordataClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(CONNECT_TIMEOUT)
            .timeout_read(READ_TIMEOUT)
            .user_agent(concat!("fbscrape/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            inner: Arc::new(ThordataClientInner {
                credentials: config.credentials,
                endpoints: config.endpoints,
                agent,
                download_retry: RetryPolicy::default(),
            }),
        }
    }

    fn create_task(&self, task: &TaskRequest<'_>, deadline: Deadline) -> ApiResult<String> {
        let parameters = task.parameters.to_vendor_json().map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode spider parameters")
                .with_source(err)
        })?;
        let url = build_url(&self.inner.endpoints.scraperapi_base, &["builder"])?;
        let fields = [
            ("spider_name", task.descriptor.target_label),
            ("spider_id", task.descriptor.job_type_id),
            ("spider_parameters", parameters.as_str()),
            ("spider_errors", "true"),
            ("file_name", task.file_name.as_str()),
        ];
        let created: CreatedTask =
            self.post_form(&url, Auth::Scraper, &fields, deadline, "Task submission")?;
        let task_id = id_string(&created.task_id);
        if task_id.is_empty() {
            return Err(Error::new(ErrorKind::Remote)
                .with_message("task submission returned an empty task id"));
        }
        Ok(task_id)
    }

    fn task_status(&self, task_id: &str, deadline: Deadline) -> ApiResult<String> {
        let url = build_url(
            &self.inner.endpoints.openapi_base,
            &["api", "web-scraper-api", "tasks-status"],
        )?;
        let subject = format!("Task {task_id}");
        let entries: Vec<TaskStatusEntry> = self.post_form(
            &url,
            Auth::Public,
            &[("tasks_ids", task_id)],
            deadline,
            &subject,
        )?;
        entries
            .iter()
            .find(|entry| entry.task_id.as_ref().map(id_string).as_deref() == Some(task_id))
            .or_else(|| entries.first())
            .map(|entry| entry.status.clone())
            .ok_or_else(|| {
                Error::new(ErrorKind::Remote)
                    .with_message(format!("Task {task_id} has no status entry"))
            })
    }

    fn task_result_url(&self, task_id: &str, deadline: Deadline) -> ApiResult<String> {
        let url = build_url(
            &self.inner.endpoints.openapi_base,
            &["api", "web-scraper-api", "tasks-download"],
        )?;
        let subject = format!("Task {task_id}");
        let link: DownloadLink = self
            .post_form(
                &url,
                Auth::Public,
                &[("tasks_id", task_id), ("type", "json")],
                deadline,
                &subject,
            )
            .map_err(|err| in_task(task_id, err))?;
        Ok(link.download)
    }

    /// Polls until the task is terminal or the job deadline passes.
    fn wait_for_task(&self, task_id: &str, wait: WaitPolicy, deadline: Deadline) -> ApiResult<()> {
        loop {
            let status = self
                .task_status(task_id, deadline)
                .map_err(|err| in_task(task_id, err))?;
            match classify_status(&status) {
                TaskState::Done => {
                    tracing::debug!(task_id, %status, "task reached terminal success state");
                    return Ok(());
                }
                TaskState::Failed(status) => {
                    return Err(Error::new(ErrorKind::Remote)
                        .with_message(format!("Task {task_id} failed with status {status}")));
                }
                TaskState::Pending(status) => {
                    tracing::debug!(task_id, %status, "task still running");
                }
            }
            let Some(left) = deadline.remaining() else {
                return Err(deadline.exceeded(&format!("Task {task_id}")));
            };
            thread::sleep(wait.poll_interval.min(left));
        }
    }

    fn download_text(&self, url: &str) -> ApiResult<String> {
        let policy = self.inner.download_retry;
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.inner.agent.get(url).call() {
                Ok(resp) => return read_body_text(resp),
                Err(err) if attempt <= policy.retries && is_retryable(&err) => {
                    let delay = policy.delay_for(attempt);
                    tracing::warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "result download failed; retrying"
                    );
                    thread::sleep(delay);
                }
                Err(ureq::Error::Status(code, _)) => {
                    return Err(Error::new(error_kind_from_status(code))
                        .with_message(format!("result download failed with status {code}")));
                }
                Err(ureq::Error::Transport(err)) => {
                    return Err(Error::new(ErrorKind::Io)
                        .with_message("result download failed")
                        .with_source(err));
                }
            }
        }
    }

    /// Every call is capped by what is left of `deadline`; running out is reported
    /// as a `Timeout` of `subject`.
    fn post_form<T>(
        &self,
        url: &Url,
        auth: Auth,
        fields: &[(&str, &str)],
        deadline: Deadline,
        subject: &str,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned,
    {
        let Some(timeout) = deadline.remaining() else {
            return Err(deadline.exceeded(subject));
        };
        let creds = &self.inner.credentials;
        let request = self
            .inner
            .agent
            .post(url.as_str())
            .timeout(timeout)
            .set("Accept", "application/json");
        let request = match auth {
            Auth::Scraper => request.set(
                "Authorization",
                &format!("Bearer {}", creds.scraper_token),
            ),
            Auth::Public => request
                .set("token", &creds.public_token)
                .set("key", &creds.public_key),
        };

        match request.send_form(fields) {
            Ok(resp) => {
                let body = read_body_text(resp)?;
                unwrap_envelope(&body)
            }
            Err(ureq::Error::Status(code, resp)) => Err(parse_error_response(code, resp)),
            Err(ureq::Error::Transport(err))
                if deadline.expired() || (timeout < READ_TIMEOUT && is_timeout(&err)) =>
            {
                Err(deadline.exceeded(subject).with_source(err))
            }
            Err(ureq::Error::Transport(err)) => Err(Error::new(ErrorKind::Io)
                .with_message("request failed")
                .with_source(err)),
        }
    }
}

impl ScrapeClient for ThordataClient {
    fn run_task(&self, task: &TaskRequest<'_>, wait: WaitPolicy) -> Result<String, Error> {
        let deadline = Deadline::after(wait.max_wait);
        let task_id = self.create_task(task, deadline)?;
        tracing::info!(task_id = %task_id, spider_id = task.descriptor.job_type_id, "task submitted");
        self.wait_for_task(&task_id, wait, deadline)?;
        self.task_result_url(&task_id, deadline)
    }

    fn download(&self, url: &str) -> Result<String, Error> {
        self.download_text(url)
    }
}

fn unwrap_envelope<T: DeserializeOwned>(body: &str) -> ApiResult<T> {
    let envelope: Envelope<T> = serde_json::from_str(body).map_err(|err| {
        Error::new(ErrorKind::Remote)
            .with_message("invalid response json")
            .with_source(err)
    })?;
    if envelope.code != VENDOR_OK {
        let msg = envelope.msg.unwrap_or_else(|| "no message".to_string());
        return Err(Error::new(ErrorKind::Remote)
            .with_message(format!("vendor error {}: {msg}", envelope.code)));
    }
    envelope.data.ok_or_else(|| {
        Error::new(ErrorKind::Remote).with_message("vendor response is missing data")
    })
}

fn read_body_text(response: ureq::Response) -> ApiResult<String> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to read response body")
                .with_source(err)
        })?;
    Ok(bytes.trim().to_str_lossy().into_owned())
}

fn parse_error_response(status: u16, response: ureq::Response) -> Error {
    let body = response.into_string().unwrap_or_default();
    if let Err(err) = unwrap_envelope::<Value>(&body) {
        if err.message() != Some("invalid response json") {
            return err;
        }
    }
    Error::new(error_kind_from_status(status)).with_message(format!("remote error status {status}"))
}

fn error_kind_from_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Config,
        408 | 504 => ErrorKind::Timeout,
        _ => ErrorKind::Remote,
    }
}

fn is_retryable(err: &ureq::Error) -> bool {
    match err {
        ureq::Error::Status(code, _) => RETRY_STATUSES.contains(code),
        ureq::Error::Transport(_) => true,
    }
}

fn is_timeout(err: &ureq::Transport) -> bool {
    StdError::source(err)
        .and_then(|source| source.downcast_ref::<io::Error>())
        .is_some_and(|io_err| {
            matches!(io_err.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
        })
}

fn in_task(task_id: &str, err: Error) -> Error {
    let message = err.detailed_message();
    if message.starts_with("Task ") {
        return err;
    }
    let mut wrapped = Error::new(err.kind()).with_message(format!("Task {task_id}: {message}"));
    if let Some(hint) = err.hint() {
        wrapped = wrapped.with_hint(hint);
    }
    wrapped
}

fn id_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn build_url(base_url: &Url, segments: &[&str]) -> ApiResult<Url> {
    let mut url = base_url.clone();
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::new(ErrorKind::Config).with_message("base url cannot be a base"))?;
        path.clear();
        for segment in segments {
            path.push(segment);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::{
        CreatedTask, Deadline, DownloadLink, RetryPolicy, TaskState, TaskStatusEntry,
        ThordataClient, ThordataClientInner, build_url, classify_status, error_kind_from_status,
        id_string, in_task, unwrap_envelope,
    };
    use crate::api::config::{Credentials, Endpoints};
    use crate::core::error::{Error, ErrorKind};
    use serde_json::json;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::{Duration, Instant};
    use url::Url;

    fn client_for(base: &str, download_retry: RetryPolicy) -> ThordataClient {
        let credentials =
            Credentials::from_lookup(|_| Some("secret".to_string())).expect("credentials");
        let endpoints = Endpoints::new(base, base).expect("endpoints");
        ThordataClient {
            inner: Arc::new(ThordataClientInner {
                credentials,
                endpoints,
                agent: ureq::AgentBuilder::new()
                    .timeout_read(Duration::from_secs(5))
                    .build(),
                download_retry,
            }),
        }
    }

    fn fast_retry(retries: u32) -> RetryPolicy {
        RetryPolicy {
            retries,
            backoff: Duration::from_millis(1),
        }
    }

    fn status_response(code: u16, reason: &str) -> String {
        format!("HTTP/1.1 {code} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
    }

    fn body_response(body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        )
    }

    /// Answers one connection per canned response, in order; returns the base url and a hit counter.
    fn serve(responses: Vec<String>, hold: Duration) -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let base = format!("http://{}", listener.local_addr().expect("addr"));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        std::thread::spawn(move || {
            for response in responses {
                let Ok((mut stream, _)) = listener.accept() else {
                    return;
                };
                counter.fetch_add(1, Ordering::SeqCst);
                let mut reader = BufReader::new(stream.try_clone().expect("clone"));
                let mut line = String::new();
                while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
                    if line == "\r\n" {
                        break;
                    }
                    line.clear();
                }
                std::thread::sleep(hold);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        (base, hits)
    }

    #[test]
    fn status_classification() {
        assert_eq!(classify_status("Ready"), TaskState::Done);
        assert_eq!(classify_status(" SUCCESS "), TaskState::Done);
        assert_eq!(
            classify_status("Failed"),
            TaskState::Failed("Failed".to_string())
        );
        assert_eq!(
            classify_status("Running"),
            TaskState::Pending("Running".to_string())
        );
    }

    #[test]
    fn retry_delays_grow_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.retries, 5);
        assert_eq!(policy.delay_for(1), Duration::from_millis(600));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(2400));
        assert_eq!(policy.delay_for(5), Duration::from_millis(9600));
    }

    #[test]
    fn build_url_replaces_path() {
        let base = Url::parse("https://openapi.thordata.com/").expect("url");
        let url = build_url(&base, &["api", "web-scraper-api", "tasks-status"]).expect("url");
        assert_eq!(
            url.as_str(),
            "https://openapi.thordata.com/api/web-scraper-api/tasks-status"
        );
    }

    #[test]
    fn envelope_with_ok_code_yields_data() {
        let body = json!({"code": 200, "data": {"task_id": 4242}}).to_string();
        let created: CreatedTask = unwrap_envelope(&body).expect("data");
        assert_eq!(id_string(&created.task_id), "4242");

        let body = json!({"code": 200, "data": {"download": "https://files/x.json"}}).to_string();
        let link: DownloadLink = unwrap_envelope(&body).expect("data");
        assert_eq!(link.download, "https://files/x.json");

        let body = json!({"code": 200, "data": [{"task_id": "t1", "status": "Running"}]}).to_string();
        let entries: Vec<TaskStatusEntry> = unwrap_envelope(&body).expect("data");
        assert_eq!(entries[0].status, "Running");
    }

    #[test]
    fn envelope_with_error_code_is_remote_error() {
        let body = json!({"code": 401, "msg": "invalid token"}).to_string();
        let err = unwrap_envelope::<CreatedTask>(&body).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(err.message(), Some("vendor error 401: invalid token"));
    }

    #[test]
    fn envelope_rejects_non_json() {
        let err = unwrap_envelope::<CreatedTask>("<html>").expect_err("err");
        assert_eq!(err.message(), Some("invalid response json"));
    }

    #[test]
    fn status_codes_map_to_kinds() {
        assert_eq!(error_kind_from_status(403), ErrorKind::Config);
        assert_eq!(error_kind_from_status(504), ErrorKind::Timeout);
        assert_eq!(error_kind_from_status(500), ErrorKind::Remote);
    }

    #[test]
    fn in_task_prefixes_once() {
        let err = in_task(
            "77",
            Error::new(ErrorKind::Io).with_message("request failed"),
        );
        assert_eq!(err.message(), Some("Task 77: request failed"));
        assert_eq!(err.kind(), ErrorKind::Io);

        let again = in_task("77", err);
        assert_eq!(again.message(), Some("Task 77: request failed"));
    }

    #[test]
    fn download_retries_transient_statuses() {
        let (base, hits) = serve(
            vec![
                status_response(503, "Service Unavailable"),
                status_response(429, "Too Many Requests"),
                body_response("{\"ok\":true}"),
            ],
            Duration::ZERO,
        );
        let client = client_for(&base, fast_retry(5));

        let body = client
            .download_text(&format!("{base}/files/result"))
            .expect("body");
        assert_eq!(body, "{\"ok\":true}");
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn download_gives_up_after_retries() {
        let (base, hits) = serve(
            vec![status_response(503, "Service Unavailable"); 3],
            Duration::ZERO,
        );
        let client = client_for(&base, fast_retry(2));

        let err = client
            .download_text(&format!("{base}/files/result"))
            .expect_err("exhausted");
        assert_eq!(err.kind(), ErrorKind::Remote);
        assert_eq!(err.message(), Some("result download failed with status 503"));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn download_does_not_retry_client_errors() {
        let (base, hits) = serve(
            vec![
                status_response(404, "Not Found"),
                body_response("unreachable"),
            ],
            Duration::ZERO,
        );
        let client = client_for(&base, fast_retry(5));

        let err = client
            .download_text(&format!("{base}/files/result"))
            .expect_err("not found");
        assert_eq!(err.message(), Some("result download failed with status 404"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unanswered_status_request_is_bounded_by_deadline() {
        let (base, _) = serve(
            vec![body_response("{\"code\":200,\"data\":[]}")],
            Duration::from_secs(3),
        );
        let client = client_for(&base, RetryPolicy::default());

        let started = Instant::now();
        let err = client
            .task_status("t1", Deadline::after(Duration::from_millis(200)))
            .expect_err("deadline");
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(
            err.message(),
            Some("Task t1 did not complete within 200ms")
        );
    }

    #[test]
    fn spent_deadline_fails_without_a_request() {
        let client = client_for("http://127.0.0.1:9", RetryPolicy::default());
        let err = client
            .task_result_url("t9", Deadline::after(Duration::ZERO))
            .expect_err("deadline");
        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert_eq!(err.message(), Some("Task t9 did not complete within 0ns"));
    }
}
