//! HTTP client with the status-driven retry loop.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::{debug, error, warn};
use reqwest::Response;
use serde_json::Value;

use super::classify::{self, BodyFormat, FatalReason, ResponseVerdict};
use super::retry::{AttemptFailure, FetchError, RetryPolicy, summarize};
use super::session::Session;

/// How the body of a successful response is handed back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// JSON or text, decided by the declared content type.
    #[default]
    Auto,
    /// Raw bytes regardless of content type.
    Binary,
}

/// One logical GET: target, query parameters and attempt budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    url: String,
    query: BTreeMap<String, String>,
    attempts: u32,
    mode: BodyMode,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>, attempts: u32) -> Self {
        Self {
            url: url.into(),
            query: BTreeMap::new(),
            attempts: attempts.max(1),
            mode: BodyMode::Auto,
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_params(mut self, params: &[(&str, &str)]) -> Self {
        for (key, value) in params {
            self.query.insert(key.to_string(), value.to_string());
        }
        self
    }

    pub fn binary(mut self) -> Self {
        self.mode = BodyMode::Binary;
        self
    }

    /// Copy of this request pointing at the page after `cursor`.
    pub fn with_cursor(&self, cursor: &str) -> Self {
        self.clone().with_query("cursor", cursor)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn mode(&self) -> BodyMode {
        self.mode
    }
}

/// Body of a successful response.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Bytes(Vec<u8>),
}

impl Payload {
    pub fn into_json(self) -> Option<Value> {
        match self {
            Payload::Json(value) => Some(value),
            _ => None,
        }
    }

    /// Text form of the payload. JSON is re-serialised, bytes must be UTF-8.
    pub fn into_text(self) -> Option<String> {
        match self {
            Payload::Text(text) => Some(text),
            Payload::Json(value) => Some(value.to_string()),
            Payload::Bytes(bytes) => String::from_utf8(bytes).ok(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Bytes(bytes) => bytes,
            Payload::Text(text) => text.into_bytes(),
            Payload::Json(value) => value.to_string().into_bytes(),
        }
    }
}

/// Fetch engine: a shared [`Session`] plus the retry policy applied to every request.
#[derive(Debug, Clone)]
pub struct HttpClient {
    session: Arc<Session>,
    policy: RetryPolicy,
}

impl HttpClient {
    pub fn new(session: Arc<Session>, policy: RetryPolicy) -> Self {
        Self { session, policy }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Starts a request carrying this client's attempt budget.
    pub fn request(&self, url: impl Into<String>) -> FetchRequest {
        FetchRequest::new(url, self.policy.max_attempts)
    }

    /// Runs the attempt loop for one logical fetch.
    ///
    /// Returns the first successful payload. Rate limits, server faults and
    /// transport errors sleep `base^attempt` before the next attempt; 404 and
    /// unclassified statuses move on without sleeping. Never issues more than
    /// `request.attempts()` requests. `None` means the budget ran out.
    #[tracing::instrument(skip(self, request), fields(url = %request.url()))]
    pub async fn fetch_with_retry(&self, request: &FetchRequest) -> Option<Payload> {
        let budget = request.attempts();
        let mut failures: Vec<AttemptFailure> = Vec::new();

        for attempt in 0..budget {
            let error = match self.attempt(request, attempt).await {
                Ok(payload) => {
                    debug!(
                        "Request to {} using GET was successful (attempt {}/{})",
                        request.url(),
                        attempt + 1,
                        budget
                    );
                    return Some(payload);
                }
                Err(e) => e,
            };

            let delay = error.retry_delay(&self.policy, attempt);
            log_failure(request.url(), &error, attempt, budget, delay);
            failures.push(AttemptFailure { attempt, error });

            if let Some(delay) = delay {
                if attempt + 1 < budget {
                    tokio::time::sleep(delay).await;
                }
            }
        }

        error!(
            "Exceeded retries. Failed to fetch {} after {} attempts ({})",
            request.url(),
            budget,
            summarize(&failures)
        );
        None
    }

    /// Fetches a JSON document. Text bodies count as failure.
    pub async fn fetch_json(&self, request: &FetchRequest) -> Option<Value> {
        match self.fetch_with_retry(request).await {
            Some(Payload::Json(value)) => {
                debug!("Successfully fetched JSON from {}", request.url());
                Some(value)
            }
            Some(_) => {
                error!(
                    "Failed to fetch JSON from {}: response was not JSON",
                    request.url()
                );
                None
            }
            None => None,
        }
    }

    /// Fetches a body as text, whatever its declared content type.
    pub async fn fetch_text(&self, request: &FetchRequest) -> Option<String> {
        let text = self.fetch_with_retry(request).await?.into_text();
        if text.is_none() {
            error!("Failed to fetch text from {}: body is not UTF-8", request.url());
        }
        text
    }

    /// Fetches raw image bytes.
    pub async fn fetch_image(&self, url: &str) -> Option<Vec<u8>> {
        let request = self.request(url).binary();
        let bytes = self.fetch_with_retry(&request).await?.into_bytes();
        debug!("Successfully fetched image from {} ({} bytes)", url, bytes.len());
        Some(bytes)
    }

    /// Single attempt without retry.
    async fn attempt(&self, request: &FetchRequest, attempt: u32) -> Result<Payload, FetchError> {
        let client = self
            .session
            .acquire()
            .map_err(|e| FetchError::TransientNetwork(format!("{:#}", e)))?;

        let response = client
            .get(request.url())
            .query(request.query())
            .send()
            .await
            .map_err(|e| FetchError::TransientNetwork(e.to_string()))?;

        let status = response.status();
        match classify::classify(status, response.headers(), attempt, &self.policy) {
            ResponseVerdict::Success(format) => read_body(response, request.mode(), format).await,
            ResponseVerdict::RateLimited(wait) => Err(FetchError::RateLimited(wait)),
            ResponseVerdict::RetryableServerError(wait) => {
                Err(FetchError::ServerFault(status, wait))
            }
            ResponseVerdict::Fatal(FatalReason::NotFound) => Err(FetchError::NotFound),
            ResponseVerdict::Fatal(FatalReason::Unclassified(status)) => {
                Err(FetchError::UnclassifiedStatus(status))
            }
        }
    }
}

async fn read_body(
    response: Response,
    mode: BodyMode,
    format: BodyFormat,
) -> Result<Payload, FetchError> {
    match (mode, format) {
        (BodyMode::Binary, _) => response
            .bytes()
            .await
            .map(|bytes| Payload::Bytes(bytes.to_vec()))
            .map_err(|e| FetchError::BodyDecode(e.to_string())),
        (BodyMode::Auto, BodyFormat::Json) => response
            .json::<Value>()
            .await
            .map(Payload::Json)
            .map_err(|e| FetchError::BodyDecode(e.to_string())),
        (BodyMode::Auto, BodyFormat::Text) => response
            .text()
            .await
            .map(Payload::Text)
            .map_err(|e| FetchError::BodyDecode(e.to_string())),
    }
}

fn log_failure(
    url: &str,
    error: &FetchError,
    attempt: u32,
    budget: u32,
    delay: Option<std::time::Duration>,
) {
    let attempt = attempt + 1;
    match error {
        FetchError::RateLimited(wait) => warn!(
            "Request to {} using GET was rate limited (attempt {}/{}). Retrying in {:?}...",
            url, attempt, budget, wait
        ),
        FetchError::ServerFault(status, wait) => {
            let description = classify::lookup(*status)
                .map(|(_, description)| description)
                .unwrap_or("failed due to a server error");
            warn!(
                "Request to {} using GET {} (attempt {}/{}). Retrying in {:?}...",
                url, description, attempt, budget, wait
            )
        }
        FetchError::NotFound => error!(
            "Request to {} using GET failed due to a not found error (attempt {}/{})",
            url, attempt, budget
        ),
        FetchError::UnclassifiedStatus(status) => error!(
            "Request to {} using GET failed with status {} (attempt {}/{})",
            url,
            status.as_u16(),
            attempt,
            budget
        ),
        FetchError::TransientNetwork(_) | FetchError::BodyDecode(_) => error!(
            "HTTP error occurred while sending GET request to {}: {} (attempt {}/{}). Retrying in {:?}...",
            url,
            error,
            attempt,
            budget,
            delay.unwrap_or_default()
        ),
    }
}
