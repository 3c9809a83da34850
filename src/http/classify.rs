//! Status and content-type classification of HTTP responses.

use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, HeaderMap};

use super::retry::RetryPolicy;

/// Media-type token that marks a body as structured data.
pub const JSON_MEDIA_TYPE: &str = "application/json";

/// How a known status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    RateLimited,
    ServerError,
    NotFound,
}

/// Known statuses, their treatment and the wording used when logging them.
/// Statuses absent from this table are unclassified.
pub const STATUS_TABLE: &[(u16, StatusClass, &str)] = &[
    (200, StatusClass::Success, "was successful"),
    (429, StatusClass::RateLimited, "was rate limited"),
    (500, StatusClass::ServerError, "failed due to a server error"),
    (502, StatusClass::ServerError, "failed due to a bad gateway"),
    (
        503,
        StatusClass::ServerError,
        "failed due to a service unavailable error",
    ),
    (504, StatusClass::ServerError, "failed due to a gateway timeout"),
    (404, StatusClass::NotFound, "failed due to a not found error"),
];

/// Looks a status up in [`STATUS_TABLE`].
pub fn lookup(status: StatusCode) -> Option<(StatusClass, &'static str)> {
    STATUS_TABLE
        .iter()
        .find(|(code, _, _)| *code == status.as_u16())
        .map(|(_, class, description)| (*class, *description))
}

/// How the body of a successful response should be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Json,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FatalReason {
    NotFound,
    Unclassified(StatusCode),
}

/// Outcome of classifying one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseVerdict {
    Success(BodyFormat),
    RateLimited(Duration),
    RetryableServerError(Duration),
    Fatal(FatalReason),
}

impl ResponseVerdict {
    /// Wait prescribed by the verdict, if it is retryable.
    pub fn wait(&self) -> Option<Duration> {
        match self {
            ResponseVerdict::RateLimited(wait) | ResponseVerdict::RetryableServerError(wait) => {
                Some(*wait)
            }
            _ => None,
        }
    }
}

/// True when the declared content type contains the JSON media type.
pub fn is_json_response(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|content_type| content_type.contains(JSON_MEDIA_TYPE))
}

/// Classifies a response from its status and headers.
///
/// `attempt` is zero-based and only affects the wait attached to retryable
/// verdicts. The body format is decided here, before anything is parsed.
pub fn classify(
    status: StatusCode,
    headers: &HeaderMap,
    attempt: u32,
    policy: &RetryPolicy,
) -> ResponseVerdict {
    match lookup(status).map(|(class, _)| class) {
        Some(StatusClass::Success) => {
            if is_json_response(headers) {
                ResponseVerdict::Success(BodyFormat::Json)
            } else {
                ResponseVerdict::Success(BodyFormat::Text)
            }
        }
        Some(StatusClass::RateLimited) => ResponseVerdict::RateLimited(policy.backoff(attempt)),
        Some(StatusClass::ServerError) => {
            ResponseVerdict::RetryableServerError(policy.backoff(attempt))
        }
        Some(StatusClass::NotFound) => ResponseVerdict::Fatal(FatalReason::NotFound),
        None => ResponseVerdict::Fatal(FatalReason::Unclassified(status)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with(content_type: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        headers
    }

    #[test]
    fn test_status_table_is_exhaustive_for_spec_codes() {
        let policy = RetryPolicy::default();
        let headers = headers_with("application/json");

        for (code, class, description) in STATUS_TABLE {
            let status = StatusCode::from_u16(*code).unwrap();
            let verdict = classify(status, &headers, 1, &policy);
            assert!(!description.is_empty());
            match class {
                StatusClass::Success => {
                    assert_eq!(verdict, ResponseVerdict::Success(BodyFormat::Json))
                }
                StatusClass::RateLimited => {
                    assert_eq!(verdict, ResponseVerdict::RateLimited(policy.backoff(1)))
                }
                StatusClass::ServerError => assert_eq!(
                    verdict,
                    ResponseVerdict::RetryableServerError(policy.backoff(1))
                ),
                StatusClass::NotFound => {
                    assert_eq!(verdict, ResponseVerdict::Fatal(FatalReason::NotFound))
                }
            }
        }
    }

    #[test]
    fn test_retryable_statuses_wait_base_to_the_attempt() {
        let policy = RetryPolicy::default();
        let headers = HeaderMap::new();

        for code in [429u16, 500, 502, 503, 504] {
            let status = StatusCode::from_u16(code).unwrap();
            let mut previous = None;
            for attempt in 0..5 {
                let wait = classify(status, &headers, attempt, &policy)
                    .wait()
                    .unwrap();
                assert_eq!(wait, Duration::from_secs(2u64.pow(attempt)));
                if let Some(previous) = previous {
                    assert!(wait > previous);
                }
                previous = Some(wait);
            }
        }
    }

    #[test]
    fn test_unlisted_status_is_unclassified() {
        let policy = RetryPolicy::default();
        for code in [201u16, 301, 400, 401, 403, 418, 501] {
            let status = StatusCode::from_u16(code).unwrap();
            assert_eq!(
                classify(status, &HeaderMap::new(), 0, &policy),
                ResponseVerdict::Fatal(FatalReason::Unclassified(status))
            );
        }
    }

    #[test]
    fn test_not_found_is_distinct_from_unclassified() {
        let policy = RetryPolicy::default();
        let verdict = classify(StatusCode::NOT_FOUND, &HeaderMap::new(), 0, &policy);
        assert_eq!(verdict, ResponseVerdict::Fatal(FatalReason::NotFound));
        assert_eq!(verdict.wait(), None);
    }

    #[test]
    fn test_content_type_decides_body_format() {
        let policy = RetryPolicy::default();

        let json = classify(
            StatusCode::OK,
            &headers_with("application/json; charset=utf-8"),
            0,
            &policy,
        );
        assert_eq!(json, ResponseVerdict::Success(BodyFormat::Json));

        let text = classify(StatusCode::OK, &headers_with("text/plain"), 0, &policy);
        assert_eq!(text, ResponseVerdict::Success(BodyFormat::Text));

        let missing = classify(StatusCode::OK, &HeaderMap::new(), 0, &policy);
        assert_eq!(missing, ResponseVerdict::Success(BodyFormat::Text));
    }

    #[test]
    fn test_lookup() {
        assert_eq!(
            lookup(StatusCode::BAD_GATEWAY),
            Some((StatusClass::ServerError, "failed due to a bad gateway"))
        );
        assert_eq!(lookup(StatusCode::FORBIDDEN), None);
    }
}
