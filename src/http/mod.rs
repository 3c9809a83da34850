//! Resilient fetch engine: shared session, response classification,
//! status-driven retry with exponential backoff, and cursor pagination.

pub mod classify;
mod client;
mod paginate;
mod retry;
mod session;

pub use classify::{BodyFormat, FatalReason, ResponseVerdict, classify};
pub use client::{BodyMode, FetchRequest, HttpClient, Payload};
pub use paginate::{DEFAULT_MAX_PAGES, DEFAULT_PAGE_SIZE, Page, PageReport, Paginator};
pub use retry::{AttemptFailure, FetchError, MAX_ATTEMPTS, RATE_LIMIT_BASE, RetryPolicy};
pub use session::{Session, SessionConfig, USER_AGENT};
