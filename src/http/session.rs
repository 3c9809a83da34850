//! Shared, lazily opened HTTP session.

use std::sync::{PoisonError, RwLock};
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use reqwest::Client;

/// User agent sent with every request.
pub const USER_AGENT: &str = "clothfetch-cli";

/// Settings applied when the underlying client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub user_agent: String,
    pub timeout: Option<Duration>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            user_agent: USER_AGENT.to_string(),
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

/// Owns one reusable `reqwest::Client`.
///
/// The client is built on first [`acquire`](Session::acquire) and handed out
/// as cheap clones sharing one connection pool, so concurrent fetch chains
/// multiplex over the same session. [`close`](Session::close) drops the
/// cached client; requests already in flight keep their clone and finish.
#[derive(Debug, Default)]
pub struct Session {
    config: SessionConfig,
    client: RwLock<Option<Client>>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    /// Wraps an already built client. The session counts as open.
    pub fn from_client(client: Client) -> Self {
        Self {
            config: SessionConfig::default(),
            client: RwLock::new(Some(client)),
        }
    }

    /// Returns the open client, building and caching it if needed.
    pub fn acquire(&self) -> Result<Client> {
        if let Some(client) = self
            .client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
        {
            return Ok(client.clone());
        }

        let mut guard = self.client.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = guard.as_ref() {
            return Ok(client.clone());
        }

        let client = self.build_client()?;
        debug!("Opened HTTP session ({})", self.config.user_agent);
        *guard = Some(client.clone());
        Ok(client)
    }

    /// Drops the cached client. Safe to call repeatedly or before any acquire.
    pub fn close(&self) {
        let closed = self
            .client
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if closed.is_some() {
            debug!("Closed HTTP session");
        }
    }

    pub fn is_open(&self) -> bool {
        self.client
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn build_client(&self) -> Result<Client> {
        let mut builder = Client::builder()
            .use_rustls_tls()
            .user_agent(&self.config.user_agent);

        if let Some(timeout) = self.config.timeout {
            builder = builder.timeout(timeout);
        }

        builder.build().context("Failed to build HTTP client")
    }
}
