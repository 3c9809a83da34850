//! Service factory for building application dependencies.
//!
//! Construction of the shared session, HTTP client, overlay pipeline and
//! downloader lives here so commands only deal with configuration values.

use std::sync::Arc;

use log::debug;

use crate::{
    asset::AssetStore,
    download::AssetDownloader,
    http::{HttpClient, Session, SessionConfig},
    overlay::{OverlayPipeline, TemplateStore},
    runtime::Runtime,
};

use super::config::Config;

/// Build the transport session shared by every request of one run
pub fn build_session(config: &Config) -> Arc<Session> {
    let session_config = SessionConfig {
        timeout: config.request_timeout,
        ..SessionConfig::default()
    };
    debug!("Session configured with timeout {:?}", session_config.timeout);
    Arc::new(Session::new(session_config))
}

/// Build an HTTP client on top of a shared session
pub fn build_http_client(session: Arc<Session>, config: &Config) -> HttpClient {
    HttpClient::new(session, config.retry)
}

/// Build the overlay pipeline reading templates from the configured directory
pub fn build_pipeline<R: Runtime + Clone + 'static>(runtime: &R, config: &Config) -> OverlayPipeline {
    let runtime: Arc<dyn Runtime> = Arc::new(runtime.clone());
    let templates = TemplateStore::new(runtime, config.templates_dir.clone());
    OverlayPipeline::new(Arc::new(templates))
}

/// Build a downloader writing into the configured output directory
pub fn build_downloader<R: Runtime + Clone + 'static>(
    runtime: R,
    client: HttpClient,
    config: &Config,
) -> AssetDownloader<R> {
    let pipeline = build_pipeline(&runtime, config);
    let store = AssetStore::new(runtime, config.output_dir.clone());
    AssetDownloader::new(
        client,
        config.routes.clone(),
        config.markers.clone(),
        pipeline,
        store,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::USER_AGENT;
    use crate::runtime::RealRuntime;
    use mockito::{Matcher, Server};
    use std::path::PathBuf;
    use std::time::Duration;

    #[tokio::test]
    async fn test_build_http_client_sends_user_agent() {
        let mut server = Server::new_async().await;

        let mock = server
            .mock("GET", "/")
            .match_header("User-Agent", Matcher::Exact(USER_AGENT.to_string()))
            .with_status(200)
            .create_async()
            .await;

        let config = Config::default();
        let client = build_http_client(build_session(&config), &config);
        let _ = client.fetch_with_retry(&client.request(server.url())).await;

        mock.assert_async().await;
    }

    #[test]
    fn test_build_session_uses_configured_timeout() {
        let config = Config {
            request_timeout: Some(Duration::from_secs(5)),
            ..Config::default()
        };
        let session = build_session(&config);
        assert!(!session.is_open());
    }

    #[test]
    fn test_build_pipeline_uses_templates_dir() {
        let config = Config {
            templates_dir: PathBuf::from("/templates"),
            ..Config::default()
        };
        let pipeline = build_pipeline(&RealRuntime, &config);
        assert_eq!(pipeline.templates().dir(), PathBuf::from("/templates").as_path());
    }

    #[test]
    fn test_build_downloader_shares_client_session() {
        let config = Config::default();
        let session = build_session(&config);
        let client = build_http_client(session.clone(), &config);
        let downloader = build_downloader(RealRuntime, client, &config);
        assert!(Arc::ptr_eq(downloader.client().session(), &session));
    }
}
