use anyhow::Context;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::time::sleep;
use tracing::debug;

use crate::plugins::registry::ClientContext;

#[derive(thiserror::Error, Debug)]
pub enum HttpFetchError {
    #[error("http status error: {0}")]
    Status(StatusCode),
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    ctx: ClientContext,
}

impl HttpFetcher {
    pub fn new(ctx: ClientContext) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .user_agent(ctx.user_agent.clone())
            .default_headers(Self::build_headers(&ctx.headers)?)
            .build()
            .context("build http client")?;
        Ok(Self { client, ctx })
    }

    fn build_headers(pairs: &[(String, String)]) -> anyhow::Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("invalid header name {:?}", name))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("invalid value for header {}", name))?;
            headers.append(name, value);
        }
        Ok(headers)
    }

    fn should_retry_status(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS
            || status == StatusCode::REQUEST_TIMEOUT
            || status.is_server_error()
    }

    async fn sleep_backoff(&self, attempt: u32) {
        let base = self.ctx.retry_backoff_ms.max(1);
        let shift = attempt.min(16);
        let mul = 1u64 << shift;
        let ms = base.saturating_mul(mul).min(30_000);
        sleep(Duration::from_millis(ms)).await;
    }

    /// GET with retries on transport errors and transient statuses.
    async fn get(&self, url: &str) -> anyhow::Result<reqwest::Response> {
        let mut last_err: Option<anyhow::Error> = None;
        for attempt in 0..=self.ctx.retries {
            if attempt > 0 {
                self.sleep_backoff(attempt - 1).await;
                debug!(url, attempt, "retrying");
            }

            let resp = match self.client
                .get(url)
                .timeout(Duration::from_secs(self.ctx.timeout_secs))
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_err = Some(e.into());
                    continue;
                }
            };

            if resp.status().is_success() {
                return Ok(resp);
            }

            if Self::should_retry_status(resp.status()) {
                last_err = Some(HttpFetchError::Status(resp.status()).into());
                continue;
            }
            return Err(HttpFetchError::Status(resp.status()).into());
        }

        Err(last_err.unwrap_or_else(|| HttpFetchError::Status(StatusCode::REQUEST_TIMEOUT).into()))
    }

    pub async fn fetch_text(&self, url: &str) -> anyhow::Result<String> {
        let resp = self.get(url).await?;
        Ok(resp.text().await?)
    }

    /// Streams `url` into `<target>.partial` and renames it on success.
    pub async fn fetch_to_file(&self, url: &str, target: &Path) -> anyhow::Result<u64> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await
                .with_context(|| format!("create_dir_all {}", parent.display()))?;
        }

        let resp = self.get(url).await?;
        let partial_path = partial_path(target);
        let mut file = tokio::fs::File::create(&partial_path).await
            .with_context(|| format!("create {}", partial_path.display()))?;

        let mut written = 0u64;
        let mut stream = resp.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        if tokio::fs::metadata(target).await.is_ok() {
            let _ = tokio::fs::remove_file(target).await;
        }
        tokio::fs::rename(&partial_path, target).await
            .with_context(|| format!("rename {} -> {}", partial_path.display(), target.display()))?;

        debug!(url, path = %target.display(), bytes = written, "saved");
        Ok(written)
    }
}

fn partial_path(target: &Path) -> std::path::PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".partial");
    target.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fast_ctx() -> ClientContext {
        ClientContext { retries: 2, retry_backoff_ms: 1, timeout_secs: 5, ..ClientContext::default() }
    }

    #[tokio::test]
    async fn retries_transient_status_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/list.m3u"))
            .respond_with(ResponseTemplate::new(200).set_body_string("a.flac\n"))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_ctx()).unwrap();
        let body = fetcher.fetch_text(&format!("{}/list.m3u", server.uri())).await.unwrap();

        assert_eq!(body, "a.flac\n");
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_ctx()).unwrap();
        let err = fetcher.fetch_text(&format!("{}/missing", server.uri())).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<HttpFetchError>(),
            Some(HttpFetchError::Status(StatusCode::NOT_FOUND))
        ));
    }

    #[tokio::test]
    async fn gives_up_after_configured_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(500))
            .expect(3)
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(fast_ctx()).unwrap();
        assert!(fetcher.fetch_text(&format!("{}/flaky", server.uri())).await.is_err());
    }

    #[tokio::test]
    async fn writes_file_without_leaving_partial() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/song.flac"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("song.flac");
        let fetcher = HttpFetcher::new(fast_ctx()).unwrap();

        let written = fetcher
            .fetch_to_file(&format!("{}/song.flac", server.uri()), &target)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(tokio::fs::read(&target).await.unwrap().len(), 4096);
        assert!(!partial_path(&target).exists());
    }

    #[tokio::test]
    async fn extra_headers_go_out_with_every_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/private.m3u"))
            .and(header("authorization", "Bearer t0ken"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = ClientContext {
            headers: vec![("Authorization".into(), "Bearer t0ken".into())],
            ..fast_ctx()
        };
        let fetcher = HttpFetcher::new(ctx).unwrap();

        assert_eq!(fetcher.fetch_text(&format!("{}/private.m3u", server.uri())).await.unwrap(), "ok");
    }

    #[test]
    fn invalid_header_fails_construction() {
        let ctx = ClientContext { headers: vec![("bad name".into(), "v".into())], ..fast_ctx() };
        assert!(HttpFetcher::new(ctx).is_err());
    }
}
