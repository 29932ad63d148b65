use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info};

pub const TOKEN_ENV: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire.
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String>;
}

pub struct StaticTokenSource {
    token: String,
}

impl StaticTokenSource {
    pub fn new(token: impl Into<String>) -> Self {
        StaticTokenSource {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<String> {
        Ok(self.token.clone())
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

struct CachedToken {
    value: String,
    refresh_at: Instant,
}

/// Service account tokens from the GCE metadata server, cached until
/// shortly before expiry.
pub struct MetadataTokenSource {
    http: reqwest::Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new(url: impl Into<String>) -> Self {
        MetadataTokenSource {
            http: reqwest::Client::new(),
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<MetadataToken> {
        let res = self
            .http
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .context("failed to reach metadata server")?;
        if !res.status().is_success() {
            anyhow::bail!(
                "metadata server returned {}: {}",
                res.status(),
                res.text().await.unwrap_or_default()
            );
        }
        res.json::<MetadataToken>()
            .await
            .context("failed to decode metadata token")
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<String> {
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref()
            && Instant::now() < token.refresh_at
        {
            return Ok(token.value.clone());
        }

        let fresh = self.fetch().await?;
        debug!(expires_in = fresh.expires_in, "fetched access token");
        let lifetime = Duration::from_secs(fresh.expires_in).saturating_sub(REFRESH_MARGIN);
        *cached = Some(CachedToken {
            value: fresh.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        Ok(fresh.access_token)
    }
}

/// Use `GOOGLE_OAUTH_ACCESS_TOKEN` when set, the metadata server otherwise.
pub fn default_token_source() -> Arc<dyn TokenSource> {
    match std::env::var(TOKEN_ENV) {
        Ok(token) if !token.is_empty() => {
            info!("using access token from {TOKEN_ENV}");
            Arc::new(StaticTokenSource::new(token))
        }
        _ => Arc::new(MetadataTokenSource::new(METADATA_TOKEN_URL)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, http::HeaderMap, routing::get};
    use serial_test::serial;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn metadata_server(hits: Arc<AtomicUsize>, expires_in: u64) -> String {
        let app = Router::new().route(
            "/token",
            get(move |headers: HeaderMap| {
                let hits = hits.clone();
                async move {
                    assert_eq!(headers["Metadata-Flavor"], "Google");
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    axum::Json(serde_json::json!({
                        "access_token": format!("token-{n}"),
                        "expires_in": expires_in,
                        "token_type": "Bearer",
                    }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}/token")
    }

    #[tokio::test]
    async fn test_metadata_token_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let source = MetadataTokenSource::new(metadata_server(hits.clone(), 3600).await);

        assert_eq!(source.token().await.unwrap(), "token-0");
        assert_eq!(source.token().await.unwrap(), "token-0");
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_lived_token_refreshed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let source = MetadataTokenSource::new(metadata_server(hits.clone(), 30).await);

        assert_eq!(source.token().await.unwrap(), "token-0");
        assert_eq!(source.token().await.unwrap(), "token-1");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_token_preferred() {
        // SAFETY: serialized with every other test reading the environment.
        unsafe { std::env::set_var(TOKEN_ENV, "from-env") };
        let source = default_token_source();
        unsafe { std::env::remove_var(TOKEN_ENV) };
        assert_eq!(source.token().await.unwrap(), "from-env");
    }
}
