use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::EmbeddingCache;
use crate::error::SimilarityError;
use crate::retry::{RetryPolicy, Transient};

/// Source of sentence embeddings
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SimilarityError>;
}

#[derive(Clone)]
pub struct EmbeddingClient {
    base_url: String,
    model: String,
    client: reqwest::Client,
    cache: Option<Arc<EmbeddingCache>>,
    retry: Option<RetryPolicy>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

/// One failed embedding request. Connection errors, timeouts, 429 and 5xx
/// are transient; other statuses and unusable bodies are not.
#[derive(Debug)]
pub struct RequestFailure {
    pub transient: bool,
    message: String,
}

impl RequestFailure {
    fn permanent(message: String) -> Self {
        Self { transient: false, message }
    }
}

impl std::fmt::Display for RequestFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Transient for RequestFailure {
    fn is_transient(&self) -> bool {
        self.transient
    }
}

impl From<RequestFailure> for SimilarityError {
    fn from(failure: RequestFailure) -> Self {
        SimilarityError::BackendUnavailable(failure.message)
    }
}

impl EmbeddingClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url,
            model,
            client: reqwest::Client::new(),
            cache: None,
            retry: None,
        }
    }

    /// Client whose requests give up after `timeout`; a timeout surfaces as
    /// `BackendUnavailable`
    pub fn with_timeout(base_url: String, model: String, timeout: Duration) -> Result<Self, SimilarityError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SimilarityError::BackendUnavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            ..Self::new(base_url, model)
        })
    }

    pub fn with_cache(mut self, cache: Arc<EmbeddingCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Single request, no cache, no retry
    pub async fn embed_uncached(&self, text: &str) -> Result<Vec<f32>, RequestFailure> {
        let url = format!("{}/api/embeddings", self.base_url);

        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };

        let response = self.client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| RequestFailure {
                transient: e.is_connect() || e.is_timeout(),
                message: format!("failed to send embedding request: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RequestFailure {
                transient: status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS,
                message: format!("embedding request failed: {}", status),
            });
        }

        let embedding_response: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| RequestFailure::permanent(format!("failed to parse embedding response: {}", e)))?;

        if embedding_response.embedding.is_empty() {
            return Err(RequestFailure::permanent(format!(
                "model {} returned an empty embedding",
                self.model
            )));
        }

        Ok(embedding_response.embedding)
    }

    fn cache_key(&self, text: &str) -> String {
        format!("{}\u{0}{}", self.model, text)
    }
}

#[async_trait]
impl Embedder for EmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, SimilarityError> {
        let key = self.cache_key(text);
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.get_embedding(&key)) {
            return Ok(cached);
        }

        let embedding = match &self.retry {
            Some(policy) => policy.run("embed", || self.embed_uncached(text)).await?,
            None => self.embed_uncached(text).await?,
        };

        if let Some(cache) = &self.cache {
            cache.set_embedding(&key, embedding.clone());
        }
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn mock_embeddings(server: &mut mockito::ServerGuard, body: &str, hits: usize) -> mockito::Mock {
        server
            .mock("POST", "/api/embeddings")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .expect(hits)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_embed_parses_vector() {
        let mut server = mockito::Server::new_async().await;
        let mock = mock_embeddings(&mut server, r#"{"embedding":[0.5,0.25]}"#, 1).await;

        let client = EmbeddingClient::new(server.url(), "all-minilm".to_string());
        let embedding = client.embed("manages").await.unwrap();

        assert_eq!(embedding, vec![0.5, 0.25]);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_backend_unavailable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api/embeddings")
            .with_status(503)
            .create_async()
            .await;

        let client = EmbeddingClient::new(server.url(), "all-minilm".to_string());
        let err = client.embed("manages").await.unwrap_err();
        assert!(matches!(err, SimilarityError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embeddings")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let client = EmbeddingClient::new(server.url(), "missing-model".to_string())
            .with_retry(RetryPolicy::new(3, 1, 2));
        let err = client.embed("manages").await.unwrap_err();

        assert!(matches!(err, SimilarityError::BackendUnavailable(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_error_is_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/embeddings")
            .with_status(503)
            .expect(3)
            .create_async()
            .await;

        let client = EmbeddingClient::new(server.url(), "all-minilm".to_string())
            .with_retry(RetryPolicy::new(2, 1, 2));
        assert!(client.embed("manages").await.is_err());

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_empty_embedding_is_rejected() {
        let mut server = mockito::Server::new_async().await;
        mock_embeddings(&mut server, r#"{"embedding":[]}"#, 1).await;

        let client = EmbeddingClient::new(server.url(), "all-minilm".to_string());
        assert!(client.embed("manages").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_backend_unavailable() {
        // Port 9 (discard) is not expected to run an HTTP server
        let client = EmbeddingClient::with_timeout(
            "http://127.0.0.1:9".to_string(),
            "all-minilm".to_string(),
            Duration::from_millis(500),
        )
        .unwrap();

        let err = client.embed("manages").await.unwrap_err();
        assert!(matches!(err, SimilarityError::BackendUnavailable(_)));
    }

    #[tokio::test]
    async fn test_cache_avoids_second_request() {
        let mut server = mockito::Server::new_async().await;
        let mock = mock_embeddings(&mut server, r#"{"embedding":[1.0,0.0]}"#, 1).await;

        let cache = Arc::new(EmbeddingCache::new(100));
        let client = EmbeddingClient::new(server.url(), "all-minilm".to_string())
            .with_cache(cache.clone());

        client.embed("manages").await.unwrap();
        client.embed("manages").await.unwrap();

        mock.assert_async().await;
        assert_eq!(cache.stats().embeddings_cached, 1);
        assert_eq!(cache.stats().hits, 1);
    }
}
