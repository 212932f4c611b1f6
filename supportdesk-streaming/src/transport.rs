//! Transport seam: the fetch-like call that opens a chat stream.

use crate::error::{StreamError, StreamResult};
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::pin::Pin;
use supportdesk_core::{http_error_message, ChatRequest, ClientConfig};
use url::Url;

/// Response body of an opened chat stream.
pub type ByteStream = Pin<Box<dyn Stream<Item = StreamResult<Bytes>> + Send>>;

/// Opens chat streams.
///
/// Implementations resolve once response headers arrive: a 2xx response
/// yields its body as a [`ByteStream`], anything else yields
/// [`StreamError::Http`] carrying the presentable message. Dropping the
/// returned future or stream aborts the request.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// POST the request and return the response body.
    async fn open_stream(&self, request: &ChatRequest) -> StreamResult<ByteStream>;
}

/// HTTP transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    url: Url,
}

impl HttpTransport {
    /// Create a transport posting to `url` with a default client.
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }

    /// Create a transport for the chat stream endpoint of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint URL is invalid or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &ClientConfig) -> StreamResult<Self> {
        let url = config
            .chat_stream_url()
            .map_err(|e| StreamError::InvalidRequest(e.to_string()))?;
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| StreamError::InvalidRequest(e.to_string()))?;
        Ok(Self { client, url })
    }

    /// Use a custom HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Endpoint this transport posts to.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open_stream(&self, request: &ChatRequest) -> StreamResult<ByteStream> {
        let body = serde_json::to_vec(request)?;
        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "text/event-stream")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = http_error_message(status.as_u16(), status.canonical_reason(), &body);
            tracing::debug!(status = status.as_u16(), %message, "chat stream rejected");
            return Err(StreamError::http(status.as_u16(), message));
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| StreamError::transport(format!("failed to read stream: {e}"))));
        Ok(Box::pin(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport_for(server: &MockServer) -> HttpTransport {
        let url = Url::parse(&format!("{}/chat/stream", server.uri())).unwrap();
        HttpTransport::new(url)
    }

    async fn collect(mut body: ByteStream) -> String {
        let mut out = Vec::new();
        while let Some(chunk) = body.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        String::from_utf8(out).unwrap()
    }

    #[tokio::test]
    async fn test_posts_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/stream"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({
                "user_id": "u1",
                "conversation_id": "c1",
                "message": "hello"
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("data: [DONE]\n"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::new("u1", "hello").with_conversation("c1");
        let body = transport_for(&server).open_stream(&request).await.unwrap();
        assert_eq!(collect(body).await, "data: [DONE]\n");
    }

    #[tokio::test]
    async fn test_error_detail_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(500).set_body_json(serde_json::json!({"detail": "internal failure"})),
            )
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .open_stream(&ChatRequest::new("u1", "hi"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.status(), Some(500));
        assert_eq!(err.to_string(), "internal failure");
    }

    #[tokio::test]
    async fn test_error_without_json_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
            .mount(&server)
            .await;

        let err = transport_for(&server)
            .open_stream(&ChatRequest::new("u1", "hi"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Nothing listens on port 9 (discard) on test hosts.
        let transport = HttpTransport::new(Url::parse("http://127.0.0.1:9/chat/stream").unwrap());
        let err = transport
            .open_stream(&ChatRequest::new("u1", "hi"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::Transport(_)));
    }

    #[test]
    fn test_from_config() {
        let config = ClientConfig::default();
        let transport = HttpTransport::from_config(&config).unwrap();
        assert_eq!(transport.url().as_str(), "http://localhost:8000/chat/stream");
    }
}
