use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client as ReqwestClient, Proxy, Response, header, redirect};
use serde::Deserialize;
use url::Url;

use crate::error::{Error, Result};
use crate::observability::{CLIENT_REQUEST_DURATION, CLIENT_REQUEST_ERRORS, CLIENT_REQUESTS};
use crate::sse::process_sse;
use crate::types::{Conversation, DeltaEvent};

/// Chat-completions endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Decoded events of one response body.
pub type DeltaStream = Pin<Box<dyn Stream<Item = Result<DeltaEvent>> + Send>>;

/// Receives each text fragment of a reply as it arrives.
pub type DeltaCallback<'a> = &'a mut (dyn for<'s> FnMut(&'s str) + Send);

/// Proxy schemes the transport knows how to speak.
const PROXY_SCHEMES: &[&str] = &["http", "https", "socks5"];

/// Something that can stream a completion for a conversation.
///
/// The session talks to the network only through this trait.
#[async_trait]
pub trait Completion: Send + Sync {
    /// Sends `conversation` and returns the full text of the reply.
    ///
    /// Each non-empty delta is handed to `on_delta`, in arrival order, before the next
    /// line of the response is read.  A stream that ends without any delta yields an
    /// empty string.
    async fn stream(
        &self,
        conversation: &Conversation,
        on_delta: Option<DeltaCallback<'_>>,
    ) -> Result<String>;
}

/// Client for an OpenAI-compatible chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    authorization: HeaderValue,
    client: ReqwestClient,
    endpoint: Url,
    timeout: Duration,
}

impl ChatClient {
    /// Create a new client for the default endpoint without a proxy.
    pub fn new(credential: &[u8]) -> Result<Self> {
        Self::with_options(credential, None, None, None)
    }

    /// Create a new client with custom settings.
    ///
    /// `proxy` must be an `http://`, `https://` or `socks5://` URL.
    pub fn with_options(
        credential: &[u8],
        endpoint: Option<&str>,
        proxy: Option<&str>,
        timeout: Option<Duration>,
    ) -> Result<Self> {
        let authorization = authorization_header(credential)?;
        let endpoint = Url::parse(endpoint.unwrap_or(DEFAULT_ENDPOINT))?;
        let timeout = timeout.unwrap_or(DEFAULT_TIMEOUT);

        let mut builder = ReqwestClient::builder()
            .timeout(timeout)
            .redirect(redirect::Policy::none());
        builder = match proxy {
            Some(proxy) => builder.proxy(parse_proxy(proxy)?),
            None => builder.no_proxy(),
        };
        let client = builder.build().map_err(|e| {
            Error::http_client(
                format!("Failed to build HTTP client: {e}"),
                Some(Box::new(e)),
            )
        })?;

        Ok(Self {
            authorization,
            client,
            endpoint,
            timeout,
        })
    }

    /// The endpoint requests are posted to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Create and return default headers for API requests.
    fn default_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(header::AUTHORIZATION, self.authorization.clone());
        headers
    }

    /// Process API response errors and convert to our Error type
    async fn process_error_response(response: Response) -> Error {
        let status_code = response.status().as_u16();

        #[derive(Deserialize)]
        struct ErrorResponse {
            error: Option<ErrorDetail>,
        }

        #[derive(Deserialize)]
        struct ErrorDetail {
            message: Option<String>,
        }

        let error_body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                return Error::upstream(status_code, format!("unreadable error body: {e}"));
            }
        };

        let message = serde_json::from_str::<ErrorResponse>(&error_body)
            .ok()
            .and_then(|e| e.error)
            .and_then(|e| e.message)
            .unwrap_or_else(|| error_body.trim().to_string());
        Error::upstream(status_code, message)
    }

    /// Posts `conversation` and returns the decoded event stream of the response body.
    ///
    /// Connection failures, timeouts and non-2xx statuses are returned as errors before
    /// any event is produced.
    pub async fn open(&self, conversation: &Conversation) -> Result<DeltaStream> {
        let body = conversation.serialize()?;
        CLIENT_REQUESTS.click();
        let started = Instant::now();

        let response = self
            .client
            .post(self.endpoint.clone())
            .headers(self.default_headers())
            .body(body)
            .send()
            .await
            .map_err(|e| {
                CLIENT_REQUEST_ERRORS.click();
                if e.is_timeout() {
                    Error::timeout(
                        format!("Request timed out: {e}"),
                        Some(self.timeout.as_secs_f64()),
                    )
                } else {
                    Error::transport(format!("Request failed: {e}"), Some(Box::new(e)))
                }
            })?;
        CLIENT_REQUEST_DURATION.add(started.elapsed().as_secs_f64());

        if !response.status().is_success() {
            CLIENT_REQUEST_ERRORS.click();
            return Err(Self::process_error_response(response).await);
        }

        Ok(Box::pin(process_sse(response.bytes_stream())))
    }
}

#[async_trait]
impl Completion for ChatClient {
    async fn stream(
        &self,
        conversation: &Conversation,
        on_delta: Option<DeltaCallback<'_>>,
    ) -> Result<String> {
        let events = self.open(conversation).await?;
        accumulate(events, on_delta).await
    }
}

/// Drains an event stream, forwarding each non-empty fragment and returning their
/// concatenation.
pub async fn accumulate<S>(
    events: S,
    mut on_delta: Option<DeltaCallback<'_>>,
) -> Result<String>
where
    S: Stream<Item = Result<DeltaEvent>> + Unpin,
{
    let mut events = events;
    let mut full_text = String::new();
    let mut skipped = 0usize;
    while let Some(event) = events.next().await {
        match event? {
            DeltaEvent::Fragment(text) if !text.is_empty() => {
                full_text.push_str(&text);
                if let Some(callback) = on_delta.as_deref_mut() {
                    callback(&text);
                }
            }
            DeltaEvent::Skipped => skipped += 1,
            DeltaEvent::Fragment(_) | DeltaEvent::Empty => {}
        }
    }
    if skipped > 0 {
        tracing::debug!(skipped, "stream finished with unparsable records");
    }
    Ok(full_text)
}

fn authorization_header(credential: &[u8]) -> Result<HeaderValue> {
    let credential = std::str::from_utf8(credential)
        .map_err(|_| Error::authentication("credential is not valid UTF-8"))?
        .trim();
    if credential.is_empty() {
        return Err(Error::authentication("credential is empty"));
    }
    let value = if credential.starts_with("Bearer ") {
        credential.to_string()
    } else {
        format!("Bearer {credential}")
    };
    let mut header = HeaderValue::from_str(&value)
        .map_err(|_| Error::authentication("credential is not a valid header value"))?;
    header.set_sensitive(true);
    Ok(header)
}

fn parse_proxy(proxy: &str) -> Result<Proxy> {
    let url = Url::parse(proxy)?;
    if !PROXY_SCHEMES.contains(&url.scheme()) {
        return Err(Error::configuration(
            format!("unsupported proxy scheme {:?}", url.scheme()),
            Some("proxy".to_string()),
        ));
    }
    Proxy::all(url.as_str()).map_err(|e| {
        Error::configuration(format!("invalid proxy {proxy}: {e}"), Some("proxy".to_string()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn test_client_creation() {
        let client = ChatClient::new(b"test-key").unwrap();
        assert_eq!(client.endpoint.as_str(), DEFAULT_ENDPOINT);
        assert_eq!(client.timeout, DEFAULT_TIMEOUT);
        assert_eq!(client.authorization, "Bearer test-key");

        let client = ChatClient::with_options(
            b"Bearer already",
            Some("http://localhost:8080/v1/chat/completions"),
            Some("socks5://127.0.0.1:1080"),
            Some(Duration::from_secs(30)),
        )
        .unwrap();
        assert_eq!(client.authorization, "Bearer already");
        assert_eq!(
            client.endpoint().as_str(),
            "http://localhost:8080/v1/chat/completions"
        );
        assert_eq!(client.timeout, Duration::from_secs(30));
    }

    #[test]
    fn bad_credentials() {
        assert!(ChatClient::new(b"").unwrap_err().is_authentication());
        assert!(ChatClient::new(b"  \n").unwrap_err().is_authentication());
        assert!(ChatClient::new(b"a\nb").unwrap_err().is_authentication());
        assert!(ChatClient::new(&[0xff, 0xfe]).unwrap_err().is_authentication());
    }

    #[test]
    fn bad_endpoint_and_proxy() {
        let err = ChatClient::with_options(b"k", Some("not a url"), None, None).unwrap_err();
        assert!(matches!(err, Error::Url { .. }));
        let err =
            ChatClient::with_options(b"k", None, Some("ftp://proxy.example:21"), None).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn sensitive_header_is_hidden() {
        let client = ChatClient::new(b"secret-key").unwrap();
        assert!(!format!("{client:?}").contains("secret-key"));
    }

    #[tokio::test]
    async fn accumulate_invokes_callback_in_order() {
        let events = stream::iter(vec![
            Ok(DeltaEvent::Fragment("Hel".to_string())),
            Ok(DeltaEvent::Empty),
            Ok(DeltaEvent::Skipped),
            Ok(DeltaEvent::Fragment(String::new())),
            Ok(DeltaEvent::Fragment("lo".to_string())),
        ]);
        let mut seen = Vec::new();
        let callback: DeltaCallback<'_> = &mut |text: &str| seen.push(text.to_string());
        let full = accumulate(events, Some(callback)).await.unwrap();
        assert_eq!(full, "Hello");
        assert_eq!(seen, vec!["Hel".to_string(), "lo".to_string()]);
    }

    #[tokio::test]
    async fn accumulate_without_deltas_is_empty() {
        let events = stream::iter(vec![Ok(DeltaEvent::Empty), Ok(DeltaEvent::Skipped)]);
        assert_eq!(accumulate(events, None).await.unwrap(), "");
    }

    #[tokio::test]
    async fn accumulate_stops_at_first_error() {
        let events = stream::iter(vec![
            Ok(DeltaEvent::Fragment("partial".to_string())),
            Err(Error::streaming("connection reset", None)),
            Ok(DeltaEvent::Fragment("never".to_string())),
        ]);
        let err = accumulate(events, None).await.unwrap_err();
        assert!(matches!(err, Error::Streaming { .. }));
    }
}
