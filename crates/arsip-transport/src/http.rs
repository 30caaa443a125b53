//! HTTP transport implementation using `reqwest`.

use std::pin::Pin;
use std::sync::Arc;

use arsip_protocol::{SseDecoder, SseEvent};
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use crate::{
    ApiRequest, ByteProgress, EventSource, HttpResponse, Method, ReadyState,
    ReadyStateCell, ResponseMeta, Transport, TransportError, UploadRequest,
};

/// Size of the slices an upload body is streamed in. Progress is
/// reported once per slice.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

const REFRESH_PATH: &str = "/auths/refresh";
const EVENTS_PATH: &str = "/notifications/stream";

type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, reqwest::Error>> + Send>>;

/// A [`Transport`] that talks to the backend over HTTP.
///
/// Credentials are cookies held in a shared [`Jar`]. Whatever performs the
/// login can seed the same jar (see [`with_cookie_jar`](Self::with_cookie_jar))
/// and every request, including the event stream, carries them.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    api_url: String,
    jar: Arc<Jar>,
}

impl HttpTransport {
    /// Creates a transport for `api_url` with a fresh cookie jar.
    ///
    /// # Errors
    /// Returns [`TransportError::InvalidUrl`] if `api_url` does not parse.
    pub fn new(api_url: &str) -> Result<Self, TransportError> {
        Self::with_cookie_jar(api_url, Arc::new(Jar::default()))
    }

    /// Creates a transport that shares an existing cookie jar.
    pub fn with_cookie_jar(
        api_url: &str,
        jar: Arc<Jar>,
    ) -> Result<Self, TransportError> {
        reqwest::Url::parse(api_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{api_url}: {e}")))?;

        let client = reqwest::Client::builder()
            .cookie_provider(Arc::clone(&jar))
            .build()
            .map_err(TransportError::Http)?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            jar,
        })
    }

    /// The API base URL, without a trailing slash.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// The cookie jar carrying session credentials.
    pub fn cookie_jar(&self) -> &Arc<Jar> {
        &self.jar
    }

    /// Stores a `Set-Cookie` style string for the API origin, e.g. a
    /// session cookie obtained by an out-of-band login.
    pub fn add_cookie(&self, cookie: &str) -> Result<(), TransportError> {
        let url = reqwest::Url::parse(&self.api_url)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {e}", self.api_url)))?;
        self.jar.add_cookie_str(cookie, &url);
        Ok(())
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.api_url, endpoint)
    }
}

impl Transport for HttpTransport {
    type Events = HttpEventSource;

    async fn refresh(&self) -> Result<ResponseMeta, TransportError> {
        let response = self
            .client
            .post(self.url(REFRESH_PATH))
            .send()
            .await
            .map_err(TransportError::Http)?;
        let meta = ResponseMeta {
            status: response.status().as_u16(),
        };
        tracing::debug!(status = meta.status, "refresh call completed");
        Ok(meta)
    }

    async fn send(
        &self,
        request: ApiRequest,
    ) -> Result<HttpResponse, TransportError> {
        let url = self.url(&request.endpoint);
        let mut builder = match request.method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
            Method::Put => self.client.put(url),
            Method::Patch => self.client.patch(url),
            Method::Delete => self.client.delete(url),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(TransportError::Http)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::Http)?;
        tracing::debug!(
            method = %request.method,
            endpoint = %request.endpoint,
            status,
            "api call completed"
        );
        Ok(HttpResponse { status, body })
    }

    async fn upload(
        &self,
        request: UploadRequest,
        progress: ByteProgress,
    ) -> Result<HttpResponse, TransportError> {
        let file = request.file;
        let total = file.len();

        let mut chunks = Vec::new();
        let mut rest = file.content;
        while !rest.is_empty() {
            let n = rest.len().min(UPLOAD_CHUNK_SIZE);
            chunks.push(rest.split_to(n));
        }

        let mut sent = 0u64;
        let body_stream =
            futures_util::stream::iter(chunks).map(move |chunk| {
                sent += chunk.len() as u64;
                progress(sent, total);
                Ok::<_, std::io::Error>(chunk)
            });

        let mut part = reqwest::multipart::Part::stream_with_length(
            reqwest::Body::wrap_stream(body_stream),
            total,
        )
        .file_name(file.file_name);
        if let Some(content_type) = &file.content_type {
            part = part.mime_str(content_type).map_err(TransportError::Http)?;
        }
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.url(&request.endpoint))
            .multipart(form)
            .send()
            .await
            .map_err(TransportError::Http)?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(TransportError::Http)?;
        tracing::debug!(
            endpoint = %request.endpoint,
            status,
            bytes = total,
            "upload completed"
        );
        Ok(HttpResponse { status, body })
    }

    async fn open_events(&self) -> Result<HttpEventSource, TransportError> {
        let response = self
            .client
            .get(self.url(EVENTS_PATH))
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(TransportError::Http)?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::debug!("event stream opened");
        Ok(HttpEventSource {
            body: Box::pin(response.bytes_stream()),
            decoder: SseDecoder::new(),
            state: ReadyStateCell::new(ReadyState::Open),
        })
    }
}

/// An open `text/event-stream` response body.
pub struct HttpEventSource {
    body: ByteStream,
    decoder: SseDecoder,
    state: ReadyStateCell,
}

impl EventSource for HttpEventSource {
    async fn next_event(
        &mut self,
    ) -> Result<Option<SseEvent>, TransportError> {
        loop {
            if let Some(event) = self.decoder.next_event() {
                return Ok(Some(event));
            }
            match self.body.next().await {
                Some(Ok(chunk)) => {
                    if let Err(e) = self.decoder.feed(&chunk) {
                        self.state.set(ReadyState::Closed);
                        return Err(e.into());
                    }
                }
                Some(Err(e)) => {
                    self.state.set(ReadyState::Closed);
                    return Err(TransportError::Http(e));
                }
                None => {
                    self.state.set(ReadyState::Closed);
                    return Ok(None);
                }
            }
        }
    }

    fn ready_state(&self) -> ReadyStateCell {
        self.state.clone()
    }
}

impl Drop for HttpEventSource {
    fn drop(&mut self) {
        self.state.set(ReadyState::Closed);
    }
}
