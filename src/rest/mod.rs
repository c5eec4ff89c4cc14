// SPDX-License-Identifier: MIT OR Apache-2.0

//! REST transport.
//!
//! Typed `GET`/`POST`/`PUT`/`DELETE` against `<base>/rest/v0`, plus streaming
//! download and upload. Every request carries the session's authentication
//! cookie; failed attempts are retried according to the client's retry mode.

mod path;

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use http::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, COOKIE};
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::RwLock;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

use crate::client::CallOptions;
use crate::config::ClientConfig;
use crate::error::{Result, XoError};
use crate::runtime::{RequestLogger, RetryChannel, RetryConfig};

pub use path::{Params, RestPath};

/// Authentication token shared by the REST and JSON-RPC views of a session.
pub(crate) type SharedToken = Arc<RwLock<Option<String>>>;

/// REST client bound to one XO server.
///
/// Cheap to clone; clones share the connection pool and the auth token.
#[derive(Clone)]
pub struct RestClient {
    http: Client,
    base: Url,
    token: SharedToken,
    retry: RetryConfig,
    request_timeout: Duration,
    logger: Arc<RequestLogger>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("base", &self.base.as_str())
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    pub(crate) fn new(
        config: &ClientConfig,
        http: Client,
        token: SharedToken,
        logger: Arc<RequestLogger>,
    ) -> Self {
        Self {
            http,
            base: config.rest_base(),
            token,
            retry: RetryConfig::from_mode(config.retry_mode(), config.retry_max_time()),
            request_timeout: config.request_timeout(),
            logger,
        }
    }

    /// Base URL of the REST API.
    #[must_use]
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Full URL of `path` with `params` encoded into the query string.
    #[allow(clippy::result_large_err)]
    pub fn url_for(&self, path: &RestPath, params: &Params) -> Result<Url> {
        let mut raw = self.base.as_str().trim_end_matches('/').to_string();
        raw.push_str(&path.render());
        if let Some(query) = params.encode() {
            raw.push('?');
            raw.push_str(&query);
        }
        Ok(Url::parse(&raw)?)
    }

    /// `GET path?params` decoded into `R`.
    pub async fn get<R: DeserializeOwned>(&self, path: &RestPath, params: &Params) -> Result<R> {
        self.get_with(&CallOptions::default(), path, params).await
    }

    pub async fn get_with<R: DeserializeOwned>(
        &self,
        opts: &CallOptions,
        path: &RestPath,
        params: &Params,
    ) -> Result<R> {
        self.execute(opts, Method::GET, path, params, None).await
    }

    /// `POST path` with a JSON body, decoded into `R`.
    pub async fn post<B, R>(&self, path: &RestPath, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.post_with(&CallOptions::default(), path, body).await
    }

    pub async fn post_with<B, R>(&self, opts: &CallOptions, path: &RestPath, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = Bytes::from(serde_json::to_vec(body)?);
        self.execute(opts, Method::POST, path, &Params::new(), Some(body))
            .await
    }

    /// `PUT path` with a JSON body, decoded into `R`.
    pub async fn put<B, R>(&self, path: &RestPath, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.put_with(&CallOptions::default(), path, body).await
    }

    pub async fn put_with<B, R>(&self, opts: &CallOptions, path: &RestPath, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let body = Bytes::from(serde_json::to_vec(body)?);
        self.execute(opts, Method::PUT, path, &Params::new(), Some(body))
            .await
    }

    /// `DELETE path?params` decoded into `R`.
    pub async fn delete<R: DeserializeOwned>(&self, path: &RestPath, params: &Params) -> Result<R> {
        self.delete_with(&CallOptions::default(), path, params).await
    }

    pub async fn delete_with<R: DeserializeOwned>(
        &self,
        opts: &CallOptions,
        path: &RestPath,
        params: &Params,
    ) -> Result<R> {
        self.execute(opts, Method::DELETE, path, params, None).await
    }

    /// Stream the body of `GET path?params` into `sink`.
    ///
    /// Returns the number of bytes written. On failure, whatever was written
    /// before the error stays in `sink`.
    pub async fn download<W>(&self, path: &RestPath, params: &Params, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.download_with(&CallOptions::default(), path, params, sink)
            .await
    }

    pub async fn download_with<W>(
        &self,
        opts: &CallOptions,
        path: &RestPath,
        params: &Params,
        sink: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let url = self.url_for(path, params)?;
        let span = self.logger.start("rest", &format!("GET {path} (download)"));

        let transfer = async {
            let request = self.authorized(Method::GET, url).await;
            let response = check_status(request.send().await?).await?;
            let mut stream = response.bytes_stream();
            let mut written = 0u64;
            while let Some(chunk) = stream.next().await {
                let chunk = chunk?;
                sink.write_all(&chunk)
                    .await
                    .map_err(|e| XoError::Transport(format!("download sink: {e}")))?;
                written += chunk.len() as u64;
            }
            sink.flush()
                .await
                .map_err(|e| XoError::Transport(format!("download sink: {e}")))?;
            Ok(written)
        };

        let result = opts.run(None, transfer).await;
        self.finish(span, &result);
        result
    }

    /// Stream `size` bytes from `reader` as the body of `PUT path?params`.
    ///
    /// Uploads are never retried since the reader cannot be rewound.
    pub async fn upload<R, T>(
        &self,
        path: &RestPath,
        params: &Params,
        reader: R,
        size: u64,
    ) -> Result<T>
    where
        R: AsyncRead + Send + Sync + 'static,
        T: DeserializeOwned,
    {
        self.upload_with(&CallOptions::default(), path, params, reader, size)
            .await
    }

    pub async fn upload_with<R, T>(
        &self,
        opts: &CallOptions,
        path: &RestPath,
        params: &Params,
        reader: R,
        size: u64,
    ) -> Result<T>
    where
        R: AsyncRead + Send + Sync + 'static,
        T: DeserializeOwned,
    {
        let url = self.url_for(path, params)?;
        let span = self.logger.start("rest", &format!("PUT {path} (upload)"));

        let transfer = async {
            let body = reqwest::Body::wrap_stream(ReaderStream::new(reader));
            let request = self
                .authorized(Method::PUT, url)
                .await
                .header(CONTENT_TYPE, "application/octet-stream")
                .header(CONTENT_LENGTH, size)
                .body(body);
            let response = check_status(request.send().await?).await?;
            decode_response(response).await
        };

        let result = opts.run(None, transfer).await;
        self.finish(span, &result);
        result
    }

    async fn execute<R: DeserializeOwned>(
        &self,
        opts: &CallOptions,
        method: Method,
        path: &RestPath,
        params: &Params,
        body: Option<Bytes>,
    ) -> Result<R> {
        let url = self.url_for(path, params)?;
        let span = self.logger.start("rest", &format!("{method} {path}"));
        if let Some(body) = &body {
            if let Ok(value) = serde_json::from_slice::<Value>(body) {
                self.logger.log_params(&span, &value);
            }
        }

        let send = || {
            let method = method.clone();
            let url = url.clone();
            let body = body.clone();
            async move {
                debug!(target: "xo_api::rest", %method, %url, "sending request");
                let mut request = self
                    .authorized(method, url)
                    .await
                    .timeout(self.request_timeout);
                if let Some(body) = body {
                    request = request.header(CONTENT_TYPE, "application/json").body(body);
                }
                let response = check_status(request.send().await?).await?;
                decode_response(response).await
            }
        };
        let attempts = async {
            if opts.single_attempt {
                send().await
            } else {
                self.retry.execute_on(RetryChannel::Rest, send).await
            }
        };

        // A caller deadline spans every attempt; the per-request timeout
        // covers each attempt on its own.
        let result = opts.run(None, attempts).await;
        self.finish(span, &result);
        result
    }

    async fn authorized(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(token) = self.token.read().await.as_deref() {
            if let Ok(cookie) = HeaderValue::from_str(&format!("authenticationToken={token}")) {
                request = request.header(COOKIE, cookie);
            }
        }
        request
    }

    fn finish<T>(&self, span: crate::runtime::RequestSpan, result: &Result<T>) {
        match result {
            Ok(_) => self.logger.finish_success(span),
            Err(e) => self.logger.finish_error(span, e),
        }
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(XoError::Http {
        status: status.as_u16(),
        body,
    })
}

/// Decode a successful response body.
///
/// An empty body decodes as JSON `null`; a `text/plain` body as a JSON string.
async fn decode_response<R: DeserializeOwned>(response: Response) -> Result<R> {
    let is_text = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/plain"));
    let bytes = response.bytes().await?;
    decode_body(&bytes, is_text)
}

#[allow(clippy::result_large_err)]
fn decode_body<R: DeserializeOwned>(bytes: &[u8], is_text: bool) -> Result<R> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    if is_text {
        let text = String::from_utf8_lossy(bytes).trim().to_string();
        return Ok(serde_json::from_value(Value::String(text))?);
    }
    Ok(serde_json::from_slice(bytes)?)
}
