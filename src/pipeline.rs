//! The request pipeline: throttle, sign, dispatch, classify.
//!
//! Every outbound call funnels through [`Pipeline::send`]/[`Pipeline::send_json`],
//! which awaits the throttle gate, attaches a bearer token unless the target
//! is an absolute upload-session URL, applies the caller-chosen per-phase
//! timeout, and classifies the response per SPEC_FULL §4.3/§7.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::resource::ErrorEnvelope;
use crate::throttle::ThrottleGate;
use crate::token::SharedTokenProvider;

/// Whether a request should carry the `Authorization` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Signing {
    Bearer,
    Unsigned,
}

#[derive(Clone)]
pub struct Pipeline {
    client: Client,
    gate: Arc<ThrottleGate>,
    token_provider: SharedTokenProvider,
    auth_id: Arc<str>,
    protocol_key: Arc<str>,
}

impl Pipeline {
    pub fn new(
        client: Client,
        gate: Arc<ThrottleGate>,
        token_provider: SharedTokenProvider,
        auth_id: String,
        protocol_key: String,
    ) -> Self {
        Self {
            client,
            gate,
            token_provider,
            auth_id: auth_id.into(),
            protocol_key: protocol_key.into(),
        }
    }

    /// Dispatch a request with no body, expecting a JSON response of `T`.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let resp = self
            .execute(Method::GET, url, Signing::Bearer, timeout, None, cancel)
            .await?;
        parse_json(resp).await
    }

    /// Dispatch a GET, translating a successful `304`/`202` into `None` and
    /// anything else into `Some`. Mirrors the teacher's `parse_optional`.
    pub async fn get_json_optional<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Option<T>> {
        let resp = self
            .execute(Method::GET, url, Signing::Bearer, timeout, None, cancel)
            .await?;
        match resp.status() {
            StatusCode::NOT_MODIFIED | StatusCode::ACCEPTED => Ok(None),
            _ => parse_json(resp).await.map(Some),
        }
    }

    /// Dispatch a request with a JSON body, expecting a JSON response.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: &impl serde::Serialize,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<T> {
        let body = serde_json::to_vec(body).map_err(Error::Parse)?;
        let resp = self
            .execute(method, url, Signing::Bearer, timeout, Some((body, "application/json")), cancel)
            .await?;
        parse_json(resp).await
    }

    /// Dispatch a request and discard a successful body (e.g. DELETE).
    pub async fn send_no_content(
        &self,
        method: Method,
        url: &str,
        signing: Signing,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.execute(method, url, signing, timeout, None, cancel).await?;
        Ok(())
    }

    /// Raw access for callers that need to stream the body themselves
    /// (small-file PUT, file GET, fragment PUT).
    pub async fn execute(
        &self,
        method: Method,
        url: &str,
        signing: Signing,
        timeout: Duration,
        body: Option<(Vec<u8>, &'static str)>,
        cancel: &CancellationToken,
    ) -> Result<Response> {
        self.execute_with_builder(method, url, signing, timeout, cancel, |req| {
            if let Some((bytes, content_type)) = body {
                req.header(reqwest::header::CONTENT_TYPE, content_type).body(bytes)
            } else {
                req
            }
        })
        .await
    }

    /// Same as [`Pipeline::execute`] but lets the caller shape the request
    /// builder directly (streaming bodies, extra headers like
    /// `Content-Range`).
    pub async fn execute_with_builder(
        &self,
        method: Method,
        url: &str,
        signing: Signing,
        timeout: Duration,
        cancel: &CancellationToken,
        shape: impl FnOnce(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response> {
        let parsed = Url::parse(url)?;
        let host = parsed.host_str().unwrap_or_default().to_owned();

        tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            () = self.gate.wait(&host) => {}
        }

        let mut req = self.client.request(method.clone(), parsed).timeout(timeout);
        if signing == Signing::Bearer {
            let token = self.token_provider.token(&self.auth_id, &self.protocol_key).await?;
            req = req.bearer_auth(token);
        }
        req = shape(req);

        debug!(method = %method, url, ?signing, "dispatching request");

        let resp = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            resp = req.send() => resp?,
        };

        if let Some(retry_after) = resp.headers().get(reqwest::header::RETRY_AFTER) {
            if let Ok(value) = retry_after.to_str() {
                self.gate.set_retry_after(&host, value);
            }
        }

        classify(resp).await
    }
}

/// 2xx/3xx passes through; 404 becomes `ItemNotFound`; everything else is a
/// `TransportError` carrying status, reason, and a body snippet.
async fn classify(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        return Ok(resp);
    }
    let reason = status.canonical_reason().unwrap_or("unknown").to_owned();
    let body = resp.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(512).collect();

    if status == StatusCode::NOT_FOUND {
        warn!(%status, "item not found");
        return Err(Error::ItemNotFound);
    }

    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .ok()
        .and_then(|e| e.error.message);
    warn!(%status, message = message.as_deref().unwrap_or(""), "request failed");

    Err(Error::Transport {
        status,
        reason,
        body_snippet: snippet,
    })
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let bytes = resp.bytes().await?;
    if bytes.is_empty() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "empty response body");
        return Err(Error::Parse(serde_json::Error::io(io_err)));
    }
    serde_json::from_slice(&bytes).map_err(Error::Parse)
}
