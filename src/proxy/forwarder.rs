//! Forwarder
//!
//! Relays one inbound request to one upstream URL and streams the upstream
//! response back, with hop-by-hop headers removed in both directions.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, HttpBody},
    extract::{ConnectInfo, Request},
    http::HeaderMap,
    response::Response,
};
use futures::TryStreamExt;
use tokio_util::io::{ReaderStream, StreamReader};
use tracing::{info, warn};
use url::Url;

use super::headers::{copy_end_to_end, outbound_headers};
use crate::error::ForwardError;

/// Chunk size used when relaying upstream bodies.
pub const STREAM_BUFFER_SIZE: usize = 32 * 1024;

// == Forwarder ==
/// Streams requests to upstream targets through a shared HTTP client.
#[derive(Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    request_timeout: Duration,
}

impl Forwarder {
    pub fn new(client: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            client,
            request_timeout,
        }
    }

    // == Forward ==
    /// Sends `request` to `target` and returns the relayed response.
    ///
    /// Errors before the upstream status arrives are returned; an error while
    /// streaming the body is logged and ends the client response early.
    pub async fn forward(&self, request: Request, target: Url) -> Result<Response, ForwardError> {
        let (parts, body) = request.into_parts();
        let client_addr = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| *addr);

        info!(method = %parts.method, uri = %parts.uri, upstream = %target, "forwarding request");

        let headers = outbound_headers(&parts.headers, &parts.uri, client_addr);

        let mut outbound = self
            .client
            .request(parts.method, target.clone())
            .headers(headers)
            .timeout(self.request_timeout);
        // A known-empty body stays absent so bodiless requests are not sent chunked.
        if body.size_hint().exact() != Some(0) {
            outbound = outbound.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let upstream = outbound.send().await.map_err(|e| {
            if e.is_timeout() {
                ForwardError::Timeout
            } else {
                ForwardError::Upstream(e)
            }
        })?;

        Ok(relay(upstream, target))
    }
}

/// Turns an upstream response into a client response with a streamed body.
fn relay(upstream: reqwest::Response, target: Url) -> Response {
    let status = upstream.status();
    let mut headers = HeaderMap::with_capacity(upstream.headers().len());
    copy_end_to_end(upstream.headers(), &mut headers);

    let reader = StreamReader::new(upstream.bytes_stream().map_err(io::Error::other));
    let chunks = ReaderStream::with_capacity(reader, STREAM_BUFFER_SIZE).inspect_err(move |err| {
        warn!(upstream = %target, error = %err, "upstream body stream failed");
    });

    let mut response = Response::new(Body::from_stream(chunks));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}
