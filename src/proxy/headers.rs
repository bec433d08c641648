//! Header hygiene
//!
//! One hop-by-hop list, applied to both directions of the proxy.

use std::net::SocketAddr;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Uri};

/// Headers that describe a single connection and never cross the proxy.
pub const HOP_BY_HOP_HEADERS: [&str; 9] = [
    "connection",
    "proxy-connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_FORWARDED_PROTO: &str = "x-forwarded-proto";
const X_FORWARDED_HOST: &str = "x-forwarded-host";

pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Appends every end-to-end header of `src` to `dst`.
pub fn copy_end_to_end(src: &HeaderMap, dst: &mut HeaderMap) {
    for (name, value) in src {
        if !is_hop_by_hop(name) {
            dst.append(name.clone(), value.clone());
        }
    }
}

// == Outbound Request Headers ==
/// Builds the upstream request headers from the inbound ones.
///
/// `host` is left to the client, which derives it from the target URL.
/// `content-length` is kept so a streamed body keeps its declared length.
pub fn outbound_headers(inbound: &HeaderMap, uri: &Uri, client: Option<SocketAddr>) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(inbound.len() + 3);

    for (name, value) in inbound {
        if is_hop_by_hop(name) || *name == header::HOST {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    set_forwarded_headers(&mut headers, inbound, uri, client);
    headers
}

fn set_forwarded_headers(
    headers: &mut HeaderMap,
    inbound: &HeaderMap,
    uri: &Uri,
    client: Option<SocketAddr>,
) {
    if let Some(addr) = client {
        let client_ip = addr.ip().to_string();
        let chain = match header_str(inbound, X_FORWARDED_FOR) {
            Some(prior) if !prior.is_empty() => format!("{prior}, {client_ip}"),
            _ => client_ip,
        };
        if let Ok(value) = HeaderValue::from_str(&chain) {
            headers.insert(X_FORWARDED_FOR, value);
        }
    }

    if header_str(inbound, X_FORWARDED_PROTO).map_or(true, str::is_empty) {
        let proto = uri.scheme_str().unwrap_or("http");
        if let Ok(value) = HeaderValue::from_str(proto) {
            headers.insert(X_FORWARDED_PROTO, value);
        }
    }

    let host = inbound
        .get(header::HOST)
        .cloned()
        .or_else(|| uri.authority().and_then(|a| HeaderValue::from_str(a.as_str()).ok()));
    if let Some(host) = host {
        headers.insert(X_FORWARDED_HOST, host);
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}
