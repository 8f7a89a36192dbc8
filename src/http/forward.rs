//! Upstream forwarding.
//!
//! # Responsibilities
//! - Capture an inbound request in a replayable form
//! - Rewrite the target URI onto a backend's base URL
//! - Strip hop-by-hop headers and append `X-Forwarded-For`
//! - Bound every attempt with the forwarding deadline

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, Response, Uri, Version};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use url::{Position, Url};

use crate::load_balancer::backend::{Forward, ForwardError};

pub const X_FORWARDED_FOR: &str = "x-forwarded-for";

/// Headers that describe a single connection and must not be relayed.
const HOP_BY_HOP: [&str; 9] = [
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

/// Shared HTTP client used by every backend's forwarder.
pub type UpstreamClient = Client<HttpConnector, Body>;

pub fn build_client(connect_timeout: Duration) -> UpstreamClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    Client::builder(TokioExecutor::new()).build(connector)
}

/// An inbound request with its body buffered, so it can be sent more than once.
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub client_addr: Option<SocketAddr>,
}

impl UpstreamRequest {
    pub fn new(
        method: Method,
        uri: Uri,
        headers: HeaderMap,
        body: Bytes,
        client_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            method,
            uri,
            headers,
            body,
            client_addr,
        }
    }
}

/// Relays requests to a single backend base URL over HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    target: Url,
    client: UpstreamClient,
    timeout: Duration,
}

impl HttpForwarder {
    pub fn new(target: Url, client: UpstreamClient, timeout: Duration) -> Self {
        Self {
            target,
            client,
            timeout,
        }
    }

    /// Map an inbound URI onto the backend: base path joined with the request
    /// path, base query merged with the request query.
    pub fn upstream_uri(&self, inbound: &Uri) -> Result<Uri, ForwardError> {
        let authority = &self.target[Position::BeforeHost..Position::AfterPort];
        let path = join_paths(self.target.path(), inbound.path());
        let query = match (self.target.query().unwrap_or(""), inbound.query().unwrap_or("")) {
            ("", "") => String::new(),
            (base, "") => format!("?{}", base),
            ("", req) => format!("?{}", req),
            (base, req) => format!("?{}&{}", base, req),
        };

        format!("{}://{}{}{}", self.target.scheme(), authority, path, query)
            .parse::<Uri>()
            .map_err(|e| ForwardError::InvalidRequest(e.to_string()))
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(&self, request: &UpstreamRequest) -> Result<Response<Body>, ForwardError> {
        let uri = self.upstream_uri(&request.uri)?;

        let mut outbound = Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .version(Version::HTTP_11)
            .body(Body::from(request.body.clone()))
            .map_err(|e| ForwardError::InvalidRequest(e.to_string()))?;

        let mut headers = request.headers.clone();
        strip_hop_by_hop(&mut headers);
        if let Some(addr) = request.client_addr {
            append_forwarded_for(&mut headers, addr.ip());
        }
        *outbound.headers_mut() = headers;

        match tokio::time::timeout(self.timeout, self.client.request(outbound)).await {
            Ok(Ok(response)) => {
                let (mut parts, body) = response.into_parts();
                strip_hop_by_hop(&mut parts.headers);
                Ok(Response::from_parts(parts, Body::new(body)))
            }
            Ok(Err(e)) => Err(ForwardError::Upstream(Box::new(e))),
            Err(_) => Err(ForwardError::Timeout(self.timeout)),
        }
    }
}

/// Join a base path and a request path with exactly one `/` between them.
pub(crate) fn join_paths(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// Remove hop-by-hop headers, including any named in `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<String> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect();

    for name in listed {
        headers.remove(name.as_str());
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Append the client IP to any `X-Forwarded-For` chain already present.
pub fn append_forwarded_for(headers: &mut HeaderMap, client_ip: IpAddr) {
    let prior: Vec<&str> = headers
        .get_all(X_FORWARDED_FOR)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();

    let value = if prior.is_empty() {
        client_ip.to_string()
    } else {
        format!("{}, {}", prior.join(", "), client_ip)
    };

    if let Ok(value) = HeaderValue::from_str(&value) {
        headers.insert(X_FORWARDED_FOR, value);
    }
}
