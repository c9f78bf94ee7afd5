//! Upstream proxy module
//!
//! Forwards a request to the application backend and relays the response.
//! One upstream connection per proxied request: connect, HTTP/1.1 handshake,
//! send, relay. Every phase is bounded by the configured timeouts so a slow
//! backend cannot pin a connection.
//!
//! Header contract: the upstream always receives the originally requested
//! `Host` and the connecting peer's address in `X-Real-IP`. Hop-by-hop
//! headers are stripped in both directions.

use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::client::conn::http1;
use hyper::header::{CONTENT_LENGTH, HOST};
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpStream;

use crate::config::ProxyConfig;
use crate::http;
use crate::logger;

/// Connection-scoped headers that must not be relayed (RFC 7230 section 6.1)
const HOP_BY_HOP_HEADERS: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Why an upstream exchange failed; decides between 502 and 504
#[derive(Debug)]
enum GatewayError {
    ConnectTimeout,
    ResponseTimeout,
    Connect(std::io::Error),
    Handshake(hyper::Error),
    Exchange(hyper::Error),
    ClientBody(hyper::Error),
    Request(hyper::http::Error),
}

impl GatewayError {
    const fn is_timeout(&self) -> bool {
        matches!(self, Self::ConnectTimeout | Self::ResponseTimeout)
    }
}

impl std::fmt::Display for GatewayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ConnectTimeout => write!(f, "connect timed out"),
            Self::ResponseTimeout => write!(f, "response timed out"),
            Self::Connect(e) => write!(f, "connect failed: {e}"),
            Self::Handshake(e) => write!(f, "handshake failed: {e}"),
            Self::Exchange(e) => write!(f, "exchange failed: {e}"),
            Self::ClientBody(e) => write!(f, "client body read failed: {e}"),
            Self::Request(e) => write!(f, "request build failed: {e}"),
        }
    }
}

/// Forward a request to the upstream and relay its response.
///
/// Failures never propagate as errors to the connection: an unreachable
/// upstream answers 502, an expired deadline answers 504.
pub async fn forward(
    req: Request<Incoming>,
    upstream: &str,
    proxy_config: &ProxyConfig,
    peer_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    match relay(req, upstream, proxy_config, peer_addr).await {
        Ok(response) => response,
        Err(err) => {
            logger::log_upstream_error(upstream, &err.to_string());
            if err.is_timeout() {
                http::build_504_response()
            } else {
                http::build_502_response()
            }
        }
    }
}

async fn relay(
    req: Request<Incoming>,
    upstream: &str,
    proxy_config: &ProxyConfig,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, GatewayError> {
    let (parts, body) = req.into_parts();

    // Buffer the request body up front; the size ceiling was already
    // enforced against Content-Length before dispatch
    let body_bytes = body
        .collect()
        .await
        .map_err(GatewayError::ClientBody)?
        .to_bytes();

    let upstream_req = build_upstream_request(&parts, body_bytes, upstream, peer_addr)?;

    let connect_deadline = Duration::from_secs(proxy_config.connect_timeout);
    let stream = match tokio::time::timeout(connect_deadline, TcpStream::connect(upstream)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(GatewayError::Connect(e)),
        Err(_) => return Err(GatewayError::ConnectTimeout),
    };

    let (mut sender, conn) = http1::handshake(TokioIo::new(stream))
        .await
        .map_err(GatewayError::Handshake)?;

    // Drive the connection until the exchange completes
    let upstream_label = upstream.to_string();
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            logger::log_upstream_error(&upstream_label, &format!("connection task: {e}"));
        }
    });

    let response_deadline = Duration::from_secs(proxy_config.response_timeout);
    let upstream_response =
        match tokio::time::timeout(response_deadline, sender.send_request(upstream_req)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(GatewayError::Exchange(e)),
            Err(_) => return Err(GatewayError::ResponseTimeout),
        };

    let (response_parts, response_body) = upstream_response.into_parts();
    let response_bytes = match tokio::time::timeout(response_deadline, response_body.collect()).await
    {
        Ok(Ok(collected)) => collected.to_bytes(),
        Ok(Err(e)) => return Err(GatewayError::Exchange(e)),
        Err(_) => return Err(GatewayError::ResponseTimeout),
    };

    Ok(build_relay_response(&response_parts, response_bytes))
}

/// Build the request sent upstream: origin-form URI (full path + query),
/// original headers minus hop-by-hop, `Host` preserved, `X-Real-IP` set to
/// the connecting peer.
fn build_upstream_request(
    parts: &hyper::http::request::Parts,
    body: Bytes,
    upstream: &str,
    peer_addr: SocketAddr,
) -> Result<Request<Full<Bytes>>, GatewayError> {
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or("/", hyper::http::uri::PathAndQuery::as_str);

    let mut builder = Request::builder()
        .method(parts.method.clone())
        .uri(path_and_query);

    for (name, value) in &parts.headers {
        if is_hop_by_hop(name.as_str())
            || name == &HOST
            || name.as_str().eq_ignore_ascii_case("x-real-ip")
        {
            continue;
        }
        builder = builder.header(name, value);
    }

    // The originally requested host; absolute-form request targets carry it
    // in the URI authority instead of the header
    builder = match parts
        .headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| parts.uri.authority().map(hyper::http::uri::Authority::as_str))
    {
        Some(host) => builder.header(HOST, host),
        None => builder.header(HOST, upstream),
    };

    builder = builder.header("X-Real-IP", peer_addr.ip().to_string());

    builder.body(Full::new(body)).map_err(GatewayError::Request)
}

/// Relay the upstream response: status and headers verbatim minus hop-by-hop,
/// body re-framed with an explicit length.
fn build_relay_response(
    parts: &hyper::http::response::Parts,
    body: Bytes,
) -> Response<Full<Bytes>> {
    let mut builder = Response::builder().status(parts.status);

    for (name, value) in &parts.headers {
        if is_hop_by_hop(name.as_str()) || name == &CONTENT_LENGTH {
            continue;
        }
        builder = builder.header(name, value);
    }

    // 204/304 are defined to carry no body; re-framing them would corrupt
    // the response
    if parts.status != hyper::StatusCode::NO_CONTENT
        && parts.status != hyper::StatusCode::NOT_MODIFIED
    {
        builder = builder.header(CONTENT_LENGTH, body.len());
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        logger::log_error(&format!("Failed to build relay response: {e}"));
        Response::new(Full::new(Bytes::new()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request_parts(uri: &str, headers: &[(&str, &str)]) -> hyper::http::request::Parts {
        let mut builder = Request::builder().method("POST").uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let (parts, ()) = builder.body(()).unwrap().into_parts();
        parts
    }

    fn peer() -> SocketAddr {
        "203.0.113.9:54321".parse().unwrap()
    }

    #[test]
    fn test_hop_by_hop_detection() {
        assert!(is_hop_by_hop("Connection"));
        assert!(is_hop_by_hop("transfer-encoding"));
        assert!(is_hop_by_hop("Keep-Alive"));
        assert!(!is_hop_by_hop("Content-Type"));
        assert!(!is_hop_by_hop("Authorization"));
    }

    #[test]
    fn test_upstream_request_preserves_path_and_query() {
        let parts = request_parts("/api/recipes/?page=2", &[("host", "foodgram.example")]);
        let req = build_upstream_request(&parts, Bytes::new(), "backend:8000", peer()).unwrap();
        assert_eq!(req.uri().to_string(), "/api/recipes/?page=2");
        assert_eq!(req.method(), "POST");
    }

    #[test]
    fn test_upstream_request_rewrites_headers() {
        let parts = request_parts(
            "/admin/login",
            &[
                ("host", "foodgram.example"),
                ("connection", "keep-alive"),
                ("authorization", "Token abc"),
                ("x-real-ip", "10.0.0.1"),
            ],
        );
        let req = build_upstream_request(&parts, Bytes::new(), "backend:8000", peer()).unwrap();

        // Host preserved, real client address stamped, spoofed value dropped
        assert_eq!(req.headers()["host"], "foodgram.example");
        assert_eq!(req.headers()["x-real-ip"], "203.0.113.9");
        // Hop-by-hop dropped, end-to-end kept
        assert!(req.headers().get("connection").is_none());
        assert_eq!(req.headers()["authorization"], "Token abc");
    }

    #[test]
    fn test_upstream_request_host_falls_back_to_upstream() {
        let parts = request_parts("/api/", &[]);
        let req = build_upstream_request(&parts, Bytes::new(), "backend:8000", peer()).unwrap();
        assert_eq!(req.headers()["host"], "backend:8000");
    }

    #[test]
    fn test_relay_response_strips_hop_by_hop() {
        let (parts, ()) = Response::builder()
            .status(201)
            .header("content-type", "application/json")
            .header("connection", "close")
            .header("content-length", "999")
            .body(())
            .unwrap()
            .into_parts();

        let resp = build_relay_response(&parts, Bytes::from("{\"id\":1}"));
        assert_eq!(resp.status(), 201);
        assert_eq!(resp.headers()["content-type"], "application/json");
        assert!(resp.headers().get("connection").is_none());
        // Content-Length re-framed to the buffered body
        assert_eq!(resp.headers()["content-length"], "8");
    }

    #[test]
    fn test_relay_response_no_length_on_304() {
        let (parts, ()) = Response::builder().status(304).body(()).unwrap().into_parts();
        let resp = build_relay_response(&parts, Bytes::new());
        assert_eq!(resp.status(), 304);
        assert!(resp.headers().get(CONTENT_LENGTH).is_none());
    }
}
