//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: health probes, route selection,
//! method policy, dispatch to the static or proxy handlers, and the access
//! log line once the response is known.

use crate::config::{Config, RouteAction};
use crate::handler::{proxy, static_files};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use crate::routing;
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Request context for the static-file handlers
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
    pub range_header: Option<String>,
}

impl<'a> RequestContext<'a> {
    fn from_request(req: &'a Request<Incoming>) -> Self {
        Self {
            path: req.uri().path(),
            is_head: *req.method() == Method::HEAD,
            if_none_match: header_string(req, "if-none-match"),
            range_header: header_string(req, "range"),
        }
    }
}

/// Main entry point for HTTP request handling
pub async fn handle_request(
    req: Request<Incoming>,
    config: Arc<Config>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let mut entry = config
        .logging
        .access_log
        .then(|| access_entry(&req, peer_addr));

    logger::log_headers_count(req.headers().len(), config.logging.show_headers);

    let mut response = dispatch(req, &config, peer_addr).await;

    if let Ok(server) = hyper::header::HeaderValue::from_str(&config.http.server_name) {
        response.headers_mut().insert(hyper::header::SERVER, server);
    }

    if let Some(entry) = entry.as_mut() {
        entry.status = response.status().as_u16();
        entry.body_bytes = response_body_len(&response);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(entry, &config.logging.access_log_format);
    }

    Ok(response)
}

/// Select and execute the route disposition for a request
async fn dispatch(
    req: Request<Incoming>,
    config: &Config,
    peer_addr: SocketAddr,
) -> Response<Full<Bytes>> {
    let routes = &config.routes;
    let path = req.uri().path();

    // Health probes answer before the route table; the table stays the
    // bit-exact deployment artifact
    if routes.health.enabled
        && (path == routes.health.liveness_path || path == routes.health.readiness_path)
    {
        return http::build_health_response("ok");
    }

    // Declared oversized bodies are rejected before any dispatch
    if let Some(resp) = check_body_size(&req, config.http.max_body_size) {
        return resp;
    }

    let Some(route) = routing::match_route(path, &routes.table) else {
        // Unreachable with the catch-all in place; an explicitly emptied
        // table still answers cleanly
        return http::build_404_response();
    };

    match &route.action {
        // Proxied requests pass through untouched: the backend owns its own
        // method surface (POST/PATCH/DELETE on the API, CORS preflight)
        RouteAction::Proxy { upstream } => {
            proxy::forward(req, upstream, &config.proxy, peer_addr).await
        }
        RouteAction::Alias { dir } => {
            if let Some(resp) = check_static_method(req.method(), config.http.enable_cors) {
                return resp;
            }
            let ctx = RequestContext::from_request(&req);
            static_files::serve_alias(&ctx, dir, &route.prefix).await
        }
        RouteAction::SpaRoot { root, fallback } => {
            if let Some(resp) = check_static_method(req.method(), config.http.enable_cors) {
                return resp;
            }
            let ctx = RequestContext::from_request(&req);
            static_files::serve_spa_root(&ctx, root, fallback, &routes.index_files).await
        }
    }
}

/// Method policy for filesystem routes: GET/HEAD served, OPTIONS answered
/// locally, everything else 405
fn check_static_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD => None,
        Method::OPTIONS => Some(http::build_options_response(enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed on static route: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    content_length.to_str().map_or_else(
        |_| {
            logger::log_warning("Content-Length header contains non-ASCII characters");
            None
        },
        |size_str| match size_str.parse::<u64>() {
            Ok(size) if size > max_body_size => {
                logger::log_error(&format!(
                    "Request body too large: {size} bytes (max: {max_body_size})"
                ));
                Some(http::build_413_response())
            }
            Err(_) => {
                logger::log_warning(&format!(
                    "Invalid Content-Length value: '{size_str}', skipping size check"
                ));
                None
            }
            _ => None,
        },
    )
}

/// Seed an access log entry from the request line and headers
fn access_entry(req: &Request<Incoming>, peer_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        hyper::Version::HTTP_10 => "1.0",
        hyper::Version::HTTP_2 => "2",
        _ => "1.1",
    }
    .to_string();
    entry.referer = header_string(req, "referer");
    entry.user_agent = header_string(req, "user-agent");
    entry
}

/// Exact byte count the response will carry on the wire
fn response_body_len(response: &Response<Full<Bytes>>) -> usize {
    use hyper::body::Body as _;
    usize::try_from(response.body().size_hint().exact().unwrap_or(0)).unwrap_or(usize::MAX)
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_method_policy() {
        assert!(check_static_method(&Method::GET, false).is_none());
        assert!(check_static_method(&Method::HEAD, false).is_none());

        let resp = check_static_method(&Method::OPTIONS, false).unwrap();
        assert_eq!(resp.status(), 204);

        let resp = check_static_method(&Method::POST, false).unwrap();
        assert_eq!(resp.status(), 405);

        let resp = check_static_method(&Method::DELETE, false).unwrap();
        assert_eq!(resp.status(), 405);
    }

    #[test]
    fn test_body_size_check() {
        let within = Request::builder()
            .header("content-length", "100")
            .body(())
            .unwrap();
        assert!(check_body_size(&within, 1000).is_none());

        let oversized = Request::builder()
            .header("content-length", "2000")
            .body(())
            .unwrap();
        let resp = check_body_size(&oversized, 1000).unwrap();
        assert_eq!(resp.status(), 413);

        let unparseable = Request::builder()
            .header("content-length", "not-a-number")
            .body(())
            .unwrap();
        assert!(check_body_size(&unparseable, 1000).is_none());

        let absent = Request::builder().body(()).unwrap();
        assert!(check_body_size(&absent, 1000).is_none());
    }

    #[test]
    fn test_response_body_len_is_exact() {
        let resp = Response::new(Full::new(Bytes::from("hello")));
        assert_eq!(response_body_len(&resp), 5);
    }
}
