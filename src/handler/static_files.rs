//! Static file serving module
//!
//! Implements the two filesystem dispositions of the route table:
//!
//! - alias: the route prefix maps onto a directory and is stripped from the
//!   request path; a miss is a plain 404 (user media, admin/DRF assets)
//! - SPA root: the full request path resolves under a document root; a miss
//!   serves the route's fallback file with status 200 so client-side routes
//!   and docs deep links work (frontend bundle, ReDoc page)

use crate::handler::router::RequestContext;
use crate::http::{self, cache, mime, range::RangeParseResult};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve a request from an aliased directory. Never falls back.
pub async fn serve_alias(
    ctx: &RequestContext<'_>,
    dir: &str,
    route_prefix: &str,
) -> Response<Full<Bytes>> {
    let relative = alias_relative_path(ctx.path, route_prefix);
    match load_file(dir, &relative, &[]).await {
        Some((content, content_type)) => build_static_file_response(
            &content,
            content_type,
            ctx.if_none_match.as_deref(),
            ctx.is_head,
            ctx.range_header.as_deref(),
        ),
        None => http::build_404_response(),
    }
}

/// Serve a request from a document root, falling back to a fixed file on a
/// miss. The fallback is served with status 200 — the entire point is that
/// deep links into the client-side router are not errors.
pub async fn serve_spa_root(
    ctx: &RequestContext<'_>,
    root: &str,
    fallback: &str,
    index_files: &[String],
) -> Response<Full<Bytes>> {
    let relative = root_relative_path(ctx.path);
    let loaded = match load_file(root, &relative, index_files).await {
        Some(found) => Some(found),
        None => load_file(root, &root_relative_path(fallback), &[]).await,
    };

    match loaded {
        Some((content, content_type)) => build_static_file_response(
            &content,
            content_type,
            ctx.if_none_match.as_deref(),
            ctx.is_head,
            ctx.range_header.as_deref(),
        ),
        None => http::build_404_response(),
    }
}

/// Relative path under an alias directory: the route prefix is stripped.
fn alias_relative_path(path: &str, route_prefix: &str) -> String {
    path.strip_prefix(route_prefix)
        .unwrap_or(path)
        .trim_start_matches('/')
        .replace("..", "")
}

/// Relative path under a document root: the full request path is kept.
fn root_relative_path(path: &str) -> String {
    path.trim_start_matches('/').replace("..", "")
}

/// Load a file from under `base_dir`, trying `index_files` when the path
/// resolves to a directory. Returns the content and its MIME type, or None
/// when nothing exists (or the path escapes the base directory).
async fn load_file(
    base_dir: &str,
    relative: &str,
    index_files: &[String],
) -> Option<(Vec<u8>, &'static str)> {
    let mut file_path = Path::new(base_dir).join(relative);

    // Containment anchor; also catches a missing/mistyped base directory,
    // under which every request uniformly misses
    let base_canonical = match Path::new(base_dir).canonicalize() {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{base_dir}': {e}"
            ));
            return None;
        }
    };

    // Directory targets try index files
    if file_path.is_dir() || relative.is_empty() || relative.ends_with('/') {
        match resolve_index(&file_path, index_files) {
            Some(index_path) => file_path = index_path,
            None => return None,
        }
    }

    // A miss here is the common 404/fallback case, not worth a log line
    let Ok(file_path_canonical) = file_path.canonicalize() else {
        return None;
    };
    if !file_path_canonical.starts_with(&base_canonical) {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: {} -> {}",
            relative,
            file_path_canonical.display()
        ));
        return None;
    }

    let content = match fs::read(&file_path_canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path_canonical.display(),
                e
            ));
            return None;
        }
    };

    let content_type =
        mime::get_content_type(file_path_canonical.extension().and_then(|e| e.to_str()));

    Some((content, content_type))
}

/// First existing index file under a directory, if any
fn resolve_index(dir: &Path, index_files: &[String]) -> Option<PathBuf> {
    index_files
        .iter()
        .map(|index| dir.join(index))
        .find(|candidate| candidate.is_file())
}

/// Build static file response with `ETag` and Range support
fn build_static_file_response(
    data: &[u8],
    content_type: &str,
    if_none_match: Option<&str>,
    is_head: bool,
    range_header: Option<&str>,
) -> Response<Full<Bytes>> {
    let etag = cache::generate_etag(data);
    let total_size = data.len();

    // Check if client has cached version
    if cache::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    // Check for Range request
    match http::parse_range_header(range_header, total_size) {
        RangeParseResult::Valid(range) => {
            let start = range.start;
            let end = range.end_position(total_size);

            let body = if is_head {
                Bytes::new()
            } else {
                Bytes::from(data[start..=end].to_vec())
            };

            return http::response::build_partial_response(
                body,
                content_type,
                &etag,
                start,
                end,
                total_size,
                is_head,
            );
        }
        RangeParseResult::NotSatisfiable => {
            return http::build_416_response(total_size);
        }
        RangeParseResult::None => {
            // No Range header or malformed, return full content
        }
    }

    // Full response
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(data.to_owned())
    };

    http::response::build_cached_response(body, content_type, &etag, is_head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("foodgram-edge-{}-{name}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_alias_relative_path_strips_prefix() {
        assert_eq!(
            alias_relative_path("/media/recipes/photo.jpg", "/media/"),
            "recipes/photo.jpg"
        );
        assert_eq!(
            alias_relative_path("/static/admin/css/base.css", "/static/admin/"),
            "css/base.css"
        );
    }

    #[test]
    fn test_root_relative_path_keeps_full_path() {
        assert_eq!(root_relative_path("/api/docs/redoc.html"), "api/docs/redoc.html");
        assert_eq!(root_relative_path("/"), "");
    }

    #[test]
    fn test_relative_paths_refuse_traversal() {
        assert!(!alias_relative_path("/media/../../etc/passwd", "/media/").contains(".."));
        assert!(!root_relative_path("/../etc/passwd").contains(".."));
    }

    #[tokio::test]
    async fn test_load_file_hit_and_miss() {
        let dir = scratch_dir("alias");
        std::fs::write(dir.join("photo.jpg"), b"jpeg bytes").unwrap();
        let base = dir.to_str().unwrap();

        let (content, content_type) = load_file(base, "photo.jpg", &[]).await.unwrap();
        assert_eq!(content, b"jpeg bytes");
        assert_eq!(content_type, "image/jpeg");

        assert!(load_file(base, "missing.jpg", &[]).await.is_none());
    }

    #[tokio::test]
    async fn test_load_file_index_resolution() {
        let dir = scratch_dir("root");
        std::fs::write(dir.join("index.html"), b"<html>app</html>").unwrap();
        let base = dir.to_str().unwrap();
        let index_files = vec!["index.html".to_string(), "index.htm".to_string()];

        // Empty relative path (request for "/") resolves via index files
        let (content, content_type) = load_file(base, "", &index_files).await.unwrap();
        assert_eq!(content, b"<html>app</html>");
        assert_eq!(content_type, "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_load_file_missing_base_dir() {
        assert!(load_file("/definitely/not/a/real/dir", "x", &[]).await.is_none());
    }

    fn get_context(path: &str) -> RequestContext<'_> {
        RequestContext {
            path,
            is_head: false,
            if_none_match: None,
            range_header: None,
        }
    }

    #[tokio::test]
    async fn test_spa_root_serves_fallback_on_miss() {
        let dir = scratch_dir("spa");
        std::fs::create_dir_all(dir.join("api/docs")).unwrap();
        std::fs::write(dir.join("api/docs/redoc.html"), b"<html>redoc</html>").unwrap();

        // A docs deep link that exists nowhere on disk resolves to the docs
        // entry page with status 200
        let ctx = get_context("/api/docs/nonexistent");
        let resp = serve_spa_root(&ctx, dir.to_str().unwrap(), "/api/docs/redoc.html", &[]).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()["Content-Type"], "text/html; charset=utf-8");
    }

    #[tokio::test]
    async fn test_spa_root_missing_fallback_is_404() {
        let dir = scratch_dir("spa404");
        let ctx = get_context("/some/client/route");
        let resp = serve_spa_root(&ctx, dir.to_str().unwrap(), "/index.html", &[]).await;
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn test_alias_miss_is_plain_404() {
        let dir = scratch_dir("alias404");
        let ctx = get_context("/media/missing.jpg");
        let resp = serve_alias(&ctx, dir.to_str().unwrap(), "/media/").await;
        assert_eq!(resp.status(), 404);
    }
}
