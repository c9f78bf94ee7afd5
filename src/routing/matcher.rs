//! Route matching module
//!
//! Longest-prefix selection over the configured route table. The table is
//! immutable after load, so matching is a plain scan with no locks; at seven
//! rules a scan beats anything clever.

use crate::config::Route;

/// Select the route for a request path.
///
/// The longest matching prefix wins; among equal-length matches the first in
/// configuration order wins. With the deployment table the `/` catch-all
/// guarantees a match, so `None` only occurs for an explicitly emptied table.
pub fn match_route<'a>(path: &str, table: &'a [Route]) -> Option<&'a Route> {
    let mut best: Option<&Route> = None;
    for route in table {
        if path.starts_with(route.prefix.as_str()) {
            match best {
                Some(b) if route.prefix.len() <= b.prefix.len() => {}
                _ => best = Some(route),
            }
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RouteAction;

    fn table() -> Vec<Route> {
        vec![
            Route {
                prefix: "/static/admin/".to_string(),
                action: RouteAction::Alias {
                    dir: "/var/html/static/admin/".to_string(),
                },
            },
            Route {
                prefix: "/media/".to_string(),
                action: RouteAction::Alias {
                    dir: "/var/html/media/".to_string(),
                },
            },
            Route {
                prefix: "/admin/".to_string(),
                action: RouteAction::Proxy {
                    upstream: "backend:8000".to_string(),
                },
            },
            Route {
                prefix: "/api/docs/".to_string(),
                action: RouteAction::SpaRoot {
                    root: "/usr/share/nginx/html".to_string(),
                    fallback: "/api/docs/redoc.html".to_string(),
                },
            },
            Route {
                prefix: "/api/".to_string(),
                action: RouteAction::Proxy {
                    upstream: "backend:8000".to_string(),
                },
            },
            Route {
                prefix: "/".to_string(),
                action: RouteAction::SpaRoot {
                    root: "/usr/share/nginx/html".to_string(),
                    fallback: "/index.html".to_string(),
                },
            },
        ]
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();
        // /api/docs/ is longer than /api/, order in the table is irrelevant
        let route = match_route("/api/docs/schema", &table).unwrap();
        assert_eq!(route.prefix, "/api/docs/");

        let route = match_route("/api/recipes/42/", &table).unwrap();
        assert_eq!(route.prefix, "/api/");
    }

    #[test]
    fn test_catch_all_always_matches() {
        let table = table();
        let route = match_route("/some/client/route", &table).unwrap();
        assert_eq!(route.prefix, "/");

        let route = match_route("/", &table).unwrap();
        assert_eq!(route.prefix, "/");
    }

    #[test]
    fn test_prefix_is_not_substring_match() {
        let table = table();
        // /apixyz must not hit /api/
        let route = match_route("/apixyz", &table).unwrap();
        assert_eq!(route.prefix, "/");

        // /admin without the trailing slash falls through to the catch-all,
        // exactly as the original prefix rules behaved
        let route = match_route("/admin", &table).unwrap();
        assert_eq!(route.prefix, "/");
    }

    #[test]
    fn test_specific_prefixes() {
        let table = table();
        assert_eq!(
            match_route("/static/admin/css/base.css", &table)
                .unwrap()
                .prefix,
            "/static/admin/"
        );
        assert_eq!(
            match_route("/media/recipes/photo.jpg", &table).unwrap().prefix,
            "/media/"
        );
        assert_eq!(match_route("/admin/login", &table).unwrap().prefix, "/admin/");
    }

    #[test]
    fn test_first_rule_wins_on_equal_length() {
        let duplicated = vec![
            Route {
                prefix: "/x/".to_string(),
                action: RouteAction::Proxy {
                    upstream: "first:1".to_string(),
                },
            },
            Route {
                prefix: "/x/".to_string(),
                action: RouteAction::Proxy {
                    upstream: "second:2".to_string(),
                },
            },
        ];
        let route = match_route("/x/y", &duplicated).unwrap();
        assert_eq!(
            route.action,
            RouteAction::Proxy {
                upstream: "first:1".to_string()
            }
        );
    }

    #[test]
    fn test_empty_table() {
        assert!(match_route("/anything", &[]).is_none());
    }
}
