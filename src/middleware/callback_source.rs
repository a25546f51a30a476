//! Source-network check for `/callback/:provider`. Each provider may have
//! its own networks; providers without an entry use the default list.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::AllowedIps;

const CALLBACK_PREFIX: &str = "/callback/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackSources {
    pub default: AllowedIps,
    /// Networks keyed by adapter key, e.g. `paylink`.
    pub providers: HashMap<String, AllowedIps>,
    /// Number of reverse proxies in front of the service whose
    /// X-Forwarded-For entries are stripped from the right.
    pub trusted_proxy_depth: usize,
}

impl Default for CallbackSources {
    fn default() -> Self {
        Self {
            default: AllowedIps::Any,
            providers: HashMap::new(),
            trusted_proxy_depth: 0,
        }
    }
}

impl CallbackSources {
    pub fn networks_for(&self, provider: &str) -> &AllowedIps {
        self.providers.get(provider).unwrap_or(&self.default)
    }

    /// Whether a notification for `provider` from `source` may pass.
    /// An unknown source only passes an open list.
    pub fn admits(&self, provider: &str, source: Option<IpAddr>) -> bool {
        match (self.networks_for(provider), source) {
            (AllowedIps::Any, _) => true,
            (networks, Some(ip)) => networks.contains(&ip),
            (_, None) => false,
        }
    }

    /// Client address: the X-Forwarded-For entry just left of the trusted
    /// proxies, or the peer address when the header is absent or too short.
    fn client_ip(&self, headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
        forwarded_client(headers, self.trusted_proxy_depth).or(peer)
    }
}

fn forwarded_client(headers: &HeaderMap, trusted_proxy_depth: usize) -> Option<IpAddr> {
    let header = headers.get("x-forwarded-for")?.to_str().ok()?;
    let hops: Vec<IpAddr> = header
        .split(',')
        .filter_map(|hop| {
            let hop = hop.trim();
            hop.parse::<IpAddr>()
                .ok()
                .or_else(|| hop.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
        })
        .collect();
    let index = hops.len().checked_sub(trusted_proxy_depth + 1)?;
    hops.get(index).copied()
}

pub async fn callback_source_middleware(
    State(sources): State<Arc<CallbackSources>>,
    req: Request,
    next: Next,
) -> Response {
    let provider = req
        .uri()
        .path()
        .strip_prefix(CALLBACK_PREFIX)
        .unwrap_or_default()
        .to_string();
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());
    let source = sources.client_ip(req.headers(), peer);

    if !sources.admits(&provider, source) {
        tracing::warn!(
            provider = %provider,
            source = ?source,
            "Callback from a network not registered for this provider"
        );
        return StatusCode::FORBIDDEN.into_response();
    }

    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{HeaderValue, Request};
    use axum::{routing::post, Router};
    use tower::ServiceExt;

    fn networks(raw: &str) -> AllowedIps {
        crate::config::parse_allowed_ips(raw).unwrap()
    }

    fn sources() -> CallbackSources {
        CallbackSources {
            default: networks("10.0.0.0/8"),
            providers: HashMap::from([("sequoia".to_string(), networks("203.0.113.0/24"))]),
            trusted_proxy_depth: 1,
        }
    }

    fn app(sources: CallbackSources) -> Router {
        Router::new()
            .route("/callback/:provider", post(|| async { "OK" }))
            .layer(axum::middleware::from_fn_with_state(
                Arc::new(sources),
                callback_source_middleware,
            ))
    }

    fn callback(provider: &str, forwarded_for: &'static str) -> Request<Body> {
        let mut request = Request::builder()
            .method("POST")
            .uri(format!("/callback/{provider}"))
            .body(Body::from("{}"))
            .unwrap();
        request
            .headers_mut()
            .insert("x-forwarded-for", HeaderValue::from_static(forwarded_for));
        request
    }

    #[test]
    fn test_forwarded_client_skips_trusted_proxies() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.10, 198.51.100.7:443"),
        );
        assert_eq!(
            forwarded_client(&headers, 1),
            Some(IpAddr::from([203, 0, 113, 10]))
        );
        assert_eq!(
            forwarded_client(&headers, 0),
            Some(IpAddr::from([198, 51, 100, 7]))
        );
        assert_eq!(forwarded_client(&headers, 2), None);
    }

    #[test]
    fn test_peer_address_used_without_forwarded_header() {
        let peer = Some(IpAddr::from([10, 1, 1, 1]));
        assert_eq!(sources().client_ip(&HeaderMap::new(), peer), peer);
    }

    #[test]
    fn test_provider_networks_override_default() {
        let sources = sources();
        let provider_ip = Some(IpAddr::from([203, 0, 113, 5]));
        let internal_ip = Some(IpAddr::from([10, 2, 3, 4]));

        assert!(sources.admits("sequoia", provider_ip));
        assert!(!sources.admits("sequoia", internal_ip));
        assert!(sources.admits("paylink", internal_ip));
        assert!(!sources.admits("paylink", provider_ip));
        assert!(!sources.admits("paylink", None));
        assert!(CallbackSources::default().admits("paylink", None));
    }

    #[tokio::test]
    async fn test_request_from_provider_network_passes() {
        let response = app(sources())
            .oneshot(callback("sequoia", "203.0.113.9, 10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_request_from_other_network_is_forbidden() {
        let response = app(sources())
            .oneshot(callback("sequoia", "10.9.9.9, 10.0.0.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
