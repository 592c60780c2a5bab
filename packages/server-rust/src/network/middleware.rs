//! HTTP middleware wrapped around the topo routes.
//!
//! Layers listed first are outermost. None of them answers on the handler's
//! behalf: every request that reaches a route gets the route's own envelope,
//! however long the handler takes.

use axum::body::Body;
use axum::http::header::{HeaderName, CONTENT_TYPE};
use axum::http::{Method, Request};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tracing::{info_span, Level, Span};

use super::config::NetworkConfig;
use crate::context::{BK_HTTP_HEADER_LANGUAGE, BK_HTTP_HEADER_OWNER_ID, BK_HTTP_HEADER_USER};

const X_REQUEST_ID: &str = "x-request-id";

/// Wraps `router` in the HTTP layers, outermost first:
/// 1. `SetRequestId` assigns a UUID `x-request-id` unless the caller sent one
/// 2. `Trace` opens an `http` span carrying the request id and tenant
/// 3. `CORS` answers preflights for the configured origins
/// 4. `PropagateRequestId` echoes `x-request-id` on the response
///
/// Per-action logging (verb, path, response code, duration) happens in the
/// dispatcher, inside this span.
#[must_use]
pub fn apply_http_layers(router: Router, config: &NetworkConfig) -> Router {
    let x_request_id = HeaderName::from_static(X_REQUEST_ID);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(http_span)
                    .on_response(DefaultOnResponse::new().level(Level::INFO)),
            )
            .layer(build_cors_layer(&config.cors_origins))
            .layer(PropagateRequestIdLayer::new(x_request_id)),
    )
}

fn http_span(request: &Request<Body>) -> Span {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    };
    info_span!(
        "http",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %header(X_REQUEST_ID),
        supplier_account = %header(BK_HTTP_HEADER_OWNER_ID),
    )
}

/// `"*"` allows any origin; otherwise only the parseable entries are allowed.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_origin = if origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let parsed: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();
        AllowOrigin::list(parsed)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            CONTENT_TYPE,
            HeaderName::from_static(X_REQUEST_ID),
            HeaderName::from_static(BK_HTTP_HEADER_OWNER_ID),
            HeaderName::from_static(BK_HTTP_HEADER_LANGUAGE),
            HeaderName::from_static(BK_HTTP_HEADER_USER),
        ])
}
