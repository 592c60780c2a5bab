//! Request dispatcher: binds registered actions to axum routes and runs the
//! per-request pipeline.
//!
//! For every request the pipeline:
//! 1. builds a [`ContextParams`] from the identity and language headers
//! 2. reads the body and decodes it into a [`MapStr`] (empty body -> empty map)
//! 3. invokes the action's handler exactly once
//! 4. classifies a handler error into a response code
//! 5. writes exactly one [`ApiResponse`]
//!
//! Body read and decode failures short-circuit with fixed error codes and
//! never reach the handler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRequestParts, Path, Query, Request};
use axum::response::{IntoResponse, Response};
use axum::routing::on;
use axum::Router;
use topo_core::{codes, ErrorResolver, LanguageResolver, MapStr};
use tracing::{error, field, info_span, Instrument};

use super::action::Action;
use super::envelope::ApiResponse;
use crate::context::{ContextParams, Params};

/// Default maximum request body size in bytes.
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// Turns actions into routes sharing the error/language resolvers.
///
/// The resolvers are read-only and shared by every request through `Arc`.
#[derive(Clone)]
pub struct Dispatcher {
    errors: Arc<dyn ErrorResolver>,
    languages: Arc<dyn LanguageResolver>,
    body_limit: usize,
}

impl Dispatcher {
    #[must_use]
    pub fn new(errors: Arc<dyn ErrorResolver>, languages: Arc<dyn LanguageResolver>) -> Self {
        Self {
            errors,
            languages,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }

    /// Sets the maximum body size. Larger bodies fail with
    /// `CC_ERR_COMM_HTTP_READ_BODY_FAILED`.
    #[must_use]
    pub fn with_body_limit(mut self, body_limit: usize) -> Self {
        self.body_limit = body_limit;
        self
    }

    /// Builds a router with one route per action.
    ///
    /// Actions sharing a path but not a verb are merged into one route by
    /// axum. The registry guarantees no (verb, path) pair appears twice.
    pub fn bind(&self, actions: &[Action]) -> Router {
        let mut router = Router::new();
        for action in actions {
            let endpoint = Arc::new(Endpoint {
                action: action.clone(),
                dispatcher: self.clone(),
            });
            router = router.route(
                action.path(),
                on(action.verb().method_filter(), move |req: Request| {
                    let endpoint = Arc::clone(&endpoint);
                    async move { endpoint.serve(req).await }
                }),
            );
        }
        router
    }
}

/// One bound action.
struct Endpoint {
    action: Action,
    dispatcher: Dispatcher,
}

impl Endpoint {
    async fn serve(&self, req: Request) -> Response {
        let span = info_span!(
            "action",
            verb = %self.action.verb(),
            path = %self.action.path(),
            code = field::Empty,
            duration_ms = field::Empty,
        );

        let start = Instant::now();
        let envelope = self.dispatch(req).instrument(span.clone()).await;

        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        span.record("code", envelope.code);
        span.record("duration_ms", duration_ms);

        envelope.into_response()
    }

    async fn dispatch(&self, req: Request) -> ApiResponse {
        let (mut parts, body) = req.into_parts();

        let params = ContextParams::from_headers(
            parts.headers.clone(),
            self.dispatcher.errors.as_ref(),
            self.dispatcher.languages.as_ref(),
        );

        let path_params: Params = Path::<HashMap<String, String>>::from_request_parts(&mut parts, &())
            .await
            .map(|Path(p)| p.into())
            .unwrap_or_default();
        let query_params: Params = Query::<HashMap<String, String>>::try_from_uri(&parts.uri)
            .map(|Query(q)| q.into())
            .unwrap_or_default();

        let raw = match axum::body::to_bytes(body, self.dispatcher.body_limit).await {
            Ok(raw) => raw,
            Err(err) => {
                error!("read http request body failed, error: {}", err);
                let code = codes::CC_ERR_COMM_HTTP_READ_BODY_FAILED;
                return ApiResponse::failure(code, params.err.message(code));
            }
        };

        let data = match decode_body(&raw) {
            Ok(data) => data,
            Err(err) => {
                error!("failed to unmarshal the data, error: {}", err);
                let code = codes::CC_ERR_COMM_JSON_UNMARSHAL_FAILED;
                return ApiResponse::failure(code, params.err.message(code));
            }
        };

        let handler = self.action.handler();
        match handler(params, path_params, query_params, data).await {
            Ok(payload) => ApiResponse::success(payload),
            Err(err) => {
                error!(code = err.code(), "{}", err);
                ApiResponse::failure(err.code(), err.to_string())
            }
        }
    }
}

/// Decodes a request body. An empty body, or a JSON `null`, decodes to an
/// empty map.
///
/// # Errors
///
/// Returns the JSON error when a non-empty body is not a JSON object.
pub fn decode_body(raw: &[u8]) -> Result<MapStr, serde_json::Error> {
    if raw.is_empty() {
        return Ok(MapStr::new());
    }
    let decoded: Option<MapStr> = serde_json::from_slice(raw)?;
    Ok(decoded.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{PathParams, QueryParams, BK_HTTP_HEADER_LANGUAGE, BK_HTTP_HEADER_OWNER_ID};
    use crate::service::action::{Action, ActionRegistry, Verb};
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use proptest::prelude::*;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use topo_core::{CcError, ErrorCatalog, LanguageCatalog};
    use tower::ServiceExt;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(ErrorCatalog::builtin("en")),
            Arc::new(LanguageCatalog::new("en")),
        )
    }

    fn echo_router(calls: Arc<AtomicUsize>) -> Router {
        let mut registry = ActionRegistry::new();
        registry
            .register(Action::new(
                Verb::Post,
                "/echo/{id}",
                move |ctx: ContextParams, path: PathParams, query: QueryParams, data: MapStr| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        Ok::<_, CcError>(json!({
                            "owner": ctx.supplier_account,
                            "id": path.get("id"),
                            "q": query.get("q"),
                            "body": data,
                        }))
                    }
                },
            ))
            .unwrap();
        registry
            .register(Action::new(Verb::Get, "/coded", |ctx: ContextParams, _p, _q, _d| async move {
                Err::<Value, _>(ctx.err.error(codes::CC_ERR_COMM_NOT_FOUND))
            }))
            .unwrap();
        registry
            .register(Action::new(Verb::Get, "/plain", |_c, _p, _q, _d| async {
                Err::<Value, _>(CcError::from(anyhow::anyhow!("connection reset")))
            }))
            .unwrap();
        dispatcher().bind(registry.actions())
    }

    async fn call(router: Router, method: Method, uri: &str, body: &str) -> (StatusCode, Value) {
        let req = axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header(BK_HTTP_HEADER_OWNER_ID, "0")
            .header(BK_HTTP_HEADER_LANGUAGE, "en")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn decode_body_empty_and_null_yield_empty_map() {
        assert!(decode_body(b"").unwrap().is_empty());
        assert!(decode_body(b"null").unwrap().is_empty());
        assert_eq!(
            decode_body(br#"{"a":1}"#).unwrap().get_i64("a").unwrap(),
            1
        );
    }

    #[test]
    fn decode_body_rejects_non_objects() {
        assert!(decode_body(b"[1]").is_err());
        assert!(decode_body(b"   ").is_err());
        assert!(decode_body(b"{").is_err());
    }

    #[tokio::test]
    async fn success_passes_context_params_and_body_to_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, body) = call(
            echo_router(Arc::clone(&calls)),
            Method::POST,
            "/echo/7?q=x",
            r#"{"bk_set_name":"Set-A"}"#,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "result": true,
                "code": 0,
                "message": "success",
                "data": {"owner": "0", "id": "7", "q": "x", "body": {"bk_set_name": "Set-A"}}
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_body_reaches_handler_as_empty_map() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (_, body) = call(echo_router(Arc::clone(&calls)), Method::POST, "/echo/1", "").await;
        assert_eq!(body["code"], 0);
        assert_eq!(body["data"]["body"], json!({}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn malformed_json_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let (status, body) =
            call(echo_router(Arc::clone(&calls)), Method::POST, "/echo/1", "{oops").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "result": false,
                "code": codes::CC_ERR_COMM_JSON_UNMARSHAL_FAILED,
                "message": "JSON unmarshal failed",
                "data": null
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn oversized_body_is_a_read_failure() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = ActionRegistry::new();
        let counter = Arc::clone(&calls);
        registry
            .register(Action::new(Verb::Post, "/small", move |_c, _p, _q, _d| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, CcError>(Value::Null) }
            }))
            .unwrap();
        let router = dispatcher().with_body_limit(4).bind(registry.actions());

        let (_, body) = call(router, Method::POST, "/small", r#"{"too":"long"}"#).await;
        assert_eq!(body["result"], false);
        assert_eq!(body["code"], codes::CC_ERR_COMM_HTTP_READ_BODY_FAILED);
        assert_eq!(body["message"], "HTTP read body failed");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn coded_handler_error_keeps_its_code() {
        let (_, body) = call(echo_router(Arc::default()), Method::GET, "/coded", "").await;
        assert_eq!(
            body,
            json!({
                "result": false,
                "code": codes::CC_ERR_COMM_NOT_FOUND,
                "message": "the data is not found",
                "data": null
            })
        );
    }

    #[tokio::test]
    async fn uncoded_handler_error_is_system_busy() {
        let (_, body) = call(echo_router(Arc::default()), Method::GET, "/plain", "").await;
        assert_eq!(
            body,
            json!({
                "result": false,
                "code": codes::CC_SYSTEM_BUSY,
                "message": "connection reset",
                "data": null
            })
        );
    }

    #[tokio::test]
    async fn error_message_follows_request_language() {
        let req = axum::http::Request::builder()
            .method(Method::GET)
            .uri("/coded")
            .header(BK_HTTP_HEADER_LANGUAGE, "zh-CN")
            .body(Body::empty())
            .unwrap();
        let response = echo_router(Arc::default()).oneshot(req).await.unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["message"], "数据不存在");
    }

    #[tokio::test]
    async fn unknown_language_falls_back_to_default() {
        let translator = ErrorCatalog::builtin("en").create_default_error("xx-yy");
        assert_eq!(translator.language(), "en");
        let (_, body) = call(echo_router(Arc::default()), Method::GET, "/coded", "").await;
        assert_eq!(body["message"], "the data is not found");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn any_unterminated_object_is_an_unmarshal_failure(tail in "[a-z0-9:,\" ]{0,24}") {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            let calls = Arc::new(AtomicUsize::new(0));
            let raw = format!("{{{tail}");

            let (_, body) = runtime.block_on(call(
                echo_router(Arc::clone(&calls)),
                Method::POST,
                "/echo/1",
                &raw,
            ));

            prop_assert_eq!(body.as_object().unwrap().len(), 4);
            prop_assert_eq!(&body["result"], &json!(false));
            prop_assert_eq!(&body["code"], &json!(codes::CC_ERR_COMM_JSON_UNMARSHAL_FAILED));
            prop_assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }
}
