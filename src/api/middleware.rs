use axum::{
    body::Body,
    extract::Request,
    http::{HeaderName, HeaderValue, Method, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tower_http::request_id::{MakeRequestId, RequestId};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
pub const CORS_ALLOW_METHODS: &str = "POST, OPTIONS";

#[must_use]
pub fn request_id_header() -> HeaderName {
    HeaderName::from_static(REQUEST_ID_HEADER)
}

/// Keeps a caller-supplied `x-request-id`, otherwise generates a UUID v4.
#[derive(Clone, Copy, Debug, Default)]
pub struct MakeRequestUuidOrHeader;

impl MakeRequestId for MakeRequestUuidOrHeader {
    fn make_request_id<B>(&mut self, request: &axum::http::Request<B>) -> Option<RequestId> {
        if let Some(existing) = request.headers().get(REQUEST_ID_HEADER).filter(|v| !v.is_empty()) {
            return Some(RequestId::new(existing.clone()));
        }
        HeaderValue::from_str(&Uuid::new_v4().to_string()).ok().map(RequestId::new)
    }
}

/// Answers every `OPTIONS` request before routing or state is consulted and
/// adds the allow-origin/allow-headers pair to every other response.
pub async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        return (
            StatusCode::NO_CONTENT,
            [
                (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static(CORS_ALLOW_ORIGIN)),
                (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(CORS_ALLOW_HEADERS)),
                (header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(CORS_ALLOW_METHODS)),
            ],
            Body::empty(),
        )
            .into_response();
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    let _ = headers
        .entry(header::ACCESS_CONTROL_ALLOW_ORIGIN)
        .or_insert_with(|| HeaderValue::from_static(CORS_ALLOW_ORIGIN));
    let _ = headers
        .entry(header::ACCESS_CONTROL_ALLOW_HEADERS)
        .or_insert_with(|| HeaderValue::from_static(CORS_ALLOW_HEADERS));
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Router, middleware::from_fn, routing::post};
    use tower::ServiceExt;

    fn router() -> Router {
        Router::new().route("/v1/send_push_ios", post(|| async { "sent" })).layer(from_fn(cors))
    }

    #[tokio::test]
    async fn test_preflight_short_circuits_any_path() {
        for path in ["/v1/send_push_ios", "/does/not/exist"] {
            let request = Request::builder().method(Method::OPTIONS).uri(path).body(Body::empty()).unwrap();
            let response = router().oneshot(request).await.unwrap();

            assert_eq!(response.status(), StatusCode::NO_CONTENT);
            assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
            assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS], "POST, OPTIONS");
            assert_eq!(
                response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
                "authorization, x-client-info, apikey, content-type"
            );
        }
    }

    #[tokio::test]
    async fn test_other_methods_pass_through_with_cors_headers() {
        let request = Request::builder().method(Method::POST).uri("/v1/send_push_ios").body(Body::empty()).unwrap();
        let response = router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(response.headers().get(header::ACCESS_CONTROL_ALLOW_METHODS).is_none());
    }

    #[test]
    fn test_request_id_prefers_header() {
        let request = axum::http::Request::builder().header(REQUEST_ID_HEADER, "abc-123").body(()).unwrap();
        let id = MakeRequestUuidOrHeader.make_request_id(&request).unwrap();
        assert_eq!(id.header_value(), "abc-123");

        let request = axum::http::Request::builder().body(()).unwrap();
        let id = MakeRequestUuidOrHeader.make_request_id(&request).unwrap();
        assert!(Uuid::parse_str(id.header_value().to_str().unwrap()).is_ok());
    }
}
