//! Request authentication and request/response logging.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;

use super::error::AppError;
use super::verifier::{Identity, TokenVerifier};

const UNAUTHORIZED_MSG: &str = "Unauthorized";

/// Extracts the bearer token from the `Authorization` header.
pub fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();

    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Verifies the caller's bearer token and yields the verified [`Identity`].
///
/// Any state that can hand out an `Arc<dyn TokenVerifier>` can authenticate
/// handlers simply by taking `Identity` as an argument.
impl<S> FromRequestParts<S> for Identity
where
    Arc<dyn TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| AppError::Unauthorized(UNAUTHORIZED_MSG.to_string()))?;
        let verifier = <Arc<dyn TokenVerifier> as FromRef<S>>::from_ref(state);

        Ok(verifier.verify(token).await?)
    }
}

pub async fn request_response_logger(mut req: Request<Body>, next: Next) -> Result<Response, StatusCode> {
    let start_time = Instant::now();
    let method = req.method().clone();
    let uri = req.uri().clone();
    let version = req.version();

    let c_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    req.extensions_mut().insert(c_id.clone());

    tracing::info!(
        _cID = c_id,
        method = %method,
        uri = %uri,
        version = ?version,
        "Incoming request"
    );

    let mut response = next.run(req).await;

    let duration = start_time.elapsed();
    let status = response.status();

    response.headers_mut().insert(
        HeaderName::from_static("x-request-id"),
        HeaderValue::from_str(c_id.as_str()).unwrap_or_else(|_| HeaderValue::from_static("invalid-correlation-id")),
    );

    if status.is_server_error() {
        tracing::error!(
            _cID = c_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = duration.as_millis(),
            "Request completed with server error"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            _cID = c_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = duration.as_millis(),
            "Request completed with client error"
        );
    } else {
        tracing::info!(
            _cID = c_id,
            method = %method,
            uri = %uri,
            status = %status,
            duration_ms = duration.as_millis(),
            "Request completed successfully"
        );
    }

    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Router, middleware};
    use tower::ServiceExt;

    use super::*;
    use crate::verifier::{MockTokenVerifier, VerifierError};

    async fn test_handler(identity: Identity) -> impl IntoResponse {
        format!("Hello, user: {}", identity.subject_id)
    }

    fn app(verifier: MockTokenVerifier) -> Router {
        let verifier: Arc<dyn TokenVerifier> = Arc::new(verifier);
        Router::new().route("/protected", get(test_handler)).with_state(verifier)
    }

    fn request(authorization: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().method(Method::GET).uri("/protected");
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_identity_success() {
        let mut verifier = MockTokenVerifier::new();
        verifier
            .expect_verify()
            .withf(|token| token == "valid_token")
            .returning(|_| Ok(Identity { subject_id: "uid-123".into(), email: None }));

        let response = app(verifier).oneshot(request(Some("Bearer valid_token"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Hello, user: uid-123");
    }

    #[tokio::test]
    async fn test_identity_invalid_token() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().returning(|_| Err(VerifierError::InvalidToken));

        let response = app(verifier).oneshot(request(Some("Bearer invalid_token"))).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(body_string(response).await.contains("Invalid token"));
    }

    #[tokio::test]
    async fn test_identity_missing_header_skips_verifier() {
        let mut verifier = MockTokenVerifier::new();
        verifier.expect_verify().never();

        let router = app(verifier);

        for header in [None, Some("Basic abc"), Some("Bearer"), Some("Bearer    ")] {
            let response = router.clone().oneshot(request(header)).await.unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "header {header:?}");
        }
    }

    #[tokio::test]
    async fn test_request_response_logger_sets_request_id() {
        let router = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(middleware::from_fn(request_response_logger));

        let response = router.clone().oneshot(Request::get("/").body(Body::empty()).unwrap()).await.unwrap();
        assert!(response.headers().get("x-request-id").is_some());

        let response = router
            .oneshot(Request::get("/").header("x-request-id", "abc-123").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.headers().get("x-request-id").unwrap(), "abc-123");
    }
}
