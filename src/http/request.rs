//! Request ID middleware.
//!
//! A UUID v4 is attached to every request as early as possible so log lines
//! and the response can be correlated.

use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use uuid::Uuid;

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Attach a request ID to the request and echo it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let id = Uuid::new_v4().to_string();
    let value =
        HeaderValue::from_str(&id).unwrap_or_else(|_| HeaderValue::from_static("unknown"));

    req.headers_mut().insert(X_REQUEST_ID, value.clone());
    let mut response = next.run(req).await;
    response.headers_mut().insert(X_REQUEST_ID, value);
    response
}
