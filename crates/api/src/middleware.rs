use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// Records method, path, status and latency for every request.
///
/// Only the path is logged. Query strings can carry tokens, e.g.
/// `/api/users/iam/introspect?token=...`.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();

    let start = Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        path = %path,
        status = %response.status(),
        duration_ms = duration.as_millis() as u64,
        "Request completed"
    );

    response
}
