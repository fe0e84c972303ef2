//! Request tracing middleware
//!
//! Each request runs in its own root span tagged with a short correlation id.

use axum::{extract::Request, middleware::Next, response::Response};
use tracing::{info_span, Instrument};

/// Short random hex id
fn gen_id() -> String {
    format!("{:06x}", rand::random::<u32>() & 0xFFFFFF)
}

pub async fn trace_request(request: Request, next: Next) -> Response {
    let id = gen_id();
    let method = request.method().clone();
    let path = request.uri().path().to_string();

    // No parent: spans must not nest across unrelated requests
    let span = info_span!(parent: None, "httpd", %id, %method, %path);

    async move {
        let response = next.run(request).await;
        tracing::debug!(status = response.status().as_u16(), "request finished");
        response
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gen_id_is_six_hex_digits() {
        let id = gen_id();
        assert_eq!(id.len(), 6);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
