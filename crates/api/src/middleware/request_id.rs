use axum::{body::Body, http::Request, middleware::Next, response::Response};
use nanoid::nanoid;

use crate::state::RequestId;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Tag the request with an id and echo it on the response.
///
/// A caller-supplied id is kept when it is short and printable.
pub async fn request_id(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(accept_incoming)
        .unwrap_or_else(|| format!("req_{}", nanoid!(16)));
    req.extensions_mut().insert(RequestId(request_id.clone()));
    let mut resp = next.run(req).await;
    if let Ok(value) = request_id.parse() {
        resp.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    resp
}

fn accept_incoming(value: &str) -> Option<String> {
    let value = value.trim();
    let valid = !value.is_empty()
        && value.len() <= 64
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    valid.then(|| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accept_incoming() {
        assert_eq!(accept_incoming("req_abc-123"), Some("req_abc-123".to_string()));
        assert_eq!(accept_incoming("  trace.42 "), Some("trace.42".to_string()));
        assert_eq!(accept_incoming(""), None);
        assert_eq!(accept_incoming("has space"), None);
        assert_eq!(accept_incoming(&"x".repeat(65)), None);
    }
}
