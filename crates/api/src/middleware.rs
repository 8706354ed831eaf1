use axum::{
    http::{HeaderMap, Method, StatusCode},
    middleware::Next,
    response::Response,
};

use bizbooks_core::UserId;

use crate::context::ActorContext;

pub const ACTOR_HEADER: &str = "x-actor-id";

/// Attach the [`ActorContext`] to every request.
///
/// A malformed header is always rejected; a missing one only on methods
/// that write.
pub async fn actor_middleware(
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let actor = match extract_actor(req.headers())? {
        Some(user_id) => ActorContext::new(user_id),
        None if is_mutating(req.method()) => return Err(StatusCode::UNAUTHORIZED),
        None => ActorContext::anonymous(),
    };

    req.extensions_mut().insert(actor);
    Ok(next.run(req).await)
}

fn is_mutating(method: &Method) -> bool {
    !matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

fn extract_actor(headers: &HeaderMap) -> Result<Option<UserId>, StatusCode> {
    let Some(header) = headers.get(ACTOR_HEADER) else {
        return Ok(None);
    };

    let raw = header.to_str().map_err(|_| StatusCode::UNAUTHORIZED)?.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    raw.parse::<UserId>()
        .map(Some)
        .map_err(|_| StatusCode::UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn header_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_actor(&headers), Ok(None));

        headers.insert(ACTOR_HEADER, HeaderValue::from_static("not-a-uuid"));
        assert_eq!(extract_actor(&headers), Err(StatusCode::UNAUTHORIZED));

        let user = UserId::new();
        headers.insert(
            ACTOR_HEADER,
            HeaderValue::from_str(&user.to_string()).unwrap(),
        );
        assert_eq!(extract_actor(&headers), Ok(Some(user)));
    }

    #[test]
    fn only_reads_run_anonymously() {
        assert!(!is_mutating(&Method::GET));
        assert!(is_mutating(&Method::POST));
        assert!(is_mutating(&Method::PUT));
        assert!(is_mutating(&Method::DELETE));
    }
}
