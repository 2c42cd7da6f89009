use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::error::AppError;
use crate::AppState;

/// Header carrying the authenticated user id, set by the identity layer in
/// front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

pub async fn admin_auth(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_header = req
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if admin_key_matches(token, &state.admin_api_key) => Ok(next.run(req).await),
        Some(_) => {
            tracing::warn!(uri = %req.uri(), "Rejected admin request with wrong key");
            Err(AppError::Forbidden("invalid admin credentials".to_string()))
        }
        None => Err(AppError::Unauthorized("missing admin credentials".to_string())),
    }
}

fn admin_key_matches(presented: &str, expected: &str) -> bool {
    constant_time_eq::constant_time_eq(presented.as_bytes(), expected.as_bytes())
}

/// The user on whose behalf a request is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActingUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for ActingUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;

        raw.to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .filter(|id| *id > 0)
            .map(ActingUser)
            .ok_or_else(|| AppError::Unauthorized(format!("malformed {} header", USER_ID_HEADER)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn extract(header: Option<&str>) -> Result<ActingUser, AppError> {
        let mut builder = HttpRequest::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(USER_ID_HEADER, value);
        }
        let (mut parts, _) = builder.body(()).unwrap().into_parts();
        ActingUser::from_request_parts(&mut parts, &()).await
    }

    #[test]
    fn test_admin_key_comparison() {
        assert!(admin_key_matches("test-admin-key-0123456789", "test-admin-key-0123456789"));
        assert!(!admin_key_matches("test-admin-key-0123456780", "test-admin-key-0123456789"));
        assert!(!admin_key_matches("test-admin-key", "test-admin-key-0123456789"));
        assert!(!admin_key_matches("", "test-admin-key-0123456789"));
    }

    #[tokio::test]
    async fn test_acting_user_from_header() {
        assert_eq!(extract(Some("42")).await.unwrap(), ActingUser(42));
        assert_eq!(extract(Some(" 7 ")).await.unwrap(), ActingUser(7));
    }

    #[tokio::test]
    async fn test_acting_user_rejects_missing_or_bad_header() {
        assert!(matches!(extract(None).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(extract(Some("abc")).await, Err(AppError::Unauthorized(_))));
        assert!(matches!(extract(Some("-3")).await, Err(AppError::Unauthorized(_))));
    }
}
