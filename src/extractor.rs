use axum::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

/// Identity established by the authentication middleware in front of this
/// service. The middleware strips any client-supplied `X-User-Id` and
/// installs the verified one; authentication itself is out of scope here.
pub struct AuthUser {
    pub user_id: i32,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse::<i32>().ok())
            .ok_or((StatusCode::UNAUTHORIZED, "Missing user identity".into()))?;
        Ok(AuthUser { user_id })
    }
}
