//! Authentication extractors
//!
//! `CurrentUser` resolves `Authorization: Bearer <jwt>` to an active user;
//! `AdminUser` additionally requires `is_admin`. Handlers opt in simply by
//! taking one as an argument.
//!
//! Members read only what they uploaded or created; admins read everything.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header, request::Parts, HeaderMap},
};
use tagd_common::auth::decode_token;
use tagd_common::db::UserRecord;
use tracing::debug;

use crate::db::users;
use crate::error::ApiError;
use crate::AppState;

/// Authenticated, active user
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

/// Authenticated, active administrator
#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

/// Token from an `Authorization: Bearer` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

/// Owner filter for listings: `None` (everyone's) for admins
pub fn owner_filter(user: &UserRecord) -> Option<i64> {
    (!user.is_admin).then_some(user.id)
}

/// Whether `user` may read content owned by `owner_id`
pub fn can_read(user: &UserRecord, owner_id: i64) -> bool {
    user.is_admin || user.id == owner_id
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let state = AppState::from_ref(state);

        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

        let claims = decode_token(&state.jwt_secret, token).map_err(|e| {
            debug!("Rejected access token: {}", e);
            ApiError::Unauthorized("Could not validate credentials".to_string())
        })?;

        let user = users::find_by_username(&state.db, &claims.sub)
            .await?
            .ok_or_else(|| ApiError::Unauthorized("Could not validate credentials".to_string()))?;

        if !user.is_active {
            return Err(ApiError::Forbidden("Inactive user".to_string()));
        }

        Ok(CurrentUser(user))
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;

        if !user.is_admin {
            return Err(ApiError::Forbidden("Not enough permissions".to_string()));
        }

        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("bearer abc")), Some("abc"));
        assert_eq!(bearer_token(&headers("Basic dXNlcg==")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }

    fn user(id: i64, is_admin: bool) -> UserRecord {
        UserRecord {
            id,
            username: format!("user{}", id),
            email: None,
            hashed_password: String::new(),
            full_name: None,
            is_active: true,
            is_admin,
            reset_token: None,
            reset_token_expires: None,
            created_at: tagd_common::time::now(),
        }
    }

    #[test]
    fn test_read_scope() {
        let member = user(2, false);
        assert_eq!(owner_filter(&member), Some(2));
        assert!(can_read(&member, 2));
        assert!(!can_read(&member, 3));

        let admin = user(1, true);
        assert_eq!(owner_filter(&admin), None);
        assert!(can_read(&admin, 3));
    }
}
