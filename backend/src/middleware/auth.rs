//! Authentication middleware
//!
//! JWT authentication and the per-request caller context

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{RequestContext, UserRole};
use crate::services::{store, AuthService};
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: UserRole,
    pub branch_id: Uuid,
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>() else {
        return AppError::Unauthorized("Missing or invalid Authorization header".to_string())
            .into_response();
    };

    let claims = match AuthService::decode_claims(bearer.token(), &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(err) => return err.into_response(),
    };

    let (Ok(user_id), Ok(branch_id)) = (
        Uuid::parse_str(&claims.sub),
        Uuid::parse_str(&claims.branch_id),
    ) else {
        return AppError::InvalidToken.into_response();
    };

    request.extensions_mut().insert(AuthUser {
        user_id,
        username: claims.username,
        role: claims.role,
        branch_id,
    });

    next.run(request).await
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("Authentication required".to_string()))
    }
}

/// Extractor for the caller's [`RequestContext`].
///
/// Reloads the user so a deactivated account or a changed home branch takes effect on the
/// next request, not when the token expires. The scope is resolved against the current
/// branch hierarchy.
#[derive(Clone, Debug)]
pub struct Ctx(pub RequestContext);

#[axum::async_trait]
impl FromRequestParts<AppState> for Ctx {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(auth) = CurrentUser::from_request_parts(parts, state).await?;

        let mut conn = state.db.acquire().await?;
        let user = store::load_user(&mut conn, auth.user_id).await?;
        if !user.is_active {
            return Err(AppError::Unauthorized("Account is disabled".to_string()));
        }
        let tree = store::load_tree(&mut conn).await?;

        Ok(Ctx(RequestContext::for_user(&user, &tree)?))
    }
}
