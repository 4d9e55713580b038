use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::{usecase::error::UsecaseError, usecase::jwt::TokenType, AppState};

#[derive(Clone, Debug)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub email: String,
    pub role: String,
}

impl AuthenticatedUser {
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

pub(crate) fn require_admin(user: &AuthenticatedUser) -> Result<(), UsecaseError> {
    if !user.is_admin() {
        tracing::warn!(user_id = user.user_id, role = %user.role, "non-admin access attempt to admin endpoint");
        return Err(UsecaseError::Forbidden("Admin access required".to_string()));
    }
    Ok(())
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, UsecaseError> {
    let token = request
        .headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or_else(|| {
            tracing::warn!("missing or invalid authorization header");
            UsecaseError::Unauthorized("Missing or invalid Authorization header".to_string())
        })?;

    let claims = state.jwt_service.validate_token(token).map_err(|e| {
        tracing::warn!(?e, "invalid token");
        UsecaseError::Unauthorized(format!("Invalid token: {}", e))
    })?;

    // Refresh tokens only buy new access tokens at the auth service
    if claims.token_type != TokenType::Access {
        tracing::warn!("attempted to use non-access token for authentication");
        return Err(UsecaseError::Unauthorized("Invalid token type".to_string()));
    }

    let user_id = claims.sub.parse::<i64>().map_err(|e| {
        tracing::warn!(?e, sub = %claims.sub, "failed to parse user_id from token");
        UsecaseError::Unauthorized("Invalid user ID in token".to_string())
    })?;

    let authenticated_user = AuthenticatedUser {
        user_id,
        email: claims.email,
        role: claims.role,
    };

    tracing::debug!(
        user_id = authenticated_user.user_id,
        email = %authenticated_user.email,
        role = %authenticated_user.role,
        "user authenticated successfully"
    );
    request.extensions_mut().insert(authenticated_user);

    Ok(next.run(request).await)
}
