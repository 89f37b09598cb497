//! Authentication middleware
//!
//! JWT authentication and role-based access control

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::{Permission, Role};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::services::auth::AuthService;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.can(permission)
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    // Extract Authorization header
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let auth_user = match AuthService::authenticate_token(token, &state.config.jwt.secret) {
        Ok(user) => user,
        Err(_) => return unauthorized_response("Invalid or expired token"),
    };

    request.extensions_mut().insert(CurrentUser(auth_user));

    next.run(request).await
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Authenticated user, inserted into request extensions by [`auth_middleware`]
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

/// Permission guard for use in handlers
pub fn require_permission(user: &AuthUser, permission: Permission) -> AppResult<()> {
    if user.has_permission(permission) {
        Ok(())
    } else {
        tracing::debug!(
            user_id = %user.user_id,
            role = %user.role,
            ?permission,
            "permission denied"
        );
        Err(AppError::InsufficientPermissions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: Role) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            username: "tester".to_string(),
            role,
        }
    }

    #[test]
    fn test_require_permission() {
        assert!(require_permission(&user(Role::Cashier), Permission::TakePayment).is_ok());
        assert!(matches!(
            require_permission(&user(Role::Kitchen), Permission::TakePayment),
            Err(AppError::InsufficientPermissions)
        ));
    }
}
