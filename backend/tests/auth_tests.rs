//! Authentication and authorization tests
//!
//! Property-based and unit tests for:
//! - Role permission matrix
//! - Access token validation
//! - Refresh token hashing

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use proptest::prelude::*;
use restaurant_backend::error::AppError;
use restaurant_backend::middleware::{require_permission, AuthUser};
use restaurant_backend::services::auth::{AuthService, Claims};
use restaurant_backend::services::user::ensure_admin_remains;
use shared::{Permission, Role};
use uuid::Uuid;

const SECRET: &str = "test-secret";

fn token_for(role: Role, secret: &str, exp_offset: i64) -> (Uuid, String) {
    let user_id = Uuid::new_v4();
    let now = Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        username: format!("{}-user", role),
        role,
        exp: now + exp_offset,
        iat: now,
    };
    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap();
    (user_id, token)
}

// ============================================================================
// Property Test Strategies
// ============================================================================

fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![Just(Role::Admin), Just(Role::Cashier), Just(Role::Kitchen)]
}

fn permission_strategy() -> impl Strategy<Value = Permission> {
    proptest::sample::select(Permission::ALL.to_vec())
}

// ============================================================================
// Property Tests
// ============================================================================

proptest! {
    /// The guard agrees with the role matrix for every role and permission
    #[test]
    fn prop_require_permission_matches_role(role in role_strategy(), permission in permission_strategy()) {
        let user = AuthUser {
            user_id: Uuid::new_v4(),
            username: "staff".to_string(),
            role,
        };

        let result = require_permission(&user, permission);
        prop_assert_eq!(result.is_ok(), role.can(permission));
        if let Err(e) = result {
            prop_assert!(matches!(e, AppError::InsufficientPermissions));
        }
    }

    /// Admin holds every permission
    #[test]
    fn prop_admin_is_superuser(permission in permission_strategy()) {
        prop_assert!(Role::Admin.can(permission));
    }

    /// Tokens signed with the configured secret authenticate as their subject
    #[test]
    fn prop_token_identifies_subject(role in role_strategy()) {
        let (user_id, token) = token_for(role, SECRET, 600);
        let user = AuthService::authenticate_token(&token, SECRET).unwrap();
        prop_assert_eq!(user.user_id, user_id);
        prop_assert_eq!(user.role, role);
    }

    /// Refresh token hashes are fixed-length and never echo the token
    #[test]
    fn prop_refresh_token_hash(token in "[a-f0-9]{64}") {
        let hashed = AuthService::hash_token(&token);
        prop_assert_eq!(hashed.len(), 43);
        prop_assert_ne!(&hashed, &token);
        prop_assert_eq!(hashed, AuthService::hash_token(&token));
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_front_end_roles() {
        // POS
        assert!(Role::Cashier.can(Permission::CreateOrder));
        assert!(Role::Cashier.can(Permission::TakePayment));
        assert!(Role::Cashier.can(Permission::ManageDay));
        assert!(!Role::Cashier.can(Permission::RefundPayment));
        assert!(!Role::Cashier.can(Permission::ManageMenu));

        // KDS
        assert!(Role::Kitchen.can(Permission::ViewOrders));
        assert!(Role::Kitchen.can(Permission::ToggleAvailability));
        assert!(!Role::Kitchen.can(Permission::EditOrder));
        assert!(!Role::Kitchen.can(Permission::ViewReports));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let (_, token) = token_for(Role::Admin, "another-secret", 600);
        assert!(matches!(
            AuthService::authenticate_token(&token, SECRET),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let (_, token) = token_for(Role::Cashier, SECRET, -3600);
        assert!(matches!(
            AuthService::authenticate_token(&token, SECRET),
            Err(AppError::InvalidToken)
        ));
    }

    #[test]
    fn test_malformed_token_is_rejected() {
        assert!(AuthService::authenticate_token("not.a.jwt", SECRET).is_err());
        assert!(AuthService::authenticate_token("", SECRET).is_err());
    }

    #[test]
    fn test_password_hash_verifies() {
        let hashed = AuthService::hash_password("correct horse battery").unwrap();
        assert_ne!(hashed, "correct horse battery");
        assert!(bcrypt::verify("correct horse battery", &hashed).unwrap());
        assert!(!bcrypt::verify("wrong password", &hashed).unwrap());
    }
}

// ============================================================================
// Last Admin Guard
// ============================================================================

#[cfg(test)]
mod admin_guard_tests {
    use super::*;
    use restaurant_backend::services::user::ensure_admin_remains;

    #[test]
    fn test_last_active_admin_cannot_be_removed() {
        let only = Uuid::new_v4();
        assert!(matches!(
            ensure_admin_remains(&[only], only),
            Err(AppError::BusinessRule(_))
        ));
    }

    #[test]
    fn test_admin_with_a_peer_can_be_removed() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(ensure_admin_remains(&[a, b], a).is_ok());
    }

    #[test]
    fn test_non_admin_removal_is_unrestricted() {
        let admin = Uuid::new_v4();
        assert!(ensure_admin_remains(&[admin], Uuid::new_v4()).is_ok());
        assert!(ensure_admin_remains(&[], Uuid::new_v4()).is_ok());
    }

    #[test]
    fn test_second_of_two_concurrent_removals_is_refused() {
        // Two admins remove each other: the first commits, then the second
        // re-reads the locked set and finds only itself left.
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        assert!(ensure_admin_remains(&[a, b], b).is_ok());
        assert!(ensure_admin_remains(&[a], a).is_err());
    }
}

proptest! {
    /// Whatever the admin set, a removal never leaves it empty
    #[test]
    fn prop_guard_keeps_one_admin(count in 0usize..5, pick in 0usize..6) {
        let admins: Vec<Uuid> = (0..count).map(|_| Uuid::new_v4()).collect();
        let target = admins.get(pick).copied().unwrap_or_else(Uuid::new_v4);

        let allowed = ensure_admin_remains(&admins, target).is_ok();
        let remaining = admins.iter().filter(|id| **id != target).count();
        prop_assert_eq!(allowed, remaining > 0 || !admins.contains(&target));
    }
}
