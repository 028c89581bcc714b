use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{DecodingKey, Validation, decode};
use uuid::Uuid;

use crate::{dto::auth::Claims, error::AppError};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: String,
}

/// Who may touch a resource owned by some user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    Owner,
    Admin,
    OwnerOrAdmin,
}

/// Ownership/role predicate run before any resource mutation. A failed
/// check is `Forbidden`, distinct from `NotFound`; resource existence is
/// not hidden from authenticated users.
pub fn authorize(user: &AuthUser, owner_id: Uuid, rule: AccessRule) -> Result<(), AppError> {
    let is_owner = user.user_id == owner_id;
    let is_admin = user.role == ROLE_ADMIN;
    let allowed = match rule {
        AccessRule::Owner => is_owner,
        AccessRule::Admin => is_admin,
        AccessRule::OwnerOrAdmin => is_owner || is_admin,
    };
    if allowed { Ok(()) } else { Err(AppError::Forbidden) }
}

pub fn ensure_admin(user: &AuthUser) -> Result<(), AppError> {
    if user.role != ROLE_ADMIN {
        return Err(AppError::Forbidden);
    }
    Ok(())
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;
    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let auth_str = auth_header
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".into()))?;

        if !auth_str.starts_with("Bearer ") {
            return Err(AppError::Unauthorized("Invalid Authorization scheme".into()));
        }
        let token = auth_str.trim_start_matches("Bearer ").trim();

        let secret = std::env::var("JWT_SECRET")
            .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(secret.as_bytes()),
            &Validation::default(),
        )
        .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))?;

        let user_id = Uuid::parse_str(&decoded.claims.sub)
            .map_err(|_| AppError::Unauthorized("Invalid user id in token".into()))?;

        Ok(AuthUser {
            user_id,
            role: decoded.claims.role.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: &str) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role: role.into(),
        }
    }

    #[test]
    fn owner_rule_admits_only_the_owner() {
        let u = user(ROLE_USER);
        assert!(authorize(&u, u.user_id, AccessRule::Owner).is_ok());
        assert!(matches!(
            authorize(&u, Uuid::new_v4(), AccessRule::Owner),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn admin_rule_ignores_ownership() {
        let admin = user(ROLE_ADMIN);
        assert!(authorize(&admin, Uuid::new_v4(), AccessRule::Admin).is_ok());

        let owner = user(ROLE_USER);
        assert!(matches!(
            authorize(&owner, owner.user_id, AccessRule::Admin),
            Err(AppError::Forbidden)
        ));
    }

    #[test]
    fn owner_or_admin_admits_either() {
        let owner = user(ROLE_USER);
        let admin = user(ROLE_ADMIN);
        let stranger = user(ROLE_USER);
        let resource = owner.user_id;

        assert!(authorize(&owner, resource, AccessRule::OwnerOrAdmin).is_ok());
        assert!(authorize(&admin, resource, AccessRule::OwnerOrAdmin).is_ok());
        assert!(matches!(
            authorize(&stranger, resource, AccessRule::OwnerOrAdmin),
            Err(AppError::Forbidden)
        ));
    }
}
