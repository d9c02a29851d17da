use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;
use std::sync::Arc;

use crate::models::Principal;
use crate::services::ServiceError;

/// Roles a route requires; `None` places no restriction.
#[derive(Debug, Clone, Default)]
pub struct RequiredRoles(Option<Arc<[String]>>);

impl RequiredRoles {
    pub fn any_of(roles: &[String]) -> Self {
        Self(Some(roles.into()))
    }

    pub fn unrestricted() -> Self {
        Self(None)
    }

    pub fn roles(&self) -> Option<&[String]> {
        self.0.as_deref()
    }
}

/// Passes when nothing is required or the principal holds any required role.
pub fn authorize_roles(
    required: Option<&[String]>,
    principal: &Principal,
) -> Result<(), ServiceError> {
    match required {
        None => Ok(()),
        Some(roles) if principal.has_any_role(roles) => Ok(()),
        Some(roles) => {
            tracing::warn!(
                user_id = %principal.user_id,
                required_roles = ?roles,
                granted_roles = ?principal.roles,
                "Insufficient roles"
            );
            Err(ServiceError::InsufficientPermission)
        }
    }
}

/// Must run after `auth_middleware`.
pub async fn require_roles(
    State(required): State<RequiredRoles>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or(ServiceError::MissingToken)?;

    authorize_roles(required.roles(), principal)?;

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn principal(roles: &[&str]) -> Principal {
        Principal {
            user_id: "u1".to_string(),
            username: None,
            email: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn required(roles: &[&str]) -> Vec<String> {
        roles.iter().map(|r| r.to_string()).collect()
    }

    #[test]
    fn absent_requirement_passes_everyone() {
        assert!(authorize_roles(None, &principal(&[])).is_ok());
        assert!(RequiredRoles::unrestricted().roles().is_none());
    }

    #[test]
    fn intersection_passes() {
        let roles = required(&["realm-admin", "manage-users"]);
        assert!(authorize_roles(Some(&roles), &principal(&["manage-users"])).is_ok());
    }

    #[test]
    fn disjoint_roles_are_insufficient() {
        let roles = required(&["realm-admin"]);
        let result = authorize_roles(Some(&roles), &principal(&["offline_access"]));
        assert!(matches!(result, Err(ServiceError::InsufficientPermission)));
    }

    #[test]
    fn empty_requirement_list_admits_nobody() {
        let result = authorize_roles(Some(&[]), &principal(&["realm-admin"]));
        assert!(matches!(result, Err(ServiceError::InsufficientPermission)));
    }
}
