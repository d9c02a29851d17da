pub mod auth;
pub mod roles;

pub use auth::{auth_middleware, authenticate_bearer, AuthUser};
pub use roles::{authorize_roles, require_roles, RequiredRoles};
