//! Authenticated principal derived from a verified bearer token.

use serde::Serialize;
use std::collections::BTreeSet;
use utoipa::ToSchema;

/// Identity of the caller for the lifetime of one request. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub user_id: String,
    pub username: Option<String>,
    pub email: Option<String>,
    /// Realm roles and every per-client role, flattened.
    #[schema(value_type = Vec<String>)]
    pub roles: BTreeSet<String>,
}

impl Principal {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True when at least one of `required` is held.
    pub fn has_any_role<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().any(|role| self.has_role(role.as_ref()))
    }
}
