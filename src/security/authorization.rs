//! Per-route permission gate.
//!
//! Applied with `route_layer` so each route names the permission it needs.
//! Checks run in a fixed order: authenticated, then activated, then the
//! permission lookup. Inactive accounts never reach the permission store.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::data::{Permission, PermissionStore};
use crate::http::response::ApiError;
use crate::security::authentication::Identity;

#[derive(Clone)]
pub struct PermissionGate {
    permissions: Arc<dyn PermissionStore>,
    required: Permission,
}

impl PermissionGate {
    pub fn new(permissions: Arc<dyn PermissionStore>, required: Permission) -> Self {
        Self { permissions, required }
    }

    pub fn required(&self) -> Permission {
        self.required
    }

    pub fn check(&self, identity: &Identity) -> Result<(), ApiError> {
        let user = match identity {
            Identity::Anonymous => return Err(ApiError::AuthenticationRequired),
            Identity::Authenticated(user) => user,
        };

        if !user.activated {
            return Err(ApiError::InactiveAccount);
        }

        let granted = self
            .permissions
            .permissions_for_user(user.id)
            .map_err(ApiError::internal)?;

        if !granted.contains(self.required.code()) {
            tracing::warn!(
                user_id = user.id,
                required = %self.required,
                "Permission denied"
            );
            return Err(ApiError::NotPermitted);
        }

        Ok(())
    }
}

pub async fn require_permission(
    State(gate): State<PermissionGate>,
    req: Request,
    next: Next,
) -> Response {
    let Some(identity) = req.extensions().get::<Identity>() else {
        return ApiError::internal("permission gate reached without an identity").into_response();
    };

    match gate.check(identity) {
        Ok(()) => next.run(req).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MemoryPermissionStore, User};

    fn setup() -> (Arc<MemoryPermissionStore>, PermissionGate) {
        let store = Arc::new(MemoryPermissionStore::new());
        store.grant_permissions(1, &["movies:read"]).unwrap();
        let gate = PermissionGate::new(store.clone(), Permission::MoviesRead);
        (store, gate)
    }

    fn user(id: i64, activated: bool) -> Identity {
        Identity::Authenticated(User { id, activated })
    }

    #[test]
    fn anonymous_needs_authentication() {
        let (store, gate) = setup();
        assert!(matches!(gate.check(&Identity::Anonymous), Err(ApiError::AuthenticationRequired)));
        assert_eq!(store.lookup_count(), 0);
    }

    #[test]
    fn inactive_account_is_rejected_before_lookup() {
        let (store, gate) = setup();
        assert!(matches!(gate.check(&user(1, false)), Err(ApiError::InactiveAccount)));
        assert_eq!(store.lookup_count(), 0);
    }

    #[test]
    fn granted_permission_passes_and_missing_one_is_forbidden() {
        let (store, gate) = setup();
        assert!(gate.check(&user(1, true)).is_ok());

        let write_gate = PermissionGate::new(store.clone(), Permission::MoviesWrite);
        assert_eq!(write_gate.required(), Permission::MoviesWrite);
        assert!(matches!(write_gate.check(&user(1, true)), Err(ApiError::NotPermitted)));
        assert_eq!(store.lookup_count(), 2);
    }

    #[test]
    fn lookup_failure_is_internal() {
        let (store, gate) = setup();
        store.set_unavailable(true);
        assert!(matches!(gate.check(&user(1, true)), Err(ApiError::Internal(_))));
    }
}
