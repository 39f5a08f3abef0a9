//! Startup orchestration.
//!
//! Turns a validated [`ApiConfig`] into the shared application state,
//! provisioning the configured accounts into the user and permission
//! stores before the listener is bound.

use std::sync::Arc;
use std::time::Duration;

use crate::config::ApiConfig;
use crate::data::{
    MemoryPermissionStore, MemoryUserStore, MovieStore, PermissionStore, StoreError, User,
};
use crate::http::AppState;
use crate::mailer::LogMailer;

pub fn build_state(config: &ApiConfig) -> Result<AppState, StoreError> {
    let users = MemoryUserStore::new();
    let permissions = MemoryPermissionStore::new();

    for account in &config.accounts {
        let user = User {
            id: account.user_id,
            activated: account.activated,
        };
        users.provision(&account.token, user, Duration::from_secs(account.token_ttl_secs));

        let codes: Vec<&str> = account.permissions.iter().map(String::as_str).collect();
        permissions.grant_permissions(account.user_id, &codes)?;

        tracing::debug!(
            user_id = account.user_id,
            activated = account.activated,
            permissions = ?account.permissions,
            "Provisioned account"
        );
    }

    tracing::info!(accounts = config.accounts.len(), "Stores initialized");

    Ok(AppState {
        movies: Arc::new(MovieStore::new()),
        users: Arc::new(users),
        permissions: Arc::new(permissions),
        mailer: Arc::new(LogMailer),
        environment: config.environment.clone(),
    })
}
