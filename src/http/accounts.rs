//! Route handlers for user registration, activation and sign-in.

use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Response,
};
use serde::Deserialize;

use crate::data::tokens::validate_token_plaintext;
use crate::data::users::{validate_email, validate_password_plaintext, validate_registration};
use crate::data::{NewAccount, Permission, Scope, StoreError, Token};
use crate::http::json::{write_json, Envelope, StrictJson};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::{hash_password, verify_password};
use crate::validator::Validator;

pub const ACTIVATION_TTL: Duration = Duration::from_secs(3 * 24 * 60 * 60);
pub const AUTHENTICATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Permissions every new account starts with.
const DEFAULT_PERMISSIONS: &[Permission] = &[Permission::MoviesRead];

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActivateInput {
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsInput {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

fn failed(key: &str, message: &str) -> ApiError {
    let mut v = Validator::new();
    v.add_error(key, message);
    ApiError::FailedValidation(v.into_errors())
}

pub async fn register_user(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<RegisterInput>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_registration(&mut v, &input.name, &input.email, &input.password);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let password_hash = hash_password(&input.password).map_err(ApiError::internal)?;
    let account = state
        .users
        .insert_account(NewAccount {
            name: input.name,
            email: input.email,
            password_hash,
        })
        .map_err(|err| match err {
            StoreError::DuplicateEmail => failed("email", "a user with this email address already exists"),
            other => other.into(),
        })?;

    let codes: Vec<&str> = DEFAULT_PERMISSIONS.iter().map(|p| p.code()).collect();
    state.permissions.grant_permissions(account.id, &codes)?;

    let token = Token::generate(account.id, ACTIVATION_TTL, Scope::Activation);
    state.users.insert_token(&token)?;

    // Delivery failure is logged; the account already exists.
    if let Err(err) = state.mailer.send_activation(&account, &token) {
        tracing::error!(user_id = account.id, error = %err, "Failed to send activation token");
    }

    tracing::info!(user_id = account.id, "User registered");

    let envelope = Envelope::new().with_serialized("user", &account)?;
    Ok(write_json(StatusCode::ACCEPTED, &envelope, HeaderMap::new())?)
}

pub async fn activate_user(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<ActivateInput>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_token_plaintext(&mut v, &input.token);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let mut account = state
        .users
        .account_for_token(Scope::Activation, &input.token)?
        .ok_or_else(|| failed("token", "invalid or expired activation token"))?;

    account.activated = true;
    let account = state.users.update_account(account)?;
    state.users.delete_tokens_for_user(Scope::Activation, account.id)?;

    tracing::info!(user_id = account.id, "User activated");

    let envelope = Envelope::new().with_serialized("user", &account)?;
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}

pub async fn create_authentication_token(
    State(state): State<AppState>,
    StrictJson(input): StrictJson<CredentialsInput>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_email(&mut v, &input.email);
    validate_password_plaintext(&mut v, &input.password);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let account = state
        .users
        .account_by_email(&input.email)?
        .ok_or(ApiError::InvalidCredentials)?;

    if !verify_password(&input.password, &account.password_hash).map_err(ApiError::internal)? {
        return Err(ApiError::InvalidCredentials);
    }

    let token = Token::generate(account.id, AUTHENTICATION_TTL, Scope::Authentication);
    state.users.insert_token(&token)?;

    let envelope = Envelope::new().with_serialized("authentication_token", &token)?;
    Ok(write_json(StatusCode::CREATED, &envelope, HeaderMap::new())?)
}
