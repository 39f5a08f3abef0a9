//! Route handlers for the healthcheck and the movie resource.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode},
    response::Response,
};

use crate::data::movies::{validate_movie, validate_movie_input};
use crate::data::MovieInput;
use crate::http::json::{write_json, Envelope, StrictJson};
use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::Identity;
use crate::validator::Validator;

/// Optional optimistic-concurrency precondition on updates.
pub const X_EXPECTED_VERSION: HeaderName = HeaderName::from_static("x-expected-version");

pub async fn healthcheck(State(state): State<AppState>) -> Result<Response, ApiError> {
    let envelope = Envelope::new().with("status", "available").with(
        "system_info",
        serde_json::json!({
            "environment": state.environment,
            "version": env!("CARGO_PKG_VERSION"),
        }),
    );
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}

pub async fn list_movies(State(state): State<AppState>) -> Result<Response, ApiError> {
    let movies = state.movies.list()?;
    let envelope = Envelope::new().with_serialized("movies", &movies)?;
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}

pub async fn create_movie(
    State(state): State<AppState>,
    identity: Identity,
    StrictJson(input): StrictJson<MovieInput>,
) -> Result<Response, ApiError> {
    let mut v = Validator::new();
    validate_movie_input(&mut v, &input);
    let movie = input.into_movie();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let movie = state.movies.insert(movie)?;
    tracing::info!(
        movie_id = movie.id,
        user_id = ?identity.user().map(|u| u.id),
        "Movie created"
    );

    let mut headers = HeaderMap::new();
    let location = HeaderValue::from_str(&format!("/v1/movies/{}", movie.id)).map_err(ApiError::internal)?;
    headers.insert(header::LOCATION, location);

    let envelope = Envelope::new().with_serialized("movie", &movie)?;
    Ok(write_json(StatusCode::CREATED, &envelope, headers)?)
}

pub async fn show_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let movie = state.movies.get(id)?.ok_or(ApiError::NotFound)?;
    let envelope = Envelope::new().with_serialized("movie", &movie)?;
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}

pub async fn update_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    StrictJson(input): StrictJson<MovieInput>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let mut movie = state.movies.get(id)?.ok_or(ApiError::NotFound)?;

    if let Some(expected) = headers.get(X_EXPECTED_VERSION) {
        if expected.to_str().ok() != Some(movie.version.to_string().as_str()) {
            return Err(ApiError::EditConflict);
        }
    }

    input.apply_to(&mut movie);

    let mut v = Validator::new();
    validate_movie(&mut v, &movie);
    if !v.valid() {
        return Err(ApiError::FailedValidation(v.into_errors()));
    }

    let movie = state.movies.update(movie)?;
    let envelope = Envelope::new().with_serialized("movie", &movie)?;
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}

pub async fn delete_movie(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    if !state.movies.delete(id)? {
        return Err(ApiError::NotFound);
    }
    let envelope = Envelope::new().with("message", "movie successfully deleted");
    Ok(write_json(StatusCode::OK, &envelope, HeaderMap::new())?)
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound
}

pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

/// Ids are positive integers; anything else cannot name a movie.
fn parse_id(raw: &str) -> Result<i64, ApiError> {
    match raw.parse::<i64>() {
        Ok(id) if id >= 1 => Ok(id),
        _ => Err(ApiError::NotFound),
    }
}
