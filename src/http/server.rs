//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the movie routes and their permission gates,
//!   plus the open account routes
//! - Wrap the route table in the global pipeline
//! - Wire up outer layers (request ID, tracing, metrics)
//! - Bind server to listener and drain on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Request,
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::data::{MovieStore, Permission, PermissionStore, UserStore};
use crate::mailer::Mailer;
use crate::http::{accounts, handlers};
use crate::http::pipeline::Pipeline;
use crate::http::request::{MakeRequestUuid, RequestIdExt, X_REQUEST_ID};
use crate::observability::metrics;
use crate::security::{require_permission, AuthState, PermissionGate, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub movies: Arc<MovieStore>,
    pub users: Arc<dyn UserStore>,
    pub permissions: Arc<dyn PermissionStore>,
    pub mailer: Arc<dyn Mailer>,
    pub environment: String,
}

impl AppState {
    /// A gate requiring `required`, backed by this state's permission store.
    pub fn gate(&self, required: Permission) -> PermissionGate {
        PermissionGate::new(self.permissions.clone(), required)
    }
}

/// HTTP server for the movies API.
pub struct HttpServer {
    router: Router,
    config: ApiConfig,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ApiConfig, state: AppState) -> Self {
        Self::with_routes(config, state, Router::new())
    }

    /// Like [`HttpServer::new`], with extra routes merged into the table.
    /// They run inside the same pipeline as the movie routes.
    pub fn with_routes(config: ApiConfig, state: AppState, extra: Router<AppState>) -> Self {
        let limiter = Arc::new(RateLimiter::new(&config.rate_limit));
        let router = Self::build_router(&config, state, limiter.clone(), extra);
        Self {
            router,
            config,
            limiter,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &ApiConfig,
        state: AppState,
        limiter: Arc<RateLimiter>,
        extra: Router<AppState>,
    ) -> Router {
        let read = state.gate(Permission::MoviesRead);
        let write = state.gate(Permission::MoviesWrite);
        let auth = AuthState::new(state.users.clone());

        let routes = Router::new()
            .route("/v1/healthcheck", get(handlers::healthcheck))
            .route(
                "/v1/movies",
                get(handlers::list_movies)
                    .route_layer(middleware::from_fn_with_state(read.clone(), require_permission))
                    .merge(
                        post(handlers::create_movie).route_layer(
                            middleware::from_fn_with_state(write.clone(), require_permission),
                        ),
                    ),
            )
            .route(
                "/v1/movies/{id}",
                get(handlers::show_movie)
                    .route_layer(middleware::from_fn_with_state(read, require_permission))
                    .merge(
                        patch(handlers::update_movie)
                            .delete(handlers::delete_movie)
                            .route_layer(middleware::from_fn_with_state(write, require_permission)),
                    ),
            )
            .route("/v1/users", post(accounts::register_user))
            .route("/v1/users/activated", put(accounts::activate_user))
            .route("/v1/tokens/authentication", post(accounts::create_authentication_token))
            .merge(extra)
            .method_not_allowed_fallback(handlers::method_not_allowed)
            .fallback(handlers::not_found)
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Pipeline::standard(limiter, auth)
            .wrap(routes)
            .layer(middleware::from_fn(metrics::track_requests))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request.request_id(),
                )
            }))
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
    }

    /// The fully layered router, for driving requests without a listener.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn limiter(&self) -> Arc<RateLimiter> {
        self.limiter.clone()
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            environment = %self.config.environment,
            "HTTP server starting"
        );

        if self.limiter.is_enabled() {
            self.limiter.clone().spawn_sweeper(shutdown.resubscribe());
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
