/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use projexy_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, error::ApiError, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, post, put},
    Router,
};
use projexy_shared::{
    auth::middleware::{authenticate, bearer_token},
    email::{EmailMessage, LogMailer, Mailer},
    realtime::{channel_auth::ChannelAuthorizer, LocalHub, Notifier},
};
use sqlx::PgPool;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request via Axum's `State` extractor; every field is a
/// handle.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,

    /// Publishes domain events to every realtime transport
    pub notifier: Notifier,

    /// In-process channels the SSE endpoint subscribes to
    pub hub: LocalHub,

    pub mailer: Arc<dyn Mailer>,
    pub channel_auth: ChannelAuthorizer,

    /// Cancelled when the server starts shutting down; ends open SSE streams
    pub shutdown: CancellationToken,
}

impl AppState {
    /// State with in-process realtime delivery and logged email
    pub fn new(db: PgPool, config: Config) -> Self {
        let hub = LocalHub::default();
        let notifier = Notifier::default().with_publisher(Arc::new(hub.clone()));
        let channel_auth = ChannelAuthorizer::new(
            config.realtime.app_key.clone(),
            config.realtime.app_secret.clone(),
        );

        Self {
            db,
            config: Arc::new(config),
            notifier,
            hub,
            mailer: Arc::new(LogMailer),
            channel_auth,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Replaces the notifier, e.g. to publish through Redis instead of the hub
    pub fn with_notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    pub fn base_url(&self) -> &str {
        &self.config.api.base_url
    }

    /// Sends an email without holding up the response
    ///
    /// Delivery failures are logged; the request that triggered the mail has
    /// already succeeded.
    pub fn send_email_in_background(&self, message: EmailMessage) {
        let mailer = self.mailer.clone();

        tokio::spawn(async move {
            let subject = message.subject.clone();
            if let Err(e) = mailer.send(message).await {
                tracing::error!(subject = %subject, error = %e, "Failed to send email");
            }
        });
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// ```text
/// /health                                   public
/// /v1/auth/{register,login,refresh,verify-email,forgot-password,reset-password}
/// /v1/webhooks/stripe                       signed by the payment processor
/// /v1/users/{me,change-password,update-profile}          bearer token
/// /v1/projects[/:id[/invite|/members/:user_id]]          bearer token
/// /v1/tasks[/:id]                                        bearer token
/// /v1/comments[/:id]                                     bearer token
/// /v1/realtime/{auth,stream}                             bearer token
/// ```
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/refresh", post(routes::auth::refresh))
        .route("/verify-email", post(routes::auth::verify_email))
        .route("/forgot-password", post(routes::auth::forgot_password))
        .route("/reset-password", post(routes::auth::reset_password));

    let webhook_routes = Router::new().route("/stripe", post(routes::webhooks::stripe_webhook));

    let protected_routes = Router::new()
        .route("/users/me", get(routes::users::me))
        .route("/users/change-password", post(routes::users::change_password))
        .route("/users/update-profile", post(routes::users::update_profile))
        .route(
            "/projects",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/projects/:id",
            get(routes::projects::get_project)
                .put(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        )
        .route("/projects/:id/invite", post(routes::members::invite_member))
        .route(
            "/projects/:id/members/:user_id",
            put(routes::members::update_member_role).delete(routes::members::remove_member),
        )
        .route("/tasks", post(routes::tasks::create_task))
        .route(
            "/tasks/:id",
            get(routes::tasks::get_task)
                .put(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/comments", post(routes::comments::create_comment))
        .route("/comments/:id", axum::routing::delete(routes::comments::delete_comment))
        .route("/realtime/auth", post(routes::realtime::authorize_channel))
        .route("/realtime/stream", get(routes::realtime::stream))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/webhooks", webhook_routes)
        .merge(protected_routes);

    let cors = if state.config.cors_is_permissive() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

/// Bearer-token authentication
///
/// Validates the access token, re-reads the user, and injects
/// [`AuthContext`](projexy_shared::auth::middleware::AuthContext) into request
/// extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(req.headers())?.to_string();
    let auth = authenticate(&state.db, state.jwt_secret(), &token).await?;

    req.extensions_mut().insert(auth);

    Ok(next.run(req).await)
}
