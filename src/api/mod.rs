use crate::{
    api::{
        handlers::root,
        rate_limit::{enforce, SharedRateLimiter},
    },
    auth::AuthFlow,
    billing::Payments,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    middleware,
    routing::get,
    Extension, Router,
};
use sqlx::SqlitePool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa_swagger_ui::SwaggerUi;

pub mod handlers;
// OpenAPI router wiring and route registration live in openapi.rs.
mod openapi;
pub mod rate_limit;

pub use openapi::{openapi, DEFAULT_API_VERSION};

/// Everything the router needs, built once at start.
#[derive(Clone)]
pub struct Components {
    pub pool: SqlitePool,
    pub flow: Arc<AuthFlow>,
    pub payments: Arc<Payments>,
    pub rate_limiter: SharedRateLimiter,
    pub api_version: String,
    pub frontend_origin: Option<String>,
}

/// Build the application router with all middleware applied.
///
/// # Errors
/// Returns an error if the frontend origin is not a valid URL.
pub fn app(components: Components) -> Result<Router> {
    let cors = cors_layer(components.frontend_origin.as_deref())?;

    // Documented routes come from openapi.rs; `/` and the docs UI are added here.
    let (router, openapi) = openapi::api_router(&components.api_version).split_for_parts();
    let app = router
        .merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", openapi))
        .route("/", get(root::root))
        .layer(middleware::from_fn_with_state(
            components.rate_limiter.clone(),
            enforce,
        ))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(components.flow))
                .layer(Extension(components.payments))
                .layer(Extension(components.pool)),
        );

    Ok(app)
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, components: Components) -> Result<()> {
    let app = app(components)?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    // Peer addresses feed the rate limiter when no proxy header is present.
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {err}");
        }
        info!("Gracefully shutdown");
    })
    .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

fn cors_layer(frontend: Option<&str>) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE]);

    // Cookies only travel to a known origin.
    Ok(match frontend {
        Some(frontend) => cors
            .allow_origin(AllowOrigin::exact(frontend_origin(frontend)?))
            .allow_credentials(true),
        None => cors.allow_origin(Any),
    })
}

fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let host = parsed.host_str().ok_or_else(|| {
        anyhow!("Frontend base URL must include a valid host: {frontend_base_url}")
    })?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
