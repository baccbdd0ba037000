use crate::{
    auth::SessionKeys,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
};
use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    infra::db::postgres::postgres_connection::PgPoolSquad,
    panel::client::{PanelClient, PanelConfig},
    payments::stripe_client::{STRIPE_API_BASE, StripeClient, StripeConfig},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};

pub fn stripe_client(config: &DotEnvyConfig) -> StripeClient {
    StripeClient::new(StripeConfig {
        api_base: STRIPE_API_BASE.to_string(),
        secret_key: config.stripe.secret_key.clone(),
        webhook_secret: config.stripe.webhook_secret.clone(),
        webhook_tolerance_secs: config.stripe.webhook_tolerance_secs,
        success_url: config.stripe.success_url.clone(),
        cancel_url: config.stripe.cancel_url.clone(),
        portal_return_url: config.stripe.portal_return_url.clone(),
    })
}

pub fn panel_client(config: &DotEnvyConfig) -> PanelClient {
    PanelClient::new(PanelConfig {
        base_url: config.panel.url.clone(),
        application_key: config.panel.application_key.clone(),
        client_key: config.panel.client_key.clone(),
    })
}

pub fn app(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<Router> {
    let stripe_client = Arc::new(stripe_client(&config));
    let panel_client = Arc::new(panel_client(&config));
    let session_keys = Arc::new(SessionKeys::from_secret(&config.session.jwt_secret));

    let api = Router::new()
        .nest(
            "/webhooks",
            routers::webhooks::routes(
                Arc::clone(&db_pool),
                Arc::clone(&config),
                Arc::clone(&stripe_client),
                Arc::clone(&panel_client),
            ),
        )
        .nest(
            "/accounts",
            routers::accounts::routes(Arc::clone(&db_pool), Arc::clone(&panel_client)),
        )
        .merge(routers::catalog::routes(Arc::clone(&db_pool)))
        .merge(routers::checkout::routes(
            Arc::clone(&db_pool),
            Arc::clone(&stripe_client),
        ))
        .nest(
            "/subscriptions",
            routers::subscriptions::routes(Arc::clone(&db_pool), Arc::clone(&panel_client)),
        )
        .nest(
            "/servers",
            routers::servers::routes(Arc::clone(&db_pool), Arc::clone(&config), panel_client),
        )
        .route("/health-check", get(default_routers::health_check));

    Ok(Router::new()
        .nest("/api/v1", api)
        .fallback(default_routers::not_found)
        .layer(Extension(session_keys))
        .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout)))
        .layer(RequestBodyLimitLayer::new(
            (config.server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http()))
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let app = app(Arc::clone(&config), db_pool)?;

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(stage = %config.stage, "Server is running on port {}", config.server.port);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
