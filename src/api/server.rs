use anyhow::Context;
use axum::{
    Router, middleware,
    routing::{get, patch, post},
};
use std::{sync::Arc, time::Duration};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::visitors::{self, Visitors};
use crate::api::{auth, embed, menu, pages, ws};
use crate::backend::Backend;
use crate::config::Settings;
use crate::menu::Menu;
use crate::session::DemoIdentity;

pub struct AppState {
    pub backend: Backend,
    pub menu: Menu,
    pub settings: Settings,
    pub visitors: Arc<Visitors>,
}

impl AppState {
    pub fn new(backend: Backend, settings: Settings) -> Arc<Self> {
        let demo = DemoIdentity::from_config(&settings.demo);
        Arc::new(Self {
            menu: Menu::new(backend.clone()),
            visitors: Arc::new(Visitors::new(backend.clone(), demo)),
            backend,
            settings,
        })
    }
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/menu", get(menu::list).post(menu::create))
        .route("/api/menu/{id}", patch(menu::update).delete(menu::delete))
        .route("/api/auth/signup", post(auth::sign_up))
        .route("/api/auth/token", post(auth::token))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/session", get(auth::session))
        .route("/api/realtime", get(ws::realtime_handler));

    let browser = Router::new()
        .route("/", get(pages::index))
        .route("/auth/sign-in", post(pages::sign_in))
        .route("/auth/sign-up", post(pages::sign_up))
        .route("/auth/sign-out", post(pages::sign_out))
        .route("/dashboard/items", post(pages::create_item))
        .route("/dashboard/items/{id}", post(pages::update_item))
        .route("/dashboard/items/{id}/delete", post(pages::delete_item))
        .route("/embed/menu", get(embed::menu))
        .route("/embed/auth", get(embed::auth))
        .route("/embed/dashboard", get(embed::dashboard))
        .route("/embed/styles.css", get(embed::styles))
        .route("/embed/forms", post(embed::submit))
        .layer(middleware::from_fn_with_state(state.clone(), visitors::track));

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/live/menu", get(ws::live_menu_handler))
        .merge(api)
        .merge(browser)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(settings: Settings) -> anyhow::Result<()> {
    info!("Connecting backend...");
    let backend = Backend::connect(&settings.project, &settings.auth)
        .await
        .context("Failed to connect backend")?;

    let state = AppState::new(backend, settings);
    let sweeper = visitors::spawn_sweeper(
        state.visitors.clone(),
        Duration::from_secs(state.settings.visitors.idle_ttl_seconds),
        Duration::from_secs(state.settings.visitors.sweep_interval_seconds.max(1)),
    );

    let address = format!("{}:{}", state.settings.server.host, state.settings.server.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to {address}"))?;
    info!("Server running on http://{address}");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server failed")?;

    sweeper.abort();
    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
