use axum::{routing::{get, post}, Router};
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use flashzap_core::{GradingOracle, Repository};
use crate::api::routes::{
    create_card, delete_card, end_session, get_card, get_session, import_cards, list_cards, patch_card,
    start_session, submit_answer, AppState,
};
use crate::api::sessions::SessionRegistry;
use crate::config::Settings;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/cards", get(list_cards).post(create_card))
        .route("/cards/import", post(import_cards))
        .route("/cards/:id", get(get_card).patch(patch_card).delete(delete_card))
        .route("/review/sessions", post(start_session))
        .route("/review/sessions/:id", get(get_session).delete(end_session))
        .route("/review/sessions/:id/answer", post(submit_answer))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn run(
    repo: Arc<dyn Repository>,
    oracle: Arc<dyn GradingOracle>,
    settings: &Settings,
    addr: SocketAddr,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState {
        repo,
        oracle,
        policy: settings.review_policy(),
        sessions: SessionRegistry::new(settings.session_ttl()),
    });

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "api listening");
    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("api stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
