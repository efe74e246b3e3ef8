//! Health check endpoint

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::context::AppContext;

/// `GET /health`
pub async fn health_check(State(ctx): State<Arc<AppContext>>) -> (StatusCode, Json<Value>) {
    let db = Arc::clone(&ctx.db);
    let database_ok = tokio::task::spawn_blocking(move || db.health_check())
        .await
        .map(|result| result.is_ok())
        .unwrap_or(false);
    let worker_running = ctx.sync_worker_running().await;
    let stats = ctx.sync_stats();

    let status = if database_ok && worker_running {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "status": if status == StatusCode::OK { "ok" } else { "degraded" },
        "service": "orderbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "database": database_ok,
        "sync": {
            "running": worker_running,
            "processed": stats.processed(),
            "failed": stats.failed(),
        },
    });
    (status, Json(body))
}
