use axum::{routing, Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

mod auth;
pub(crate) mod common;
mod content;
mod notice;
mod subject;

#[derive(OpenApi)]
#[openapi(components(schemas(crate::mongo_entities::ObjectIdDef)))]
struct ApiDoc;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "OK",
        "timestamp": chrono::Utc::now(),
    }))
}

pub(crate) fn new(upload_dir: &str) -> Router<AppState> {
    Router::new()
        .nest("/api/auth", auth::new())
        .nest("/api/subjects", subject::new())
        .nest("/api/content", content::new())
        .nest("/api/notices", notice::new())
        .route("/api/health", routing::get(health))
        .nest(
            "/uploads",
            axum_static::static_router(upload_dir).with_state(()),
        )
}
