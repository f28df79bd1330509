use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

pub async fn live() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

/// Readiness: the store must answer a trivial query; the provider reports
/// its backend so operators can see which mode the deployment runs in.
pub async fn deps(State(state): State<ApiState>) -> impl IntoResponse {
    let store_ok = state.db.query("RETURN 1;").await.is_ok();

    let body = json!({
        "status": if store_ok { "ok" } else { "degraded" },
        "dependencies": {
            "store": if store_ok { "ok" } else { "unreachable" },
            "ai_provider": state.provider.backend_label(),
        }
    });

    let status = if store_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(body))
}
