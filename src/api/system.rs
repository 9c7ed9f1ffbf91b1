use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::api::LOGIN_PATH;
use crate::app::AppState;
use crate::error::AppResult;

pub async fn index() -> Json<Value> {
    Json(json!({
        "name": "CTE registration portal",
        "login": LOGIN_PATH,
    }))
}

pub async fn health(State(state): State<AppState>) -> AppResult<Json<Value>> {
    state.store.health_check().await?;
    Ok(Json(json!({ "status": "ok", "store": state.store.backend_name() })))
}
