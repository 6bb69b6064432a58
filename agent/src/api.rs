use std::{collections::HashMap, sync::Arc};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use iota_common::{desired_command, PhysicalPort, UpdateDocument};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::{
    channel::{bounded, ShadowChannel, ShadowError},
    reconciler::Reconciler,
};

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub fn router<P, S>(reconciler: Arc<Reconciler<P, S>>) -> Router
where
    P: PhysicalPort + 'static,
    S: ShadowChannel,
{
    Router::new()
        .route("/api/state", get(handle_get_state::<P, S>))
        .route("/api/desired", post(handle_post_desired::<P, S>))
        .with_state(reconciler)
}

async fn handle_get_state<P, S>(State(reconciler): State<Arc<Reconciler<P, S>>>) -> impl IntoResponse
where
    P: PhysicalPort + 'static,
    S: ShadowChannel,
{
    let state = reconciler.snapshot().await;
    Json(Value::Object(state.to_change_set().to_json_map()))
}

async fn handle_post_desired<P, S>(
    State(reconciler): State<Arc<Reconciler<P, S>>>,
    Query(params): Query<HashMap<String, String>>,
) -> axum::response::Response
where
    P: PhysicalPort + 'static,
    S: ShadowChannel,
{
    let (Some(property), Some(value)) = (params.get("property"), params.get("value")) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'property' or 'value' parameter");
    };
    let changes = match desired_command(property, value) {
        Ok(changes) => changes,
        Err(err) => return error_response(StatusCode::BAD_REQUEST, &err.to_string()),
    };

    let document = UpdateDocument::desired(&changes);
    match bounded(reconciler.timeout(), reconciler.channel().update(document)).await {
        Ok(()) => {
            info!("operator requested {property}={value}");
            (StatusCode::ACCEPTED, Json(Value::Object(changes.to_json_map()))).into_response()
        }
        Err(err @ ShadowError::Rejected { .. }) => error_response(StatusCode::BAD_REQUEST, &err.to_string()),
        Err(err) => {
            warn!("desired update failed: {err}");
            error_response(StatusCode::BAD_GATEWAY, &err.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
