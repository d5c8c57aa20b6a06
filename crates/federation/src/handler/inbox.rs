//! Inbox endpoints.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
};
use tracing::debug;

use super::FederationState;
use crate::request::ApRequest;

/// Handle POST /inbox.
pub async fn shared_inbox_handler(
    State(state): State<FederationState>,
    request: ApRequest,
    body: Bytes,
) -> StatusCode {
    debug!(request_id = %request.request_id, size = body.len(), "Shared inbox delivery");
    state.intake.handle(&request, body).await
}

/// Handle POST /users/{user}/inbox.
pub async fn user_inbox_handler(
    State(state): State<FederationState>,
    Path(user): Path<String>,
    request: ApRequest,
    body: Bytes,
) -> StatusCode {
    debug!(request_id = %request.request_id, user = %user, size = body.len(), "User inbox delivery");
    state.intake.handle(&request, body).await
}
