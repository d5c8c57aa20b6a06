//! `ActivityPub` user (Person) handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use apserve_common::{AppError, AppResult};
use apserve_db::entities::user;

use super::collections::exposable_user;
use super::{FederationState, ap_response, empty};
use crate::convert::UserToApPerson;
use crate::exposure::is_exposable_user;
use crate::gate::AccessDecision;
use crate::request::ApRequest;

/// Handle GET /users/{user}.
pub async fn user_handler(
    State(state): State<FederationState>,
    Path(user_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, Some(&user_id)).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let user = exposable_user(&state, &user_id).await?;
    person_response(&state, &headers, decision, user).await
}

/// Handle GET /@{username}.
pub async fn acct_handler(
    State(state): State<FederationState>,
    Path(acct): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let Some(username) = acct.strip_prefix('@') else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let decision = state.gate.should_refuse(&request, Some(username)).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    if username.contains('@') {
        debug!(acct = %acct, "Remote acct requested");
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    }
    let user = state
        .store
        .find_local_user_by_username(username)
        .await?
        .filter(is_exposable_user);
    person_response(&state, &headers, decision, user).await
}

async fn person_response(
    state: &FederationState,
    headers: &HeaderMap,
    decision: AccessDecision,
    user: Option<user::Model>,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };
    let profile = state.store.find_profile(&user.id).await?;
    let pem = local_public_key(state, &user.id).await?;

    Ok(ap_response(
        headers,
        decision,
        user.to_ap_person(&state.local.urls, profile.as_ref(), &pem),
    ))
}

/// Handle GET /users/{user}/publickey.
pub async fn publickey_handler(
    State(state): State<FederationState>,
    Path(user_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, Some(&user_id)).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let Some(user) = exposable_user(&state, &user_id).await? else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };
    let pem = local_public_key(&state, &user.id).await?;

    Ok(ap_response(
        &headers,
        decision,
        user.to_ap_key(&state.local.urls, &pem),
    ))
}

/// Every local user has a keypair; a missing one is a server fault.
async fn local_public_key(state: &FederationState, user_id: &str) -> AppResult<String> {
    match state.store.find_keypair(user_id).await? {
        Some(keypair) => Ok(keypair.public_key),
        None => {
            error!(user_id = %user_id, "Local user has no keypair");
            Err(AppError::Internal(format!("missing keypair for {user_id}")))
        }
    }
}
