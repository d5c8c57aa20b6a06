//! Single note handlers.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error};

use apserve_common::AppResult;

use super::{FederationState, ap_response, empty, note_links};
use crate::convert::NoteToApNote;
use crate::exposure::{NoteExposure, is_listable_note, note_exposure};
use crate::request::ApRequest;

/// Handle GET /notes/{note}.
pub async fn note_handler(
    State(state): State<FederationState>,
    Path(note_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, None).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let Some(note) = state.store.find_note(&note_id).await? else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };

    match note_exposure(&note, &state.local.hosts) {
        NoteExposure::Serve => {
            let links = note_links(&state, std::slice::from_ref(&note))
                .await?
                .remove(&note.id)
                .unwrap_or_default();
            Ok(ap_response(
                &headers,
                decision,
                note.to_ap_note(&state.local.urls, &links),
            ))
        }
        NoteExposure::Redirect(uri) => {
            debug!(note_id = %note.id, uri = %uri, "Redirecting to remote note");
            let Ok(location) = HeaderValue::from_str(&uri) else {
                return Ok(empty(StatusCode::NOT_FOUND, decision));
            };
            let mut response = empty(StatusCode::FOUND, decision);
            response.headers_mut().insert(header::LOCATION, location);
            Ok(response)
        }
        NoteExposure::NotFound => Ok(empty(StatusCode::NOT_FOUND, decision)),
        NoteExposure::Inconsistent => {
            error!(note_id = %note.id, host = ?note.user_host, "Remote note claims a local host");
            Ok(empty(StatusCode::INTERNAL_SERVER_ERROR, decision))
        }
    }
}

/// Handle GET /notes/{note}/activity.
pub async fn note_activity_handler(
    State(state): State<FederationState>,
    Path(note_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, None).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let note = state
        .store
        .find_note(&note_id)
        .await?
        .filter(|note| note.user_host.is_none() && is_listable_note(note));
    let Some(note) = note else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };

    let links = note_links(&state, std::slice::from_ref(&note))
        .await?
        .remove(&note.id)
        .unwrap_or_default();
    Ok(ap_response(
        &headers,
        decision,
        note.to_ap_activity(&state.local.urls, &links),
    ))
}
