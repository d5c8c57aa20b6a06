//! `ActivityPub` request handlers.

#![allow(missing_docs)]

mod collections;
mod inbox;
mod misc;
mod note;
mod user;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

use apserve_common::{AppError, AppResult};
use apserve_db::entities::note as note_entity;

use crate::convert::{NoteLinks, NoteToApNote};
use crate::exposure::{PUBLIC_CACHE, REFUSAL_CACHE};
use crate::gate::{AccessDecision, AccessGate};
use crate::intake::InboxIntake;
use crate::local::LocalIdentity;
use crate::negotiation::{Representation, negotiate_headers};
use crate::objects::WithContext;
use crate::store::FederationStore;

pub use collections::{featured_handler, followers_handler, following_handler, outbox_handler};
pub use inbox::{shared_inbox_handler, user_inbox_handler};
pub use misc::{emoji_handler, follow_handler, follow_request_handler, like_handler};
pub use note::{note_activity_handler, note_handler};
pub use user::{acct_handler, publickey_handler, user_handler};

/// State shared by the federation handlers.
#[derive(Clone)]
pub struct FederationState {
    pub local: Arc<LocalIdentity>,
    pub store: Arc<dyn FederationStore>,
    pub gate: AccessGate,
    pub intake: InboxIntake,
}

/// Serialize `object` with `@context` as the negotiated `ActivityPub` type.
pub(crate) fn ap_response<T: Serialize>(
    headers: &HeaderMap,
    decision: AccessDecision,
    object: T,
) -> Response {
    let representation = match negotiate_headers(headers) {
        Representation::Html => Representation::ActivityJson,
        other => other,
    };
    let body = match serde_json::to_vec(&WithContext::new(object)) {
        Ok(body) => body,
        Err(e) => return AppError::Internal(e.to_string()).into_response(),
    };

    let mut response = (
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static(representation.content_type()),
        )],
        body,
    )
        .into_response();
    set_cache(&mut response, decision.cache_control.unwrap_or(PUBLIC_CACHE));
    response
}

/// A bodiless response carrying the gate's cache policy.
pub(crate) fn empty(status: StatusCode, decision: AccessDecision) -> Response {
    let mut response = status.into_response();
    decision.apply(&mut response);
    response
}

/// 403 for collections hidden by the owner's visibility settings.
pub(crate) fn visibility_refusal(decision: AccessDecision) -> Response {
    let mut response = StatusCode::FORBIDDEN.into_response();
    set_cache(&mut response, decision.cache_control.unwrap_or(REFUSAL_CACHE));
    response
}

fn set_cache(response: &mut Response, value: &'static str) {
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static(value));
}

/// Resolve reply and renote URIs of `notes`.
pub(crate) async fn note_links(
    state: &FederationState,
    notes: &[note_entity::Model],
) -> AppResult<HashMap<String, NoteLinks>> {
    let related: Vec<String> = notes
        .iter()
        .flat_map(|n| [n.reply_id.clone(), n.renote_id.clone()])
        .flatten()
        .collect();
    let targets: HashMap<String, String> = if related.is_empty() {
        HashMap::new()
    } else {
        state
            .store
            .find_notes(&related)
            .await?
            .into_iter()
            .map(|n| (n.id.clone(), n.ap_id(&state.local.urls)))
            .collect()
    };

    Ok(notes
        .iter()
        .map(|n| {
            let lookup = |id: &Option<String>| id.as_ref().and_then(|id| targets.get(id).cloned());
            let links = NoteLinks {
                reply: lookup(&n.reply_id),
                renote: lookup(&n.renote_id),
            };
            (n.id.clone(), links)
        })
        .collect())
}
