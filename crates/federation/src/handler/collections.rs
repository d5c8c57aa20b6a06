//! `ActivityPub` collection handlers (followers, following, outbox, featured).

use std::collections::HashMap;

use axum::{
    extract::{Path, Query, State, rejection::QueryRejection},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::debug;

use apserve_common::AppResult;
use apserve_db::entities::{following, user, user_profile::FfVisibility};

use super::{FederationState, ap_response, empty, note_links, visibility_refusal};
use crate::convert::{NoteToApNote, render_featured, render_index, render_page};
use crate::exposure::{is_exposable_user, is_follow_list_public, is_listable_note};
use crate::pagination::{CollectionPage, Cursor, Paginator};
use crate::request::ApRequest;

/// Query of followers and following collections.
#[derive(Debug, Default, Deserialize)]
pub struct FollowQuery {
    pub page: Option<String>,
    pub cursor: Option<String>,
}

/// Query of outbox collections.
#[derive(Debug, Default, Deserialize)]
pub struct OutboxQuery {
    pub page: Option<String>,
    pub since_id: Option<String>,
    pub until_id: Option<String>,
}

fn is_page(page: Option<&str>) -> bool {
    page == Some("true")
}

#[derive(Clone, Copy)]
enum FollowDirection {
    Followers,
    Following,
}

/// Handle GET /users/{user}/followers.
pub async fn followers_handler(
    State(state): State<FederationState>,
    Path(user_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
    query: Result<Query<FollowQuery>, QueryRejection>,
) -> AppResult<Response> {
    follow_collection(&state, FollowDirection::Followers, &user_id, &request, &headers, query).await
}

/// Handle GET /users/{user}/following.
pub async fn following_handler(
    State(state): State<FederationState>,
    Path(user_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
    query: Result<Query<FollowQuery>, QueryRejection>,
) -> AppResult<Response> {
    follow_collection(&state, FollowDirection::Following, &user_id, &request, &headers, query).await
}

async fn follow_collection(
    state: &FederationState,
    direction: FollowDirection,
    user_id: &str,
    request: &ApRequest,
    headers: &HeaderMap,
    query: Result<Query<FollowQuery>, QueryRejection>,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(request, Some(user_id)).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let Ok(Query(query)) = query else {
        return Ok(empty(StatusCode::BAD_REQUEST, decision));
    };

    let Some(user) = exposable_user(state, user_id).await? else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };

    let visibility = state.store.find_profile(&user.id).await?.map_or(
        FfVisibility::Public,
        |profile| match direction {
            FollowDirection::Followers => profile.followers_visibility,
            FollowDirection::Following => profile.following_visibility,
        },
    );
    if !is_follow_list_public(visibility) {
        debug!(user_id = %user.id, "Follow list hidden by profile settings");
        return Ok(visibility_refusal(decision));
    }

    let urls = &state.local.urls;
    let (part_of, total) = match direction {
        FollowDirection::Followers => (
            urls.followers_url(&user.id),
            state.store.count_followers(&user.id).await?,
        ),
        FollowDirection::Following => (
            urls.following_url(&user.id),
            state.store.count_following(&user.id).await?,
        ),
    };

    let paginator = Paginator::follows();
    if !is_page(query.page.as_deref()) {
        return Ok(ap_response(
            headers,
            decision,
            render_index(paginator.index(&part_of, total)),
        ));
    }

    let cursor = query.cursor.map_or(Cursor::Start, Cursor::Until);
    let rows = match direction {
        FollowDirection::Followers => {
            state
                .store
                .followers_window(&user.id, cursor.until_id(), paginator.fetch_size())
                .await?
        }
        FollowDirection::Following => {
            state
                .store
                .following_window(&user.id, cursor.until_id(), paginator.fetch_size())
                .await?
        }
    };

    let page = paginator.page(&part_of, total, &cursor, rows, |edge| edge.id.as_str());
    let page = counterpart_uris(state, direction, page).await?;
    Ok(ap_response(headers, decision, render_page(page)))
}

/// Replace each edge with the URI of the user on its other end.
async fn counterpart_uris(
    state: &FederationState,
    direction: FollowDirection,
    page: CollectionPage<following::Model>,
) -> AppResult<CollectionPage<String>> {
    let other = move |edge: &following::Model| match direction {
        FollowDirection::Followers => edge.follower_id.clone(),
        FollowDirection::Following => edge.followee_id.clone(),
    };
    let ids: Vec<String> = page.ordered_items.iter().map(other).collect();
    let users: HashMap<String, user::Model> = state
        .store
        .find_users(&ids)
        .await?
        .into_iter()
        .map(|u| (u.id.clone(), u))
        .collect();

    let urls = &state.local.urls;
    Ok(page.filter_map(|edge| {
        let user = users.get(&other(&edge))?;
        if user.is_local() {
            Some(urls.user_url(&user.id))
        } else {
            user.uri.clone()
        }
    }))
}

/// Handle GET /users/{user}/outbox.
pub async fn outbox_handler(
    State(state): State<FederationState>,
    Path(user_id): Path<String>,
    request: ApRequest,
    headers: HeaderMap,
    query: Result<Query<OutboxQuery>, QueryRejection>,
) -> AppResult<Response> {
    let decision = state.gate.should_refuse(&request, Some(&user_id)).await;
    if decision.refuse {
        return Ok(decision.into_response());
    }
    let Ok(Query(query)) = query else {
        return Ok(empty(StatusCode::BAD_REQUEST, decision));
    };
    let cursor = match (query.since_id, query.until_id) {
        (Some(_), Some(_)) => return Ok(empty(StatusCode::BAD_REQUEST, decision)),
        (Some(since), None) => Cursor::Since(since),
        (None, Some(until)) => Cursor::Until(until),
        (None, None) => Cursor::Start,
    };

    let Some(user) = exposable_user(&state, &user_id).await? else {
        return Ok(empty(StatusCode::NOT_FOUND, decision));
    };

    let urls = &state.local.urls;
    let part_of = urls.outbox_url(&user.id);
    let total = state.store.count_outbox(&user.id).await?;
    let paginator = Paginator::outbox();

    if !is_page(query.page.as_deref()) {
        return Ok(ap_response(
            &headers,
            decision,
            render_index(paginator.index(&part_of, total)),
        ));
    }

    let rows = state
        .store
        .outbox_window(
            &user.id,
            cursor.since_id(),
            cursor.until_id(),
            paginator.fetch_size(),
        )
        .await?;
    let page = paginator.page(&part_of, total, &cursor, rows, |note| note.id.as_str());
    let links = note_links(&state, &page.ordered_items).await?;
    let page = page.map(|note| {
        let links = links.get(&note.id).cloned().unwrap_or_default();
        note.to_ap_activity(urls, &links)
    });

    Ok(ap_response(&headers, decision, render_page(page)))
}

/// Handle GET /users/{user}/collections/featured.
pub async fn featured_handler(
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

    let pinned: Vec<String> = state
        .store
        .pinned_notes(&user.id)
        .await?
        .into_iter()
        .map(|pin| pin.note_id)
        .collect();
    let mut notes = state.store.find_notes(&pinned).await?;
    notes.retain(|note| note.user_id == user.id && is_listable_note(note));
    notes.sort_by_key(|note| pinned.iter().position(|id| *id == note.id));

    let urls = &state.local.urls;
    let links = note_links(&state, &notes).await?;
    let items = notes
        .iter()
        .map(|note| {
            let links = links.get(&note.id).cloned().unwrap_or_default();
            note.to_ap_note(urls, &links)
        })
        .collect();

    Ok(ap_response(
        &headers,
        decision,
        render_featured(urls.featured_url(&user.id), items),
    ))
}

/// A local user that may be served, by id.
pub(super) async fn exposable_user(
    state: &FederationState,
    user_id: &str,
) -> AppResult<Option<user::Model>> {
    Ok(state
        .store
        .find_local_user(user_id)
        .await?
        .filter(is_exposable_user))
}

