//! Draft API endpoints.

use axum::{
    extract::{Path, Query, State},
    Json,
};

use super::{error, success, ApiResult};
use crate::drafts::{draft_key, Role};
use crate::errors::AppError;
use crate::models::{DraftView, PutDraftRequest, RoleKey, UserQuery};
use crate::AppState;

/// GET /api/drafts - List stored draft keys.
pub async fn list_drafts(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    success(state.store.keys(), state.store.revision())
}

/// GET /api/drafts/:key - Get a single draft.
pub async fn get_draft(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<DraftView> {
    let revision_id = state.store.revision();

    match state.store.get_draft(&key) {
        Some(record) => success(DraftView { key, record }, revision_id),
        None => error(
            AppError::NotFound(format!("Draft {} not found", key)),
            revision_id,
        ),
    }
}

/// PUT /api/drafts/:key - Replace a draft.
pub async fn put_draft(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(request): Json<PutDraftRequest>,
) -> ApiResult<DraftView> {
    if key.trim().is_empty() {
        return error(
            AppError::Validation("Draft key is required".to_string()),
            state.store.revision(),
        );
    }

    state.store.set_draft(&key, request.value);
    let revision_id = state.store.revision();

    match state.store.get_draft(&key) {
        Some(record) => success(DraftView { key, record }, revision_id),
        None => error(
            AppError::Internal(format!("Draft {} vanished after write", key)),
            revision_id,
        ),
    }
}

/// DELETE /api/drafts/:key - Clear a draft. Clearing a missing draft succeeds.
pub async fn delete_draft(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<bool> {
    let removed = state.store.clear_draft(&key);
    success(removed, state.store.revision())
}

/// DELETE /api/drafts - Clear every draft on sign-out.
pub async fn clear_drafts(State(state): State<AppState>) -> ApiResult<()> {
    state.store.clear_all();
    success((), state.store.revision())
}

/// GET /api/keys?userId= - Draft keys of every role for a user.
pub async fn role_keys(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
) -> ApiResult<Vec<RoleKey>> {
    let keys: Vec<RoleKey> = Role::ALL
        .into_iter()
        .map(|role| RoleKey {
            role,
            key: draft_key(query.user_id.as_deref(), role),
        })
        .collect();

    success(keys, state.store.revision())
}
