//! Navigation API endpoint.

use axum::{extract::State, Json};

use super::{success, ApiResult};
use crate::models::NavigationRequest;
use crate::reaper::ReapReport;
use crate::AppState;

/// POST /api/navigation - Reap other roles' drafts after a route change.
///
/// Responds with `null` data when the event repeats the previous one.
pub async fn route_changed(
    State(state): State<AppState>,
    Json(request): Json<NavigationRequest>,
) -> ApiResult<Option<ReapReport>> {
    let report = state
        .reaper
        .on_route_change(&request.pathname, request.user_id.as_deref());

    success(report, state.store.revision())
}
