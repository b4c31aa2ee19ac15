//! Form session API endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use super::{error, success, ApiResult};
use crate::errors::{AppError, FormError};
use crate::forms::{HydrateOptions, HydrationController, MountSpec};
use crate::models::{
    FormView, MountFormRequest, ServerDataOutcome, ServerDataRequest, SetAllRequest,
    SetFieldRequest, SetNestedRequest,
};
use crate::AppState;

fn form_view(id: Uuid, form: &HydrationController) -> FormView {
    FormView {
        id,
        key: form.key().to_string(),
        hydrated: form.is_hydrated(),
        provenance: form.provenance(),
        form: form.snapshot(),
    }
}

fn session_not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Form session {} not found", id))
}

/// Run a mutation against a session and respond with its new state.
fn mutate(
    state: &AppState,
    id: Uuid,
    f: impl FnOnce(&mut HydrationController) -> Result<(), FormError>,
) -> ApiResult<FormView> {
    let outcome = state
        .sessions
        .with_session(id, |form| -> Result<FormView, FormError> {
            f(form)?;
            Ok(form_view(id, form))
        });
    let revision_id = state.store.revision();

    match outcome {
        Some(Ok(view)) => success(view, revision_id),
        Some(Err(e)) => error(e.into(), revision_id),
        None => error(session_not_found(id), revision_id),
    }
}

/// POST /api/forms - Mount a form, hydrating it unless deferred.
pub async fn mount_form(
    State(state): State<AppState>,
    Json(request): Json<MountFormRequest>,
) -> ApiResult<FormView> {
    let spec = MountSpec {
        user_id: request.user_id.as_deref(),
        role: request.role,
        defaults: request.defaults,
        server_data: request.server_data.as_ref(),
        options: HydrateOptions {
            prefer_draft: request.prefer_draft,
            schema_version: request.schema_version,
        },
        defer_hydration: request.defer_hydration,
    };

    let id = match state.sessions.mount(spec) {
        Ok(id) => id,
        Err(e) => return error(e.into(), state.store.revision()),
    };
    let view = state.sessions.with_session(id, |form| form_view(id, form));
    let revision_id = state.store.revision();

    match view {
        Some(view) => success(view, revision_id),
        None => error(session_not_found(id), revision_id),
    }
}

/// GET /api/forms/:id - Current state of a form.
pub async fn get_form(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<FormView> {
    let view = state.sessions.with_session(id, |form| form_view(id, form));
    let revision_id = state.store.revision();

    match view {
        Some(view) => success(view, revision_id),
        None => error(session_not_found(id), revision_id),
    }
}

/// POST /api/forms/:id/server-data - Deliver server data; only the first delivery hydrates.
pub async fn deliver_server_data(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ServerDataRequest>,
) -> ApiResult<ServerDataOutcome> {
    let outcome = state.sessions.with_session(id, |form| {
        let applied = form.hydrate(request.server_data.as_ref());
        ServerDataOutcome {
            applied,
            form: form_view(id, form),
        }
    });
    let revision_id = state.store.revision();

    match outcome {
        Some(outcome) => success(outcome, revision_id),
        None => error(session_not_found(id), revision_id),
    }
}

/// PUT /api/forms/:id/fields/:field - Replace one field.
pub async fn set_field(
    State(state): State<AppState>,
    Path((id, field)): Path<(Uuid, String)>,
    Json(request): Json<SetFieldRequest>,
) -> ApiResult<FormView> {
    mutate(&state, id, |form| {
        form.set_field(&field, request.value).map(|_| ())
    })
}

/// PUT /api/forms/:id - Replace the whole form.
pub async fn set_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetAllRequest>,
) -> ApiResult<FormView> {
    mutate(&state, id, |form| form.set_all(request.form).map(|_| ()))
}

/// PATCH /api/forms/:id/nested - Write a value at a dot path.
pub async fn set_nested(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetNestedRequest>,
) -> ApiResult<FormView> {
    mutate(&state, id, |form| {
        form.set_nested(&request.path, request.value).map(|_| ())
    })
}

/// POST /api/forms/:id/saved - Drop the form's draft after the server accepted a save.
pub async fn mark_saved(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<bool> {
    let cleared = state.sessions.with_session(id, |form| form.clear_draft());
    let revision_id = state.store.revision();

    match cleared {
        Some(cleared) => success(cleared, revision_id),
        None => error(session_not_found(id), revision_id),
    }
}

/// DELETE /api/forms/:id - Unmount a form. Its draft is kept.
pub async fn unmount_form(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    let revision_id = state.store.revision();

    if state.sessions.unmount(id) {
        success((), revision_id)
    } else {
        error(session_not_found(id), revision_id)
    }
}
