use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use pp_core::ModeError;
use pp_types::{
    ActionResponse, ContextCreateResponse, ContextStateResponse, ExerciseConfirmRequest,
    StoreWriteRequest, StoreWriteResponse, ToggleRequest,
};
use tracing::debug;
use uuid::Uuid;

use crate::hub::ContextController;
use crate::{ApiResult, AppState, bad_request, not_found};

pub(crate) async fn create_context(State(state): State<AppState>) -> Json<ContextCreateResponse> {
    let (context_id, snapshot) = state.hub.create().await;
    Json(ContextCreateResponse {
        context_id,
        snapshot,
    })
}

pub(crate) async fn close_context(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, Json<crate::ErrorResponse>)> {
    if state.hub.close(id).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found("context not found"))
    }
}

pub(crate) async fn context_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ContextStateResponse> {
    state
        .hub
        .with_context(id, |ctx| ContextStateResponse {
            context_id: id,
            snapshot: ctx.snapshot(),
            messages: ctx.surface_mut().drain_messages(),
            picker_open: ctx.surface().picker_open(),
        })
        .await
        .map(Json)
        .ok_or_else(|| not_found("context not found"))
}

pub(crate) async fn toggle_auto_mode(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<ActionResponse> {
    run_action(&state, id, |ctx| ctx.toggle_auto_mode(request.enabled)).await
}

pub(crate) async fn toggle_exercise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ToggleRequest>,
) -> ApiResult<ActionResponse> {
    run_action(&state, id, |ctx| ctx.toggle_exercise(request.enabled)).await
}

pub(crate) async fn confirm_exercise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ExerciseConfirmRequest>,
) -> ApiResult<ActionResponse> {
    run_action(&state, id, |ctx| ctx.confirm_exercise(request.minutes)).await
}

pub(crate) async fn cancel_exercise(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<ActionResponse> {
    run_action(&state, id, |ctx| Ok(ctx.cancel_exercise())).await
}

pub(crate) async fn write_key(
    State(state): State<AppState>,
    Path((id, key)): Path<(Uuid, String)>,
    Json(request): Json<StoreWriteRequest>,
) -> ApiResult<StoreWriteResponse> {
    if key.trim().is_empty() {
        return Err(bad_request("key cannot be empty"));
    }

    state
        .hub
        .with_context(id, |ctx| {
            let outcome = ctx.write(&key, &request.value);
            debug!(%id, key = %key, ?outcome, "store write");
            StoreWriteResponse {
                outcome,
                snapshot: ctx.snapshot(),
            }
        })
        .await
        .map(Json)
        .ok_or_else(|| not_found("context not found"))
}

pub(crate) async fn remove_key(
    State(state): State<AppState>,
    Path((id, key)): Path<(Uuid, String)>,
) -> ApiResult<StoreWriteResponse> {
    state
        .hub
        .with_context(id, |ctx| StoreWriteResponse {
            outcome: ctx.remove(&key),
            snapshot: ctx.snapshot(),
        })
        .await
        .map(Json)
        .ok_or_else(|| not_found("context not found"))
}

/// Runs one user action. A rejection is still a successful request: the
/// client gets `accepted=false` and the message it should display.
async fn run_action(
    state: &AppState,
    id: Uuid,
    action: impl FnOnce(&mut ContextController) -> Result<pp_core::Transition, ModeError> + Send,
) -> ApiResult<ActionResponse> {
    let (result, message, snapshot) = state
        .hub
        .with_context(id, |ctx| {
            let result = action(ctx);
            let message = ctx.surface_mut().drain_messages().pop();
            (result, message, ctx.snapshot())
        })
        .await
        .ok_or_else(|| not_found("context not found"))?;

    match result {
        Ok(_) => Ok(Json(ActionResponse {
            accepted: true,
            message: None,
            snapshot,
        })),
        Err(err @ ModeError::InvalidExerciseDuration { .. }) => Err(bad_request(&err.to_string())),
        Err(err) => {
            debug!(%id, "action rejected: {}", err);
            Ok(Json(ActionResponse {
                accepted: false,
                message,
                snapshot,
            }))
        }
    }
}
