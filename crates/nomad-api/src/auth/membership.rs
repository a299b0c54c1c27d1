use crate::auth::models::CallerIdentity;
use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Path, Request, State},
    middleware::Next,
    response::Response,
};
use nomad_core::validation::parse_uuid;
use nomad_core::AppError;
use std::sync::Arc;

/// Route layer for `/trips/{id}/...`: the caller must be an active member of
/// the trip before the handler sees the request body.
pub async fn require_trip_membership(
    State(state): State<Arc<AppState>>,
    identity: CallerIdentity,
    Path(trip_id): Path<String>,
    request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    let trip_id = parse_uuid(&trip_id, "trip ID")?;

    if !state
        .db
        .memberships
        .is_member(trip_id, identity.as_str())
        .await?
    {
        tracing::warn!(trip_id = %trip_id, user_id = %identity, "Trip access denied");
        return Err(HttpAppError(AppError::Forbidden(
            "you must be a trip member to perform this action".to_string(),
        )));
    }

    Ok(next.run(request).await)
}
