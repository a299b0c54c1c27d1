use crate::auth::CallerIdentity;
use crate::error::HttpAppError;
use crate::state::AppState;
use crate::upload::gate::parse_trip_id;
use crate::upload::{decode_file_upload, sniff_upload};
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use nomad_core::models::PollImageResponse;
use nomad_storage::poll_image_path;
use std::sync::Arc;

/// Upload an image for a trip poll option.
///
/// The caller must be a member of the trip; that check runs as route
/// middleware before the body is read.
#[tracing::instrument(
    skip(state, identity, multipart),
    fields(operation = "upload_poll_image", user_id = %identity)
)]
pub async fn upload_poll_image(
    State(state): State<Arc<AppState>>,
    identity: CallerIdentity,
    Path(trip_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PollImageResponse>), HttpAppError> {
    let started_ns = state.uploads.clock.now_ns();
    let trip_id = parse_trip_id(&trip_id)?;
    let uploads = &state.uploads;
    let policy = &uploads.poll_images;

    let file = decode_file_upload(multipart?, &uploads.spool_dir).await?;
    let file_name = file.file_name().to_string();
    let declared_size = file.size();
    let reader = sniff_upload(file, &policy.mime_policy).await?;
    let mime_type = reader.mime_type();

    let path = poll_image_path(
        &trip_id.to_string(),
        identity.as_str(),
        started_ns,
        &file_name,
    );
    let pending = uploads
        .writer()
        .write(path, reader, Some(declared_size), policy.max_file_size)
        .await?;

    let image_url = state
        .url_signer
        .issue_url(pending.path(), policy.url_validity)?;
    let stored = pending.commit();

    tracing::info!(
        trip_id = %trip_id,
        storage_path = %stored.path,
        size_bytes = stored.size,
        mime_type,
        "Poll image uploaded"
    );

    Ok((
        StatusCode::CREATED,
        Json(PollImageResponse {
            image_url,
            storage_path: stored.path,
            mime_type: mime_type.to_string(),
            file_size: stored.size,
        }),
    ))
}
