use crate::auth::CallerIdentity;
use crate::error::HttpAppError;
use crate::services::WalletService;
use crate::state::AppState;
use crate::upload::decode_wallet_upload;
use crate::upload::gate::parse_trip_id;
use crate::utils::ClientMeta;
use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::StatusCode,
    Json,
};
use nomad_core::models::{WalletDocumentResponse, WalletType};
use std::sync::Arc;

/// Upload a document into the caller's personal wallet.
///
/// Any `walletType` or `tripId` in the metadata is overridden.
#[tracing::instrument(
    skip(state, identity, client, multipart),
    fields(operation = "upload_personal_document", user_id = %identity)
)]
pub async fn upload_personal_document(
    State(state): State<Arc<AppState>>,
    identity: CallerIdentity,
    client: ClientMeta,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<WalletDocumentResponse>), HttpAppError> {
    let started_ns = state.uploads.clock.now_ns();
    let (file, mut create) = decode_wallet_upload(multipart?, &state.uploads.spool_dir).await?;
    create.force_scope(WalletType::Personal, None);

    let response = WalletService::new(&state)
        .upload_document(&identity, &client, started_ns, file, create)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Upload a document into a trip's group wallet. Membership is checked by
/// route middleware.
#[tracing::instrument(
    skip(state, identity, client, multipart),
    fields(operation = "upload_group_document", user_id = %identity)
)]
pub async fn upload_group_document(
    State(state): State<Arc<AppState>>,
    identity: CallerIdentity,
    client: ClientMeta,
    Path(trip_id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<WalletDocumentResponse>), HttpAppError> {
    let started_ns = state.uploads.clock.now_ns();
    let trip_id = parse_trip_id(&trip_id)?;
    let (file, mut create) = decode_wallet_upload(multipart?, &state.uploads.spool_dir).await?;
    create.force_scope(WalletType::Group, Some(trip_id));

    let response = WalletService::new(&state)
        .upload_document(&identity, &client, started_ns, file, create)
        .await?;
    Ok((StatusCode::CREATED, Json(response)))
}
