//! Reads, listings and deletions of stored wallet documents.

use crate::auth::CallerIdentity;
use crate::error::HttpAppError;
use crate::services::WalletService;
use crate::state::AppState;
use crate::upload::gate::parse_trip_id;
use crate::utils::ClientMeta;
use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use nomad_core::models::{PageParams, WalletDocumentPage, WalletDocumentResponse};
use nomad_core::validation::parse_uuid;
use nomad_core::AppError;
use serde_json::{json, Value};
use std::sync::Arc;

fn page_params(query: Result<Query<PageParams>, QueryRejection>) -> Result<PageParams, AppError> {
    query.map(|Query(params)| params).map_err(|e| {
        AppError::validation(
            "validation_failed",
            format!("invalid pagination parameters: {}", e.body_text()),
        )
    })
}

/// List the caller's personal documents
pub async fn list_personal_documents(
    State(state): State<Arc<AppState>>,
    identity: CallerIdentity,
    query: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<WalletDocumentPage>, HttpAppError> {
    let params = page_params(query)?;
    let page = WalletService::new(&state)
        .list_personal_documents(&identity, params)
        .await?;
    Ok(Json(page))
}

/// List a trip's group documents. Membership is checked by route middleware.
pub async fn list_group_documents(
    State(state): State<Arc<AppState>>,
    Path(trip_id): Path<String>,
    query: Result<Query<PageParams>, QueryRejection>,
) -> Result<Json<WalletDocumentPage>, HttpAppError> {
    let trip_id = parse_trip_id(&trip_id)?;
    let params = page_params(query)?;
    let page = WalletService::new(&state)
        .list_group_documents(trip_id, params)
        .await?;
    Ok(Json(page))
}

/// Fetch one document together with a fresh download URL
#[tracing::instrument(
    skip(state, identity, client),
    fields(operation = "get_document", user_id = %identity)
)]
pub async fn get_document(
    State(state): State<Arc<AppState>>,
    identity: CallerIdentity,
    client: ClientMeta,
    Path(doc_id): Path<String>,
) -> Result<Json<WalletDocumentResponse>, HttpAppError> {
    let doc_id = parse_uuid(&doc_id, "document ID")?;
    let response = WalletService::new(&state)
        .get_document(&identity, &client, doc_id)
        .await?;
    Ok(Json(response))
}

/// Delete one of the caller's documents
#[tracing::instrument(
    skip(state, identity, client),
    fields(operation = "delete_document", user_id = %identity)
)]
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    identity: CallerIdentity,
    client: ClientMeta,
    Path(doc_id): Path<String>,
) -> Result<Json<Value>, HttpAppError> {
    let doc_id = parse_uuid(&doc_id, "document ID")?;
    WalletService::new(&state)
        .delete_document(&identity, &client, doc_id)
        .await?;
    Ok(Json(json!({ "message": "Document deleted successfully" })))
}
