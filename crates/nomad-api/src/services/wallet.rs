//! Wallet document service
//!
//! Orchestrates a wallet upload once the form has been decoded:
//! validate → sniff → quota → sanitize metadata → store → sign → persist.
//! A stored object is deleted again if any later step fails.
//!
//! Reads, listings and deletions of stored documents go through the same
//! service so access rules and the audit trail live in one place.

use std::sync::Arc;

use nomad_core::models::{
    NewWalletDocument, PageParams, Pagination, WalletAuditAction, WalletAuditEntry,
    WalletDocument, WalletDocumentCreate, WalletDocumentPage, WalletDocumentResponse, WalletType,
};
use nomad_core::validation::{sanitize_metadata, validate_metadata_size};
use nomad_core::AppError;
use nomad_storage::wallet_document_path;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::constants::AUDIT_LOG_TIMEOUT;
use crate::state::AppState;
use crate::upload::{sniff_upload, SpooledFile};
use crate::utils::ClientMeta;

pub struct WalletService {
    state: Arc<AppState>,
}

impl WalletService {
    pub fn new(state: &Arc<AppState>) -> Self {
        Self {
            state: state.clone(),
        }
    }

    /// Bytes already used by the wallet the document would land in, and the
    /// quota of that wallet.
    async fn usage_and_quota(
        &self,
        identity: &CallerIdentity,
        wallet_type: WalletType,
        trip_id: Option<Uuid>,
    ) -> Result<(u64, u64), AppError> {
        let uploads = &self.state.uploads;
        let documents = &self.state.db.documents;
        let (used, quota) = match (wallet_type, trip_id) {
            (WalletType::Personal, _) => (
                documents.user_storage_usage(identity.as_str()).await?,
                uploads.personal_quota,
            ),
            (WalletType::Group, Some(trip_id)) => (
                documents.trip_storage_usage(trip_id).await?,
                uploads.group_quota,
            ),
            (WalletType::Group, None) => {
                return Err(AppError::validation(
                    "missing_trip_id",
                    "trip ID is required for group wallet documents",
                ))
            }
        };
        Ok((u64::try_from(used).unwrap_or(0), quota))
    }

    /// Record a wallet operation without holding up the response. The insert
    /// runs detached and is bounded by [`AUDIT_LOG_TIMEOUT`]; failures are
    /// logged only.
    fn log_audit(
        &self,
        identity: &CallerIdentity,
        client: &ClientMeta,
        document_id: Uuid,
        action: WalletAuditAction,
    ) {
        let audit = self.state.db.audit.clone();
        let entry = WalletAuditEntry {
            user_id: identity.as_str().to_string(),
            document_id: Some(document_id),
            action,
            ip_address: client.ip_address.clone(),
            user_agent: client.user_agent.clone(),
        };

        tokio::spawn(async move {
            match tokio::time::timeout(AUDIT_LOG_TIMEOUT, audit.log_access(entry)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(
                    error = %e,
                    %document_id,
                    %action,
                    "Failed to write wallet audit entry"
                ),
                Err(_) => tracing::warn!(%document_id, %action, "Wallet audit entry timed out"),
            }
        });
    }

    /// Personal documents go to their owner only, group documents to members
    /// of the trip.
    async fn ensure_can_view(
        &self,
        identity: &CallerIdentity,
        document: &WalletDocument,
    ) -> Result<(), AppError> {
        match (document.wallet_type, document.trip_id) {
            (WalletType::Personal, _) => {
                if document.user_id != identity.as_str() {
                    return Err(AppError::Forbidden(
                        "you do not have access to this document".to_string(),
                    ));
                }
            }
            (WalletType::Group, Some(trip_id)) => {
                let memberships = &self.state.db.memberships;
                if !memberships.is_member(trip_id, identity.as_str()).await? {
                    return Err(AppError::Forbidden(
                        "you must be a trip member to access this document".to_string(),
                    ));
                }
            }
            (WalletType::Group, None) => {}
        }
        Ok(())
    }

    async fn find_document(&self, id: Uuid) -> Result<WalletDocument, AppError> {
        self.state
            .db
            .documents
            .get_document(id)
            .await?
            .ok_or_else(|| AppError::NotFound("wallet document not found".to_string()))
    }

    /// Store `file` and record it as a wallet document owned by `identity`.
    /// `started_ns` is the upload clock reading taken when the request
    /// reached its handler.
    #[tracing::instrument(
        skip(self, identity, client, file, create),
        fields(
            user_id = %identity,
            wallet_type = tracing::field::Empty,
            storage_path = tracing::field::Empty
        )
    )]
    pub async fn upload_document(
        &self,
        identity: &CallerIdentity,
        client: &ClientMeta,
        started_ns: u64,
        file: SpooledFile,
        mut create: WalletDocumentCreate,
    ) -> Result<WalletDocumentResponse, AppError> {
        create.validate_and_normalize()?;
        let wallet_type = create.wallet_type.unwrap_or(WalletType::Personal);
        tracing::Span::current().record("wallet_type", wallet_type.as_str());

        let policy = &self.state.uploads.wallet;
        let file_name = file.file_name().to_string();
        let declared_size = file.size();
        let reader = sniff_upload(file, &policy.mime_policy).await?;
        let mime_type = reader.mime_type();

        let (used, quota) = self
            .usage_and_quota(identity, wallet_type, create.trip_id)
            .await?;
        if used.saturating_add(declared_size) > quota {
            tracing::info!(
                used_bytes = used,
                size_bytes = declared_size,
                quota_bytes = quota,
                "Wallet quota exceeded"
            );
            return Err(AppError::validation(
                "storage_quota_exceeded",
                format!("{} wallet storage quota exceeded", wallet_type),
            ));
        }

        let metadata = sanitize_metadata(create.document_type, std::mem::take(&mut create.metadata));
        validate_metadata_size(&metadata)?;

        let path = wallet_document_path(
            wallet_type.as_str(),
            identity.as_str(),
            started_ns,
            &file_name,
        );
        tracing::Span::current().record("storage_path", path.as_str());

        let pending = self
            .state
            .uploads
            .writer()
            .write(path, reader, Some(declared_size), policy.max_file_size)
            .await?;

        let new_document = NewWalletDocument {
            user_id: identity.as_str().to_string(),
            trip_id: create.trip_id,
            wallet_type,
            document_type: create.document_type,
            name: create.name,
            description: create.description,
            file_path: pending.path().to_string(),
            file_size: i64::try_from(pending.size()).unwrap_or(i64::MAX),
            mime_type: mime_type.to_string(),
            tags: create.tags,
            metadata,
        };

        let download_url = self
            .state
            .url_signer
            .issue_url(pending.path(), policy.url_validity)?;

        let document = match self.state.db.documents.create_document(new_document).await {
            Ok(document) => document,
            Err(e) => {
                tracing::error!(error = %e, "Failed to record wallet document, removing stored file");
                pending.discard().await;
                return Err(e);
            }
        };

        let stored = pending.commit();

        tracing::info!(
            document_id = %document.id,
            size_bytes = stored.size,
            mime_type,
            "Wallet document uploaded"
        );
        self.log_audit(identity, client, document.id, WalletAuditAction::Upload);

        Ok(WalletDocumentResponse {
            document,
            download_url: Some(download_url),
        })
    }

    /// A single document with a fresh download URL
    #[tracing::instrument(skip(self, identity, client), fields(user_id = %identity))]
    pub async fn get_document(
        &self,
        identity: &CallerIdentity,
        client: &ClientMeta,
        id: Uuid,
    ) -> Result<WalletDocumentResponse, AppError> {
        let document = self.find_document(id).await?;
        self.ensure_can_view(identity, &document).await?;

        let download_url = self
            .state
            .url_signer
            .issue_url(&document.file_path, self.state.uploads.wallet.url_validity)?;
        self.log_audit(identity, client, document.id, WalletAuditAction::View);

        Ok(WalletDocumentResponse {
            document,
            download_url: Some(download_url),
        })
    }

    pub async fn list_personal_documents(
        &self,
        identity: &CallerIdentity,
        params: PageParams,
    ) -> Result<WalletDocumentPage, AppError> {
        let (limit, offset) = params.resolve();
        let (data, total) = self
            .state
            .db
            .documents
            .list_personal_documents(identity.as_str(), limit, offset)
            .await?;
        Ok(WalletDocumentPage {
            data,
            pagination: Pagination {
                limit,
                offset,
                total,
            },
        })
    }

    /// Group documents of a trip. Membership is checked by route middleware.
    pub async fn list_group_documents(
        &self,
        trip_id: Uuid,
        params: PageParams,
    ) -> Result<WalletDocumentPage, AppError> {
        let (limit, offset) = params.resolve();
        let (data, total) = self
            .state
            .db
            .documents
            .list_group_documents(trip_id, limit, offset)
            .await?;
        Ok(WalletDocumentPage {
            data,
            pagination: Pagination {
                limit,
                offset,
                total,
            },
        })
    }

    /// Soft-delete a document owned by `identity` and remove its file. The
    /// file delete is best effort: once the row is gone the download route
    /// refuses the path anyway.
    #[tracing::instrument(skip(self, identity, client), fields(user_id = %identity))]
    pub async fn delete_document(
        &self,
        identity: &CallerIdentity,
        client: &ClientMeta,
        id: Uuid,
    ) -> Result<(), AppError> {
        let document = self.find_document(id).await?;
        if document.user_id != identity.as_str() {
            return Err(AppError::Forbidden(
                "you do not have permission to delete this document".to_string(),
            ));
        }

        if !self.state.db.documents.soft_delete_document(id).await? {
            return Err(AppError::NotFound("wallet document not found".to_string()));
        }
        self.log_audit(identity, client, id, WalletAuditAction::Delete);

        if let Err(e) = self.state.uploads.storage.delete(&document.file_path).await {
            tracing::warn!(
                error = %e,
                storage_path = %document.file_path,
                "Failed to delete file of removed wallet document"
            );
        }

        tracing::info!(document_id = %id, "Wallet document deleted");
        Ok(())
    }
}
