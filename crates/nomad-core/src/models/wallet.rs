use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;
use validator::Validate;

use crate::error::AppError;

pub const MAX_TAGS: usize = 20;
pub const MAX_TAG_LENGTH: usize = 50;

/// Scope a wallet document belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Personal,
    Group,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Personal => "personal",
            WalletType::Group => "group",
        }
    }
}

impl FromStr for WalletType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "personal" => Ok(WalletType::Personal),
            "group" => Ok(WalletType::Group),
            _ => Err(anyhow::anyhow!("Invalid wallet type: {}", s)),
        }
    }
}

impl Display for WalletType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Passport,
    Visa,
    Insurance,
    Vaccination,
    LoyaltyCard,
    FlightBooking,
    HotelBooking,
    Reservation,
    Receipt,
    #[default]
    Other,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Passport => "passport",
            DocumentType::Visa => "visa",
            DocumentType::Insurance => "insurance",
            DocumentType::Vaccination => "vaccination",
            DocumentType::LoyaltyCard => "loyalty_card",
            DocumentType::FlightBooking => "flight_booking",
            DocumentType::HotelBooking => "hotel_booking",
            DocumentType::Reservation => "reservation",
            DocumentType::Receipt => "receipt",
            DocumentType::Other => "other",
        }
    }

    /// Metadata keys kept for this document type; everything else is dropped.
    pub fn allowed_metadata_keys(&self) -> &'static [&'static str] {
        match self {
            DocumentType::Passport => &[
                "passport_number",
                "country",
                "expiry_date",
                "issue_date",
                "nationality",
            ],
            DocumentType::Visa => &[
                "visa_number",
                "country",
                "expiry_date",
                "issue_date",
                "visa_type",
            ],
            DocumentType::Insurance => {
                &["policy_number", "provider", "expiry_date", "coverage_type"]
            }
            DocumentType::Vaccination => &[
                "vaccine_name",
                "date_administered",
                "dose_number",
                "provider",
            ],
            DocumentType::LoyaltyCard => &["card_number", "program_name", "tier", "expiry_date"],
            DocumentType::FlightBooking => &[
                "airline",
                "flight_number",
                "departure_date",
                "arrival_date",
                "booking_reference",
                "departure_airport",
                "arrival_airport",
            ],
            DocumentType::HotelBooking => &[
                "hotel_name",
                "check_in",
                "check_out",
                "booking_reference",
                "address",
            ],
            DocumentType::Reservation => &[
                "venue_name",
                "reservation_date",
                "reservation_time",
                "booking_reference",
                "party_size",
            ],
            DocumentType::Receipt => &[
                "merchant",
                "amount",
                "currency",
                "transaction_date",
                "category",
            ],
            DocumentType::Other => &["notes"],
        }
    }
}

impl FromStr for DocumentType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| anyhow::anyhow!("Invalid document type: {}", s))
    }
}

impl Display for DocumentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Stored wallet document row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDocument {
    pub id: Uuid,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trip_id: Option<Uuid>,
    pub wallet_type: WalletType,
    pub document_type: DocumentType,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip)]
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub tags: Vec<String>,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Wallet document plus a short-lived signed download URL
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletDocumentResponse {
    #[serde(flatten)]
    pub document: WalletDocument,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
}

/// The `metadata` form field of a wallet upload
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct WalletDocumentCreate {
    #[serde(default)]
    pub wallet_type: Option<WalletType>,
    #[serde(default)]
    pub trip_id: Option<Uuid>,
    #[serde(default)]
    pub document_type: DocumentType,
    #[serde(alias = "title")]
    #[validate(length(
        min = 1,
        max = 255,
        message = "Name must be between 1 and 255 characters"
    ))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20, message = "At most 20 tags are allowed"))]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl WalletDocumentCreate {
    /// Run field validation and normalize tags (trimmed, empty ones dropped).
    pub fn validate_and_normalize(&mut self) -> Result<(), AppError> {
        self.name = self.name.trim().to_string();
        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        self.validate()?;

        if let Some(tag) = self.tags.iter().find(|t| t.chars().count() > MAX_TAG_LENGTH) {
            return Err(AppError::validation(
                "validation_failed",
                format!(
                    "Tag '{}' exceeds {} characters",
                    tag.chars().take(MAX_TAG_LENGTH).collect::<String>(),
                    MAX_TAG_LENGTH
                ),
            ));
        }
        Ok(())
    }

    /// Force the scope dictated by the route, ignoring client-supplied values.
    pub fn force_scope(&mut self, wallet_type: WalletType, trip_id: Option<Uuid>) {
        self.wallet_type = Some(wallet_type);
        self.trip_id = trip_id;
    }
}

/// Insert payload for a wallet document row
#[derive(Debug, Clone)]
pub struct NewWalletDocument {
    pub user_id: String,
    pub trip_id: Option<Uuid>,
    pub wallet_type: WalletType,
    pub document_type: DocumentType,
    pub name: String,
    pub description: Option<String>,
    pub file_path: String,
    pub file_size: i64,
    pub mime_type: String,
    pub tags: Vec<String>,
    pub metadata: Value,
}

pub const DEFAULT_PAGE_LIMIT: i64 = 20;
pub const MAX_PAGE_LIMIT: i64 = 100;

/// `limit` / `offset` query parameters of the list routes
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageParams {
    /// Limit clamped to `1..=MAX_PAGE_LIMIT`, offset to zero or more.
    pub fn resolve(&self) -> (i64, i64) {
        let limit = self
            .limit
            .unwrap_or(DEFAULT_PAGE_LIMIT)
            .clamp(1, MAX_PAGE_LIMIT);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Pagination {
    pub limit: i64,
    pub offset: i64,
    pub total: i64,
}

/// One page of wallet documents, newest first
#[derive(Debug, Clone, Serialize)]
pub struct WalletDocumentPage {
    pub data: Vec<WalletDocument>,
    pub pagination: Pagination,
}

/// Wallet operation recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletAuditAction {
    Upload,
    View,
    Delete,
}

impl WalletAuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletAuditAction::Upload => "upload",
            WalletAuditAction::View => "view",
            WalletAuditAction::Delete => "delete",
        }
    }
}

impl Display for WalletAuditAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Audit log row for one wallet operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAuditEntry {
    pub user_id: String,
    pub document_id: Option<Uuid>,
    pub action: WalletAuditAction,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_params_are_clamped() {
        assert_eq!(PageParams::default().resolve(), (DEFAULT_PAGE_LIMIT, 0));
        let params = PageParams {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(params.resolve(), (MAX_PAGE_LIMIT, 0));
        let params = PageParams {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(params.resolve(), (1, 40));
    }

    #[test]
    fn test_create_accepts_title_alias_and_defaults() {
        let create: WalletDocumentCreate =
            serde_json::from_str(r#"{"title":"Boarding pass"}"#).unwrap();
        assert_eq!(create.name, "Boarding pass");
        assert_eq!(create.document_type, DocumentType::Other);
        assert!(create.wallet_type.is_none());
        assert!(create.tags.is_empty());
    }

    #[test]
    fn test_create_parses_camel_case_fields() {
        let create: WalletDocumentCreate = serde_json::from_str(
            r#"{"walletType":"group","documentType":"flight_booking","name":"LH400","tags":["work"],"metadata":{"airline":"LH"}}"#,
        )
        .unwrap();
        assert_eq!(create.wallet_type, Some(WalletType::Group));
        assert_eq!(create.document_type, DocumentType::FlightBooking);
        assert_eq!(create.metadata["airline"], "LH");
    }

    #[test]
    fn test_unknown_document_type_is_rejected() {
        let result: Result<WalletDocumentCreate, _> =
            serde_json::from_str(r#"{"name":"x","documentType":"tattoo"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_empty_name_and_long_tags() {
        let mut create: WalletDocumentCreate = serde_json::from_str(r#"{"name":"  "}"#).unwrap();
        assert!(create.validate_and_normalize().is_err());

        let long_tag = "t".repeat(MAX_TAG_LENGTH + 1);
        let mut create: WalletDocumentCreate =
            serde_json::from_value(serde_json::json!({"name": "doc", "tags": [long_tag]}))
                .unwrap();
        let err = create.validate_and_normalize().unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation {
                code: "validation_failed",
                ..
            }
        ));
    }

    #[test]
    fn test_validate_rejects_too_many_tags() {
        let tags: Vec<String> = (0..=MAX_TAGS).map(|i| format!("tag{}", i)).collect();
        let mut create: WalletDocumentCreate =
            serde_json::from_value(serde_json::json!({"name": "doc", "tags": tags})).unwrap();
        assert!(create.validate_and_normalize().is_err());
    }

    #[test]
    fn test_force_scope_overrides_client_values() {
        let mut create: WalletDocumentCreate = serde_json::from_str(
            r#"{"name":"doc","walletType":"group","tripId":"6f1c1d2e-8c57-4a43-9a55-1b7e8d6f0e11"}"#,
        )
        .unwrap();
        create.force_scope(WalletType::Personal, None);
        assert_eq!(create.wallet_type, Some(WalletType::Personal));
        assert!(create.trip_id.is_none());
    }

    #[test]
    fn test_document_type_round_trips_through_str() {
        for ty in [DocumentType::LoyaltyCard, DocumentType::Other] {
            assert_eq!(ty.as_str().parse::<DocumentType>().unwrap(), ty);
        }
        assert_eq!("group".parse::<WalletType>().unwrap(), WalletType::Group);
    }

    #[test]
    fn test_document_hides_file_path() {
        let doc = WalletDocument {
            id: Uuid::new_v4(),
            user_id: "user-1".to_string(),
            trip_id: None,
            wallet_type: WalletType::Personal,
            document_type: DocumentType::Passport,
            name: "Passport".to_string(),
            description: None,
            file_path: "wallet/personal/user-1/1_passport.pdf".to_string(),
            file_size: 10,
            mime_type: "application/pdf".to_string(),
            tags: vec![],
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let json = serde_json::to_value(WalletDocumentResponse {
            document: doc,
            download_url: Some("/v1/wallet/files/t".to_string()),
        })
        .unwrap();
        assert!(json.get("filePath").is_none());
        assert_eq!(json["walletType"], "personal");
        assert_eq!(json["downloadUrl"], "/v1/wallet/files/t");
    }
}
