//! Database repositories for the upload pipeline

pub mod trip_membership;
pub mod wallet_audit;
pub mod wallet_document;

pub use trip_membership::{InMemoryTripMembership, PgTripMembership, TripMembership};
pub use wallet_audit::{
    InMemoryWalletAuditRepository, PgWalletAuditRepository, WalletAuditRepository,
};
pub use wallet_document::{
    InMemoryWalletDocumentRepository, PgWalletDocumentRepository, WalletDocumentRepository,
};
