//! NomadCrew Database Layer
//!
//! Repositories for wallet document rows, the wallet audit log and the
//! trip-membership lookup used by the upload routes. Each repository is a
//! trait with a PostgreSQL implementation and an in-memory implementation for
//! tests and local runs.

pub mod db;

pub use db::{
    InMemoryTripMembership, InMemoryWalletAuditRepository, InMemoryWalletDocumentRepository,
    PgTripMembership, PgWalletAuditRepository, PgWalletDocumentRepository, TripMembership,
    WalletAuditRepository, WalletDocumentRepository,
};
