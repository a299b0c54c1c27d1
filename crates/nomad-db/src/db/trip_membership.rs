use std::collections::HashSet;
use std::sync::RwLock;

use nomad_core::AppError;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

/// Narrow query interface onto trip membership
#[async_trait::async_trait]
pub trait TripMembership: Send + Sync {
    /// Whether `user_id` is an active member of `trip_id`
    async fn is_member(&self, trip_id: Uuid, user_id: &str) -> Result<bool, AppError>;
}

/// PostgreSQL trip membership lookup
#[derive(Clone)]
pub struct PgTripMembership {
    pool: PgPool,
}

impl PgTripMembership {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl TripMembership for PgTripMembership {
    #[tracing::instrument(skip(self), fields(db.table = "trip_memberships", db.operation = "select"))]
    async fn is_member(&self, trip_id: Uuid, user_id: &str) -> Result<bool, AppError> {
        let is_member = sqlx::query_scalar::<Postgres, bool>(
            "SELECT EXISTS(SELECT 1 FROM trip_memberships \
             WHERE trip_id = $1 AND user_id = $2 AND status = 'ACTIVE')",
        )
        .bind(trip_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(is_member)
    }
}

/// In-memory trip membership set
#[derive(Default)]
pub struct InMemoryTripMembership {
    members: RwLock<HashSet<(Uuid, String)>>,
}

impl InMemoryTripMembership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_member(&self, trip_id: Uuid, user_id: &str) {
        if let Ok(mut members) = self.members.write() {
            members.insert((trip_id, user_id.to_string()));
        }
    }
}

#[async_trait::async_trait]
impl TripMembership for InMemoryTripMembership {
    async fn is_member(&self, trip_id: Uuid, user_id: &str) -> Result<bool, AppError> {
        let members = self
            .members
            .read()
            .map_err(|_| AppError::Internal("membership store poisoned".to_string()))?;
        Ok(members.contains(&(trip_id, user_id.to_string())))
    }
}
