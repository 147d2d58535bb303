//! OAuth state repository
//!
//! Single-use server-side store for pending authorization attempts. The row
//! holds the PKCE code verifier keyed by the signed state token and is
//! deleted on first retrieval to prevent replay.

use anyhow::{Result, anyhow};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::oauth_state::{self, ActiveModel, Entity, Model};

/// Repository for OAuth state database operations
pub struct OAuthStateRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthStateRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Persist a new pending authorization attempt.
    pub async fn create(
        &self,
        tenant_id: Uuid,
        connector_id: Uuid,
        provider: &str,
        state: &str,
        code_verifier: &str,
        expires_in_minutes: i64,
    ) -> Result<Model> {
        let now = Utc::now();
        let id = Uuid::new_v4();

        let row = ActiveModel {
            id: Set(id),
            tenant_id: Set(tenant_id),
            connector_id: Set(connector_id),
            provider: Set(provider.to_string()),
            state: Set(state.to_string()),
            code_verifier: Set(code_verifier.to_string()),
            expires_at: Set(now + Duration::minutes(expires_in_minutes)),
            created_at: Set(now),
        };
        row.insert(&*self.db).await?;

        Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("oauth state not persisted"))
    }

    /// Find an unexpired state row and consume it (delete after retrieval).
    ///
    /// Returns `None` for an unknown, expired or already-consumed state —
    /// the terminal "missing verifier" condition at the callback.
    pub async fn find_and_consume(&self, state: &str) -> Result<Option<Model>> {
        let row = Entity::find()
            .filter(oauth_state::Column::State.eq(state))
            .filter(oauth_state::Column::ExpiresAt.gt(Utc::now()))
            .one(&*self.db)
            .await?;

        if let Some(ref model) = row {
            Entity::delete_by_id(model.id).exec(&*self.db).await?;
        }

        Ok(row)
    }

    /// Clean up expired states.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = Entity::delete_many()
            .filter(oauth_state::Column::ExpiresAt.lt(Utc::now()))
            .exec(&*self.db)
            .await?;

        Ok(result.rows_affected)
    }
}
