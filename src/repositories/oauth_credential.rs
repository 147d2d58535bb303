//! OAuth credential repository
//!
//! Maintains the single active credentials row per connector. Replacement is
//! strict delete-then-insert inside a transaction, never an in-place update,
//! so no reader can observe a partially encrypted row.

use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::oauth_credential::{self, Entity as OAuthCredential};

/// New credential content produced by a token exchange or refresh.
#[derive(Debug, Clone)]
pub struct NewCredentials {
    pub access_token_ciphertext: String,
    pub refresh_token_ciphertext: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub token_type: String,
    pub raw_response: Option<serde_json::Value>,
}

/// Repository for OAuth credential rows.
#[derive(Clone)]
pub struct OAuthCredentialRepository {
    db: Arc<DatabaseConnection>,
}

impl OAuthCredentialRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Load the active credentials row for a connector.
    pub async fn find_by_connector(
        &self,
        connector_id: Uuid,
    ) -> Result<Option<oauth_credential::Model>> {
        Ok(OAuthCredential::find()
            .filter(oauth_credential::Column::ConnectorId.eq(connector_id))
            .one(&*self.db)
            .await?)
    }

    /// Replace the credentials row wholesale: delete the old row, insert the
    /// new one, in a single transaction. Only called after a successful
    /// exchange or refresh.
    pub async fn replace(
        &self,
        connector_id: Uuid,
        new: NewCredentials,
    ) -> Result<oauth_credential::Model> {
        let id = Uuid::new_v4();

        let txn = self.db.begin().await?;

        OAuthCredential::delete_many()
            .filter(oauth_credential::Column::ConnectorId.eq(connector_id))
            .exec(&txn)
            .await?;

        let row = oauth_credential::ActiveModel {
            id: Set(id),
            connector_id: Set(connector_id),
            access_token_ciphertext: Set(new.access_token_ciphertext),
            refresh_token_ciphertext: Set(new.refresh_token_ciphertext),
            expires_at: Set(new.expires_at.into()),
            token_type: Set(new.token_type),
            raw_response: Set(new.raw_response),
            created_at: Set(Utc::now().into()),
        };
        row.insert(&txn).await?;

        txn.commit().await?;

        OAuthCredential::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("credentials row not persisted"))
    }

    /// Drop stored credentials for a connector (disconnect).
    pub async fn delete_by_connector(&self, connector_id: Uuid) -> Result<u64> {
        let result = OAuthCredential::delete_many()
            .filter(oauth_credential::Column::ConnectorId.eq(connector_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected)
    }
}
