//! Connector repository
//!
//! Tenant-aware operations on connectors and their one-to-one encrypted
//! client secrets. Client credentials are encrypted before they reach this
//! layer and decrypted only at time of use.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::connector::{self, ConnectorStatus, Entity as Connector};
use crate::models::connector_secret::{self, Entity as ConnectorSecret};

/// Repository for connector database operations
#[derive(Clone)]
pub struct ConnectorRepository {
    db: Arc<DatabaseConnection>,
}

impl ConnectorRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a connector together with its encrypted client credentials in
    /// one transaction.
    pub async fn create_with_secrets(
        &self,
        tenant_id: Uuid,
        provider: &str,
        display_name: &str,
        config: Option<serde_json::Value>,
        scopes: Option<serde_json::Value>,
        credentials_ciphertext: &str,
    ) -> Result<connector::Model> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let txn = self.db.begin().await?;

        let row = connector::ActiveModel {
            id: Set(id),
            tenant_id: Set(tenant_id),
            provider: Set(provider.to_string()),
            display_name: Set(display_name.to_string()),
            config: Set(config),
            scopes: Set(scopes),
            status: Set(ConnectorStatus::Disconnected.as_str().to_string()),
            error_message: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        row.insert(&txn).await?;

        let secret = connector_secret::ActiveModel {
            connector_id: Set(id),
            credentials_ciphertext: Set(credentials_ciphertext.to_string()),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        secret.insert(&txn).await?;

        txn.commit().await?;

        self.get_by_id(id)
            .await?
            .ok_or_else(|| anyhow!("connector not persisted"))
    }

    /// Find a connector by id within a tenant scope.
    pub async fn find_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> Result<Option<connector::Model>> {
        Ok(Connector::find_by_id(id)
            .filter(connector::Column::TenantId.eq(tenant_id))
            .one(&*self.db)
            .await?)
    }

    /// Retrieve a connector by id without tenant scoping (internal callers).
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<connector::Model>> {
        Ok(Connector::find_by_id(id).one(&*self.db).await?)
    }

    /// List connectors for a tenant ordered by creation time then id.
    pub async fn find_by_tenant(&self, tenant_id: Uuid) -> Result<Vec<connector::Model>> {
        Ok(Connector::find()
            .filter(connector::Column::TenantId.eq(tenant_id))
            .order_by_asc(connector::Column::CreatedAt)
            .order_by_asc(connector::Column::Id)
            .all(&*self.db)
            .await?)
    }

    /// Load the encrypted client credentials for a connector.
    pub async fn get_secrets(&self, connector_id: Uuid) -> Result<Option<connector_secret::Model>> {
        Ok(ConnectorSecret::find_by_id(connector_id)
            .one(&*self.db)
            .await?)
    }

    /// Transition connector status, clearing or setting the error message.
    /// Exactly one status value is live at a time.
    pub async fn set_status(
        &self,
        connector_id: Uuid,
        status: ConnectorStatus,
        error_message: Option<String>,
    ) -> Result<connector::Model> {
        let updated = connector::ActiveModel {
            id: Set(connector_id),
            status: Set(status.as_str().to_string()),
            error_message: Set(error_message),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        updated.update(&*self.db).await?;

        self.get_by_id(connector_id)
            .await?
            .ok_or_else(|| anyhow!("connector disappeared during status update"))
    }

    /// Store the scopes granted by the provider at token exchange time.
    pub async fn set_granted_scopes(
        &self,
        connector_id: Uuid,
        scopes: Option<serde_json::Value>,
    ) -> Result<()> {
        let updated = connector::ActiveModel {
            id: Set(connector_id),
            scopes: Set(scopes),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        updated.update(&*self.db).await?;
        Ok(())
    }

    /// Delete a connector. Dependent rows cascade via foreign keys.
    pub async fn delete(&self, tenant_id: Uuid, id: Uuid) -> Result<bool> {
        let result = Connector::delete_many()
            .filter(connector::Column::Id.eq(id))
            .filter(connector::Column::TenantId.eq(tenant_id))
            .exec(&*self.db)
            .await?;
        Ok(result.rows_affected > 0)
    }
}
