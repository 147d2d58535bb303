//! Tenant repository

use anyhow::Result;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::tenant::{ActiveModel, Entity as Tenant, Model};

/// Repository for tenant rows.
pub struct TenantRepository {
    db: Arc<DatabaseConnection>,
}

impl TenantRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Model>> {
        Ok(Tenant::find_by_id(id).one(&*self.db).await?)
    }

    /// Insert the tenant row if it does not exist yet.
    pub async fn ensure(&self, id: Uuid) -> Result<Model> {
        if let Some(existing) = self.find_by_id(id).await? {
            return Ok(existing);
        }

        let row = ActiveModel {
            id: Set(id),
            name: Set(None),
            created_at: Set(Utc::now().into()),
        };
        row.insert(&*self.db).await?;

        Tenant::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("tenant row not persisted"))
    }
}
