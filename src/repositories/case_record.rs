//! Case record repository
//!
//! Upsert store for synchronized records, keyed by the deterministic
//! `{provider}:{remote_id}` source key so repeated sync passes do not
//! duplicate rows.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::case_record::{self, Entity as CaseRecord};

/// Repository for internal case records.
#[derive(Clone)]
pub struct CaseRecordRepository {
    db: Arc<DatabaseConnection>,
}

impl CaseRecordRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find one record by its unique `(tenant, target_type, source_key)`.
    pub async fn find_by_source_key(
        &self,
        tenant_id: Uuid,
        target_type: &str,
        source_key: &str,
    ) -> Result<Option<case_record::Model>> {
        Ok(CaseRecord::find()
            .filter(case_record::Column::TenantId.eq(tenant_id))
            .filter(case_record::Column::TargetType.eq(target_type))
            .filter(case_record::Column::SourceKey.eq(source_key))
            .one(&*self.db)
            .await?)
    }

    /// Insert or update by source key; re-runs against unchanged data leave
    /// the row set identical.
    pub async fn upsert(
        &self,
        tenant_id: Uuid,
        connector_id: Uuid,
        target_type: &str,
        source_key: &str,
        data: serde_json::Value,
    ) -> Result<case_record::Model> {
        let now = Utc::now();

        if let Some(existing) = self
            .find_by_source_key(tenant_id, target_type, source_key)
            .await?
        {
            let updated = case_record::ActiveModel {
                id: Set(existing.id),
                data: Set(data),
                updated_at: Set(now.into()),
                ..Default::default()
            };
            updated.update(&*self.db).await?;

            return CaseRecord::find_by_id(existing.id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| anyhow!("case record disappeared during update"));
        }

        let id = Uuid::new_v4();
        let row = case_record::ActiveModel {
            id: Set(id),
            tenant_id: Set(tenant_id),
            connector_id: Set(connector_id),
            target_type: Set(target_type.to_string()),
            source_key: Set(source_key.to_string()),
            data: Set(data),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        row.insert(&*self.db).await?;

        CaseRecord::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("case record not persisted"))
    }

    /// Adopt an existing record matched by update-key fields: attach the
    /// source key and replace its data.
    pub async fn adopt(
        &self,
        record_id: Uuid,
        source_key: &str,
        data: serde_json::Value,
    ) -> Result<case_record::Model> {
        let updated = case_record::ActiveModel {
            id: Set(record_id),
            source_key: Set(source_key.to_string()),
            data: Set(data),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        updated.update(&*self.db).await?;

        CaseRecord::find_by_id(record_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("case record disappeared during adoption"))
    }

    /// List records of one target type for a tenant.
    pub async fn list_by_target(
        &self,
        tenant_id: Uuid,
        target_type: &str,
    ) -> Result<Vec<case_record::Model>> {
        Ok(CaseRecord::find()
            .filter(case_record::Column::TenantId.eq(tenant_id))
            .filter(case_record::Column::TargetType.eq(target_type))
            .all(&*self.db)
            .await?)
    }

    /// Count records of one target type for a tenant.
    pub async fn count_by_target(&self, tenant_id: Uuid, target_type: &str) -> Result<u64> {
        Ok(CaseRecord::find()
            .filter(case_record::Column::TenantId.eq(tenant_id))
            .filter(case_record::Column::TargetType.eq(target_type))
            .count(&*self.db)
            .await?)
    }
}
