//! Connector audit log repository

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::connector_audit_log::{self, Entity as ConnectorAuditLog};

/// Audit event names persisted for connectors.
pub mod events {
    pub const STATUS_CHANGED: &str = "status_changed";
    pub const TOKEN_EXCHANGE_FAILED: &str = "token_exchange_failed";
    pub const TOKEN_REFRESHED: &str = "token_refreshed";
    pub const TOKEN_REFRESH_FAILED: &str = "token_refresh_failed";
}

/// Repository for connector audit log rows.
#[derive(Clone)]
pub struct AuditLogRepository {
    db: Arc<DatabaseConnection>,
}

impl AuditLogRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append one audit entry.
    pub async fn record(
        &self,
        connector_id: Uuid,
        event: &str,
        detail: Option<serde_json::Value>,
    ) -> Result<()> {
        let row = connector_audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            connector_id: Set(connector_id),
            event: Set(event.to_string()),
            detail: Set(detail),
            created_at: Set(Utc::now().into()),
        };
        row.insert(&*self.db).await?;
        Ok(())
    }

    /// List entries for a connector, newest first.
    pub async fn list_for_connector(
        &self,
        connector_id: Uuid,
        limit: u64,
    ) -> Result<Vec<connector_audit_log::Model>> {
        Ok(ConnectorAuditLog::find()
            .filter(connector_audit_log::Column::ConnectorId.eq(connector_id))
            .order_by_desc(connector_audit_log::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }
}
