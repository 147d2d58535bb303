//! Sync session repository
//!
//! Session rows are created at sync start and closed exactly once with final
//! counts. Item logs are written per record for manual runs only.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::sync_item_log::{self, Entity as SyncItemLog};
use crate::models::sync_session::{self, Entity as SyncSession};

/// Trigger kind for a sync pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    Manual,
    Scheduled,
}

impl SyncTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncTrigger::Manual => "manual",
            SyncTrigger::Scheduled => "scheduled",
        }
    }
}

/// Final status of a sync session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    Success,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Running => "running",
            SessionStatus::Success => "success",
            SessionStatus::Failed => "failed",
        }
    }
}

/// Repository for sync sessions and item logs.
#[derive(Clone)]
pub struct SyncSessionRepository {
    db: Arc<DatabaseConnection>,
}

impl SyncSessionRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Open a session with status `running`.
    pub async fn open(
        &self,
        connector_id: Uuid,
        trigger: SyncTrigger,
    ) -> Result<sync_session::Model> {
        let id = Uuid::new_v4();

        let row = sync_session::ActiveModel {
            id: Set(id),
            connector_id: Set(connector_id),
            sync_type: Set(trigger.as_str().to_string()),
            status: Set(SessionStatus::Running.as_str().to_string()),
            started_at: Set(Utc::now().into()),
            finished_at: Set(None),
            total_count: Set(0),
            success_count: Set(0),
            failed_count: Set(0),
            error_message: Set(None),
        };
        row.insert(&*self.db).await?;

        SyncSession::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("sync session not persisted"))
    }

    /// Close a session exactly once with its final counts and status.
    pub async fn close(
        &self,
        session_id: Uuid,
        status: SessionStatus,
        total: i32,
        success: i32,
        failed: i32,
        error_message: Option<String>,
    ) -> Result<sync_session::Model> {
        let updated = sync_session::ActiveModel {
            id: Set(session_id),
            status: Set(status.as_str().to_string()),
            finished_at: Set(Some(Utc::now().into())),
            total_count: Set(total),
            success_count: Set(success),
            failed_count: Set(failed),
            error_message: Set(error_message),
            ..Default::default()
        };
        updated.update(&*self.db).await?;

        SyncSession::find_by_id(session_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("sync session disappeared during close"))
    }

    pub async fn get(&self, session_id: Uuid) -> Result<Option<sync_session::Model>> {
        Ok(SyncSession::find_by_id(session_id).one(&*self.db).await?)
    }

    /// List sessions for a connector, newest first.
    pub async fn list_for_connector(
        &self,
        connector_id: Uuid,
        limit: u64,
    ) -> Result<Vec<sync_session::Model>> {
        use sea_orm::QuerySelect;

        Ok(SyncSession::find()
            .filter(sync_session::Column::ConnectorId.eq(connector_id))
            .order_by_desc(sync_session::Column::StartedAt)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    /// Record one per-record outcome under a session.
    pub async fn log_item(
        &self,
        session_id: Uuid,
        target_type: &str,
        remote_id: &str,
        status: &str,
        error_message: Option<String>,
    ) -> Result<()> {
        let row = sync_item_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            session_id: Set(session_id),
            target_type: Set(target_type.to_string()),
            remote_id: Set(remote_id.to_string()),
            status: Set(status.to_string()),
            error_message: Set(error_message),
            created_at: Set(Utc::now().into()),
        };
        row.insert(&*self.db).await?;
        Ok(())
    }

    /// List item logs for a session in insertion order.
    pub async fn list_items(&self, session_id: Uuid) -> Result<Vec<sync_item_log::Model>> {
        Ok(SyncItemLog::find()
            .filter(sync_item_log::Column::SessionId.eq(session_id))
            .order_by_asc(sync_item_log::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}
