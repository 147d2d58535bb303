//! Sync item log entity model
//!
//! Per-record outcome scoped to a sync session. Written for manual runs only
//! to bound log volume on scheduled jobs.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::sync_session::Entity as SyncSession;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "sync_item_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub session_id: Uuid,

    pub target_type: String,

    pub remote_id: String,

    /// Item outcome: success|failed
    pub status: String,

    pub error_message: Option<String>,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "SyncSession",
        from = "Column::SessionId",
        to = "super::sync_session::Column::Id"
    )]
    SyncSession,
}

impl Related<SyncSession> for Entity {
    fn to() -> RelationDef {
        Relation::SyncSession.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
