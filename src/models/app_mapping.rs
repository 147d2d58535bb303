//! App mapping entity model
//!
//! Binds one remote application to one internal target entity type. Drafts
//! stay inactive until explicitly activated; only active mappings take part
//! in sync passes.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::connector::Entity as Connector;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "app_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub connector_id: Uuid,

    /// Provider-side application id
    pub remote_app_id: String,

    /// Internal target entity type, e.g. "people" or "visas"
    pub target_type: String,

    pub is_active: bool,

    /// Skip records whose update key matches no existing internal record
    pub skip_missing_update_target: bool,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Connector",
        from = "Column::ConnectorId",
        to = "super::connector::Column::Id"
    )]
    Connector,
}

impl Related<Connector> for Entity {
    fn to() -> RelationDef {
        Relation::Connector.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
