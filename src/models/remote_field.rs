//! Remote field entity model
//!
//! Cached field schema for a remote application, refreshed alongside the
//! application cache. The field type string is resolved into the typed
//! `RemoteFieldKind` union at read time by the mapping engine.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::connector::Entity as Connector;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "remote_fields")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub connector_id: Uuid,

    /// Provider-side application id this field belongs to
    pub app_id: String,

    pub field_code: String,

    pub label: String,

    /// Provider-reported field type string
    pub field_type: String,

    pub required: bool,

    /// Selection options for choice-like fields
    #[sea_orm(column_type = "JsonBinary")]
    pub options: Option<JsonValue>,

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
