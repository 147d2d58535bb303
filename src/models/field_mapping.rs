//! Field mapping entity model
//!
//! Binds one remote field code to one internal target field. `is_update_key`
//! marks fields used to match existing internal records during upsert.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::app_mapping::Entity as AppMapping;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "field_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub app_mapping_id: Uuid,

    pub field_code: String,

    /// Field type inferred from the schema cache at mapping creation time
    pub field_type: String,

    pub target_field: String,

    pub is_update_key: bool,

    pub sort_order: i32,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "AppMapping",
        from = "Column::AppMappingId",
        to = "super::app_mapping::Column::Id"
    )]
    AppMapping,
}

impl Related<AppMapping> for Entity {
    fn to() -> RelationDef {
        Relation::AppMapping.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
