//! Value mapping entity model
//!
//! One substitution rule (source value -> target value) scoped to an app
//! mapping and internal field name. Rule order is significant: the engine
//! scans active rules by sort order and the first match wins.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::app_mapping::Entity as AppMapping;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "value_mappings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub app_mapping_id: Uuid,

    /// Internal field name the rule applies to
    pub target_field: String,

    pub source_value: String,

    pub target_value: String,

    pub is_active: bool,

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
