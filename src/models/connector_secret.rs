//! Connector secret entity model
//!
//! One-to-one with a connector; holds the encrypted OAuth client credentials.
//! The ciphertext is only ever decrypted server-side at time of use.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use uuid::Uuid;

use super::connector::Entity as Connector;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "connector_secrets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub connector_id: Uuid,

    /// Vault-encrypted JSON object `{client_id, client_secret}`
    pub credentials_ciphertext: String,

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
