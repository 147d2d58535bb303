//! OAuth credential entity model
//!
//! One active row per connector. The row is replaced wholesale on every
//! refresh (delete then insert, never an in-place update) so a concurrent
//! reader can never observe a partially encrypted row.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use sea_orm::prelude::DateTimeWithTimeZone;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use super::connector::Entity as Connector;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "oauth_credentials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub connector_id: Uuid,

    /// Vault-encrypted access token
    pub access_token_ciphertext: String,

    /// Vault-encrypted refresh token, absent for providers that do not issue one
    pub refresh_token_ciphertext: Option<String>,

    /// Wall-clock expiry of the access token
    pub expires_at: DateTimeWithTimeZone,

    /// Token type as reported by the provider, normally `Bearer`
    pub token_type: String,

    /// Raw provider token payload with token fields redacted; diagnostics only
    #[sea_orm(column_type = "JsonBinary")]
    pub raw_response: Option<JsonValue>,

    pub created_at: DateTimeWithTimeZone,
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
