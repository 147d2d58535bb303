//! OAuth state entity model
//!
//! Server-side single-use store for pending authorization attempts: holds the
//! PKCE code verifier keyed by the signed state token. Consumed on first
//! callback; a missing row on callback is the terminal "missing verifier"
//! protocol error.

use sea_orm::ActiveModelBehavior;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "oauth_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub tenant_id: Uuid,

    pub connector_id: Uuid,

    /// Provider slug the flow was started for
    pub provider: String,

    /// Signed state token issued to the browser
    pub state: String,

    /// PKCE code verifier held until the callback arrives
    pub code_verifier: String,

    pub expires_at: chrono::DateTime<chrono::Utc>,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
