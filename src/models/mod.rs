//! # Data Models
//!
//! This module contains the SeaORM entity models for the connector subsystem.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod app_mapping;
pub mod case_record;
pub mod connector;
pub mod connector_audit_log;
pub mod connector_secret;
pub mod field_mapping;
pub mod oauth_credential;
pub mod oauth_state;
pub mod remote_app;
pub mod remote_field;
pub mod sync_item_log;
pub mod sync_session;
pub mod tenant;
pub mod value_mapping;

pub use app_mapping::Entity as AppMapping;
pub use case_record::Entity as CaseRecord;
pub use connector::Entity as Connector;
pub use connector_audit_log::Entity as ConnectorAuditLog;
pub use connector_secret::Entity as ConnectorSecret;
pub use field_mapping::Entity as FieldMapping;
pub use oauth_credential::Entity as OAuthCredential;
pub use oauth_state::Entity as OAuthState;
pub use remote_app::Entity as RemoteApp;
pub use remote_field::Entity as RemoteField;
pub use sync_item_log::Entity as SyncItemLog;
pub use sync_session::Entity as SyncSession;
pub use tenant::Entity as Tenant;
pub use value_mapping::Entity as ValueMapping;

/// Basic service information response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    /// The name of the service
    pub service: String,
    /// The version of the service
    pub version: String,
}

impl Default for ServiceInfo {
    fn default() -> Self {
        Self {
            service: "casebridge".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
