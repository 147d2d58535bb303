//! # Repositories
//!
//! Database access layer. Each repository wraps SeaORM operations for one
//! aggregate and is constructed with an explicit `Arc<DatabaseConnection>` so
//! tests can inject their own store.

pub mod audit_log;
pub mod case_record;
pub mod connector;
pub mod mapping;
pub mod oauth_credential;
pub mod oauth_state;
pub mod remote_schema;
pub mod sync_session;
pub mod tenant;

pub use audit_log::AuditLogRepository;
pub use case_record::CaseRecordRepository;
pub use connector::ConnectorRepository;
pub use mapping::MappingRepository;
pub use oauth_credential::OAuthCredentialRepository;
pub use oauth_state::OAuthStateRepository;
pub use remote_schema::RemoteSchemaRepository;
pub use sync_session::SyncSessionRepository;
pub use tenant::TenantRepository;
