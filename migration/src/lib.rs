//! Database migrations for the Casebridge connectors service.
//!
//! This module contains all database migrations using SeaORM Migration.

pub use sea_orm_migration::prelude::*;

mod m2026_05_10_090000_create_tenants;
mod m2026_05_10_091000_create_connectors;
mod m2026_05_10_092000_create_oauth_tables;
mod m2026_05_12_100000_create_remote_schema_cache;
mod m2026_05_14_110000_create_mappings;
mod m2026_05_16_120000_create_sync_logs;
mod m2026_05_16_121000_create_case_records;
mod m2026_05_18_130000_create_connector_audit_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m2026_05_10_090000_create_tenants::Migration),
            Box::new(m2026_05_10_091000_create_connectors::Migration),
            Box::new(m2026_05_10_092000_create_oauth_tables::Migration),
            Box::new(m2026_05_12_100000_create_remote_schema_cache::Migration),
            Box::new(m2026_05_14_110000_create_mappings::Migration),
            Box::new(m2026_05_16_120000_create_sync_logs::Migration),
            Box::new(m2026_05_16_121000_create_case_records::Migration),
            Box::new(m2026_05_18_130000_create_connector_audit_logs::Migration),
        ]
    }
}
