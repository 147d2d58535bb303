//! Mapping repository
//!
//! App, field and value mapping storage. Field mappings and value rules are
//! replaced as ordered sets; value rules keep their explicit sort order so
//! the engine's first-match-wins scan is deterministic.

use anyhow::{Result, anyhow};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::mapping::{FieldMappingSpec, RemoteFieldKind, TargetType, ValueRule};
use crate::models::app_mapping::{self, Entity as AppMapping};
use crate::models::field_mapping::{self, Entity as FieldMapping};
use crate::models::value_mapping::{self, Entity as ValueMapping};

/// New field mapping entry, already type-inferred.
#[derive(Debug, Clone)]
pub struct NewFieldMapping {
    pub field_code: String,
    pub field_type: String,
    pub target_field: String,
    pub is_update_key: bool,
}

/// New value mapping rule.
#[derive(Debug, Clone)]
pub struct NewValueRule {
    pub source_value: String,
    pub target_value: String,
    pub is_active: bool,
}

/// Repository for mapping configuration.
#[derive(Clone)]
pub struct MappingRepository {
    db: Arc<DatabaseConnection>,
}

impl MappingRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Create a draft app mapping (`is_active = false` until activated).
    pub async fn create_app_mapping(
        &self,
        connector_id: Uuid,
        remote_app_id: &str,
        target_type: TargetType,
        skip_missing_update_target: bool,
    ) -> Result<app_mapping::Model> {
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = app_mapping::ActiveModel {
            id: Set(id),
            connector_id: Set(connector_id),
            remote_app_id: Set(remote_app_id.to_string()),
            target_type: Set(target_type.as_str().to_string()),
            is_active: Set(false),
            skip_missing_update_target: Set(skip_missing_update_target),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        row.insert(&*self.db).await?;

        AppMapping::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("app mapping not persisted"))
    }

    pub async fn get_app_mapping(&self, id: Uuid) -> Result<Option<app_mapping::Model>> {
        Ok(AppMapping::find_by_id(id).one(&*self.db).await?)
    }

    /// Flip a draft mapping active.
    pub async fn activate_app_mapping(&self, id: Uuid) -> Result<app_mapping::Model> {
        let updated = app_mapping::ActiveModel {
            id: Set(id),
            is_active: Set(true),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };
        updated.update(&*self.db).await?;

        AppMapping::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow!("app mapping disappeared during activation"))
    }

    /// List all app mappings for a connector.
    pub async fn list_for_connector(&self, connector_id: Uuid) -> Result<Vec<app_mapping::Model>> {
        Ok(AppMapping::find()
            .filter(app_mapping::Column::ConnectorId.eq(connector_id))
            .order_by_asc(app_mapping::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// List active app mappings, optionally filtered to one target type.
    pub async fn find_active(
        &self,
        connector_id: Uuid,
        target_type: Option<TargetType>,
    ) -> Result<Vec<app_mapping::Model>> {
        let mut query = AppMapping::find()
            .filter(app_mapping::Column::ConnectorId.eq(connector_id))
            .filter(app_mapping::Column::IsActive.eq(true));

        if let Some(target) = target_type {
            query = query.filter(app_mapping::Column::TargetType.eq(target.as_str()));
        }

        Ok(query
            .order_by_asc(app_mapping::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }

    /// Replace the field mappings of an app mapping as one ordered set.
    pub async fn replace_field_mappings(
        &self,
        app_mapping_id: Uuid,
        entries: &[NewFieldMapping],
    ) -> Result<usize> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        FieldMapping::delete_many()
            .filter(field_mapping::Column::AppMappingId.eq(app_mapping_id))
            .exec(&txn)
            .await?;

        for (index, entry) in entries.iter().enumerate() {
            let row = field_mapping::ActiveModel {
                id: Set(Uuid::new_v4()),
                app_mapping_id: Set(app_mapping_id),
                field_code: Set(entry.field_code.clone()),
                field_type: Set(entry.field_type.clone()),
                target_field: Set(entry.target_field.clone()),
                is_update_key: Set(entry.is_update_key),
                sort_order: Set(index as i32),
                created_at: Set(now.into()),
            };
            row.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(entries.len())
    }

    /// Replace the value rules for one internal field of an app mapping,
    /// preserving submission order as sort order.
    pub async fn replace_value_rules(
        &self,
        app_mapping_id: Uuid,
        target_field: &str,
        rules: &[NewValueRule],
    ) -> Result<usize> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        ValueMapping::delete_many()
            .filter(value_mapping::Column::AppMappingId.eq(app_mapping_id))
            .filter(value_mapping::Column::TargetField.eq(target_field))
            .exec(&txn)
            .await?;

        for (index, rule) in rules.iter().enumerate() {
            let row = value_mapping::ActiveModel {
                id: Set(Uuid::new_v4()),
                app_mapping_id: Set(app_mapping_id),
                target_field: Set(target_field.to_string()),
                source_value: Set(rule.source_value.clone()),
                target_value: Set(rule.target_value.clone()),
                is_active: Set(rule.is_active),
                sort_order: Set(index as i32),
                created_at: Set(now.into()),
            };
            row.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(rules.len())
    }

    /// Load the field mappings of an app mapping with their value rules,
    /// ready for the mapping engine. Rules come back ordered by sort order;
    /// inactive rules are included and excluded by the engine's scan.
    pub async fn load_field_specs(&self, app_mapping_id: Uuid) -> Result<Vec<FieldMappingSpec>> {
        let fields = FieldMapping::find()
            .filter(field_mapping::Column::AppMappingId.eq(app_mapping_id))
            .order_by_asc(field_mapping::Column::SortOrder)
            .all(&*self.db)
            .await?;

        let rules = ValueMapping::find()
            .filter(value_mapping::Column::AppMappingId.eq(app_mapping_id))
            .order_by_asc(value_mapping::Column::SortOrder)
            .all(&*self.db)
            .await?;

        Ok(fields
            .into_iter()
            .map(|field| {
                let field_rules = rules
                    .iter()
                    .filter(|rule| rule.target_field == field.target_field)
                    .map(|rule| ValueRule {
                        source: rule.source_value.clone(),
                        target: rule.target_value.clone(),
                        is_active: rule.is_active,
                        sort_order: rule.sort_order,
                    })
                    .collect();

                FieldMappingSpec {
                    field_code: field.field_code,
                    target_field: field.target_field,
                    kind: RemoteFieldKind::from_remote(&field.field_type),
                    is_update_key: field.is_update_key,
                    rules: field_rules,
                }
            })
            .collect())
    }
}
