//! Remote schema cache repository
//!
//! Read-through cache of provider application and field schemas, refreshed
//! wholesale by explicit sync actions.

use anyhow::Result;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::remote_app::{self, Entity as RemoteApp};
use crate::models::remote_field::{self, Entity as RemoteField};
use crate::remote::{RemoteAppInfo, RemoteFieldInfo};

/// Repository for the cached remote schema.
#[derive(Clone)]
pub struct RemoteSchemaRepository {
    db: Arc<DatabaseConnection>,
}

impl RemoteSchemaRepository {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Replace the cached application list for a connector.
    pub async fn replace_apps(
        &self,
        connector_id: Uuid,
        apps: &[RemoteAppInfo],
    ) -> Result<usize> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        RemoteApp::delete_many()
            .filter(remote_app::Column::ConnectorId.eq(connector_id))
            .exec(&txn)
            .await?;

        for app in apps {
            let row = remote_app::ActiveModel {
                id: Set(Uuid::new_v4()),
                connector_id: Set(connector_id),
                app_id: Set(app.app_id.clone()),
                code: Set(app.code.clone()),
                name: Set(app.name.clone()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            row.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(apps.len())
    }

    /// Replace the cached field schema for one application.
    pub async fn replace_fields(
        &self,
        connector_id: Uuid,
        app_id: &str,
        fields: &[RemoteFieldInfo],
    ) -> Result<usize> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        RemoteField::delete_many()
            .filter(remote_field::Column::ConnectorId.eq(connector_id))
            .filter(remote_field::Column::AppId.eq(app_id))
            .exec(&txn)
            .await?;

        for field in fields {
            let row = remote_field::ActiveModel {
                id: Set(Uuid::new_v4()),
                connector_id: Set(connector_id),
                app_id: Set(app_id.to_string()),
                field_code: Set(field.code.clone()),
                label: Set(field.label.clone()),
                field_type: Set(field.field_type.clone()),
                required: Set(field.required),
                options: Set(field.options.clone()),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            };
            row.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(fields.len())
    }

    /// List cached applications for a connector.
    pub async fn list_apps(&self, connector_id: Uuid) -> Result<Vec<remote_app::Model>> {
        Ok(RemoteApp::find()
            .filter(remote_app::Column::ConnectorId.eq(connector_id))
            .order_by_asc(remote_app::Column::AppId)
            .all(&*self.db)
            .await?)
    }

    /// List cached fields for one application.
    pub async fn list_fields(
        &self,
        connector_id: Uuid,
        app_id: &str,
    ) -> Result<Vec<remote_field::Model>> {
        Ok(RemoteField::find()
            .filter(remote_field::Column::ConnectorId.eq(connector_id))
            .filter(remote_field::Column::AppId.eq(app_id))
            .order_by_asc(remote_field::Column::FieldCode)
            .all(&*self.db)
            .await?)
    }
}
