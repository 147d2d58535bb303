//! # Sync Orchestrator
//!
//! Runs a full or type-scoped sync pass for a connector: ensure a valid
//! token, fetch remote records, map them through the configured field and
//! value mappings, and upsert into the internal store under a deterministic
//! provider-prefixed source key.
//!
//! Per-record failures are isolated: one record's transform or persistence
//! error is counted and (for manual runs) item-logged without aborting the
//! batch. The session row is closed exactly once with final counts. A
//! failure before any per-record loop closes the session as failed and flips
//! the connector to the error status.

use metrics::counter;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::locks::ConnectorLocks;
use crate::mapping::{self, FieldMappingSpec, TargetType, UnknownTargetType};
use crate::models::app_mapping;
use crate::models::case_record;
use crate::models::connector::ConnectorStatus;
use crate::providers::ProviderKind;
use crate::remote::{RemoteApiError, RemoteClient, RemoteRecord};
use crate::repositories::audit_log::events;
use crate::repositories::sync_session::{SessionStatus, SyncTrigger};
use crate::repositories::{
    AuditLogRepository, CaseRecordRepository, ConnectorRepository, MappingRepository,
    SyncSessionRepository,
};
use crate::tokens::{TokenError, TokenLifecycleManager};

/// Errors that abort a sync pass before or between per-record loops.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("a sync for connector {connector_id} is already running")]
    InProgress { connector_id: Uuid },
    #[error("connector {connector_id} not found")]
    ConnectorNotFound { connector_id: Uuid },
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Remote(#[from] RemoteApiError),
    #[error(transparent)]
    TargetType(#[from] UnknownTargetType),
    #[error(transparent)]
    Provider(#[from] crate::providers::ProviderError),
    #[error("storage error: {0}")]
    Db(String),
}

impl From<anyhow::Error> for SyncError {
    fn from(error: anyhow::Error) -> Self {
        SyncError::Db(error.to_string())
    }
}

/// Per-target-type record counts.
#[derive(Debug, Clone, Default, Serialize, utoipa::ToSchema, PartialEq, Eq)]
pub struct TypeCounts {
    pub total: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
}

/// Result of one sync pass.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct SyncReport {
    pub session_id: Uuid,
    pub success: bool,
    pub total: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub counts_by_type: BTreeMap<String, TypeCounts>,
    pub errors: Vec<String>,
    pub duration_ms: u64,
}

#[derive(Debug)]
enum RecordOutcome {
    Upserted,
    /// Update-key matching found no target and the mapping opts to skip
    Skipped,
}

#[derive(Default)]
struct Tally {
    total: i32,
    succeeded: i32,
    failed: i32,
    skipped: i32,
    by_type: BTreeMap<String, TypeCounts>,
    errors: Vec<String>,
}

/// Sync orchestrator and logger.
pub struct SyncOrchestrator {
    tokens: Arc<TokenLifecycleManager>,
    connectors: ConnectorRepository,
    mappings: MappingRepository,
    sessions: SyncSessionRepository,
    case_records: CaseRecordRepository,
    audit: AuditLogRepository,
    locks: ConnectorLocks,
}

impl SyncOrchestrator {
    pub fn new(
        tokens: Arc<TokenLifecycleManager>,
        connectors: ConnectorRepository,
        mappings: MappingRepository,
        sessions: SyncSessionRepository,
        case_records: CaseRecordRepository,
        audit: AuditLogRepository,
        locks: ConnectorLocks,
    ) -> Self {
        Self {
            tokens,
            connectors,
            mappings,
            sessions,
            case_records,
            audit,
            locks,
        }
    }

    /// Run one sync pass for a connector, optionally scoped to a single
    /// target entity type.
    #[instrument(skip_all, fields(connector_id = %connector_id, trigger = trigger.as_str()))]
    pub async fn sync_all(
        &self,
        connector_id: Uuid,
        target_type: Option<TargetType>,
        trigger: SyncTrigger,
    ) -> Result<SyncReport, SyncError> {
        // Per-connector advisory lock: concurrent triggers for the same
        // connector conflict instead of racing the credentials row.
        let _guard = self
            .locks
            .try_acquire(connector_id)
            .ok_or(SyncError::InProgress { connector_id })?;

        let started = Instant::now();
        let session = self.sessions.open(connector_id, trigger).await?;
        counter!("sync_sessions_total").increment(1);

        info!(session_id = %session.id, "Sync session opened");

        let mut tally = Tally::default();
        match self
            .run_pass(connector_id, target_type, trigger, session.id, &mut tally)
            .await
        {
            Ok(()) => {
                let status = if tally.failed == 0 {
                    SessionStatus::Success
                } else {
                    SessionStatus::Failed
                };

                self.sessions
                    .close(
                        session.id,
                        status,
                        tally.total,
                        tally.succeeded,
                        tally.failed,
                        None,
                    )
                    .await?;

                counter!("sync_records_success_total").increment(tally.succeeded as u64);
                counter!("sync_records_failed_total").increment(tally.failed as u64);

                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    session_id = %session.id,
                    status = status.as_str(),
                    total = tally.total,
                    succeeded = tally.succeeded,
                    failed = tally.failed,
                    duration_ms,
                    "Sync session closed"
                );

                Ok(SyncReport {
                    session_id: session.id,
                    success: status == SessionStatus::Success,
                    total: tally.total,
                    succeeded: tally.succeeded,
                    failed: tally.failed,
                    skipped: tally.skipped,
                    counts_by_type: tally.by_type,
                    errors: tally.errors,
                    duration_ms,
                })
            }
            Err(err) => {
                // Pre-loop or between-batch failure: close the session as
                // failed, keeping whatever per-record progress was tallied
                // before the abort.
                let message = err.to_string();
                warn!(session_id = %session.id, error = %message, "Sync pass aborted");

                self.sessions
                    .close(
                        session.id,
                        SessionStatus::Failed,
                        tally.total,
                        tally.succeeded,
                        tally.failed,
                        Some(message.clone()),
                    )
                    .await?;

                self.connectors
                    .set_status(connector_id, ConnectorStatus::Error, Some(message.clone()))
                    .await?;
                self.audit
                    .record(
                        connector_id,
                        events::STATUS_CHANGED,
                        Some(json!({
                            "to": ConnectorStatus::Error.as_str(),
                            "reason": message,
                        })),
                    )
                    .await?;

                counter!("sync_sessions_failed_total").increment(1);
                Err(err)
            }
        }
    }

    async fn run_pass(
        &self,
        connector_id: Uuid,
        target_type: Option<TargetType>,
        trigger: SyncTrigger,
        session_id: Uuid,
        tally: &mut Tally,
    ) -> Result<(), SyncError> {
        let connector = self
            .connectors
            .get_by_id(connector_id)
            .await?
            .ok_or(SyncError::ConnectorNotFound { connector_id })?;
        let provider: ProviderKind = connector.provider.parse()?;

        let active_mappings = self.mappings.find_active(connector_id, target_type).await?;

        for app_mapping in active_mappings {
            self.sync_app_mapping(&connector, provider, &app_mapping, trigger, session_id, tally)
                .await?;
        }

        Ok(())
    }

    /// Sync one app mapping. Transport and token errors abort the pass;
    /// everything inside the record loop is isolated per record.
    async fn sync_app_mapping(
        &self,
        connector: &crate::models::connector::Model,
        provider: ProviderKind,
        app_mapping: &app_mapping::Model,
        trigger: SyncTrigger,
        session_id: Uuid,
        tally: &mut Tally,
    ) -> Result<(), SyncError> {
        let target: TargetType = app_mapping.target_type.parse()?;

        let valid = self.tokens.ensure_valid_token(connector.id).await?;
        let config = connector.config.clone().unwrap_or(json!({}));
        let client = RemoteClient::from_config(&config, valid.access_token)?;

        let records = client
            .fetch_records(&app_mapping.remote_app_id, None)
            .await?;
        let specs = self.mappings.load_field_specs(app_mapping.id).await?;

        // Preload the target type's records once for update-key matching.
        let update_keys: Vec<&FieldMappingSpec> =
            specs.iter().filter(|s| s.is_update_key).collect();
        let existing = if update_keys.is_empty() {
            Vec::new()
        } else {
            self.case_records
                .list_by_target(connector.tenant_id, target.as_str())
                .await?
        };

        info!(
            app_mapping_id = %app_mapping.id,
            remote_app_id = %app_mapping.remote_app_id,
            target = %target,
            records = records.len(),
            "Syncing app mapping"
        );

        for record in records {
            let remote_id = record.id.clone().unwrap_or_default();
            tally.total += 1;
            let type_counts = tally.by_type.entry(target.as_str().to_string()).or_default();
            type_counts.total += 1;

            match self
                .process_record(connector, provider, app_mapping, target, &specs, &existing, record)
                .await
            {
                Ok(RecordOutcome::Upserted) => {
                    tally.succeeded += 1;
                    type_counts.succeeded += 1;

                    if trigger == SyncTrigger::Manual {
                        self.sessions
                            .log_item(session_id, target.as_str(), &remote_id, "success", None)
                            .await?;
                    }
                }
                Ok(RecordOutcome::Skipped) => {
                    // Forward progress, not an error: the mapping opted to
                    // skip records without an update target.
                    tally.succeeded += 1;
                    tally.skipped += 1;
                    type_counts.succeeded += 1;
                    type_counts.skipped += 1;

                    if trigger == SyncTrigger::Manual {
                        self.sessions
                            .log_item(
                                session_id,
                                target.as_str(),
                                &remote_id,
                                "skipped",
                                Some("no update target".to_string()),
                            )
                            .await?;
                    }
                }
                Err(detail) => {
                    tally.failed += 1;
                    type_counts.failed += 1;
                    tally.errors.push(format!("{}: {}", remote_id, detail));

                    if trigger == SyncTrigger::Manual {
                        self.sessions
                            .log_item(
                                session_id,
                                target.as_str(),
                                &remote_id,
                                "failed",
                                Some(detail),
                            )
                            .await?;
                    }
                }
            }
        }

        Ok(())
    }

    /// Transform and persist one record. Any error is returned as a string
    /// and counted by the caller; it never aborts the batch.
    #[allow(clippy::too_many_arguments)]
    async fn process_record(
        &self,
        connector: &crate::models::connector::Model,
        provider: ProviderKind,
        app_mapping: &app_mapping::Model,
        target: TargetType,
        specs: &[FieldMappingSpec],
        existing: &[case_record::Model],
        record: RemoteRecord,
    ) -> Result<RecordOutcome, String> {
        let remote_id = record
            .id
            .as_deref()
            .ok_or_else(|| "record is missing its remote id".to_string())?;

        let mapped = mapping::map_record(&record.fields, specs);
        let source_key = format!("{}:{}", provider, remote_id);
        let data = serde_json::Value::Object(mapped.clone());

        // Fast path: the record was synced before.
        let by_source = self
            .case_records
            .find_by_source_key(connector.tenant_id, target.as_str(), &source_key)
            .await
            .map_err(|e| e.to_string())?;

        if by_source.is_some() {
            self.case_records
                .upsert(
                    connector.tenant_id,
                    connector.id,
                    target.as_str(),
                    &source_key,
                    data,
                )
                .await
                .map_err(|e| e.to_string())?;
            return Ok(RecordOutcome::Upserted);
        }

        // First sight of this remote id: try to match an existing internal
        // record via the declared update-key fields.
        if let Some(matched) = match_by_update_keys(specs, &mapped, existing) {
            self.case_records
                .adopt(matched.id, &source_key, data)
                .await
                .map_err(|e| e.to_string())?;
            return Ok(RecordOutcome::Upserted);
        }

        if app_mapping.skip_missing_update_target {
            return Ok(RecordOutcome::Skipped);
        }

        self.case_records
            .upsert(
                connector.tenant_id,
                connector.id,
                target.as_str(),
                &source_key,
                data,
            )
            .await
            .map_err(|e| e.to_string())?;

        Ok(RecordOutcome::Upserted)
    }
}

/// Match a mapped record against existing internal records by comparing all
/// declared update-key fields. Requires at least one update-key value to be
/// present in the mapped record.
fn match_by_update_keys<'a>(
    specs: &[FieldMappingSpec],
    mapped: &serde_json::Map<String, serde_json::Value>,
    existing: &'a [case_record::Model],
) -> Option<&'a case_record::Model> {
    let keys: Vec<&FieldMappingSpec> = specs.iter().filter(|s| s.is_update_key).collect();
    if keys.is_empty() {
        return None;
    }

    let mut any_value = false;
    for key in &keys {
        if mapped.get(&key.target_field).is_some() {
            any_value = true;
            break;
        }
    }
    if !any_value {
        return None;
    }

    existing.iter().find(|candidate| {
        keys.iter().all(|key| {
            match (
                mapped.get(&key.target_field),
                candidate.data.get(&key.target_field),
            ) {
                (Some(a), Some(b)) => mapping::stringify(a) == mapping::stringify(b),
                _ => false,
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{RemoteFieldKind, ValueRule};
    use chrono::Utc;
    use serde_json::json;

    fn spec(target_field: &str, is_update_key: bool) -> FieldMappingSpec {
        FieldMappingSpec {
            field_code: format!("remote_{}", target_field),
            target_field: target_field.to_string(),
            kind: RemoteFieldKind::SingleLineText,
            is_update_key,
            rules: Vec::<ValueRule>::new(),
        }
    }

    fn existing_record(data: serde_json::Value) -> case_record::Model {
        case_record::Model {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            connector_id: Uuid::new_v4(),
            target_type: "people".to_string(),
            source_key: String::new(),
            data,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn update_key_match_requires_all_keys_equal() {
        let specs = vec![spec("email", true), spec("name", false)];
        let existing = vec![
            existing_record(json!({"email": "a@example.com", "name": "A"})),
            existing_record(json!({"email": "b@example.com", "name": "B"})),
        ];

        let mut mapped = serde_json::Map::new();
        mapped.insert("email".to_string(), json!("b@example.com"));
        mapped.insert("name".to_string(), json!("Renamed"));

        let matched = match_by_update_keys(&specs, &mapped, &existing).expect("matches");
        assert_eq!(matched.data["email"], "b@example.com");
    }

    #[test]
    fn no_update_keys_declared_means_no_match() {
        let specs = vec![spec("email", false)];
        let existing = vec![existing_record(json!({"email": "a@example.com"}))];

        let mut mapped = serde_json::Map::new();
        mapped.insert("email".to_string(), json!("a@example.com"));

        assert!(match_by_update_keys(&specs, &mapped, &existing).is_none());
    }

    #[test]
    fn missing_update_key_value_means_no_match() {
        let specs = vec![spec("email", true)];
        let existing = vec![existing_record(json!({"email": "a@example.com"}))];

        let mapped = serde_json::Map::new();
        assert!(match_by_update_keys(&specs, &mapped, &existing).is_none());
    }
}
