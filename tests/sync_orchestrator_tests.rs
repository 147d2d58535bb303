//! Integration tests for the sync orchestrator
//!
//! Full sync passes over an in-memory database against a wiremock record
//! API: mapping application, idempotent upserts, partial-failure isolation,
//! session bookkeeping and the per-connector lock.

use casebridge::config::AppConfig;
use casebridge::locks::ConnectorLocks;
use casebridge::mapping::TargetType;
use casebridge::providers::AdapterRegistry;
use casebridge::repositories::mapping::{NewFieldMapping, NewValueRule};
use casebridge::repositories::sync_session::SyncTrigger;
use casebridge::repositories::{
    AuditLogRepository, CaseRecordRepository, ConnectorRepository, MappingRepository,
    OAuthCredentialRepository, SyncSessionRepository,
};
use casebridge::sync::{SyncError, SyncOrchestrator};
use casebridge::tokens::TokenLifecycleManager;
use casebridge::vault::MockCodec;
use chrono::{Duration, Utc};
use sea_orm::DatabaseConnection;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[path = "test_utils/mod.rs"]
mod test_utils;

struct Fixture {
    db: Arc<DatabaseConnection>,
    tenant_id: Uuid,
    connector_id: Uuid,
    locks: ConnectorLocks,
}

impl Fixture {
    fn orchestrator(&self) -> SyncOrchestrator {
        let config = AppConfig::default();
        let tokens = Arc::new(TokenLifecycleManager::new(
            Arc::new(MockCodec),
            AdapterRegistry::from_config(&config),
            ConnectorRepository::new(self.db.clone()),
            OAuthCredentialRepository::new(self.db.clone()),
            AuditLogRepository::new(self.db.clone()),
        ));

        SyncOrchestrator::new(
            tokens,
            ConnectorRepository::new(self.db.clone()),
            MappingRepository::new(self.db.clone()),
            SyncSessionRepository::new(self.db.clone()),
            CaseRecordRepository::new(self.db.clone()),
            AuditLogRepository::new(self.db.clone()),
            self.locks.clone(),
        )
    }

    /// Active app mapping with status value rules and a name field.
    async fn seed_people_mapping(&self, remote_app_id: &str) -> anyhow::Result<Uuid> {
        let mappings = MappingRepository::new(self.db.clone());

        let mapping = mappings
            .create_app_mapping(self.connector_id, remote_app_id, TargetType::People, false)
            .await?;
        mappings.activate_app_mapping(mapping.id).await?;

        mappings
            .replace_field_mappings(
                mapping.id,
                &[
                    NewFieldMapping {
                        field_code: "ステータス".to_string(),
                        field_type: "DROP_DOWN".to_string(),
                        target_field: "status".to_string(),
                        is_update_key: false,
                    },
                    NewFieldMapping {
                        field_code: "氏名".to_string(),
                        field_type: "SINGLE_LINE_TEXT".to_string(),
                        target_field: "name".to_string(),
                        is_update_key: false,
                    },
                ],
            )
            .await?;

        mappings
            .replace_value_rules(
                mapping.id,
                "status",
                &[
                    NewValueRule {
                        source_value: "営業_企業情報待ち".to_string(),
                        target_value: "書類準備中".to_string(),
                        is_active: true,
                    },
                    NewValueRule {
                        source_value: "申請中".to_string(),
                        target_value: "申請中".to_string(),
                        is_active: true,
                    },
                ],
            )
            .await?;

        Ok(mapping.id)
    }
}

async fn setup(server: &MockServer) -> anyhow::Result<Fixture> {
    let db = test_utils::setup_test_db().await?;
    let tenant_id = test_utils::create_tenant(&db).await?;
    let connector_id = test_utils::create_connector(
        &db,
        &MockCodec,
        tenant_id,
        "kintone",
        json!({
            "domain": "https://example.cybozu.com",
            "api_base": server.uri(),
        }),
    )
    .await?;

    // Valid token well outside the refresh window.
    test_utils::seed_credentials(
        &db,
        &MockCodec,
        connector_id,
        "sync-access-token",
        Some("refresh-token"),
        Utc::now() + Duration::hours(2),
    )
    .await?;

    Ok(Fixture {
        db,
        tenant_id,
        connector_id,
        locks: ConnectorLocks::new(),
    })
}

fn person(id: &str, status: &str, name: &str) -> serde_json::Value {
    json!({
        "$id": {"type": "__ID__", "value": id},
        "ステータス": {"type": "DROP_DOWN", "value": status},
        "氏名": {"type": "SINGLE_LINE_TEXT", "value": name},
    })
}

async fn mount_records(server: &MockServer, app: &str, records: Vec<serde_json::Value>) {
    Mock::given(method("GET"))
        .and(path("/k/v1/records.json"))
        .and(query_param("app", app))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"records": records})))
        .mount(server)
        .await;
}

#[tokio::test]
async fn full_pass_maps_values_and_upserts_records() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;
    fixture.seed_people_mapping("10").await?;

    mount_records(
        &server,
        "10",
        vec![
            person("1", "営業_企業情報待ち", "佐藤"),
            person("2", "申請中", "田中"),
            person("3", "未知の値", "鈴木"),
        ],
    )
    .await;

    let report = fixture
        .orchestrator()
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await?;

    assert!(report.success);
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.counts_by_type["people"].total, 3);

    let records = CaseRecordRepository::new(fixture.db.clone());

    // First active rule wins
    let mapped = records
        .find_by_source_key(fixture.tenant_id, "people", "kintone:1")
        .await?
        .expect("record synced");
    assert_eq!(mapped.data["status"], "書類準備中");
    assert_eq!(mapped.data["name"], "佐藤");

    // Identity rule
    let identity = records
        .find_by_source_key(fixture.tenant_id, "people", "kintone:2")
        .await?
        .expect("record synced");
    assert_eq!(identity.data["status"], "申請中");

    // Unmapped value passes through unchanged
    let passthrough = records
        .find_by_source_key(fixture.tenant_id, "people", "kintone:3")
        .await?
        .expect("record synced");
    assert_eq!(passthrough.data["status"], "未知の値");

    Ok(())
}

#[tokio::test]
async fn rerun_against_unchanged_remote_is_idempotent() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;
    fixture.seed_people_mapping("10").await?;

    mount_records(
        &server,
        "10",
        vec![person("1", "申請中", "佐藤"), person("2", "申請中", "田中")],
    )
    .await;

    let orchestrator = fixture.orchestrator();
    let first = orchestrator
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await?;
    let second = orchestrator
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await?;

    assert!(first.success && second.success);

    let count = CaseRecordRepository::new(fixture.db.clone())
        .count_by_target(fixture.tenant_id, "people")
        .await?;
    assert_eq!(count, 2, "re-run must not duplicate rows");

    Ok(())
}

#[tokio::test]
async fn malformed_record_is_isolated_and_session_reflects_failure() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;
    fixture.seed_people_mapping("10").await?;

    // Second record carries no $id and cannot be keyed.
    mount_records(
        &server,
        "10",
        vec![
            person("1", "申請中", "佐藤"),
            json!({"ステータス": {"type": "DROP_DOWN", "value": "申請中"}}),
            person("3", "申請中", "鈴木"),
        ],
    )
    .await;

    let report = fixture
        .orchestrator()
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await?;

    assert!(!report.success);
    assert_eq!(report.total, 3);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed, 1);

    // The good records landed.
    let count = CaseRecordRepository::new(fixture.db.clone())
        .count_by_target(fixture.tenant_id, "people")
        .await?;
    assert_eq!(count, 2);

    // Session closed once, marked failed, with matching counts.
    let sessions = SyncSessionRepository::new(fixture.db.clone());
    let session = sessions
        .get(report.session_id)
        .await?
        .expect("session exists");
    assert_eq!(session.status, "failed");
    assert_eq!(session.total_count, 3);
    assert_eq!(session.success_count, 2);
    assert_eq!(session.failed_count, 1);
    assert!(session.finished_at.is_some());

    // Manual run: item logs written, one of them failed.
    let items = sessions.list_items(report.session_id).await?;
    assert_eq!(items.len(), 3);
    assert_eq!(items.iter().filter(|i| i.status == "failed").count(), 1);

    Ok(())
}

#[tokio::test]
async fn scheduled_runs_do_not_write_item_logs() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;
    fixture.seed_people_mapping("10").await?;

    mount_records(&server, "10", vec![person("1", "申請中", "佐藤")]).await;

    let report = fixture
        .orchestrator()
        .sync_all(fixture.connector_id, None, SyncTrigger::Scheduled)
        .await?;

    assert!(report.success);

    let items = SyncSessionRepository::new(fixture.db.clone())
        .list_items(report.session_id)
        .await?;
    assert!(items.is_empty(), "scheduled runs must not write item logs");

    Ok(())
}

#[tokio::test]
async fn target_type_filter_scopes_the_pass() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;
    fixture.seed_people_mapping("10").await?;

    // A second active mapping for visas on another remote app.
    let mappings = MappingRepository::new(fixture.db.clone());
    let visas = mappings
        .create_app_mapping(fixture.connector_id, "20", TargetType::Visas, false)
        .await?;
    mappings.activate_app_mapping(visas.id).await?;

    mount_records(&server, "10", vec![person("1", "申請中", "佐藤")]).await;
    mount_records(
        &server,
        "20",
        vec![json!({"$id": {"type": "__ID__", "value": "9"}})],
    )
    .await;

    let report = fixture
        .orchestrator()
        .sync_all(
            fixture.connector_id,
            Some(TargetType::People),
            SyncTrigger::Manual,
        )
        .await?;

    assert!(report.success);
    assert_eq!(report.counts_by_type.len(), 1);
    assert!(report.counts_by_type.contains_key("people"));

    let records = CaseRecordRepository::new(fixture.db.clone());
    assert_eq!(records.count_by_target(fixture.tenant_id, "people").await?, 1);
    assert_eq!(records.count_by_target(fixture.tenant_id, "visas").await?, 0);

    Ok(())
}

#[tokio::test]
async fn inactive_mappings_are_not_synced() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;

    // Draft mapping, never activated.
    MappingRepository::new(fixture.db.clone())
        .create_app_mapping(fixture.connector_id, "10", TargetType::People, false)
        .await?;

    let report = fixture
        .orchestrator()
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await?;

    assert!(report.success);
    assert_eq!(report.total, 0);

    Ok(())
}

#[tokio::test]
async fn update_key_matching_adopts_existing_record() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;

    let mappings = MappingRepository::new(fixture.db.clone());
    let mapping = mappings
        .create_app_mapping(fixture.connector_id, "10", TargetType::People, false)
        .await?;
    mappings.activate_app_mapping(mapping.id).await?;
    mappings
        .replace_field_mappings(
            mapping.id,
            &[
                NewFieldMapping {
                    field_code: "メール".to_string(),
                    field_type: "SINGLE_LINE_TEXT".to_string(),
                    target_field: "email".to_string(),
                    is_update_key: true,
                },
                NewFieldMapping {
                    field_code: "氏名".to_string(),
                    field_type: "SINGLE_LINE_TEXT".to_string(),
                    target_field: "name".to_string(),
                    is_update_key: false,
                },
            ],
        )
        .await?;

    // Pre-existing internal record created outside this connector's syncs.
    let records = CaseRecordRepository::new(fixture.db.clone());
    let existing = records
        .upsert(
            fixture.tenant_id,
            fixture.connector_id,
            "people",
            "manual:seed-1",
            json!({"email": "sato@example.com", "name": "旧データ"}),
        )
        .await?;

    mount_records(
        &server,
        "10",
        vec![json!({
            "$id": {"type": "__ID__", "value": "1"},
            "メール": {"type": "SINGLE_LINE_TEXT", "value": "sato@example.com"},
            "氏名": {"type": "SINGLE_LINE_TEXT", "value": "佐藤"},
        })],
    )
    .await;

    let report = fixture
        .orchestrator()
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await?;
    assert!(report.success);

    // The existing row was adopted, not duplicated.
    assert_eq!(records.count_by_target(fixture.tenant_id, "people").await?, 1);
    let adopted = records
        .find_by_source_key(fixture.tenant_id, "people", "kintone:1")
        .await?
        .expect("adopted under the new source key");
    assert_eq!(adopted.id, existing.id);
    assert_eq!(adopted.data["name"], "佐藤");

    Ok(())
}

#[tokio::test]
async fn concurrent_sync_for_same_connector_conflicts() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;
    fixture.seed_people_mapping("10").await?;

    // Simulate a running sync holding the per-connector lock.
    let _guard = fixture
        .locks
        .try_acquire(fixture.connector_id)
        .expect("lock available");

    let result = fixture
        .orchestrator()
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await;

    assert!(matches!(result, Err(SyncError::InProgress { .. })));

    // No session row was opened for the conflicting trigger.
    let sessions = SyncSessionRepository::new(fixture.db.clone())
        .list_for_connector(fixture.connector_id, 10)
        .await?;
    assert!(sessions.is_empty());

    Ok(())
}

#[tokio::test]
async fn transport_failure_closes_session_failed_and_marks_connector() -> anyhow::Result<()> {
    let server = MockServer::start().await;
    let fixture = setup(&server).await?;
    fixture.seed_people_mapping("10").await?;

    Mock::given(method("GET"))
        .and(path("/k/v1/records.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let result = fixture
        .orchestrator()
        .sync_all(fixture.connector_id, None, SyncTrigger::Manual)
        .await;
    assert!(matches!(result, Err(SyncError::Remote(_))));

    let sessions = SyncSessionRepository::new(fixture.db.clone())
        .list_for_connector(fixture.connector_id, 10)
        .await?;
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].status, "failed");
    assert!(sessions[0].error_message.is_some());

    let connector = ConnectorRepository::new(fixture.db.clone())
        .get_by_id(fixture.connector_id)
        .await?
        .expect("connector exists");
    assert_eq!(connector.status, "error");

    Ok(())
}
