//! Follow-up service integration tests over SQLite
//!
//! Covers the lifecycle end to end: the paired action for every status
//! change, audit events for successes and failures, and the read models.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use loopguard_common::audit::{AuditAction, AuditLogger, AuditQuery, ENTITY_FOLLOWUP, ENTITY_METRICS};
use loopguard_common::db::{init_database, SqliteAuditLogger, SqliteFollowUpStore};
use loopguard_common::services::{FollowUpService, MetricsRange, UpdateStatus};
use loopguard_common::store::{ActionStore, Page, RecommendationStore, WorklistFilters};
use loopguard_common::{
    time, ActionType, Actor, Error, FollowUpPriority, FollowUpStatus, NewFollowUp,
};
use tempfile::TempDir;
use uuid::Uuid;

struct Harness {
    _dir: TempDir,
    service: FollowUpService,
    store: Arc<SqliteFollowUpStore>,
    audit: Arc<SqliteAuditLogger>,
}

async fn harness() -> Harness {
    let dir = TempDir::new().unwrap();
    let pool = init_database(&dir.path().join("loopguard.db")).await.unwrap();
    let store = Arc::new(SqliteFollowUpStore::new(pool.clone()));
    let audit = Arc::new(SqliteAuditLogger::new(pool));
    let service = FollowUpService::new(store.clone(), audit.clone());
    Harness {
        _dir: dir,
        service,
        store,
        audit,
    }
}

fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn input(modality: &str, interval_months: u32) -> NewFollowUp {
    NewFollowUp {
        report_id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        recommended_modality: modality.to_string(),
        body_region: "chest".to_string(),
        reason: "6 mm nodule, Fleischner follow-up".to_string(),
        interval_months,
        priority: FollowUpPriority::Routine,
    }
}

fn status_change(id: Uuid, status: FollowUpStatus) -> UpdateStatus {
    UpdateStatus {
        id,
        status,
        note: None,
        expected_version: None,
    }
}

#[tokio::test]
async fn test_create_persists_recommendation_action_and_audit() {
    let h = harness().await;
    let radiologist = Actor::new(Uuid::new_v4()).with_ip_address("10.2.0.5");

    let rec = h
        .service
        .create(input("CT", 3), Some(utc(2024, 1, 1)), &radiologist)
        .await
        .unwrap();

    assert_eq!(rec.status(), FollowUpStatus::Pending);
    assert_eq!(rec.due_date(), Some(utc(2024, 3, 31)));
    assert_eq!(rec.created_by(), radiologist.id);
    assert_eq!(rec.version(), 1);

    let history = h.store.list_for_recommendation(rec.id()).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].action_type(), ActionType::Created);
    assert_eq!(history[0].new_status(), Some(FollowUpStatus::Pending));
    assert_eq!(history[0].note(), "Created with 3 month interval");
    assert_eq!(history[0].ip_address(), Some("10.2.0.5"));

    let events = h.audit.query(&AuditQuery::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].action(), AuditAction::Create);
    assert_eq!(events[0].entity_id(), Some(rec.id()));
    assert_eq!(events[0].metadata()["modality"], "CT");
    assert_eq!(events[0].metadata()["interval_months"], 3);
}

#[tokio::test]
async fn test_create_without_reference_counts_from_now() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());

    let before = time::now();
    let rec = h.service.create(input("US", 1), None, &actor).await.unwrap();
    let due = rec.due_date().unwrap();
    assert!(due >= before + chrono::Duration::days(30));
}

#[tokio::test]
async fn test_create_validation_failure_is_audited() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());

    let err = h
        .service
        .create(input("CT", 0), None, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let events = h.audit.query(&AuditQuery::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].success());
    assert_eq!(events[0].metadata()["error_kind"], "validation");
    assert_eq!(
        h.store
            .count_matching(&WorklistFilters::default())
            .await
            .unwrap(),
        0
    );
}

#[tokio::test]
async fn test_create_oversized_interval_is_audited_validation_error() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());

    let err = h
        .service
        .create(input("CT", 4_000_000), None, &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let events = h.audit.query(&AuditQuery::default()).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(!events[0].success());
    assert_eq!(events[0].metadata()["interval_months"], 4_000_000);
}

#[tokio::test]
async fn test_update_status_writes_exactly_one_action() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());
    let rec = h.service.create(input("CT", 3), None, &actor).await.unwrap();

    let update = h
        .service
        .update_status(
            UpdateStatus {
                id: rec.id(),
                status: FollowUpStatus::Scheduled,
                note: Some("  Booked for 14 March  ".to_string()),
                expected_version: Some(1),
            },
            &actor,
        )
        .await
        .unwrap();

    assert_eq!(update.previous_status, FollowUpStatus::Pending);
    assert_eq!(update.recommendation.status(), FollowUpStatus::Scheduled);
    assert_eq!(update.recommendation.version(), 2);
    assert!(update.recommendation.updated_at() >= rec.updated_at());

    let history = h.store.list_for_recommendation(rec.id()).await.unwrap();
    assert_eq!(history.len(), 2);
    let action = &history[1];
    assert_eq!(action.action_type(), ActionType::StatusChanged);
    assert_eq!(action.previous_status(), Some(FollowUpStatus::Pending));
    assert_eq!(action.new_status(), Some(FollowUpStatus::Scheduled));
    assert_eq!(action.note(), "Booked for 14 March");
    assert_eq!(action.created_by(), actor.id);

    let update_events = AuditQuery {
        action: Some(AuditAction::Update),
        ..Default::default()
    };
    let events = h.audit.query(&update_events).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].metadata()["previous_status"], "pending");
    assert_eq!(events[0].metadata()["new_status"], "scheduled");
}

#[tokio::test]
async fn test_invalid_transition_writes_no_action_and_audits_failure() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());
    let rec = h.service.create(input("CT", 3), None, &actor).await.unwrap();

    h.service
        .update_status(status_change(rec.id(), FollowUpStatus::Cancelled), &actor)
        .await
        .unwrap();

    let err = h
        .service
        .update_status(status_change(rec.id(), FollowUpStatus::Completed), &actor)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidTransition {
            from: FollowUpStatus::Cancelled,
            to: FollowUpStatus::Completed
        }
    ));

    let stored = h.store.get_by_id(rec.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), FollowUpStatus::Cancelled);
    assert_eq!(h.store.list_for_recommendation(rec.id()).await.unwrap().len(), 2);

    let failures = AuditQuery {
        success: Some(false),
        ..Default::default()
    };
    let events = h.audit.query(&failures).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].entity_id(), Some(rec.id()));
    assert_eq!(
        events[0].error_detail(),
        Some("Invalid status transition: cancelled -> completed")
    );
}

#[tokio::test]
async fn test_update_missing_is_not_found() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());

    let err = h
        .service
        .update_status(status_change(Uuid::new_v4(), FollowUpStatus::Scheduled), &actor)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(h.audit.count(&AuditQuery::default()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_stale_expected_version_is_conflict() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());
    let rec = h.service.create(input("MR", 6), None, &actor).await.unwrap();

    h.service
        .update_status(status_change(rec.id(), FollowUpStatus::Scheduled), &actor)
        .await
        .unwrap();

    let err = h
        .service
        .update_status(
            UpdateStatus {
                id: rec.id(),
                status: FollowUpStatus::Completed,
                note: None,
                expected_version: Some(rec.version()),
            },
            &actor,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    let stored = h.store.get_by_id(rec.id()).await.unwrap().unwrap();
    assert_eq!(stored.status(), FollowUpStatus::Scheduled);
}

#[tokio::test]
async fn test_lifecycle_end_to_end() {
    let h = harness().await;
    let radiologist = Actor::new(Uuid::new_v4());
    let coordinator = Actor::new(Uuid::new_v4());

    let rec = h
        .service
        .create(input("CT", 6), Some(utc(2024, 6, 1)), &radiologist)
        .await
        .unwrap();
    assert_eq!(rec.due_date(), Some(utc(2024, 11, 28)));

    for status in [FollowUpStatus::Scheduled, FollowUpStatus::Cancelled] {
        h.service
            .update_status(status_change(rec.id(), status), &coordinator)
            .await
            .unwrap();
    }

    let err = h
        .service
        .update_status(status_change(rec.id(), FollowUpStatus::Completed), &coordinator)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidTransition { .. }));

    // Reopening a cancelled follow-up is allowed
    h.service
        .update_status(status_change(rec.id(), FollowUpStatus::Pending), &coordinator)
        .await
        .unwrap();

    let detail = h.service.get(rec.id(), &coordinator).await.unwrap();
    let trail: Vec<(ActionType, Option<FollowUpStatus>)> = detail
        .history
        .iter()
        .map(|a| (a.action_type(), a.new_status()))
        .collect();
    assert_eq!(
        trail,
        vec![
            (ActionType::Created, Some(FollowUpStatus::Pending)),
            (ActionType::StatusChanged, Some(FollowUpStatus::Scheduled)),
            (ActionType::StatusChanged, Some(FollowUpStatus::Cancelled)),
            (ActionType::StatusChanged, Some(FollowUpStatus::Pending)),
        ]
    );
    assert_eq!(detail.recommendation.status(), FollowUpStatus::Pending);
}

#[tokio::test]
async fn test_assign_note_and_reminder_append_actions() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());
    let coordinator_id = Uuid::new_v4();
    let rec = h.service.create(input("XR", 1), None, &actor).await.unwrap();

    let assignment = h
        .service
        .assign(rec.id(), Some(coordinator_id), &actor)
        .await
        .unwrap();
    assert_eq!(assignment.recommendation.assigned_to(), Some(coordinator_id));
    assert_eq!(assignment.recommendation.version(), 2);

    let note = h
        .service
        .add_note(rec.id(), "Patient prefers mornings", &actor)
        .await
        .unwrap();
    assert_eq!(note.action_type(), ActionType::NoteAdded);

    let reminder = h
        .service
        .record_reminder(rec.id(), Some("Letter sent"), &actor)
        .await
        .unwrap();
    assert_eq!(reminder.action_type(), ActionType::ReminderSent);

    let history = h.service.history(rec.id(), &actor).await.unwrap();
    let types: Vec<ActionType> = history.iter().map(|a| a.action_type()).collect();
    assert_eq!(
        types,
        vec![
            ActionType::Created,
            ActionType::Assigned,
            ActionType::NoteAdded,
            ActionType::ReminderSent
        ]
    );

    let stored = h.store.get_by_id(rec.id()).await.unwrap().unwrap();
    assert_eq!(stored.assigned_to(), Some(coordinator_id));
    assert_eq!(stored.status(), FollowUpStatus::Pending);
}

#[tokio::test]
async fn test_blank_note_rejected() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());
    let rec = h.service.create(input("XR", 1), None, &actor).await.unwrap();

    let err = h.service.add_note(rec.id(), "   ", &actor).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
    assert_eq!(h.store.list_for_recommendation(rec.id()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_worklist_has_more_and_display_fields() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());

    // Past due (reference in 2020) plus four future ones
    let overdue = h
        .service
        .create(input("CT", 1), Some(utc(2020, 1, 1)), &actor)
        .await
        .unwrap();
    for _ in 0..4 {
        h.service.create(input("CT", 12), None, &actor).await.unwrap();
    }

    let now = time::now();
    let page = h
        .service
        .worklist(WorklistFilters::default(), Page::new(Some(2), None), &actor, now)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 5);
    assert!(page.has_more);

    let first = &page.items[0];
    assert_eq!(first.recommendation.id(), overdue.id());
    assert!(first.is_overdue);
    assert_eq!(first.effective_status, FollowUpStatus::Overdue);
    assert!(first.days_until_due.unwrap() < 0);
    assert_eq!(first.recommendation.status(), FollowUpStatus::Pending);

    let last = h
        .service
        .worklist(WorklistFilters::default(), Page::new(Some(2), Some(4)), &actor, now)
        .await
        .unwrap();
    assert_eq!(last.items.len(), 1);
    assert!(!last.has_more);

    let reads = AuditQuery {
        action: Some(AuditAction::Read),
        entity_type: Some(ENTITY_FOLLOWUP.to_string()),
        ..Default::default()
    };
    assert_eq!(h.audit.count(&reads).await.unwrap(), 2);
}

#[tokio::test]
async fn test_metrics_counts_and_audit() {
    let h = harness().await;
    let actor = Actor::new(Uuid::new_v4());

    let done = h.service.create(input("CT", 6), None, &actor).await.unwrap();
    h.service
        .update_status(status_change(done.id(), FollowUpStatus::Completed), &actor)
        .await
        .unwrap();
    h.service
        .create(input("MR", 1), Some(utc(2020, 1, 1)), &actor)
        .await
        .unwrap();

    let now = time::now();
    let report = h
        .service
        .metrics(MetricsRange::last_days(30, now), &actor, now)
        .await
        .unwrap();

    assert_eq!(report.total_followups, 2);
    assert_eq!(report.total_completed, 1);
    assert_eq!(report.completed_on_time, 1);
    assert_eq!(report.total_overdue, 1);
    assert_eq!(report.completion_rate, 50.0);
    assert_eq!(report.overdue_rate, 50.0);
    assert_eq!(report.daily_created.values().sum::<i64>(), 2);
    assert_eq!(report.daily_completed.values().sum::<i64>(), 1);

    let metric_reads = AuditQuery {
        entity_type: Some(ENTITY_METRICS.to_string()),
        ..Default::default()
    };
    let events = h.audit.query(&metric_reads).await.unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].metadata()["total_followups"], 2);
}

#[tokio::test]
async fn test_audit_log_read_is_itself_audited() {
    let h = harness().await;
    let admin = Actor::new(Uuid::new_v4());
    h.service.create(input("CT", 3), None, &admin).await.unwrap();

    let page = h
        .service
        .audit_log(AuditQuery::default(), &admin)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.events.len(), 1);

    assert_eq!(h.audit.count(&AuditQuery::default()).await.unwrap(), 2);
}
