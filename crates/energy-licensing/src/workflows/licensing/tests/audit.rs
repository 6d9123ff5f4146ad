use super::common::*;

use chrono::Duration;

use crate::workflows::licensing::audit::{AuditStatus, ComplianceStatus, RiskLevel, VersionOutcome};
use crate::workflows::licensing::domain::{Capability, EntityRef, Role};
use crate::workflows::licensing::repository::{EntityStore, Recipient, StoreError};
use crate::workflows::licensing::requests::RequestStatus;
use crate::workflows::licensing::WorkflowError;

#[test]
fn create_report_opens_draft_version_one_with_review_reminder() {
    let h = harness();
    let request = drive_to(&h, RequestStatus::Inspecting);

    let (report, version) = h
        .workflow
        .audits()
        .create_report(new_report(request.id))
        .unwrap();
    assert_eq!(report.status, AuditStatus::Draft);
    assert_eq!(report.latest_version, 1);
    assert_eq!(report.compliance_status, ComplianceStatus::Compliant);
    assert_eq!(report.risk_level, RiskLevel::Low);
    assert_eq!(version.version_number, 1);
    assert_eq!(version.report_id, report.id);
    assert_eq!(version.outcome, VersionOutcome::Pending);

    let reminders = h
        .store
        .reminders_for(EntityRef::AuditReport(report.id))
        .unwrap();
    assert_eq!(reminders.len(), 1);
    assert_eq!(reminders[0].deadline_date, t0() + Duration::days(14));
    assert_eq!(reminders[0].reminder_days, 3);
}

#[test]
fn create_report_requires_the_assigned_inspector_during_inspection() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Appointment);
    assert!(matches!(
        audits.create_report(new_report(request.id)),
        Err(WorkflowError::InvalidTransition { action: "create_report", .. })
    ));

    let request = h
        .workflow
        .requests()
        .start_inspection(request.id, INSPECTOR)
        .unwrap();
    let mut other = new_report(request.id);
    other.inspector_id = OTHER_INSPECTOR;
    assert!(matches!(
        audits.create_report(other),
        Err(WorkflowError::NotAssignedInspector { .. })
    ));

    let mut auditor = new_report(request.id);
    auditor.inspector_id = AUDITOR;
    assert!(matches!(
        audits.create_report(auditor),
        Err(WorkflowError::MissingCapability {
            capability: Capability::Inspect,
            ..
        })
    ));
}

#[test]
fn versions_issue_contiguously_and_the_latest_is_never_deleted() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (report, v1) = audits.create_report(new_report(request.id)).unwrap();

    let (_, v2) = audits
        .create_version(report.id, submission("compliant"), INSPECTOR, false)
        .unwrap();
    let (report, v3) = audits
        .create_version(report.id, submission("compliant"), INSPECTOR, false)
        .unwrap();
    assert_eq!(
        [v1.version_number, v2.version_number, v3.version_number],
        [1, 2, 3]
    );
    assert_eq!(report.latest_version, 3);

    audits.delete_version(v2.id).unwrap();
    match audits.delete_version(v3.id) {
        Err(WorkflowError::CannotDeleteLatest {
            report: id,
            version_number,
        }) => {
            assert_eq!(id, report.id);
            assert_eq!(version_number, 3);
        }
        other => panic!("expected CannotDeleteLatest, got {other:?}"),
    }
    audits.delete_version(v1.id).unwrap();

    let remaining: Vec<u32> = audits
        .versions(report.id)
        .unwrap()
        .iter()
        .map(|version| version.version_number)
        .collect();
    assert_eq!(remaining, vec![3]);

    let (report, v4) = audits
        .create_version(report.id, submission("compliant"), INSPECTOR, false)
        .unwrap();
    assert_eq!(v4.version_number, 4);
    assert_eq!(report.latest_version, 4);
}

#[test]
fn approval_writes_through_to_the_report() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::InspectionDone);
    let (report, _) = audits.create_report(new_report(request.id)).unwrap();

    let (report, version) = audits
        .create_version(report.id, submission("non_compliant"), INSPECTOR, true)
        .unwrap();
    assert_eq!(report.status, AuditStatus::Submitted);
    assert_eq!(report.compliance_status, ComplianceStatus::NonCompliant);
    assert_eq!(h.sink.delivered_to(Recipient::Role(Role::Auditor)).len(), 1);

    let (report, version) = audits.send_for_review(version.id, AUDITOR).unwrap();
    assert_eq!(report.status, AuditStatus::UnderReview);
    assert_eq!(report.reviewer_id, Some(AUDITOR));

    let (report, version) = audits
        .approve(version.id, HEAD, Some("Noted".to_string()))
        .unwrap();
    assert_eq!(version.status, AuditStatus::Approved);
    assert_eq!(report.status, AuditStatus::Approved);
    assert_eq!(
        version.outcome,
        VersionOutcome::Approved {
            approved_by_id: HEAD,
            comments: Some("Noted".to_string()),
        }
    );
    assert!(!report.is_approved_and_compliant());

    let stored = h.store.report(report.id).unwrap();
    assert_eq!(stored, report);
}

#[test]
fn rejection_needs_a_reason_and_reaches_the_submitter() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (_, draft) = audits.create_report(new_report(request.id)).unwrap();
    audits.submit_version(draft.id, INSPECTOR).unwrap();

    assert!(matches!(
        audits.reject(draft.id, AUDITOR, "", None),
        Err(WorkflowError::MissingReason)
    ));

    let (report, version) = audits
        .reject(draft.id, AUDITOR, "Missing relay test sheets", None)
        .unwrap();
    assert_eq!(report.status, AuditStatus::Rejected);
    assert!(matches!(
        version.outcome,
        VersionOutcome::Rejected { ref reason, .. } if reason == "Missing relay test sheets"
    ));

    let notes = h.sink.delivered_to(Recipient::User(INSPECTOR));
    let last = notes.last().expect("submitter notified");
    assert_eq!(last.title, "Audit report rejected");
    assert_eq!(last.message, "Missing relay test sheets");

    let (report, next) = audits
        .create_version(report.id, submission("compliant"), INSPECTOR, true)
        .unwrap();
    assert_eq!(next.version_number, 2);
    assert_eq!(report.status, AuditStatus::Submitted);
}

#[test]
fn review_decisions_need_the_review_capability() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (_, draft) = audits.create_report(new_report(request.id)).unwrap();
    audits.submit_version(draft.id, INSPECTOR).unwrap();

    assert!(matches!(
        audits.approve(draft.id, INSPECTOR, None),
        Err(WorkflowError::MissingCapability {
            capability: Capability::Review,
            ..
        })
    ));
    assert!(matches!(
        audits.request_edit(draft.id, STAFF, None),
        Err(WorkflowError::MissingCapability { .. })
    ));

    let (report, version) = audits
        .request_edit(draft.id, AUDITOR, Some("Add photos".to_string()))
        .unwrap();
    assert_eq!(report.status, AuditStatus::NeedsEdit);
    assert!(matches!(version.outcome, VersionOutcome::EditRequested { .. }));
}

#[test]
fn only_the_latest_version_moves() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (report, v1) = audits.create_report(new_report(request.id)).unwrap();
    audits
        .create_version(report.id, submission("compliant"), INSPECTOR, false)
        .unwrap();

    assert!(matches!(
        audits.submit_version(v1.id, INSPECTOR),
        Err(WorkflowError::InvalidTransition { action: "submit_version", .. })
    ));
    assert_eq!(h.store.report(report.id).unwrap().status, AuditStatus::Draft);
}

#[test]
fn versions_in_review_cannot_be_superseded() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (report, draft) = audits.create_report(new_report(request.id)).unwrap();
    audits.submit_version(draft.id, INSPECTOR).unwrap();

    assert!(matches!(
        audits.create_version(report.id, submission("compliant"), INSPECTOR, false),
        Err(WorkflowError::InvalidTransition { from: "submitted", .. })
    ));
    assert!(matches!(
        audits.create_version(report.id, submission("compliant"), OTHER_INSPECTOR, false),
        Err(WorkflowError::NotOwner { .. })
    ));
}

#[test]
fn invalid_enumerations_never_reach_the_store() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (report, _) = audits.create_report(new_report(request.id)).unwrap();

    let mut raw = submission("compliant");
    raw.risk_level = "severe".to_string();
    assert!(matches!(
        audits.create_version(report.id, raw, INSPECTOR, false),
        Err(WorkflowError::InvalidEnumValue { field: "risk level", .. })
    ));
    assert_eq!(audits.versions(report.id).unwrap().len(), 1);
    assert_eq!(h.store.report(report.id).unwrap().revision, report.revision);
}

#[test]
fn stale_report_snapshot_cannot_append() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (report, v1) = audits.create_report(new_report(request.id)).unwrap();

    let mut next = v1.clone();
    next.version_number = 2;
    h.store.append_version(&report, next.clone()).unwrap();
    assert_eq!(
        h.store.append_version(&report, next),
        Err(StoreError::ConcurrentModification(EntityRef::AuditReport(
            report.id
        )))
    );
}

#[test]
fn draft_reports_are_deleted_with_their_reminders() {
    let h = harness();
    let audits = h.workflow.audits();
    let request = drive_to(&h, RequestStatus::Inspecting);
    let (report, _) = audits.create_report(new_report(request.id)).unwrap();
    let entity = EntityRef::AuditReport(report.id);

    assert!(matches!(
        audits.delete_report(report.id, OTHER_INSPECTOR),
        Err(WorkflowError::NotOwner { .. })
    ));
    audits.delete_report(report.id, INSPECTOR).unwrap();
    assert!(matches!(
        audits.report(report.id),
        Err(WorkflowError::NotFound(_))
    ));
    assert!(h.store.reminders_for(entity).unwrap().is_empty());
}
