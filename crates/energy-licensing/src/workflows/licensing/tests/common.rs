use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};

use axum::response::Response;
use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crate::clock::{Clock, ManualClock};
use crate::config::{DeadlineConfig, SchedulerConfig};
use crate::workflows::licensing::audit::{AuditReport, AuditReportVersion, VersionSubmission};
use crate::workflows::licensing::deadlines::{DeadlinePolicy, DeadlineReminder};
use crate::workflows::licensing::domain::{
    EntityRef, InspectionId, ReminderId, ReportId, RequestId, Role, UserAccount, UserId,
    VersionId,
};
use crate::workflows::licensing::memory::{
    InMemoryEntityStore, InMemoryUserDirectory, RecordingNotificationSink,
};
use crate::workflows::licensing::repository::{EntityStore, StoreError};
use crate::workflows::licensing::requests::{
    Appointment, LicenseRequest, NewLicenseRequest, RequestStateMachine, RequestStatus,
};
use crate::workflows::licensing::{LicensingWorkflow, NewAuditReport};

pub(super) const APPLICANT: UserId = UserId(1);
pub(super) const STAFF: UserId = UserId(2);
pub(super) const INSPECTOR: UserId = UserId(3);
pub(super) const OTHER_INSPECTOR: UserId = UserId(4);
pub(super) const AUDITOR: UserId = UserId(5);
pub(super) const HEAD: UserId = UserId(6);

pub(super) type TestWorkflow =
    LicensingWorkflow<InMemoryEntityStore, RecordingNotificationSink, InMemoryUserDirectory>;

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub(super) fn directory() -> InMemoryUserDirectory {
    InMemoryUserDirectory::with_users([
        account(APPLICANT, "Northwind Energy", Role::Applicant),
        account(STAFF, "Dana Intake", Role::DepartmentStaff),
        account(INSPECTOR, "Sam Field", Role::Inspector),
        account(OTHER_INSPECTOR, "Lee Field", Role::Inspector),
        account(AUDITOR, "Ari Audit", Role::Auditor),
        account(HEAD, "Jo Head", Role::DepartmentHead),
    ])
}

fn account(id: UserId, name: &str, role: Role) -> UserAccount {
    UserAccount {
        id,
        name: name.to_string(),
        role,
    }
}

pub(super) struct Harness {
    pub(super) store: Arc<InMemoryEntityStore>,
    pub(super) sink: Arc<RecordingNotificationSink>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) workflow: Arc<TestWorkflow>,
}

pub(super) fn harness() -> Harness {
    harness_with(SchedulerConfig::default())
}

pub(super) fn harness_with(scheduler: SchedulerConfig) -> Harness {
    let store = Arc::new(InMemoryEntityStore::new());
    let sink = Arc::new(RecordingNotificationSink::new());
    let clock = Arc::new(ManualClock::new(t0()));
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let workflow = Arc::new(LicensingWorkflow::new(
        store.clone(),
        sink.clone(),
        Arc::new(directory()),
        dyn_clock,
        scheduler,
        &DeadlineConfig::default(),
    ));
    Harness {
        store,
        sink,
        clock,
        workflow,
    }
}

pub(super) fn form() -> NewLicenseRequest {
    NewLicenseRequest {
        facility_name: "North Ridge Wind".to_string(),
        facility_address: "12 Ridge Rd".to_string(),
        license_type: "generation".to_string(),
        capacity_kw: 48_000,
    }
}

pub(super) fn appointment() -> Appointment {
    Appointment {
        date: NaiveDate::from_ymd_opt(2024, 2, 12).expect("valid date"),
        time: NaiveTime::from_hms_opt(10, 30, 0).expect("valid time"),
        location: "Turbine hall B".to_string(),
    }
}

pub(super) fn submission(compliance: &str) -> VersionSubmission {
    VersionSubmission {
        summary: "All turbines inspected".to_string(),
        findings: "Grounding verified on all nacelles".to_string(),
        recommendations: "Replace two worn cable glands".to_string(),
        compliance_status: compliance.to_string(),
        risk_level: "low".to_string(),
    }
}

pub(super) fn new_report(request: RequestId) -> NewAuditReport {
    NewAuditReport {
        request_id: request,
        inspection_id: InspectionId(900),
        inspector_id: INSPECTOR,
        content: submission("compliant"),
    }
}

/// Create a request and walk it forward until it reaches `target`.
///
/// Stops at any status on the normal progression up to `report_approved`;
/// the compliant approved audit report needed on the way is created too.
pub(super) fn drive_to(h: &Harness, target: RequestStatus) -> LicenseRequest {
    let requests = h.workflow.requests();
    let mut request = requests.create(APPLICANT, form()).expect("create");
    let id = request.id;

    let steps = [
        RequestStatus::NewRequest,
        RequestStatus::Accepted,
        RequestStatus::Assigned,
        RequestStatus::Appointment,
        RequestStatus::Inspecting,
        RequestStatus::InspectionDone,
        RequestStatus::DocumentEdit,
        RequestStatus::ReportApproved,
    ];
    for step in steps {
        if request.status == target {
            break;
        }
        request = match step {
            RequestStatus::NewRequest => requests.submit(id, APPLICANT),
            RequestStatus::Accepted => requests.accept(id),
            RequestStatus::Assigned => requests.assign_inspector(id, INSPECTOR, STAFF),
            RequestStatus::Appointment => requests.set_appointment(id, appointment()),
            RequestStatus::Inspecting => requests.start_inspection(id, INSPECTOR),
            RequestStatus::InspectionDone => requests.complete_inspection(id, INSPECTOR),
            RequestStatus::DocumentEdit => requests.open_document_review(id, None),
            RequestStatus::ReportApproved => {
                approved_report(h, id);
                requests.approve_report(id)
            }
            other => panic!("{other:?} is not a driving step"),
        }
        .expect("pipeline step");
    }
    assert_eq!(request.status, target);
    request
}

/// Open, submit, and approve a compliant report for `request`.
pub(super) fn approved_report(
    h: &Harness,
    request: RequestId,
) -> (AuditReport, AuditReportVersion) {
    let audits = h.workflow.audits();
    let (_, draft) = audits.create_report(new_report(request)).expect("report");
    audits.submit_version(draft.id, INSPECTOR).expect("submit");
    audits.approve(draft.id, AUDITOR, None).expect("approve")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

/// Store wrapper that parks `request` reads on a barrier while armed, so two
/// callers observe the same revision before either writes.
pub(super) struct RacingStore {
    pub(super) inner: InMemoryEntityStore,
    barrier: Barrier,
    armed: AtomicBool,
}

impl RacingStore {
    pub(super) fn new(inner: InMemoryEntityStore) -> Self {
        Self {
            inner,
            barrier: Barrier::new(2),
            armed: AtomicBool::new(false),
        }
    }

    pub(super) fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }
}

pub(super) fn racing_machine(
    store: Arc<RacingStore>,
) -> RequestStateMachine<RacingStore, RecordingNotificationSink, InMemoryUserDirectory> {
    RequestStateMachine::new(
        store,
        Arc::new(RecordingNotificationSink::new()),
        Arc::new(directory()),
        Arc::new(ManualClock::new(t0())),
        DeadlinePolicy::default(),
    )
}

impl EntityStore for RacingStore {
    fn insert_request(&self, request: LicenseRequest) -> Result<LicenseRequest, StoreError> {
        self.inner.insert_request(request)
    }

    fn request(&self, id: RequestId) -> Result<LicenseRequest, StoreError> {
        let request = self.inner.request(id);
        if self.armed.load(Ordering::SeqCst) {
            self.barrier.wait();
        }
        request
    }

    fn save_request(&self, request: &LicenseRequest) -> Result<LicenseRequest, StoreError> {
        self.inner.save_request(request)
    }

    fn delete_request(&self, request: &LicenseRequest) -> Result<(), StoreError> {
        self.inner.delete_request(request)
    }

    fn flag_overdue(
        &self,
        id: RequestId,
        expected_revision: u64,
        at: DateTime<Utc>,
    ) -> Result<LicenseRequest, StoreError> {
        self.inner.flag_overdue(id, expected_revision, at)
    }

    fn find_overdue(&self, now: DateTime<Utc>) -> Result<Vec<LicenseRequest>, StoreError> {
        self.inner.find_overdue(now)
    }

    fn insert_report(
        &self,
        report: AuditReport,
        first_version: AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError> {
        self.inner.insert_report(report, first_version)
    }

    fn report(&self, id: ReportId) -> Result<AuditReport, StoreError> {
        self.inner.report(id)
    }

    fn reports_for_request(&self, id: RequestId) -> Result<Vec<AuditReport>, StoreError> {
        self.inner.reports_for_request(id)
    }

    fn delete_report(&self, report: &AuditReport) -> Result<(), StoreError> {
        self.inner.delete_report(report)
    }

    fn version(&self, id: VersionId) -> Result<AuditReportVersion, StoreError> {
        self.inner.version(id)
    }

    fn versions(&self, report: ReportId) -> Result<Vec<AuditReportVersion>, StoreError> {
        self.inner.versions(report)
    }

    fn append_version(
        &self,
        report: &AuditReport,
        version: AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError> {
        self.inner.append_version(report, version)
    }

    fn save_version(
        &self,
        report: &AuditReport,
        version: &AuditReportVersion,
    ) -> Result<(AuditReport, AuditReportVersion), StoreError> {
        self.inner.save_version(report, version)
    }

    fn delete_version(
        &self,
        report: &AuditReport,
        version: VersionId,
    ) -> Result<AuditReport, StoreError> {
        self.inner.delete_version(report, version)
    }

    fn insert_reminder(&self, reminder: DeadlineReminder) -> Result<DeadlineReminder, StoreError> {
        self.inner.insert_reminder(reminder)
    }

    fn reminder(&self, id: ReminderId) -> Result<DeadlineReminder, StoreError> {
        self.inner.reminder(id)
    }

    fn reminders_for(&self, entity: EntityRef) -> Result<Vec<DeadlineReminder>, StoreError> {
        self.inner.reminders_for(entity)
    }

    fn delete_reminders_for(&self, entity: EntityRef) -> Result<usize, StoreError> {
        self.inner.delete_reminders_for(entity)
    }

    fn find_due_reminders(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<DeadlineReminder>, StoreError> {
        self.inner.find_due_reminders(now)
    }

    fn mark_reminder_fired(
        &self,
        id: ReminderId,
        at: DateTime<Utc>,
    ) -> Result<DeadlineReminder, StoreError> {
        self.inner.mark_reminder_fired(id, at)
    }
}
