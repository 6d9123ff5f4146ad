//! End-to-end scenarios for the licensing pipeline through the public facade and router.

mod common {
    use std::sync::Arc;

    use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

    use energy_licensing::clock::{Clock, ManualClock};
    use energy_licensing::config::{DeadlineConfig, SchedulerConfig};
    use energy_licensing::workflows::licensing::{
        Appointment, InMemoryEntityStore, InMemoryUserDirectory, InspectionId, LicensingWorkflow,
        NewAuditReport, NewLicenseRequest, RecordingNotificationSink, RequestId, Role,
        UserAccount, UserId, VersionSubmission,
    };

    pub(super) const APPLICANT: UserId = UserId(10);
    pub(super) const STAFF: UserId = UserId(20);
    pub(super) const INSPECTOR: UserId = UserId(30);
    pub(super) const AUDITOR: UserId = UserId(40);
    pub(super) const HEAD: UserId = UserId(50);

    pub(super) type Workflow =
        LicensingWorkflow<InMemoryEntityStore, RecordingNotificationSink, InMemoryUserDirectory>;

    pub(super) struct Fixture {
        pub(super) sink: Arc<RecordingNotificationSink>,
        pub(super) clock: Arc<ManualClock>,
        pub(super) workflow: Arc<Workflow>,
    }

    pub(super) fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 3, 9, 0, 0).unwrap()
    }

    pub(super) fn fixture() -> Fixture {
        let users = [
            (APPLICANT, "Solace Solar", Role::Applicant),
            (STAFF, "Intake Desk", Role::DepartmentStaff),
            (INSPECTOR, "Field Team 2", Role::Inspector),
            (AUDITOR, "Compliance Office", Role::Auditor),
            (HEAD, "Director", Role::DepartmentHead),
        ]
        .map(|(id, name, role)| UserAccount {
            id,
            name: name.to_string(),
            role,
        });
        let sink = Arc::new(RecordingNotificationSink::new());
        let clock = Arc::new(ManualClock::new(start()));
        let dyn_clock: Arc<dyn Clock> = clock.clone();
        let workflow = Arc::new(LicensingWorkflow::new(
            Arc::new(InMemoryEntityStore::new()),
            sink.clone(),
            Arc::new(InMemoryUserDirectory::with_users(users)),
            dyn_clock,
            SchedulerConfig::default(),
            &DeadlineConfig::default(),
        ));
        Fixture {
            sink,
            clock,
            workflow,
        }
    }

    pub(super) fn application() -> NewLicenseRequest {
        NewLicenseRequest {
            facility_name: "Mesa Flats PV".to_string(),
            facility_address: "400 County Line Rd".to_string(),
            license_type: "generation".to_string(),
            capacity_kw: 12_500,
        }
    }

    pub(super) fn appointment() -> Appointment {
        Appointment {
            date: NaiveDate::from_ymd_opt(2025, 3, 20).expect("valid date"),
            time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            location: "Inverter station".to_string(),
        }
    }

    pub(super) fn report(request: RequestId, compliance: &str) -> NewAuditReport {
        NewAuditReport {
            request_id: request,
            inspection_id: InspectionId(77),
            inspector_id: INSPECTOR,
            content: VersionSubmission {
                summary: "Array and inverters inspected".to_string(),
                findings: "String fusing within rating".to_string(),
                recommendations: String::new(),
                compliance_status: compliance.to_string(),
                risk_level: "medium".to_string(),
            },
        }
    }
}

mod pipeline {
    use super::common::*;

    use chrono::Duration;

    use energy_licensing::workflows::licensing::{
        AuditStatus, Recipient, RequestStatus, Role, WorkflowError,
    };

    #[test]
    fn request_travels_from_draft_to_approved() {
        let f = fixture();
        let requests = f.workflow.requests();
        let audits = f.workflow.audits();

        let request = requests.create(APPLICANT, application()).expect("create");
        let id = request.id;
        requests.submit(id, APPLICANT).expect("submit");
        requests.accept(id).expect("accept");
        requests.assign_inspector(id, INSPECTOR, STAFF).expect("assign");
        requests.set_appointment(id, appointment()).expect("appointment");
        f.clock.advance(Duration::days(17));
        requests.start_inspection(id, INSPECTOR).expect("start");
        requests.complete_inspection(id, INSPECTOR).expect("complete");

        let (_, first) = audits
            .create_report(report(id, "partially_compliant"))
            .expect("report");
        audits.submit_version(first.id, INSPECTOR).expect("submit v1");
        let (report_state, _) = audits
            .request_edit(first.id, AUDITOR, Some("Re-test string 4".to_string()))
            .expect("edit requested");
        assert_eq!(report_state.status, AuditStatus::NeedsEdit);

        requests
            .open_document_review(id, Some("Awaiting revised audit".to_string()))
            .expect("document review");
        assert!(matches!(
            requests.approve_report(id),
            Err(WorkflowError::InvalidTransition { .. })
        ));

        let (report_state, second) = audits
            .create_version(
                report_state.id,
                report(id, "compliant").content,
                INSPECTOR,
                true,
            )
            .expect("v2");
        assert_eq!(second.version_number, 2);
        audits.send_for_review(second.id, AUDITOR).expect("review");
        let (report_state, _) = audits.approve(second.id, HEAD, None).expect("approve v2");
        assert!(report_state.is_approved_and_compliant());

        requests.approve_report(id).expect("report approved");
        let approved = requests.approve(id).expect("approved");
        assert_eq!(approved.status, RequestStatus::Approved);
        assert_eq!(approved.completion_date, Some(start() + Duration::days(17)));

        let applicant_notes = f.sink.delivered_to(Recipient::User(APPLICANT));
        assert!(!applicant_notes.is_empty());
        assert!(!f
            .sink
            .delivered_to(Recipient::Role(Role::DepartmentHead))
            .is_empty());
    }

    #[test]
    fn overdue_scan_escalates_a_stalled_request() {
        let f = fixture();
        let request = f
            .workflow
            .requests()
            .create(APPLICANT, application())
            .expect("create");
        f.workflow.requests().submit(request.id, APPLICANT).expect("submit");

        f.clock.advance(Duration::days(100));
        let report = f.workflow.scheduler().run_once().expect("tick");
        assert_eq!(report.overdue.acted, 1);

        let stalled = f.workflow.requests().request(request.id).expect("read");
        assert_eq!(stalled.status, RequestStatus::NewRequest);
        assert!(stalled.is_overdue());
        assert_eq!(
            f.sink
                .delivered_to(Recipient::Role(Role::DepartmentHead))
                .len(),
            1
        );
    }
}

mod http {
    use super::common::*;

    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use energy_licensing::workflows::licensing::licensing_router;

    async fn send(app: &axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(
                Request::post(uri)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(serde_json::to_vec(&body).unwrap()))
                    .unwrap(),
            )
            .await
            .expect("route executes");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        let payload = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json")
        };
        (status, payload)
    }

    #[tokio::test]
    async fn intake_over_http_matches_the_state_machine() {
        let f = fixture();
        let app = licensing_router(f.workflow.clone());

        let (status, created) = send(
            &app,
            "/api/v1/requests",
            json!({
                "applicant_id": APPLICANT.0,
                "facility_name": "Mesa Flats PV",
                "facility_address": "400 County Line Rd",
                "license_type": "distribution",
                "capacity_kw": 900
            }),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id = created["id"].as_u64().expect("id");

        let (status, _) = send(
            &app,
            &format!("/api/v1/requests/{id}/submit"),
            json!({ "user_id": STAFF.0 }),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, submitted) = send(
            &app,
            &format!("/api/v1/requests/{id}/submit"),
            json!({ "user_id": APPLICANT.0 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(submitted["status"], "new_request");

        let (status, rejected) = send(
            &app,
            &format!("/api/v1/requests/{id}/reject"),
            json!({ "reason": "" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(rejected["retryable"], false);

        let (status, rejected) = send(
            &app,
            &format!("/api/v1/requests/{id}/reject"),
            json!({ "reason": "Interconnection study missing" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(rejected["status"], "rejected");
        assert_eq!(rejected["rejection_reason"], "Interconnection study missing");
    }
}
