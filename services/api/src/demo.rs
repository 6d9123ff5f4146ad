use crate::infra::{parse_day_start, seeded_accounts};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use clap::Args;
use energy_licensing::clock::{Clock, ManualClock};
use energy_licensing::config::{DeadlineConfig, SchedulerConfig};
use energy_licensing::error::AppError;
use energy_licensing::workflows::licensing::{
    Appointment, InMemoryEntityStore, InMemoryUserDirectory, InspectionId, LicenseRequest,
    LicensingWorkflow, NewAuditReport, NewLicenseRequest, RecordingNotificationSink,
    ScanSummary, UserId, VersionSubmission, REQUEST_DEADLINE_DAYS,
};
use std::sync::Arc;

const APPLICANT: UserId = UserId(1);
const STAFF: UserId = UserId(2);
const INSPECTOR: UserId = UserId(3);
const AUDITOR: UserId = UserId(4);

type DemoWorkflow =
    LicensingWorkflow<InMemoryEntityStore, RecordingNotificationSink, InMemoryUserDirectory>;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Day the sample requests are filed (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = parse_day_start)]
    pub(crate) created_at: Option<DateTime<Utc>>,
    /// Days to let the stalled request sit before the deadline scan.
    #[arg(long, default_value_t = 95)]
    pub(crate) stall_days: i64,
    /// Print every notification the demo produced.
    #[arg(long)]
    pub(crate) show_notifications: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ScanArgs {
    /// Day the seeded requests are filed (YYYY-MM-DD). Defaults to 90 days before `--now`.
    #[arg(long, value_parser = parse_day_start)]
    pub(crate) created_at: Option<DateTime<Utc>>,
    /// Instant the tick runs at (YYYY-MM-DD, midnight UTC).
    #[arg(long, value_parser = parse_day_start)]
    pub(crate) now: DateTime<Utc>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        created_at,
        stall_days,
        show_notifications,
    } = args;

    let created_at = created_at.unwrap_or_else(Utc::now);
    let (workflow, clock, sink) = demo_workflow(created_at);

    println!("Energy licensing demo (filed {})", created_at.date_naive());
    let approved = walk_to_approval(&workflow, &clock)?;
    println!(
        "- {} approved on {} (deadline {})",
        approved.id,
        approved
            .completion_date
            .map(|at| at.date_naive().to_string())
            .unwrap_or_else(|| "-".to_string()),
        approved.deadline().date_naive()
    );

    let stalled = workflow
        .requests()
        .create(APPLICANT, sample_request("Harbor Battery Park", "storage"))?;
    let stalled = workflow.requests().submit(stalled.id, APPLICANT)?;
    clock.advance(Duration::days(stall_days));
    let tick = workflow.scheduler().run_once()?;
    println!(
        "\nDeadline scan at {} for {} ({})",
        tick.ran_at.date_naive(),
        stalled.id,
        stalled.status.label()
    );
    print_summary("overdue", &tick.overdue);
    print_summary("reminders", &tick.reminders);

    print_deliveries(&sink, show_notifications);
    Ok(())
}

/// Seed one request per open pipeline stage, then run a single scheduler tick at `now`.
pub(crate) fn run_scan(args: ScanArgs) -> Result<(), AppError> {
    let ScanArgs { created_at, now } = args;
    let created_at = created_at.unwrap_or_else(|| now - Duration::days(REQUEST_DEADLINE_DAYS));
    let (workflow, clock, sink) = demo_workflow(created_at);
    let requests = workflow.requests();

    let draft = requests.create(APPLICANT, sample_request("Dry Creek Hydro", "generation"))?;
    let filed = requests.create(APPLICANT, sample_request("Lakeside Feeder", "distribution"))?;
    requests.submit(filed.id, APPLICANT)?;
    let assigned = requests.create(APPLICANT, sample_request("Eastline 345kV", "transmission"))?;
    requests.submit(assigned.id, APPLICANT)?;
    requests.accept(assigned.id)?;
    requests.assign_inspector(assigned.id, INSPECTOR, STAFF)?;
    let closed = requests.create(APPLICANT, sample_request("Retail Power Co", "supply"))?;
    requests.submit(closed.id, APPLICANT)?;
    requests.reject(closed.id, "Applicant withdrew")?;

    clock.set(now);
    let tick = workflow.scheduler().run_once()?;
    println!(
        "Deadline scan at {} over requests filed {}",
        tick.ran_at.to_rfc3339(),
        created_at.date_naive()
    );
    print_summary("overdue", &tick.overdue);
    print_summary("reminders", &tick.reminders);
    for id in [draft.id, filed.id, assigned.id, closed.id] {
        let request = requests.request(id)?;
        let standing = match request.stalled_since() {
            Some(flagged_at) => format!("overdue, stalled since {}", flagged_at.date_naive()),
            None if request.is_overdue() => "overdue".to_string(),
            None => "on time".to_string(),
        };
        println!(
            "  {} {} | deadline {} | {}",
            request.id,
            request.status.label(),
            request.deadline().date_naive(),
            standing
        );
    }
    print_deliveries(&sink, true);
    Ok(())
}

fn demo_workflow(
    created_at: DateTime<Utc>,
) -> (DemoWorkflow, Arc<ManualClock>, Arc<RecordingNotificationSink>) {
    let clock = Arc::new(ManualClock::new(created_at));
    let sink = Arc::new(RecordingNotificationSink::new());
    let dyn_clock: Arc<dyn Clock> = clock.clone();
    let workflow = DemoWorkflow::new(
        Arc::new(InMemoryEntityStore::new()),
        sink.clone(),
        Arc::new(InMemoryUserDirectory::with_users(seeded_accounts())),
        dyn_clock,
        SchedulerConfig::default(),
        &DeadlineConfig::default(),
    );
    (workflow, clock, sink)
}

fn print_deliveries(sink: &RecordingNotificationSink, list: bool) {
    let deliveries = sink.delivered();
    println!("\n{} notifications delivered", deliveries.len());
    if !list {
        return;
    }
    for delivery in deliveries {
        println!(
            "  - [{:?}] {} -> {}: {}",
            delivery.notification.priority,
            delivery.recipient,
            delivery.notification.title,
            delivery.notification.message
        );
    }
}

fn walk_to_approval(
    workflow: &DemoWorkflow,
    clock: &ManualClock,
) -> Result<LicenseRequest, AppError> {
    let requests = workflow.requests();
    let audits = workflow.audits();

    let request = requests.create(APPLICANT, sample_request("Copper Hill Wind", "generation"))?;
    let id = request.id;
    report_step(&requests.submit(id, APPLICANT)?);
    report_step(&requests.accept(id)?);
    report_step(&requests.assign_inspector(id, INSPECTOR, STAFF)?);

    let visit = clock.now() + Duration::days(10);
    report_step(&requests.set_appointment(
        id,
        Appointment {
            date: visit.date_naive(),
            time: NaiveTime::from_hms_opt(9, 30, 0).unwrap_or_default(),
            location: "Substation yard".to_string(),
        },
    )?);
    clock.advance(Duration::days(10));
    report_step(&requests.start_inspection(id, INSPECTOR)?);

    let (_, draft) = audits.create_report(NewAuditReport {
        request_id: id,
        inspection_id: InspectionId(1),
        inspector_id: INSPECTOR,
        content: VersionSubmission {
            summary: "Turbine foundations and collector system inspected".to_string(),
            findings: "No deviations from the approved design".to_string(),
            recommendations: String::new(),
            compliance_status: "compliant".to_string(),
            risk_level: "low".to_string(),
        },
    })?;
    report_step(&requests.complete_inspection(id, INSPECTOR)?);

    clock.advance(Duration::days(3));
    audits.submit_version(draft.id, INSPECTOR)?;
    let (report, _) = audits.approve(draft.id, AUDITOR, Some("Meets code".to_string()))?;
    println!(
        "  audit {} -> {} ({})",
        report.id,
        report.status.label(),
        report.compliance_status.label()
    );

    report_step(&requests.open_document_review(id, None)?);
    report_step(&requests.approve_report(id)?);
    clock.advance(Duration::days(2));
    let approved = requests.approve(id)?;
    report_step(&approved);
    Ok(approved)
}

fn sample_request(name: &str, license_type: &str) -> NewLicenseRequest {
    NewLicenseRequest {
        facility_name: name.to_string(),
        facility_address: "1 Grid Way".to_string(),
        license_type: license_type.to_string(),
        capacity_kw: 25_000,
    }
}

fn report_step(request: &LicenseRequest) {
    println!(
        "  {} -> {} at {}",
        request.id,
        request.status.label(),
        request.updated_at.format("%Y-%m-%d")
    );
}

fn print_summary(label: &str, summary: &ScanSummary) {
    println!(
        "- {label}: {} scanned | {} acted | {} skipped | {} failed",
        summary.scanned, summary.acted, summary.skipped, summary.failed
    );
}
