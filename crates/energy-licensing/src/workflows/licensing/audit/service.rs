use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::info;

use super::domain::{
    AuditReport, AuditReportVersion, AuditStatus, NewAuditReport, VersionOutcome,
    VersionSubmission,
};
use crate::clock::Clock;
use crate::workflows::licensing::deadlines::DeadlinePolicy;
use crate::workflows::licensing::domain::{
    Capability, EntityRef, Priority, ReportId, Role, UserId, VersionId,
};
use crate::workflows::licensing::error::WorkflowError;
use crate::workflows::licensing::repository::{
    deliver, require_capability, EntityStore, Notification, NotificationSink, Recipient,
    UserDirectory,
};
use crate::workflows::licensing::requests::RequestStatus;
use crate::workflows::licensing::transitions::{ensure_guard, ensure_transition};
use crate::workflows::licensing::validation;

type Versioned = (AuditReport, AuditReportVersion);

/// Versioned audit findings with write-through report status.
pub struct AuditVersionWorkflow<S, N, D> {
    store: Arc<S>,
    notifications: Arc<N>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    policy: DeadlinePolicy,
}

impl<S, N, D> AuditVersionWorkflow<S, N, D>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    pub fn new(
        store: Arc<S>,
        notifications: Arc<N>,
        directory: Arc<D>,
        clock: Arc<dyn Clock>,
        policy: DeadlinePolicy,
    ) -> Self {
        Self {
            store,
            notifications,
            directory,
            clock,
            policy,
        }
    }

    /// Open a report on an inspection with a draft version 1.
    pub fn create_report(&self, input: NewAuditReport) -> Result<Versioned, WorkflowError> {
        let content = validation::content_from_submission(input.content)?;
        require_capability(self.directory.as_ref(), input.inspector_id, Capability::Inspect)?;

        let request = self.store.request(input.request_id)?;
        ensure_guard(
            EntityRef::LicenseRequest(request.id),
            request.status,
            matches!(
                request.status,
                RequestStatus::Inspecting
                    | RequestStatus::InspectionDone
                    | RequestStatus::DocumentEdit
            ),
            "create_report",
        )?;
        if request.assigned_inspector_id != Some(input.inspector_id) {
            return Err(WorkflowError::NotAssignedInspector {
                user: input.inspector_id,
                request: request.id,
            });
        }

        let now = self.clock.now();
        let report = AuditReport {
            id: ReportId(0),
            request_id: input.request_id,
            inspection_id: input.inspection_id,
            inspector_id: input.inspector_id,
            reviewer_id: None,
            status: AuditStatus::Draft,
            compliance_status: content.compliance_status,
            risk_level: content.risk_level,
            latest_version: 1,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let version = AuditReportVersion {
            id: VersionId(0),
            report_id: ReportId(0),
            version_number: 1,
            content,
            status: AuditStatus::Draft,
            submitted_by_id: input.inspector_id,
            outcome: VersionOutcome::Pending,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let (report, version) = self.store.insert_report(report, version)?;

        let entity = EntityRef::AuditReport(report.id);
        let deadline = self.policy.review_deadline(now);
        for reminder in self.policy.report_reminders(entity, now, deadline) {
            self.store.insert_reminder(reminder)?;
        }

        info!(
            report_id = %report.id,
            request_id = %report.request_id,
            inspector = %report.inspector_id,
            "audit report opened"
        );
        Ok((report, version))
    }

    /// Supersede the latest version with the next number.
    ///
    /// The latest version must be a draft or already closed by a reviewer
    /// (`needs_edit`, `rejected`); a version in review cannot be superseded.
    pub fn create_version(
        &self,
        report_id: ReportId,
        submission: VersionSubmission,
        submitted_by: UserId,
        submit: bool,
    ) -> Result<Versioned, WorkflowError> {
        let content = validation::content_from_submission(submission)?;
        let report = self.store.report(report_id)?;
        let entity = EntityRef::AuditReport(report_id);
        if report.inspector_id != submitted_by {
            return Err(WorkflowError::NotOwner {
                user: submitted_by,
                entity,
            });
        }
        ensure_guard(
            entity,
            report.status,
            report.status.accepts_new_version(),
            "create_version",
        )?;

        let now = self.clock.now();
        let status = if submit {
            AuditStatus::Submitted
        } else {
            AuditStatus::Draft
        };
        let version = AuditReportVersion {
            id: VersionId(0),
            report_id,
            version_number: report.latest_version + 1,
            content,
            status,
            submitted_by_id: submitted_by,
            outcome: VersionOutcome::Pending,
            created_at: now,
            updated_at: now,
            revision: 0,
        };
        let (report, version) = self.store.append_version(&report, version)?;

        info!(
            report_id = %report.id,
            version_id = %version.id,
            version_number = version.version_number,
            status = version.status.label(),
            "audit report version created"
        );
        if version.status == AuditStatus::Submitted {
            self.notify_reviewers(&report, &version);
        }
        Ok((report, version))
    }

    pub fn submit_version(
        &self,
        version_id: VersionId,
        submitted_by: UserId,
    ) -> Result<Versioned, WorkflowError> {
        let (report, version) = self.transition_version(
            version_id,
            AuditStatus::Submitted,
            "submit_version",
            |report, version, _| {
                if report.inspector_id != submitted_by {
                    return Err(WorkflowError::NotOwner {
                        user: submitted_by,
                        entity: EntityRef::AuditReport(report.id),
                    });
                }
                version.submitted_by_id = submitted_by;
                Ok(())
            },
        )?;
        self.notify_reviewers(&report, &version);
        Ok((report, version))
    }

    pub fn send_for_review(
        &self,
        version_id: VersionId,
        reviewer: UserId,
    ) -> Result<Versioned, WorkflowError> {
        require_capability(self.directory.as_ref(), reviewer, Capability::Review)?;
        let (report, version) = self.transition_version(
            version_id,
            AuditStatus::UnderReview,
            "send_for_review",
            |report, _, _| {
                report.reviewer_id = Some(reviewer);
                Ok(())
            },
        )?;
        self.notify(
            Recipient::User(version.submitted_by_id),
            &version,
            "Audit report under review",
            format!("Version {} is being reviewed", version.version_number),
            Priority::Normal,
        );
        Ok((report, version))
    }

    pub fn approve(
        &self,
        version_id: VersionId,
        approved_by: UserId,
        comments: Option<String>,
    ) -> Result<Versioned, WorkflowError> {
        require_capability(self.directory.as_ref(), approved_by, Capability::Review)?;
        let comments = validation::optional_text(comments);
        let (report, version) = self.transition_version(
            version_id,
            AuditStatus::Approved,
            "approve",
            |report, version, _| {
                report.reviewer_id = Some(approved_by);
                version.outcome = VersionOutcome::Approved {
                    approved_by_id: approved_by,
                    comments,
                };
                Ok(())
            },
        )?;

        let message = format!(
            "Version {} approved as {}",
            version.version_number,
            version.content.compliance_status.label()
        );
        self.notify(
            Recipient::User(version.submitted_by_id),
            &version,
            "Audit report approved",
            message.clone(),
            Priority::Normal,
        );
        self.notify(
            Recipient::Role(Role::DepartmentHead),
            &version,
            "Audit report approved",
            message,
            Priority::High,
        );
        Ok((report, version))
    }

    pub fn reject(
        &self,
        version_id: VersionId,
        rejected_by: UserId,
        reason: &str,
        comments: Option<String>,
    ) -> Result<Versioned, WorkflowError> {
        let reason = validation::reason(reason)?;
        require_capability(self.directory.as_ref(), rejected_by, Capability::Review)?;
        let comments = validation::optional_text(comments);
        let (report, version) = self.transition_version(
            version_id,
            AuditStatus::Rejected,
            "reject",
            |report, version, _| {
                report.reviewer_id = Some(rejected_by);
                version.outcome = VersionOutcome::Rejected {
                    rejected_by_id: rejected_by,
                    reason,
                    comments,
                };
                Ok(())
            },
        )?;

        let reason = match &version.outcome {
            VersionOutcome::Rejected { reason, .. } => reason.clone(),
            _ => String::new(),
        };
        self.notify(
            Recipient::User(version.submitted_by_id),
            &version,
            "Audit report rejected",
            reason,
            Priority::High,
        );
        Ok((report, version))
    }

    pub fn request_edit(
        &self,
        version_id: VersionId,
        requested_by: UserId,
        comments: Option<String>,
    ) -> Result<Versioned, WorkflowError> {
        require_capability(self.directory.as_ref(), requested_by, Capability::Review)?;
        let comments = validation::optional_text(comments);
        let message = comments
            .clone()
            .unwrap_or_else(|| "Please revise the findings".to_string());
        let (report, version) = self.transition_version(
            version_id,
            AuditStatus::NeedsEdit,
            "request_edit",
            |report, version, _| {
                report.reviewer_id = Some(requested_by);
                version.outcome = VersionOutcome::EditRequested {
                    requested_by_id: requested_by,
                    comments,
                };
                Ok(())
            },
        )?;
        self.notify(
            Recipient::User(version.submitted_by_id),
            &version,
            "Audit report needs edits",
            message,
            Priority::High,
        );
        Ok((report, version))
    }

    /// Remove a superseded draft. The latest version is never deletable.
    pub fn delete_version(&self, version_id: VersionId) -> Result<AuditReport, WorkflowError> {
        let version = self.store.version(version_id)?;
        let report = self.store.report(version.report_id)?;
        if version.version_number == report.latest_version {
            return Err(WorkflowError::CannotDeleteLatest {
                report: report.id,
                version_number: version.version_number,
            });
        }
        ensure_guard(
            EntityRef::AuditReportVersion(version_id),
            version.status,
            version.status == AuditStatus::Draft,
            "delete_version",
        )?;

        let report = self.store.delete_version(&report, version_id)?;
        info!(
            report_id = %report.id,
            version_number = version.version_number,
            "superseded audit draft deleted"
        );
        Ok(report)
    }

    /// Hard-delete a report that never left draft, with its reminders.
    pub fn delete_report(
        &self,
        report_id: ReportId,
        requester: UserId,
    ) -> Result<(), WorkflowError> {
        let report = self.store.report(report_id)?;
        let entity = EntityRef::AuditReport(report_id);
        if report.inspector_id != requester {
            return Err(WorkflowError::NotOwner {
                user: requester,
                entity,
            });
        }
        let versions = self.store.versions(report_id)?;
        let untouched = versions
            .iter()
            .all(|version| version.status == AuditStatus::Draft);
        ensure_guard(entity, report.status, untouched, "delete_report")?;

        self.store.delete_report(&report)?;
        let removed = self.store.delete_reminders_for(entity)?;
        info!(report_id = %report_id, reminders = removed, "draft audit report deleted");
        Ok(())
    }

    pub fn report(&self, id: ReportId) -> Result<AuditReport, WorkflowError> {
        Ok(self.store.report(id)?)
    }

    pub fn version(&self, id: VersionId) -> Result<AuditReportVersion, WorkflowError> {
        Ok(self.store.version(id)?)
    }

    pub fn versions(&self, report: ReportId) -> Result<Vec<AuditReportVersion>, WorkflowError> {
        Ok(self.store.versions(report)?)
    }

    fn transition_version<F>(
        &self,
        version_id: VersionId,
        to: AuditStatus,
        action: &'static str,
        apply: F,
    ) -> Result<Versioned, WorkflowError>
    where
        F: FnOnce(&mut AuditReport, &mut AuditReportVersion, DateTime<Utc>)
            -> Result<(), WorkflowError>,
    {
        let mut version = self.store.version(version_id)?;
        let mut report = self.store.report(version.report_id)?;
        let entity = EntityRef::AuditReportVersion(version_id);
        let from = version.status;

        ensure_guard(
            entity,
            from,
            version.version_number == report.latest_version,
            action,
        )?;
        ensure_transition(entity, from, to, action)?;

        let now = self.clock.now();
        apply(&mut report, &mut version, now)?;
        version.status = to;
        version.updated_at = now;

        let (report, version) = self.store.save_version(&report, &version)?;
        info!(
            report_id = %report.id,
            version_id = %version_id,
            version_number = version.version_number,
            from = from.label(),
            to = to.label(),
            action,
            "audit report version transitioned"
        );
        Ok((report, version))
    }

    fn notify_reviewers(&self, report: &AuditReport, version: &AuditReportVersion) {
        let recipient = report
            .reviewer_id
            .map(Recipient::User)
            .unwrap_or(Recipient::Role(Role::Auditor));
        self.notify(
            recipient,
            version,
            "Audit report submitted",
            format!(
                "Version {} of {} awaits review",
                version.version_number, report.id
            ),
            Priority::Normal,
        );
    }

    fn notify(
        &self,
        recipient: Recipient,
        version: &AuditReportVersion,
        title: &str,
        message: String,
        priority: Priority,
    ) {
        let notification = Notification::new(
            title,
            message,
            priority,
            EntityRef::AuditReportVersion(version.id),
        );
        deliver(self.notifications.as_ref(), recipient, &notification);
    }
}
