use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::domain::{Appointment, LicenseRequest, NewLicenseRequest, RequestStatus};
use crate::clock::Clock;
use crate::workflows::licensing::deadlines::DeadlinePolicy;
use crate::workflows::licensing::domain::{Capability, EntityRef, Priority, RequestId, Role, UserId};
use crate::workflows::licensing::error::WorkflowError;
use crate::workflows::licensing::repository::{
    deliver, require_capability, EntityStore, Notification, NotificationSink, Recipient,
    UserDirectory,
};
use crate::workflows::licensing::transitions::{ensure_guard, ensure_transition, WorkflowStatus};
use crate::workflows::licensing::validation;

/// Guarded operations over a license request's status.
///
/// Every operation is a single read-modify-write: the request is read, the
/// table edge and any auxiliary guard are checked against that snapshot, and
/// the write is conditional on the snapshot's revision. Notifications go out
/// only after the write has landed.
pub struct RequestStateMachine<S, N, D> {
    store: Arc<S>,
    notifications: Arc<N>,
    directory: Arc<D>,
    clock: Arc<dyn Clock>,
    policy: DeadlinePolicy,
}

impl<S, N, D> RequestStateMachine<S, N, D>
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

    /// Open a draft request and schedule its deadline reminders.
    pub fn create(
        &self,
        applicant: UserId,
        form: NewLicenseRequest,
    ) -> Result<LicenseRequest, WorkflowError> {
        let details = validation::details_from_request(form)?;
        let created_at = self.clock.now();
        let deadline = self.policy.request_deadline(created_at);

        let request = self.store.insert_request(LicenseRequest::draft(
            applicant, details, created_at, deadline,
        ))?;

        let entity = EntityRef::LicenseRequest(request.id);
        for reminder in self.policy.request_reminders(entity, created_at, deadline) {
            self.store.insert_reminder(reminder)?;
        }

        info!(
            request_id = %request.id,
            applicant = %applicant,
            deadline = %deadline,
            "license request drafted"
        );
        Ok(request)
    }

    pub fn request(&self, id: RequestId) -> Result<LicenseRequest, WorkflowError> {
        Ok(self.store.request(id)?)
    }

    pub fn submit(
        &self,
        id: RequestId,
        applicant: UserId,
    ) -> Result<LicenseRequest, WorkflowError> {
        let request = self.transition(id, RequestStatus::NewRequest, "submit", |request, _| {
            ensure_owner(request, applicant)
        })?;
        self.notify(
            Recipient::Role(Role::DepartmentStaff),
            &request,
            "License request submitted",
            format!("{} awaits intake review", request.details.facility_name),
            Priority::Normal,
        );
        Ok(request)
    }

    pub fn accept(&self, id: RequestId) -> Result<LicenseRequest, WorkflowError> {
        let request = self.transition(id, RequestStatus::Accepted, "accept", |_, _| Ok(()))?;
        self.notify_applicant(&request, "License request accepted", Priority::Normal);
        Ok(request)
    }

    pub fn reject(&self, id: RequestId, reason: &str) -> Result<LicenseRequest, WorkflowError> {
        let reason = validation::reason(reason)?;
        let request = self.transition(id, RequestStatus::Rejected, "reject", |request, now| {
            request.rejection_reason = Some(reason);
            request.completion_date = Some(now);
            Ok(())
        })?;
        self.notify_applicant(&request, "License request rejected", Priority::High);
        Ok(request)
    }

    /// Assign (or, from `document_edit`, reassign) an inspector.
    pub fn assign_inspector(
        &self,
        id: RequestId,
        inspector: UserId,
        assigned_by: UserId,
    ) -> Result<LicenseRequest, WorkflowError> {
        require_capability(self.directory.as_ref(), assigned_by, Capability::Assign)?;
        require_capability(self.directory.as_ref(), inspector, Capability::Inspect)?;

        let request = self.transition(
            id,
            RequestStatus::Assigned,
            "assign_inspector",
            |request, now| {
                ensure_guard(
                    EntityRef::LicenseRequest(request.id),
                    request.status,
                    request.status.can_be_assigned(),
                    "assign_inspector",
                )?;
                request.assigned_inspector_id = Some(inspector);
                request.assigned_by_id = Some(assigned_by);
                request.assigned_at = Some(now);
                Ok(())
            },
        )?;

        self.notify(
            Recipient::User(inspector),
            &request,
            "Inspection assigned",
            format!("You are assigned to inspect {}", request.details.facility_name),
            Priority::High,
        );
        self.notify_applicant(&request, "Inspector assigned", Priority::Normal);
        Ok(request)
    }

    pub fn set_appointment(
        &self,
        id: RequestId,
        appointment: Appointment,
    ) -> Result<LicenseRequest, WorkflowError> {
        if appointment.location.trim().is_empty() {
            return Err(WorkflowError::MissingField { field: "location" });
        }
        let request = self.transition(
            id,
            RequestStatus::Appointment,
            "set_appointment",
            |request, _| {
                request.appointment = Some(appointment);
                Ok(())
            },
        )?;

        let message = request
            .appointment
            .as_ref()
            .map(|slot| format!("Inspection on {} at {} ({})", slot.date, slot.time, slot.location))
            .unwrap_or_default();
        self.notify(
            Recipient::User(request.applicant_id),
            &request,
            "Inspection scheduled",
            message.clone(),
            Priority::Normal,
        );
        if let Some(inspector) = request.assigned_inspector_id {
            self.notify(
                Recipient::User(inspector),
                &request,
                "Inspection scheduled",
                message,
                Priority::Normal,
            );
        }
        Ok(request)
    }

    pub fn start_inspection(
        &self,
        id: RequestId,
        inspector: UserId,
    ) -> Result<LicenseRequest, WorkflowError> {
        self.transition(
            id,
            RequestStatus::Inspecting,
            "start_inspection",
            |request, now| {
                ensure_assigned(request, inspector)?;
                request.inspection_date = Some(now);
                Ok(())
            },
        )
    }

    pub fn complete_inspection(
        &self,
        id: RequestId,
        inspector: UserId,
    ) -> Result<LicenseRequest, WorkflowError> {
        let request = self.transition(
            id,
            RequestStatus::InspectionDone,
            "complete_inspection",
            |request, _| ensure_assigned(request, inspector),
        )?;
        self.notify(
            Recipient::Role(Role::DepartmentStaff),
            &request,
            "Inspection completed",
            format!("{} is ready for document review", request.details.facility_name),
            Priority::Normal,
        );
        Ok(request)
    }

    /// Hand the request back to the applicant to correct documents.
    pub fn open_document_review(
        &self,
        id: RequestId,
        note: Option<String>,
    ) -> Result<LicenseRequest, WorkflowError> {
        let note = validation::optional_text(note);
        let request = self.transition(
            id,
            RequestStatus::DocumentEdit,
            "open_document_review",
            |_, _| Ok(()),
        )?;
        self.notify(
            Recipient::User(request.applicant_id),
            &request,
            "Document corrections requested",
            note.unwrap_or_else(|| "Please review the inspection findings".to_string()),
            Priority::High,
        );
        Ok(request)
    }

    /// Move to `report_approved`; requires an approved audit report whose
    /// compliance is the highest level.
    pub fn approve_report(&self, id: RequestId) -> Result<LicenseRequest, WorkflowError> {
        let reports = self.store.reports_for_request(id)?;
        let compliant = reports.iter().any(|report| report.is_approved_and_compliant());

        let request = self.transition(
            id,
            RequestStatus::ReportApproved,
            "approve_report",
            |request, _| {
                ensure_guard(
                    EntityRef::LicenseRequest(request.id),
                    request.status,
                    compliant,
                    "approve_report",
                )
            },
        )?;
        self.notify(
            Recipient::Role(Role::DepartmentHead),
            &request,
            "Audit report approved",
            format!("{} awaits the final decision", request.details.facility_name),
            Priority::High,
        );
        Ok(request)
    }

    pub fn approve(&self, id: RequestId) -> Result<LicenseRequest, WorkflowError> {
        let request = self.transition(id, RequestStatus::Approved, "approve", |request, now| {
            ensure_guard(
                EntityRef::LicenseRequest(request.id),
                request.status,
                request.status.is_inspection_done(),
                "approve",
            )?;
            request.completion_date = Some(now);
            Ok(())
        })?;
        self.notify_applicant(&request, "License approved", Priority::High);
        Ok(request)
    }

    pub fn reject_final(
        &self,
        id: RequestId,
        reason: &str,
    ) -> Result<LicenseRequest, WorkflowError> {
        let reason = validation::reason(reason)?;
        let request = self.transition(
            id,
            RequestStatus::RejectedFinal,
            "reject_final",
            |request, now| {
                request.rejection_reason = Some(reason);
                request.completion_date = Some(now);
                Ok(())
            },
        )?;
        self.notify_applicant(&request, "License request rejected", Priority::High);
        Ok(request)
    }

    /// Hard-delete a draft and its reminders. Only the applicant may do this.
    pub fn delete_draft(&self, id: RequestId, requester: UserId) -> Result<(), WorkflowError> {
        let request = self.store.request(id)?;
        let entity = EntityRef::LicenseRequest(id);
        ensure_guard(
            entity,
            request.status,
            request.status == RequestStatus::Draft,
            "delete_draft",
        )?;
        ensure_owner(&request, requester)?;

        self.store.delete_request(&request)?;
        let removed = self.store.delete_reminders_for(entity)?;
        info!(request_id = %id, reminders = removed, "draft license request deleted");
        Ok(())
    }

    fn transition<F>(
        &self,
        id: RequestId,
        to: RequestStatus,
        action: &'static str,
        apply: F,
    ) -> Result<LicenseRequest, WorkflowError>
    where
        F: FnOnce(&mut LicenseRequest, DateTime<Utc>) -> Result<(), WorkflowError>,
    {
        let mut request = self.store.request(id)?;
        let from = request.status;
        ensure_transition(EntityRef::LicenseRequest(id), from, to, action)?;

        let now = self.clock.now();
        let stalled_since = request.stalled_since();
        apply(&mut request, now)?;
        request.status = to;
        request.updated_at = now;
        if to.is_terminal() {
            request.overdue = None;
        }

        let saved = self.store.save_request(&request)?;
        info!(
            request_id = %id,
            from = from.label(),
            to = to.label(),
            action,
            revision = saved.revision,
            "license request transitioned"
        );
        if let Some(flagged_at) = stalled_since {
            info!(
                request_id = %id,
                stalled_in = from.label(),
                stalled_days = (now - flagged_at).num_days(),
                "overdue license request moved on"
            );
        }
        Ok(saved)
    }

    fn notify_applicant(&self, request: &LicenseRequest, title: &str, priority: Priority) {
        let message = format!(
            "{} is now {}",
            request.details.facility_name,
            request.status.label()
        );
        self.notify(
            Recipient::User(request.applicant_id),
            request,
            title,
            message,
            priority,
        );
    }

    fn notify(
        &self,
        recipient: Recipient,
        request: &LicenseRequest,
        title: &str,
        message: String,
        priority: Priority,
    ) {
        let notification = Notification::new(
            title,
            message,
            priority,
            EntityRef::LicenseRequest(request.id),
        );
        if deliver(self.notifications.as_ref(), recipient, &notification) {
            debug!(%recipient, request_id = %request.id, title, "notification delivered");
        }
    }
}

fn ensure_owner(request: &LicenseRequest, user: UserId) -> Result<(), WorkflowError> {
    if request.applicant_id == user {
        Ok(())
    } else {
        Err(WorkflowError::NotOwner {
            user,
            entity: EntityRef::LicenseRequest(request.id),
        })
    }
}

fn ensure_assigned(request: &LicenseRequest, inspector: UserId) -> Result<(), WorkflowError> {
    if request.assigned_inspector_id == Some(inspector) {
        Ok(())
    } else {
        Err(WorkflowError::NotAssignedInspector {
            user: inspector,
            request: request.id,
        })
    }
}
