use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::audit::{NewAuditReport, VersionSubmission};
use super::deadlines::SchedulerError;
use super::domain::{ReportId, RequestId, UserId, VersionId};
use super::error::WorkflowError;
use super::repository::{EntityStore, NotificationSink, UserDirectory};
use super::requests::{Appointment, NewLicenseRequest};
use super::workflow::LicensingWorkflow;

type Shared<S, N, D> = State<Arc<LicensingWorkflow<S, N, D>>>;

/// HTTP surface over the licensing workflow.
pub fn licensing_router<S, N, D>(workflow: Arc<LicensingWorkflow<S, N, D>>) -> Router
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Router::new()
        .route("/api/v1/requests", post(create_request::<S, N, D>))
        .route(
            "/api/v1/requests/:id",
            get(get_request::<S, N, D>).delete(delete_draft::<S, N, D>),
        )
        .route("/api/v1/requests/:id/submit", post(submit::<S, N, D>))
        .route("/api/v1/requests/:id/accept", post(accept::<S, N, D>))
        .route("/api/v1/requests/:id/reject", post(reject::<S, N, D>))
        .route("/api/v1/requests/:id/assign", post(assign::<S, N, D>))
        .route(
            "/api/v1/requests/:id/appointment",
            post(set_appointment::<S, N, D>),
        )
        .route(
            "/api/v1/requests/:id/start-inspection",
            post(start_inspection::<S, N, D>),
        )
        .route(
            "/api/v1/requests/:id/complete-inspection",
            post(complete_inspection::<S, N, D>),
        )
        .route(
            "/api/v1/requests/:id/document-review",
            post(document_review::<S, N, D>),
        )
        .route(
            "/api/v1/requests/:id/approve-report",
            post(approve_report::<S, N, D>),
        )
        .route("/api/v1/requests/:id/approve", post(approve::<S, N, D>))
        .route(
            "/api/v1/requests/:id/reject-final",
            post(reject_final::<S, N, D>),
        )
        .route("/api/v1/audit-reports", post(create_report::<S, N, D>))
        .route(
            "/api/v1/audit-reports/:id",
            get(get_report::<S, N, D>).delete(delete_report::<S, N, D>),
        )
        .route(
            "/api/v1/audit-reports/:id/versions",
            get(list_versions::<S, N, D>).post(create_version::<S, N, D>),
        )
        .route(
            "/api/v1/audit-versions/:id",
            get(get_version::<S, N, D>).delete(delete_version::<S, N, D>),
        )
        .route(
            "/api/v1/audit-versions/:id/submit",
            post(submit_version::<S, N, D>),
        )
        .route(
            "/api/v1/audit-versions/:id/review",
            post(send_for_review::<S, N, D>),
        )
        .route(
            "/api/v1/audit-versions/:id/approve",
            post(approve_version::<S, N, D>),
        )
        .route(
            "/api/v1/audit-versions/:id/reject",
            post(reject_version::<S, N, D>),
        )
        .route(
            "/api/v1/audit-versions/:id/request-edit",
            post(request_edit::<S, N, D>),
        )
        .route(
            "/api/v1/admin/deadlines",
            get(scheduler_status::<S, N, D>),
        )
        .route(
            "/api/v1/admin/deadlines/run",
            post(run_deadlines::<S, N, D>),
        )
        .with_state(workflow)
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateRequestBody {
    pub(crate) applicant_id: UserId,
    #[serde(flatten)]
    pub(crate) form: NewLicenseRequest,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActorBody {
    pub(crate) user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReasonBody {
    #[serde(default)]
    pub(crate) reason: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AssignBody {
    pub(crate) inspector_id: UserId,
    pub(crate) assigned_by_id: UserId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InspectorBody {
    pub(crate) inspector_id: UserId,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct NoteBody {
    #[serde(default)]
    pub(crate) note: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateVersionBody {
    pub(crate) submitted_by_id: UserId,
    #[serde(default)]
    pub(crate) submit: bool,
    #[serde(flatten)]
    pub(crate) content: VersionSubmission,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReviewBody {
    pub(crate) reviewer_id: UserId,
    #[serde(default)]
    pub(crate) reason: String,
    #[serde(default)]
    pub(crate) comments: Option<String>,
}

pub(crate) async fn create_request<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Json(body): Json<CreateRequestBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let request = workflow.requests().create(body.applicant_id, body.form)?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

pub(crate) async fn get_request<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().request(id)?).into_response())
}

pub(crate) async fn delete_draft<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<ActorBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    workflow.requests().delete_draft(id, body.user_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn submit<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<ActorBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().submit(id, body.user_id)?).into_response())
}

pub(crate) async fn accept<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().accept(id)?).into_response())
}

pub(crate) async fn reject<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<ReasonBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().reject(id, &body.reason)?).into_response())
}

pub(crate) async fn assign<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<AssignBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let request = workflow
        .requests()
        .assign_inspector(id, body.inspector_id, body.assigned_by_id)?;
    Ok(Json(request).into_response())
}

pub(crate) async fn set_appointment<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(appointment): Json<Appointment>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().set_appointment(id, appointment)?).into_response())
}

pub(crate) async fn start_inspection<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<InspectorBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().start_inspection(id, body.inspector_id)?).into_response())
}

pub(crate) async fn complete_inspection<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<InspectorBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let request = workflow
        .requests()
        .complete_inspection(id, body.inspector_id)?;
    Ok(Json(request).into_response())
}

pub(crate) async fn document_review<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<NoteBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().open_document_review(id, body.note)?).into_response())
}

pub(crate) async fn approve_report<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().approve_report(id)?).into_response())
}

pub(crate) async fn approve<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().approve(id)?).into_response())
}

pub(crate) async fn reject_final<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<RequestId>,
    Json(body): Json<ReasonBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.requests().reject_final(id, &body.reason)?).into_response())
}

pub(crate) async fn create_report<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Json(input): Json<NewAuditReport>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let (report, version) = workflow.audits().create_report(input)?;
    let payload = json!({ "report": report, "version": version });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn get_report<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<ReportId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.audits().report(id)?).into_response())
}

pub(crate) async fn delete_report<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<ReportId>,
    Json(body): Json<ActorBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    workflow.audits().delete_report(id, body.user_id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn list_versions<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<ReportId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.audits().versions(id)?).into_response())
}

pub(crate) async fn create_version<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<ReportId>,
    Json(body): Json<CreateVersionBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let (report, version) =
        workflow
            .audits()
            .create_version(id, body.content, body.submitted_by_id, body.submit)?;
    let payload = json!({ "report": report, "version": version });
    Ok((StatusCode::CREATED, Json(payload)).into_response())
}

pub(crate) async fn get_version<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<VersionId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.audits().version(id)?).into_response())
}

pub(crate) async fn delete_version<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<VersionId>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.audits().delete_version(id)?).into_response())
}

pub(crate) async fn submit_version<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<VersionId>,
    Json(body): Json<ActorBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let (report, version) = workflow.audits().submit_version(id, body.user_id)?;
    Ok(Json(json!({ "report": report, "version": version })).into_response())
}

pub(crate) async fn send_for_review<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<VersionId>,
    Json(body): Json<ReviewBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let (report, version) = workflow.audits().send_for_review(id, body.reviewer_id)?;
    Ok(Json(json!({ "report": report, "version": version })).into_response())
}

pub(crate) async fn approve_version<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<VersionId>,
    Json(body): Json<ReviewBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let (report, version) = workflow
        .audits()
        .approve(id, body.reviewer_id, body.comments)?;
    Ok(Json(json!({ "report": report, "version": version })).into_response())
}

pub(crate) async fn reject_version<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<VersionId>,
    Json(body): Json<ReviewBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let (report, version) =
        workflow
            .audits()
            .reject(id, body.reviewer_id, &body.reason, body.comments)?;
    Ok(Json(json!({ "report": report, "version": version })).into_response())
}

pub(crate) async fn request_edit<S, N, D>(
    State(workflow): Shared<S, N, D>,
    Path(id): Path<VersionId>,
    Json(body): Json<ReviewBody>,
) -> Result<Response, WorkflowError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    let (report, version) = workflow
        .audits()
        .request_edit(id, body.reviewer_id, body.comments)?;
    Ok(Json(json!({ "report": report, "version": version })).into_response())
}

pub(crate) async fn scheduler_status<S, N, D>(State(workflow): Shared<S, N, D>) -> Response
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Json(json!({ "status": workflow.scheduler().status() })).into_response()
}

pub(crate) async fn run_deadlines<S, N, D>(
    State(workflow): Shared<S, N, D>,
) -> Result<Response, SchedulerError>
where
    S: EntityStore + 'static,
    N: NotificationSink + 'static,
    D: UserDirectory + 'static,
{
    Ok(Json(workflow.scheduler().run_once()?).into_response())
}

impl WorkflowError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WorkflowError::InvalidTransition { .. }
            | WorkflowError::CannotDeleteLatest { .. }
            | WorkflowError::ConcurrentModification(_) => StatusCode::CONFLICT,
            WorkflowError::InvalidEnumValue { .. }
            | WorkflowError::MissingReason
            | WorkflowError::MissingField { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            WorkflowError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkflowError::MissingCapability { .. }
            | WorkflowError::NotAssignedInspector { .. }
            | WorkflowError::NotOwner { .. } => StatusCode::FORBIDDEN,
            WorkflowError::Store(_) | WorkflowError::Directory(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let payload = json!({
            "error": self.to_string(),
            "retryable": self.is_retryable(),
        });
        (status, Json(payload)).into_response()
    }
}

impl IntoResponse for SchedulerError {
    fn into_response(self) -> Response {
        let status = match self {
            SchedulerError::AlreadyRunning => StatusCode::CONFLICT,
            SchedulerError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
            SchedulerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let payload = json!({ "error": self.to_string() });
        (status, Json(payload)).into_response()
    }
}
