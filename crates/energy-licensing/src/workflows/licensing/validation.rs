//! Intake validation: raw strings become closed enumerations before any write.

use super::audit::{VersionContent, VersionSubmission};
use super::error::WorkflowError;
use super::requests::{ApplicationDetails, NewLicenseRequest};

pub(crate) fn details_from_request(
    request: NewLicenseRequest,
) -> Result<ApplicationDetails, WorkflowError> {
    let license_type = request.license_type.parse()?;
    let facility_name = required("facility_name", request.facility_name)?;
    let facility_address = required("facility_address", request.facility_address)?;

    Ok(ApplicationDetails {
        facility_name,
        facility_address,
        license_type,
        capacity_kw: request.capacity_kw,
    })
}

pub(crate) fn content_from_submission(
    submission: VersionSubmission,
) -> Result<VersionContent, WorkflowError> {
    let compliance_status = submission.compliance_status.parse()?;
    let risk_level = submission.risk_level.parse()?;
    let summary = required("summary", submission.summary)?;

    Ok(VersionContent {
        summary,
        findings: submission.findings.trim().to_string(),
        recommendations: submission.recommendations.trim().to_string(),
        compliance_status,
        risk_level,
    })
}

pub(crate) fn reason(raw: &str) -> Result<String, WorkflowError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        Err(WorkflowError::MissingReason)
    } else {
        Ok(trimmed.to_string())
    }
}

pub(crate) fn optional_text(raw: Option<String>) -> Option<String> {
    raw.map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn required(field: &'static str, value: String) -> Result<String, WorkflowError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(WorkflowError::MissingField { field })
    } else {
        Ok(trimmed.to_string())
    }
}
