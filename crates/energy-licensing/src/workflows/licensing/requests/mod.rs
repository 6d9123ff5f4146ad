//! License request pipeline.

mod domain;
mod service;

pub use domain::{
    ApplicationDetails, Appointment, LicenseRequest, LicenseType, NewLicenseRequest,
    OverdueFlag, RequestStatus, ResponsibleParty,
};
pub use service::RequestStateMachine;
