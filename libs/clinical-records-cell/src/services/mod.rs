pub mod consents;
pub mod odontograms;
pub mod radiographs;
pub mod scope;
pub mod treatments;

pub use consents::ConsentService;
pub use odontograms::OdontogramService;
pub use radiographs::RadiographService;
pub use scope::PatientScope;
pub use treatments::TreatmentPlanService;
