pub mod dashboard;
pub mod validation;

pub use dashboard::PatientDashboardService;
