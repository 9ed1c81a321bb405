pub mod dashboard;
pub mod emergency;
pub mod validation;

pub use dashboard::DoctorDashboardService;
pub use emergency::EmergencyService;
