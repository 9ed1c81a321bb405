//! Front-end routes the API hands back as navigation targets.

pub const HOME: &str = "/";
pub const SIGN_IN: &str = "/signin";
pub const DOCTOR_SIGNUP_COMPLETE: &str = "/signup/doctor/complete";
pub const DOCTOR_ONBOARDING: &str = "/doctor/onboarding";
pub const DOCTOR_DASHBOARD: &str = "/doctor/dashboard";
pub const PATIENT_ONBOARDING: &str = "/patient/onboarding";
pub const PATIENT_DASHBOARD: &str = "/patient/dashboard";
pub const PATIENT_BOOKING: &str = "/patient/book";
pub const EMERGENCY: &str = "/emergency";
