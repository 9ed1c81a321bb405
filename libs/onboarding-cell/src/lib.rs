//! Role-agnostic onboarding: session check, profile load, avatar upload, validation,
//! save and post-save navigation. The doctor and patient cells plug their forms in
//! through [`OnboardingForm`].

pub mod handlers;
pub mod models;
pub mod services;

pub use models::*;
pub use services::*;
