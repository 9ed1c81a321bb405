use std::sync::Arc;

use shared_database::store::RecordStore;
use shared_models::auth::Identity;
use shared_models::routes;
use onboarding_cell::models::{DashboardAction, DashboardView, LoadError, LoadOutcome};
use onboarding_cell::services::ProfileLoader;

use crate::models::PatientProfile;

const SUBTITLE: &str = "Book appointments or request urgent help quickly.";

pub struct PatientDashboardService {
    loader: ProfileLoader,
}

impl PatientDashboardService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            loader: ProfileLoader::new(records),
        }
    }

    pub async fn load(&self, identity: &Identity, access_token: &str) -> Result<DashboardView, LoadError> {
        let profile = match self.loader.load::<PatientProfile>(identity, access_token).await? {
            LoadOutcome::Found(profile) => Some(profile),
            LoadOutcome::NotFound => None,
        };
        Ok(Self::view(profile.as_ref()))
    }

    pub fn view(profile: Option<&PatientProfile>) -> DashboardView {
        let title = profile
            .map(|p| p.full_name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or("Welcome")
            .to_string();

        DashboardView {
            title,
            subtitle: Some(SUBTITLE.to_string()),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            actions: vec![
                DashboardAction::new("Edit profile", routes::PATIENT_ONBOARDING),
                DashboardAction::new("Emergency help", routes::EMERGENCY),
                // Booking is not built yet; the route is a placeholder.
                DashboardAction::new("Book an appointment", routes::PATIENT_BOOKING),
                DashboardAction::new("Log out", routes::HOME),
            ],
        }
    }
}
