use std::sync::Arc;

use shared_database::store::RecordStore;
use shared_models::auth::Identity;
use shared_models::routes;
use onboarding_cell::models::{DashboardAction, DashboardView, LoadError, LoadOutcome};
use onboarding_cell::services::ProfileLoader;

use crate::models::DoctorProfile;

const EMPTY_SUBTITLE: &str = "Keep your availability up to date so patients can find you quickly.";

pub struct DoctorDashboardService {
    loader: ProfileLoader,
}

impl DoctorDashboardService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self {
            loader: ProfileLoader::new(records),
        }
    }

    pub async fn load(&self, identity: &Identity, access_token: &str) -> Result<DashboardView, LoadError> {
        let profile = match self.loader.load::<DoctorProfile>(identity, access_token).await? {
            LoadOutcome::Found(profile) => Some(profile),
            LoadOutcome::NotFound => None,
        };
        Ok(Self::view(profile.as_ref()))
    }

    pub fn view(profile: Option<&DoctorProfile>) -> DashboardView {
        let title = profile
            .map(|p| p.full_name.trim())
            .filter(|name| !name.is_empty())
            .unwrap_or("Welcome back")
            .to_string();

        let subtitle = profile
            .filter(|p| !p.specialty.is_empty())
            .map(|p| p.specialty.join(" • "))
            .unwrap_or_else(|| EMPTY_SUBTITLE.to_string());

        DashboardView {
            title,
            subtitle: Some(subtitle),
            avatar_url: profile.and_then(|p| p.avatar_url.clone()),
            actions: vec![
                DashboardAction::new("Edit profile", routes::DOCTOR_ONBOARDING),
                DashboardAction::new("Log out", routes::HOME),
            ],
        }
    }
}
