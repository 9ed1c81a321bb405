use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use auth_cell::models::PasswordChange;
use shared_models::auth::Identity;
use shared_models::routes;
use shared_models::serde_ext::{null_as_default, trimmed_or_none};
use shared_models::validation::ValidationError;
use onboarding_cell::models::{OnboardingForm, ProfileRecord};

use crate::services::validation::validate_onboarding;

pub const PATIENTS_TABLE: &str = "patients";
pub const DATE_OF_BIRTH_FORMAT: &str = "%Y-%m-%d";

/// Row of the `patients` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientProfile {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default, alias = "current_address")]
    pub address: Option<String>,
    #[serde(default)]
    pub past_diagnoses: Option<String>,
    #[serde(default)]
    pub gp_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

impl ProfileRecord for PatientProfile {
    const TABLE: &'static str = PATIENTS_TABLE;

    fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PatientOnboardingForm {
    pub full_name: String,
    /// `YYYY-MM-DD`, blank when not given.
    pub date_of_birth: String,
    #[serde(alias = "current_address")]
    pub address: String,
    pub past_diagnoses: String,
    pub gp_address: String,
    #[serde(skip_serializing)]
    pub password: PasswordChange,
}

impl PatientOnboardingForm {
    /// `Ok(None)` when left blank.
    pub fn parsed_date_of_birth(&self) -> Result<Option<NaiveDate>, chrono::ParseError> {
        match self.date_of_birth.trim() {
            "" => Ok(None),
            raw => NaiveDate::parse_from_str(raw, DATE_OF_BIRTH_FORMAT).map(Some),
        }
    }
}

impl OnboardingForm for PatientOnboardingForm {
    type Profile = PatientProfile;

    const AVATAR_FOLDER: &'static str = "patients";
    const DASHBOARD_ROUTE: &'static str = routes::PATIENT_DASHBOARD;
    const SAVED_MESSAGE: &'static str = "Profile saved!";
    const REDIRECT_DELAY_MS: u64 = 0;

    fn from_profile(profile: &PatientProfile) -> Self {
        Self {
            full_name: profile.full_name.clone(),
            date_of_birth: profile
                .date_of_birth
                .map(|dob| dob.format(DATE_OF_BIRTH_FORMAT).to_string())
                .unwrap_or_default(),
            address: profile.address.clone().unwrap_or_default(),
            past_diagnoses: profile.past_diagnoses.clone().unwrap_or_default(),
            gp_address: profile.gp_address.clone().unwrap_or_default(),
            password: PasswordChange::default(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_onboarding(self)
    }

    fn to_profile(&self, identity: &Identity, avatar_url: Option<String>) -> PatientProfile {
        PatientProfile {
            id: identity.id.clone(),
            full_name: self.full_name.trim().to_string(),
            // Unparsable dates are rejected by validation.
            date_of_birth: self.parsed_date_of_birth().ok().flatten(),
            address: trimmed_or_none(Some(&self.address)),
            past_diagnoses: trimmed_or_none(Some(&self.past_diagnoses)),
            gp_address: trimmed_or_none(Some(&self.gp_address)),
            avatar_url,
        }
    }

    fn password_change(&self) -> &PasswordChange {
        &self.password
    }
}
