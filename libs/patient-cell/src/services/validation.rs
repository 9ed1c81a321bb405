use chrono::{NaiveDate, Utc};

use shared_models::validation::{require_text, ValidationError};

use crate::models::PatientOnboardingForm;

pub fn validate_onboarding(form: &PatientOnboardingForm) -> Result<(), ValidationError> {
    validate_onboarding_on(form, Utc::now().date_naive())
}

/// Same rules with an explicit "today" for the future-date check.
pub fn validate_onboarding_on(
    form: &PatientOnboardingForm,
    today: NaiveDate,
) -> Result<(), ValidationError> {
    require_text("full_name", &form.full_name, "Please enter your full name.")?;

    let date_of_birth = form.parsed_date_of_birth().map_err(|_| {
        ValidationError::new(
            "date_of_birth",
            "Please enter your date of birth as YYYY-MM-DD.",
        )
    })?;

    if date_of_birth.is_some_and(|dob| dob > today) {
        return Err(ValidationError::new(
            "date_of_birth",
            "Your date of birth can't be in the future.",
        ));
    }

    form.password.validate()
}
