use shared_models::validation::{require_text, ValidationError};

use crate::models::{DoctorOnboardingForm, FeeBlock, TimeBlock, SPECIALTIES};

/// Doctor onboarding rules, checked in order. Only the photo is optional.
pub fn validate_onboarding(form: &DoctorOnboardingForm) -> Result<(), ValidationError> {
    require_text("full_name", &form.full_name, "Please enter your full name.")?;
    require_text("gmc_number", &form.gmc_number, "Please enter your GMC number.")?;

    if form.specialties.is_empty() {
        return Err(ValidationError::new(
            "specialties",
            "Please choose at least one specialty.",
        ));
    }
    if form
        .specialties
        .iter()
        .any(|specialty| !SPECIALTIES.contains(&specialty.as_str()))
    {
        return Err(ValidationError::new(
            "specialties",
            "Please choose specialties from the list.",
        ));
    }

    if form.availability.is_empty() {
        return Err(ValidationError::new(
            "availability",
            "Please select when you’re available.",
        ));
    }

    if form.consultation_modes.is_empty() {
        return Err(ValidationError::new(
            "consultation_modes",
            "Please choose at least one consultation type.",
        ));
    }

    require_text(
        "clinic_details",
        &form.clinic_details,
        "Please add your practice or clinic details.",
    )?;

    let fees = form.offered_fees();
    if !fees.any_chosen() {
        return Err(ValidationError::new(
            "fees",
            "Please choose at least one fee option.",
        ));
    }

    for block in TimeBlock::ALL {
        let Some(fee_block) = block.fee_block() else {
            continue;
        };
        if form.is_available(block) && fees.get(fee_block).is_none() {
            return Err(ValidationError::new(
                "fees",
                format!(
                    "Please choose a fee for {} or untick that block.",
                    fee_block.describe()
                ),
            ));
        }
    }

    for fee_block in FeeBlock::ALL {
        if let Some(fee) = fees.get(fee_block) {
            if !fee_block.tiers().contains(&fee) {
                return Err(ValidationError::new(
                    "fees",
                    format!("Please choose a fee from the list for {}.", fee_block.describe()),
                ));
            }
        }
    }

    form.password.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use auth_cell::models::PasswordChange;
    use crate::models::ConsultationMode;

    fn valid_form() -> DoctorOnboardingForm {
        let mut form = DoctorOnboardingForm {
            full_name: "Jane Doe".to_string(),
            gmc_number: "123456".to_string(),
            clinic_details: "Leeds Road Surgery".to_string(),
            ..Default::default()
        };
        form.toggle_specialty("Dermatology");
        form.toggle_block(TimeBlock::WeekdayDay);
        form.toggle_mode(ConsultationMode::Video);
        form.fees.set(FeeBlock::WeekdayDay, Some("£45/h"));
        form
    }

    fn message(form: &DoctorOnboardingForm) -> String {
        validate_onboarding(form).unwrap_err().message
    }

    #[test]
    fn test_valid_form() {
        assert_eq!(validate_onboarding(&valid_form()), Ok(()));
    }

    #[test]
    fn test_required_fields_in_order() {
        let form = DoctorOnboardingForm::default();
        assert_eq!(message(&form), "Please enter your full name.");

        let mut form = valid_form();
        form.gmc_number = "  ".to_string();
        form.specialties.clear();
        assert_eq!(message(&form), "Please enter your GMC number.");

        let mut form = valid_form();
        form.specialties.clear();
        assert_eq!(message(&form), "Please choose at least one specialty.");

        let mut form = valid_form();
        form.toggle_specialty("Astrology");
        assert_eq!(message(&form), "Please choose specialties from the list.");

        let mut form = valid_form();
        form.availability.clear();
        assert_eq!(message(&form), "Please select when you’re available.");

        let mut form = valid_form();
        form.consultation_modes.clear();
        assert_eq!(message(&form), "Please choose at least one consultation type.");

        let mut form = valid_form();
        form.clinic_details = "\n".to_string();
        assert_eq!(message(&form), "Please add your practice or clinic details.");

        let mut form = valid_form();
        form.fees = Default::default();
        assert_eq!(message(&form), "Please choose at least one fee option.");
    }

    #[test]
    fn test_ticked_block_needs_its_fee() {
        let mut form = valid_form();
        form.fees.set(FeeBlock::WeekdayDay, None);
        form.fees.set(FeeBlock::EmergencyHome, Some("£210/h"));

        let err = validate_onboarding(&form).unwrap_err();
        assert_eq!(err.field, "fees");
        assert_eq!(
            err.message,
            "Please choose a fee for weekdays 08:00–19:00 or untick that block."
        );

        form.toggle_block(TimeBlock::WeekdayDay);
        form.toggle_block(TimeBlock::WeekendNight);
        assert_eq!(
            message(&form),
            "Please choose a fee for weekends 19:00–07:00 or untick that block."
        );
    }

    #[test]
    fn test_around_the_clock_needs_no_block_fee() {
        let mut form = valid_form();
        form.availability = vec![TimeBlock::AroundTheClock];
        assert_eq!(validate_onboarding(&form), Ok(()));
    }

    #[test]
    fn test_fee_must_come_from_tiers() {
        let mut form = valid_form();
        form.fees.set(FeeBlock::WeekdayDay, Some("£120/h"));
        assert_eq!(
            message(&form),
            "Please choose a fee from the list for weekdays 08:00–19:00."
        );
    }

    #[test]
    fn test_unticked_block_fee_is_not_checked() {
        let mut form = valid_form();
        form.fees.set(FeeBlock::WeekendNight, Some("£1/h"));
        assert_eq!(validate_onboarding(&form), Ok(()));

        form.toggle_block(TimeBlock::WeekendNight);
        assert_eq!(
            message(&form),
            "Please choose a fee from the list for weekends 19:00–07:00."
        );
    }

    #[test]
    fn test_only_unticked_fees_count_as_none() {
        let mut form = valid_form();
        form.fees = Default::default();
        form.fees.set(FeeBlock::WeekendDay, Some("£55/h"));
        assert_eq!(message(&form), "Please choose at least one fee option.");
    }

    #[test]
    fn test_password_rules_come_last() {
        let mut form = valid_form();
        form.password = PasswordChange::new("abc123", "abc124");
        assert_eq!(message(&form), "Your passwords don't match.");

        form.full_name.clear();
        assert_eq!(message(&form), "Please enter your full name.");
    }
}
