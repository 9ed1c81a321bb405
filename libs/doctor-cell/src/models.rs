use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use auth_cell::models::PasswordChange;
use shared_models::auth::Identity;
use shared_models::routes;
use shared_models::serde_ext::null_as_default;
use shared_models::validation::ValidationError;
use onboarding_cell::models::{OnboardingForm, ProfileRecord};

use crate::codec::{comma_list, json_text};
use crate::services::validation::validate_onboarding;

pub const DOCTORS_TABLE: &str = "doctors";

pub const SPECIALTIES: [&str; 13] = [
    "General practice (GP)",
    "Dermatology",
    "Mental health / Psychiatry",
    "Women’s health",
    "Paediatrics",
    "Cardiology",
    "Endocrinology / Diabetes",
    "Orthopaedics",
    "Neurology",
    "Respiratory medicine",
    "Gastroenterology",
    "Sexual health",
    "Other",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownKey(pub String);

impl fmt::Display for UnknownKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown key: {}", self.0)
    }
}

/// Recurring availability window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TimeBlock {
    #[serde(rename = "weekday_day")]
    WeekdayDay,
    #[serde(rename = "weekday_night")]
    WeekdayNight,
    #[serde(rename = "weekend_day")]
    WeekendDay,
    #[serde(rename = "weekend_night")]
    WeekendNight,
    #[serde(rename = "24_7")]
    AroundTheClock,
}

impl TimeBlock {
    pub const ALL: [TimeBlock; 5] = [
        TimeBlock::WeekdayDay,
        TimeBlock::WeekdayNight,
        TimeBlock::WeekendDay,
        TimeBlock::WeekendNight,
        TimeBlock::AroundTheClock,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            TimeBlock::WeekdayDay => "weekday_day",
            TimeBlock::WeekdayNight => "weekday_night",
            TimeBlock::WeekendDay => "weekend_day",
            TimeBlock::WeekendNight => "weekend_night",
            TimeBlock::AroundTheClock => "24_7",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeBlock::WeekdayDay => "Weekdays 08:00–19:00",
            TimeBlock::WeekdayNight => "Weekdays 19:00–08:00",
            TimeBlock::WeekendDay => "Weekends 07:00–19:00",
            TimeBlock::WeekendNight => "Weekends 19:00–07:00",
            TimeBlock::AroundTheClock => "Available 24/7",
        }
    }

    /// The fee that has to be picked when this block is ticked. 24/7 has none.
    pub fn fee_block(&self) -> Option<FeeBlock> {
        match self {
            TimeBlock::WeekdayDay => Some(FeeBlock::WeekdayDay),
            TimeBlock::WeekdayNight => Some(FeeBlock::WeekdayNight),
            TimeBlock::WeekendDay => Some(FeeBlock::WeekendDay),
            TimeBlock::WeekendNight => Some(FeeBlock::WeekendNight),
            TimeBlock::AroundTheClock => None,
        }
    }
}

impl AsRef<str> for TimeBlock {
    fn as_ref(&self) -> &str {
        self.key()
    }
}

impl FromStr for TimeBlock {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeBlock::ALL
            .into_iter()
            .find(|block| block.key() == s)
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConsultationMode {
    Video,
    Phone,
    #[serde(rename = "In person")]
    InPerson,
    #[serde(rename = "Emergency / home visit")]
    EmergencyHomeVisit,
}

impl ConsultationMode {
    pub const ALL: [ConsultationMode; 4] = [
        ConsultationMode::Video,
        ConsultationMode::Phone,
        ConsultationMode::InPerson,
        ConsultationMode::EmergencyHomeVisit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ConsultationMode::Video => "Video",
            ConsultationMode::Phone => "Phone",
            ConsultationMode::InPerson => "In person",
            ConsultationMode::EmergencyHomeVisit => "Emergency / home visit",
        }
    }
}

impl AsRef<str> for ConsultationMode {
    fn as_ref(&self) -> &str {
        self.label()
    }
}

impl FromStr for ConsultationMode {
    type Err = UnknownKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConsultationMode::ALL
            .into_iter()
            .find(|mode| mode.label() == s)
            .ok_or_else(|| UnknownKey(s.to_string()))
    }
}

/// A priced slot in the fee schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeBlock {
    WeekdayDay,
    WeekdayNight,
    WeekendDay,
    WeekendNight,
    EmergencyHome,
}

impl FeeBlock {
    pub const ALL: [FeeBlock; 5] = [
        FeeBlock::WeekdayDay,
        FeeBlock::WeekdayNight,
        FeeBlock::WeekendDay,
        FeeBlock::WeekendNight,
        FeeBlock::EmergencyHome,
    ];

    /// Wording used inside validation messages.
    pub fn describe(&self) -> &'static str {
        match self {
            FeeBlock::WeekdayDay => "weekdays 08:00–19:00",
            FeeBlock::WeekdayNight => "weekdays 19:00–08:00",
            FeeBlock::WeekendDay => "weekends 07:00–19:00",
            FeeBlock::WeekendNight => "weekends 19:00–07:00",
            FeeBlock::EmergencyHome => "emergency / home visits",
        }
    }

    pub fn tiers(&self) -> &'static [&'static str] {
        match self {
            FeeBlock::WeekdayDay => &["£20/h", "£45/h", "£55/h", "£75/h"],
            FeeBlock::WeekdayNight => &["£45/h", "£75/h", "£120/h"],
            FeeBlock::WeekendDay => &["£45/h", "£55/h", "£75/h", "£125/h", "£175/h"],
            FeeBlock::WeekendNight => &["£55/h", "£75/h", "£99/h", "£125/h", "£155/h", "£195/h"],
            FeeBlock::EmergencyHome => &["£125/h", "£210/h", "£350/h", "£450/h"],
        }
    }
}

/// Hourly fee per block. `None` (or blank from a form) means not offered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    pub weekday_day: Option<String>,
    pub weekday_night: Option<String>,
    pub weekend_day: Option<String>,
    pub weekend_night: Option<String>,
    pub emergency_home: Option<String>,
}

impl FeeSchedule {
    pub fn get(&self, block: FeeBlock) -> Option<&str> {
        let fee = match block {
            FeeBlock::WeekdayDay => &self.weekday_day,
            FeeBlock::WeekdayNight => &self.weekday_night,
            FeeBlock::WeekendDay => &self.weekend_day,
            FeeBlock::WeekendNight => &self.weekend_night,
            FeeBlock::EmergencyHome => &self.emergency_home,
        };
        fee.as_deref().map(str::trim).filter(|fee| !fee.is_empty())
    }

    pub fn set(&mut self, block: FeeBlock, fee: Option<&str>) {
        let fee = fee.map(str::to_string);
        match block {
            FeeBlock::WeekdayDay => self.weekday_day = fee,
            FeeBlock::WeekdayNight => self.weekday_night = fee,
            FeeBlock::WeekendDay => self.weekend_day = fee,
            FeeBlock::WeekendNight => self.weekend_night = fee,
            FeeBlock::EmergencyHome => self.emergency_home = fee,
        }
    }

    pub fn any_chosen(&self) -> bool {
        FeeBlock::ALL.iter().any(|block| self.get(*block).is_some())
    }

    /// Trimmed copy with blanks turned into `None` and every block `offered` rejects
    /// cleared.
    pub fn retain(&self, offered: impl Fn(FeeBlock) -> bool) -> Self {
        let mut fees = FeeSchedule::default();
        for block in FeeBlock::ALL.into_iter().filter(|block| offered(*block)) {
            fees.set(block, self.get(block));
        }
        fees
    }
}

/// Row of the `doctors` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorProfile {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub full_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub gmc_number: String,
    #[serde(default, with = "comma_list")]
    pub specialty: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub clinic_details: String,
    #[serde(default, with = "comma_list")]
    pub availability: Vec<TimeBlock>,
    #[serde(default, with = "comma_list")]
    pub consultation_type: Vec<ConsultationMode>,
    #[serde(default, with = "json_text")]
    pub fees: FeeSchedule,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    /// Managed outside onboarding; never written here.
    #[serde(default, skip_serializing)]
    pub emergency_on: Option<bool>,
}

impl ProfileRecord for DoctorProfile {
    const TABLE: &'static str = DOCTORS_TABLE;

    fn avatar_url(&self) -> Option<&str> {
        self.avatar_url.as_deref()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DoctorOnboardingForm {
    pub full_name: String,
    pub gmc_number: String,
    pub specialties: Vec<String>,
    pub availability: Vec<TimeBlock>,
    pub consultation_modes: Vec<ConsultationMode>,
    pub clinic_details: String,
    pub fees: FeeSchedule,
    #[serde(skip_serializing)]
    pub password: PasswordChange,
}

fn toggle<T: PartialEq>(list: &mut Vec<T>, value: T) {
    if let Some(pos) = list.iter().position(|item| *item == value) {
        list.remove(pos);
    } else {
        list.push(value);
    }
}

fn dedup_in_order<T: PartialEq + Clone>(items: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(items.len());
    for item in items {
        if !unique.contains(item) {
            unique.push(item.clone());
        }
    }
    unique
}

impl DoctorOnboardingForm {
    pub fn toggle_specialty(&mut self, specialty: &str) {
        toggle(&mut self.specialties, specialty.to_string());
    }

    pub fn toggle_block(&mut self, block: TimeBlock) {
        toggle(&mut self.availability, block);
    }

    pub fn toggle_mode(&mut self, mode: ConsultationMode) {
        toggle(&mut self.consultation_modes, mode);
    }

    pub fn is_available(&self, block: TimeBlock) -> bool {
        self.availability.contains(&block)
    }

    /// Emergency fees are always offered. A time-block fee only while its block (or
    /// around the clock) is ticked.
    pub fn offers(&self, fee_block: FeeBlock) -> bool {
        fee_block == FeeBlock::EmergencyHome
            || self.availability.iter().any(|block| {
                *block == TimeBlock::AroundTheClock || block.fee_block() == Some(fee_block)
            })
    }

    /// Fees the doctor still offers, ready to store.
    pub fn offered_fees(&self) -> FeeSchedule {
        self.fees.retain(|block| self.offers(block))
    }
}

impl OnboardingForm for DoctorOnboardingForm {
    type Profile = DoctorProfile;

    const AVATAR_FOLDER: &'static str = "doctors";
    const DASHBOARD_ROUTE: &'static str = routes::DOCTOR_DASHBOARD;
    const SAVED_MESSAGE: &'static str = "Profile saved! You’re ready to start using Dr. Sam.";
    const REDIRECT_DELAY_MS: u64 = 1500;

    fn from_profile(profile: &DoctorProfile) -> Self {
        Self {
            full_name: profile.full_name.clone(),
            gmc_number: profile.gmc_number.clone(),
            specialties: profile.specialty.clone(),
            availability: profile.availability.clone(),
            consultation_modes: profile.consultation_type.clone(),
            clinic_details: profile.clinic_details.clone(),
            fees: profile.fees.clone(),
            password: PasswordChange::default(),
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        validate_onboarding(self)
    }

    fn to_profile(&self, identity: &Identity, avatar_url: Option<String>) -> DoctorProfile {
        let mut availability = dedup_in_order(&self.availability);
        availability.sort();

        DoctorProfile {
            id: identity.id.clone(),
            full_name: self.full_name.trim().to_string(),
            gmc_number: self.gmc_number.trim().to_string(),
            specialty: dedup_in_order(&self.specialties),
            clinic_details: self.clinic_details.trim().to_string(),
            availability,
            consultation_type: dedup_in_order(&self.consultation_modes),
            fees: self.offered_fees(),
            avatar_url,
            emergency_on: None,
        }
    }

    fn password_change(&self) -> &PasswordChange {
        &self.password
    }
}

/// One entry in the public emergency listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmergencyDoctorCard {
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
    pub avatar_url: Option<String>,
    pub fee_text: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn jane() -> DoctorOnboardingForm {
        let mut form = DoctorOnboardingForm {
            full_name: " Jane Doe ".to_string(),
            gmc_number: "123456".to_string(),
            clinic_details: "Leeds Road Surgery".to_string(),
            ..Default::default()
        };
        form.toggle_specialty("Dermatology");
        form.toggle_block(TimeBlock::WeekendDay);
        form.toggle_block(TimeBlock::WeekdayDay);
        form.toggle_mode(ConsultationMode::Video);
        form.fees.set(FeeBlock::WeekdayDay, Some("£45/h"));
        form.fees.set(FeeBlock::WeekendDay, Some("  "));
        form
    }

    #[test]
    fn test_row_encoding() {
        let profile = jane().to_profile(&Identity::new("U1"), None);
        let row = serde_json::to_value(&profile).unwrap();

        assert_eq!(
            row,
            json!({
                "id": "U1",
                "full_name": "Jane Doe",
                "gmc_number": "123456",
                "specialty": "Dermatology",
                "clinic_details": "Leeds Road Surgery",
                "availability": "weekday_day,weekend_day",
                "consultation_type": "Video",
                "fees": "{\"weekday_day\":\"£45/h\",\"weekday_night\":null,\"weekend_day\":null,\"weekend_night\":null,\"emergency_home\":null}"
            })
        );
    }

    #[test]
    fn test_unticked_block_fee_is_dropped() {
        let mut form = jane();
        form.fees.set(FeeBlock::WeekendDay, Some("£55/h"));
        form.fees.set(FeeBlock::WeekendNight, Some("£1/h"));
        form.fees.set(FeeBlock::EmergencyHome, Some("£210/h"));
        form.toggle_block(TimeBlock::WeekendDay);

        let profile = form.to_profile(&Identity::new("U1"), None);
        assert_eq!(profile.availability, vec![TimeBlock::WeekdayDay]);
        assert_eq!(
            profile.fees,
            FeeSchedule {
                weekday_day: Some("£45/h".to_string()),
                emergency_home: Some("£210/h".to_string()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_around_the_clock_keeps_block_fees() {
        let mut form = jane();
        form.availability = vec![TimeBlock::AroundTheClock];
        form.fees.set(FeeBlock::WeekendNight, Some("£99/h"));

        let fees = form.offered_fees();
        assert_eq!(fees.get(FeeBlock::WeekdayDay), Some("£45/h"));
        assert_eq!(fees.get(FeeBlock::WeekendNight), Some("£99/h"));
    }

    #[test]
    fn test_row_decoding_is_lenient() {
        let profile: DoctorProfile = serde_json::from_value(json!({
            "id": "U1",
            "full_name": null,
            "specialty": "Dermatology,Cardiology",
            "availability": "weekday_night,24_7,someday",
            "consultation_type": "In person,Emergency / home visit",
            "fees": "{\"emergency_home\":\"£210/h\"}",
            "emergency_on": true
        }))
        .unwrap();

        assert_eq!(profile.full_name, "");
        assert_eq!(profile.specialty, vec!["Dermatology", "Cardiology"]);
        assert_eq!(profile.availability, vec![TimeBlock::WeekdayNight, TimeBlock::AroundTheClock]);
        assert_eq!(
            profile.consultation_type,
            vec![ConsultationMode::InPerson, ConsultationMode::EmergencyHomeVisit]
        );
        assert_eq!(profile.fees.get(FeeBlock::EmergencyHome), Some("£210/h"));
        assert_eq!(profile.emergency_on, Some(true));

        let broken: DoctorProfile =
            serde_json::from_value(json!({ "id": "U2", "fees": "not json" })).unwrap();
        assert_eq!(broken.fees, FeeSchedule::default());
    }

    #[test]
    fn test_toggle() {
        let mut form = DoctorOnboardingForm::default();
        form.toggle_mode(ConsultationMode::Phone);
        form.toggle_mode(ConsultationMode::Phone);
        assert!(form.consultation_modes.is_empty());
    }
}
