use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_database::store::RecordStore;
use shared_models::error::AppError;
use shared_models::serde_ext::trimmed_or_none;

use crate::codec::comma_list;
use crate::models::{EmergencyDoctorCard, DOCTORS_TABLE};

/// Fee keys checked in order for the card's "Emergency from" line.
const EMERGENCY_FEE_KEYS: [&str; 5] = [
    "emergency_home",
    "emergency_default",
    "emergency",
    "weekend_night_emergency",
    "home_visit_emergency",
];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmergencyError {
    #[error("We couldn't load emergency doctors just now.")]
    Unavailable,
}

impl From<EmergencyError> for AppError {
    fn from(err: EmergencyError) -> Self {
        AppError::ExternalService(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct EmergencyRow {
    id: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    specialty: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    fees: Option<Value>,
}

/// "Emergency from £x" for the first emergency fee present, `None` when the column is
/// missing or unreadable.
pub fn emergency_fee_text(fees: Option<&Value>) -> Option<String> {
    let parsed = match fees? {
        Value::String(text) => serde_json::from_str::<Value>(text).ok()?,
        other => other.clone(),
    };

    EMERGENCY_FEE_KEYS
        .iter()
        .filter_map(|key| parsed.get(key).and_then(Value::as_str))
        .map(str::trim)
        .find(|fee| !fee.is_empty())
        .map(|fee| format!("Emergency from {}", fee))
}

/// Public, read-only listing of doctors taking emergency calls.
pub struct EmergencyService {
    records: Arc<dyn RecordStore>,
}

impl EmergencyService {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub async fn list(&self, access_token: Option<&str>) -> Result<Vec<EmergencyDoctorCard>, EmergencyError> {
        debug!("Fetching emergency doctors");

        let rows = self
            .records
            .fetch_where(DOCTORS_TABLE, "emergency_on", "true", "full_name", access_token)
            .await
            .map_err(|e| {
                error!("Failed to fetch emergency doctors: {}", e);
                EmergencyError::Unavailable
            })?;

        let cards = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value::<EmergencyRow>(row) {
                Ok(row) => Some(row),
                Err(e) => {
                    error!("Skipping unreadable doctor row: {}", e);
                    None
                }
            })
            .map(|row| {
                let specialties: Vec<String> =
                    comma_list::parse(row.specialty.as_deref().unwrap_or_default());
                EmergencyDoctorCard {
                    id: row.id,
                    name: trimmed_or_none(row.full_name.as_deref())
                        .unwrap_or_else(|| "Doctor".to_string()),
                    specialty: Some(specialties.join(" • ")).filter(|line| !line.is_empty()),
                    avatar_url: trimmed_or_none(row.avatar_url.as_deref()),
                    fee_text: emergency_fee_text(row.fees.as_ref()),
                }
            })
            .collect::<Vec<_>>();

        debug!("Found {} emergency doctors", cards.len());
        Ok(cards)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fee_text_key_order() {
        let fees = json!("{\"weekday_day\":\"£45/h\",\"emergency\":\"£99/h\",\"emergency_home\":\"£210/h\"}");
        assert_eq!(emergency_fee_text(Some(&fees)).as_deref(), Some("Emergency from £210/h"));

        let fees = json!("{\"emergency_home\":null,\"home_visit_emergency\":\"£350/h\"}");
        assert_eq!(emergency_fee_text(Some(&fees)).as_deref(), Some("Emergency from £350/h"));
    }

    #[test]
    fn test_fee_text_hidden_when_unusable() {
        assert_eq!(emergency_fee_text(None), None);
        assert_eq!(emergency_fee_text(Some(&json!("{oops"))), None);
        assert_eq!(emergency_fee_text(Some(&json!("{\"weekday_day\":\"£45/h\"}"))), None);
    }
}
