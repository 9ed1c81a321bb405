use std::sync::Arc;

use tracing::{debug, error, warn};

use shared_database::store::{IdentityProvider, RecordStore};
use shared_models::auth::Identity;

use crate::models::{OnboardingForm, ProfileRecord, SaveError, Saved, Validated};

const CONFLICT_KEY: &str = "id";

/// Upserts the profile row, then applies any bundled password change.
#[derive(Clone)]
pub struct ProfileSaver {
    records: Arc<dyn RecordStore>,
    identity: Arc<dyn IdentityProvider>,
}

impl ProfileSaver {
    pub fn new(records: Arc<dyn RecordStore>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { records, identity }
    }

    /// The password is only attempted once the row is stored, so a
    /// `SaveError::Profile` always means nothing changed.
    pub async fn save<F: OnboardingForm>(
        &self,
        identity: &Identity,
        access_token: &str,
        form: &Validated<F>,
        avatar_url: Option<String>,
    ) -> Result<Saved<F::Profile>, SaveError> {
        let table = <F::Profile as ProfileRecord>::TABLE;
        let profile = form.form().to_profile(identity, avatar_url);

        let row = serde_json::to_value(&profile).map_err(|e| {
            error!("Failed to serialize {} row: {}", table, e);
            SaveError::Profile
        })?;

        debug!("Upserting {} row for user: {}", table, identity.id);
        let stored = self
            .records
            .upsert(table, row, CONFLICT_KEY, access_token)
            .await
            .map_err(|e| {
                error!("Failed to upsert {} row: {}", table, e);
                SaveError::Profile
            })?;

        let profile = serde_json::from_value(stored).unwrap_or_else(|e| {
            warn!("Stored {} row could not be read back: {}", table, e);
            profile
        });

        let change = form.form().password_change();
        if !change.is_requested() {
            return Ok(Saved {
                profile,
                password_updated: false,
            });
        }

        debug!("Updating password for user: {}", identity.id);
        self.identity
            .update_password(access_token, &change.new_password)
            .await
            .map_err(|e| {
                error!("Profile saved but password update failed: {}", e);
                SaveError::Credentials {
                    profile_saved: true,
                }
            })?;

        Ok(Saved {
            profile,
            password_updated: true,
        })
    }
}
