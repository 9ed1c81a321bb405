use std::sync::Arc;

use tracing::{debug, error};

use shared_database::store::RecordStore;
use shared_models::auth::Identity;

use crate::models::{LoadError, LoadOutcome, ProfileRecord};

/// Single point-in-time read of the caller's profile row.
#[derive(Clone)]
pub struct ProfileLoader {
    records: Arc<dyn RecordStore>,
}

impl ProfileLoader {
    pub fn new(records: Arc<dyn RecordStore>) -> Self {
        Self { records }
    }

    pub async fn load<P: ProfileRecord>(
        &self,
        identity: &Identity,
        access_token: &str,
    ) -> Result<LoadOutcome<P>, LoadError> {
        debug!("Loading {} row for user: {}", P::TABLE, identity.id);

        let row = self
            .records
            .fetch_one(P::TABLE, &identity.id, access_token)
            .await
            .map_err(|e| {
                error!("Failed to load {} row: {}", P::TABLE, e);
                LoadError::Unavailable
            })?;

        match row {
            Some(row) => {
                let profile = serde_json::from_value(row).map_err(|e| {
                    error!("Stored {} row has an unexpected shape: {}", P::TABLE, e);
                    LoadError::Unavailable
                })?;
                Ok(LoadOutcome::Found(profile))
            }
            None => {
                debug!("No {} row yet for user: {}", P::TABLE, identity.id);
                Ok(LoadOutcome::NotFound)
            }
        }
    }
}
