use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::store::Backend;

/// Process-wide state handed to every router. Built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Backend,
}

impl AppState {
    pub fn new(config: AppConfig, backend: Backend) -> Self {
        Self {
            config: Arc::new(config),
            backend,
        }
    }

    pub fn from_config(config: AppConfig) -> Self {
        let backend = Backend::supabase(&config);
        Self::new(config, backend)
    }
}
