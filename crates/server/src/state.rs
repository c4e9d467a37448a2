use std::sync::Arc;

use convoy_core::{Authenticator, Config, PipelineManager, SanitizedConfig};

/// Shared application state
pub struct AppState {
    config: Config,
    authenticator: Arc<dyn Authenticator>,
    manager: Arc<PipelineManager>,
}

impl AppState {
    pub fn new(
        config: Config,
        authenticator: Arc<dyn Authenticator>,
        manager: Arc<PipelineManager>,
    ) -> Self {
        Self {
            config,
            authenticator,
            manager,
        }
    }

    pub fn sanitized_config(&self) -> SanitizedConfig {
        SanitizedConfig::from(&self.config)
    }

    pub fn authenticator(&self) -> &dyn Authenticator {
        self.authenticator.as_ref()
    }

    pub fn manager(&self) -> &PipelineManager {
        self.manager.as_ref()
    }
}
