use std::sync::Arc;

use crate::attempt::registry::AttemptRegistry;
use crate::core::config::Settings;
use crate::store::{AttemptStore, TestStore};

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    tests: Arc<dyn TestStore>,
    attempts: Arc<dyn AttemptStore>,
    registry: AttemptRegistry,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        tests: Arc<dyn TestStore>,
        attempts: Arc<dyn AttemptStore>,
        registry: AttemptRegistry,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, tests, attempts, registry }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn tests(&self) -> &Arc<dyn TestStore> {
        &self.inner.tests
    }

    pub(crate) fn attempts(&self) -> &Arc<dyn AttemptStore> {
        &self.inner.attempts
    }

    pub(crate) fn registry(&self) -> &AttemptRegistry {
        &self.inner.registry
    }
}
