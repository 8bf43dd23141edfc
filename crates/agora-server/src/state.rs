//! Shared application state for the brain API server.

use std::sync::Arc;

use agora_brain::CoordinationService;

use crate::error::ApiError;

/// State shared by every handler.
///
/// The coordination service is optional so the server can still come up
/// (and answer 500) when the brains could not be constructed.
#[derive(Debug, Clone, Default)]
pub struct AppState {
    coordination: Option<Arc<CoordinationService>>,
}

impl AppState {
    /// State backed by a running coordination service.
    pub const fn new(coordination: Arc<CoordinationService>) -> Self {
        Self {
            coordination: Some(coordination),
        }
    }

    /// State with no coordination service; every brain route answers 500.
    pub const fn uninitialized() -> Self {
        Self { coordination: None }
    }

    /// The coordination service, or [`ApiError::ServiceNotInitialized`].
    pub fn coordination(&self) -> Result<&CoordinationService, ApiError> {
        self.coordination
            .as_deref()
            .ok_or(ApiError::ServiceNotInitialized)
    }
}
