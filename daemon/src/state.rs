use std::sync::Arc;

use crate::services::core::Core;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<Core>,
}

impl AppState {
    pub fn new(core: Arc<Core>) -> Self {
        AppState { core }
    }
}
