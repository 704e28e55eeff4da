//! Application State

use std::sync::Arc;

use payswarm_registration::{Registrar, SettingsStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Registration state machine over the site settings
    pub registrar: Arc<Registrar<dyn SettingsStore>>,
}
