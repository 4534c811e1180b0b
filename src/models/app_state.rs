use std::sync::Arc;

use crate::config::Settings;
use crate::provision::executor::RemoteShell;
use crate::services::registry::HostRegistry;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HostRegistry>,
    /// Remote executor shared by every request; swapped for a fake in tests.
    pub shell: Arc<dyn RemoteShell>,
    pub settings: Arc<Settings>,
    pub custom_css: Option<String>,
}

impl AppState {
    pub fn new(registry: Arc<HostRegistry>, shell: Arc<dyn RemoteShell>, settings: Settings) -> Self {
        AppState {
            registry,
            shell,
            settings: Arc::new(settings),
            custom_css: None,
        }
    }
}
