use std::sync::Arc;

use crate::config::Config;
use crate::job_roles::JobRoleProvider;
use crate::session::ScreeningSession;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub session: ScreeningSession,
    pub job_roles: Arc<dyn JobRoleProvider>,
    pub config: Config,
}
