use std::sync::Arc;

use crate::analysis::orchestrator::AnalysisOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// One orchestrator per process: it owns the session and admits one run at a time.
    pub orchestrator: Arc<AnalysisOrchestrator>,
}
