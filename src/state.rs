// src/state.rs

use axum::extract::FromRef;

use crate::{
    cache::SharedCache,
    config::Config,
    services::{
        assembler::QuizAssembler, catalog::SubjectCatalog, eligibility::EligibilityChecker,
        progress::ProgressTracker, schedules::ScheduleBook, session::SessionManager,
    },
    store::SharedStore,
};

#[derive(Clone)]
pub struct AppState {
    pub store: SharedStore,
    pub config: Config,
    pub catalog: SubjectCatalog,
    pub assembler: QuizAssembler,
    pub schedules: ScheduleBook,
    pub eligibility: EligibilityChecker,
    pub progress: ProgressTracker,
    pub sessions: SessionManager,
}

impl AppState {
    /// Wires every service around one store and one local cache.
    pub fn new(store: SharedStore, cache: SharedCache, config: Config) -> Self {
        let catalog = SubjectCatalog::new(store.clone());
        let assembler = QuizAssembler::new(catalog.clone());
        let schedules = ScheduleBook::new(store.clone(), cache.clone());
        let eligibility = EligibilityChecker::new(schedules.clone());
        let progress = ProgressTracker::new(store.clone(), cache);
        let sessions = SessionManager::new(
            assembler.clone(),
            eligibility.clone(),
            progress.clone(),
            config.retake,
        );

        Self {
            store,
            config,
            catalog,
            assembler,
            schedules,
            eligibility,
            progress,
            sessions,
        }
    }
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
