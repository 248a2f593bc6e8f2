use std::sync::Arc;

use tokio::sync::mpsc::UnboundedSender;

use exam_core::Clock;
use exam_core::model::ExamResult;
use storage::repository::{QuestionStore, Storage};

use crate::allocator::AdaptiveAllocator;
use crate::config::EngineConfig;
use crate::error::AppServicesError;
use crate::exam_loop::ExamLoopService;
use crate::progress::ProgressTracker;
use crate::sessions::{EngineHooks, SessionEngine};

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    config: EngineConfig,
    questions: Arc<dyn QuestionStore>,
    progress: Arc<ProgressTracker>,
    exam_loop: Arc<ExamLoopService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage at `config.database_url`.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(config: EngineConfig, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(&config.database_url).await?;
        Ok(Self::from_storage(storage, config, clock, None))
    }

    /// Build services over in-memory repositories.
    #[must_use]
    pub fn in_memory(config: EngineConfig, clock: Clock) -> Self {
        Self::from_storage(Storage::in_memory(), config, clock, None)
    }

    /// Wire every service against `storage`, optionally forwarding finished results.
    #[must_use]
    pub fn from_storage(
        storage: Storage,
        config: EngineConfig,
        clock: Clock,
        completions: Option<UnboundedSender<ExamResult>>,
    ) -> Self {
        let mut hooks = EngineHooks::default().with_snapshots(Arc::clone(&storage.snapshots));
        if let Some(tx) = completions {
            hooks = hooks.with_completions(tx);
        }
        let engine = SessionEngine::with_hooks(clock, config.session.clone(), hooks);

        let progress = Arc::new(ProgressTracker::new(clock, Arc::clone(&storage.results)));
        let allocator = Arc::new(AdaptiveAllocator::new(Arc::clone(&storage.questions)));
        let exam_loop = Arc::new(ExamLoopService::new(
            config.allocation.clone(),
            allocator,
            engine,
            Arc::clone(&progress),
            Arc::clone(&storage.snapshots),
        ));

        Self {
            config,
            questions: storage.questions,
            progress,
            exam_loop,
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn questions(&self) -> Arc<dyn QuestionStore> {
        Arc::clone(&self.questions)
    }

    #[must_use]
    pub fn progress(&self) -> Arc<ProgressTracker> {
        Arc::clone(&self.progress)
    }

    #[must_use]
    pub fn exam_loop(&self) -> Arc<ExamLoopService> {
        Arc::clone(&self.exam_loop)
    }

    #[must_use]
    pub fn engine(&self) -> &SessionEngine {
        self.exam_loop.engine()
    }
}
