#![forbid(unsafe_code)]

pub mod allocator;
pub mod app_services;
pub mod config;
pub mod error;
pub mod exam_loop;
pub mod progress;
pub mod sessions;
pub mod telemetry;

pub use exam_core::Clock;

pub use allocator::AdaptiveAllocator;
pub use app_services::AppServices;
pub use config::EngineConfig;
pub use error::{AllocatorError, AppServicesError, ConfigError, ExamLoopError, ProgressError};
pub use exam_loop::{ExamLoopService, ExamOutcome};
pub use progress::ProgressTracker;
pub use sessions::{EngineHooks, SessionEngine, SessionView};
pub use telemetry::init_tracing;
