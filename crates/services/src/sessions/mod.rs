//! Live exam sessions: the keyed engine, its timers and the read-only view.

mod engine;
mod timers;
mod view;

pub use engine::{EngineHooks, SessionEngine};
pub use view::SessionView;
