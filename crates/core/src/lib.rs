#![forbid(unsafe_code)]

pub mod allocation;
pub mod assessment;
pub mod error;
pub mod model;
pub mod priority;
pub mod scoring;
pub mod settings;
pub mod time;
pub mod trend;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod fixtures;

pub use error::Error;
pub use settings::{AllocationSettings, SessionSettings, SettingsError};
pub use time::Clock;
pub use validation::{ValidationError, ValidationReport};
