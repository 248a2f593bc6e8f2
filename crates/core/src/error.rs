use thiserror::Error;

use crate::assessment::AssessmentConfigError;
use crate::model::{EnumParseError, SessionError};
use crate::settings::SettingsError;
use crate::validation::ValidationError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Parse(#[from] EnumParseError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Assessment(#[from] AssessmentConfigError),
}
