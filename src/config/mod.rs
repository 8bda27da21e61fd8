//! Configuration loading and validation

mod settings;
mod validation;

pub use settings::{Settings, CONFIG_FILE, DEFAULT_PYTHON_VERSION};
pub use validation::validate_settings;
