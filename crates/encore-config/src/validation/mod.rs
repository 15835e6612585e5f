//! Full configuration validation.
//!
//! Validates numeric ranges and endpoint formats. Each section has its own
//! validator; this orchestrator calls them all and collects errors into a
//! single `ConfigError`.

mod helpers;
mod misc;


use crate::schema::EncoreConfig;
use encore_common::ConfigError;

/// Run all validations on a config, collecting all errors.
pub fn validate(config: &EncoreConfig) -> Result<(), ConfigError> {
    let mut errors: Vec<String> = Vec::new();

    misc::validate_realtime(&mut errors, config);
    misc::validate_endpoints(&mut errors, config);
    misc::validate_cache(&mut errors, config);
    misc::validate_notifications(&mut errors, config);
    misc::validate_presence(&mut errors, config);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationError(errors.join("; ")))
    }
}
