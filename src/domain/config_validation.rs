//! Configuration validation.
//!
//! Checks the INI fields the screener depends on before any data is read.

use crate::domain::error::ScreenError;
use crate::domain::filter::RankCombine;
use crate::ports::config_port::ConfigPort;

pub const LOG_FORMATS: [&str; 2] = ["pretty", "json"];

pub fn validate_config(config: &dyn ConfigPort) -> Result<(), ScreenError> {
    validate_data_dir(config)?;
    validate_engine(config)?;
    validate_rank_mode(config)?;
    validate_log(config)?;
    Ok(())
}

fn invalid(section: &str, key: &str, reason: &str) -> ScreenError {
    ScreenError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_data_dir(config: &dyn ConfigPort) -> Result<(), ScreenError> {
    match config.get_string("data", "dir") {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(ScreenError::ConfigMissing {
            section: "data".to_string(),
            key: "dir".to_string(),
        }),
    }
}

fn validate_engine(config: &dyn ConfigPort) -> Result<(), ScreenError> {
    if config.get_int("engine", "max_concurrency", 8) < 1 {
        return Err(invalid(
            "engine",
            "max_concurrency",
            "max_concurrency must be at least 1",
        ));
    }
    if config.get_int("engine", "max_holdings", 10) < 1 {
        return Err(invalid(
            "engine",
            "max_holdings",
            "max_holdings must be at least 1",
        ));
    }
    let tolerance = config.get_double("engine", "failure_tolerance", 0.0);
    if !(0.0..=1.0).contains(&tolerance) {
        return Err(invalid(
            "engine",
            "failure_tolerance",
            "failure_tolerance must be between 0 and 1",
        ));
    }
    Ok(())
}

fn validate_rank_mode(config: &dyn ConfigPort) -> Result<(), ScreenError> {
    match config.get_string("filter", "this_year_235_mode") {
        None => Ok(()),
        Some(mode) => mode
            .parse::<RankCombine>()
            .map(|_| ())
            .map_err(|reason| invalid("filter", "this_year_235_mode", &reason)),
    }
}

fn validate_log(config: &dyn ConfigPort) -> Result<(), ScreenError> {
    if let Some(format) = config.get_string("log", "format") {
        if !LOG_FORMATS.contains(&format.trim()) {
            return Err(invalid("log", "format", "format must be pretty or json"));
        }
    }
    Ok(())
}
