//! Environment-driven configuration helpers.
//!
//! Each tether crate keeps its own settings struct and reads overrides with
//! [`env_or`], which applies the same `FromStr` parsing the logging module
//! uses for `TETHER_LOG_FORMAT`. Unset variables fall back to the default;
//! set-but-invalid values are reported instead of silently ignored.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

/// Configuration parsing error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError
{
    /// A variable was set but could not be parsed
    #[error("Invalid value for {key}: {value:?} ({reason})")]
    InvalidValue
    {
        key: String,
        value: String,
        reason: String,
    },
}

/// Read `key` from the environment, parsing it with `FromStr`.
///
/// Returns `default` when the variable is unset or empty.
///
/// ## Errors
///
/// [`ConfigError::InvalidValue`] when the variable is set to something `T`
/// cannot parse.
pub fn env_or<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => parse_value(key, &raw),
        _ => Ok(default),
    }
}

/// Parse a raw configuration value, attributing failures to `key`.
///
/// ## Errors
///
/// [`ConfigError::InvalidValue`] when `raw` does not parse as `T`.
pub fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
{
    raw.trim().parse::<T>().map_err(|err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        reason: err.to_string(),
    })
}
