//! Typed environment lookups
//!
//! Unset variables fall back to the caller's default. Set but unparseable
//! variables are reported as errors instead of being silently ignored.

use std::str::FromStr;

use crate::error::{BioseqError, Result};

/// Read a string variable, treating empty values as unset
pub fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Read and parse a variable
pub fn parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| BioseqError::invalid_setting(name, raw, e)),
        None => Ok(None),
    }
}

/// Read a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`)
pub fn flag(name: &str) -> Result<Option<bool>> {
    match var(name) {
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(BioseqError::invalid_setting(name, raw, "expected a boolean")),
        },
        None => Ok(None),
    }
}
