// Copyright 2024-2026 llamacpp-observer Contributors
// SPDX-License-Identifier: Apache-2.0

//! Value parsers for environment and file configuration.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::Duration;

use super::config_types::{BucketSpec, ConfigError, LogFormat};

/// Parse a Go-style duration (`500ms`, `5s`, `1m`, `2h`) or bare seconds.
pub fn parse_duration(var: &str, raw: &str) -> Result<Duration, ConfigError> {
    let value = raw.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: f64 = number
        .parse()
        .map_err(|_| ConfigError::invalid(var, format!("not a duration: {:?}", raw)))?;
    let secs = match unit {
        "" | "s" => number,
        "ms" => number / 1000.0,
        "m" => number * 60.0,
        "h" => number * 3600.0,
        other => {
            return Err(ConfigError::invalid(var, format!("unknown duration unit {:?}", other)))
        }
    };
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ConfigError::invalid(var, "duration must be positive"));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::invalid(var, e.to_string()))
}

/// Parse a listen address; `:9100` binds all interfaces.
pub fn parse_addr(var: &str, raw: &str) -> Result<SocketAddr, ConfigError> {
    let value = raw.trim();
    let full = if value.starts_with(':') {
        format!("0.0.0.0{}", value)
    } else {
        value.to_string()
    };
    full.to_socket_addrs()
        .map_err(|e| ConfigError::invalid(var, e.to_string()))?
        .next()
        .ok_or_else(|| ConfigError::invalid(var, "address did not resolve"))
}

pub fn parse_bool(var: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::invalid(var, format!("not a boolean: {:?}", other))),
    }
}

pub fn parse_usize(var: &str, raw: &str) -> Result<usize, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|_| ConfigError::invalid(var, format!("not an integer: {:?}", raw)))
}

pub fn parse_log_format(var: &str, raw: &str) -> Result<LogFormat, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "text" | "pretty" | "compact" => Ok(LogFormat::Text),
        "json" => Ok(LogFormat::Json),
        other => Err(ConfigError::invalid(var, format!("unknown log format {:?}", other))),
    }
}

/// Parse `start,width,count` into a linear bucket layout.
pub fn parse_buckets(var: &str, raw: &str) -> Result<BucketSpec, ConfigError> {
    let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(ConfigError::invalid(var, "expected start,width,count"));
    }
    let start: f64 = parts[0]
        .parse()
        .map_err(|_| ConfigError::invalid(var, "start is not a number"))?;
    let width: f64 = parts[1]
        .parse()
        .map_err(|_| ConfigError::invalid(var, "width is not a number"))?;
    let count = parse_usize(var, parts[2])?;
    if width <= 0.0 || count == 0 {
        return Err(ConfigError::invalid(var, "width and count must be positive"));
    }
    Ok(BucketSpec { start, width, count })
}
