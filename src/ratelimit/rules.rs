//! Route rules configuration.
//!
//! This module loads the declarative route -> `(limit, interval)` mapping and
//! the algorithm selector from a JSON or YAML file, validates it, and exposes
//! the resulting read-only [`RouteTable`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use super::algorithm::AlgorithmKind;
use crate::error::{Result, TurnstileError};

/// The limit applied to a single route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    /// The route this limit applies to
    pub route: String,
    /// Maximum requests admitted per interval
    pub limit: u32,
    /// Length of the rate limiting interval
    pub interval: Duration,
}

impl RouteConfig {
    /// Create a validated route limit.
    pub fn new(route: impl Into<String>, limit: u32, interval: Duration) -> Result<Self> {
        let route = route.into();
        if route.is_empty() {
            return Err(TurnstileError::Config("route name must not be empty".into()));
        }
        if limit == 0 {
            return Err(TurnstileError::Config(format!(
                "route {route}: limit must be positive"
            )));
        }
        if interval.is_zero() {
            return Err(TurnstileError::Config(format!(
                "route {route}: interval must be positive"
            )));
        }
        Ok(Self {
            route,
            limit,
            interval,
        })
    }
}

/// Immutable mapping from route name to its configured limit.
///
/// Routes missing from the table are whitelisted.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteConfig>,
}

impl RouteTable {
    /// Build a table, rejecting duplicate routes.
    pub fn new(routes: impl IntoIterator<Item = RouteConfig>) -> Result<Self> {
        let routes = routes.into_iter();
        let mut table = HashMap::with_capacity(routes.size_hint().0);
        for route in routes {
            if table.contains_key(&route.route) {
                return Err(TurnstileError::Config(format!(
                    "route {} is configured more than once",
                    route.route
                )));
            }
            table.insert(route.route.clone(), route);
        }
        Ok(Self { routes: table })
    }

    /// Look up the limit for a route.
    pub fn get(&self, route: &str) -> Option<&RouteConfig> {
        self.routes.get(route)
    }

    /// Whether requests to `route` bypass rate limiting.
    pub fn is_whitelisted(&self, route: &str) -> bool {
        !self.routes.contains_key(route)
    }

    /// Names of every configured route.
    pub fn route_names(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }

    /// Every configured route limit.
    pub fn iter(&self) -> impl Iterator<Item = &RouteConfig> {
        self.routes.values()
    }

    /// Number of configured routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// On-disk shape of the rules file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRulesFile {
    /// Algorithm selector string
    #[serde(default)]
    pub algorithm: String,
    /// Route limits
    #[serde(default)]
    pub routes: Vec<RawRouteConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRouteConfig {
    pub route: String,
    pub limit: i64,
    /// Go-style duration string such as `1s` or `1m30s`
    pub interval: String,
}

/// A validated rate limit configuration.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// The globally selected algorithm
    pub algorithm: AlgorithmKind,
    /// Per-route limits
    pub routes: RouteTable,
}

impl RateLimitConfig {
    /// Load configuration from a `.json`, `.yaml` or `.yml` file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit configuration");

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let contents = match extension {
            "json" | "yaml" | "yml" => std::fs::read_to_string(path)?,
            other => {
                return Err(TurnstileError::Config(format!(
                    "invalid configuration file format: .{other}. Expected .json, .yaml or .yml"
                )))
            }
        };

        let config = if extension == "json" {
            Self::from_json(&contents)?
        } else {
            Self::from_yaml(&contents)?
        };

        info!(
            algorithm = %config.algorithm,
            routes = config.routes.len(),
            "Configuration set up successfully"
        );
        Ok(config)
    }

    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        let raw: RawRulesFile = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: RawRulesFile = serde_yaml::from_str(yaml)?;
        Self::from_raw(raw)
    }

    /// Validate a raw rules file.
    pub fn from_raw(raw: RawRulesFile) -> Result<Self> {
        let mut routes = Vec::with_capacity(raw.routes.len());
        for entry in raw.routes {
            let interval = parse_interval(&entry.interval).map_err(|e| {
                TurnstileError::Config(format!("route {}: {}", entry.route, e))
            })?;
            if entry.limit <= 0 {
                return Err(TurnstileError::Config(format!(
                    "route {}: limit must be a positive integer, got {}",
                    entry.route, entry.limit
                )));
            }
            let limit = u32::try_from(entry.limit).map_err(|_| {
                TurnstileError::Config(format!(
                    "route {}: limit {} exceeds the maximum of {}",
                    entry.route,
                    entry.limit,
                    u32::MAX
                ))
            })?;
            debug!(route = %entry.route, limit, ?interval, "Parsed route limit");
            routes.push(RouteConfig::new(entry.route, limit, interval)?);
        }

        Ok(Self {
            algorithm: AlgorithmKind::from_selector(&raw.algorithm),
            routes: RouteTable::new(routes)?,
        })
    }
}

/// Parse a Go-style duration string (`300ms`, `1.5s`, `1h30m`).
///
/// Accepted units are `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`. The result
/// must be strictly positive.
pub fn parse_interval(input: &str) -> std::result::Result<Duration, String> {
    if input.is_empty() {
        return Err("empty interval".into());
    }
    let mut rest = input.strip_prefix('+').unwrap_or(input);
    if rest.starts_with('-') {
        return Err(format!("interval {input:?} must be positive"));
    }
    if rest == "0" {
        return Err(format!("interval {input:?} must be positive"));
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(format!("invalid interval {input:?}"));
        }

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);
        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            "" => return Err(format!("missing unit in interval {input:?}")),
            other => return Err(format!("unknown unit {other:?} in interval {input:?}")),
        };

        let overflow = || format!("interval {input:?} is too large");
        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        total = whole
            .checked_mul(unit_nanos)
            .and_then(|nanos| total.checked_add(nanos))
            .ok_or_else(overflow)?;

        // Digits past nanosecond precision cannot change the result.
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let scale = 10u128.pow(fraction.len() as u32);
            let numerator: u128 = fraction
                .parse()
                .map_err(|_| format!("invalid interval {input:?}"))?;
            total = total
                .checked_add(numerator * unit_nanos / scale)
                .ok_or_else(overflow)?;
        }

        rest = tail;
    }

    let nanos = u64::try_from(total).map_err(|_| format!("interval {input:?} is too large"))?;
    if nanos == 0 {
        return Err(format!("interval {input:?} must be positive"));
    }
    Ok(Duration::from_nanos(nanos))
}
