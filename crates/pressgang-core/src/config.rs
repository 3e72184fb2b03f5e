// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Transport configuration.
//
// Consumed, not owned, by the core: the hosting server decides the values and
// hands them over once at start-up.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PressgangError, Result};

/// Timeout policy for one endpoint class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteConfig {
    /// TCP connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Longest the spooler may stay silent, in milliseconds. Measured from
    /// the end of the upload to the response head, and again between
    /// response body chunks. Upload time never counts.
    pub socket_timeout_ms: u64,
}

impl RouteConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn socket_timeout(&self) -> Duration {
        Duration::from_millis(self.socket_timeout_ms)
    }

    /// Defaults for the spooler on this host.
    pub fn local() -> Self {
        Self {
            connect_timeout_ms: 5_000,
            socket_timeout_ms: 60_000,
        }
    }

    /// Defaults for spoolers on other hosts.
    pub fn remote() -> Self {
        Self {
            connect_timeout_ms: 10_000,
            socket_timeout_ms: 120_000,
        }
    }
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self::local()
    }
}

/// A route section as written in a config file. Fields left out keep the
/// preset of the endpoint class the section belongs to.
#[derive(Deserialize)]
struct RouteOverrides {
    connect_timeout_ms: Option<u64>,
    socket_timeout_ms: Option<u64>,
}

impl RouteOverrides {
    fn over(self, preset: RouteConfig) -> RouteConfig {
        RouteConfig {
            connect_timeout_ms: self.connect_timeout_ms.unwrap_or(preset.connect_timeout_ms),
            socket_timeout_ms: self.socket_timeout_ms.unwrap_or(preset.socket_timeout_ms),
        }
    }
}

fn local_route<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<RouteConfig, D::Error> {
    RouteOverrides::deserialize(deserializer).map(|o| o.over(RouteConfig::local()))
}

fn remote_route<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<RouteConfig, D::Error> {
    RouteOverrides::deserialize(deserializer).map(|o| o.over(RouteConfig::remote()))
}

/// Circuit breaker thresholds, shared by both endpoint classes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long an open circuit blocks calls, in milliseconds.
    pub cool_down_ms: u64,
}

impl BreakerConfig {
    pub fn cool_down(&self) -> Duration {
        Duration::from_millis(self.cool_down_ms)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cool_down_ms: 30_000,
        }
    }
}

/// Settings for the resilient spooler transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Timeouts for the spooler on this host.
    #[serde(deserialize_with = "local_route")]
    pub local: RouteConfig,
    /// Timeouts for spoolers elsewhere.
    #[serde(deserialize_with = "remote_route")]
    pub remote: RouteConfig,
    /// Connections allowed per endpoint class. The process total is twice
    /// this, so local and remote traffic can saturate independently.
    pub max_connections_per_route: usize,
    /// How long a sender may wait for a free connection, in milliseconds.
    pub pool_acquire_timeout_ms: u64,
    /// How long an idle pooled connection is kept, in milliseconds.
    pub pool_idle_timeout_ms: u64,
    pub breaker: BreakerConfig,
}

impl TransportConfig {
    pub fn pool_acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_acquire_timeout_ms)
    }

    pub fn pool_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.pool_idle_timeout_ms)
    }

    /// Total connections across both endpoint classes.
    pub fn max_connections_total(&self) -> usize {
        self.max_connections_per_route * 2
    }

    /// Parse a JSON configuration document. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Reject settings the transport cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_connections_per_route == 0 {
            return Err(PressgangError::Config(
                "max_connections_per_route must be at least 1".into(),
            ));
        }
        if self.breaker.failure_threshold == 0 {
            return Err(PressgangError::Config(
                "breaker.failure_threshold must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            local: RouteConfig::local(),
            remote: RouteConfig::remote(),
            max_connections_per_route: 20,
            pool_acquire_timeout_ms: 10_000,
            pool_idle_timeout_ms: 30_000,
            breaker: BreakerConfig::default(),
        }
    }
}
