// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pressgang: Core types, rule tables, configuration, and error definitions
// shared across all crates.

pub mod config;
pub mod error;
pub mod printer;
pub mod rules;
pub mod types;

pub use config::{BreakerConfig, RouteConfig, TransportConfig};
pub use error::{ConnectionError, DecodeError, EncodeError, PressgangError};
pub use printer::{PpdOption, PrinterDescription};
pub use rules::{ExtraOption, ExtraRule, NumberUpRule, OptionCondition, RuleTables, SubstRule};
pub use types::*;
