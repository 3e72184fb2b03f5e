// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer capability/option description.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::rules::RuleTables;

/// How one IPP option is expressed in the printer's PPD vocabulary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PpdOption {
    /// PPD main keyword, e.g. `Duplex`.
    pub ppd_keyword: String,
    /// IPP value → PPD choice. Values without an entry pass through unchanged.
    pub choices: BTreeMap<String, String>,
}

impl PpdOption {
    pub fn choice_for<'a>(&'a self, ipp_value: &'a str) -> &'a str {
        self.choices
            .get(ipp_value)
            .map(String::as_str)
            .unwrap_or(ipp_value)
    }
}

/// Everything the request builder knows about a target printer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterDescription {
    pub name: String,
    pub printer_uri: String,
    /// The spooler needs PPD options rather than plain IPP attributes.
    pub ppd_injection: bool,
    /// IPP option keyword → PPD mapping.
    pub ppd_options: BTreeMap<String, PpdOption>,
    /// Job template attributes the spooler advertises. Empty means unknown,
    /// which is treated as "everything supported".
    pub supported_attributes: BTreeSet<String>,
    pub rules: RuleTables,
}

impl PrinterDescription {
    /// Parse a printer definition from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// PPD mapping for an option, only if this printer wants PPD injection.
    pub fn ppd_option(&self, keyword: &str) -> Option<&PpdOption> {
        if !self.ppd_injection {
            return None;
        }
        self.ppd_options.get(keyword)
    }

    /// Whether the spooler understands the given job template attribute.
    pub fn supports(&self, keyword: &str) -> bool {
        self.supported_attributes.is_empty() || self.supported_attributes.contains(keyword)
    }
}
