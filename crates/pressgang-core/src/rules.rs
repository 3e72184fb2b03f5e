// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer rule tables.
//
// Three kinds of condition→correction rules, all loaded once per printer
// definition and never mutated while building requests:
//
//   - substitution: when an option has a given value (and conditions hold),
//     send a different value instead
//   - extra:        when conditions hold, force extra attributes into the job
//   - number-up:    given the PDF geometry and number-up, fix orientation
//                   and layout
//
// Tables are plain ordered lists.  Evaluation is first-match-wins; the
// builder chains the printer's own list in front of the template list.

use serde::{Deserialize, Serialize};

use crate::types::{OptionMap, PdfOrientation};

/// A single `keyword == value` test against the requested options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionCondition {
    pub keyword: String,
    pub value: String,
    /// Match when the option does *not* have this value (or is absent).
    #[serde(default)]
    pub negate: bool,
}

impl OptionCondition {
    pub fn new(keyword: &str, value: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            value: value.to_string(),
            negate: false,
        }
    }

    pub fn not(keyword: &str, value: &str) -> Self {
        Self {
            negate: true,
            ..Self::new(keyword, value)
        }
    }

    pub fn matches(&self, options: &OptionMap) -> bool {
        let hit = options.get(&self.keyword).is_some_and(|v| *v == self.value);
        hit != self.negate
    }
}

fn all_match(conditions: &[OptionCondition], options: &OptionMap) -> bool {
    conditions.iter().all(|c| c.matches(options))
}

/// Replace the value sent for one option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubstRule {
    pub name: String,
    /// Option keyword this rule rewrites.
    pub keyword: String,
    /// Requested value that triggers the rule.
    pub value: String,
    /// Further conditions on the other options.
    #[serde(default)]
    pub conditions: Vec<OptionCondition>,
    /// Value to send instead, already in the printer's vocabulary.
    pub substitute: String,
}

impl SubstRule {
    /// Whether this rule rewrites `keyword=value` given the full option set.
    pub fn applies(&self, keyword: &str, value: &str, options: &OptionMap) -> bool {
        self.keyword == keyword && self.value == value && all_match(&self.conditions, options)
    }
}

/// One attribute an extra rule forces into the job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraOption {
    pub keyword: String,
    pub value: String,
}

/// Force additional attributes into the job when conditions hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraRule {
    pub name: String,
    /// All must hold. An empty list always applies.
    #[serde(default)]
    pub conditions: Vec<OptionCondition>,
    pub extras: Vec<ExtraOption>,
}

impl ExtraRule {
    pub fn applies(&self, options: &OptionMap) -> bool {
        all_match(&self.conditions, options)
    }
}

/// Orientation and layout correction for n-up printing.
///
/// Unset predicate fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberUpRule {
    pub name: String,
    pub landscape: Option<bool>,
    pub rotation: Option<i32>,
    pub user_rotate: Option<i32>,
    pub number_up: Option<String>,
    /// `orientation-requested` enum value as a numeric string (`"3"`..`"6"`).
    pub orientation_requested: Option<String>,
    /// `number-up-layout` keyword, e.g. `"btlr"`.
    pub number_up_layout: Option<String>,
    /// Treat the job as landscape even though no option asked for it.
    pub landscape_perceived: bool,
}

impl NumberUpRule {
    pub fn applies(&self, pdf: &PdfOrientation, number_up: &str) -> bool {
        self.landscape.is_none_or(|l| l == pdf.landscape)
            && self.rotation.is_none_or(|r| normalize_degrees(r) == normalize_degrees(pdf.rotation))
            && self
                .user_rotate
                .is_none_or(|r| normalize_degrees(r) == normalize_degrees(pdf.user_rotate))
            && self.number_up.as_deref().is_none_or(|n| n == number_up)
    }
}

/// Fold any rotation into `0..360`.
pub fn normalize_degrees(degrees: i32) -> i32 {
    degrees.rem_euclid(360)
}

/// The three rule tables of one printer (or of the shared template).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleTables {
    pub substitution: Vec<SubstRule>,
    pub extra: Vec<ExtraRule>,
    pub number_up: Vec<NumberUpRule>,
}

impl RuleTables {
    pub fn is_empty(&self) -> bool {
        self.substitution.is_empty() && self.extra.is_empty() && self.number_up.is_empty()
    }
}
